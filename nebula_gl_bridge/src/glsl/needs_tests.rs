//! Unit tests for the capability-requirement vector
//!
//! Tests the min/OR aggregation fold, its commutativity, and the
//! compatibility predicate used at link time.

use super::*;

fn with_texcoord(texcoord: i32) -> ShaderNeeds {
    ShaderNeeds {
        texcoord,
        ..ShaderNeeds::default()
    }
}

// ============================================================================
// DEFAULT VECTOR TESTS
// ============================================================================

#[test]
fn test_default_texcoord_unconstrained() {
    let needs = ShaderNeeds::default();
    assert_eq!(needs.texcoord, UNCONSTRAINED);
    assert_eq!(needs.color, 0);
    assert!(needs.tex_units.is_empty());
}

// ============================================================================
// ACCUMULATION TESTS
// ============================================================================

#[test]
fn test_accumulate_keeps_weaker_scalar() {
    // A shader demanding level 1 folded with one tolerating level 0
    // leaves the aggregate at 0
    let mut aggregate = with_texcoord(1);
    aggregate.accumulate(&with_texcoord(0));
    assert_eq!(aggregate.texcoord, 0);
}

#[test]
fn test_accumulate_unconstrained_wins() {
    let mut aggregate = with_texcoord(3);
    aggregate.accumulate(&with_texcoord(UNCONSTRAINED));
    assert_eq!(aggregate.texcoord, UNCONSTRAINED);
}

#[test]
fn test_accumulate_ors_tex_units() {
    let mut a = ShaderNeeds::default();
    a.tex_units = TexUnits::unit(0);
    let mut b = ShaderNeeds::default();
    b.tex_units = TexUnits::unit(2);

    a.accumulate(&b);
    assert!(a.tex_units.contains(TexUnits::unit(0)));
    assert!(a.tex_units.contains(TexUnits::unit(2)));
    assert!(!a.tex_units.contains(TexUnits::unit(1)));
}

#[test]
fn test_accumulate_commutative() {
    let mut a = ShaderNeeds::default();
    a.color = 1;
    a.texcoord = 2;
    a.tex_units = TexUnits::unit(1);

    let mut b = ShaderNeeds::default();
    b.secondary = 1;
    b.texcoord = 4;
    b.mvp_matrix = 1;
    b.tex_units = TexUnits::unit(3);

    let mut ab = a;
    ab.accumulate(&b);
    let mut ba = b;
    ba.accumulate(&a);

    assert_eq!(ab, ba);
}

#[test]
fn test_accumulate_associative() {
    let mut a = ShaderNeeds::default();
    a.fogcoord = 1;
    let mut b = ShaderNeeds::default();
    b.texcoord = 2;
    let mut c = ShaderNeeds::default();
    c.tex_units = TexUnits::unit(5);
    c.clean = 1;

    let mut left = a;
    left.accumulate(&b);
    left.accumulate(&c);

    let mut bc = b;
    bc.accumulate(&c);
    let mut right = a;
    right.accumulate(&bc);

    assert_eq!(left, right);
}

#[test]
fn test_accumulate_idempotent() {
    let mut a = ShaderNeeds::default();
    a.color = 1;
    a.tex_units = TexUnits::unit(2);
    let snapshot = a;

    a.accumulate(&snapshot);
    assert_eq!(a, snapshot);
}

// ============================================================================
// COMPATIBILITY TESTS
// ============================================================================

#[test]
fn test_allows_identical_scalars_without_units() {
    let a = with_texcoord(2);
    let b = with_texcoord(2);
    assert!(a.allows(&b));
}

#[test]
fn test_allows_rejects_stricter_candidate() {
    let mine = with_texcoord(1);
    let candidate = with_texcoord(3);
    assert!(!mine.allows(&candidate));
}

#[test]
fn test_allows_accepts_weaker_candidate() {
    let mine = with_texcoord(3);
    let candidate = with_texcoord(1);
    assert!(mine.allows(&candidate));
}

#[test]
fn test_allows_unconstrained_tolerates_nothing_stricter() {
    let mine = with_texcoord(UNCONSTRAINED);
    let candidate = with_texcoord(0);
    assert!(!mine.allows(&candidate));
}

#[test]
fn test_overlapping_tex_units_conflict() {
    let mut mine = ShaderNeeds::default();
    mine.tex_units = TexUnits::unit(0) | TexUnits::unit(1);
    let mut candidate = ShaderNeeds::default();
    candidate.texcoord = UNCONSTRAINED;
    candidate.tex_units = TexUnits::unit(1);

    assert!(!mine.allows(&candidate));
}

#[test]
fn test_disjoint_tex_units_compatible() {
    let mut mine = ShaderNeeds::default();
    mine.tex_units = TexUnits::unit(0);
    let mut candidate = ShaderNeeds::default();
    candidate.texcoord = UNCONSTRAINED;
    candidate.tex_units = TexUnits::unit(4);

    assert!(mine.allows(&candidate));
}

// ============================================================================
// TEX UNIT MASK TESTS
// ============================================================================

#[test]
fn test_unit_mask_bits() {
    assert_eq!(TexUnits::unit(0).bits(), 0b1);
    assert_eq!(TexUnits::unit(3).bits(), 0b1000);
    assert_eq!((TexUnits::unit(0) | TexUnits::unit(3)).bits(), 0b1001);
}
