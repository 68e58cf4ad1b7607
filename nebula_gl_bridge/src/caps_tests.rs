//! Unit tests for caps.rs
//!
//! Tests DriverCaps constructors and the verbatim-acceptance predicate
//! that gates the pass-through conversion strategy.

use crate::caps::DriverCaps;

// ============================================================================
// CONSTRUCTOR TESTS
// ============================================================================

#[test]
fn test_es2_caps() {
    let caps = DriverCaps::es2();
    assert_eq!(caps.es_major, 2);
    assert_eq!(caps.essl_version, 100);
    assert!(caps.has_compiler);
}

#[test]
fn test_es3_caps() {
    let caps = DriverCaps::es3(310);
    assert_eq!(caps.es_major, 3);
    assert_eq!(caps.essl_version, 310);
    assert!(caps.has_compiler);
}

#[test]
fn test_software_caps() {
    let caps = DriverCaps::software();
    assert!(!caps.has_compiler);
}

// ============================================================================
// VERBATIM ACCEPTANCE TESTS
// ============================================================================

#[test]
fn test_es2_accepts_essl100_verbatim() {
    let caps = DriverCaps::es2();
    assert!(caps.accepts_verbatim("#version 100\nvoid main() {}\n"));
}

#[test]
fn test_es2_rejects_essl300() {
    let caps = DriverCaps::es2();
    assert!(!caps.accepts_verbatim("#version 300 es\nvoid main() {}\n"));
}

#[test]
fn test_es2_rejects_desktop_glsl() {
    let caps = DriverCaps::es2();
    assert!(!caps.accepts_verbatim("#version 120\nvoid main() {}\n"));
    assert!(!caps.accepts_verbatim("void main() {}\n"));
}

#[test]
fn test_es3_accepts_essl300_verbatim() {
    let caps = DriverCaps::es3(300);
    assert!(caps.accepts_verbatim("#version 300 es\nvoid main() {}\n"));
}

#[test]
fn test_es3_accepts_essl100_verbatim() {
    // ES3 contexts still compile ESSL 100
    let caps = DriverCaps::es3(300);
    assert!(caps.accepts_verbatim("#version 100\nvoid main() {}\n"));
}

#[test]
fn test_es3_version_gating() {
    let caps = DriverCaps::es3(300);
    assert!(!caps.accepts_verbatim("#version 310 es\nvoid main() {}\n"));
    assert!(!caps.accepts_verbatim("#version 320 es\nvoid main() {}\n"));

    let caps = DriverCaps::es3(320);
    assert!(caps.accepts_verbatim("#version 310 es\nvoid main() {}\n"));
    assert!(caps.accepts_verbatim("#version 320 es\nvoid main() {}\n"));
}

#[test]
fn test_leading_whitespace_tolerated() {
    let caps = DriverCaps::es2();
    assert!(caps.accepts_verbatim("\n  #version 100\nvoid main() {}\n"));
}

#[test]
fn test_no_compiler_accepts_nothing() {
    let caps = DriverCaps::software();
    assert!(!caps.accepts_verbatim("#version 100\nvoid main() {}\n"));
    assert!(!caps.accepts_verbatim("#version 300 es\nvoid main() {}\n"));
}
