//! Capability-requirement vector
//!
//! Every translated shader carries a `ShaderNeeds` record describing which
//! fixed-function-equivalent inputs its translated body depends on. On each
//! program link the vectors of all attached shaders are folded into one
//! aggregate, and a shader whose stored vector diverges from the aggregate
//! is stale and must be re-specialized.
//!
//! Scalar fields hold the minimum support level the shader can tolerate;
//! `UNCONSTRAINED` (-1) is the weakest level of all. The per-texture-unit
//! requirement is a bitmask folded with OR. Both folds are commutative and
//! associative, so aggregation order never matters.

use bitflags::bitflags;

/// Sentinel for a scalar requirement with no constraint at all
pub const UNCONSTRAINED: i32 = -1;

bitflags! {
    /// Per-texture-unit requirement mask (bit N = unit N)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TexUnits: u32 {}
}

impl TexUnits {
    /// Mask with only the bit for `unit` set
    pub fn unit(unit: u32) -> Self {
        Self::from_bits_retain(1 << unit)
    }
}

/// Requirement vector of one shader (or of an aggregate over a program)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderNeeds {
    /// Per-vertex primary color
    pub color: i32,
    /// Per-vertex secondary color
    pub secondary: i32,
    /// Fog coordinate varying
    pub fogcoord: i32,
    /// Highest texture-coordinate set in use (count), or `UNCONSTRAINED`
    pub texcoord: i32,
    /// Normal matrix uniform
    pub normal_matrix: i32,
    /// Model-view matrix uniform
    pub mv_matrix: i32,
    /// Model-view-projection matrix uniform
    pub mvp_matrix: i32,
    /// Set when the shader uses no texture arrays
    pub no_tex_array: i32,
    /// Set when the translated body needed no injection at all
    pub clean: i32,
    /// Clip-vertex emulation
    pub clip_vertex: i32,
    /// Per-texture-unit requirements, OR-folded across shaders
    pub tex_units: TexUnits,
}

impl Default for ShaderNeeds {
    fn default() -> Self {
        Self {
            color: 0,
            secondary: 0,
            fogcoord: 0,
            // Seeded unconstrained at object creation; translation resolves it
            texcoord: UNCONSTRAINED,
            normal_matrix: 0,
            mv_matrix: 0,
            mvp_matrix: 0,
            no_tex_array: 0,
            clean: 0,
            clip_vertex: 0,
            tex_units: TexUnits::empty(),
        }
    }
}

impl ShaderNeeds {
    /// All scalar fields, in a fixed order shared with `scalars_mut`
    fn scalars(&self) -> [i32; 10] {
        [
            self.color,
            self.secondary,
            self.fogcoord,
            self.texcoord,
            self.normal_matrix,
            self.mv_matrix,
            self.mvp_matrix,
            self.no_tex_array,
            self.clean,
            self.clip_vertex,
        ]
    }

    /// Mutable references to all scalar fields, same order as `scalars`
    fn scalars_mut(&mut self) -> [&mut i32; 10] {
        [
            &mut self.color,
            &mut self.secondary,
            &mut self.fogcoord,
            &mut self.texcoord,
            &mut self.normal_matrix,
            &mut self.mv_matrix,
            &mut self.mvp_matrix,
            &mut self.no_tex_array,
            &mut self.clean,
            &mut self.clip_vertex,
        ]
    }

    /// Fold another vector into this aggregate.
    ///
    /// Scalars keep the weaker requirement (minimum); the texture-unit
    /// mask is OR-folded.
    pub fn accumulate(&mut self, other: &ShaderNeeds) {
        let theirs = other.scalars();
        for (mine, theirs) in self.scalars_mut().into_iter().zip(theirs) {
            if theirs < *mine {
                *mine = theirs;
            }
        }
        self.tex_units |= other.tex_units;
    }

    /// Whether this shader tolerates everything `candidate` demands.
    ///
    /// False when any candidate scalar is stricter than ours, or when the
    /// candidate's unit mask overlaps ours (two shaders claiming the same
    /// unit simultaneously is a conflict).
    pub fn allows(&self, candidate: &ShaderNeeds) -> bool {
        let mine = self.scalars();
        for (mine, theirs) in mine.into_iter().zip(candidate.scalars()) {
            if theirs > mine {
                return false;
            }
        }
        (self.tex_units & candidate.tex_units).is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "needs_tests.rs"]
mod tests;
