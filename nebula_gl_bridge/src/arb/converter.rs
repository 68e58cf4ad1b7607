//! Assembly-program conversion entry point
//!
//! Drives the scanner and parser over `!!ARBvp1.0` / `!!ARBfp1.0` program
//! text and returns the translated legacy-GLSL source plus the special-case
//! flags callers key behavior on (depth replacement, fog-coordinate use).
//! Errors carry a message and the byte offset of the offending token so the
//! caller can synthesize a driver-style info log.

use std::fmt;

use crate::arb::parser::ArbParser;
use crate::bridge_debug;

/// Conversion failure with the byte offset of the offending token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmError {
    pub message: String,
    pub offset: usize,
}

impl AsmError {
    pub(crate) fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.offset)
    }
}

impl std::error::Error for AsmError {}

/// Flags the translation surfaces beyond the source text itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialCases {
    /// The program writes the depth output
    pub is_depth_replacing: bool,
    /// The program reads the fog-coordinate varying
    pub needs_fog_frag_coord: bool,
}

/// A successful assembly conversion
#[derive(Debug, Clone)]
pub struct AsmOutput {
    /// Legacy-GLSL source built on the `gl_*` builtins; the dialect
    /// converter turns it into backend-consumable text
    pub glsl: String,
    pub special: SpecialCases,
}

/// Translate an assembly program into legacy GLSL.
///
/// `is_vertex` selects the expected program header; a mismatching header is
/// an error rather than a silent reinterpretation.
pub fn convert_assembly(source: &str, is_vertex: bool) -> Result<AsmOutput, AsmError> {
    let parsed = ArbParser::new(source, is_vertex)?.parse()?;
    bridge_debug!(
        "nebula::AsmConverter",
        "converted {} assembly program ({} bytes in, {} bytes out)",
        if is_vertex { "vertex" } else { "fragment" },
        source.len(),
        parsed.glsl.len()
    );
    Ok(AsmOutput {
        glsl: parsed.glsl,
        special: SpecialCases {
            is_depth_replacing: parsed.depth_replacing,
            needs_fog_frag_coord: parsed.fog_frag_coord,
        },
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
