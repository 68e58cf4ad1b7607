//! Assembly-program translation module
//!
//! Scanner, parser, and the conversion entry point for legacy assembly
//! programs (`!!ARBvp1.0` / `!!ARBfp1.0`).

pub mod converter;
mod parser;
pub mod scanner;

pub use converter::{convert_assembly, AsmError, AsmOutput, SpecialCases};
