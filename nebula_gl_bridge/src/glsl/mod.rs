//! GLSL dialect conversion module
//!
//! Version detection, dialect rewriting, and the capability-requirement
//! vector computed alongside every conversion.

pub mod dialect;
pub mod needs;

pub use dialect::{convert, rewrite, try_downgrade, Conversion, GlslVersion, UniformDecl};
pub use needs::{ShaderNeeds, TexUnits, UNCONSTRAINED};
