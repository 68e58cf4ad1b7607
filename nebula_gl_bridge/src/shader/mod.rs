//! Shader object subsystem
//!
//! Handle-based registry of shader objects over a pluggable driver
//! backend: translation on source upload, deferred deletion, and the
//! link-time requirement-vector plumbing.

pub mod backend;
#[cfg(test)]
pub mod mock_backend;
pub mod object;
pub mod registry;

pub use backend::{NullBackend, ShaderBackend};
pub use object::{ConversionPath, ShaderObject, ShaderParam, ShaderStage};
pub use registry::{ShaderRegistry, NO_GLSL_SUPPORT};
