//! Driver-side shader backend
//!
//! The registry never talks to a driver directly; it goes through this
//! trait. The production implementation wraps the real context, the null
//! backend stands in when no shading compiler exists, and tests use a
//! recording implementation.

use crate::caps::DriverCaps;
use crate::error::{Error, Result};
use crate::shader::object::ShaderStage;

/// The driver operations the shader registry depends on
pub trait ShaderBackend {
    /// Capabilities of the underlying driver
    fn caps(&self) -> DriverCaps;

    /// Create a driver-side shader object, returning its handle
    fn create_shader(&mut self, stage: ShaderStage) -> Result<u32>;

    /// Destroy a driver-side shader object
    fn delete_shader(&mut self, handle: u32);

    /// Submit translated source for a shader
    fn shader_source(&mut self, handle: u32, source: &str);

    /// Ask the driver to compile a shader
    fn compile_shader(&mut self, handle: u32);

    /// Compile status of the last `compile_shader` call
    fn compile_status(&self, handle: u32) -> bool;

    /// Driver diagnostics for a shader
    fn info_log(&self, handle: u32) -> String;
}

/// Backend for drivers with no shading compiler at all.
///
/// Hands out monotonically increasing handles so object bookkeeping still
/// works; every compile degrades to a stub that reports failure.
pub struct NullBackend {
    last_handle: u32,
}

impl NullBackend {
    pub fn new() -> Self {
        Self { last_handle: 0 }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderBackend for NullBackend {
    fn caps(&self) -> DriverCaps {
        DriverCaps::software()
    }

    fn create_shader(&mut self, _stage: ShaderStage) -> Result<u32> {
        self.last_handle = self
            .last_handle
            .checked_add(1)
            .ok_or_else(|| Error::BackendError("shader handles exhausted".to_string()))?;
        Ok(self.last_handle)
    }

    fn delete_shader(&mut self, _handle: u32) {}

    fn shader_source(&mut self, _handle: u32, _source: &str) {}

    fn compile_shader(&mut self, _handle: u32) {}

    fn compile_status(&self, _handle: u32) -> bool {
        false
    }

    fn info_log(&self, _handle: u32) -> String {
        String::new()
    }
}
