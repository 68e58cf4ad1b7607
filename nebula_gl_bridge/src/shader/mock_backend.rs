//! Recording backend for tests
//!
//! Remembers every call the registry makes so tests can assert on
//! submission counts, submitted source text, and reclamation.

use rustc_hash::FxHashMap;

use crate::caps::DriverCaps;
use crate::error::Result;
use crate::shader::backend::ShaderBackend;
use crate::shader::object::ShaderStage;

pub struct RecordingBackend {
    caps: DriverCaps,
    last_handle: u32,
    /// Last source submitted per handle
    pub sources: FxHashMap<u32, String>,
    /// Total `shader_source` calls
    pub source_submissions: u32,
    /// Total `compile_shader` calls
    pub compiles: u32,
    /// Handles passed to `delete_shader`, in order
    pub deleted: Vec<u32>,
    /// When set, every compile reports failure with this log
    pub fail_compile_with: Option<String>,
}

impl RecordingBackend {
    pub fn new(caps: DriverCaps) -> Self {
        Self {
            caps,
            last_handle: 0,
            sources: FxHashMap::default(),
            source_submissions: 0,
            compiles: 0,
            deleted: Vec::new(),
            fail_compile_with: None,
        }
    }

    pub fn es2() -> Self {
        Self::new(DriverCaps::es2())
    }
}

impl ShaderBackend for RecordingBackend {
    fn caps(&self) -> DriverCaps {
        self.caps
    }

    fn create_shader(&mut self, _stage: ShaderStage) -> Result<u32> {
        self.last_handle += 1;
        Ok(self.last_handle)
    }

    fn delete_shader(&mut self, handle: u32) {
        self.deleted.push(handle);
    }

    fn shader_source(&mut self, handle: u32, source: &str) {
        self.source_submissions += 1;
        self.sources.insert(handle, source.to_string());
    }

    fn compile_shader(&mut self, _handle: u32) {
        self.compiles += 1;
    }

    fn compile_status(&self, _handle: u32) -> bool {
        self.fail_compile_with.is_none()
    }

    fn info_log(&self, _handle: u32) -> String {
        self.fail_compile_with.clone().unwrap_or_default()
    }
}
