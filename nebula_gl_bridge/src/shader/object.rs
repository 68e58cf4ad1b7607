//! Shader object state
//!
//! One `ShaderObject` per live handle: stage, sources, translation results,
//! the capability-requirement vector, and the lifecycle flags the registry
//! keys deferred deletion on.

use crate::arb::SpecialCases;
use crate::error::{Error, Result};
use crate::glsl::{ShaderNeeds, UniformDecl};

/// GL enum for a vertex shader object
pub const GL_VERTEX_SHADER: u32 = 0x8B31;
/// GL enum for a fragment shader object
pub const GL_FRAGMENT_SHADER: u32 = 0x8B30;

/// Pipeline stage of a shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Validate a raw GL enum at the API boundary
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            GL_VERTEX_SHADER => Ok(ShaderStage::Vertex),
            GL_FRAGMENT_SHADER => Ok(ShaderStage::Fragment),
            other => Err(Error::InvalidEnum(format!(
                "0x{:04X} is not a shader type",
                other
            ))),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            ShaderStage::Vertex => GL_VERTEX_SHADER,
            ShaderStage::Fragment => GL_FRAGMENT_SHADER,
        }
    }
}

/// Queryable per-shader parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderParam {
    ShaderType,
    DeleteStatus,
    CompileStatus,
    InfoLogLength,
    SourceLength,
}

impl ShaderParam {
    /// Validate a raw GL enum at the API boundary
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0x8B4F => Ok(ShaderParam::ShaderType),
            0x8B80 => Ok(ShaderParam::DeleteStatus),
            0x8B81 => Ok(ShaderParam::CompileStatus),
            0x8B84 => Ok(ShaderParam::InfoLogLength),
            0x8B88 => Ok(ShaderParam::SourceLength),
            other => Err(Error::InvalidEnum(format!(
                "0x{:04X} is not a shader parameter",
                other
            ))),
        }
    }
}

/// Which conversion strategy produced the translated source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPath {
    /// Source submitted verbatim
    Direct,
    /// Conditional legacy rewrite (also the tail of the assembly path)
    LegacyRewrite,
    /// Version-aware downgrade to an ES dialect
    Downgraded,
}

/// State of one live shader handle
#[derive(Debug, Clone)]
pub struct ShaderObject {
    pub handle: u32,
    pub stage: ShaderStage,

    /// Source as the application supplied it
    pub source: Option<String>,
    /// Translated source last submitted to the driver
    pub converted: Option<String>,
    /// Failure message from a translation that did not produce source;
    /// surfaced through the info log and the compile status
    pub translation_error: Option<String>,

    pub path: Option<ConversionPath>,
    pub needs: ShaderNeeds,
    /// Special-case flags surfaced by the assembly converter
    pub special: SpecialCases,
    /// Uniforms synthesized by the downgrade strategy
    pub uniforms: Vec<UniformDecl>,

    /// Deletion was requested; the handle survives until the last detach
    pub deleted: bool,
    /// Number of programs this shader is currently attached to
    pub attach_count: u32,
    /// A compile was requested since the last source change
    pub compiled: bool,
}

impl ShaderObject {
    pub fn new(handle: u32, stage: ShaderStage) -> Self {
        Self {
            handle,
            stage,
            source: None,
            converted: None,
            translation_error: None,
            path: None,
            needs: ShaderNeeds::default(),
            special: SpecialCases::default(),
            uniforms: Vec::new(),
            deleted: false,
            attach_count: 0,
            compiled: false,
        }
    }
}
