//! Shader object registry
//!
//! Owns the handle-to-object map and every shader entry point: creation,
//! source upload (with translation), compilation, queries, deferred
//! deletion, and the link-time needs aggregation/reconciliation the program
//! layer drives.
//!
//! Deletion is deferred: a deleted shader stays alive while any program
//! holds an attachment, and the driver-side object is reclaimed exactly
//! once, when the deleted flag is set and the attach count reaches zero.

use rustc_hash::FxHashMap;

use crate::arb::{convert_assembly, SpecialCases};
use crate::bridge_debug;
use crate::bridge_warn;
use crate::caps::DriverCaps;
use crate::error::{Error, Result};
use crate::glsl::{convert, rewrite, Conversion, ShaderNeeds, UniformDecl};
use crate::shader::backend::ShaderBackend;
use crate::shader::object::{ConversionPath, ShaderObject, ShaderParam, ShaderStage};

/// Fixed info log reported when the driver has no shading compiler
pub const NO_GLSL_SUPPORT: &str = "No Shader support with current backend";

const LOG_SOURCE: &str = "nebula::ShaderRegistry";

/// Everything a successful translation produces
struct Translation {
    converted: String,
    path: ConversionPath,
    needs: ShaderNeeds,
    special: SpecialCases,
    uniforms: Vec<UniformDecl>,
}

/// Registry of live shader objects on top of a driver backend
pub struct ShaderRegistry<B: ShaderBackend> {
    backend: B,
    /// Driver capabilities, queried once at construction
    caps: DriverCaps,
    shaders: FxHashMap<u32, ShaderObject>,
}

impl<B: ShaderBackend> ShaderRegistry<B> {
    pub fn new(backend: B) -> Self {
        let caps = backend.caps();
        Self {
            backend,
            caps,
            shaders: FxHashMap::default(),
        }
    }

    pub fn caps(&self) -> &DriverCaps {
        &self.caps
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Immutable view of a shader object, if the handle is live
    pub fn shader(&self, handle: u32) -> Option<&ShaderObject> {
        self.shaders.get(&handle)
    }

    fn get(&self, handle: u32) -> Result<&ShaderObject> {
        self.shaders
            .get(&handle)
            .ok_or_else(|| Error::InvalidOperation(format!("{} is not a shader", handle)))
    }

    fn get_mut(&mut self, handle: u32) -> Result<&mut ShaderObject> {
        self.shaders
            .get_mut(&handle)
            .ok_or_else(|| Error::InvalidOperation(format!("{} is not a shader", handle)))
    }

    // ===== lifecycle =====

    /// Create a shader object for `stage`, returning its handle
    pub fn create(&mut self, stage: ShaderStage) -> Result<u32> {
        let handle = self.backend.create_shader(stage)?;
        self.shaders.insert(handle, ShaderObject::new(handle, stage));
        bridge_debug!(LOG_SOURCE, "created shader {} ({:?})", handle, stage);
        Ok(handle)
    }

    /// `create` with the raw GL enum validated at the boundary
    pub fn create_raw(&mut self, shader_type: u32) -> Result<u32> {
        self.create(ShaderStage::from_raw(shader_type)?)
    }

    /// Whether `handle` names a live shader object
    pub fn is_shader(&self, handle: u32) -> bool {
        self.shaders.contains_key(&handle)
    }

    /// Request deletion. The object is reclaimed immediately when detached,
    /// otherwise it is flagged and survives until the last detach.
    pub fn delete(&mut self, handle: u32) -> Result<()> {
        let shader = self
            .shaders
            .get_mut(&handle)
            .ok_or_else(|| Error::InvalidValue(format!("{} is not a shader", handle)))?;
        if shader.attach_count > 0 {
            shader.deleted = true;
            bridge_debug!(
                LOG_SOURCE,
                "shader {} deletion deferred ({} attachments)",
                handle,
                shader.attach_count
            );
            return Ok(());
        }
        self.reclaim(handle);
        Ok(())
    }

    /// Record an attachment to a program
    pub fn attach(&mut self, handle: u32) -> Result<()> {
        let shader = self.get_mut(handle)?;
        shader.attach_count += 1;
        Ok(())
    }

    /// Record a detachment; reclaims the object when it was the last
    /// attachment of a deleted shader.
    pub fn detach(&mut self, handle: u32) -> Result<()> {
        let shader = self.get_mut(handle)?;
        if shader.attach_count == 0 {
            return Err(Error::InvalidOperation(format!(
                "shader {} is not attached",
                handle
            )));
        }
        shader.attach_count -= 1;
        if shader.deleted && shader.attach_count == 0 {
            self.reclaim(handle);
        }
        Ok(())
    }

    fn reclaim(&mut self, handle: u32) {
        self.shaders.remove(&handle);
        self.backend.delete_shader(handle);
        bridge_debug!(LOG_SOURCE, "shader {} reclaimed", handle);
    }

    // ===== source and compilation =====

    /// Replace the source of a shader from the multi-string GL form.
    ///
    /// `lengths` mirrors the GL API: when present, a non-negative entry
    /// bounds the matching string (clamped to a character boundary), and a
    /// negative entry means the whole string. Translation runs immediately;
    /// a translation failure is not an error here, it surfaces later
    /// through the compile status and the info log.
    pub fn set_source(
        &mut self,
        handle: u32,
        strings: &[&str],
        lengths: Option<&[i32]>,
    ) -> Result<()> {
        if strings.is_empty() {
            return Err(Error::InvalidValue(
                "shader source requires at least one string".to_string(),
            ));
        }
        if let Some(lengths) = lengths {
            if lengths.len() != strings.len() {
                return Err(Error::InvalidValue(
                    "length array does not match the string array".to_string(),
                ));
            }
        }

        let mut source = String::new();
        for (i, fragment) in strings.iter().enumerate() {
            let bounded = match lengths.and_then(|l| l.get(i)) {
                Some(&len) if len >= 0 => truncate_at_boundary(fragment, len as usize),
                _ => fragment,
            };
            source.push_str(bounded);
        }

        // Existence check before any mutation
        self.get(handle)?;
        self.translate_and_store(handle, source, None)
    }

    /// Compile the shader. With no compiler, or after a failed translation,
    /// the request is recorded and the failure shows up in the status query.
    pub fn compile(&mut self, handle: u32) -> Result<()> {
        let has_compiler = self.caps.has_compiler;
        let shader = self.get_mut(handle)?;
        shader.compiled = true;
        if !has_compiler {
            bridge_debug!(LOG_SOURCE, "compile of shader {} ignored, no compiler", handle);
            return Ok(());
        }
        if shader.translation_error.is_some() || shader.converted.is_none() {
            return Ok(());
        }
        self.backend.compile_shader(handle);
        if !self.backend.compile_status(handle) {
            let shader = self.get(handle)?;
            bridge_warn!(
                LOG_SOURCE,
                "shader {} failed to compile: {}\n--- submitted source ---\n{}\n--- original source ---\n{}",
                handle,
                self.backend.info_log(handle),
                shader.converted.as_deref().unwrap_or(""),
                shader.source.as_deref().unwrap_or("")
            );
        }
        Ok(())
    }

    /// Translate `source` for `handle` with an optional aggregate-needs
    /// injection hint, store the results, and submit to the driver.
    fn translate_and_store(
        &mut self,
        handle: u32,
        source: String,
        hint: Option<&ShaderNeeds>,
    ) -> Result<()> {
        let caps = self.caps;
        let stage = self.get(handle)?.stage;

        if !caps.has_compiler {
            let shader = self.get_mut(handle)?;
            shader.source = Some(source);
            shader.converted = None;
            shader.translation_error = None;
            shader.path = None;
            shader.compiled = false;
            return Ok(());
        }

        match translate(&source, stage, &caps, hint) {
            Ok(translation) => {
                self.backend.shader_source(handle, &translation.converted);
                let shader = self.get_mut(handle)?;
                shader.source = Some(source);
                shader.converted = Some(translation.converted);
                shader.translation_error = None;
                shader.path = Some(translation.path);
                shader.needs = translation.needs;
                shader.special = translation.special;
                shader.uniforms = translation.uniforms;
                shader.compiled = false;
                bridge_debug!(
                    LOG_SOURCE,
                    "shader {} translated via {:?}",
                    handle,
                    translation.path
                );
            }
            Err(message) => {
                bridge_warn!(LOG_SOURCE, "shader {}: {}", handle, message);
                let shader = self.get_mut(handle)?;
                shader.source = Some(source);
                shader.converted = None;
                shader.translation_error = Some(message);
                shader.path = None;
                shader.needs = ShaderNeeds::default();
                shader.special = SpecialCases::default();
                shader.uniforms = Vec::new();
                shader.compiled = false;
            }
        }
        Ok(())
    }

    // ===== queries =====

    /// Original source, truncated to fit a caller buffer of `buf_size`
    /// bytes (one of which the GL contract reserves for the terminator).
    pub fn get_source(&self, handle: u32, buf_size: usize) -> Result<String> {
        if buf_size == 0 {
            return Err(Error::InvalidOperation(
                "zero-sized buffer for shader source".to_string(),
            ));
        }
        let shader = self.get(handle)?;
        let source = shader.source.as_deref().unwrap_or("");
        Ok(truncate_at_boundary(source, buf_size - 1).to_string())
    }

    /// Info log of a shader: the fixed stub line without a compiler, a
    /// translation failure message when one is stored, otherwise whatever
    /// the driver reports.
    pub fn info_log(&self, handle: u32) -> Result<String> {
        let shader = self.get(handle)?;
        if !self.caps.has_compiler {
            return Ok(NO_GLSL_SUPPORT.to_string());
        }
        if let Some(message) = &shader.translation_error {
            return Ok(message.clone());
        }
        Ok(self.backend.info_log(handle))
    }

    /// Scalar parameter queries, GL-style
    pub fn get_parameter(&self, handle: u32, param: ShaderParam) -> Result<i32> {
        let shader = self.get(handle)?;
        let value = match param {
            ShaderParam::ShaderType => shader.stage.raw() as i32,
            ShaderParam::DeleteStatus => shader.deleted as i32,
            ShaderParam::CompileStatus => {
                let ok = self.caps.has_compiler
                    && shader.translation_error.is_none()
                    && shader.compiled
                    && self.backend.compile_status(handle);
                ok as i32
            }
            ShaderParam::InfoLogLength => {
                // The no-compiler stub log is reported without a terminator;
                // only driver-produced logs count one
                if !self.caps.has_compiler {
                    NO_GLSL_SUPPORT.len() as i32
                } else {
                    let log = self.info_log(handle)?;
                    if log.is_empty() {
                        0
                    } else {
                        log.len() as i32 + 1
                    }
                }
            }
            ShaderParam::SourceLength => match &shader.source {
                // Length includes the terminator, per the GL contract
                Some(source) => source.len() as i32 + 1,
                None => 0,
            },
        };
        Ok(value)
    }

    // ===== link-time needs plumbing =====

    /// Fold the requirement vector of `handle` into `aggregate`.
    ///
    /// An object with no translated source has no vector to contribute and
    /// leaves the aggregate untouched.
    pub fn accumulate_needs(&self, aggregate: &mut ShaderNeeds, handle: u32) -> Result<()> {
        let shader = self.get(handle)?;
        if shader.converted.is_none() {
            return Ok(());
        }
        aggregate.accumulate(&shader.needs);
        Ok(())
    }

    /// Whether the shader tolerates everything `demanded` requires.
    /// Always false for an object with no translated source.
    pub fn is_compatible(&self, handle: u32, demanded: &ShaderNeeds) -> Result<bool> {
        let shader = self.get(handle)?;
        if shader.converted.is_none() {
            return Ok(false);
        }
        Ok(shader.needs.allows(demanded))
    }

    /// Bring the shader in line with an aggregate requirement vector.
    ///
    /// A vector identical to the stored one is a no-op. Otherwise the
    /// original source is re-translated with the vector as the injection
    /// hint, resubmitted to the driver, and the compiled flag cleared;
    /// recompiling is the caller's move. Returns whether a re-translation
    /// happened.
    pub fn reconcile(&mut self, handle: u32, demanded: &ShaderNeeds) -> Result<bool> {
        let shader = self.get(handle)?;
        if shader.needs == *demanded {
            return Ok(false);
        }
        let source = match &shader.source {
            Some(source) => source.clone(),
            None => {
                return Err(Error::InvalidOperation(format!(
                    "shader {} has no source to reconcile",
                    handle
                )))
            }
        };
        bridge_debug!(LOG_SOURCE, "reconciling shader {} with new needs", handle);
        self.translate_and_store(handle, source, Some(demanded))?;
        let shader = self.get_mut(handle)?;
        shader.needs = *demanded;
        Ok(true)
    }
}

// ============================================================================
// Translation pipeline
// ============================================================================

/// Full translation of one source: the assembly path chains into the
/// legacy rewrite, plain shading-language sources go through strategy
/// selection.
fn translate(
    source: &str,
    stage: ShaderStage,
    caps: &DriverCaps,
    hint: Option<&ShaderNeeds>,
) -> std::result::Result<Translation, String> {
    if source.trim_start().starts_with("!!ARB") {
        let asm = convert_assembly(source, stage == ShaderStage::Vertex)
            .map_err(|e| format!("assembly conversion failed: {}", e))?;
        let (converted, needs) = rewrite(&asm.glsl, stage, caps, hint);
        return Ok(Translation {
            converted,
            path: ConversionPath::LegacyRewrite,
            needs,
            special: asm.special,
            uniforms: Vec::new(),
        });
    }

    let translation = match convert(source, stage, caps, hint) {
        Conversion::Direct { source } => Translation {
            converted: source,
            path: ConversionPath::Direct,
            needs: ShaderNeeds::default(),
            special: SpecialCases::default(),
            uniforms: Vec::new(),
        },
        Conversion::Rewritten { source, needs } => Translation {
            converted: source,
            path: ConversionPath::LegacyRewrite,
            needs,
            special: SpecialCases::default(),
            uniforms: Vec::new(),
        },
        Conversion::Downgraded {
            source,
            needs,
            uniforms,
        } => Translation {
            converted: source,
            path: ConversionPath::Downgraded,
            needs,
            special: SpecialCases::default(),
            uniforms,
        },
        Conversion::Failed => return Err("no conversion strategy accepted the source".to_string()),
    };
    Ok(translation)
}

/// Truncate to at most `max` bytes without splitting a character
fn truncate_at_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
