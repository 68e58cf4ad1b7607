//! GLSL dialect conversion
//!
//! Rewrites shading-language source from one version/profile into a dialect
//! the underlying driver accepts, and computes the capability-requirement
//! vector of the rewritten body.
//!
//! Three strategies exist, selected by the detected source version and the
//! driver capabilities:
//!
//! - **Direct** pass-through when the driver accepts the source verbatim
//! - **Downgraded**: version-aware rewriting of desktop GLSL (>= 140) to
//!   `#version 300 es`, synthesizing uniforms for removed builtins
//! - **Rewritten**: the conditional legacy rewrite used for everything else
//!   (and as the fallback when the downgrade strategy cannot cope)
//!
//! Synthesized identifiers all carry the `ngl_` prefix so they never collide
//! with user declarations or with builtins of the target dialect.

use crate::caps::DriverCaps;
use crate::glsl::needs::{ShaderNeeds, TexUnits};
use crate::shader::object::ShaderStage;

/// A GLSL `#version` number (110, 120, 140, 330, 100, 300...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlslVersion(pub u16);

impl GlslVersion {
    /// Sources with no version directive, or below the support threshold,
    /// are treated as the oldest supported desktop dialect.
    pub const OLDEST: GlslVersion = GlslVersion(110);

    /// Inspect the leading `#version` directive of `source`
    pub fn detect(source: &str) -> GlslVersion {
        for line in source.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(rest) = line.strip_prefix("#version") {
                let digits: String = rest
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                if let Ok(v) = digits.parse::<u16>() {
                    if v >= 100 {
                        return GlslVersion(v);
                    }
                }
            }
            break;
        }
        GlslVersion::OLDEST
    }
}

/// A uniform declaration synthesized to replace a removed builtin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    /// Synthesized uniform name (`ngl_` prefix)
    pub name: String,
    /// GLSL type of the uniform
    pub glsl_type: &'static str,
}

/// Outcome of a dialect conversion
#[derive(Debug, Clone)]
pub enum Conversion {
    /// The driver accepts the source verbatim
    Direct {
        /// Unmodified source
        source: String,
    },
    /// Conditional legacy rewrite
    Rewritten {
        /// Rewritten source
        source: String,
        /// Requirement vector of the rewritten body
        needs: ShaderNeeds,
    },
    /// Version-aware downgrade to an ES dialect
    Downgraded {
        /// Rewritten source
        source: String,
        /// Requirement vector of the rewritten body
        needs: ShaderNeeds,
        /// Uniforms synthesized to replace removed builtins
        uniforms: Vec<UniformDecl>,
    },
    /// The version-aware strategy cannot express this source; the caller
    /// falls back to the conditional rewrite
    Failed,
}

/// Convert `source` into the dialect the driver accepts.
///
/// Selects the strategy from the detected version and the driver caps, and
/// falls back from a failed downgrade to the conditional rewrite, so the
/// result is never `Conversion::Failed`.
pub fn convert(
    source: &str,
    stage: ShaderStage,
    caps: &DriverCaps,
    hint: Option<&ShaderNeeds>,
) -> Conversion {
    if caps.accepts_verbatim(source) {
        return Conversion::Direct {
            source: source.to_string(),
        };
    }
    let version = GlslVersion::detect(source);
    if version >= GlslVersion(140) && caps.essl_version >= 300 {
        match try_downgrade(source, stage) {
            Conversion::Failed => {}
            done => return done,
        }
    }
    let (rewritten, needs) = rewrite(source, stage, caps, hint);
    Conversion::Rewritten {
        source: rewritten,
        needs,
    }
}

/// Constructs the ES dialects cannot express at all; their presence makes
/// the version-aware strategy bail out.
const UNSUPPORTED_IN_ES: &[&str] = &[
    "double",
    "dvec2",
    "dvec3",
    "dvec4",
    "dmat4",
    "subroutine",
    "sampler2DMS",
    "sampler1D",
    "gl_ClipDistance",
    "gl_PrimitiveID",
];

/// Version-aware downgrade of desktop GLSL (>= 140) to `#version 300 es`.
///
/// Returns `Conversion::Failed` when the source uses constructs the target
/// dialect cannot express; the caller then falls back to `rewrite`.
pub fn try_downgrade(source: &str, stage: ShaderStage) -> Conversion {
    for word in UNSUPPORTED_IN_ES {
        if count_word(source, word) > 0 {
            return Conversion::Failed;
        }
    }
    let mut rw = Rewriter::new(stage, true, None);
    let converted = rw.run(source);
    Conversion::Downgraded {
        source: converted,
        needs: rw.needs,
        uniforms: rw.uniforms,
    }
}

/// Conditional legacy rewrite.
///
/// Renames deprecated builtins to synthesized `ngl_` declarations, injects
/// precision qualifiers, and honors the aggregate-needs `hint` by
/// force-declaring demanded varyings with vertex-side pass-through
/// statements. Never fails; unknown constructs pass through untouched for
/// the driver to judge.
pub fn rewrite(
    source: &str,
    stage: ShaderStage,
    caps: &DriverCaps,
    hint: Option<&ShaderNeeds>,
) -> (String, ShaderNeeds) {
    let essl3 = caps.essl_version >= 300 && GlslVersion::detect(source) >= GlslVersion(300);
    let mut rw = Rewriter::new(stage, essl3, hint);
    let converted = rw.run(source);
    (converted, rw.needs)
}

// ============================================================================
// Builtin replacement tables
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Attribute,
    Uniform,
    Varying,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NeedKind {
    None,
    Color,
    Secondary,
    FogCoord,
    NormalMatrix,
    MvMatrix,
    MvpMatrix,
    ClipVertex,
}

struct Builtin {
    name: &'static str,
    replacement: &'static str,
    glsl_type: &'static str,
    kind: DeclKind,
    need: NeedKind,
}

const fn b(
    name: &'static str,
    replacement: &'static str,
    glsl_type: &'static str,
    kind: DeclKind,
    need: NeedKind,
) -> Builtin {
    Builtin {
        name,
        replacement,
        glsl_type,
        kind,
        need,
    }
}

const VERTEX_BUILTINS: &[Builtin] = &[
    b("gl_Vertex", "ngl_Vertex", "vec4", DeclKind::Attribute, NeedKind::None),
    b("gl_Normal", "ngl_Normal", "vec3", DeclKind::Attribute, NeedKind::None),
    b("gl_Color", "ngl_Color", "vec4", DeclKind::Attribute, NeedKind::Color),
    b("gl_SecondaryColor", "ngl_SecondaryColor", "vec4", DeclKind::Attribute, NeedKind::Secondary),
    b("gl_FogCoord", "ngl_FogCoord", "float", DeclKind::Attribute, NeedKind::FogCoord),
    b("gl_ModelViewProjectionMatrix", "ngl_ModelViewProjectionMatrix", "mat4", DeclKind::Uniform, NeedKind::MvpMatrix),
    b("gl_ModelViewMatrix", "ngl_ModelViewMatrix", "mat4", DeclKind::Uniform, NeedKind::MvMatrix),
    b("gl_ProjectionMatrix", "ngl_ProjectionMatrix", "mat4", DeclKind::Uniform, NeedKind::None),
    b("gl_NormalMatrix", "ngl_NormalMatrix", "mat3", DeclKind::Uniform, NeedKind::NormalMatrix),
    b("gl_FrontColor", "ngl_FrontColor", "vec4", DeclKind::Varying, NeedKind::Color),
    b("gl_FrontSecondaryColor", "ngl_FrontSecondaryColor", "vec4", DeclKind::Varying, NeedKind::Secondary),
    b("gl_FogFragCoord", "ngl_FogFragCoord", "float", DeclKind::Varying, NeedKind::FogCoord),
    b("gl_ClipVertex", "ngl_ClipVertex", "vec4", DeclKind::Global, NeedKind::ClipVertex),
];

const FRAGMENT_BUILTINS: &[Builtin] = &[
    b("gl_Color", "ngl_FrontColor", "vec4", DeclKind::Varying, NeedKind::Color),
    b("gl_SecondaryColor", "ngl_FrontSecondaryColor", "vec4", DeclKind::Varying, NeedKind::Secondary),
    b("gl_FogFragCoord", "ngl_FogFragCoord", "float", DeclKind::Varying, NeedKind::FogCoord),
    b("gl_ModelViewProjectionMatrix", "ngl_ModelViewProjectionMatrix", "mat4", DeclKind::Uniform, NeedKind::MvpMatrix),
    b("gl_ModelViewMatrix", "ngl_ModelViewMatrix", "mat4", DeclKind::Uniform, NeedKind::MvMatrix),
    b("gl_ProjectionMatrix", "ngl_ProjectionMatrix", "mat4", DeclKind::Uniform, NeedKind::None),
    b("gl_NormalMatrix", "ngl_NormalMatrix", "mat3", DeclKind::Uniform, NeedKind::NormalMatrix),
];

/// Texture-array sampler types; their absence sets the `no_tex_array` flag
const TEX_ARRAY_SAMPLERS: &[&str] = &["sampler2DArray", "samplerCubeArray", "sampler2DMSArray"];

// ============================================================================
// Rewriter
// ============================================================================

/// One rewriting pass over a shader source.
///
/// Shared by the conditional-rewrite and version-aware strategies; the
/// `essl3` flag selects the target dialect (declaration syntax, fragment
/// output handling, texture function names).
struct Rewriter<'a> {
    stage: ShaderStage,
    essl3: bool,
    hint: Option<&'a ShaderNeeds>,
    needs: ShaderNeeds,
    uniforms: Vec<UniformDecl>,
    decls: Vec<String>,
    /// Texture-coordinate sets the body itself references
    used_units: TexUnits,
    /// Minimum `ngl_TexCoord` array size demanded so far
    texcoord_count: usize,
    replaced: usize,
    injected: Vec<String>,
}

impl<'a> Rewriter<'a> {
    fn new(stage: ShaderStage, essl3: bool, hint: Option<&'a ShaderNeeds>) -> Self {
        Self {
            stage,
            essl3,
            hint,
            needs: ShaderNeeds::default(),
            uniforms: Vec::new(),
            decls: Vec::new(),
            used_units: TexUnits::empty(),
            texcoord_count: 0,
            replaced: 0,
            injected: Vec::new(),
        }
    }

    fn run(&mut self, source: &str) -> String {
        let (_, mut body) = strip_version(source);

        self.replace_builtins(&mut body);
        self.replace_texcoords(&mut body);
        self.rewrite_outputs(&mut body);
        if self.essl3 {
            self.translate_syntax(&mut body);
        }
        self.apply_hint(&mut body);

        if !self.injected.is_empty() {
            let stmts: String = self.injected.concat();
            inject_before_final_brace(&mut body, &stmts);
        }

        self.needs.no_tex_array = if TEX_ARRAY_SAMPLERS
            .iter()
            .any(|s| count_word(source, s) > 0)
        {
            0
        } else {
            1
        };
        self.needs.clean =
            if self.replaced == 0 && self.decls.is_empty() && self.injected.is_empty() {
                1
            } else {
                0
            };

        self.assemble(&body)
    }

    fn record_need(&mut self, need: NeedKind) {
        match need {
            NeedKind::None => {}
            NeedKind::Color => self.needs.color = 1,
            NeedKind::Secondary => self.needs.secondary = 1,
            NeedKind::FogCoord => self.needs.fogcoord = 1,
            NeedKind::NormalMatrix => self.needs.normal_matrix = 1,
            NeedKind::MvMatrix => self.needs.mv_matrix = 1,
            NeedKind::MvpMatrix => self.needs.mvp_matrix = 1,
            NeedKind::ClipVertex => self.needs.clip_vertex = 1,
        }
    }

    fn push_decl(&mut self, builtin: &Builtin) {
        let keyword = match (builtin.kind, self.essl3, self.stage) {
            (DeclKind::Attribute, false, _) => "attribute",
            (DeclKind::Attribute, true, _) => "in",
            (DeclKind::Uniform, _, _) => "uniform",
            (DeclKind::Varying, false, _) => "varying",
            (DeclKind::Varying, true, ShaderStage::Vertex) => "out",
            (DeclKind::Varying, true, ShaderStage::Fragment) => "in",
            // Assignable scratch global, consumed by the fixed-function layer
            (DeclKind::Global, _, _) => "",
        };
        let line = if keyword.is_empty() {
            format!("{} {};\n", builtin.glsl_type, builtin.replacement)
        } else {
            format!("{} {} {};\n", keyword, builtin.glsl_type, builtin.replacement)
        };
        if !self.decls.contains(&line) {
            self.decls.push(line);
        }
        if builtin.kind == DeclKind::Uniform {
            self.uniforms.push(UniformDecl {
                name: builtin.replacement.to_string(),
                glsl_type: builtin.glsl_type,
            });
        }
    }

    fn replace_builtins(&mut self, body: &mut String) {
        let table = match self.stage {
            ShaderStage::Vertex => VERTEX_BUILTINS,
            ShaderStage::Fragment => FRAGMENT_BUILTINS,
        };
        for builtin in table {
            let (out, count) = replace_word(body, builtin.name, builtin.replacement);
            if count > 0 {
                *body = out;
                self.replaced += count;
                self.record_need(builtin.need);
                self.push_decl(builtin);
            }
        }
    }

    /// `gl_MultiTexCoordN` attributes and the `gl_TexCoord[]` varying array
    fn replace_texcoords(&mut self, body: &mut String) {
        if self.stage == ShaderStage::Vertex {
            for unit in 0..8u32 {
                let name = format!("gl_MultiTexCoord{}", unit);
                let replacement = format!("ngl_MultiTexCoord{}", unit);
                let (out, count) = replace_word(body, &name, &replacement);
                if count > 0 {
                    *body = out;
                    self.replaced += count;
                    self.used_units |= TexUnits::unit(unit);
                    let keyword = if self.essl3 { "in" } else { "attribute" };
                    self.decls.push(format!("{} vec4 {};\n", keyword, replacement));
                }
            }
        }

        let (units, count, dynamic) = texcoord_indices(body);
        if count > 0 || dynamic {
            let (out, replaced) = replace_word(body, "gl_TexCoord", "ngl_TexCoord");
            *body = out;
            self.replaced += replaced;
            if dynamic {
                // Dynamic indexing: assume the full set is live
                self.used_units = TexUnits::from_bits_retain(0xff);
                self.texcoord_count = self.texcoord_count.max(8);
            } else {
                self.used_units |= units;
                self.texcoord_count = self.texcoord_count.max(count);
            }
        }

        if !self.used_units.is_empty() {
            self.needs.tex_units |= self.used_units;
            let highest = 32 - self.used_units.bits().leading_zeros() as usize;
            self.texcoord_count = self.texcoord_count.max(highest);
            self.needs.texcoord = self.texcoord_count as i32;
        }
    }

    /// Fragment output variables (`gl_FragColor`/`gl_FragData`/`gl_FragDepth`)
    fn rewrite_outputs(&mut self, body: &mut String) {
        if self.stage != ShaderStage::Fragment {
            return;
        }
        if body.contains("gl_FragData[0]") {
            *body = body.replace("gl_FragData[0]", "gl_FragColor");
            self.replaced += 1;
        }
        if self.essl3 {
            let (out, count) = replace_word(body, "gl_FragColor", "ngl_FragColor");
            if count > 0 {
                *body = out;
                self.replaced += count;
                self.decls.push("out vec4 ngl_FragColor;\n".to_string());
            }
        } else if count_word(body, "gl_FragDepth") > 0 {
            // ESSL 100 only exposes depth replacement through the extension
            let (out, count) = replace_word(body, "gl_FragDepth", "gl_FragDepthEXT");
            *body = out;
            self.replaced += count;
            self.decls
                .insert(0, "#extension GL_EXT_frag_depth : enable\n".to_string());
        }
    }

    /// Declaration-syntax and texture-function renames for the ESSL3 target
    fn translate_syntax(&mut self, body: &mut String) {
        let varying_to = match self.stage {
            ShaderStage::Vertex => "out",
            ShaderStage::Fragment => "in",
        };
        for (from, to) in [
            ("attribute", "in"),
            ("varying", varying_to),
            ("texture2DProj", "textureProj"),
            ("texture2D", "texture"),
            ("texture3D", "texture"),
            ("textureCube", "texture"),
        ] {
            let (out, count) = replace_word(body, from, to);
            if count > 0 {
                *body = out;
                self.replaced += count;
            }
        }
    }

    /// Honor the aggregate pipeline needs: force-declare demanded varyings
    /// and pass the matching attribute through on the vertex side.
    fn apply_hint(&mut self, _body: &mut String) {
        let hint = match self.hint {
            Some(hint) if self.stage == ShaderStage::Vertex => *hint,
            _ => return,
        };
        let (attr_kw, vary_kw) = if self.essl3 {
            ("in", "out")
        } else {
            ("attribute", "varying")
        };

        if hint.color > 0 && self.needs.color == 0 {
            self.force_decl(format!("{} vec4 ngl_Color;\n", attr_kw));
            self.force_decl(format!("{} vec4 ngl_FrontColor;\n", vary_kw));
            self.injected.push("    ngl_FrontColor = ngl_Color;\n".to_string());
            self.needs.color = hint.color;
        }
        if hint.secondary > 0 && self.needs.secondary == 0 {
            self.force_decl(format!("{} vec4 ngl_SecondaryColor;\n", attr_kw));
            self.force_decl(format!("{} vec4 ngl_FrontSecondaryColor;\n", vary_kw));
            self.injected
                .push("    ngl_FrontSecondaryColor = ngl_SecondaryColor;\n".to_string());
            self.needs.secondary = hint.secondary;
        }
        if hint.fogcoord > 0 && self.needs.fogcoord == 0 {
            self.force_decl(format!("{} float ngl_FogCoord;\n", attr_kw));
            self.force_decl(format!("{} float ngl_FogFragCoord;\n", vary_kw));
            self.injected
                .push("    ngl_FogFragCoord = ngl_FogCoord;\n".to_string());
            self.needs.fogcoord = hint.fogcoord;
        }
        // `difference` keeps unit bits the complement operator would drop
        let missing = hint.tex_units.difference(self.needs.tex_units);
        if !missing.is_empty() {
            for unit in 0..8u32 {
                if !missing.contains(TexUnits::unit(unit)) {
                    continue;
                }
                self.force_decl(format!("{} vec4 ngl_MultiTexCoord{};\n", attr_kw, unit));
                self.injected.push(format!(
                    "    ngl_TexCoord[{}] = ngl_MultiTexCoord{};\n",
                    unit, unit
                ));
                self.texcoord_count = self.texcoord_count.max(unit as usize + 1);
            }
            self.needs.tex_units |= missing;
            self.needs.texcoord = self.needs.texcoord.max(self.texcoord_count as i32);
        }
    }

    fn force_decl(&mut self, line: String) {
        if !self.decls.contains(&line) {
            self.decls.push(line);
        }
    }

    fn assemble(&mut self, body: &str) -> String {
        let mut out = String::with_capacity(body.len() + 256);
        if self.essl3 {
            out.push_str("#version 300 es\n");
        } else {
            out.push_str("#version 100\n");
        }
        if self.stage == ShaderStage::Fragment && !body.contains("precision ") {
            out.push_str("#ifdef GL_FRAGMENT_PRECISION_HIGH\n");
            out.push_str("precision highp float;\n");
            out.push_str("#else\n");
            out.push_str("precision mediump float;\n");
            out.push_str("#endif\n");
        }
        for decl in &self.decls {
            out.push_str(decl);
        }
        if self.texcoord_count > 0 {
            let keyword = match (self.essl3, self.stage) {
                (false, _) => "varying",
                (true, ShaderStage::Vertex) => "out",
                (true, ShaderStage::Fragment) => "in",
            };
            out.push_str(&format!(
                "{} vec4 ngl_TexCoord[{}];\n",
                keyword, self.texcoord_count
            ));
        }
        out.push_str(body);
        out
    }
}

// ============================================================================
// Text helpers
// ============================================================================

fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Replace whole-word occurrences of `from` with `to`, returning the new
/// string and the number of replacements.
fn replace_word(src: &str, from: &str, to: &str) -> (String, usize) {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    let mut count = 0;
    while let Some(pos) = src[i..].find(from) {
        let start = i + pos;
        let end = start + from.len();
        out.push_str(&src[i..start]);
        let boundary = (start == 0 || !is_ident_byte(bytes[start - 1]))
            && (end == bytes.len() || !is_ident_byte(bytes[end]));
        if boundary {
            out.push_str(to);
            count += 1;
        } else {
            out.push_str(from);
        }
        i = end;
    }
    out.push_str(&src[i..]);
    (out, count)
}

/// Count whole-word occurrences of `word` in `src`
fn count_word(src: &str, word: &str) -> usize {
    let bytes = src.as_bytes();
    let mut i = 0;
    let mut count = 0;
    while let Some(pos) = src[i..].find(word) {
        let start = i + pos;
        let end = start + word.len();
        if (start == 0 || !is_ident_byte(bytes[start - 1]))
            && (end == bytes.len() || !is_ident_byte(bytes[end]))
        {
            count += 1;
        }
        i = end;
    }
    count
}

/// Collect the literal indices of `gl_TexCoord[...]` accesses.
///
/// Returns the unit mask, the minimum array size (highest index + 1), and
/// whether any index is non-literal (dynamic).
fn texcoord_indices(src: &str) -> (TexUnits, usize, bool) {
    let bytes = src.as_bytes();
    let mut units = TexUnits::empty();
    let mut count = 0usize;
    let mut dynamic = false;
    let mut i = 0;
    while let Some(pos) = src[i..].find("gl_TexCoord") {
        let start = i + pos;
        let end = start + "gl_TexCoord".len();
        i = end;
        if start > 0 && is_ident_byte(bytes[start - 1]) {
            continue;
        }
        let mut j = end;
        while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'[' {
            continue;
        }
        j += 1;
        while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
            j += 1;
        }
        let digits_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j == digits_start {
            dynamic = true;
            continue;
        }
        if let Ok(unit) = src[digits_start..j].parse::<u32>() {
            if unit < 8 {
                units |= TexUnits::unit(unit);
                count = count.max(unit as usize + 1);
            }
        }
    }
    (units, count, dynamic)
}

/// Remove the leading `#version` line, returning its number (if any) and
/// the remaining source.
fn strip_version(src: &str) -> (Option<u16>, String) {
    let mut version = None;
    let mut out = String::with_capacity(src.len());
    for line in src.lines() {
        let trimmed = line.trim_start();
        if version.is_none() && trimmed.starts_with("#version") {
            let digits: String = trimmed["#version".len()..]
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            version = digits.parse::<u16>().ok();
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    (version, out)
}

/// Insert statements just before the closing brace of the last block
/// (in practice the end of `main`).
fn inject_before_final_brace(body: &mut String, stmts: &str) {
    if let Some(pos) = body.rfind('}') {
        body.insert_str(pos, stmts);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "dialect_tests.rs"]
mod tests;
