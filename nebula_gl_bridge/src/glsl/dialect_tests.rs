//! Unit tests for the dialect converter
//!
//! Tests version detection, strategy selection, builtin renaming, the
//! downgrade bailout, and hint-driven varying injection.

use super::*;
use crate::caps::DriverCaps;
use crate::shader::object::ShaderStage;

const PASSTHROUGH_VS: &str = "#version 100\nvoid main() { gl_Position = vec4(0.0); }\n";

// ============================================================================
// VERSION DETECTION TESTS
// ============================================================================

#[test]
fn test_detect_explicit_versions() {
    assert_eq!(GlslVersion::detect("#version 120\nvoid main() {}"), GlslVersion(120));
    assert_eq!(GlslVersion::detect("#version 330\nvoid main() {}"), GlslVersion(330));
    assert_eq!(GlslVersion::detect("#version 300 es\nvoid main() {}"), GlslVersion(300));
}

#[test]
fn test_detect_missing_version_is_oldest() {
    assert_eq!(GlslVersion::detect("void main() {}"), GlslVersion::OLDEST);
}

#[test]
fn test_detect_skips_leading_blanks_and_comments() {
    let source = "\n// header comment\n#version 140\nvoid main() {}";
    assert_eq!(GlslVersion::detect(source), GlslVersion(140));
}

#[test]
fn test_detect_stops_at_first_code_line() {
    // A #version after real code does not count
    let source = "void main() {}\n#version 330\n";
    assert_eq!(GlslVersion::detect(source), GlslVersion::OLDEST);
}

// ============================================================================
// STRATEGY SELECTION TESTS
// ============================================================================

#[test]
fn test_essl100_passes_through_on_es2() {
    let caps = DriverCaps::es2();
    match convert(PASSTHROUGH_VS, ShaderStage::Vertex, &caps, None) {
        Conversion::Direct { source } => assert_eq!(source, PASSTHROUGH_VS),
        other => panic!("expected pass-through, got {:?}", other),
    }
}

#[test]
fn test_essl300_passes_through_on_es3() {
    let caps = DriverCaps::es3(300);
    let source = "#version 300 es\nout vec4 c;\nvoid main() { c = vec4(1.0); }\n";
    assert!(matches!(
        convert(source, ShaderStage::Fragment, &caps, None),
        Conversion::Direct { .. }
    ));
}

#[test]
fn test_desktop_140_downgrades_on_es3() {
    let caps = DriverCaps::es3(300);
    let source = "#version 330\nin vec4 pos;\nvoid main() { gl_Position = gl_ModelViewProjectionMatrix * pos; }\n";
    match convert(source, ShaderStage::Vertex, &caps, None) {
        Conversion::Downgraded {
            source,
            needs,
            uniforms,
        } => {
            assert!(source.starts_with("#version 300 es\n"));
            assert!(source.contains("uniform mat4 ngl_ModelViewProjectionMatrix;"));
            assert!(source.contains("ngl_ModelViewProjectionMatrix * pos"));
            assert_eq!(needs.mvp_matrix, 1);
            assert_eq!(
                uniforms,
                vec![UniformDecl {
                    name: "ngl_ModelViewProjectionMatrix".to_string(),
                    glsl_type: "mat4",
                }]
            );
        }
        other => panic!("expected downgrade, got {:?}", other),
    }
}

#[test]
fn test_desktop_140_falls_back_without_es3() {
    let caps = DriverCaps::es2();
    let source = "#version 330\nvoid main() { gl_Position = vec4(0.0); }\n";
    assert!(matches!(
        convert(source, ShaderStage::Vertex, &caps, None),
        Conversion::Rewritten { .. }
    ));
}

#[test]
fn test_downgrade_bails_on_unsupported_constructs() {
    assert!(matches!(
        try_downgrade("#version 400\ndouble d;\nvoid main() {}\n", ShaderStage::Vertex),
        Conversion::Failed
    ));

    // convert never surfaces the failure, it falls back
    let caps = DriverCaps::es3(300);
    assert!(matches!(
        convert("#version 400\ndouble d;\nvoid main() {}\n", ShaderStage::Vertex, &caps, None),
        Conversion::Rewritten { .. }
    ));
}

// ============================================================================
// LEGACY REWRITE TESTS
// ============================================================================

#[test]
fn test_vertex_builtin_renaming() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex; }\n";
    let (out, needs) = rewrite(source, ShaderStage::Vertex, &caps, None);

    assert!(out.starts_with("#version 100\n"));
    assert!(out.contains("attribute vec4 ngl_Vertex;"));
    assert!(out.contains("uniform mat4 ngl_ModelViewProjectionMatrix;"));
    assert!(out.contains("ngl_ModelViewProjectionMatrix * ngl_Vertex"));
    assert_eq!(needs.mvp_matrix, 1);
    assert_eq!(needs.clean, 0);
}

#[test]
fn test_rewrite_deterministic() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragColor = gl_Color; }\n";
    let first = rewrite(source, ShaderStage::Fragment, &caps, None);
    let second = rewrite(source, ShaderStage::Fragment, &caps, None);
    assert_eq!(first.0, second.0);
    assert_eq!(first.1, second.1);
}

#[test]
fn test_fragment_precision_injection() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragColor = gl_Color; }\n";
    let (out, needs) = rewrite(source, ShaderStage::Fragment, &caps, None);

    assert!(out.contains("precision highp float;"));
    assert!(out.contains("precision mediump float;"));
    assert!(out.contains("varying vec4 ngl_FrontColor;"));
    assert_eq!(needs.color, 1);
}

#[test]
fn test_fragment_precision_not_duplicated() {
    let caps = DriverCaps::es2();
    let source = "precision mediump float;\nvoid main() { gl_FragColor = vec4(0.0); }\n";
    let (out, _) = rewrite(source, ShaderStage::Fragment, &caps, None);
    assert!(!out.contains("precision highp float;"));
}

#[test]
fn test_texcoord_array_sizing() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragColor = gl_TexCoord[2]; }\n";
    let (out, needs) = rewrite(source, ShaderStage::Fragment, &caps, None);

    assert!(out.contains("varying vec4 ngl_TexCoord[3];"));
    assert!(out.contains("ngl_TexCoord[2]"));
    assert_eq!(needs.texcoord, 3);
    assert!(needs.tex_units.contains(TexUnits::unit(2)));
    assert!(!needs.tex_units.contains(TexUnits::unit(0)));
}

#[test]
fn test_multitexcoord_attribute() {
    let caps = DriverCaps::es2();
    let source =
        "void main() { gl_TexCoord[1] = gl_MultiTexCoord1; gl_Position = gl_Vertex; }\n";
    let (out, needs) = rewrite(source, ShaderStage::Vertex, &caps, None);

    assert!(out.contains("attribute vec4 ngl_MultiTexCoord1;"));
    assert!(out.contains("ngl_TexCoord[1] = ngl_MultiTexCoord1;"));
    assert!(needs.tex_units.contains(TexUnits::unit(1)));
}

#[test]
fn test_frag_depth_needs_extension_on_es2() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragDepth = 0.5; gl_FragColor = vec4(0.0); }\n";
    let (out, _) = rewrite(source, ShaderStage::Fragment, &caps, None);

    assert!(out.contains("#extension GL_EXT_frag_depth : enable"));
    assert!(out.contains("gl_FragDepthEXT = 0.5;"));
}

#[test]
fn test_frag_data_zero_collapses_to_frag_color() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragData[0] = vec4(1.0); }\n";
    let (out, _) = rewrite(source, ShaderStage::Fragment, &caps, None);
    assert!(out.contains("gl_FragColor = vec4(1.0);"));
}

#[test]
fn test_untouched_body_is_clean() {
    let caps = DriverCaps::es2();
    let source = "void main() { gl_FragColor = vec4(1.0); }\n";
    let (_, needs) = rewrite(source, ShaderStage::Fragment, &caps, None);
    assert_eq!(needs.clean, 1);
    assert_eq!(needs.no_tex_array, 1);
}

#[test]
fn test_tex_array_sampler_clears_flag() {
    let caps = DriverCaps::es2();
    let source = "uniform sampler2DArray t;\nvoid main() { gl_FragColor = vec4(1.0); }\n";
    let (_, needs) = rewrite(source, ShaderStage::Fragment, &caps, None);
    assert_eq!(needs.no_tex_array, 0);
}

// ============================================================================
// HINT INJECTION TESTS
// ============================================================================

#[test]
fn test_hint_injects_color_passthrough() {
    let caps = DriverCaps::es2();
    let mut hint = ShaderNeeds::default();
    hint.color = 1;
    let source = "void main() { gl_Position = vec4(0.0); }\n";
    let (out, needs) = rewrite(source, ShaderStage::Vertex, &caps, Some(&hint));

    assert!(out.contains("attribute vec4 ngl_Color;"));
    assert!(out.contains("varying vec4 ngl_FrontColor;"));
    assert!(out.contains("ngl_FrontColor = ngl_Color;"));
    assert_eq!(needs.color, 1);
}

#[test]
fn test_hint_injects_missing_texcoord_passthrough() {
    let caps = DriverCaps::es2();
    let mut hint = ShaderNeeds::default();
    hint.tex_units = TexUnits::unit(1);
    let source = "void main() { gl_Position = vec4(0.0); }\n";
    let (out, needs) = rewrite(source, ShaderStage::Vertex, &caps, Some(&hint));

    assert!(out.contains("attribute vec4 ngl_MultiTexCoord1;"));
    assert!(out.contains("varying vec4 ngl_TexCoord[2];"));
    assert!(out.contains("ngl_TexCoord[1] = ngl_MultiTexCoord1;"));
    assert!(needs.tex_units.contains(TexUnits::unit(1)));
}

#[test]
fn test_hint_ignored_when_already_satisfied() {
    let caps = DriverCaps::es2();
    let mut hint = ShaderNeeds::default();
    hint.color = 1;
    let source = "void main() { gl_FrontColor = gl_Color; gl_Position = gl_Vertex; }\n";
    let (out, _) = rewrite(source, ShaderStage::Vertex, &caps, Some(&hint));

    // The body already feeds the varying; no duplicate assignment
    assert_eq!(out.matches("ngl_FrontColor = ngl_Color;").count(), 1);
}

#[test]
fn test_hint_ignored_on_fragment_stage() {
    let caps = DriverCaps::es2();
    let mut hint = ShaderNeeds::default();
    hint.color = 1;
    let source = "void main() { gl_FragColor = vec4(1.0); }\n";
    let (out, _) = rewrite(source, ShaderStage::Fragment, &caps, Some(&hint));
    assert!(!out.contains("ngl_Color"));
}
