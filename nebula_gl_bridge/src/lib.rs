/*!
# Nebula GL Bridge

Shader compatibility core for running desktop GL content on reduced
GLES-class drivers.

This crate translates every shader form a legacy application can submit
into something the underlying driver actually compiles:

- **Assembly programs** (`!!ARBvp1.0` / `!!ARBfp1.0`) are parsed and
  converted to legacy GLSL, then rewritten like any other legacy source
- **Legacy desktop GLSL** goes through a conditional rewrite onto
  `#version 100`, renaming removed builtins to synthesized `ngl_` inputs
- **Modern desktop GLSL** (>= 140) is downgraded to `#version 300 es`
  where the driver supports it

Each translation computes a capability-requirement vector describing the
fixed-function inputs the rewritten body depends on; the program layer
aggregates those at link time and reconciles stale shaders. The shader
registry owns the handle-to-object map, GL-style queries, and deferred
deletion semantics.

The driver sits behind the [`shader::ShaderBackend`] trait; a null
implementation covers backends with no shading compiler at all.
*/

// Internal modules
mod error;
pub mod arb;
pub mod caps;
pub mod glsl;
pub mod log;
pub mod shader;

// Main nebula namespace module
pub mod nebula {
    // Error types
    pub use crate::error::{Error, Result};

    // Driver capability description
    pub use crate::caps::DriverCaps;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
        // Note: bridge_* macros are NOT re-exported here - they are internal only
    }

    // Assembly-program conversion
    pub mod arb {
        pub use crate::arb::*;
    }

    // GLSL dialect conversion and the requirement vector
    pub mod glsl {
        pub use crate::glsl::*;
    }

    // Shader object registry
    pub mod shader {
        pub use crate::shader::*;
    }
}

pub use error::{Error, Result};
