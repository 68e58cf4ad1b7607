//! Driver capability description
//!
//! The bridge sits on top of a reduced, shader-only driver. The embedder
//! queries the driver once at context creation and hands the result to the
//! shader subsystem as a `DriverCaps` value. All conversion-strategy
//! decisions (pass-through, downgrade, legacy rewrite) derive from it.

/// Capabilities of the underlying shader-only driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCaps {
    /// Major ES version of the context (2 or 3)
    pub es_major: u8,

    /// Highest ESSL dialect the driver compiles (100, 300, 310, 320)
    pub essl_version: u16,

    /// Whether a native shading compiler exists at all.
    /// Software backends have none; every compile degrades to a stub.
    pub has_compiler: bool,
}

impl DriverCaps {
    /// An ES2 context with a native compiler (ESSL 100 only)
    pub fn es2() -> Self {
        Self {
            es_major: 2,
            essl_version: 100,
            has_compiler: true,
        }
    }

    /// An ES3 context with a native compiler
    ///
    /// `essl_version` is the highest `#version N es` dialect accepted
    /// (300, 310 or 320).
    pub fn es3(essl_version: u16) -> Self {
        Self {
            es_major: 3,
            essl_version,
            has_compiler: true,
        }
    }

    /// A backend with no shading compiler at all
    pub fn software() -> Self {
        Self {
            es_major: 2,
            essl_version: 100,
            has_compiler: false,
        }
    }

    /// Whether an ESSL3-family source can run on this driver as-is
    fn can_run_essl3(&self, source: &str) -> bool {
        let required = if source.starts_with("#version 100") {
            return true;
        } else if source.starts_with("#version 300 es") {
            return true;
        } else if source.starts_with("#version 310 es") {
            310
        } else if source.starts_with("#version 320 es") {
            320
        } else {
            return false;
        };
        self.essl_version >= required
    }

    /// Whether the driver accepts `source` verbatim, with no conversion.
    ///
    /// True for `#version 100` sources on any ES2-capable context, and for
    /// ESSL3-family sources whose version does not exceed the driver's.
    /// Always false without a compiler (nothing is ever submitted).
    pub fn accepts_verbatim(&self, source: &str) -> bool {
        if !self.has_compiler {
            return false;
        }
        let source = source.trim_start();
        let es2_ability = source.starts_with("#version 100");
        let es3_ability = self.es_major >= 3 && self.can_run_essl3(source);
        es2_ability || es3_ability
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "caps_tests.rs"]
mod tests;
