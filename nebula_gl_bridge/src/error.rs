//! Error types for the Nebula GL bridge
//!
//! This module defines the error types used throughout the bridge,
//! mirroring the error taxonomy the legacy API reports to callers.

use std::fmt;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge errors
///
/// The first three variants correspond to the legacy API error conditions
/// raised by shader-object operations; `BackendError` covers failures
/// originating in the native driver collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An enum argument is outside the accepted set (e.g. unknown shader stage)
    InvalidEnum(String),

    /// A value argument is out of range (e.g. zero source fragments)
    InvalidValue(String),

    /// The operation is not valid in the current state (e.g. unknown handle)
    InvalidOperation(String),

    /// Backend-specific error (driver refused to create a shader, etc.)
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidEnum(msg) => write!(f, "Invalid enum: {}", msg),
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            Error::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
