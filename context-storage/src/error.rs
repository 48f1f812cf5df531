//! Maps any error this crate encounters onto [`context_core::error::Error`],
//! preserving the original message as context.

use context_core::error::Error;

/// Wrap a lower-level error (libsql, serde_json, io) as a
/// [`Error::StoreUnavailable`], keeping its message.
pub fn storage_error<C: std::fmt::Display, E: std::fmt::Display>(context: C, error: E) -> Error {
    Error::StoreUnavailable(format!("{context}: {error}"))
}
