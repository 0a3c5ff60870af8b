// SPDX-FileCopyrightText: 2026 Pagesync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the pagesync reconciliation engine.

use thiserror::Error;

/// The primary error type used across all pagesync crates.
///
/// The remote graph API produces two distinct failure shapes which callers
/// must be able to tell apart: a structured business error returned by the
/// service ([`SyncError::RemoteApi`]) and a local or transport-level failure
/// with no structured body ([`SyncError::Transport`]).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Structured business error returned by the remote graph API
    /// (permission revoked, rate limited, resource missing).
    #[error("remote API error {code}/{subcode}: {message}")]
    RemoteApi {
        code: i64,
        subcode: i64,
        message: String,
    },

    /// Transport-level failure: network error, connection refused, or an
    /// HTTP error response with no structured error body.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A payload could not be decoded into its tagged representation.
    #[error("decode error: {0}")]
    Decode(String),

    /// A remote call exceeded its bounded timeout. Treated as a transport
    /// failure for retry purposes; aborts only the current run.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether this error originated in the remote service's business layer
    /// rather than locally or in transit.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::RemoteApi { .. })
    }
}
