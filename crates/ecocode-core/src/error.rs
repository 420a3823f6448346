// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the ecocode workspace.
//!
//! The job poller and the relay `call` never surface these; their failures are
//! encoded as values. This type covers constructors, login, and the gateway host.

use thiserror::Error;

/// The primary error type used across ecocode crates.
#[derive(Debug, Error)]
pub enum EcocodeError {
    /// Configuration errors (invalid TOML, bad backend URL, unusable values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller input rejected before any backend call (blank prompt, blank username).
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend answered with an error status or an error body.
    #[error("backend error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Backend {
        status: Option<u16>,
        message: String,
    },

    /// The backend rejected the credentials or the session.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend could not be reached.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Browser-facing server errors (bind failure, serve failure).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
