// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the ecocode relay.
//!
//! Holds the types every other crate speaks: the session credential and its
//! store, generation requests and outcomes, poll attempts, the uniform call
//! envelope, the error type, and the user-facing reply text.

pub mod credential;
pub mod error;
pub mod reply;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use credential::{CredentialStore, SessionCredential};
pub use error::EcocodeError;
pub use types::{
    Envelope, FailureCategory, GenerationOutcome, GenerationRequest, JobId, OutcomeMode,
    PollAttempt, PollState, RelayMethod, ResponseMode, similarity_percent,
};
