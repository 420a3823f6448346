// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend relay for ecocode.
//!
//! [`SessionRelayClient`] carries one browser session's credential to the
//! code-generation backend. [`JobPoller`] submits generation requests through
//! it and polls queued jobs to completion.

pub mod client;
pub mod poller;
pub mod wire;

pub use client::{DEFAULT_AUTH_TIMEOUT, SessionRelayClient};
pub use poller::{JobPoller, PollContext, PollPolicy};
