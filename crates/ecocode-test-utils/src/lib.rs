// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for ecocode integration tests.
//!
//! # Components
//!
//! - [`MockBackend`] - Scripted stand-in for the code-generation backend
//! - [`TestHarness`] - Mock backend plus a job poller wired to it

pub mod harness;
pub mod mock_backend;

pub use harness::TestHarness;
pub use mock_backend::MockBackend;
