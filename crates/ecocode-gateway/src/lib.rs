// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Browser-facing HTTP gateway for ecocode.
//!
//! Maps browser sessions to backend session credentials and exposes chat,
//! manual status checks, login/logout, and a small read-only backend relay.

pub mod handlers;
pub mod server;
pub mod session;

pub use server::{GatewayState, RelaySettings, ServerConfig, router, start_server};
pub use session::{BrowserSession, SessionRegistry};
