// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend session credential and its per-session store.
//!
//! The store is handed explicitly to each relay client. Reads happen right
//! before a request is sent and writes right after a response arrives; with
//! concurrent submissions the last response to arrive wins.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};

/// Opaque backend-issued cookie (`name=value`).
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    value: String,
    captured_at: DateTime<Utc>,
}

impl SessionCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            captured_at: Utc::now(),
        }
    }

    /// Builds a credential from a raw `Set-Cookie` header value, keeping only
    /// the leading `name=value` pair.
    ///
    /// Returns `None` when the header carries no cookie pair.
    pub fn from_set_cookie(header: &str) -> Option<Self> {
        let pair = header.split(';').next()?.trim();
        if pair.is_empty() || !pair.contains('=') {
            return None;
        }
        Some(Self::new(pair))
    }

    /// Value to send in the `Cookie` header.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

impl std::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("value", &"[redacted]")
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Shared slot holding the credential for one browser session.
///
/// Cloning yields another handle to the same slot.
#[derive(Clone, Default)]
pub struct CredentialStore {
    slot: Arc<ArcSwapOption<SessionCredential>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `credential`.
    pub fn with_credential(credential: SessionCredential) -> Self {
        let store = Self::new();
        store.replace(credential);
        store
    }

    /// Current credential, if any.
    pub fn current(&self) -> Option<Arc<SessionCredential>> {
        self.slot.load_full()
    }

    pub fn is_present(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Overwrites the held credential.
    pub fn replace(&self, credential: SessionCredential) {
        self.slot.store(Some(Arc::new(credential)));
    }

    pub fn clear(&self) {
        if self.slot.swap(None).is_some() {
            tracing::debug!("session credential cleared");
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.is_present())
            .finish()
    }
}
