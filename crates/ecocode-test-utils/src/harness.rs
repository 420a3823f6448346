// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a job poller to a mock backend.

use std::time::Duration;

use ecocode_core::{CredentialStore, EcocodeError, SessionCredential};
use ecocode_relay::{JobPoller, PollPolicy, SessionRelayClient};

use crate::mock_backend::MockBackend;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    policy: PollPolicy,
    credential: Option<String>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            policy: PollPolicy::new(5, Duration::from_millis(10)),
            credential: None,
        }
    }

    /// Poll budget for the harness poller. Defaults to 5 x 10 ms.
    pub fn with_policy(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.policy = PollPolicy::new(max_attempts, interval);
        self
    }

    /// Pre-load the session credential (`name=value`).
    pub fn with_credential(mut self, value: &str) -> Self {
        self.credential = Some(value.to_string());
        self
    }

    pub async fn build(self) -> Result<TestHarness, EcocodeError> {
        let backend = MockBackend::start().await;
        let credential = match self.credential {
            Some(value) => CredentialStore::with_credential(SessionCredential::new(value)),
            None => CredentialStore::new(),
        };
        let client = SessionRelayClient::new(&backend.uri(), credential.clone())?;
        Ok(TestHarness {
            poller: JobPoller::new(client, self.policy),
            credential,
            backend,
        })
    }
}

/// A mock backend plus a poller and credential store pointed at it.
pub struct TestHarness {
    pub backend: MockBackend,
    pub poller: JobPoller,
    /// Same store the poller's client uses.
    pub credential: CredentialStore,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn client(&self) -> &SessionRelayClient {
        self.poller.client()
    }
}
