// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Submission and bounded polling of backend generation jobs.
//!
//! A submission either resolves immediately, fails, or yields a job id that
//! is polled on a fixed interval until it finishes, fails, the attempt
//! budget runs out, or the caller cancels.

use std::time::{Duration, Instant};

use ecocode_config::model::PollingConfig;
use ecocode_core::{
    Envelope, FailureCategory, GenerationOutcome, GenerationRequest, JobId, OutcomeMode,
    PollAttempt, PollState, RelayMethod, similarity_percent,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::SessionRelayClient;
use crate::wire::{GenerateReply, StatusReply};

const GENERATE_ROUTE: &str = "generate-code";
const ENQUEUE_ROUTE: &str = "enqueue-gpt";
const STATUS_ROUTE: &str = "check-status";

/// Attempt budget and spacing for job polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Longest a caller waits before seeing `Exhausted`.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(2))
    }
}

impl From<&PollingConfig> for PollPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self::new(config.max_attempts, config.interval())
    }
}

/// Identifiers forwarded with every status check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollContext {
    pub user_id: Option<String>,
    pub assessment_id: Option<String>,
}

impl PollContext {
    fn query(&self) -> Vec<(&str, &str)> {
        let mut query = Vec::with_capacity(2);
        if let Some(user_id) = self.user_id.as_deref() {
            query.push(("user_id", user_id));
        }
        if let Some(assessment_id) = self.assessment_id.as_deref() {
            query.push(("assessment_id", assessment_id));
        }
        query
    }
}

/// Submits generation requests and drives queued jobs to an outcome.
#[derive(Debug, Clone)]
pub struct JobPoller {
    client: SessionRelayClient,
    policy: PollPolicy,
}

impl JobPoller {
    pub fn new(client: SessionRelayClient, policy: PollPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &SessionRelayClient {
        &self.client
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Submits `request` and, if the backend queues a job, polls it.
    ///
    /// Never returns `Queued`. Polling stops early when `cancel` fires.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        context: &PollContext,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        match self.dispatch(request).await {
            GenerationOutcome::Queued { job_id } => {
                let mut context = context.clone();
                if context.assessment_id.is_none() {
                    context.assessment_id = request.assessment_id().map(str::to_string);
                }
                self.poll(&job_id, &context, cancel).await
            }
            outcome => outcome,
        }
    }

    /// Sends the generation request once and classifies the reply.
    pub async fn dispatch(&self, request: &GenerationRequest) -> GenerationOutcome {
        let route = if request.is_forced() {
            ENQUEUE_ROUTE
        } else {
            GENERATE_ROUTE
        };
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => return GenerationOutcome::failed(FailureCategory::Unknown, e.to_string()),
        };

        let envelope = self.client.call(RelayMethod::Post, route, Some(&payload)).await;
        if !envelope.ok {
            return self.classify_failure(&envelope);
        }

        match GenerateReply::parse(envelope.data.as_ref()) {
            GenerateReply::Immediate {
                code,
                mode,
                similarity,
            } => {
                debug!(route, %mode, "generation answered inline");
                GenerationOutcome::Immediate {
                    code,
                    mode,
                    similarity: similarity.map(similarity_percent),
                }
            }
            GenerateReply::Queued { job_id, mode } => {
                info!(route, job_id = %job_id, mode = mode.as_deref().unwrap_or(""), "generation job queued");
                GenerationOutcome::Queued { job_id }
            }
            GenerateReply::Rejected { reason } => {
                GenerationOutcome::failed(FailureCategory::Unknown, reason)
            }
            GenerateReply::Unrecognized => {
                warn!(route, "generation response matched no known shape");
                GenerationOutcome::failed(
                    FailureCategory::Unparseable,
                    "response matched no known shape",
                )
            }
        }
    }

    /// Polls `job_id` until a terminal state, exhaustion, or cancellation.
    ///
    /// Every attempt waits one interval first. Failed checks count against
    /// the budget and are retried.
    pub async fn poll(
        &self,
        job_id: &JobId,
        context: &PollContext,
        cancel: &CancellationToken,
    ) -> GenerationOutcome {
        let started = Instant::now();
        let cancelled = |attempts: u32| {
            info!(job_id = %job_id, attempts, "polling cancelled");
            GenerationOutcome::Cancelled {
                job_id: job_id.clone(),
                attempts,
            }
        };

        for attempt in 1..=self.policy.max_attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(attempt - 1),
                () = tokio::time::sleep(self.policy.interval) => {}
            }

            let observed = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(attempt - 1),
                observed = self.observe(job_id, context, attempt, started) => observed,
            };

            match observed.state {
                PollState::Done => {
                    info!(job_id = %job_id, attempt, "job finished");
                    return GenerationOutcome::Immediate {
                        code: observed.code.unwrap_or_default(),
                        mode: OutcomeMode::Generated,
                        similarity: None,
                    };
                }
                PollState::Error => {
                    warn!(job_id = %job_id, attempt, "job failed");
                    return GenerationOutcome::failed(
                        FailureCategory::JobFailed,
                        observed.reason.unwrap_or_else(|| "unknown reason".into()),
                    );
                }
                PollState::Pending | PollState::Unknown => {}
            }
        }

        info!(job_id = %job_id, attempts = self.policy.max_attempts, "polling budget exhausted");
        GenerationOutcome::Exhausted {
            job_id: job_id.clone(),
            attempts: self.policy.max_attempts,
        }
    }

    /// One status check for a manual `status <job_id>` request.
    pub async fn check_status(&self, job_id: &JobId, context: &PollContext) -> PollAttempt {
        self.observe(job_id, context, 1, Instant::now()).await
    }

    async fn observe(
        &self,
        job_id: &JobId,
        context: &PollContext,
        attempt: u32,
        started: Instant,
    ) -> PollAttempt {
        let envelope = self
            .client
            .call_segments(
                RelayMethod::Get,
                &[STATUS_ROUTE, job_id.as_str()],
                &context.query(),
                None,
            )
            .await;
        let reply = StatusReply::parse(envelope.data.as_ref());

        // An error status counts as a miss unless the body reports the job failed.
        let (state, reason) = if envelope.ok || reply.state == PollState::Error {
            (reply.state, reply.reason)
        } else {
            warn!(job_id = %job_id, attempt, status = ?envelope.status, "status check missed");
            (PollState::Unknown, envelope.error)
        };

        debug!(job_id = %job_id, attempt, state = %state, "status checked");
        PollAttempt {
            job_id: job_id.clone(),
            attempt,
            elapsed: started.elapsed(),
            state,
            code: reply.code,
            reason,
        }
    }

    /// Maps a failed generation call to an outcome. 401/403 also drop the
    /// held credential.
    fn classify_failure(&self, envelope: &Envelope) -> GenerationOutcome {
        let reason = envelope
            .error
            .clone()
            .unwrap_or_else(|| "request failed".into());
        let category = match envelope.status {
            Some(401 | 403) => {
                self.client.credential().clear();
                FailureCategory::Auth
            }
            Some(429) => FailureCategory::RateLimit,
            Some(status) if status >= 500 => FailureCategory::ServerError,
            _ => FailureCategory::Network,
        };
        warn!(status = ?envelope.status, %category, "generation request failed");
        GenerationOutcome::failed(category, reason)
    }
}
