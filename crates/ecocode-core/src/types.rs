// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request, outcome and envelope types shared by the relay and the gateway.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::EcocodeError;

/// Identifier of a job queued on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// HTTP methods the relay is allowed to use against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RelayMethod {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
}

/// Shape of the answer the user asked for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseMode {
    Code,
    Summary,
    SummaryCodeExplanation,
}

/// One user prompt submission.
///
/// Construct with [`GenerationRequest::new`], which rejects blank prompts.
/// Serializes to the `/generate-code` and `/enqueue-gpt` request body; the
/// force flag selects the route and is not sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    assessment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mode: Option<ResponseMode>,
    #[serde(skip)]
    force: bool,
}

impl GenerationRequest {
    /// Creates a request for `prompt`. The prompt is trimmed and must not be empty.
    pub fn new(prompt: impl Into<String>) -> Result<Self, EcocodeError> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(EcocodeError::Validation("prompt must not be empty".into()));
        }
        Ok(Self {
            prompt,
            assessment_id: None,
            language: None,
            response_mode: None,
            force: false,
        })
    }

    /// Sets the target language hint. Blank hints are ignored.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = non_blank(language.into());
        self
    }

    pub fn with_response_mode(mut self, mode: ResponseMode) -> Self {
        self.response_mode = Some(mode);
        self
    }

    /// Sets the assessment the prompt belongs to. Blank identifiers are ignored.
    pub fn with_assessment(mut self, assessment_id: impl Into<String>) -> Self {
        self.assessment_id = non_blank(assessment_id.into());
        self
    }

    /// Requests fresh generation, bypassing cached or retrieved answers.
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn response_mode(&self) -> Option<ResponseMode> {
        self.response_mode
    }

    pub fn assessment_id(&self) -> Option<&str> {
        self.assessment_id.as_deref()
    }

    pub fn is_forced(&self) -> bool {
        self.force
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Where an immediate answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeMode {
    /// Exact match served from the backend's store, free of charge.
    Retrieval,
    /// Similar match served from the backend's store, free of charge.
    Suggestion,
    /// Anything else, including answers produced by a queued job.
    Generated,
}

impl OutcomeMode {
    /// Classifies the backend's `mode` string.
    pub fn classify(mode: Option<&str>) -> Self {
        match mode {
            Some("retrieval") => OutcomeMode::Retrieval,
            Some("suggestion") => OutcomeMode::Suggestion,
            _ => OutcomeMode::Generated,
        }
    }
}

/// Failure taxonomy for submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureCategory {
    /// 401/403; the held session credential has been cleared.
    Auth,
    /// 429.
    RateLimit,
    /// Any status >= 500.
    ServerError,
    /// Transport failure or any other error status.
    Network,
    /// The backend reported the queued job as failed.
    JobFailed,
    /// A success response matching none of the known shapes.
    Unparseable,
    /// A success response that carried an explicit error message.
    Unknown,
}

/// Result of a submission. Exactly one variant holds at any time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Code is available without (further) polling.
    Immediate {
        code: String,
        mode: OutcomeMode,
        /// Percentage rounded to one decimal place.
        similarity: Option<f64>,
    },
    /// The backend queued a job; polling has not run yet.
    Queued { job_id: JobId },
    Failed {
        category: FailureCategory,
        reason: String,
    },
    /// The attempt budget ran out while the job was still pending.
    Exhausted { job_id: JobId, attempts: u32 },
    /// The caller cancelled polling before a terminal state.
    Cancelled { job_id: JobId, attempts: u32 },
}

impl GenerationOutcome {
    pub fn failed(category: FailureCategory, reason: impl Into<String>) -> Self {
        GenerationOutcome::Failed {
            category,
            reason: reason.into(),
        }
    }

    /// Returns the failure category, if this is a failure.
    pub fn failure_category(&self) -> Option<FailureCategory> {
        match self {
            GenerationOutcome::Failed { category, .. } => Some(*category),
            _ => None,
        }
    }

    /// Returns the job id for outcomes that reference a backend job.
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            GenerationOutcome::Queued { job_id }
            | GenerationOutcome::Exhausted { job_id, .. }
            | GenerationOutcome::Cancelled { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

/// Converts a backend similarity score in `[0, 1]` into a percentage rounded
/// to one decimal place (`0.8675 -> 86.8`).
pub fn similarity_percent(similarity: f64) -> f64 {
    // Scale first so the half-way case lands on an exact binary value before rounding.
    let percent = similarity * 100.0;
    (percent * 10.0).round() / 10.0
}

/// Observed state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PollState {
    Pending,
    Done,
    Error,
    /// Unreachable backend, error status, or an unrecognised status value.
    Unknown,
}

/// One status check against a queued job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollAttempt {
    pub job_id: JobId,
    /// 1-based attempt index; manual checks use 1.
    pub attempt: u32,
    /// Total time waited before this check.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
    pub state: PollState,
    /// Code delivered by a `done` job.
    pub code: Option<String>,
    /// Failure reason for `error`, or the transport error for an unreachable check.
    pub reason: Option<String>,
}

impl PollAttempt {
    /// True for `done` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, PollState::Done | PollState::Error)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

/// Uniform result of one backend call, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub ok: bool,
    /// HTTP status; `None` when the backend was unreachable.
    pub status: Option<u16>,
    /// Parsed JSON body, if the body was JSON.
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Envelope {
    /// Envelope for a call that never produced an HTTP response.
    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: None,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Reads a string field from the parsed body. Empty strings count as absent.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get(name))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}
