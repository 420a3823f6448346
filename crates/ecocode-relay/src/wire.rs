// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend JSON bodies parsed into explicit shapes at the boundary.
//!
//! Bodies that match none of the known shapes are reported as such instead of
//! being inspected key by key further down.

use ecocode_core::{JobId, OutcomeMode, PollState};
use serde::Deserialize;
use serde_json::Value;

/// Raw `/generate-code` and `/enqueue-gpt` body.
#[derive(Debug, Default, Deserialize)]
struct GenerateBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_score")]
    similarity: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// A numeric score sent as a number or a numeric string. Anything else is
/// treated as absent rather than failing the whole body.
fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let score = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score.filter(|s| s.is_finite()))
}

/// Classified reply to a generation request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateReply {
    /// Inline code; no polling needed. `similarity` is the raw `[0, 1]` score.
    Immediate {
        code: String,
        mode: OutcomeMode,
        similarity: Option<f64>,
    },
    /// A job was queued and has to be polled.
    Queued { job_id: JobId, mode: Option<String> },
    /// A success status carrying an explicit error message.
    Rejected { reason: String },
    /// Valid or invalid JSON that matches none of the shapes above.
    Unrecognized,
}

impl GenerateReply {
    pub fn parse(data: Option<&Value>) -> Self {
        let Some(body) = data
            .filter(|v| v.is_object())
            .and_then(|v| GenerateBody::deserialize(v).ok())
        else {
            return GenerateReply::Unrecognized;
        };

        if let Some(reason) = present(body.error) {
            return GenerateReply::Rejected { reason };
        }
        // Inline code wins over a job id.
        if let Some(code) = present(body.code) {
            return GenerateReply::Immediate {
                code,
                mode: OutcomeMode::classify(body.mode.as_deref()),
                similarity: body.similarity,
            };
        }
        if let Some(job_id) = present(body.job_id) {
            return GenerateReply::Queued {
                job_id: JobId(job_id),
                mode: body.mode,
            };
        }
        GenerateReply::Unrecognized
    }
}

/// Raw `/check-status/{job_id}` body.
#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Classified status check reply.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReply {
    pub state: PollState,
    pub code: Option<String>,
    /// `error`, else `message`, for failed jobs.
    pub reason: Option<String>,
}

impl StatusReply {
    pub fn parse(data: Option<&Value>) -> Self {
        let body = data
            .and_then(|v| StatusBody::deserialize(v).ok())
            .unwrap_or_default();

        let state = match body.status.as_deref() {
            Some("pending") => PollState::Pending,
            Some("done") => PollState::Done,
            Some("error") => PollState::Error,
            _ => PollState::Unknown,
        };
        let reason = match state {
            PollState::Error => present(body.error).or_else(|| present(body.message)),
            _ => None,
        };
        Self {
            state,
            code: present(body.code),
            reason,
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}
