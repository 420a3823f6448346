// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing reply text for outcomes and manual status checks.

use crate::types::{FailureCategory, GenerationOutcome, OutcomeMode, PollAttempt, PollState};

/// Renders the chat reply for a submission outcome.
pub fn render_outcome(outcome: &GenerationOutcome) -> String {
    match outcome {
        GenerationOutcome::Immediate {
            code,
            mode,
            similarity,
        } => render_immediate(code, *mode, *similarity),
        GenerationOutcome::Queued { job_id } => format!(
            "Your request is queued. job_id: {job_id}. Type \"status {job_id}\" to check on it."
        ),
        GenerationOutcome::Failed { category, reason } => render_failure(*category, reason),
        GenerationOutcome::Exhausted { job_id, .. } => {
            format!("Still processing. To check again anytime, type: status {job_id}")
        }
        GenerationOutcome::Cancelled { job_id, .. } => {
            format!("Stopped waiting for the job. To check again anytime, type: status {job_id}")
        }
    }
}

fn render_immediate(code: &str, mode: OutcomeMode, similarity: Option<f64>) -> String {
    let mut prefix = match mode {
        OutcomeMode::Retrieval => {
            "Answer retrieved from the database (free of charge, does not reduce your quota)."
                .to_string()
        }
        OutcomeMode::Suggestion => "Found similar code in the database (free of charge). \
             If it does not fit, ask again to request a freshly generated version."
            .to_string(),
        OutcomeMode::Generated => {
            if code.is_empty() {
                return "Job done, but no code was provided.".to_string();
            }
            "Here is the code result:".to_string()
        }
    };
    if let Some(similarity) = similarity {
        prefix.push_str(&format!(" Similarity {similarity:.1}%."));
    }
    format!("{prefix}\n{code}")
}

fn render_failure(category: FailureCategory, reason: &str) -> String {
    match category {
        FailureCategory::Auth => "Login session expired or invalid. Please log in again.".into(),
        FailureCategory::RateLimit => {
            "Backend rate limit reached. Please wait a while before trying again.".into()
        }
        FailureCategory::ServerError => {
            format!("Backend server error ({reason}). Please try again.")
        }
        FailureCategory::Network => {
            format!("Sorry, the system cannot reach the server. Details: {reason}")
        }
        FailureCategory::JobFailed => format!("Sorry, the job failed: {reason}"),
        FailureCategory::Unparseable => {
            "Server response cannot be processed. Please try again.".into()
        }
        FailureCategory::Unknown => format!("Sorry, an error occurred: {reason}"),
    }
}

/// Renders the reply for a manual `status <job_id>` check.
pub fn render_poll(attempt: &PollAttempt) -> String {
    let job_id = &attempt.job_id;
    match attempt.state {
        PollState::Pending => format!("Job is still being processed. job_id: {job_id}"),
        PollState::Done => match attempt.code.as_deref() {
            Some(code) if !code.is_empty() => format!("Job done.\n{code}"),
            _ => "Job done, but no code was provided.".to_string(),
        },
        PollState::Error => format!(
            "Job failed: {}",
            attempt.reason.as_deref().unwrap_or("unknown reason")
        ),
        PollState::Unknown => match attempt.reason.as_deref() {
            Some(reason) => format!("Failed to check status (job_id: {job_id}). {reason}"),
            None => format!("Job status unknown. job_id: {job_id}"),
        },
    }
}
