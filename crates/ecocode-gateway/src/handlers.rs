// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use ecocode_core::{
    CredentialStore, EcocodeError, GenerationOutcome, GenerationRequest, JobId, PollAttempt,
    RelayMethod, ResponseMode, reply,
};
use ecocode_relay::PollContext;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::GatewayState;
use crate::session::{clear_session_cookie, session_cookie};

/// Prefix a chat message can carry to force fresh generation.
const FORCE_PREFIX: &str = "__force_gpt__ ";

const STATUS_COMMAND: &str = "status ";

/// Backend resources the gateway relays read-only.
pub const RELAYED_RESOURCES: &[&str] = &[
    "token-usage-daily",
    "gamification",
    "impact-summary",
    "courses",
    "assessments",
];

/// Request body for POST /chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub response_mode: Option<ResponseMode>,
    #[serde(default)]
    pub assessment_id: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// Response body for POST /chat and GET /status/{job_id}.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    /// Text to show in the chat window.
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<GenerationOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<PollAttempt>,
}

/// Request body for POST /login.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub assessment_id: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// HTTP status for an error surfaced to the browser.
fn status_for(error: &EcocodeError) -> StatusCode {
    match error {
        EcocodeError::Validation(_) => StatusCode::BAD_REQUEST,
        EcocodeError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        EcocodeError::Backend { .. } | EcocodeError::Transport { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn internal_error(error: &EcocodeError) -> Response {
    tracing::error!(error = %error, "cannot build relay client");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
}

/// Job id of a `status <job_id>` message.
fn parse_status_command(message: &str) -> Option<&str> {
    let head = message.get(..STATUS_COMMAND.len())?;
    if !head.eq_ignore_ascii_case(STATUS_COMMAND) {
        return None;
    }
    Some(message[STATUS_COMMAND.len()..].trim()).filter(|id| !id.is_empty())
}

/// POST /chat
///
/// Runs a manual status check for `status <job_id>` messages, otherwise
/// submits the message as a generation request and polls it to an outcome.
pub async fn post_chat(
    State(state): State<GatewayState>,
    jar: CookieJar,
    Json(body): Json<ChatRequest>,
) -> Response {
    let message = body.message.trim();
    let resolved = state.sessions.resolve(&jar, &state.cookie_name);

    if let Some(job_id) = parse_status_command(message) {
        let session = resolved.map(|(_, s)| s);
        let context = PollContext {
            user_id: session.as_ref().map(|s| s.user_id.clone()),
            assessment_id: body.assessment_id.clone(),
        };
        let credential = session
            .as_ref()
            .map(|s| s.credential.clone())
            .unwrap_or_default();
        return status_reply(&state, credential, &JobId::from(job_id), &context).await;
    }

    let (id, session) = match resolved {
        Some((id, session)) if session.is_authenticated() => (id, session),
        stale => {
            let jar = forget_session(&state, jar, stale.map(|(id, _)| id));
            return (
                jar,
                error_response(
                    StatusCode::UNAUTHORIZED,
                    "You are not logged in. Please log in first to connect to the server.",
                ),
            )
                .into_response();
        }
    };

    let (prefixed, prompt) = match message.strip_prefix(FORCE_PREFIX) {
        Some(rest) => (true, rest),
        None => (false, message),
    };
    let mut request = match GenerationRequest::new(prompt) {
        Ok(request) => request.forced(body.force || prefixed),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Please enter a question first."),
    };
    if let Some(language) = body.language {
        request = request.with_language(language);
    }
    if let Some(mode) = body.response_mode {
        request = request.with_response_mode(mode);
    }
    if let Some(assessment_id) = body.assessment_id {
        request = request.with_assessment(assessment_id);
    }

    let poller = match state.relay.poller(session.credential.clone()) {
        Ok(poller) => poller,
        Err(e) => return internal_error(&e),
    };
    let context = PollContext {
        user_id: Some(session.user_id.clone()),
        assessment_id: None,
    };

    // Polling stops on server shutdown or when this request is dropped.
    let cancel = state.shutdown.child_token();
    let _guard = cancel.clone().drop_guard();
    let outcome = poller.submit(&request, &context, &cancel).await;
    tracing::info!(
        user_id = %session.user_id,
        forced = request.is_forced(),
        outcome = outcome_label(&outcome),
        "chat submission finished"
    );

    // The backend rejected the credential; this browser has to log in again.
    let jar = if session.is_authenticated() {
        jar
    } else {
        forget_session(&state, jar, Some(id))
    };
    let body = ChatResponse {
        reply: reply::render_outcome(&outcome),
        outcome: Some(outcome),
        attempt: None,
    };
    (jar, Json(body)).into_response()
}

/// Drops the session `id`, if any, and clears its cookie.
fn forget_session(state: &GatewayState, jar: CookieJar, id: Option<String>) -> CookieJar {
    let Some(id) = id else {
        return jar;
    };
    if state.sessions.remove(&id).is_some() {
        tracing::info!("browser session signed out by backend");
    }
    jar.remove(clear_session_cookie(&state.cookie_name))
}

fn outcome_label(outcome: &GenerationOutcome) -> &'static str {
    match outcome {
        GenerationOutcome::Immediate { .. } => "immediate",
        GenerationOutcome::Queued { .. } => "queued",
        GenerationOutcome::Failed { .. } => "failed",
        GenerationOutcome::Exhausted { .. } => "exhausted",
        GenerationOutcome::Cancelled { .. } => "cancelled",
    }
}

async fn status_reply(
    state: &GatewayState,
    credential: CredentialStore,
    job_id: &JobId,
    context: &PollContext,
) -> Response {
    let poller = match state.relay.poller(credential) {
        Ok(poller) => poller,
        Err(e) => return internal_error(&e),
    };
    let attempt = poller.check_status(job_id, context).await;
    Json(ChatResponse {
        reply: reply::render_poll(&attempt),
        outcome: None,
        attempt: Some(attempt),
    })
    .into_response()
}

/// GET /status/{job_id}
pub async fn get_status(
    State(state): State<GatewayState>,
    jar: CookieJar,
    Path(job_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let session = state.sessions.resolve(&jar, &state.cookie_name).map(|(_, s)| s);
    let context = PollContext {
        user_id: session.as_ref().map(|s| s.user_id.clone()),
        assessment_id: query.assessment_id,
    };
    let credential = session.map(|s| s.credential.clone()).unwrap_or_default();
    status_reply(&state, credential, &JobId(job_id), &context).await
}

/// POST /login
///
/// Creates a browser session if the request has none, then logs it in to
/// the backend. A session created here is dropped again if login fails.
pub async fn post_login(
    State(state): State<GatewayState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Response {
    let (id, session, created) = match state.sessions.resolve(&jar, &state.cookie_name) {
        Some((id, session)) => (id, session, false),
        None => {
            let (id, session) = state.sessions.create();
            (id, session, true)
        }
    };

    let client = match state.relay.client(session.credential.clone()) {
        Ok(client) => client,
        Err(e) => return internal_error(&e),
    };

    match client.login(&body.username, &body.password).await {
        Ok(()) => {
            state.sessions.restore(&id, &session);
            let jar = jar.add(session_cookie(&state.cookie_name, &id));
            (jar, Json(json!({"ok": true}))).into_response()
        }
        Err(e) => {
            if created {
                state.sessions.remove(&id);
            }
            tracing::info!(error = %e, "login rejected");
            let message = match &e {
                EcocodeError::Validation(m) | EcocodeError::Unauthorized(m) => m.clone(),
                EcocodeError::Backend { message, .. } => message.clone(),
                other => other.to_string(),
            };
            error_response(status_for(&e), message)
        }
    }
}

/// POST /logout
///
/// Best-effort backend logout, then forgets the browser session.
pub async fn post_logout(State(state): State<GatewayState>, jar: CookieJar) -> Response {
    if let Some((id, session)) = state.sessions.resolve(&jar, &state.cookie_name) {
        match state.relay.client(session.credential.clone()) {
            Ok(client) => client.logout().await,
            Err(_) => session.credential.clear(),
        }
        state.sessions.remove(&id);
    }
    let jar = jar.remove(clear_session_cookie(&state.cookie_name));
    (jar, Json(json!({"ok": true}))).into_response()
}

/// GET /backend/{resource}
///
/// Relays an authenticated read to one of [`RELAYED_RESOURCES`], returning
/// the backend's status and body.
pub async fn get_backend_resource(
    State(state): State<GatewayState>,
    jar: CookieJar,
    Path(resource): Path<String>,
    Query(query): Query<Vec<(String, String)>>,
) -> Response {
    if !RELAYED_RESOURCES.contains(&resource.as_str()) {
        return error_response(StatusCode::NOT_FOUND, format!("unknown resource: {resource}"));
    }
    let (id, session) = match state.sessions.resolve(&jar, &state.cookie_name) {
        Some((id, session)) if session.is_authenticated() => (id, session),
        stale => {
            let jar = forget_session(&state, jar, stale.map(|(id, _)| id));
            return (
                jar,
                error_response(StatusCode::UNAUTHORIZED, "Unauthorized. Please log in."),
            )
                .into_response();
        }
    };

    let client = match state.relay.client(session.credential.clone()) {
        Ok(client) => client,
        Err(e) => return internal_error(&e),
    };
    let pairs: Vec<(&str, &str)> = query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let envelope = client
        .call_with_query(RelayMethod::Get, &resource, &pairs, None)
        .await;
    let jar = if envelope.status == Some(401) {
        session.credential.clear();
        forget_session(&state, jar, Some(id))
    } else {
        jar
    };

    let status = envelope
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let body = envelope.data.unwrap_or_else(|| {
        json!({"error": envelope.error.unwrap_or_else(|| "Empty response from backend".into())})
    });
    (status, jar, Json(body)).into_response()
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        sessions: state.sessions.len(),
    })
}
