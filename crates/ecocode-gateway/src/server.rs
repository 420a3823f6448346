// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::time::{Duration, Instant};

use axum::{
    Router,
    routing::{get, post},
};
use ecocode_config::EcocodeConfig;
use ecocode_core::{CredentialStore, EcocodeError};
use ecocode_relay::{JobPoller, PollPolicy, SessionRelayClient};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session::{SessionRegistry, spawn_session_sweeper, sweep_period};

/// Idle time after which a browser session is forgotten, unless configured.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

/// Everything needed to build a relay client for one browser session.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    http: reqwest::Client,
    base_url: String,
    policy: PollPolicy,
    auth_timeout: Duration,
}

impl RelaySettings {
    pub fn new(base_url: impl Into<String>, policy: PollPolicy, auth_timeout: Duration) -> Result<Self, EcocodeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| EcocodeError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            policy,
            auth_timeout,
        })
    }

    pub fn from_config(config: &EcocodeConfig) -> Result<Self, EcocodeError> {
        Self::new(
            config.backend.base_url.clone(),
            PollPolicy::from(&config.polling),
            config.backend.auth_timeout(),
        )
    }

    /// Client bound to `credential`, sharing this gateway's connection pool.
    pub fn client(&self, credential: CredentialStore) -> Result<SessionRelayClient, EcocodeError> {
        Ok(
            SessionRelayClient::with_http_client(self.http.clone(), &self.base_url, credential)?
                .with_auth_timeout(self.auth_timeout),
        )
    }

    pub fn poller(&self, credential: CredentialStore) -> Result<JobPoller, EcocodeError> {
        Ok(JobPoller::new(self.client(credential)?, self.policy))
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub sessions: SessionRegistry,
    pub relay: RelaySettings,
    /// Name of the browser session cookie.
    pub cookie_name: String,
    /// Cancelled when the server shuts down; chat polling runs on child tokens.
    pub shutdown: CancellationToken,
    /// Sessions unused for longer than this are evicted.
    pub session_idle: Duration,
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(relay: RelaySettings, cookie_name: impl Into<String>, shutdown: CancellationToken) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            relay,
            cookie_name: cookie_name.into(),
            shutdown,
            session_idle: DEFAULT_SESSION_IDLE,
            start_time: Instant::now(),
        }
    }

    pub fn with_session_idle(mut self, idle: Duration) -> Self {
        self.session_idle = idle;
        self
    }

    pub fn from_config(config: &EcocodeConfig, shutdown: CancellationToken) -> Result<Self, EcocodeError> {
        Ok(Self::new(
            RelaySettings::from_config(config)?,
            config.gateway.session_cookie.clone(),
            shutdown,
        )
        .with_session_idle(config.gateway.session_idle()))
    }
}

/// Gateway server configuration (mirrors GatewayConfig from ecocode-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&ecocode_config::model::GatewayConfig> for ServerConfig {
    fn from(config: &ecocode_config::model::GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Builds the gateway router:
/// - POST /chat
/// - GET /status/{job_id}
/// - POST /login, POST /logout
/// - GET /backend/{resource}
/// - GET /health
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/chat", post(handlers::post_chat))
        .route("/status/{job_id}", get(handlers::get_status))
        .route("/login", post(handlers::post_login))
        .route("/logout", post(handlers::post_logout))
        .route("/backend/{resource}", get(handlers::get_backend_resource))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `config.host:config.port` and serves until the state's shutdown
/// token is cancelled. Idle sessions are swept for as long as it runs.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), EcocodeError> {
    let shutdown = state.shutdown.clone();
    let (sessions, idle) = (state.sessions.clone(), state.session_idle);
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| EcocodeError::Gateway {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("Gateway server listening on {addr}");

    let sweeper = spawn_session_sweeper(sessions, idle, sweep_period(idle), shutdown.child_token());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    sweeper.abort();
    served.map_err(|e| EcocodeError::Gateway {
        message: format!("gateway server error: {e}"),
        source: Some(Box::new(e)),
    })?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
