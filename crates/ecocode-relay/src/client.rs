// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-relaying HTTP client for the code-generation backend.
//!
//! Provides [`SessionRelayClient`], which attaches the held session credential
//! to outgoing requests, captures any credential the backend issues, and
//! folds every result into a uniform [`Envelope`].

use std::time::Duration;

use ecocode_core::{CredentialStore, EcocodeError, Envelope, RelayMethod, SessionCredential};
use reqwest::header::{ACCEPT, COOKIE, HeaderMap, SET_COOKIE};
use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

const LOGIN_ROUTE: &str = "login";
const LOGOUT_ROUTE: &str = "logout";

/// Default bound on the login and logout exchanges.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP client that relays one browser session's credential to the backend.
///
/// Relayed calls carry no client-side timeout; the backend governs how long
/// they take. Only login and logout are bounded.
#[derive(Debug, Clone)]
pub struct SessionRelayClient {
    http: reqwest::Client,
    base_url: Url,
    credential: CredentialStore,
    auth_timeout: Duration,
}

impl SessionRelayClient {
    /// Creates a client for the backend at `base_url` bound to `credential`.
    pub fn new(base_url: &str, credential: CredentialStore) -> Result<Self, EcocodeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| EcocodeError::Transport {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Self::with_http_client(http, base_url, credential)
    }

    /// Creates a client reusing an existing connection pool.
    pub fn with_http_client(
        http: reqwest::Client,
        base_url: &str,
        credential: CredentialStore,
    ) -> Result<Self, EcocodeError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| EcocodeError::Config(format!("invalid backend base_url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(EcocodeError::Config(format!(
                "backend base_url {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            http,
            base_url,
            credential,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        })
    }

    /// Overrides the login/logout timeout.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    /// The credential store this client reads and writes.
    pub fn credential(&self) -> &CredentialStore {
        &self.credential
    }

    /// Sends one request to `path` and folds the result into an [`Envelope`].
    ///
    /// Never fails: transport errors come back as an envelope with no status.
    pub async fn call(&self, method: RelayMethod, path: &str, payload: Option<&Value>) -> Envelope {
        self.call_with_query(method, path, &[], payload).await
    }

    /// Like [`call`](Self::call), with query parameters appended to the URL.
    pub async fn call_with_query(
        &self,
        method: RelayMethod,
        path: &str,
        query: &[(&str, &str)],
        payload: Option<&Value>,
    ) -> Envelope {
        let segments: Vec<&str> = route_segments(path).collect();
        self.call_segments(method, &segments, query, payload).await
    }

    /// Like [`call_with_query`](Self::call_with_query), with the path given
    /// as segments. Each segment is percent-encoded whole, so a `/` inside
    /// one never starts a new path component.
    pub async fn call_segments(
        &self,
        method: RelayMethod,
        segments: &[&str],
        query: &[(&str, &str)],
        payload: Option<&Value>,
    ) -> Envelope {
        let url = match self.endpoint(segments, query) {
            Ok(url) => url,
            Err(e) => return Envelope::unreachable(e),
        };
        self.execute(method, url, payload, true, None).await
    }

    /// Exchanges username and password for a backend session credential.
    ///
    /// The held credential is never attached to this call. On success the
    /// credential issued by the backend replaces the held one.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), EcocodeError> {
        let (username, password) = (username.trim(), password.trim());
        if username.is_empty() || password.is_empty() {
            return Err(EcocodeError::Validation(
                "username and password are required".into(),
            ));
        }

        let url = self
            .endpoint(&[LOGIN_ROUTE], &[])
            .map_err(EcocodeError::Config)?;
        let payload = json!({"username": username, "password": password});
        let envelope = self
            .execute(
                RelayMethod::Post,
                url,
                Some(&payload),
                false,
                Some(self.auth_timeout),
            )
            .await;

        let message = || {
            envelope
                .error
                .clone()
                .unwrap_or_else(|| "login failed".to_string())
        };
        match envelope.status {
            None => Err(EcocodeError::Transport {
                message: format!("backend unreachable: {}", message()),
                source: None,
            }),
            Some(status) if status >= 500 => Err(EcocodeError::Backend {
                status: Some(status),
                message: message(),
            }),
            Some(401 | 403) => Err(EcocodeError::Unauthorized(message())),
            Some(status) if status >= 400 => Err(EcocodeError::Backend {
                status: Some(status),
                message: message(),
            }),
            Some(_) => {
                if let Some(error) = envelope.field("error") {
                    return Err(EcocodeError::Unauthorized(error.to_string()));
                }
                if !self.credential.is_present() {
                    return Err(EcocodeError::Unauthorized(
                        "backend did not issue a session credential".into(),
                    ));
                }
                info!(username, "backend login succeeded");
                Ok(())
            }
        }
    }

    /// Ends the backend session. Best-effort: the held credential is cleared
    /// whatever the backend answers.
    pub async fn logout(&self) {
        if self.credential.is_present() {
            match self.endpoint(&[LOGOUT_ROUTE], &[]) {
                Ok(url) => {
                    let envelope = self
                        .execute(RelayMethod::Post, url, None, true, Some(self.auth_timeout))
                        .await;
                    if !envelope.ok {
                        debug!(status = ?envelope.status, "backend logout did not succeed");
                    }
                }
                Err(e) => warn!(error = %e, "cannot build logout URL"),
            }
        }
        self.credential.clear();
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| format!("backend base_url {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn execute(
        &self,
        method: RelayMethod,
        url: Url,
        payload: Option<&Value>,
        attach_credential: bool,
        timeout: Option<Duration>,
    ) -> Envelope {
        let path = url.path().to_string();
        let mut request = match method {
            RelayMethod::Get => self.http.get(url),
            RelayMethod::Post => self.http.post(url),
        }
        .header(ACCEPT, "application/json");

        if attach_credential {
            if let Some(credential) = self.credential.current() {
                request = request.header(COOKIE, credential.value());
            }
        }
        if let Some(body) = payload {
            request = request.json(body);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, path = %path, error = %e, "backend unreachable");
                return Envelope::unreachable(e.to_string());
            }
        };

        let status = response.status();
        self.capture_credential(response.headers());
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(%method, path = %path, status = status.as_u16(), error = %e, "failed to read backend response");
                return unreadable(status, &e.to_string());
            }
        };
        let data = serde_json::from_str::<Value>(&body).ok();
        debug!(%method, path = %path, status = status.as_u16(), json = data.is_some(), "backend responded");

        if status.is_success() {
            return Envelope {
                ok: true,
                status: Some(status.as_u16()),
                data,
                error: None,
            };
        }
        let error = error_text(data.as_ref(), status);
        Envelope {
            ok: false,
            status: Some(status.as_u16()),
            data,
            error: Some(error),
        }
    }

    /// Replaces the held credential with the first `Set-Cookie` pair, if any.
    fn capture_credential(&self, headers: &HeaderMap) {
        let Some(header) = headers.get(SET_COOKIE) else {
            return;
        };
        match header.to_str().ok().and_then(SessionCredential::from_set_cookie) {
            Some(credential) => {
                self.credential.replace(credential);
                debug!("session credential captured");
            }
            None => debug!("ignoring malformed Set-Cookie header"),
        }
    }
}

/// Splits a route such as `check-status/abc` into its path segments.
fn route_segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/').split('/')
}

/// Envelope for a response whose body could not be read. Never `ok`, even
/// on a 2xx status, since nothing usable arrived.
fn unreadable(status: StatusCode, error: &str) -> Envelope {
    Envelope {
        ok: false,
        status: Some(status.as_u16()),
        data: None,
        error: Some(format!("failed to read backend response: {error}")),
    }
}

/// Error text for a non-success response: the body's `error`, else its
/// `message`, else the status line.
fn error_text(data: Option<&Value>, status: StatusCode) -> String {
    ["error", "message"]
        .iter()
        .find_map(|key| {
            data.and_then(|d| d.get(*key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("backend returned {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> SessionRelayClient {
        SessionRelayClient::new(base_url, CredentialStore::new()).unwrap()
    }

    #[test]
    fn endpoint_joins_base_path() {
        let client = test_client("http://localhost:5000/api/");
        let segments: Vec<&str> = route_segments("check-status/abc").collect();
        let url = client
            .endpoint(&segments, &[("user_id", "7"), ("assessment_id", "a b")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:5000/api/check-status/abc?user_id=7&assessment_id=a+b"
        );
    }

    #[test]
    fn endpoint_keeps_each_segment_whole() {
        let client = test_client("http://localhost:5000/");
        let url = client.endpoint(&["check-status", "a/b"], &[]).unwrap();
        assert_eq!(url.path(), "/check-status/a%2Fb");
        let url = client.endpoint(&["check-status", "../login"], &[]).unwrap();
        assert_eq!(url.path(), "/check-status/..%2Flogin");
    }

    #[test]
    fn unreadable_body_keeps_status_and_is_not_ok() {
        let envelope = unreadable(StatusCode::OK, "connection reset");
        assert!(!envelope.ok);
        assert_eq!(envelope.status, Some(200));
        assert!(envelope.data.is_none());
        assert_eq!(
            envelope.error.as_deref(),
            Some("failed to read backend response: connection reset")
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = SessionRelayClient::new("not a url", CredentialStore::new()).unwrap_err();
        assert!(matches!(err, EcocodeError::Config(_)));
    }

    #[test]
    fn error_text_prefers_error_then_message() {
        let status = StatusCode::BAD_REQUEST;
        let both = serde_json::json!({"error": "e", "message": "m"});
        assert_eq!(error_text(Some(&both), status), "e");
        let message = serde_json::json!({"message": "m"});
        assert_eq!(error_text(Some(&message), status), "m");
        assert_eq!(error_text(None, status), "backend returned 400 Bad Request");
    }

    #[tokio::test]
    async fn call_returns_ok_envelope_with_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .mount(&server)
            .await;

        let envelope = test_client(&server.uri())
            .call(RelayMethod::Get, "courses", None)
            .await;
        assert!(envelope.ok);
        assert_eq!(envelope.status, Some(200));
        assert_eq!(envelope.data, Some(serde_json::json!({"items": []})));
        assert!(envelope.error.is_none());
    }

    #[tokio::test]
    async fn call_sends_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-code"))
            .and(body_json(serde_json::json!({"prompt": "hi"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let payload = serde_json::json!({"prompt": "hi"});
        let envelope = test_client(&server.uri())
            .call(RelayMethod::Post, "generate-code", Some(&payload))
            .await;
        assert!(envelope.ok);
        assert!(envelope.data.is_none());
    }

    #[tokio::test]
    async fn call_forwards_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check-status/job-1"))
            .and(query_param("user_id", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "pending"})))
            .expect(1)
            .mount(&server)
            .await;

        let envelope = test_client(&server.uri())
            .call_with_query(RelayMethod::Get, "check-status/job-1", &[("user_id", "42")], None)
            .await;
        assert!(envelope.ok);
    }

    #[tokio::test]
    async fn error_envelope_uses_body_error_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-code"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": "quota exceeded"})),
            )
            .mount(&server)
            .await;

        let envelope = test_client(&server.uri())
            .call(RelayMethod::Post, "generate-code", None)
            .await;
        assert!(!envelope.ok);
        assert_eq!(envelope.status, Some(429));
        assert_eq!(envelope.error.as_deref(), Some("quota exceeded"));
    }

    #[tokio::test]
    async fn non_json_error_body_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let envelope = test_client(&server.uri())
            .call(RelayMethod::Get, "courses", None)
            .await;
        assert!(!envelope.ok);
        assert_eq!(envelope.status, Some(502));
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.as_deref(), Some("backend returned 502 Bad Gateway"));
    }

    #[tokio::test]
    async fn unreachable_backend_gives_statusless_envelope() {
        // Nothing listens on port 9 of localhost in test environments.
        let envelope = test_client("http://127.0.0.1:9")
            .call(RelayMethod::Get, "courses", None)
            .await;
        assert!(!envelope.ok);
        assert!(envelope.status.is_none());
        assert!(envelope.error.is_some());
    }

    #[tokio::test]
    async fn held_credential_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/courses"))
            .and(header("cookie", "session=abc"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = CredentialStore::with_credential(SessionCredential::new("session=abc"));
        let client = SessionRelayClient::new(&server.uri(), store).unwrap();
        assert!(client.call(RelayMethod::Get, "courses", None).await.ok);
    }

    #[tokio::test]
    async fn set_cookie_is_captured_even_on_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .insert_header("set-cookie", "session=fresh; HttpOnly; Path=/"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let envelope = client.call(RelayMethod::Post, "generate-code", None).await;
        assert!(!envelope.ok);
        assert_eq!(client.credential().current().unwrap().value(), "session=fresh");
    }

    #[tokio::test]
    async fn login_captures_credential_without_sending_one() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_json(serde_json::json!({"username": "ana", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"message": "Login successful", "user_id": 7}))
                    .insert_header("set-cookie", "session=new; Path=/"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = CredentialStore::with_credential(SessionCredential::new("session=old"));
        let client = SessionRelayClient::new(&server.uri(), store).unwrap();
        client.login(" ana ", "pw").await.unwrap();
        assert_eq!(client.credential().current().unwrap().value(), "session=new");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("cookie").is_none());
    }

    #[tokio::test]
    async fn login_rejection_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": "Invalid credentials"})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).login("ana", "bad").await.unwrap_err();
        match err {
            EcocodeError::Unauthorized(message) => assert_eq!(message, "Invalid credentials"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_server_error_maps_to_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).login("ana", "pw").await.unwrap_err();
        assert!(matches!(err, EcocodeError::Backend { status: Some(503), .. }));
    }

    #[tokio::test]
    async fn login_without_issued_credential_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).login("ana", "pw").await.unwrap_err();
        assert!(matches!(err, EcocodeError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let client = test_client("http://127.0.0.1:9");
        assert!(matches!(
            client.login("  ", "pw").await.unwrap_err(),
            EcocodeError::Validation(_)
        ));
        assert!(matches!(
            client.login("ana", "").await.unwrap_err(),
            EcocodeError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn logout_clears_credential_even_when_backend_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logout"))
            .and(header("cookie", "session=abc"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = CredentialStore::with_credential(SessionCredential::new("session=abc"));
        let client = SessionRelayClient::new(&server.uri(), store).unwrap();
        client.logout().await;
        assert!(!client.credential().is_present());
    }

    #[tokio::test]
    async fn logout_without_credential_skips_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        test_client(&server.uri()).logout().await;
    }

    #[tokio::test]
    async fn truncated_body_is_a_failed_envelope_with_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 64\r\n\r\n{\"code\":",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let client = test_client(&format!("http://{addr}"));
        let envelope = client.call(RelayMethod::Get, "generate-code", None).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.status, Some(200));
        assert!(
            envelope
                .error
                .as_deref()
                .unwrap()
                .starts_with("failed to read backend response")
        );
    }
}
