// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted code-generation backend built on wiremock.

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock backend answering the routes the relay talks to.
///
/// Responses mounted for the same route are served in mount order; the last
/// one keeps answering once the earlier ones are used up.
pub struct MockBackend {
    server: MockServer,
}

impl MockBackend {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying server, for custom mocks and expectations.
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Answers `POST /generate-code`.
    pub async fn on_generate(&self, status: u16, body: Value) {
        self.mount("POST", "/generate-code", json_response(status, body), None)
            .await;
    }

    /// Answers `POST /enqueue-gpt`.
    pub async fn on_enqueue(&self, status: u16, body: Value) {
        self.mount("POST", "/enqueue-gpt", json_response(status, body), None)
            .await;
    }

    /// Answers `GET /check-status/{job_id}` with `replies` in order.
    /// `job_id` is matched as sent on the wire, percent-encoded.
    pub async fn on_status_sequence(&self, job_id: &str, replies: Vec<(u16, Value)>) {
        let route = format!("/check-status/{job_id}");
        let last = replies.len().saturating_sub(1);
        for (i, (status, body)) in replies.into_iter().enumerate() {
            let limit = (i < last).then_some(1);
            self.mount("GET", &route, json_response(status, body), limit)
                .await;
        }
    }

    /// Answers `POST /login`, optionally issuing a session cookie.
    pub async fn on_login(&self, status: u16, body: Value, set_cookie: Option<&str>) {
        let mut response = json_response(status, body);
        if let Some(cookie) = set_cookie {
            response = response.insert_header("set-cookie", cookie);
        }
        self.mount("POST", "/login", response, None).await;
    }

    /// Answers `POST /logout` with 200.
    pub async fn on_logout(&self) {
        self.mount(
            "POST",
            "/logout",
            json_response(200, serde_json::json!({"message": "Logged out"})),
            None,
        )
        .await;
    }

    /// Answers `GET {route}` with a fixed response.
    pub async fn on_get(&self, route: &str, status: u16, body: Value) {
        self.mount("GET", route, json_response(status, body), None)
            .await;
    }

    /// Requests received on `route`, in arrival order.
    pub async fn requests_to(&self, route: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == route)
            .collect()
    }

    /// `Cookie` header of each request received on `route`.
    pub async fn cookies_sent_to(&self, route: &str) -> Vec<Option<String>> {
        self.requests_to(route)
            .await
            .iter()
            .map(|r| {
                r.headers
                    .get("cookie")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect()
    }

    async fn mount(
        &self,
        http_method: &str,
        route: &str,
        response: ResponseTemplate,
        limit: Option<u64>,
    ) {
        let mock = Mock::given(method(http_method))
            .and(path(route))
            .respond_with(response);
        let mock = match limit {
            Some(n) => mock.up_to_n_times(n),
            None => mock,
        };
        mock.mount(&self.server).await;
    }
}

fn json_response(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_sequence_is_served_in_order() {
        let backend = MockBackend::start().await;
        backend
            .on_status_sequence(
                "j1",
                vec![
                    (200, serde_json::json!({"status": "pending"})),
                    (200, serde_json::json!({"status": "done", "code": "x"})),
                ],
            )
            .await;

        let client =
            ecocode_relay::SessionRelayClient::new(&backend.uri(), Default::default()).unwrap();
        let mut statuses = Vec::new();
        for _ in 0..3 {
            let body = client
                .call(ecocode_core::RelayMethod::Get, "check-status/j1", None)
                .await
                .data
                .unwrap();
            statuses.push(body["status"].as_str().unwrap_or_default().to_string());
        }
        assert_eq!(statuses, ["pending", "done", "done"]);
        assert_eq!(backend.requests_to("/check-status/j1").await.len(), 3);
    }
}
