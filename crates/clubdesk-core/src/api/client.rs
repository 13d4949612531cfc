//! API client for the student club REST API.
//!
//! `ApiClient` turns an [`ApiRequest`] into an [`Envelope`] or an
//! [`ApiError`]. The network call itself goes through a [`Transport`],
//! which is `HttpTransport` in production and a scripted double in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{header, Client};
use tracing::{debug, warn};

use crate::auth::SessionStore;

use super::request::{ApiRequest, Envelope, Method};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default API root when neither config nor environment provide one
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
/// A slow request turns into a network error instead of loading forever.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Upper bound of the random jitter added to each backoff.
const BACKOFF_JITTER_MS: u64 = 250;

/// Message used when a 2xx envelope reports failure without saying why
const REJECTED_WITHOUT_MESSAGE: &str = "Request was not accepted";

// ============================================================================
// Transport
// ============================================================================

/// Status code and body of an HTTP exchange, before envelope parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Sends one request over the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<RawResponse, ApiError>;
}

/// `reqwest`-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest, token: Option<&str>) -> Result<RawResponse, ApiError> {
        let url = self.url(&request.path);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json");

        let pairs = request.params.to_pairs();
        if !pairs.is_empty() {
            builder = builder.query(&pairs);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(method = %request.method, url = %url, status, "Response received");

        Ok(RawResponse { status, body })
    }
}

// ============================================================================
// Client
// ============================================================================

/// API client shared by the query cache and the endpoint layer.
/// Clone is cheap - transport and session are shared.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    /// Client talking HTTP to `base_url`.
    pub fn http(base_url: &str, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        Ok(Self::new(Arc::new(HttpTransport::new(base_url)?), session))
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Perform a request and normalize the outcome.
    ///
    /// The bearer token is attached when the request is authenticated and a
    /// session exists. Only 429 responses are retried.
    pub async fn request(&self, request: &ApiRequest) -> Result<Envelope, ApiError> {
        let token = if request.authenticated {
            self.session.token()
        } else {
            None
        };

        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let raw = self.transport.send(request, token.as_deref()).await?;

            if raw.status == 429 && retries < MAX_RATE_LIMIT_RETRIES {
                retries += 1;
                let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
                warn!(
                    path = %request.path,
                    retry = retries,
                    backoff_ms = backoff_ms,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            return Self::into_envelope(raw);
        }
    }

    /// Map a raw response to an envelope or an error.
    fn into_envelope(raw: RawResponse) -> Result<Envelope, ApiError> {
        let parsed = serde_json::from_str::<Envelope>(&raw.body).ok();

        if !(200..300).contains(&raw.status) {
            let message = parsed.as_ref().and_then(|e| e.message.as_deref());
            return Err(ApiError::from_status(raw.status, message, &raw.body));
        }

        let envelope = parsed.ok_or_else(|| {
            ApiError::InvalidResponse(format!(
                "expected JSON envelope, got: {}",
                ApiError::truncate_body(&raw.body)
            ))
        })?;

        if !envelope.success {
            let message = envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| REJECTED_WITHOUT_MESSAGE.to_string());
            return Err(ApiError::Rejected(message));
        }

        Ok(envelope)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::QueryParams;
    use crate::testing::{envelope, failure, session_with_token, ScriptedTransport};
    use serde_json::json;

    #[tokio::test]
    async fn test_attaches_token_when_present() {
        let transport = ScriptedTransport::ok(json!([]));
        let client = ApiClient::new(transport.clone(), session_with_token("tok-123"));

        client.request(&ApiRequest::get("/student/applications")).await.expect("ok");

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].token.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_omits_token_without_session_and_for_anonymous_requests() {
        let transport = ScriptedTransport::ok(json!({}));
        let client = ApiClient::new(transport.clone(), Arc::new(SessionStore::in_memory()));
        client.request(&ApiRequest::get("/student/dashboard")).await.expect("ok");

        let logged_in = ApiClient::new(transport.clone(), session_with_token("tok"));
        logged_in
            .request(&ApiRequest::post("/auth/student/login").anonymous())
            .await
            .expect("ok");

        let calls = transport.calls();
        assert_eq!(calls[0].token, None);
        assert_eq!(calls[1].token, None);
    }

    #[tokio::test]
    async fn test_success_false_is_rejected_with_verbatim_message() {
        let transport = ScriptedTransport::new(|_| {
            Ok(RawResponse {
                status: 200,
                body: r#"{"success": false, "message": "To'garak to'lgan"}"#.to_string(),
            })
        });
        let client = ApiClient::new(transport, session_with_token("t"));

        let err = client
            .request(&ApiRequest::post("/student/club/7/apply"))
            .await
            .expect_err("rejected");
        assert_eq!(err, ApiError::Rejected("To'garak to'lgan".to_string()));
    }

    #[tokio::test]
    async fn test_http_failure_uses_server_message() {
        let transport = ScriptedTransport::new(|_| Ok(failure(401, "Token muddati tugagan")));
        let client = ApiClient::new(transport, session_with_token("t"));

        let err = client.request(&ApiRequest::get("/auth/profile")).await.expect_err("401");
        assert_eq!(err, ApiError::Unauthorized("Token muddati tugagan".to_string()));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_invalid_response() {
        let transport = ScriptedTransport::new(|_| {
            Ok(RawResponse { status: 200, body: "<html>proxy</html>".to_string() })
        });
        let client = ApiClient::new(transport, session_with_token("t"));

        let err = client.request(&ApiRequest::get("/student/clubs")).await.expect_err("html");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_network_errors_are_not_retried() {
        let transport = ScriptedTransport::new(|_| Err(ApiError::Network("connection refused".into())));
        let client = ApiClient::new(transport.clone(), session_with_token("t"));

        let err = client.request(&ApiRequest::get("/student/my-clubs")).await.expect_err("net");
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_is_retried_then_succeeds() {
        let transport = ScriptedTransport::sequence(vec![
            Ok(failure(429, "slow down")),
            Ok(failure(429, "slow down")),
            Ok(envelope(json!({"ok": true}))),
        ]);
        let client = ApiClient::new(transport.clone(), session_with_token("t"));

        let env = client.request(&ApiRequest::get("/student/dashboard")).await.expect("ok");
        assert_eq!(env.data, Some(json!({"ok": true})));
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let transport = ScriptedTransport::new(|_| Ok(failure(429, "slow down")));
        let client = ApiClient::new(transport.clone(), session_with_token("t"));

        let err = client.request(&ApiRequest::get("/student/dashboard")).await.expect_err("429");
        assert_eq!(err, ApiError::RateLimited);
        assert_eq!(transport.call_count(), MAX_RATE_LIMIT_RETRIES as usize + 1);
    }

    #[tokio::test]
    async fn test_params_reach_transport_without_empty_values() {
        let transport = ScriptedTransport::ok(json!({"clubs": []}));
        let client = ApiClient::new(transport.clone(), session_with_token("t"));

        let params = QueryParams::new().with("search", "").with("page", 1u32);
        client
            .request(&ApiRequest::get("/student/clubs").with_params(params))
            .await
            .expect("ok");

        assert_eq!(transport.calls()[0].request.params.to_pairs(), vec![("page".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_http_transport_trims_trailing_slash() {
        let transport = HttpTransport::new("http://localhost:5000/api/").expect("client");
        assert_eq!(transport.url("/student/clubs"), "http://localhost:5000/api/student/clubs");
    }
}
