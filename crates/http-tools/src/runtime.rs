//! Upstream call execution.
//!
//! One [`UpstreamClient`] is built at startup and shared by every transport task. It owns a single
//! pooled `reqwest::Client`, so concurrent tool calls reuse connections instead of opening a client
//! per call.

use crate::config::{AuthConfig, AuthType, UpstreamConfig};
use crate::safety::{redact_url, sanitize_reqwest_error};
use base64::Engine as _;
use reqwest::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT,
};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// `User-Agent` sent on every upstream call.
pub const USER_AGENT_VALUE: &str = "oas-mcp/1.0";

const JSON_MIME: &str = "application/json";
const X_API_KEY: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum HttpToolsError {
    #[error("config error: {0}")]
    Config(String),
    #[error("request error: {0}")]
    Request(String),
    #[error("http transport error: {0}")]
    Transport(String),
    #[error("upstream call timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T> = std::result::Result<T, HttpToolsError>;

impl From<reqwest::Error> for HttpToolsError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(sanitize_reqwest_error(&value))
    }
}

/// A fully bound upstream request, before base URL, default headers and auth are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path with every template placeholder already substituted.
    pub path: String,
    /// Query pairs in the order they are sent.
    pub query: Vec<(String, String)>,
    /// Caller headers; a later entry replaces an earlier one with the same name.
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl UpstreamRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Transport-neutral view of an upstream reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamResponse {
    pub status_code: u16,
    /// First value of each response header, keyed by lowercase name.
    pub headers: BTreeMap<String, String>,
    /// Decoded JSON, or the raw text when the body is not JSON. `null` when empty.
    pub body: Value,
}

impl UpstreamResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    inner: Arc<UpstreamClientInner>,
}

struct UpstreamClientInner {
    client: Client,
    base_url: String,
    timeout: Option<Duration>,
    auth: AuthConfig,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.inner.base_url)
            .field("timeout", &self.inner.timeout)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    /// Build the shared client.
    ///
    /// An unrecognized auth type is logged and otherwise ignored; calls then go out without
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Config`] if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn new(upstream: &UpstreamConfig, auth: AuthConfig) -> Result<Self> {
        let base_url = upstream.effective_base_url().to_string();
        Url::parse(&base_url)
            .map_err(|e| HttpToolsError::Config(format!("invalid upstream base_url: {e}")))?;

        if let AuthType::Other(kind) = &auth.auth_type {
            warn!(auth_type = %kind, "unsupported auth type; upstream calls carry no credentials");
        }

        let client = Client::builder()
            .build()
            .map_err(|e| HttpToolsError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            inner: Arc::new(UpstreamClientInner {
                client,
                base_url,
                timeout: upstream.call_timeout(),
                auth,
            }),
        })
    }

    /// Join the base URL and `path` with exactly one `/`, then append `query` in order.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Request`] if the result is not a valid URL.
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        build_url(&self.inner.base_url, path, query)
    }

    /// Headers for `req`: defaults, then caller headers, then auth.
    ///
    /// # Errors
    ///
    /// Returns [`HttpToolsError::Request`] for caller headers that are not valid HTTP.
    pub fn build_headers(&self, req: &UpstreamRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MIME));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if req.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MIME));
        }

        for (name, value) in &req.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpToolsError::Request(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                HttpToolsError::Request(format!("invalid value for header '{name}': {e}"))
            })?;
            headers.insert(name, value);
        }

        apply_auth(&self.inner.auth, &mut headers)?;
        Ok(headers)
    }

    /// Send `req` upstream and normalize the reply.
    ///
    /// Non-2xx replies are returned as responses, not errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be built, the call fails in transit, or the
    /// configured timeout elapses.
    pub async fn execute(&self, req: &UpstreamRequest) -> Result<UpstreamResponse> {
        let url = self.build_url(&req.path, &req.query)?;
        let headers = self.build_headers(req)?;
        let target = redact_url(&url);

        debug!(method = %req.method, url = %target, "calling upstream");

        let mut request = self
            .inner
            .client
            .request(req.method.clone(), url)
            .headers(headers);
        if let Some(body) = &req.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| HttpToolsError::Request(format!("failed to encode body: {e}")))?;
            request = request.body(bytes);
        }
        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| self.call_error(&e))?;
        let status_code = response.status().as_u16();

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_insert_with(|| String::from_utf8_lossy(value.as_bytes()).into_owned());
        }

        let bytes = response.bytes().await.map_err(|e| self.call_error(&e))?;
        let body = decode_body(&bytes);

        debug!(method = %req.method, url = %target, status = status_code, "upstream replied");

        Ok(UpstreamResponse {
            status_code,
            headers,
            body,
        })
    }

    fn call_error(&self, e: &reqwest::Error) -> HttpToolsError {
        match self.inner.timeout {
            Some(timeout) if e.is_timeout() => HttpToolsError::Timeout(timeout),
            _ => HttpToolsError::Transport(sanitize_reqwest_error(e)),
        }
    }
}

fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url =
        Url::parse(&joined).map_err(|e| HttpToolsError::Request(format!("invalid URL: {e}")))?;

    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }

    Ok(url)
}

fn apply_auth(auth: &AuthConfig, headers: &mut HeaderMap) -> Result<()> {
    match &auth.auth_type {
        AuthType::Bearer => {
            if !auth.token.is_empty() {
                headers.insert(
                    AUTHORIZATION,
                    secret_header(&format!("Bearer {}", auth.token))?,
                );
            }
        }
        AuthType::Basic => {
            if !auth.username.is_empty() && !auth.password.is_empty() {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", auth.username, auth.password));
                headers.insert(AUTHORIZATION, secret_header(&format!("Basic {encoded}"))?);
            }
        }
        AuthType::ApiKey => {
            if !auth.api_key.is_empty() {
                headers.insert(
                    AUTHORIZATION,
                    secret_header(&format!("ApiKey {}", auth.api_key))?,
                );
            }
            if !auth.token.is_empty() {
                headers.insert(
                    HeaderName::from_static(X_API_KEY),
                    secret_header(&auth.token)?,
                );
            }
        }
        AuthType::Other(kind) => {
            warn!(auth_type = %kind, "unsupported auth type; sending request without credentials");
        }
        AuthType::None => {}
    }
    Ok(())
}

fn secret_header(value: &str) -> Result<HeaderValue> {
    let mut v = HeaderValue::from_str(value)
        .map_err(|_| HttpToolsError::Config("credential is not a valid header value".into()))?;
    v.set_sensitive(true);
    Ok(v)
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Render an argument value the way it is placed into paths, queries and headers.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oas_mcp_test_support::spawn_echo_upstream;
    use serde_json::json;

    fn client(base_url: &str, auth: AuthConfig) -> UpstreamClient {
        let upstream = UpstreamConfig {
            base_url: base_url.to_string(),
            timeout: 30,
        };
        UpstreamClient::new(&upstream, auth).expect("client")
    }

    fn auth(kind: &str) -> AuthConfig {
        AuthConfig {
            auth_type: AuthType::from(kind),
            token: "tok".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            api_key: "key".to_string(),
        }
    }

    #[test]
    fn build_url_joins_with_exactly_one_slash() {
        for (base, path) in [
            ("http://h/api", "pets"),
            ("http://h/api/", "pets"),
            ("http://h/api", "/pets"),
            ("http://h/api/", "/pets"),
        ] {
            let url = build_url(base, path, &[]).expect("url");
            assert_eq!(url.as_str(), "http://h/api/pets");
        }
    }

    #[test]
    fn build_url_appends_query_in_order_and_encodes() {
        let query = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "x y&z".to_string()),
        ];
        let url = build_url("http://h", "/p", &query).expect("url");
        assert_eq!(url.query(), Some("b=2&a=x+y%26z"));
    }

    #[test]
    fn default_headers_then_caller_headers_win() {
        let c = client("http://h", AuthConfig::default());
        let mut req = UpstreamRequest::new(Method::POST, "/p");
        req.body = Some(json!({"a": 1}));
        req.headers.push(("Accept".to_string(), "text/plain".to_string()));
        req.headers.push(("x-trace".to_string(), "1".to_string()));
        req.headers.push(("x-trace".to_string(), "2".to_string()));

        let headers = c.build_headers(&req).expect("headers");
        assert_eq!(headers.get(ACCEPT).expect("accept"), "text/plain");
        assert_eq!(headers.get(USER_AGENT).expect("ua"), USER_AGENT_VALUE);
        assert_eq!(headers.get(CONTENT_TYPE).expect("ct"), JSON_MIME);
        assert_eq!(headers.get_all("x-trace").iter().count(), 1);
        assert_eq!(headers.get("x-trace").expect("trace"), "2");
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn content_type_only_with_body() {
        let c = client("http://h", AuthConfig::default());
        let req = UpstreamRequest::new(Method::GET, "/p");
        let headers = c.build_headers(&req).expect("headers");
        assert!(headers.get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn auth_is_applied_after_caller_headers() {
        let c = client("http://h", auth("bearer"));
        let mut req = UpstreamRequest::new(Method::GET, "/p");
        req.headers
            .push(("Authorization".to_string(), "caller".to_string()));
        let headers = c.build_headers(&req).expect("headers");
        assert_eq!(headers.get(AUTHORIZATION).expect("auth"), "Bearer tok");
    }

    #[test]
    fn basic_auth_encodes_username_and_password() {
        let c = client("http://h", auth("basic"));
        let headers = c
            .build_headers(&UpstreamRequest::new(Method::GET, "/"))
            .expect("headers");
        // base64("u:p")
        assert_eq!(headers.get(AUTHORIZATION).expect("auth"), "Basic dTpw");
    }

    #[test]
    fn apikey_sets_both_headers() {
        let c = client("http://h", auth("apikey"));
        let headers = c
            .build_headers(&UpstreamRequest::new(Method::GET, "/"))
            .expect("headers");
        assert_eq!(headers.get(AUTHORIZATION).expect("auth"), "ApiKey key");
        assert_eq!(headers.get(X_API_KEY).expect("x-api-key"), "tok");
    }

    #[test]
    fn none_and_unknown_auth_add_nothing() {
        for kind in ["none", "oauth2"] {
            let c = client("http://h", auth(kind));
            let headers = c
                .build_headers(&UpstreamRequest::new(Method::GET, "/"))
                .expect("headers");
            assert!(headers.get(AUTHORIZATION).is_none(), "{kind}");
            assert!(headers.get(X_API_KEY).is_none(), "{kind}");
        }
    }

    #[test]
    fn invalid_caller_header_is_a_request_error() {
        let c = client("http://h", AuthConfig::default());
        let mut req = UpstreamRequest::new(Method::GET, "/");
        req.headers.push(("bad header".to_string(), "v".to_string()));
        let err = c.build_headers(&req).unwrap_err();
        assert!(matches!(err, HttpToolsError::Request(_)));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let upstream = UpstreamConfig {
            base_url: "not a url".to_string(),
            timeout: 1,
        };
        let err = UpstreamClient::new(&upstream, AuthConfig::default()).unwrap_err();
        assert!(matches!(err, HttpToolsError::Config(_)));
    }

    #[test]
    fn decode_body_falls_back_to_text() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body(b"hello"), json!("hello"));
    }

    #[tokio::test]
    async fn execute_sends_bound_request() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let c = client(&upstream.base_url, auth("basic"));

        let mut req = UpstreamRequest::new(Method::POST, "/pets/7");
        req.query.push(("limit".to_string(), "5".to_string()));
        req.headers.push(("x-trace".to_string(), "abc".to_string()));
        req.body = Some(json!({"name": "rex"}));

        let resp = c.execute(&req).await.expect("execute");
        assert_eq!(resp.status_code, 200);
        assert!(resp.is_success());
        assert_eq!(resp.body["method"], "POST");
        assert_eq!(resp.body["path"], "/pets/7");
        assert_eq!(resp.body["query"], "limit=5");
        assert_eq!(resp.body["headers"]["x-trace"], json!(["abc"]));
        assert_eq!(resp.body["headers"]["authorization"], json!(["Basic dTpw"]));
        assert_eq!(
            resp.body["headers"]["content-type"],
            json!(["application/json"])
        );
        let sent: Value =
            serde_json::from_str(resp.body["body"].as_str().expect("body")).expect("json");
        assert_eq!(sent, json!({"name": "rex"}));
        assert_eq!(
            resp.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn execute_returns_non_success_status_as_response() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let c = client(&upstream.base_url, AuthConfig::default());

        let resp = c
            .execute(&UpstreamRequest::new(Method::GET, "/status/404"))
            .await
            .expect("execute");
        assert_eq!(resp.status_code, 404);
        assert!(!resp.is_success());
        assert_eq!(resp.body, json!({"status": 404}));
    }

    #[tokio::test]
    async fn execute_normalizes_empty_and_text_bodies() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let c = client(&upstream.base_url, AuthConfig::default());

        let empty = c
            .execute(&UpstreamRequest::new(Method::DELETE, "/empty"))
            .await
            .expect("empty");
        assert_eq!(empty.status_code, 204);
        assert_eq!(empty.body, Value::Null);

        let text = c
            .execute(&UpstreamRequest::new(Method::GET, "/text"))
            .await
            .expect("text");
        assert_eq!(text.body, json!("plain text"));
    }

    #[tokio::test]
    async fn execute_times_out() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let cfg = UpstreamConfig {
            base_url: upstream.base_url.clone(),
            timeout: 1,
        };
        let c = UpstreamClient::new(&cfg, AuthConfig::default()).expect("client");

        let err = c
            .execute(&UpstreamRequest::new(Method::GET, "/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpToolsError::Timeout(_)), "{err}");
    }

    #[tokio::test]
    async fn execute_reports_connection_failure() {
        let port = oas_mcp_test_support::pick_unused_port().expect("port");
        let c = client(&format!("http://127.0.0.1:{port}"), AuthConfig::default());
        let err = c
            .execute(&UpstreamRequest::new(Method::GET, "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpToolsError::Transport(_)), "{err}");
    }

    #[test]
    fn value_to_string_renders_scalars_plainly() {
        assert_eq!(value_to_string(&json!("a")), "a");
        assert_eq!(value_to_string(&json!(7)), "7");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&Value::Null), "");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }
}
