//! Shared helpers for oas-mcp tests: child-process guards, port picking, readiness polling and
//! an in-process echo upstream.

use anyhow::Context as _;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use serde_json::{Map, Value, json};
use std::net::TcpListener;
use std::process::Child;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct KillOnDrop(pub Child);

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        let _ = self.0.kill();
    }
}

/// Pick an unused TCP port on localhost.
///
/// The port is not reserved; another process may still bind it first.
///
/// # Errors
///
/// Returns an error if binding an ephemeral localhost port fails.
pub fn pick_unused_port() -> anyhow::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("bind ephemeral port")?;
    Ok(listener.local_addr()?.port())
}

/// Poll an HTTP URL until it returns a success status.
///
/// # Errors
///
/// Returns an error if the timeout elapses first.
pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let start = Instant::now();
    loop {
        if start.elapsed() > timeout_dur {
            anyhow::bail!("timed out waiting for {url}");
        }

        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}

/// A running echo upstream. Stops when dropped.
///
/// Routes:
/// - `/status/{code}` replies with that status and `{"status": code}`
/// - `/empty` replies `204` with no body
/// - `/text` replies `200` with a `text/plain` body
/// - `/slow` sleeps two seconds, then echoes
/// - anything else echoes `{method, path, query, headers, body}` where `headers` maps each
///   lowercase name to all of its values and `body` is the raw request body as text
pub struct EchoUpstream {
    pub base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for EchoUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Start an [`EchoUpstream`] on an ephemeral localhost port.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn spawn_echo_upstream() -> anyhow::Result<EchoUpstream> {
    let app = Router::new()
        .route("/status/{code}", any(status_handler))
        .route("/empty", any(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/text",
            any(|| async { ([("content-type", "text/plain")], "plain text") }),
        )
        .route("/slow", any(slow_handler))
        .route("/", any(echo_handler))
        .route("/{*path}", any(echo_handler));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind echo upstream")?;
    let addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });
    let handle = tokio::spawn(async move {
        let _ = server.await;
    });

    Ok(EchoUpstream {
        base_url: format!("http://{addr}"),
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

async fn echo_handler(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let mut echoed: Map<String, Value> = Map::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        echoed.insert(name.as_str().to_string(), Value::Array(values));
    }

    axum::Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query().unwrap_or(""),
        "headers": echoed,
        "body": String::from_utf8_lossy(&body),
    }))
    .into_response()
}

async fn status_handler(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(json!({ "status": code }))).into_response()
}

async fn slow_handler(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    tokio::time::sleep(Duration::from_secs(2)).await;
    echo_handler(method, uri, headers, body).await
}
