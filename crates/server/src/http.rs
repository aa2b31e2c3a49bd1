//! HTTP transports: `POST /mcp` (http and sse modes) and `GET /sse` (sse mode).

use crate::config::{Mode, ServerConfig};
use crate::dispatcher::Dispatcher;
use crate::protocol::CallEnvelope;
use anyhow::Context as _;
use axum::{
    Extension, Json, Router,
    body::Bytes,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt as _, future, stream};
use serde::Serialize;
use std::convert::Infallible;
use std::future::IntoFuture as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Path clients POST requests to; also announced by the SSE `endpoint` event.
pub const MCP_PATH: &str = "/mcp";

/// What `GET /api/config` reports about the loaded document.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub swagger_file: String,
    pub swagger_sha256: String,
    pub tools_count: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub source: SourceInfo,
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState, mode: Mode) -> Router {
    let mut app = Router::new()
        .route(MCP_PATH, post(handle_mcp).fallback(method_not_allowed))
        .route("/api/config", get(api_config))
        .route("/health", get(health));
    if mode == Mode::Sse {
        app = app.route("/sse", get(handle_sse));
    }
    app.layer(Extension(Arc::new(state)))
}

/// Bind `host:port` and serve until `shutdown`, then allow in-flight requests
/// `shutdown_grace` seconds before returning.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, cfg: &ServerConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", cfg.host, cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(
        addr = %listener.local_addr().context("local_addr")?,
        mode = ?cfg.mode,
        tools = state.source.tools_count,
        "http transport listening"
    );

    let shutdown = state.shutdown.clone();
    let graceful = shutdown.clone();
    let server = axum::serve(listener, router(state, cfg.mode))
        .with_graceful_shutdown(async move { graceful.cancelled().await })
        .into_future();
    let grace = Duration::from_secs(cfg.shutdown_grace);

    tokio::select! {
        res = server => res.context("http server")?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_secs = cfg.shutdown_grace, "shutdown grace period elapsed; dropping open connections");
        }
    }
    info!("http transport stopped");
    Ok(())
}

async fn handle_mcp(Extension(state): Extension<Arc<AppState>>, body: Bytes) -> Response {
    let call: CallEnvelope = match serde_json::from_slice(&body) {
        Ok(call) => call,
        Err(e) => {
            warn!(error = %e, "rejecting undecodable request body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
        }
    };
    Json(state.dispatcher.dispatch(call).await).into_response()
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn api_config(Extension(state): Extension<Arc<AppState>>) -> Json<SourceInfo> {
    Json(state.source.clone())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Announce the POST endpoint, then hold the channel open with keep-alives until the peer
/// goes away or the server shuts down.
async fn handle_sse(
    Extension(state): Extension<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("sse client connected");
    let endpoint = stream::once(future::ready(Ok(Event::default()
        .event("endpoint")
        .data(MCP_PATH))));
    let until_shutdown = stream::once(state.shutdown.clone().cancelled_owned())
        .filter_map(|()| future::ready(None::<Result<Event, Infallible>>));

    Sse::new(endpoint.chain(until_shutdown)).keep_alive(KeepAlive::default())
}
