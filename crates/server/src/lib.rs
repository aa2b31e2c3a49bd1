//! `oas-mcp` server: configuration, logging, the protocol dispatcher and its transports.

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod http;
pub mod logging;
pub mod protocol;
pub mod shutdown;
pub mod stdio;

use anyhow::Context as _;
use config::{Config, Mode};
use dispatcher::Dispatcher;
use oas_mcp_http_tools::runtime::UpstreamClient;
use oas_mcp_openapi_tools::runtime::OpenApiToolSource;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build the tool catalog, then serve on the configured transport until end of input (stdio)
/// or `shutdown`.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or turned into a catalog, or the
/// transport fails to start.
pub async fn run(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let client = UpstreamClient::new(&config.upstream, config.auth.clone())
        .context("build upstream client")?;
    let source = OpenApiToolSource::from_file(&config.swagger_file, client).with_context(|| {
        format!("load OpenAPI document {}", config.swagger_file.display())
    })?;

    let source_info = http::SourceInfo {
        swagger_file: source.source().to_string(),
        swagger_sha256: source.sha256().to_string(),
        tools_count: source.tools_count(),
    };
    let dispatcher = Dispatcher::new(Arc::new(source));

    match config.server.mode {
        Mode::Stdio => {
            stdio::serve(
                &dispatcher,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                shutdown,
            )
            .await
            .context("stdio transport")?;
        }
        Mode::Http | Mode::Sse => {
            let state = http::AppState {
                dispatcher,
                source: source_info,
                shutdown,
            };
            http::serve(state, &config.server).await?;
        }
    }

    info!("server stopped");
    Ok(())
}
