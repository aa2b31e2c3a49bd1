use anyhow::Context as _;
use clap::Parser as _;
use oas_mcp_server::config::{Cli, Config};
use oas_mcp_server::{logging, run, shutdown};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli)?;
    logging::init(&config.logging, config.server.mode)?;
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    let token = CancellationToken::new();
    let result = runtime.block_on(async {
        shutdown::spawn_signal_handler(token.clone());
        let result = run(config, token.clone()).await;
        token.cancel();
        result
    });

    // A stdin read may still be parked on the blocking pool; don't wait on it.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
