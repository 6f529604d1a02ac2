//! HTTP completion endpoint binary.
//!
//! Serves `POST /api/gemini` and `GET /health` until interrupted.

use clap::Parser;
use niva::NivaConfig;
use niva::llm::CompletionClient;
use niva::llm::server::NivaServer;
use std::path::PathBuf;

/// Niva completion server.
#[derive(Parser)]
#[command(name = "niva-server", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides `server.host`).
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides `server.port`).
    #[arg(short, long)]
    port: Option<u16>,

    /// Gemini API key (overrides `llm.api_key`).
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NivaConfig::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(key) = cli.api_key {
        config.llm.api_key = key;
    }

    let _log_guard = niva::diagnostics::init_tracing(&config.logging);
    tracing::info!("niva-server starting");

    let client = CompletionClient::from_config(&config.llm);
    let mut server = NivaServer::start(client, &config.server)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "niva-server failed to start");
            anyhow::anyhow!("niva-server failed: {e}")
        })?;
    println!("Niva server listening on http://{}", server.addr());

    let interrupted = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("failed to listen for ctrl-c: {e}");
            }
            true
        }
        () = server.wait() => false,
    };
    if interrupted {
        server.shutdown();
    } else {
        tracing::warn!("server task exited unexpectedly");
    }

    tracing::info!("niva-server shut down cleanly");
    Ok(())
}
