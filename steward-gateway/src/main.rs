//! Gateway server binary.
//!
//! Settings come from the environment (`SECRET_KEY`, provider secrets,
//! `DATABASE_URL`, ...); the command line only picks the bind address.
//! Logs are JSON lines so the per-request fields (request_id, provider,
//! cost_usd, ...) stay machine-parseable.

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use steward_gateway::config::Settings;
use steward_gateway::server::create_server;
use steward_gateway::storage::{GatewayStore, MemoryStore, PgStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind the server to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number for the HTTP server.
    #[arg(short, long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let settings = Settings::from_env()?;
    settings.validate()?;

    // RUST_LOG overrides the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));
    tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_env_filter(filter)
        .init();

    let store: Arc<dyn GatewayStore> = match &settings.database_url {
        Some(database_url) => Arc::new(PgStore::connect(database_url).await?),
        None => {
            tracing::warn!(
                "DATABASE_URL is not set; using the in-memory store (cost rows are lost on exit)"
            );
            Arc::new(MemoryStore::new())
        }
    };

    let environment = settings.environment.clone();
    let app = create_server(settings, store)?;

    let addr = SocketAddr::new(args.host.parse()?, args.port);
    tracing::info!(%addr, %environment, "starting steward gateway");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
