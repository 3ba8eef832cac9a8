use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod app;
mod error;
mod http;
#[cfg(test)]
mod testing;
mod turn;
mod ws;

/// Chat server that splits streamed model output into display text,
/// thinking and code artifacts.
#[derive(Debug, Parser)]
#[command(name = "parley-gateway", version)]
struct Cli {
    /// Path to parley.toml (default: ~/.parley/parley.toml).
    #[arg(long, env = "PARLEY_CONFIG")]
    config: Option<String>,

    /// Override `server.bind`.
    #[arg(long)]
    bind: Option<String>,

    /// Override `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parley_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / PARLEY_CONFIG > ~/.parley/parley.toml
    let mut config =
        parley_core::ParleyConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
            warn!("Config load failed ({}), using defaults", e);
            parley_core::ParleyConfig::default()
        });
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let db_path = config.database.path.clone();
    info!(path = %db_path, "opening SQLite database");
    let sessions = parley_sessions::SessionStore::open(&db_path)?
        .with_title_max_chars(config.chat.title_max_chars);

    let agent = parley_agent::AgentRuntime::from_config(&config.provider)?;
    if config.provider.probe_on_start {
        if let Err(e) = agent.probe().await {
            warn!(error = %e, provider = %agent.provider_name(), "could not list models; is the provider running?");
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = Arc::new(app::AppState::new(config, agent, sessions));
    let router = app::build_router(state);

    info!("Parley gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Parley gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
