// Hero Atlas - Web Server
// REST + SSE API with Axum

use anyhow::{Context, Result};
use clap::Parser;
use hero_atlas::api::{router, AppState};
use hero_atlas::{build_enricher, logging, Config, Store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hero-server", version, about = "Serve historical-figure biographies over HTTP")]
struct Args {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "HERO_ATLAS_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address from the config
    #[arg(long)]
    bind: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    logging::init_from_config(&config, args.verbose, args.json_logs);

    let db_path = config.database_path();
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "Database opened");

    let enricher = build_enricher(&config, store).context("Failed to set up LLM client")?;
    let app = router(AppState::new(enricher), &config.server.static_dir);

    let addr = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("Server running on http://{addr}");
    tracing::info!("  Heroes: http://{addr}/heroes");
    tracing::info!("  Chat:   http://{addr}/chat");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
    }
}
