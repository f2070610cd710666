use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shutter::auth::session;
use shutter::config::{Cli, Command, Config};
use shutter::interactions::reconcile;
use shutter::state::AppState;
use shutter::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli)?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState::new(pool, config.clone());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::Reconcile { post_id } => run_reconcile(state, post_id).await,
    }
}

async fn serve(state: AppState, config: &Config) -> anyhow::Result<()> {
    let purged = session::purge_expired(&state.db)?;
    if purged > 0 {
        tracing::info!("Purged {} expired sessions", purged);
    }

    let app = routes::app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn run_reconcile(state: AppState, post_id: Option<String>) -> anyhow::Result<()> {
    let reports = match post_id {
        Some(id) => vec![reconcile::reconcile_post_counters(&state.store, &id).await?],
        None => reconcile::reconcile_all(&state.store).await?,
    };

    for report in reports.iter().filter(|r| r.drifted()) {
        println!(
            "{}: likes={} ({:+}) comments={} ({:+})",
            report.post_id,
            report.likes_count,
            -report.likes_drift,
            report.comments_count,
            -report.comments_drift
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
