//! cqp-ui (Portal) - session-gated course/form portal service

use anyhow::Result;
use clap::Parser;
use cqp_common::config;
use cqp_common::db::{get_setting_i64, init_database};
use cqp_ui::{build_router, AppState};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "cqp-ui", about = "CQP portal service")]
struct Args {
    /// Root folder holding the portal database
    #[arg(long)]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting CQP Portal (cqp-ui) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), "CQP_ROOT_FOLDER");
    config::ensure_root_folder(&root_folder)?;

    let db_path = config::database_path(&root_folder);
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path).await?;

    let session_timeout = get_setting_i64(&pool, "session_timeout_seconds", 1800).await?;
    let http_port = get_setting_i64(&pool, "http_port", 8085).await?;
    info!("Session timeout: {}s", session_timeout);

    let state = AppState::new(pool, session_timeout);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", http_port as u16)).await?;
    info!("cqp-ui listening on http://127.0.0.1:{}", http_port);
    info!("Health check: http://127.0.0.1:{}/health", http_port);

    axum::serve(listener, app).await?;

    Ok(())
}
