use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pintrip::auth::TokenVerifier;
use pintrip::config::{Cli, Config, JWT_SECRET_ENV};
use pintrip::db;
use pintrip::state::AppState;

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
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    let tokens = TokenVerifier::from_config(&config.auth).with_context(|| {
        format!(
            "invalid JWT signing secret (set [auth].jwt_secret or {})",
            JWT_SECRET_ENV
        )
    })?;

    // Initialize database
    let db_path = config
        .db_path()
        .cloned()
        .unwrap_or_else(|| data_dir.join("pintrip.db"));
    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;

    let state = AppState {
        db: pool,
        tokens: Arc::new(tokens),
    };

    let app = pintrip::build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
