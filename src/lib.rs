pub mod db;
pub mod error;
pub mod glucose;
pub mod http;
pub mod settings;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Duration;
use db::Database;
use glucose::GlucoseService;
use log::info;
use settings::Settings;

/// Wire the service to a SQLite database using `settings`.
pub fn build_service(settings: &Settings) -> Result<GlucoseService> {
    let window = Duration::try_days(settings.default_window_days).ok_or_else(|| {
        anyhow!(
            "default_window_days {} is out of range",
            settings.default_window_days
        )
    })?;
    let database = Database::new(settings.database_path.clone())?;
    Ok(
        GlucoseService::new(Arc::new(database), settings.default_target_range)
            .with_default_window(window),
    )
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {err}");
    }
    info!("Shutdown signal received");
}

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("glucolog starting up...");

    let settings = Settings::load()?;
    let service = build_service(&settings)?;
    let app = http::build_router(service);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
