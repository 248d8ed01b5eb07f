//! Questlog Engine - headless entry point.
//!
//! Runs the startup sequence (migrations, profile activation, catalog load)
//! and logs a summary. UIs embed the library instead.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use questlog_engine::config::EngineConfig;
use questlog_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "questlog_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Questlog Engine");

    let config = EngineConfig::from_env()?;
    tracing::info!("data directory: {}", config.data_dir.display());

    let app = App::new(&config).await?;
    let profile = app.start().await?;
    tracing::info!(
        "active profile: {} ({}, level {})",
        profile.name,
        profile.faction,
        profile.level
    );

    let catalog = app.catalog.load().await?;
    tracing::info!(
        "catalog loaded: {} tasks, {} collector items, {} achievements, {} stations (overlay v{})",
        catalog.tasks.len(),
        catalog.collector_items.len(),
        catalog.achievements.len(),
        catalog.hideout_stations.len(),
        catalog
            .overlay_version
            .map_or_else(|| "?".to_string(), |version| version.to_string()),
    );

    let completed = app.completion.completed().await;
    tracing::info!("completed tasks: {}", completed.len());

    Ok(())
}
