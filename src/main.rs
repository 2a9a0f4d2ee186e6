//! epic_relay - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes the epic breakdown API.

use epic_relay::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "epic_relay=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: jira={}, lm_studio={}, default_model={}",
        config.tracker.base_url, config.model.base_url, config.model.default_model
    );

    api::serve(config).await?;

    Ok(())
}
