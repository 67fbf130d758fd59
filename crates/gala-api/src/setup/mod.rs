//! Application setup and initialization
//!
//! All initialization logic extracted from main.rs for better organization
//! and testability.

pub mod database;
pub mod routes;
pub mod server;

use crate::state::AppState;
use anyhow::{Context, Result};
use gala_archive::ExportConfig;
use gala_core::Config;
use gala_db::{EventRepository, UploadRepository};
use gala_fetch::HttpObjectFetcher;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the tracing subscriber. RUST_LOG controls the filter; defaults to
/// info for our crates.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    tracing::info!(
        export_concurrency = config.export_concurrency,
        export_max_items = config.export_max_items,
        export_item_timeout_ms = config.export_item_timeout_ms,
        "Configuration loaded"
    );

    // Setup database
    let pool = database::setup_database(&config).await?;

    // One pooled HTTP client for all origin fetches, injected into the state
    // rather than living as a module-level singleton.
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build origin fetch client")?;
    let fetcher = Arc::new(HttpObjectFetcher::new(client));

    let state = Arc::new(AppState {
        pool: pool.clone(),
        events: EventRepository::new(pool.clone()),
        uploads: UploadRepository::new(pool),
        fetcher,
        export: ExportConfig {
            concurrency: config.export_concurrency,
            item_timeout: config.export_item_timeout(),
            max_items: config.export_max_items,
        },
        config: config.clone(),
    });

    // Setup routes
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
