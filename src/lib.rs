pub mod aggregator;
pub mod api;
pub mod config;
pub mod models;
pub mod normalize;
pub mod rationale;
pub mod recommend;
pub mod reconciler;
pub mod schedule;
pub mod scheduler;
pub mod scraping;
pub mod store;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use api::{build_router, AppState};

use aggregator::Aggregator;
use config::AppConfig;
use rationale::LlmComposer;
use reconciler::Reconciler;
use recommend::Recommender;
use store::ListingStore;

pub async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cartelera_lib=info,cartelera=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let data_dir = config.data_dir();
    utils::ensure_dir(&data_dir);
    let tz = config.tz();
    info!(data_dir = %data_dir.display(), timezone = %tz.name(), "starting cartelera");

    let store = ListingStore::in_dir(&data_dir);
    let reconciler = Reconciler::new(store.clone(), tz);
    let aggregator = Aggregator::new(
        scraping::active_adapters(&config),
        store,
        tz,
        config.adapter_timeout(),
    );
    let recommender = Recommender::new(Arc::new(LlmComposer::from_config(&config)));

    scheduler::spawn(aggregator.clone(), &config);

    let state = AppState::new(
        reconciler,
        aggregator,
        recommender,
        utils::restaurants_path_in(&data_dir),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
