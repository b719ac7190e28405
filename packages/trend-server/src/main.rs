//! Trend discovery server.
//!
//! Thin HTTP surface over the trend engine: seeds discovery runs and
//! receives DataForSEO postbacks.

mod classifier;
mod config;
mod provider;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use dataforseo_client::DataForSeoClient;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trend_engine::{
    CachedClassifier, CallbackProcessor, DiscoveryConfig, PostgresStorage, SpikeConfig,
};

use crate::classifier::{DisabledClassifier, OpenAiClassifier, ServerClassifier};
use crate::config::Config;
use crate::provider::DataForSeoProvider;
use crate::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trend_engine=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    tracing::info!("Starting trend discovery server");

    let config = Config::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let storage = PostgresStorage::new(pool);
    let provider = DataForSeoProvider::new(DataForSeoClient::new(
        config.dataforseo_login.clone(),
        config.dataforseo_password.clone(),
    ));

    let discovery = DiscoveryConfig::default();
    let classifier = match &config.openai_api_key {
        Some(key) => {
            tracing::info!("Demand classifier enabled");
            ServerClassifier::OpenAi(OpenAiClassifier::new(key.clone()))
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set; demand classifier disabled");
            ServerClassifier::Disabled(DisabledClassifier)
        }
    };
    let classifier = CachedClassifier::new(classifier, discovery.classifier_cache_capacity);

    let processor = CallbackProcessor::new(
        storage,
        provider,
        classifier,
        SpikeConfig::default(),
        discovery,
        config.callback_url.clone(),
    );

    let state = Arc::new(AppState { processor });
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(addr = %addr, "Listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app).await.context("Server exited")?;

    Ok(())
}
