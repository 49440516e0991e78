// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of HelioWatch.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod api;
mod config;
mod db;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use heliowatch_core::{
    ClassifierClient, DeviceRefresher, DeviceRegistry, DeviceStore, FaultOrchestrator, FaultStore,
    HistoryAggregator, RefreshPolicy, WeatherClient,
};
use heliowatch_providers::ProviderFetcher;

use api::AppState;
use config::ServerConfig;
use db::SqliteStore;

#[derive(Parser, Debug)]
#[command(
    name = "heliowatch-server",
    version,
    about = "Solar telemetry reconciliation and fault-detection service"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "heliowatch.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with env filter support
    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = ServerConfig::load_or_default(&cli.config)?;

    info!("🚀 Starting HelioWatch server");
    info!("📋 Configuration Summary:");
    info!("   Bind: {}:{}", config.server.bind_address, config.server.port);
    info!("   Database: {}", config.database.path);
    info!("   Weather provider: {}", config.upstream.weather_url);
    info!("   Classifier: {}", config.upstream.classifier_url);
    info!("   Staleness horizon: {}min", config.refresh.staleness_minutes);

    let store = Arc::new(SqliteStore::open(&config.database.path)?);
    let devices: Arc<dyn DeviceStore> = Arc::clone(&store) as Arc<dyn DeviceStore>;
    let history_store: Arc<dyn FaultStore> = Arc::clone(&store) as Arc<dyn FaultStore>;

    let fetcher = ProviderFetcher::new()?;
    let policy = RefreshPolicy::with_horizon(chrono::Duration::minutes(i64::from(
        config.refresh.staleness_minutes,
    )));
    let refresher = DeviceRefresher::new(Arc::clone(&devices), fetcher).with_policy(policy);

    let weather = WeatherClient::new(config.upstream.weather_url.clone())?;
    let classifier = ClassifierClient::new(config.upstream.classifier_url.clone())?;

    let orchestrator = Arc::new(FaultOrchestrator::new(
        Arc::clone(&devices),
        Arc::clone(&history_store),
        refresher.clone(),
        weather,
        classifier.clone(),
    ));
    let registry = DeviceRegistry::new(Arc::clone(&devices), refresher.clone());
    let history = HistoryAggregator::new(history_store, classifier);

    let state = AppState {
        store,
        devices,
        registry,
        refresher,
        orchestrator,
        history,
    };

    let app = api::router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("✅ Listening on {addr}");

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
