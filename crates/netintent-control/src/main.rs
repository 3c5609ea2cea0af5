//! Netintent control daemon.
//!
//! Runs the intent manager over a `RocksDB` store and exposes health,
//! readiness and per-state intent counts over HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use netintent_control::{
    DefaultIntentProcessor, IntentCleanup, IntentManager, IntentService, LoggingInstaller,
    ManagerConfig,
};
use netintent_store::{RocksStore, Store};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
struct AppState<S: Store> {
    manager: Arc<IntentManager<S>>,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Serialize)]
struct StatsResponse {
    total: u64,
    states: BTreeMap<String, usize>,
    workers: usize,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "netintent-control",
    })
}

async fn ready_handler<S: Store + 'static>(State(state): State<AppState<S>>) -> impl IntoResponse {
    match state.manager.intent_count().await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "Store not ready");
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

async fn stats_handler<S: Store + 'static>(State(state): State<AppState<S>>) -> Response {
    let stats = state.manager.intent_count().await.and_then(|total| {
        let states = state
            .manager
            .state_counts()?
            .into_iter()
            .map(|(s, count)| (s.to_string(), count))
            .collect();
        Ok(StatsResponse {
            total,
            states,
            workers: state.manager.config().worker_threads,
        })
    });

    match stats {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to collect stats");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

fn create_router<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler::<S>))
        .route("/stats", get(stats_handler::<S>))
        .with_state(state)
}

fn load_config() -> Result<ManagerConfig, Box<dyn std::error::Error>> {
    match std::env::var("NETINTENT_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let config = serde_json::from_str(&raw)?;
            tracing::info!(path = %path, "Loaded manager configuration");
            Ok(config)
        }
        Err(_) => Ok(ManagerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,netintent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Netintent Control");

    // Load configuration from environment
    let listen_addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "/data".to_string());
    let config = load_config()?;

    // Initialize store
    let store = Arc::new(RocksStore::open(&data_dir)?);
    tracing::info!(data_dir = %data_dir, "Initialized RocksDB store");

    // No device drivers are wired in; installables are only logged.
    let processor = Arc::new(DefaultIntentProcessor::new(Arc::new(LoggingInstaller)));
    let cleanup_enabled = config.cleanup_enabled;
    let mut manager = IntentManager::new(store, processor.clone(), config);
    if manager.config().coordinated_withdraw {
        manager = manager.with_coordinator(processor);
    }
    let manager = Arc::new(manager);
    tracing::info!(
        workers = manager.config().worker_threads,
        coordinated_withdraw = manager.config().coordinated_withdraw,
        "Initialized intent manager"
    );

    if cleanup_enabled {
        IntentCleanup::new(Arc::clone(&manager)).spawn();
    }

    let app = create_router(AppState { manager });

    // Start server
    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
