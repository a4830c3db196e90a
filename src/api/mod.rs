//! HTTP API for health checks and bot status

use crate::config::ApiConfig;
use crate::error::{BotError, BotResult};
use crate::state::{StateManager, SyncState};
use crate::tx::WalletRegistry;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub state_manager: Arc<StateManager>,
    pub wallets: Arc<WalletRegistry>,
}

/// Run the HTTP API server
pub async fn run_server(
    config: ApiConfig,
    state_manager: Arc<StateManager>,
    wallets: Arc<WalletRegistry>,
) -> BotResult<()> {
    let state = AppState {
        state_manager,
        wallets,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/status", get(get_status))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BotError::Config(format!("cannot bind API to {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| BotError::Internal(format!("API server: {}", e)))
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check - database reachable
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.state_manager.health_check().await.is_ok();
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}

/// Synced heights and wallet addresses
async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    let wallets = state
        .wallets
        .addresses()
        .into_iter()
        .map(|(role, address)| WalletStatus {
            role: role.name().to_string(),
            address,
        })
        .collect();

    match state.state_manager.all_states().await {
        Ok(monitors) => (
            StatusCode::OK,
            Json(StatusResponse {
                version: env!("CARGO_PKG_VERSION").to_string(),
                monitors,
                wallets,
            }),
        ),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse {
                version: env!("CARGO_PKG_VERSION").to_string(),
                monitors: Vec::new(),
                wallets,
            }),
        ),
    }
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ReadinessResponse {
    ready: bool,
    database: bool,
}

#[derive(Serialize)]
struct WalletStatus {
    role: String,
    address: String,
}

#[derive(Serialize)]
struct StatusResponse {
    version: String,
    monitors: Vec<SyncState>,
    wallets: Vec<WalletStatus>,
}
