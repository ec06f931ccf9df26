//! Optional HTTP surface for liveness probes and collection counts.

use std::net::SocketAddr;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use sluice_store::{Store, StoreStats};

use crate::error::ApiError;
use crate::roster::Roster;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub roster: Roster,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: StoreStats,
    /// Channels currently held by the in-memory roster.
    roster_channels: usize,
}

async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.store.with(|db| db.stats())?;
    Ok(Json(StatsResponse {
        stats,
        roster_channels: state.roster.len().await,
    }))
}

/// Serve the API on `addr` until `shutdown` flips to `true`.
pub async fn serve(state: AppState, addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting health API");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
