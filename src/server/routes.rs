//! HTTP route handlers.
//!
//! All endpoints speak JSON. State is shared via `Arc<ServerState>`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::engine::sink::MemorySink;
use crate::engine::PodEngine;
use crate::error::AuctionError;
use crate::predictor::PredictorStats;
use crate::registry::DemandSource;
use crate::types::{Opportunity, PodResult};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub engine: Arc<PodEngine>,
    pub recent: Arc<MemorySink>,
}

impl ServerState {
    pub fn new(engine: Arc<PodEngine>, recent: Arc<MemorySink>) -> Self {
        Self { engine, recent }
    }
}

pub type AppState = Arc<ServerState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps engine errors onto HTTP statuses.
pub struct ApiError(AuctionError);

impl From<AuctionError> for ApiError {
    fn from(e: AuctionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AuctionError::NoEnabledSources => StatusCode::SERVICE_UNAVAILABLE,
            AuctionError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        if self.0.is_recoverable() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/pods
pub async fn create_pod(
    State(state): State<AppState>,
    Json(opportunity): Json<Opportunity>,
) -> Result<Json<PodResult>, ApiError> {
    let result = state.engine.handle_opportunity(&opportunity).await?;
    Ok(Json(result))
}

/// GET /api/pods
pub async fn recent_pods(State(state): State<AppState>) -> Json<Vec<PodResult>> {
    Json(state.recent.recent())
}

/// POST /api/federated
pub async fn create_federated(
    State(state): State<AppState>,
    Json(opportunity): Json<Opportunity>,
) -> Result<Json<PodResult>, ApiError> {
    let result = state.engine.run_federated(&opportunity).await?;
    Ok(Json(result))
}

/// GET /api/sources
pub async fn list_sources(State(state): State<AppState>) -> Json<Vec<DemandSource>> {
    Json(state.engine.registry().snapshot())
}

/// DELETE /api/sources/:name
pub async fn remove_source(State(state): State<AppState>, Path(name): Path<String>) -> StatusCode {
    match state.engine.registry().remove(&name) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Body of `PUT /api/sources/:name/enabled`.
#[derive(Debug, Deserialize)]
pub struct EnabledBody {
    pub enabled: bool,
}

/// PUT /api/sources/:name/enabled
pub async fn set_source_enabled(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<EnabledBody>,
) -> StatusCode {
    if state.engine.registry().set_enabled(&name, body.enabled) {
        info!(source = %name, enabled = body.enabled, "Demand source toggled");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /api/predictor
pub async fn predictor_stats(State(state): State<AppState>) -> Json<PredictorStats> {
    Json(state.engine.predictor().stats())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let resp = ApiError(AuctionError::NoEnabledSources).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let resp = ApiError(AuctionError::AdvisorFailure("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
