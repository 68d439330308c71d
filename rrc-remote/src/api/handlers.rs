//! HTTP request handlers
//!
//! Transport, navigation, status and settings endpoints.

use crate::api::server::AppContext;
use crate::engine::{EngineStatus, NavigationResult};
use crate::error::Error;
use crate::markers::RegionTiming;
use crate::regions::{Marker, Region};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rrc_common::config::AdvanceMode;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct RegionInfo {
    #[serde(flatten)]
    region: Region,
    timing: Option<RegionTiming>,
}

#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    regions: Vec<RegionInfo>,
    markers: Vec<Marker>,
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdvanceModeBody {
    pub mode: AdvanceMode,
}

/// Mode as free text so an unknown name is a 400, not an extractor rejection
#[derive(Debug, Deserialize)]
pub struct AdvanceModeRequest {
    mode: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map an engine error to a status code and JSON body
pub fn error_response(e: Error) -> ApiError {
    let e = e.normalized();
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::Busy(_) | Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Daw(_) | Error::Protocol(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (status, Json(ErrorResponse { error: e.to_string() }))
}

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

// ============================================================================
// Health / Status
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "rrc-remote".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

/// GET /api/status - Transport, active region, setlist position
pub async fn status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.engine.status().await)
}

/// GET /api/regions - Regions in timeline order with resolved timing
pub async fn regions(State(ctx): State<AppContext>) -> Json<RegionsResponse> {
    let mut regions = Vec::new();
    for region in ctx.engine.regions().await {
        let timing = ctx.engine.timing(region.id).await;
        regions.push(RegionInfo { region, timing });
    }

    Json(RegionsResponse {
        regions,
        markers: ctx.engine.markers().await,
    })
}

/// POST /api/regions/reload - Fetch regions and markers from the DAW now
pub async fn reload_regions(State(ctx): State<AppContext>) -> ApiResult<ReloadResponse> {
    let count = ctx.engine.reload_regions().await.map_err(error_response)?;
    Ok(Json(ReloadResponse { count }))
}

// ============================================================================
// Transport
// ============================================================================

/// POST /api/transport/play
pub async fn play(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    ctx.engine.play().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /api/transport/pause
pub async fn pause(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    ctx.engine.pause().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /api/transport/stop
pub async fn stop(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    ctx.engine.stop().await.map_err(error_response)?;
    Ok(ok())
}

/// POST /api/transport/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> ApiResult<StatusResponse> {
    ctx.engine.toggle_play().await.map_err(error_response)?;
    Ok(ok())
}

// ============================================================================
// Navigation
// ============================================================================

/// POST /api/navigate/next
pub async fn next(State(ctx): State<AppContext>) -> ApiResult<NavigationResult> {
    ctx.engine.next().await.map(Json).map_err(error_response)
}

/// POST /api/navigate/previous
pub async fn previous(State(ctx): State<AppContext>) -> ApiResult<NavigationResult> {
    ctx.engine.previous().await.map(Json).map_err(error_response)
}

/// POST /api/navigate/resume - Continue after a hard stop
pub async fn resume(State(ctx): State<AppContext>) -> ApiResult<NavigationResult> {
    ctx.engine.resume().await.map(Json).map_err(error_response)
}

/// POST /api/navigate/region/:id
pub async fn goto_region(
    State(ctx): State<AppContext>,
    Path(region_id): Path<u32>,
) -> ApiResult<NavigationResult> {
    ctx.engine
        .goto_region(region_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/navigate/item/:index - Jump within the active setlist
pub async fn goto_item(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> ApiResult<NavigationResult> {
    ctx.engine.goto_item(index).await.map(Json).map_err(error_response)
}

// ============================================================================
// Settings
// ============================================================================

/// GET /api/settings/advance-mode
pub async fn get_advance_mode(State(ctx): State<AppContext>) -> Json<AdvanceModeBody> {
    Json(AdvanceModeBody {
        mode: ctx.engine.advance_mode().await,
    })
}

/// PUT /api/settings/advance-mode
pub async fn set_advance_mode(
    State(ctx): State<AppContext>,
    Json(body): Json<AdvanceModeRequest>,
) -> ApiResult<AdvanceModeBody> {
    let mode: AdvanceMode = body
        .mode
        .parse()
        .map_err(|e: rrc_common::Error| error_response(e.into()))?;
    info!("Advance mode set via API: {}", mode);
    ctx.engine.set_advance_mode(mode).await;
    Ok(Json(AdvanceModeBody { mode }))
}
