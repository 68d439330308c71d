//! Setlist endpoints

use super::handlers::{error_response, ApiResult, StatusResponse};
use crate::api::server::AppContext;
use crate::setlist::{Setlist, SetlistItem};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SetlistNameRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    region_id: u32,
    #[serde(default)]
    label: Option<String>,
    /// Insert position; appends when absent
    #[serde(default)]
    position: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MoveItemRequest {
    from: usize,
    to: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    start_index: usize,
    /// Also seek to the start item
    #[serde(default)]
    go: bool,
}

/// GET /api/setlists
pub async fn list(State(ctx): State<AppContext>) -> Json<Vec<Setlist>> {
    Json(ctx.engine.setlists().await)
}

/// POST /api/setlists
pub async fn create(
    State(ctx): State<AppContext>,
    Json(req): Json<SetlistNameRequest>,
) -> Result<(StatusCode, Json<Setlist>), super::handlers::ApiError> {
    let setlist = ctx
        .engine
        .create_setlist(&req.name)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(setlist)))
}

/// GET /api/setlists/:id
pub async fn get(State(ctx): State<AppContext>, Path(id): Path<Uuid>) -> ApiResult<Setlist> {
    ctx.engine.setlist(id).await.map(Json).map_err(error_response)
}

/// PATCH /api/setlists/:id - Rename
pub async fn rename(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetlistNameRequest>,
) -> ApiResult<Setlist> {
    ctx.engine
        .rename_setlist(id, &req.name)
        .await
        .map(Json)
        .map_err(error_response)
}

/// DELETE /api/setlists/:id
pub async fn remove(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusResponse> {
    ctx.engine.delete_setlist(id).await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: "deleted".to_string(),
    }))
}

/// POST /api/setlists/:id/items
pub async fn add_item(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<SetlistItem>), super::handlers::ApiError> {
    let item = ctx
        .engine
        .add_setlist_item(id, req.region_id, req.label, req.position)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// DELETE /api/setlists/:id/items/:item_id
pub async fn remove_item(
    State(ctx): State<AppContext>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<SetlistItem> {
    ctx.engine
        .remove_setlist_item(id, item_id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/setlists/:id/items/move
pub async fn move_item(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<MoveItemRequest>,
) -> ApiResult<Setlist> {
    ctx.engine
        .move_setlist_item(id, req.from, req.to)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/setlists/:id/activate
///
/// Body is optional: `{ "start_index": 0, "go": false }`.
pub async fn activate(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ActivateRequest>>,
) -> ApiResult<StatusResponse> {
    let Json(req) = body.unwrap_or_default();
    ctx.engine
        .activate_setlist(id, req.start_index)
        .await
        .map_err(error_response)?;
    if req.go {
        ctx.engine
            .goto_item(req.start_index)
            .await
            .map_err(error_response)?;
    }
    Ok(Json(StatusResponse {
        status: "active".to_string(),
    }))
}

/// POST /api/setlists/deactivate
pub async fn deactivate(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    ctx.engine.deactivate_setlist().await;
    Json(StatusResponse {
        status: "inactive".to_string(),
    })
}
