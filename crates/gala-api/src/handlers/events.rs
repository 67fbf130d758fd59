//! Gallery read endpoints: event lookup and the approved-upload listing.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use gala_core::models::{EventResponse, UploadResponse};
use gala_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

/// Uploads returned per gallery listing request.
const GALLERY_PAGE_LIMIT: i64 = 500;

#[utoipa::path(
    get,
    path = "/api/v0/events/{public_id}",
    tag = "events",
    params(
        ("public_id" = String, Path, description = "Public event identifier")
    ),
    responses(
        (status = 200, description = "Event with its prompts", body = EventResponse),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(event = %public_id, operation = "get_event"))]
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let event = state
        .events
        .get_by_public_id(&public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let prompts = state.events.list_prompts(event.id).await?;

    Ok(Json(EventResponse::from_parts(event, prompts)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUploadsQuery {
    /// Restrict the listing to photos answering this prompt.
    pub prompt: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v0/events/{public_id}/uploads",
    tag = "events",
    params(
        ("public_id" = String, Path, description = "Public event identifier"),
        ListUploadsQuery
    ),
    responses(
        (status = 200, description = "Approved uploads in creation order", body = [UploadResponse]),
        (status = 404, description = "Event not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(event = %public_id, operation = "list_uploads"))]
pub async fn list_uploads(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    Query(query): Query<ListUploadsQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let event = state
        .events
        .get_by_public_id(&public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let uploads = state
        .uploads
        .list_approved(event.id, query.prompt, GALLERY_PAGE_LIMIT)
        .await?;

    let body: Vec<UploadResponse> = uploads.into_iter().map(UploadResponse::from).collect();
    Ok(Json(body))
}
