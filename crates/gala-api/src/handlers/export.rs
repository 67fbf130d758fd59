//! The download-all endpoint: validates the event, selects the approved
//! uploads, opens the streaming ZIP response immediately, and leaves
//! population to a background task.

use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
};
use gala_archive::{naming, run_export, ExportItem, ExportPlan, ZipStreamWriter};
use gala_core::models::Upload;
use gala_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use utoipa::IntoParams;
use uuid::Uuid;

/// Output chunks allowed to queue between the archive writer and the HTTP
/// response before appends start waiting on the client.
const ARCHIVE_CHANNEL_DEPTH: usize = 8;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DownloadQuery {
    /// Restrict the export to photos answering this prompt.
    pub prompt: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v0/events/{public_id}/download",
    tag = "export",
    params(
        ("public_id" = String, Path, description = "Public event identifier"),
        DownloadQuery
    ),
    responses(
        (status = 200, description = "Streaming ZIP archive of all approved photos", content_type = "application/zip"),
        (status = 403, description = "Event is not active", body = ErrorResponse),
        (status = 404, description = "Event not found or no approved uploads", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(event = %public_id, operation = "download_gallery"))]
pub async fn download_gallery(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HttpAppError> {
    let event = state
        .events
        .get_by_public_id(&public_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !event.is_active {
        return Err(AppError::Forbidden("Event is not active".to_string()).into());
    }

    // One row past the cap so truncation is detectable without a count.
    let cap = state.export.max_items;
    let rows = state
        .uploads
        .list_approved(event.id, query.prompt, cap as i64 + 1)
        .await?;
    if rows.is_empty() {
        return Err(AppError::NotFound("No approved uploads".to_string()).into());
    }

    let items: Vec<ExportItem> = rows.into_iter().map(export_item).collect();
    let plan = ExportPlan::select(items, cap);

    tracing::info!(
        selected = plan.len(),
        truncated = plan.truncated,
        prompt = ?query.prompt,
        "starting gallery export"
    );

    let (writer, output) = ZipStreamWriter::new(ARCHIVE_CHANNEL_DEPTH);
    let cancel = CancellationToken::new();

    // Population runs detached from this handler; the response body below
    // starts streaming before any photo has been fetched. When the client
    // disconnects, the body drops, the writer's sink closes, and run_export
    // cancels the remaining fetches itself.
    let job = tokio::spawn(run_export(
        plan,
        state.fetcher.clone(),
        writer,
        state.export.clone(),
        cancel,
    ));
    let event_slug = event.public_id.clone();
    tokio::spawn(async move {
        if let Err(join_error) = job.await {
            tracing::error!(event = %event_slug, error = %join_error, "gallery export task failed");
        }
    });

    let filename = naming::archive_filename(&event.public_id);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from_stream(output))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Validate and convert a datastore row into the pipeline's item type. The
/// single place where row fields cross into the export core.
fn export_item(upload: Upload) -> ExportItem {
    ExportItem {
        id: upload.id,
        origin_url: upload.url,
        file_name: upload.file_name,
        original_name: upload.original_name,
        content_type: upload.content_type,
        uploader_name: upload.uploader_name,
        prompt_label: upload.prompt_label,
        created_at: upload.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_export_item_carries_row_fields() {
        let upload = Upload {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            prompt_id: Some(Uuid::new_v4()),
            url: "https://cdn.example.com/photos/abc.jpg".to_string(),
            file_name: Some("abc.jpg".to_string()),
            original_name: Some("IMG_0042.HEIC".to_string()),
            content_type: Some("image/heic".to_string()),
            caption: Some("us!".to_string()),
            uploader_name: Some("Sam".to_string()),
            approved: true,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 20, 15, 0).unwrap(),
            prompt_label: Some("Golden hour".to_string()),
        };

        let item = export_item(upload.clone());
        assert_eq!(item.id, upload.id);
        assert_eq!(item.origin_url, upload.url);
        assert_eq!(item.original_name, upload.original_name);
        assert_eq!(item.content_type, upload.content_type);
        assert_eq!(item.uploader_name, upload.uploader_name);
        assert_eq!(item.prompt_label, upload.prompt_label);
        assert_eq!(item.created_at, upload.created_at);
    }
}
