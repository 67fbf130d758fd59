use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One guest-submitted photo, as read from the datastore.
///
/// Rows are created by the upload-completion flow and are immutable from the
/// gallery/export side. `prompt_label` is denormalized into the row by the
/// list queries (LEFT JOIN on prompts) so consumers never need a second
/// lookup per photo.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Upload {
    pub id: Uuid,
    pub event_id: Uuid,
    pub prompt_id: Option<Uuid>,
    /// Publicly fetchable origin URL of the stored object (CDN or bucket).
    pub url: String,
    pub file_name: Option<String>,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub caption: Option<String>,
    pub uploader_name: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub prompt_label: Option<String>,
}

/// Public upload representation served to the gallery page.
#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub url: String,
    pub content_type: Option<String>,
    pub caption: Option<String>,
    pub uploader_name: Option<String>,
    pub prompt_id: Option<Uuid>,
    pub prompt_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Upload> for UploadResponse {
    fn from(upload: Upload) -> Self {
        UploadResponse {
            id: upload.id,
            url: upload.url,
            content_type: upload.content_type,
            caption: upload.caption,
            uploader_name: upload.uploader_name,
            prompt_id: upload.prompt_id,
            prompt_label: upload.prompt_label,
            created_at: upload.created_at,
        }
    }
}
