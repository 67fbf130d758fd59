//! Admission plan: the validated, ordered, size-capped item list for one
//! export request.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One approved photo selected for export. Built from a datastore row at the
/// read boundary; the pipeline never touches the database after that.
#[derive(Debug, Clone)]
pub struct ExportItem {
    pub id: Uuid,
    /// Publicly fetchable origin URL of the stored object.
    pub origin_url: String,
    pub file_name: Option<String>,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
    pub uploader_name: Option<String>,
    /// Label of the prompt this photo answers, when it answers one.
    pub prompt_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The ordered selection for one export, capped to `limit` items.
///
/// Callers query `limit + 1` rows so truncation is detectable without a
/// separate count; `select` drops the sentinel row again.
#[derive(Debug)]
pub struct ExportPlan {
    pub items: Vec<ExportItem>,
    pub truncated: bool,
    pub limit: usize,
}

impl ExportPlan {
    pub fn select(mut items: Vec<ExportItem>, limit: usize) -> Self {
        let truncated = items.len() > limit;
        items.truncate(limit);
        ExportPlan {
            items,
            truncated,
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
