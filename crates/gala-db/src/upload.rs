use gala_core::models::Upload;
use gala_core::AppError;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct UploadRepository {
    pool: PgPool,
}

impl UploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Approved uploads for an event in creation order (oldest first), with
    /// the prompt label denormalized in. `prompt_id` narrows the result to a
    /// single prompt; `limit` is how many rows the caller wants at most.
    /// Export admission passes its cap plus one so it can detect truncation
    /// without a count query.
    #[tracing::instrument(
        skip(self),
        fields(db.table = "uploads", db.operation = "select", db.record_id = %event_id)
    )]
    pub async fn list_approved(
        &self,
        event_id: Uuid,
        prompt_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<Upload>, AppError> {
        let uploads = sqlx::query_as::<_, Upload>(
            r#"
            SELECT
                u.id,
                u.event_id,
                u.prompt_id,
                u.url,
                u.file_name,
                u.original_name,
                u.content_type,
                u.caption,
                u.uploader_name,
                u.approved,
                u.created_at,
                p.label AS prompt_label
            FROM uploads u
            LEFT JOIN prompts p ON p.id = u.prompt_id
            WHERE u.event_id = $1
              AND u.approved
              AND ($2::uuid IS NULL OR u.prompt_id = $2)
            ORDER BY u.created_at ASC
            LIMIT $3
            "#,
        )
        .bind(event_id)
        .bind(prompt_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(uploads)
    }
}
