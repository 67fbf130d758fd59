use gala_core::models::{Event, Prompt};
use gala_core::AppError;
use sqlx::PgPool;

#[derive(Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve an event by its guest-facing public identifier.
    #[tracing::instrument(skip(self), fields(db.table = "events", db.operation = "select"))]
    pub async fn get_by_public_id(&self, public_id: &str) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, public_id, name, is_active, created_at
            FROM events
            WHERE public_id = $1
            "#,
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Prompts for an event, in their curated display order.
    #[tracing::instrument(skip(self), fields(db.table = "prompts", db.operation = "select", db.record_id = %event_id))]
    pub async fn list_prompts(&self, event_id: uuid::Uuid) -> Result<Vec<Prompt>, AppError> {
        let prompts = sqlx::query_as::<_, Prompt>(
            r#"
            SELECT id, event_id, label, position, created_at
            FROM prompts
            WHERE event_id = $1
            ORDER BY position ASC, created_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(prompts)
    }
}
