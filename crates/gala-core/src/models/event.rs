use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// An organizer-created event whose guests submit photos against prompts.
///
/// `public_id` is the opaque identifier embedded in guest-facing links and
/// QR codes; the numeric-free slug is what all public routes key on.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub public_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A curated photo prompt belonging to an event.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Prompt {
    pub id: Uuid,
    pub event_id: Uuid,
    pub label: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Public event representation served to the gallery page.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    pub public_id: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub prompts: Vec<PromptResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromptResponse {
    pub id: Uuid,
    pub label: String,
    pub position: i32,
}

impl From<Prompt> for PromptResponse {
    fn from(prompt: Prompt) -> Self {
        PromptResponse {
            id: prompt.id,
            label: prompt.label,
            position: prompt.position,
        }
    }
}

impl EventResponse {
    pub fn from_parts(event: Event, prompts: Vec<Prompt>) -> Self {
        EventResponse {
            public_id: event.public_id,
            name: event.name,
            is_active: event.is_active,
            created_at: event.created_at,
            prompts: prompts.into_iter().map(PromptResponse::from).collect(),
        }
    }
}
