//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use gala_core::models;

/// The served OpenAPI spec.
pub fn openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Gala API",
        version = "0.1.0",
        description = "Event photo gallery API: guests browse approved photos per event and organizers export the whole gallery as a streamed ZIP archive. All endpoints are versioned under /api/v0/."
    ),
    paths(
        handlers::events::get_event,
        handlers::events::list_uploads,
        handlers::export::download_gallery,
    ),
    components(schemas(
        models::EventResponse,
        models::PromptResponse,
        models::UploadResponse,
        error::ErrorResponse,
    )),
    tags(
        (name = "events", description = "Event and gallery reads"),
        (name = "export", description = "Gallery ZIP export")
    )
)]
pub struct ApiDoc;
