//! Application state: repositories, the origin fetcher, and export tuning,
//! constructed once at bootstrap and shared behind an `Arc`.

use gala_archive::ExportConfig;
use gala_core::Config;
use gala_db::{EventRepository, UploadRepository};
use gala_fetch::ObjectFetcher;
use sqlx::PgPool;
use std::sync::Arc;

pub struct AppState {
    pub pool: PgPool,
    pub events: EventRepository,
    pub uploads: UploadRepository,
    /// Origin fetch client used by the export pipeline. A trait object so
    /// tests and alternative stores can substitute implementations.
    pub fetcher: Arc<dyn ObjectFetcher>,
    pub export: ExportConfig,
    pub config: Config,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
