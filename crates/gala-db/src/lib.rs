//! Postgres repositories for the gala domain tables.
//!
//! Read-mostly: the gallery and export paths only ever select. Repositories
//! are cheap `Clone`s around the shared pool and are constructed once during
//! bootstrap.

mod event;
mod upload;

pub use event::EventRepository;
pub use upload::UploadRepository;
