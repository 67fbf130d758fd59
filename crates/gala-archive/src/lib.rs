//! Gallery export core
//!
//! Everything needed to turn an ordered list of approved photos into one
//! streamed ZIP archive: the admission plan (selection + hard cap), the
//! deterministic entry-naming scheme, a streaming store-mode ZIP encoder,
//! and the bounded fetch pool that populates the archive while the HTTP
//! response body is already flowing to the client.

pub mod export;
pub mod naming;
pub mod plan;
pub mod writer;

pub use export::{run_export, ExportConfig, ExportReport};
pub use plan::{ExportItem, ExportPlan};
pub use writer::{ArchiveOutput, EntryError, ZipStreamWriter};
