//! Export population: the bounded fetch pool feeding the archive writer.
//!
//! `run_export` is the body of the background task spawned by the download
//! handler. It fans the plan's items out to fetch tasks gated by a
//! semaphore, pipes each fetched body into the archive writer one entry at a
//! time, records per-item failures, appends the degraded-condition
//! manifests, and finalizes (or aborts) the archive.
//!
//! A fetch task's semaphore permit travels with the fetched object and is
//! released only after that item's archive entry is fully written, so at
//! most `concurrency` origin transfers are alive at once and memory stays
//! bounded by concurrency, not by the item count.

use crate::naming;
use crate::plan::{ExportItem, ExportPlan};
use crate::writer::{EntryError, ZipStreamWriter};
use chrono::Utc;
use gala_fetch::{FetchError, FetchedObject, ObjectFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const LIMIT_MANIFEST_NAME: &str = "WARNING-LIMIT.txt";
const FAILED_MANIFEST_NAME: &str = "FAILED.txt";

/// Tuning knobs for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Maximum concurrent origin fetches.
    pub concurrency: usize,
    /// Deadline for a single origin fetch, headers through last body byte.
    pub item_timeout: Duration,
    /// Hard cap on photos per archive.
    pub max_items: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            concurrency: 6,
            item_timeout: Duration::from_secs(25),
            max_items: 2_000,
        }
    }
}

/// What happened during one export run, for logging and tests.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Entries fully written to the archive.
    pub included: usize,
    /// Upload ids whose fetch or transfer failed. Never retried.
    pub failed: Vec<Uuid>,
    pub truncated: bool,
    /// True when the export ended without a finalized archive (client
    /// disconnect, external cancellation, or a writer-fatal error).
    pub cancelled: bool,
    /// Total archive size; zero when the export was cancelled or aborted.
    pub bytes_written: u64,
}

enum FetchOutcome {
    /// Origin responded; the permit rides along until the entry is written.
    Fetched {
        item: ExportItem,
        object: FetchedObject,
        permit: OwnedSemaphorePermit,
    },
    Failed {
        id: Uuid,
        error: FetchError,
    },
    /// Cancelled before or during the fetch; deliberately not a failure.
    Skipped,
}

/// Populate `writer` with the plan's items and finalize it. Never panics on
/// per-item trouble; only a closed output (client gone) or an explicit
/// cancellation ends the run early.
pub async fn run_export(
    plan: ExportPlan,
    fetcher: Arc<dyn ObjectFetcher>,
    mut writer: ZipStreamWriter,
    config: ExportConfig,
    cancel: CancellationToken,
) -> ExportReport {
    let ExportPlan {
        items,
        truncated,
        limit,
    } = plan;
    let selected = items.len();
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let (outcome_tx, mut outcomes) = mpsc::channel::<FetchOutcome>(config.concurrency.max(1));

    // Dispatcher: acquires a permit per item in plan order before spawning
    // its fetch, so admission is strictly first-come in creation-time order.
    // Cancellation stops dispatching; undispatched items are dropped
    // silently, not recorded as failures.
    {
        let fetcher = fetcher.clone();
        let cancel = cancel.clone();
        let timeout = config.item_timeout;
        tokio::spawn(async move {
            for item in items {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };
                let fetcher = fetcher.clone();
                let outcome_tx = outcome_tx.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let outcome = fetch_one(item, fetcher, permit, timeout, &cancel).await;
                    // The receiver disappears when the run is torn down.
                    let _ = outcome_tx.send(outcome).await;
                });
            }
        });
    }

    let mut report = ExportReport {
        truncated,
        ..ExportReport::default()
    };
    let mut sink_closed = false;

    while let Some(outcome) = outcomes.recv().await {
        match outcome {
            FetchOutcome::Fetched {
                item,
                object,
                permit,
            } => {
                let entry = naming::entry_name(&item);
                match writer
                    .append_stream(&entry, item.created_at, object.stream)
                    .await
                {
                    Ok(bytes) => {
                        tracing::debug!(upload_id = %item.id, entry = %entry, bytes, "archived photo");
                        report.included += 1;
                    }
                    Err(EntryError::Source { written, source }) => {
                        tracing::warn!(
                            upload_id = %item.id,
                            written,
                            error = %source,
                            "photo stream failed mid-entry"
                        );
                        report.failed.push(item.id);
                    }
                    Err(EntryError::TooLarge { written }) => {
                        tracing::warn!(
                            upload_id = %item.id,
                            written,
                            "photo exceeds the store-mode size limit"
                        );
                        report.failed.push(item.id);
                    }
                    Err(EntryError::SinkClosed) => {
                        sink_closed = true;
                    }
                }
                drop(permit);
                if sink_closed {
                    break;
                }
            }
            FetchOutcome::Failed { id, error } => {
                tracing::warn!(upload_id = %id, error = %error, "photo fetch failed");
                report.failed.push(id);
            }
            FetchOutcome::Skipped => {}
        }
    }

    if sink_closed || cancel.is_cancelled() {
        // Wake queued fetch tasks so they exit instead of fetching into a
        // dead archive.
        cancel.cancel();
        report.cancelled = true;
        writer.abort().await;
        log_finished(&report, selected);
        return report;
    }

    if report.truncated {
        let text = format!(
            "This event has more approved photos than the export limit.\n\
             Limit: {} photos\n\
             Included in this archive: {} photos\n",
            limit, report.included
        );
        if writer
            .append_text(LIMIT_MANIFEST_NAME, Utc::now(), &text)
            .await
            .is_err()
        {
            report.cancelled = true;
            writer.abort().await;
            log_finished(&report, selected);
            return report;
        }
    }

    if !report.failed.is_empty() {
        let mut text = String::new();
        for id in &report.failed {
            text.push_str(&id.to_string());
            text.push('\n');
        }
        if writer
            .append_text(FAILED_MANIFEST_NAME, Utc::now(), &text)
            .await
            .is_err()
        {
            report.cancelled = true;
            writer.abort().await;
            log_finished(&report, selected);
            return report;
        }
    }

    match writer.finalize().await {
        Ok(bytes) => report.bytes_written = bytes,
        Err(error) => {
            tracing::error!(error = %error, "failed to finalize archive");
            report.cancelled = true;
        }
    }

    log_finished(&report, selected);
    report
}

fn log_finished(report: &ExportReport, selected: usize) {
    tracing::info!(
        included = report.included,
        failed = report.failed.len(),
        selected,
        truncated = report.truncated,
        cancelled = report.cancelled,
        bytes = report.bytes_written,
        "gallery export finished"
    );
}

async fn fetch_one(
    item: ExportItem,
    fetcher: Arc<dyn ObjectFetcher>,
    permit: OwnedSemaphorePermit,
    timeout: Duration,
    cancel: &CancellationToken,
) -> FetchOutcome {
    if cancel.is_cancelled() {
        return FetchOutcome::Skipped;
    }

    match fetcher.fetch(&item.origin_url, timeout, cancel).await {
        Ok(object) => FetchOutcome::Fetched {
            item,
            object,
            permit,
        },
        Err(FetchError::Cancelled) => FetchOutcome::Skipped,
        Err(error) => {
            drop(permit);
            FetchOutcome::Failed {
                id: item.id,
                error,
            }
        }
    }
}
