//! Fetch abstraction trait

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Fetch operation errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("origin request timed out")]
    Timeout,

    #[error("fetch cancelled")]
    Cancelled,

    #[error("origin returned status {0}")]
    Status(u16),

    #[error("origin response had no body")]
    MissingBody,

    #[error("origin request failed: {0}")]
    Network(String),
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;

/// A stream of body chunks from the origin.
pub type ByteStream = Pin<Box<dyn Stream<Item = FetchResult<Bytes>> + Send>>;

/// A successfully opened origin object. The body has not been consumed yet;
/// chunks arrive as the caller polls `stream`.
pub struct FetchedObject {
    pub content_length: Option<u64>,
    pub stream: ByteStream,
}

/// Origin fetch abstraction
///
/// The production implementation issues HTTP GETs against the object store's
/// public URLs; tests substitute in-process fakes. The deadline covers the
/// entire request, headers through the last body byte, and the cancellation
/// token aborts both the connection attempt and an in-flight body transfer.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchedObject>;
}
