//! HTTP implementation of [`ObjectFetcher`] backed by a shared reqwest client.

use crate::traits::{FetchError, FetchResult, FetchedObject, ObjectFetcher};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Fetches objects over HTTP. Holds a single connection-pooled client;
/// construct once at bootstrap and share via `Arc<dyn ObjectFetcher>`.
#[derive(Clone)]
pub struct HttpObjectFetcher {
    client: reqwest::Client,
}

impl HttpObjectFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(err.to_string())
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    async fn fetch(
        &self,
        url: &str,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> FetchResult<FetchedObject> {
        // The reqwest per-request timeout spans the whole transfer, so a
        // body that stalls mid-stream still errors out at the deadline.
        let request = self.client.get(url).timeout(deadline).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = request => result.map_err(map_reqwest_error)?,
        };

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url, status = status.as_u16(), "origin returned non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error));

        // End the stream early when the export is cancelled; the dropped
        // response aborts the underlying connection.
        let stream = body.take_until(cancel.clone().cancelled_owned());

        Ok(FetchedObject {
            content_length,
            stream: Box::pin(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(object: FetchedObject) -> FetchResult<Vec<u8>> {
        let chunks: Vec<bytes::Bytes> = object.stream.try_collect().await?;
        Ok(chunks.concat())
    }

    #[tokio::test]
    async fn test_fetch_success_streams_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(reqwest::Client::new());
        let cancel = CancellationToken::new();
        let object = fetcher
            .fetch(
                &format!("{}/photos/a.jpg", server.uri()),
                Duration::from_secs(5),
                &cancel,
            )
            .await
            .expect("fetch should succeed");

        let body = collect(object).await.expect("body should stream");
        assert_eq!(body, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn test_fetch_maps_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(reqwest::Client::new());
        let cancel = CancellationToken::new();
        let result = fetcher
            .fetch(
                &format!("{}/photos/missing.jpg", server.uri()),
                Duration::from_secs(5),
                &cancel,
            )
            .await;

        match result {
            Err(FetchError::Status(404)) => {}
            other => panic!("expected Status(404), got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/slow.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"late".to_vec())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(reqwest::Client::new());
        let cancel = CancellationToken::new();
        let result = fetcher
            .fetch(
                &format!("{}/photos/slow.jpg", server.uri()),
                Duration::from_millis(50),
                &cancel,
            )
            .await;

        match result {
            Err(FetchError::Timeout) => {}
            other => panic!("expected Timeout, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fetch_respects_pre_cancelled_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/b.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"never".to_vec())
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let fetcher = HttpObjectFetcher::new(reqwest::Client::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetcher
            .fetch(
                &format!("{}/photos/b.jpg", server.uri()),
                Duration::from_secs(5),
                &cancel,
            )
            .await;

        match result {
            Err(FetchError::Cancelled) => {}
            other => panic!("expected Cancelled, got {:?}", other.map(|_| ())),
        }
    }
}
