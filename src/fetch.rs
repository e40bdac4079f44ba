//! Fetch facade: the one abstraction the rest of the crate uses to get bytes off the network.
//!
//! The engine never calls an HTTP client directly; every request goes through a [`Fetcher`] so
//! that embedders can supply their own (platform XHR, a test double, a cookie-jar-sharing
//! wrapper around the host application's existing client). A redirect's *final* URI becomes the
//! new base URI for any relative references resolved from the response body, which is why
//! [`FetchResponse`] always carries the URI it was actually served from.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::ManifestError;

/// Distinguishes the purpose of a request, mirroring the player's `NetworkingEngine` request
/// types; embedders use this to apply per-purpose headers (auth tokens on manifests but not
/// segments, say) or bandwidth-estimator bookkeeping (segments count towards the estimate,
/// manifests and keys don't).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Manifest,
    Segment,
    License,
    Key,
    Timing,
    App,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// A single outgoing request, fully described so a `Fetcher` implementation never needs to
/// consult crate-internal state.
#[derive(Debug)]
pub struct FetchRequest {
    pub request_type: RequestType,
    pub uri: Url,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    /// Inclusive byte range, when only part of the resource is wanted (segment byte-range
    /// addressing, or a probe that only needs the first few KiB of a segment).
    pub range_start: Option<u64>,
    pub range_end: Option<u64>,
}

impl Clone for FetchRequest {
    fn clone(&self) -> Self {
        FetchRequest {
            request_type: self.request_type,
            uri: self.uri.clone(),
            method: self.method,
            headers: self.headers.clone(),
            body: self.body.clone(),
            range_start: self.range_start,
            range_end: self.range_end,
        }
    }
}

impl FetchRequest {
    pub fn get(request_type: RequestType, uri: Url) -> Self {
        FetchRequest {
            request_type,
            uri,
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: None,
            range_start: None,
            range_end: None,
        }
    }

    pub fn head(request_type: RequestType, uri: Url) -> Self {
        FetchRequest { method: HttpMethod::Head, ..FetchRequest::get(request_type, uri) }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_range(mut self, start: u64, end: Option<u64>) -> Self {
        self.range_start = Some(start);
        self.range_end = end;
        self
    }
}

/// A response; `uri` is the *final* URI after any redirects the fetcher followed, and is what
/// callers must treat as the new base for resolving relative references in the body.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub uri: Url,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: bytes::Bytes,
}

impl FetchResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        let lower = name.to_ascii_lowercase();
        self.headers.iter().find(|(k, _)| k.to_ascii_lowercase() == lower).map(|(_, v)| v.as_str())
    }
}

/// The sole networking seam. Implementations are supplied by the embedder.
///
/// Cancellation is cooperative: implementations should race the request against
/// `cancellation_token.cancelled()` and return [`ManifestError::Aborted`] rather than a
/// `NetworkError` when cancellation wins, so callers can tell "the user navigated away" apart
/// from "the network failed".
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn request(
        &self,
        request: FetchRequest,
        cancellation_token: CancellationToken,
    ) -> Result<FetchResponse, ManifestError>;
}

/// Wraps a [`Fetcher`] with the retry policy and range-request convenience the parsers need,
/// keeping the raw trait small enough for embedders to implement in a few lines.
pub struct FetchFacade {
    fetcher: Box<dyn Fetcher>,
    retry: crate::config::RetryParameters,
}

impl FetchFacade {
    pub fn new(fetcher: Box<dyn Fetcher>, retry: crate::config::RetryParameters) -> Self {
        FetchFacade { fetcher, retry }
    }

    /// Issue a GET, retrying transient `NetworkError`s up to `retry.max_retries` times with
    /// exponential backoff. `Aborted` is never retried.
    pub async fn get(
        &self,
        request_type: RequestType,
        uri: Url,
        cancellation_token: CancellationToken,
    ) -> Result<FetchResponse, ManifestError> {
        self.execute_with_retry(FetchRequest::get(request_type, uri), cancellation_token).await
    }

    /// Issue a byte-range GET (`Range: bytes=start-end`), used for DASH `SegmentBase` index
    /// ranges and the media-container probe's partial segment reads.
    pub async fn get_range(
        &self,
        request_type: RequestType,
        uri: Url,
        start: u64,
        end: Option<u64>,
        cancellation_token: CancellationToken,
    ) -> Result<FetchResponse, ManifestError> {
        self.execute_with_retry(FetchRequest::get(request_type, uri).with_range(start, end), cancellation_token)
            .await
    }

    pub async fn head(
        &self,
        request_type: RequestType,
        uri: Url,
        cancellation_token: CancellationToken,
    ) -> Result<FetchResponse, ManifestError> {
        self.execute_with_retry(FetchRequest::head(request_type, uri), cancellation_token).await
    }

    async fn execute_with_retry(
        &self,
        request: FetchRequest,
        cancellation_token: CancellationToken,
    ) -> Result<FetchResponse, ManifestError> {
        use backon::{ExponentialBuilder, Retryable};

        if cancellation_token.is_cancelled() {
            return Err(ManifestError::Aborted);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry.base_delay)
            .with_max_times(self.retry.max_retries as usize);

        let fetcher = &self.fetcher;
        let uri_for_log = request.uri.clone();

        (|| {
            let request = request.clone();
            let cancellation_token = cancellation_token.clone();
            async move { fetcher.request(request, cancellation_token).await }
        })
        .retry(backoff)
        .when(|err: &ManifestError| !err.is_aborted())
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, uri = %uri_for_log, "retrying fetch");
        })
        .await
    }
}

/// Default `reqwest`-backed implementation, used when the crate's `fetch` feature is enabled and
/// the embedder doesn't supply its own [`Fetcher`].
#[cfg(feature = "fetch")]
pub mod reqwest_fetcher {
    use super::*;

    pub struct ReqwestFetcher {
        client: reqwest::Client,
    }

    impl ReqwestFetcher {
        pub fn new() -> Result<Self, ManifestError> {
            let client = reqwest::Client::builder()
                .build()
                .map_err(|e| ManifestError::Other(format!("building HTTP client: {e}")))?;
            Ok(ReqwestFetcher { client })
        }

        pub fn with_client(client: reqwest::Client) -> Self {
            ReqwestFetcher { client }
        }
    }

    #[async_trait]
    impl Fetcher for ReqwestFetcher {
        async fn request(
            &self,
            request: FetchRequest,
            cancellation_token: CancellationToken,
        ) -> Result<FetchResponse, ManifestError> {
            let mut builder = match request.method {
                HttpMethod::Get => self.client.get(request.uri.clone()),
                HttpMethod::Head => self.client.head(request.uri.clone()),
            };
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }
            if let Some(start) = request.range_start {
                let range = match request.range_end {
                    Some(end) => format!("bytes={start}-{end}"),
                    None => format!("bytes={start}-"),
                };
                builder = builder.header("Range", range);
            }
            if let Some(body) = request.body.clone() {
                builder = builder.body(body);
            }

            let send_fut = builder.send();
            tokio::pin!(send_fut);

            let response = tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => return Err(ManifestError::Aborted),
                result = &mut send_fut => result.map_err(|e| ManifestError::NetworkError {
                    uri: request.uri.to_string(),
                    source: Box::new(e),
                })?,
            };

            let final_uri = response.url().clone();
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();

            let body_fut = response.bytes();
            tokio::pin!(body_fut);
            let body = tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => return Err(ManifestError::Aborted),
                result = &mut body_fut => result.map_err(|e| ManifestError::NetworkError {
                    uri: request.uri.to_string(),
                    source: Box::new(e),
                })?,
            };

            Ok(FetchResponse { uri: final_uri, status, headers, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyFetcher {
        failures_remaining: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Fetcher for FlakyFetcher {
        async fn request(
            &self,
            request: FetchRequest,
            _cancellation_token: CancellationToken,
        ) -> Result<FetchResponse, ManifestError> {
            let was_failing = self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None })
                .is_ok();
            if was_failing {
                return Err(ManifestError::NetworkError {
                    uri: request.uri.to_string(),
                    source: Box::new(std::io::Error::other("connection reset")),
                });
            }
            Ok(FetchResponse {
                uri: request.uri,
                status: 200,
                headers: HashMap::new(),
                body: bytes::Bytes::from_static(b"ok"),
            })
        }
    }

    struct AlwaysAbortedFetcher;

    #[async_trait]
    impl Fetcher for AlwaysAbortedFetcher {
        async fn request(
            &self,
            _request: FetchRequest,
            _cancellation_token: CancellationToken,
        ) -> Result<FetchResponse, ManifestError> {
            Err(ManifestError::Aborted)
        }
    }

    #[tokio::test]
    async fn retries_transient_network_errors_until_success() {
        let fetcher = FlakyFetcher { failures_remaining: Arc::new(AtomicU32::new(2)) };
        let facade = FetchFacade::new(
            Box::new(fetcher),
            crate::config::RetryParameters { max_retries: 5, base_delay: Duration::from_millis(1) },
        );
        let response = facade
            .get(RequestType::Manifest, Url::parse("https://example.com/manifest.mpd").unwrap(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn aborted_is_never_retried() {
        let facade = FetchFacade::new(
            Box::new(AlwaysAbortedFetcher),
            crate::config::RetryParameters { max_retries: 5, base_delay: Duration::from_millis(1) },
        );
        let err = facade
            .get(RequestType::Segment, Url::parse("https://example.com/seg.mp4").unwrap(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits_before_any_request() {
        let fetcher = FlakyFetcher { failures_remaining: Arc::new(AtomicU32::new(0)) };
        let facade = FetchFacade::new(
            Box::new(fetcher),
            crate::config::RetryParameters { max_retries: 0, base_delay: Duration::from_millis(1) },
        );
        let token = CancellationToken::new();
        token.cancel();
        let err = facade
            .get(RequestType::Manifest, Url::parse("https://example.com/manifest.mpd").unwrap(), token)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
    }
}
