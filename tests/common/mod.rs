//! Shared test-double fetcher for integration tests.
//!
//! Most scenarios never need a real socket: [`MockFetcher`] serves fixed bodies from an
//! in-memory map keyed by URI, which is enough to exercise manifest parsing, xlink resolution,
//! and multi-period/variant assembly deterministically and without flakiness. The handful of
//! tests that care about actual HTTP behaviour (redirects, `Date` headers for UTCTiming) spin up
//! a thin `axum` server instead; see `fetch_fault_injection.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use manifest_engine::config::{ManifestConfig, RetryParameters};
use manifest_engine::error::ManifestError;
use manifest_engine::fetch::{FetchFacade, FetchRequest, FetchResponse, Fetcher};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl From<&str> for MockResponse {
    fn from(body: &str) -> Self {
        MockResponse { status: 200, body: body.as_bytes().to_vec(), headers: HashMap::new() }
    }
}

impl From<String> for MockResponse {
    fn from(body: String) -> Self {
        MockResponse { status: 200, body: body.into_bytes(), headers: HashMap::new() }
    }
}

impl From<Vec<u8>> for MockResponse {
    fn from(body: Vec<u8>) -> Self {
        MockResponse { status: 200, body, headers: HashMap::new() }
    }
}

/// An in-memory [`Fetcher`] keyed by exact URI string. Each entry may be consumed more than
/// once (servers don't usually change a manifest mid-test); [`MockFetcher::fail_uri`] makes a
/// URI return a `NetworkError` instead, for `onError`/retry-path tests.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, MockResponse>>,
    failing: Mutex<std::collections::HashSet<String>>,
    request_count: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        MockFetcher::default()
    }

    pub fn with(self, uri: &str, response: impl Into<MockResponse>) -> Self {
        self.responses.lock().expect("mock fetcher poisoned").insert(uri.to_string(), response.into());
        self
    }

    pub fn fail_uri(&self, uri: &str) {
        self.failing.lock().expect("mock fetcher poisoned").insert(uri.to_string());
    }

    /// Replaces a previously-registered response, for tests that refetch the same URI across a
    /// live refresh and need it to serve updated content the second time around.
    pub fn set(&self, uri: &str, response: impl Into<MockResponse>) {
        self.responses.lock().expect("mock fetcher poisoned").insert(uri.to_string(), response.into());
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn request(&self, request: FetchRequest, cancellation_token: CancellationToken) -> Result<FetchResponse, ManifestError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if cancellation_token.is_cancelled() {
            return Err(ManifestError::Aborted);
        }
        let key = request.uri.to_string();
        let network_error = |message: &str| ManifestError::NetworkError {
            uri: key.clone(),
            source: Box::<dyn std::error::Error + Send + Sync>::from(message.to_string()),
        };
        if self.failing.lock().expect("mock fetcher poisoned").contains(&key) {
            return Err(network_error("mock failure"));
        }
        let entry = self
            .responses
            .lock()
            .expect("mock fetcher poisoned")
            .get(&key)
            .cloned()
            .ok_or_else(|| network_error("no mock response registered"))?;

        let body = match (request.range_start, request.range_end) {
            (Some(start), end) => {
                let end = end.map(|e| (e as usize + 1).min(entry.body.len())).unwrap_or(entry.body.len());
                entry.body.get(start as usize..end).unwrap_or(&[]).to_vec()
            }
            (None, _) => entry.body,
        };
        Ok(FetchResponse { uri: request.uri, status: entry.status, headers: entry.headers, body: body.into() })
    }
}

#[async_trait]
impl Fetcher for Arc<MockFetcher> {
    async fn request(&self, request: FetchRequest, cancellation_token: CancellationToken) -> Result<FetchResponse, ManifestError> {
        self.as_ref().request(request, cancellation_token).await
    }
}

/// Builds a [`FetchFacade`] over `fetcher` with retries disabled, suitable for tests that assert
/// exact request counts.
pub fn facade(fetcher: MockFetcher) -> FetchFacade {
    FetchFacade::new(Box::new(fetcher), RetryParameters { max_retries: 0, ..RetryParameters::default() })
}

/// Builds a [`FetchFacade`] over a shared `fetcher`, for tests that need to mutate registered
/// responses (via [`MockFetcher::set`]) between an initial parse and a later refresh.
pub fn facade_shared(fetcher: Arc<MockFetcher>) -> FetchFacade {
    FetchFacade::new(Box::new(fetcher), RetryParameters { max_retries: 0, ..RetryParameters::default() })
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).expect("test URI")
}

pub fn config() -> ManifestConfig {
    ManifestConfig::default()
}
