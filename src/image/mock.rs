//! Mock image backend for tests.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{ImageBackend, ImageOutput, ImageRequest};
use crate::illustration::IllustrationError;

/// A test backend that answers `mock://image/{n}` for the n-th call
/// (0-based) and fails the calls listed in `fail_on`.
///
/// Every request is recorded; see [`requests`](MockImageBackend::requests).
#[derive(Debug, Default)]
pub struct MockImageBackend {
    fail_on: BTreeSet<usize>,
    direct: bool,
    calls: AtomicUsize,
    requests: Mutex<Vec<ImageRequest>>,
}

impl MockImageBackend {
    /// A backend whose every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the calls with these 0-based indices.
    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_on: calls.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Offer `mock://direct/{seed}` as the direct URL fallback.
    pub fn with_direct_url(mut self) -> Self {
        self.direct = true;
        self
    }

    /// Number of render calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ImageRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.prompt).collect()
    }
}

#[async_trait]
impl ImageBackend for MockImageBackend {
    async fn render(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &ImageRequest,
    ) -> Result<ImageOutput, IllustrationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_on.contains(&n) {
            return Err(IllustrationError::Status {
                status: 503,
                body: format!("mock failure on call {}", n),
            });
        }
        Ok(ImageOutput::Url(format!("mock://image/{}", n)))
    }

    fn direct_url(&self, _base_url: &str, request: &ImageRequest) -> Option<String> {
        self.direct
            .then(|| format!("mock://direct/{}", request.seed))
    }

    fn name(&self) -> &'static str {
        "mock-image"
    }
}
