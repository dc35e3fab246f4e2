//! Mock text backend for testing without a live provider.
//!
//! [`MockBackend`] plays back scripted replies in order, so pipeline tests
//! can exercise both grammars, the fallback story and provider failures
//! deterministically.
//!
//! # Example
//!
//! ```
//! use storybook_pipeline::backend::MockBackend;
//!
//! let mock = MockBackend::fixed("TITLE: X\nPAGE 1:\nTEXT: hi\nIMAGE: a cat");
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{TextBackend, TextRequest, TextResponse};
use crate::error::{Result, StoryError};

/// One scripted outcome.
#[derive(Debug, Clone)]
enum Scripted {
    Reply(String),
    Failure { status: u16, body: String },
}

/// A test backend that plays back scripted outcomes in order.
///
/// Cycles back to the beginning when every outcome has been used. Every
/// prompt it receives is recorded and can be inspected with [`prompts`].
///
/// [`prompts`]: MockBackend::prompts
#[derive(Debug)]
pub struct MockBackend {
    script: Vec<Scripted>,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a mock with the given canned replies.
    ///
    /// With no replies every call answers with an empty string.
    pub fn new(replies: Vec<String>) -> Self {
        Self::from_script(replies.into_iter().map(Scripted::Reply).collect())
    }

    /// Create a mock that always returns the same reply.
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self::new(vec![reply.into()])
    }

    /// Create a mock whose every call fails with a provider error.
    pub fn failing(status: u16, body: impl Into<String>) -> Self {
        Self::from_script(vec![Scripted::Failure {
            status,
            body: body.into(),
        }])
    }

    fn from_script(script: Vec<Scripted>) -> Self {
        Self {
            script,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn next_outcome(&self) -> Scripted {
        let idx = self.index.fetch_add(1, Ordering::Relaxed);
        if self.script.is_empty() {
            return Scripted::Reply(String::new());
        }
        self.script[idx % self.script.len()].clone()
    }
}

#[async_trait]
impl TextBackend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &TextRequest,
    ) -> Result<TextResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        match self.next_outcome() {
            Scripted::Reply(text) => Ok(TextResponse {
                text,
                status: 200,
                metadata: None,
            }),
            Scripted::Failure { status, body } => Err(StoryError::Provider {
                status,
                body,
                retry_after: None,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
