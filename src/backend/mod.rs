//! Text-generation backend trait and normalized request/response types.
//!
//! The [`TextBackend`] trait abstracts over text providers, translating
//! between the normalized [`TextRequest`]/[`TextResponse`] types and the
//! provider's HTTP API. Built-in implementations: [`GeminiBackend`],
//! [`MockBackend`].
//!
//! ## Architecture
//!
//! ```text
//! StoryTextGenerator ──► TextRequest ──► TextBackend::complete() ──► TextResponse
//!                                              │
//!                                   ┌──────────┴──────────┐
//!                              GeminiBackend          MockBackend
//!                    /v1beta/models/{m}:generateContent   canned replies
//! ```

pub mod gemini;
pub mod mock;

pub use gemini::GeminiBackend;
pub use mock::MockBackend;

use crate::config::GenerationConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::fmt;

/// A normalized text-generation request.
#[derive(Clone)]
pub struct TextRequest {
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    pub model: String,

    /// The prompt text.
    pub prompt: String,

    /// Provider credential. Opaque; never logged.
    pub credential: String,

    /// Sampling policy.
    pub config: GenerationConfig,
}

impl fmt::Debug for TextRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextRequest")
            .field("model", &self.model)
            .field("prompt_len", &self.prompt.len())
            .field("config", &self.config)
            .finish()
    }
}

/// A normalized text-generation response.
#[derive(Debug)]
pub struct TextResponse {
    /// The generated text.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,

    /// Provider-specific metadata (token counts, finish reason, model version).
    pub metadata: Option<serde_json::Value>,
}

/// Abstraction over text-generation providers.
///
/// Implementations make exactly one attempt per call; retrying is left to
/// the caller. A non-success status or an envelope without the generated
/// text must be reported as [`StoryError::Provider`](crate::StoryError::Provider).
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn TextBackend>`.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Execute a single completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &TextRequest,
    ) -> Result<TextResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Parse a `Retry-After` header value given in whole seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<std::time::Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(std::time::Duration::from_secs)
}
