//! Image-generation backend trait and request/response types.
//!
//! [`ImageBackend`] turns a finished, sanitized [`ImageRequest`] into an
//! [`ImageOutput`]. A backend may also offer a *direct URL*: a parameterized
//! link that renders the same image when fetched, used as the fallback when
//! the primary request fails.
//!
//! Built-in implementations: [`PollinationsBackend`], [`MockImageBackend`],
//! and `OpenAiImageBackend` behind the `openai` feature.

pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pollinations;

pub use mock::MockImageBackend;
#[cfg(feature = "openai")]
pub use openai::OpenAiImageBackend;
pub use pollinations::PollinationsBackend;

use crate::illustration::IllustrationError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use std::fmt;

/// A single image request, ready for submission.
#[derive(Clone)]
pub struct ImageRequest {
    /// Final prompt, already composed and sanitized.
    pub prompt: String,

    /// Provider model identifier (e.g. `"flux"`).
    pub model: String,

    pub width: u32,
    pub height: u32,

    /// Random per-request seed so repeated prompts do not hit a cached image.
    pub seed: u32,

    /// Ask the provider not to watermark the image.
    pub nologo: bool,

    /// Provider credential, if the backend needs one. Never logged.
    pub credential: Option<String>,
}

impl fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRequest")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("size", &format_args!("{}x{}", self.width, self.height))
            .field("seed", &self.seed)
            .field("nologo", &self.nologo)
            .field("has_credential", &self.credential.is_some())
            .finish()
    }
}

/// What an image backend produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutput {
    /// A URL the image can be loaded from.
    Url(String),
    /// Raw image bytes.
    Data { mime: String, bytes: Vec<u8> },
}

impl ImageOutput {
    /// A URL for this image. Raw bytes become a base64 `data:` URL.
    pub fn into_url(self) -> String {
        match self {
            ImageOutput::Url(url) => url,
            ImageOutput::Data { mime, bytes } => {
                format!("data:{};base64,{}", mime, BASE64.encode(bytes))
            }
        }
    }
}

/// Abstraction over image-generation providers.
///
/// Object-safe; used as `Arc<dyn ImageBackend>`.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Make the primary request for one image.
    async fn render(
        &self,
        client: &Client,
        base_url: &str,
        request: &ImageRequest,
    ) -> Result<ImageOutput, IllustrationError>;

    /// A parameterized URL that renders `request` when fetched, if the
    /// provider supports one.
    fn direct_url(&self, base_url: &str, request: &ImageRequest) -> Option<String>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}
