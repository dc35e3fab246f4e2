//! Illustration step: one image per cover or page.
//!
//! [`Illustrator::illustrate`] composes the final image prompt, sanitizes it
//! down to the characters image providers accept, and asks the configured
//! [`ImageBackend`] for a picture. When that request fails it falls back to
//! the backend's direct URL instead of giving up, so a flaky image endpoint
//! costs at most one picture, never the story.

use crate::config::ImageConfig;
use crate::events::{emit, Event, EventHandler};
use crate::image::{ImageBackend, ImageRequest};
use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// A single illustration request failed. Never fatal to a pipeline run.
#[derive(Error, Debug)]
pub enum IllustrationError {
    /// The image endpoint returned a non-success status.
    #[error("image provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("image request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered, but not with an image or image reference.
    #[error("malformed image response: {0}")]
    MalformedResponse(String),

    #[error("invalid image URL: {0}")]
    InvalidUrl(String),

    /// The backend needs an image credential and none was supplied.
    #[error("image backend requires a credential")]
    MissingCredential,

    /// Nothing was left of the prompt after sanitizing.
    #[error("illustration prompt is empty after sanitizing")]
    EmptyPrompt,
}

/// Whether `c` survives sanitizing: letters and digits of any script, plus
/// space, comma, period and hyphen.
fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | ',' | '.' | '-')
}

/// Drop punctuation, symbols and emoji, keeping letters and digits of any
/// script, and collapse runs of whitespace to single spaces.
///
/// # Examples
///
/// ```
/// use storybook_pipeline::illustration::sanitize_prompt;
///
/// assert_eq!(sanitize_prompt("Ganesha's  \"big\"\nfeast!"), "Ganeshas big feast");
/// assert_eq!(sanitize_prompt("el niño (feliz)"), "el niño feliz");
/// ```
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|&c| is_allowed(c))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `"{prompt}, featuring {avatar}, {style_suffix}"`, skipping empty parts.
pub fn compose_prompt(prompt: &str, avatar_hint: Option<&str>, style_suffix: &str) -> String {
    let mut parts = vec![prompt.trim().to_string()];
    if let Some(avatar) = avatar_hint.map(str::trim).filter(|a| !a.is_empty()) {
        parts.push(format!("featuring {}", avatar));
    }
    parts.push(style_suffix.trim().to_string());
    parts.retain(|p| !p.is_empty());
    parts.join(", ")
}

/// Requests illustrations for one pipeline run.
pub struct Illustrator<'a> {
    client: &'a Client,
    backend: &'a dyn ImageBackend,
    config: &'a ImageConfig,
    credential: Option<&'a str>,
    events: &'a Option<Arc<dyn EventHandler>>,
}

impl<'a> Illustrator<'a> {
    pub fn new(
        client: &'a Client,
        backend: &'a dyn ImageBackend,
        config: &'a ImageConfig,
        credential: Option<&'a str>,
        events: &'a Option<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            client,
            backend,
            config,
            credential,
            events,
        }
    }

    /// The sanitized request that would be sent for `prompt`, with a fresh seed.
    ///
    /// Only the composed prompt has to survive sanitizing; with a style
    /// suffix configured, even a page prompt that sanitizes away still
    /// produces a request.
    pub fn request_for(
        &self,
        prompt: &str,
        avatar_hint: Option<&str>,
    ) -> Result<ImageRequest, IllustrationError> {
        let composed = compose_prompt(prompt, avatar_hint, &self.config.style_suffix);
        let prompt = sanitize_prompt(&composed);
        if prompt.is_empty() {
            return Err(IllustrationError::EmptyPrompt);
        }
        Ok(ImageRequest {
            prompt,
            model: self.config.model.clone(),
            width: self.config.width,
            height: self.config.height,
            seed: fastrand::u32(..),
            nologo: self.config.nologo,
            credential: self.credential.map(str::to_string),
        })
    }

    /// Produce an image URL for `prompt`.
    ///
    /// `target` names the cover or page in logs and events. A failed primary
    /// request falls back to the backend's direct URL; the error is returned
    /// only when the backend has none.
    #[instrument(skip_all, fields(backend = self.backend.name(), illustration = target))]
    pub async fn illustrate(
        &self,
        target: &str,
        prompt: &str,
        avatar_hint: Option<&str>,
    ) -> Result<String, IllustrationError> {
        let request = self.request_for(prompt, avatar_hint)?;
        let base_url = self.config.base_url.as_str();

        match self.backend.render(self.client, base_url, &request).await {
            Ok(output) => {
                debug!(seed = request.seed, "illustration ready");
                Ok(output.into_url())
            }
            Err(e) => match self.backend.direct_url(base_url, &request) {
                Some(url) => {
                    warn!(error = %e, "image request failed, using direct URL");
                    emit(
                        self.events,
                        Event::IllustrationFallback {
                            target: target.to_string(),
                            reason: e.to_string(),
                        },
                    );
                    Ok(url)
                }
                None => Err(e),
            },
        }
    }
}
