//! Story text generation: one prompt in, one raw reply out.

use crate::backend::{TextBackend, TextRequest};
use crate::config::{GenerationConfig, TextProviderConfig};
use crate::error::{Result, StoryError};
use reqwest::Client;
use tracing::{info, instrument};

/// Sends a built prompt to the text provider and returns the reply text.
///
/// Makes exactly one attempt. Provider failures come back as
/// [`StoryError::Provider`] or [`StoryError::Request`] and are fatal to the
/// run that asked for them.
pub struct StoryTextGenerator<'a> {
    client: &'a Client,
    backend: &'a dyn TextBackend,
    provider: &'a TextProviderConfig,
    sampling: GenerationConfig,
}

impl<'a> StoryTextGenerator<'a> {
    pub fn new(
        client: &'a Client,
        backend: &'a dyn TextBackend,
        provider: &'a TextProviderConfig,
    ) -> Self {
        Self {
            client,
            backend,
            provider,
            sampling: GenerationConfig::default(),
        }
    }

    /// Generate the raw story reply for `prompt`.
    #[instrument(skip_all, fields(backend = self.backend.name(), model = %self.provider.model))]
    pub async fn generate(&self, prompt: &str, credential: &str) -> Result<String> {
        if credential.trim().is_empty() {
            return Err(StoryError::Validation(
                "text provider credential is empty".into(),
            ));
        }
        let request = TextRequest {
            model: self.provider.model.clone(),
            prompt: prompt.to_string(),
            credential: credential.to_string(),
            config: self.sampling.clone(),
        };
        let response = self
            .backend
            .complete(self.client, &self.provider.base_url, &request)
            .await?;
        info!(
            status = response.status,
            reply_len = response.text.len(),
            "story text generated"
        );
        Ok(response.text)
    }
}
