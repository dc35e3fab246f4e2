//! Backend for Google's Gemini `generateContent` API.
//!
//! [`GeminiBackend`] sends the prompt as a single user turn with the fixed
//! sampling policy and safety settings, and reads the reply from
//! `candidates[0].content.parts[0].text`. The envelope is decoded into typed
//! structs so every way it can be malformed maps to a
//! [`StoryError::Provider`].

use super::{parse_retry_after, TextBackend, TextRequest, TextResponse};
use crate::error::{Result, StoryError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Backend for the Gemini `generateContent` endpoint.
///
/// Endpoint: `{base_url}/v1beta/models/{model}:generateContent`.
/// The credential is sent in the `x-goog-api-key` header, never in the URL.
#[derive(Debug, Clone, Default)]
pub struct GeminiBackend;

/// Response envelope of `generateContent`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<Value>,
    pub usage_metadata: Option<Value>,
    pub model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct Part {
    pub text: Option<String>,
}

/// Why an envelope carried no generated text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// The body was not a `generateContent` envelope at all.
    NotAnEnvelope(String),
    /// `candidates` was absent or empty (often a blocked prompt).
    NoCandidates,
    /// The first candidate had no content parts.
    NoContent { finish_reason: Option<String> },
    /// The first part had no `text`.
    NoText,
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeError::NotAnEnvelope(e) => write!(f, "response is not a generateContent envelope: {}", e),
            EnvelopeError::NoCandidates => f.write_str("response has no candidates"),
            EnvelopeError::NoContent { finish_reason: Some(r) } => {
                write!(f, "first candidate has no content (finish reason {})", r)
            }
            EnvelopeError::NoContent { finish_reason: None } => {
                f.write_str("first candidate has no content")
            }
            EnvelopeError::NoText => f.write_str("first content part has no text"),
        }
    }
}

impl GenerateContentResponse {
    /// The generated text at `candidates[0].content.parts[0].text`.
    pub fn first_text(&self) -> std::result::Result<&str, EnvelopeError> {
        let candidate = self.candidates.first().ok_or(EnvelopeError::NoCandidates)?;
        let part = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.first())
            .ok_or_else(|| EnvelopeError::NoContent {
                finish_reason: candidate.finish_reason.clone(),
            })?;
        part.text.as_deref().ok_or(EnvelopeError::NoText)
    }

    fn metadata(&self) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        if let Some(ref usage) = self.usage_metadata {
            meta.insert("usage".into(), usage.clone());
        }
        if let Some(ref version) = self.model_version {
            meta.insert("model_version".into(), json!(version));
        }
        if let Some(reason) = self.candidates.first().and_then(|c| c.finish_reason.as_ref()) {
            meta.insert("finish_reason".into(), json!(reason));
        }
        if meta.is_empty() {
            None
        } else {
            Some(Value::Object(meta))
        }
    }
}

/// Decode a success body into the generated text.
pub fn decode_envelope(body: &str) -> std::result::Result<(String, Option<Value>), EnvelopeError> {
    let envelope: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| EnvelopeError::NotAnEnvelope(e.to_string()))?;
    let text = envelope.first_text()?.to_string();
    Ok((text, envelope.metadata()))
}

impl GeminiBackend {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(base_url: &str, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        )
    }

    /// Build the JSON body for `generateContent`.
    fn build_body(request: &TextRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }],
            }],
            "generationConfig": request.config.to_json(),
            "safetySettings": request.config.safety_settings(),
        })
    }
}

#[async_trait]
impl TextBackend for GeminiBackend {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &TextRequest,
    ) -> Result<TextResponse> {
        let url = Self::endpoint(base_url, &request.model);
        debug!(url = %url, prompt_len = request.prompt.len(), "sending generateContent request");

        let resp = client
            .post(&url)
            .header(API_KEY_HEADER, &request.credential)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = resp.text().await.unwrap_or_default();
            warn!(status, "text provider returned an error status");
            return Err(StoryError::Provider {
                status,
                body,
                retry_after,
            });
        }

        let body = resp.text().await?;
        match decode_envelope(&body) {
            Ok((text, metadata)) => {
                debug!(status, reply_len = text.len(), "received story text");
                Ok(TextResponse {
                    text,
                    status,
                    metadata,
                })
            }
            Err(e) => {
                warn!(status, error = %e, "malformed generateContent envelope");
                Err(StoryError::Provider {
                    status,
                    body: format!("{}: {}", e, body),
                    retry_after: None,
                })
            }
        }
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}
