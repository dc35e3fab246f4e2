//! Backend for OpenAI-compatible `/v1/images/generations` endpoints.
//!
//! Requires the caller's image credential (sent as a bearer token). Offers
//! no direct URL, so a failed request leaves the target without an image.

use super::{ImageBackend, ImageOutput, ImageRequest};
use crate::illustration::IllustrationError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
pub struct OpenAiImageBackend;

#[derive(Debug, Serialize)]
struct GenerationsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: String,
}

#[derive(Debug, Deserialize)]
struct GenerationsResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
}

impl OpenAiImageBackend {
    pub fn new() -> Self {
        Self
    }

    fn endpoint(base_url: &str) -> String {
        format!("{}/v1/images/generations", base_url.trim_end_matches('/'))
    }

    fn build_body(request: &ImageRequest) -> GenerationsRequest<'_> {
        GenerationsRequest {
            model: &request.model,
            prompt: &request.prompt,
            n: 1,
            size: format!("{}x{}", request.width, request.height),
        }
    }

    /// Decode a success body into the first generated image.
    fn decode(body: &[u8]) -> Result<ImageOutput, IllustrationError> {
        let parsed: GenerationsResponse = serde_json::from_slice(body)
            .map_err(|e| IllustrationError::MalformedResponse(e.to_string()))?;
        let first = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| IllustrationError::MalformedResponse("no image data returned".into()))?;

        if let Some(url) = first.url {
            return Ok(ImageOutput::Url(url));
        }
        if let Some(b64) = first.b64_json {
            let bytes = BASE64
                .decode(b64)
                .map_err(|e| IllustrationError::MalformedResponse(e.to_string()))?;
            return Ok(ImageOutput::Data {
                mime: "image/png".into(),
                bytes,
            });
        }
        Err(IllustrationError::MalformedResponse(
            "image entry has neither url nor b64_json".into(),
        ))
    }
}

#[async_trait]
impl ImageBackend for OpenAiImageBackend {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn render(
        &self,
        client: &Client,
        base_url: &str,
        request: &ImageRequest,
    ) -> Result<ImageOutput, IllustrationError> {
        let credential = request
            .credential
            .as_deref()
            .ok_or(IllustrationError::MissingCredential)?;
        let url = Self::endpoint(base_url);
        debug!(url = %url, "requesting illustration");

        let resp = client
            .post(&url)
            .bearer_auth(credential)
            .json(&Self::build_body(request))
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(IllustrationError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Self::decode(&bytes)
    }

    fn direct_url(&self, _base_url: &str, _request: &ImageRequest) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "openai-images"
    }
}
