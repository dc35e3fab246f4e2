//! Backend for the Pollinations image endpoint.
//!
//! Images are addressed by URL: `GET {base}/prompt/{prompt}?width=..&height=..
//! &seed=..&model=..&nologo=true`. The same URL doubles as the direct URL
//! fallback, so a failed fetch still leaves the reader with a working link.

use super::{ImageBackend, ImageOutput, ImageRequest};
use crate::illustration::IllustrationError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct PollinationsBackend;

/// JSON answer some deployments give instead of the image itself.
#[derive(Debug, Deserialize)]
struct UrlEnvelope {
    url: String,
}

impl PollinationsBackend {
    pub fn new() -> Self {
        Self
    }

    /// Build the parameterized image URL, percent-encoding the prompt.
    pub fn image_url(base_url: &str, request: &ImageRequest) -> Result<Url, IllustrationError> {
        let mut url =
            Url::parse(base_url).map_err(|e| IllustrationError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| IllustrationError::InvalidUrl(format!("{} cannot be a base", base_url)))?
            .pop_if_empty()
            .push("prompt")
            .push(&request.prompt);
        url.query_pairs_mut()
            .append_pair("width", &request.width.to_string())
            .append_pair("height", &request.height.to_string())
            .append_pair("seed", &request.seed.to_string())
            .append_pair("model", &request.model)
            .append_pair("nologo", if request.nologo { "true" } else { "false" });
        Ok(url)
    }
}

#[async_trait]
impl ImageBackend for PollinationsBackend {
    #[instrument(skip_all, fields(seed = request.seed))]
    async fn render(
        &self,
        client: &Client,
        base_url: &str,
        request: &ImageRequest,
    ) -> Result<ImageOutput, IllustrationError> {
        let url = Self::image_url(base_url, request)?;
        debug!(url = %url, "requesting illustration");

        let resp = client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IllustrationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mime = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase())
            .unwrap_or_default();
        let bytes = resp.bytes().await?;

        if mime.starts_with("image/") {
            return Ok(ImageOutput::Data {
                mime,
                bytes: bytes.to_vec(),
            });
        }
        if mime == "application/json" {
            let envelope: UrlEnvelope = serde_json::from_slice(&bytes)
                .map_err(|e| IllustrationError::MalformedResponse(e.to_string()))?;
            return Ok(ImageOutput::Url(envelope.url));
        }
        Err(IllustrationError::MalformedResponse(format!(
            "unexpected content type {:?}",
            mime
        )))
    }

    fn direct_url(&self, base_url: &str, request: &ImageRequest) -> Option<String> {
        Self::image_url(base_url, request).ok().map(String::from)
    }

    fn name(&self) -> &'static str {
        "pollinations"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> ImageRequest {
        ImageRequest {
            prompt: prompt.into(),
            model: "flux".into(),
            width: 1024,
            height: 768,
            seed: 4242,
            nologo: true,
            credential: None,
        }
    }

    #[test]
    fn test_image_url_encodes_prompt_and_parameters() {
        let url = PollinationsBackend::image_url(
            "https://image.pollinations.ai",
            &request("a fox, in the snow"),
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://image.pollinations.ai/prompt/a%20fox,%20in%20the%20snow?width=1024&height=768&seed=4242&model=flux&nologo=true"
        );
    }

    #[test]
    fn test_direct_url_matches_image_url() {
        let backend = PollinationsBackend::new();
        let req = request("a fox");
        assert_eq!(
            backend.direct_url("https://image.pollinations.ai", &req),
            Some(
                PollinationsBackend::image_url("https://image.pollinations.ai", &req)
                    .unwrap()
                    .to_string()
            )
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            PollinationsBackend::image_url("not a url", &request("x")),
            Err(IllustrationError::InvalidUrl(_))
        ));
        assert_eq!(PollinationsBackend::new().direct_url("not a url", &request("x")), None);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let backend = PollinationsBackend::new();
        let err = backend
            .render(&Client::new(), "http://127.0.0.1:9", &request("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, IllustrationError::Transport(_)));
    }
}
