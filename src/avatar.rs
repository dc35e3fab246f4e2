//! Hero avatar: a cartoon portrait standing in for the child.
//!
//! [`AvatarGenerator::generate`] asks the image backend for a portrait and
//! pairs it with the description that story prompts thread into every
//! illustration. It never fails: when the portrait cannot be produced the
//! uploaded photo is used as the avatar, with a plainer description.

use crate::config::ImageConfig;
use crate::events::{emit, Event, EventHandler};
use crate::illustration::sanitize_prompt;
use crate::image::{ImageBackend, ImageRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Prompt for the cartoon portrait.
pub const AVATAR_PROMPT: &str =
    "cartoon avatar of a child, colorful, friendly, animated style, suitable for childrens book illustration";

/// The hero of a story, as shown on screen and described to the models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroAvatar {
    /// Generated portrait, or the uploaded photo when generation failed.
    pub avatar_url: String,

    /// Appearance text for story and illustration prompts.
    pub description: String,

    pub original_photo: String,

    /// `false` when `avatar_url` is the uploaded photo.
    #[serde(default)]
    pub generated: bool,
}

/// Description used with a generated portrait.
pub fn portrait_description(child_name: &str) -> String {
    format!(
        "a cheerful cartoon character representing {}, with bright colors and friendly appearance",
        child_name.trim()
    )
}

/// Description used when only the uploaded photo is available.
pub fn photo_description(child_name: &str) -> String {
    format!("{}, a brave and curious child", child_name.trim())
}

/// Turns an uploaded photo into a [`HeroAvatar`].
pub struct AvatarGenerator<'a> {
    client: &'a Client,
    backend: &'a dyn ImageBackend,
    config: &'a ImageConfig,
    credential: Option<&'a str>,
    events: &'a Option<Arc<dyn EventHandler>>,
}

impl<'a> AvatarGenerator<'a> {
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

    fn request(&self) -> ImageRequest {
        ImageRequest {
            prompt: sanitize_prompt(AVATAR_PROMPT),
            model: self.config.model.clone(),
            width: self.config.width,
            height: self.config.height,
            seed: fastrand::u32(..),
            nologo: self.config.nologo,
            credential: self.credential.map(str::to_string),
        }
    }

    /// Generate the avatar for `child_name` from `photo_url` (any URL,
    /// usually a `data:` URL of the upload).
    #[instrument(skip_all, fields(backend = self.backend.name()))]
    pub async fn generate(&self, child_name: &str, photo_url: &str) -> HeroAvatar {
        let request = self.request();
        match self
            .backend
            .render(self.client, &self.config.base_url, &request)
            .await
        {
            Ok(output) => {
                info!(seed = request.seed, "hero avatar generated");
                HeroAvatar {
                    avatar_url: output.into_url(),
                    description: portrait_description(child_name),
                    original_photo: photo_url.to_string(),
                    generated: true,
                }
            }
            Err(e) => {
                warn!(error = %e, "avatar generation failed, using the uploaded photo");
                emit(self.events, Event::AvatarFallback { reason: e.to_string() });
                HeroAvatar {
                    avatar_url: photo_url.to_string(),
                    description: photo_description(child_name),
                    original_photo: photo_url.to_string(),
                    generated: false,
                }
            }
        }
    }
}
