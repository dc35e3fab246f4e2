//! Saved-story gallery.

use super::KeyValueStore;
use crate::avatar::HeroAvatar;
use crate::error::Result;
use crate::types::{GeneratedStory, StoryParameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Store key holding the saved-story list.
pub const GALLERY_KEY: &str = "saved_stories";

/// Who a saved story was made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryOwner {
    pub child_name: String,
    pub age: u8,
    pub theme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hero_avatar_url: Option<String>,
}

impl From<&StoryParameters> for StoryOwner {
    fn from(params: &StoryParameters) -> Self {
        Self {
            child_name: params.child_name.clone(),
            age: params.age,
            theme: params.theme.clone(),
            hero_avatar_url: None,
        }
    }
}

impl StoryOwner {
    /// Record the avatar shown with the story.
    pub fn with_hero_avatar(mut self, avatar: &HeroAvatar) -> Self {
        self.hero_avatar_url = Some(avatar.avatar_url.clone());
        self
    }
}

/// A story in the gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedStory {
    pub id: String,

    #[serde(flatten)]
    pub story: GeneratedStory,

    #[serde(flatten)]
    pub owner: StoryOwner,

    pub created_at: DateTime<Utc>,

    /// Reading progress in percent, tracked by the reader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_progress: Option<f64>,
}

/// Saved stories, newest first.
pub struct StoryGallery<S> {
    store: S,
}

impl<S: KeyValueStore> StoryGallery<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All saved stories, newest first. A store with nothing saved yields
    /// an empty list; an unreadable document is an error.
    pub fn list(&self) -> Result<Vec<SavedStory>> {
        match self.store.load(GALLERY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, stories: &[SavedStory]) -> Result<()> {
        self.store
            .save(GALLERY_KEY, &serde_json::to_string(stories)?)
    }

    /// Save a finished story and return its new id.
    pub fn save(&self, story: GeneratedStory, owner: StoryOwner) -> Result<String> {
        self.save_at(story, owner, Utc::now())
    }

    /// [`save`](Self::save) with an explicit creation time.
    pub fn save_at(
        &self,
        story: GeneratedStory,
        owner: StoryOwner,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let mut stories = self.list()?;
        let id = Uuid::new_v4().to_string();
        stories.insert(
            0,
            SavedStory {
                id: id.clone(),
                story,
                owner,
                created_at: now,
                reading_progress: None,
            },
        );
        self.write(&stories)?;
        debug!(id = %id, total = stories.len(), "story saved to gallery");
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Result<Option<SavedStory>> {
        Ok(self.list()?.into_iter().find(|s| s.id == id))
    }

    /// Remove a story. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut stories = self.list()?;
        let before = stories.len();
        stories.retain(|s| s.id != id);
        if stories.len() == before {
            return Ok(false);
        }
        self.write(&stories)?;
        Ok(true)
    }

    /// Record reading progress (clamped to 0..=100). Returns whether the
    /// story exists.
    pub fn update_progress(&self, id: &str, progress: f64) -> Result<bool> {
        let mut stories = self.list()?;
        let Some(saved) = stories.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        saved.reading_progress = Some(progress.clamp(0.0, 100.0));
        self.write(&stories)?;
        Ok(true)
    }
}
