use crate::error::{Result, StoryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Ages the prompt templates are written for.
pub const AGE_RANGE: RangeInclusive<u8> = 1..=12;

/// Page counts a story may request.
pub const PAGE_COUNT_RANGE: RangeInclusive<u8> = 3..=15;

/// Reading level of the generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadingLevel::Beginner => "beginner",
            ReadingLevel::Intermediate => "intermediate",
            ReadingLevel::Advanced => "advanced",
        };
        f.write_str(s)
    }
}

/// Input to one pipeline run, captured from the story form at submit time.
///
/// Immutable once handed to [`StoryPipeline::run`](crate::StoryPipeline::run)
/// and never persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoryParameters {
    /// The child who stars in the story.
    pub child_name: String,

    /// Child's age in years ([`AGE_RANGE`]).
    pub age: u8,

    /// Theme key into the template table. Unknown keys use the default template.
    pub theme: String,

    /// Optional main characters.
    pub characters: Option<String>,

    /// Optional plot idea.
    pub plot: Option<String>,

    /// Optional moral lesson.
    pub moral_lesson: Option<String>,

    /// Requested number of pages ([`PAGE_COUNT_RANGE`]).
    pub page_count: u8,

    pub reading_level: ReadingLevel,

    /// Language the story should be written in.
    pub language: String,

    /// Optional description of the hero's avatar, threaded into prompts.
    pub avatar_description: Option<String>,

    /// Credential for the text-generation provider.
    #[serde(skip_serializing)]
    pub text_credential: String,

    /// Credential for the image provider, if it needs one.
    #[serde(skip_serializing)]
    pub image_credential: Option<String>,
}

impl StoryParameters {
    pub fn new(
        child_name: impl Into<String>,
        age: u8,
        theme: impl Into<String>,
        text_credential: impl Into<String>,
    ) -> Self {
        Self {
            child_name: child_name.into(),
            age,
            theme: theme.into(),
            characters: None,
            plot: None,
            moral_lesson: None,
            page_count: 8,
            reading_level: ReadingLevel::default(),
            language: "English".to_string(),
            avatar_description: None,
            text_credential: text_credential.into(),
            image_credential: None,
        }
    }

    pub fn with_characters(mut self, characters: impl Into<String>) -> Self {
        self.characters = Some(characters.into());
        self
    }

    pub fn with_plot(mut self, plot: impl Into<String>) -> Self {
        self.plot = Some(plot.into());
        self
    }

    pub fn with_moral_lesson(mut self, lesson: impl Into<String>) -> Self {
        self.moral_lesson = Some(lesson.into());
        self
    }

    pub fn with_page_count(mut self, pages: u8) -> Self {
        self.page_count = pages;
        self
    }

    pub fn with_reading_level(mut self, level: ReadingLevel) -> Self {
        self.reading_level = level;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_avatar_description(mut self, description: impl Into<String>) -> Self {
        self.avatar_description = Some(description.into());
        self
    }

    /// Describe the hero the way `avatar` does.
    pub fn with_hero_avatar(self, avatar: &crate::avatar::HeroAvatar) -> Self {
        self.with_avatar_description(avatar.description.clone())
    }

    pub fn with_image_credential(mut self, credential: impl Into<String>) -> Self {
        self.image_credential = Some(credential.into());
        self
    }

    /// Check the basic constraints. Runs before any network call.
    pub fn validate(&self) -> Result<()> {
        if self.child_name.trim().is_empty() {
            return Err(StoryError::Validation("child name is empty".into()));
        }
        if !AGE_RANGE.contains(&self.age) {
            return Err(StoryError::Validation(format!(
                "age {} is outside {}..={}",
                self.age,
                AGE_RANGE.start(),
                AGE_RANGE.end()
            )));
        }
        if self.theme.trim().is_empty() {
            return Err(StoryError::Validation("theme is empty".into()));
        }
        if !PAGE_COUNT_RANGE.contains(&self.page_count) {
            return Err(StoryError::Validation(format!(
                "page count {} is outside {}..={}",
                self.page_count,
                PAGE_COUNT_RANGE.start(),
                PAGE_COUNT_RANGE.end()
            )));
        }
        if self.language.trim().is_empty() {
            return Err(StoryError::Validation("language is empty".into()));
        }
        if self.text_credential.trim().is_empty() {
            return Err(StoryError::Validation(
                "text provider credential is empty".into(),
            ));
        }
        if matches!(self.image_credential.as_deref(), Some(c) if c.trim().is_empty()) {
            return Err(StoryError::Validation(
                "image provider credential is empty".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for StoryParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoryParameters")
            .field("child_name", &self.child_name)
            .field("age", &self.age)
            .field("theme", &self.theme)
            .field("page_count", &self.page_count)
            .field("reading_level", &self.reading_level)
            .field("language", &self.language)
            .field("has_avatar", &self.avatar_description.is_some())
            .field("has_image_credential", &self.image_credential.is_some())
            .finish()
    }
}

/// One page of a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPage {
    /// 1-based, contiguous within the story.
    pub page_number: u32,

    pub text: String,

    pub image_prompt: String,

    /// Set once the page's illustration resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl StoryPage {
    pub fn new(page_number: u32, text: impl Into<String>, image_prompt: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            image_prompt: image_prompt.into(),
            image_url: None,
        }
    }
}

/// A finished (or in-progress) story.
///
/// Pages are in reading order with page numbers `1..=pages.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedStory {
    pub title: String,

    pub pages: Vec<StoryPage>,

    pub cover_image_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

impl GeneratedStory {
    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the story has no pages. Stories returned by the pipeline never do.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Whether page numbers run `1, 2, ..., n` in order.
    pub fn has_contiguous_pages(&self) -> bool {
        self.pages
            .iter()
            .enumerate()
            .all(|(i, p)| p.page_number as usize == i + 1)
    }

    /// Pages that did not receive an illustration.
    pub fn unillustrated_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.image_url.is_none())
            .map(|p| p.page_number)
            .collect()
    }
}

/// Progress update emitted at each pipeline checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0..=100, non-decreasing within one run.
    pub percent: f64,

    /// Human-readable description of the step.
    pub step: String,
}

impl ProgressEvent {
    pub fn new(percent: f64, step: impl Into<String>) -> Self {
        Self {
            percent: percent.clamp(0.0, 100.0),
            step: step.into(),
        }
    }
}
