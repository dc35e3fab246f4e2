//! # Story reply parser
//!
//! Turns the model's freeform reply into a [`GeneratedStory`]. The reply is
//! read with the [`Grammar`] that the prompt template asked for:
//!
//! | Grammar | Module | Shape |
//! |---------|--------|-------|
//! | [`Grammar::Json`] | [`json`] | story object embedded in prose |
//! | [`Grammar::TaggedLine`] | [`tagged`] | `TITLE:` / `PAGE n:` / `TEXT:` / `IMAGE:` lines |
//!
//! [`parse`] never fails. When the reply matches neither grammar it returns
//! the one-page fallback story, so a malformed reply never ends the session.
//! [`parse_with_diagnostics`] additionally reports what was recovered.

pub mod error;
pub mod extract;
pub mod json;
pub mod repair;
pub mod tagged;

pub use error::ParseError;
pub use json::parse_json_story;
pub use tagged::parse_tagged_lines;

use crate::diagnostics::ParseDiagnostics;
use crate::types::{GeneratedStory, StoryPage};
use std::fmt;
use tracing::{debug, warn};

/// Placeholder title for the fallback story and untitled tagged replies.
pub const FALLBACK_TITLE: &str = "A Magical Story";

/// Text of the fallback story's single page.
pub const FALLBACK_TEXT: &str =
    "Once upon a time, there was a wonderful adventure waiting to begin...";

/// Image prompt of the fallback story's single page.
pub const FALLBACK_IMAGE_PROMPT: &str = "A magical beginning scene with sparkles and wonder";

/// Reply format requested by a prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Json,
    TaggedLine,
}

impl Grammar {
    pub fn as_str(self) -> &'static str {
        match self {
            Grammar::Json => "json",
            Grammar::TaggedLine => "tagged-line",
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a reply, substituting the fallback story on failure.
///
/// # Examples
///
/// ```
/// use storybook_pipeline::parser::{parse, Grammar, FALLBACK_TITLE};
///
/// let story = parse("the model rambled instead", Grammar::Json);
/// assert_eq!(story.title, FALLBACK_TITLE);
/// assert_eq!(story.pages.len(), 1);
/// ```
pub fn parse(reply: &str, grammar: Grammar) -> GeneratedStory {
    parse_with_diagnostics(reply, grammar).0
}

/// Like [`parse`], also reporting which grammar ran and what was recovered.
pub fn parse_with_diagnostics(reply: &str, grammar: Grammar) -> (GeneratedStory, ParseDiagnostics) {
    let mut diag = ParseDiagnostics::new(grammar);

    let result = match grammar {
        Grammar::Json => parse_json_story(reply).map(|parsed| {
            diag.repaired = parsed.repaired;
            parsed.story
        }),
        Grammar::TaggedLine => parse_tagged_lines(reply),
    };

    let story = match result {
        Ok(story) => {
            debug!(grammar = %grammar, pages = story.pages.len(), "parsed story reply");
            story
        }
        Err(e) => {
            warn!(grammar = %grammar, error = %e, "story reply unusable, substituting fallback story");
            diag.parse_error = Some(e);
            fallback_story()
        }
    };
    diag.pages = story.pages.len();
    (story, diag)
}

/// The minimal renderable story used when a reply cannot be parsed.
pub fn fallback_story() -> GeneratedStory {
    GeneratedStory {
        title: FALLBACK_TITLE.to_string(),
        pages: vec![StoryPage::new(1, FALLBACK_TEXT, FALLBACK_IMAGE_PROMPT)],
        cover_image_prompt: default_cover_prompt(FALLBACK_TITLE),
        cover_image_url: None,
    }
}

pub(crate) fn default_page_prompt(page_number: usize) -> String {
    format!("Illustration for page {}", page_number)
}

pub(crate) fn default_cover_prompt(title: &str) -> String {
    format!("Cover illustration for {}", title)
}
