//! Tagged-line grammar.
//!
//! ```text
//! TITLE: The Flute in the Forest
//! COVER: Krishna under a kadamba tree at dusk
//! PAGE 1:
//! TEXT: Maya heard music drifting over the river.
//! IMAGE: a girl listening by a moonlit river
//! PAGE 2:
//! ...
//! ```
//!
//! A `PAGE` line closes the page being built; it is kept only when it has
//! both text and an image prompt. The last page is closed at end of input.
//! Lines that match no tag are ignored.

use crate::parser::error::ParseError;
use crate::parser::extract::preprocess;
use crate::parser::{default_cover_prompt, FALLBACK_TITLE};
use crate::types::{GeneratedStory, StoryPage};

#[derive(Default)]
struct PageDraft {
    text: Option<String>,
    image_prompt: Option<String>,
}

impl PageDraft {
    /// Move a complete draft into `pages`, numbering it after the last one.
    fn flush_into(&mut self, pages: &mut Vec<StoryPage>) {
        let draft = std::mem::take(self);
        if let (Some(text), Some(image_prompt)) = (draft.text, draft.image_prompt) {
            let number = pages.len() as u32 + 1;
            pages.push(StoryPage::new(number, text, image_prompt));
        }
    }
}

/// Parse a reply written in the tagged-line grammar.
///
/// # Examples
///
/// ```
/// use storybook_pipeline::parser::tagged::parse_tagged_lines;
///
/// let reply = "TITLE: X\nPAGE 1:\nTEXT: hello\nIMAGE: a cat";
/// let story = parse_tagged_lines(reply).unwrap();
/// assert_eq!(story.title, "X");
/// assert_eq!(story.pages[0].image_prompt, "a cat");
/// ```
pub fn parse_tagged_lines(reply: &str) -> Result<GeneratedStory, ParseError> {
    let cleaned = preprocess(reply);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let mut title: Option<String> = None;
    let mut cover: Option<String> = None;
    let mut pages = Vec::new();
    let mut draft = PageDraft::default();

    for line in cleaned.lines().map(strip_markup).filter(|l| !l.is_empty()) {
        if let Some(rest) = tag_value(line, "TITLE:") {
            title = rest;
        } else if let Some(rest) = tag_value(line, "COVER:") {
            cover = rest;
        } else if line.starts_with("PAGE") {
            draft.flush_into(&mut pages);
        } else if let Some(rest) = tag_value(line, "TEXT:") {
            draft.text = rest;
        } else if let Some(rest) = tag_value(line, "IMAGE:") {
            draft.image_prompt = rest;
        }
    }
    draft.flush_into(&mut pages);

    if pages.is_empty() {
        return Err(ParseError::NoPages);
    }

    let title = title.unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let cover_image_prompt = cover.unwrap_or_else(|| default_cover_prompt(&title));
    Ok(GeneratedStory {
        title,
        pages,
        cover_image_prompt,
        cover_image_url: None,
    })
}

/// Trim whitespace and markdown emphasis/heading markers around a line.
fn strip_markup(line: &str) -> &str {
    line.trim().trim_start_matches(['#', '*']).trim()
}

/// If `line` starts with `tag`, the trimmed value after it (`None` when blank).
fn tag_value(line: &str, tag: &str) -> Option<Option<String>> {
    let rest = line.strip_prefix(tag)?;
    let value = rest.trim_start_matches('*').trim();
    Some((!value.is_empty()).then(|| value.to_string()))
}
