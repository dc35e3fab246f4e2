//! JSON grammar: a story object embedded anywhere in the reply.
//!
//! ```text
//! { "title": "...", "coverImagePrompt": "...",
//!   "pages": [ { "pageNumber": 1, "text": "...", "imagePrompt": "..." } ] }
//! ```
//!
//! The first balanced `{...}` region is taken as the story. `title` and a
//! non-empty `pages` array whose entries all carry `text` are required.
//! Page numbers in the reply are ignored; pages are renumbered in order.

use serde_json::Value;

use crate::parser::error::{truncate, ParseError};
use crate::parser::extract::{find_first_balanced, preprocess};
use crate::parser::repair::try_repair_json;
use crate::parser::{default_cover_prompt, default_page_prompt};
use crate::types::{GeneratedStory, StoryPage};

/// Result of a successful JSON-grammar parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonParse {
    pub story: GeneratedStory,
    /// Whether the JSON had to be repaired first.
    pub repaired: bool,
}

/// Parse a reply written in the JSON grammar.
///
/// # Examples
///
/// ```
/// use storybook_pipeline::parser::json::parse_json_story;
///
/// let reply = r#"Sure! {"title": "T", "pages": [{"text": "A"}, {"text": "B"}]}"#;
/// let story = parse_json_story(reply).unwrap().story;
/// assert_eq!(story.title, "T");
/// assert_eq!(story.pages[1].page_number, 2);
/// assert_eq!(story.pages[1].image_prompt, "Illustration for page 2");
/// ```
pub fn parse_json_story(reply: &str) -> Result<JsonParse, ParseError> {
    let cleaned = preprocess(reply);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let candidate =
        find_first_balanced(&cleaned, '{', '}').ok_or_else(|| ParseError::NoJsonObject {
            text: truncate(&cleaned, 200),
        })?;

    let (value, repaired) = match serde_json::from_str::<Value>(candidate) {
        Ok(v) => (v, false),
        Err(e) => {
            let fixed = try_repair_json(candidate).ok_or_else(|| ParseError::InvalidJson {
                reason: e.to_string(),
                raw_json: truncate(candidate, 200),
            })?;
            let v = serde_json::from_str::<Value>(&fixed).map_err(|e| ParseError::InvalidJson {
                reason: e.to_string(),
                raw_json: truncate(&fixed, 200),
            })?;
            (v, true)
        }
    };

    Ok(JsonParse {
        story: story_from_value(&value)?,
        repaired,
    })
}

/// Validate a decoded story object and convert it.
pub fn story_from_value(value: &Value) -> Result<GeneratedStory, ParseError> {
    let title = non_empty_str(value.get("title")).ok_or(ParseError::MissingField("title"))?;

    let raw_pages = value
        .get("pages")
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingField("pages"))?;
    if raw_pages.is_empty() {
        return Err(ParseError::NoPages);
    }

    let mut pages = Vec::with_capacity(raw_pages.len());
    for (i, raw) in raw_pages.iter().enumerate() {
        let number = i + 1;
        let text = non_empty_str(raw.get("text"))
            .ok_or(ParseError::PageWithoutText { page: number })?;
        let image_prompt = non_empty_str(raw.get("imagePrompt"))
            .map(str::to_string)
            .unwrap_or_else(|| default_page_prompt(number));
        pages.push(StoryPage::new(number as u32, text, image_prompt));
    }

    let cover_image_prompt = non_empty_str(value.get("coverImagePrompt"))
        .map(str::to_string)
        .unwrap_or_else(|| default_cover_prompt(title));

    Ok(GeneratedStory {
        title: title.to_string(),
        pages,
        cover_image_prompt,
        cover_image_url: None,
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_grammar_two_pages() {
        let reply = r#"{"title": "T", "pages": [{"pageNumber": 1, "text": "A", "imagePrompt": "a"}, {"pageNumber": 2, "text": "B", "imagePrompt": "b"}]}"#;
        let parsed = parse_json_story(reply).unwrap();
        assert!(!parsed.repaired);
        let story = parsed.story;
        assert_eq!(story.title, "T");
        let pages: Vec<(u32, &str)> = story
            .pages
            .iter()
            .map(|p| (p.page_number, p.text.as_str()))
            .collect();
        assert_eq!(pages, vec![(1, "A"), (2, "B")]);
        assert_eq!(story.cover_image_prompt, "Cover illustration for T");
    }

    #[test]
    fn json_inside_prose_and_fences() {
        let reply = "Here is your story!\n```json\n{\"title\": \"Moon Trip\", \"coverImagePrompt\": \"a rocket\", \"pages\": [{\"text\": \"Up we go.\"}]}\n```\nEnjoy!";
        let story = parse_json_story(reply).unwrap().story;
        assert_eq!(story.title, "Moon Trip");
        assert_eq!(story.cover_image_prompt, "a rocket");
        assert_eq!(story.pages[0].image_prompt, "Illustration for page 1");
    }

    #[test]
    fn reply_page_numbers_are_ignored() {
        let reply = r#"{"title": "T", "pages": [{"pageNumber": 7, "text": "A"}, {"pageNumber": 3, "text": "B"}]}"#;
        let story = parse_json_story(reply).unwrap().story;
        assert!(story.has_contiguous_pages());
    }

    #[test]
    fn repaired_trailing_comma() {
        let reply = r#"{"title": "T", "pages": [{"text": "A",},],}"#;
        let parsed = parse_json_story(reply).unwrap();
        assert!(parsed.repaired);
        assert_eq!(parsed.story.pages.len(), 1);
    }

    #[test]
    fn missing_title() {
        let reply = r#"{"pages": [{"text": "A"}]}"#;
        assert_eq!(
            parse_json_story(reply).unwrap_err(),
            ParseError::MissingField("title")
        );
    }

    #[test]
    fn empty_pages() {
        let reply = r#"{"title": "T", "pages": []}"#;
        assert_eq!(parse_json_story(reply).unwrap_err(), ParseError::NoPages);
    }

    #[test]
    fn page_without_text() {
        let reply = r#"{"title": "T", "pages": [{"text": "A"}, {"imagePrompt": "x"}]}"#;
        assert_eq!(
            parse_json_story(reply).unwrap_err(),
            ParseError::PageWithoutText { page: 2 }
        );
    }

    #[test]
    fn no_object() {
        assert!(matches!(
            parse_json_story("Once upon a time there was no JSON."),
            Err(ParseError::NoJsonObject { .. })
        ));
        assert_eq!(parse_json_story("   ").unwrap_err(), ParseError::EmptyResponse);
    }

    #[test]
    fn unrepairable_json() {
        assert!(matches!(
            parse_json_story("{title: T pages}"),
            Err(ParseError::InvalidJson { .. })
        ));
    }
}
