//! Shared extraction helpers for model replies.
//!
//! Both grammars call [`preprocess`] first. The JSON grammar then uses
//! [`find_first_balanced`] to pull the story object out of surrounding prose.

/// Reasoning blocks some models prepend to their answer.
const REASONING_TAGS: &[(&str, &str)] = &[("<think>", "</think>"), ("<thinking>", "</thinking>")];

/// Strip reasoning blocks and surrounding whitespace.
pub fn preprocess(text: &str) -> String {
    strip_reasoning(text).trim().to_string()
}

/// Remove every `<think>...</think>` and `<thinking>...</thinking>` block.
///
/// An unterminated block swallows the rest of the text.
///
/// ```
/// use storybook_pipeline::parser::extract::strip_reasoning;
///
/// assert_eq!(strip_reasoning("<think>plan</think>TITLE: X"), "TITLE: X");
/// assert_eq!(strip_reasoning("TITLE: X<think>unterminated"), "TITLE: X");
/// ```
pub fn strip_reasoning(text: &str) -> String {
    let mut out = text.to_string();
    for (open, close) in REASONING_TAGS {
        loop {
            let Some(start) = out.find(open) else { break };
            match out[start..].find(close) {
                Some(rel) => out.replace_range(start..start + rel + close.len(), ""),
                None => {
                    out.truncate(start);
                    break;
                }
            }
        }
    }
    out
}

/// Find the first balanced region delimited by `open`/`close`.
///
/// Nesting-aware, and delimiters inside JSON string literals are ignored.
/// Unbalanced openers are skipped and scanning resumes after them.
///
/// ```
/// use storybook_pipeline::parser::extract::find_first_balanced;
///
/// let reply = r#"Here you go: {"title": "T", "pages": []} and {"other": 1}"#;
/// assert_eq!(
///     find_first_balanced(reply, '{', '}'),
///     Some(r#"{"title": "T", "pages": []}"#)
/// );
/// ```
pub fn find_first_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find(open) {
        let start = search_from + offset;
        if let Some(end) = matching_close(&text[start..], open, close) {
            return Some(&text[start..start + end + close.len_utf8()]);
        }
        search_from = start + open.len_utf8();
    }
    None
}

/// Byte offset of the delimiter closing the one at position 0 of `text`.
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
