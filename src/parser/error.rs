//! Error types for story reply parsing.
//!
//! These errors never escape a pipeline run: whenever one is produced the
//! parser substitutes the fallback story and records the error in
//! [`ParseDiagnostics`](crate::diagnostics::ParseDiagnostics).

/// Why a model reply could not be turned into a story.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The reply was empty or whitespace-only.
    #[error("empty model reply")]
    EmptyResponse,

    /// No balanced `{...}` region was found in the reply.
    #[error("no JSON object found in reply: {text}")]
    NoJsonObject {
        /// A truncated copy of the cleaned reply.
        text: String,
    },

    /// A JSON object was found but could not be parsed, even after repair.
    #[error("invalid story JSON: {reason}")]
    InvalidJson {
        /// The serde error message.
        reason: String,
        /// The candidate JSON (truncated).
        raw_json: String,
    },

    /// A required field is absent or has the wrong type.
    #[error("story is missing required field '{0}'")]
    MissingField(&'static str),

    /// The reply contained no usable pages.
    #[error("story has no pages")]
    NoPages,

    /// A page has no text.
    #[error("page {page} has no text")]
    PageWithoutText {
        /// 1-based position of the page in the reply.
        page: usize,
    },
}

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ParseError::MissingField("title").to_string(),
            "story is missing required field 'title'"
        );
        assert_eq!(
            ParseError::PageWithoutText { page: 2 }.to_string(),
            "page 2 has no text"
        );
    }
}
