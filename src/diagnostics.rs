//! Parse diagnostics for story replies.
//!
//! [`ParseDiagnostics`] records what happened while parsing one reply: which
//! grammar ran, whether the JSON was repaired, how many pages came out, and,
//! when the fallback story was substituted, why.

use crate::parser::{Grammar, ParseError};

/// Records what happened during story parsing.
///
/// # Example
///
/// ```
/// use storybook_pipeline::diagnostics::ParseDiagnostics;
/// use storybook_pipeline::parser::Grammar;
///
/// let diag = ParseDiagnostics::new(Grammar::Json);
/// assert!(diag.ok()); // No parse_error means the reply was used as-is
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostics {
    /// Grammar the reply was parsed with.
    pub grammar: Grammar,

    /// If the fallback story was substituted, the reason. `None` means success.
    pub parse_error: Option<ParseError>,

    /// Whether JSON repair was applied (trailing commas, raw newlines, etc.).
    pub repaired: bool,

    /// Number of pages in the resulting story.
    pub pages: usize,
}

impl ParseDiagnostics {
    pub fn new(grammar: Grammar) -> Self {
        Self {
            grammar,
            parse_error: None,
            repaired: false,
            pages: 0,
        }
    }

    /// Quick check: was the model's reply used (rather than the fallback story)?
    pub fn ok(&self) -> bool {
        self.parse_error.is_none()
    }

    /// Whether the fallback story was substituted.
    pub fn recovered(&self) -> bool {
        !self.ok()
    }
}
