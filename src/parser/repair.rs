//! Repair of near-miss story JSON.
//!
//! Models writing long prose into JSON strings commonly emit typographic
//! quotes around keys, trailing commas, and raw line breaks inside string
//! values. These are fixed with a single string-aware pass; anything more
//! broken falls through to the fallback story.

/// Repair `broken` and return the result if it is then valid JSON.
///
/// Returns `None` when the input is already valid or cannot be repaired.
///
/// ```
/// use storybook_pipeline::parser::repair::try_repair_json;
///
/// let fixed = try_repair_json("{\"title\": \"T\", \"pages\": [],}").unwrap();
/// assert_eq!(fixed, "{\"title\": \"T\", \"pages\": []}");
/// ```
pub fn try_repair_json(broken: &str) -> Option<String> {
    if serde_json::from_str::<serde_json::Value>(broken).is_ok() {
        return None;
    }
    let normalized = normalize_quotes(broken);
    let repaired = repair_pass(&normalized);
    serde_json::from_str::<serde_json::Value>(&repaired)
        .ok()
        .map(|_| repaired)
}

/// Replace typographic double quotes with ASCII ones.
fn normalize_quotes(s: &str) -> String {
    s.replace(['\u{201C}', '\u{201D}'], "\"")
}

/// Escape raw control characters inside strings and drop trailing commas.
fn repair_pass(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;

    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
            continue;
        }

        match ch {
            '"' => {
                in_string = true;
                out.push(ch);
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Remove a comma (and the whitespace after it) at the end of `out`.
fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}
