//! Prompt building for the story text request.
//!
//! Each theme key maps to a template family. The family fixes both the
//! instruction text and the response [`Grammar`] the parser must use, so a
//! template and its parser are changed together.

use crate::error::{Result, StoryError};
use crate::parser::Grammar;
use crate::types::{ReadingLevel, StoryParameters};
use std::collections::BTreeMap;

/// Template variables. Ordered so rendering is deterministic.
pub type PromptVars = BTreeMap<&'static str, String>;

/// Which template text a theme uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFamily {
    /// Open-ended adventure, JSON reply.
    Adventure,
    /// Mythology tale, tagged-line reply.
    Mythology,
}

impl TemplateFamily {
    /// The grammar the reply to this template follows.
    pub fn grammar(self) -> Grammar {
        match self {
            TemplateFamily::Adventure => Grammar::Json,
            TemplateFamily::Mythology => Grammar::TaggedLine,
        }
    }
}

/// One row of the theme table.
#[derive(Debug)]
pub struct ThemeTemplate {
    /// Normalized theme key.
    pub key: &'static str,
    /// Display name embedded in the prompt.
    pub label: &'static str,
    pub family: TemplateFamily,
    /// Opening line (mythology only). May use `{name}` and `{age}`.
    pub intro: &'static str,
    /// Story elements to feature (mythology only). May use `{name}`.
    pub highlights: &'static [&'static str],
}

const fn adventure(key: &'static str, label: &'static str) -> ThemeTemplate {
    ThemeTemplate {
        key,
        label,
        family: TemplateFamily::Adventure,
        intro: "",
        highlights: &[],
    }
}

/// The theme table.
pub static THEMES: &[ThemeTemplate] = &[
    adventure("space", "Space Adventure"),
    adventure("underwater", "Underwater World"),
    adventure("forest", "Magical Forest"),
    adventure("fairy-tale", "Fairy Tale Castle"),
    adventure("magic", "Wizard School"),
    ThemeTemplate {
        key: "krishna",
        label: "Lord Krishna",
        family: TemplateFamily::Mythology,
        intro: "Create a magical story about Lord Krishna for {name} (age {age}).",
        highlights: &[
            "Young Krishna playing his magical flute in Vrindavan",
            "Talking peacocks, cows, and forest animals",
            "The child {name} discovering Krishna's divine powers",
            "Lessons about friendship, music, and protecting nature",
            "Beautiful descriptions of Vrindavan's forests and rivers",
        ],
    },
    ThemeTemplate {
        key: "ganesha",
        label: "Lord Ganesha",
        family: TemplateFamily::Mythology,
        intro: "Create a wisdom-filled adventure with Lord Ganesha for {name} (age {age}).",
        highlights: &[
            "Ganesha as the remover of obstacles helping a village",
            "{name} learning about problem-solving and wisdom",
            "Colorful festivals, sweets (modaks), and celebrations",
            "Ganesha's mouse companion Mushak",
            "Lessons about patience, intelligence, and helping others",
        ],
    },
    ThemeTemplate {
        key: "hanuman",
        label: "Hanuman",
        family: TemplateFamily::Mythology,
        intro: "Create an inspiring adventure with Lord Hanuman for {name} (age {age}).",
        highlights: &[
            "Hanuman's incredible strength and devotion",
            "{name} learning about courage and service",
            "Flying through clouds and mountains",
            "Lessons about bravery, loyalty, and selflessness",
            "Epic landscapes of ancient India with mountains and forests",
        ],
    },
    ThemeTemplate {
        key: "forest-sages",
        label: "Forest Sages",
        family: TemplateFamily::Mythology,
        intro: "Create a mystical forest adventure with ancient sages for {name} (age {age}).",
        highlights: &[
            "Wise forest rishis (sages) with magical powers",
            "{name} learning ancient wisdom in an ashram",
            "Talking trees, magical herbs, and forest spirits",
            "Lessons about meditation, respect for nature, and inner peace",
            "Ancient Indian forest settings with rivers and wildlife",
        ],
    },
    ThemeTemplate {
        key: "talking-animals",
        label: "Talking Animals",
        family: TemplateFamily::Mythology,
        intro: "Create a delightful story with talking animals from Indian mythology for {name} (age {age}).",
        highlights: &[
            "Wise elephants, clever monkeys, and noble tigers",
            "{name} understanding animal language",
            "Stories from the Panchatantra with moral lessons",
            "Animal friends working together to solve problems",
            "Vibrant Indian jungle and village settings",
        ],
    },
];

/// Theme used for unknown keys.
const DEFAULT_FAMILY: TemplateFamily = TemplateFamily::Adventure;

const ADVENTURE_TEMPLATE: &str = r#"Create a personalized children's story with the following specifications:

{details}

{guidelines}

RESPONSE FORMAT:
Return the story as a single JSON object in exactly this shape:
{{
  "title": "Story Title",
  "coverImagePrompt": "Detailed prompt for cover illustration",
  "pages": [
    {{
      "pageNumber": 1,
      "text": "Page text content",
      "imagePrompt": "Detailed prompt for page illustration"
    }}
  ]
}}

{requirements}

Please create a magical, engaging story that {name} will love!"#;

const MYTHOLOGY_TEMPLATE: &str = r#"{intro}

The story should feature:
{highlights}

{details}

{guidelines}

FORMAT YOUR RESPONSE EXACTLY LIKE THIS:
TITLE: [Story Title]
COVER: [Detailed image prompt for the cover illustration]

PAGE 1:
TEXT: [Story text]
IMAGE: [Detailed image prompt for Pixar-style illustration]

PAGE 2:
TEXT: [Story text]
IMAGE: [Detailed image prompt]

[Continue for all {page_count} pages. Keep each TEXT and IMAGE on a single line.]"#;

/// A rendered prompt plus the grammar its reply must be parsed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPrompt {
    pub text: String,
    pub grammar: Grammar,
    /// Key of the template used, or `None` when the default template was used.
    pub theme_key: Option<&'static str>,
}

impl BuiltPrompt {
    /// Whether the theme was unknown and the default template was used.
    pub fn used_default_template(&self) -> bool {
        self.theme_key.is_none()
    }
}

/// Normalize a theme key: trim, lowercase, spaces and underscores to hyphens.
///
/// ```
/// use storybook_pipeline::prompt::normalize_theme_key;
///
/// assert_eq!(normalize_theme_key(" Forest Sages "), "forest-sages");
/// ```
pub fn normalize_theme_key(theme: &str) -> String {
    theme
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Look up a theme in the table.
pub fn lookup_theme(theme: &str) -> Option<&'static ThemeTemplate> {
    let key = normalize_theme_key(theme);
    THEMES.iter().find(|t| t.key == key)
}

/// Build the story prompt. Pure and deterministic.
///
/// Unknown themes use the default adventure template with the caller's
/// theme text embedded, so an unrecognized theme never blocks generation.
///
/// # Example
///
/// ```
/// use storybook_pipeline::{prompt, StoryParameters};
/// use storybook_pipeline::parser::Grammar;
///
/// let params = StoryParameters::new("Maya", 6, "Krishna", "key");
/// let built = prompt::build(&params);
/// assert_eq!(built.grammar, Grammar::TaggedLine);
/// assert!(built.text.contains("Maya"));
/// ```
pub fn build(params: &StoryParameters) -> BuiltPrompt {
    let theme = lookup_theme(&params.theme);
    let family = theme.map(|t| t.family).unwrap_or(DEFAULT_FAMILY);
    let label = theme
        .map(|t| t.label.to_string())
        .unwrap_or_else(|| params.theme.trim().to_string());

    let mut vars = base_vars(params, &label);
    let template = match family {
        TemplateFamily::Adventure => ADVENTURE_TEMPLATE,
        TemplateFamily::Mythology => {
            if let Some(t) = theme {
                vars.insert("intro", render(t.intro, &vars));
                let highlights: Vec<String> =
                    t.highlights.iter().map(|h| render(h, &vars)).collect();
                vars.insert("highlights", bullet_list(&highlights));
            }
            MYTHOLOGY_TEMPLATE
        }
    };

    let details = section("STORY DETAILS", &bullet_list(&story_details(&vars)));
    let guidelines = section(
        "WRITING GUIDELINES",
        &format!(
            "{}\n{}",
            age_guidance(params.age),
            reading_level_guidance(params.reading_level)
        ),
    );
    let requirements = section("IMPORTANT REQUIREMENTS", &numbered_list(&requirements(&vars)));
    vars.insert("details", details);
    vars.insert("guidelines", guidelines);
    vars.insert("requirements", requirements);

    BuiltPrompt {
        text: render(template, &vars),
        grammar: family.grammar(),
        theme_key: theme.map(|t| t.key),
    }
}

/// Like [`build`], but rejects unknown themes instead of falling back.
pub fn build_strict(params: &StoryParameters) -> Result<BuiltPrompt> {
    if lookup_theme(&params.theme).is_none() {
        return Err(StoryError::Validation(format!(
            "unsupported theme '{}'",
            params.theme.trim()
        )));
    }
    Ok(build(params))
}

fn base_vars(params: &StoryParameters, theme_label: &str) -> PromptVars {
    let or = |value: &Option<String>, default: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let mut vars = PromptVars::new();
    vars.insert("name", params.child_name.trim().to_string());
    vars.insert("age", params.age.to_string());
    vars.insert("theme", theme_label.to_string());
    vars.insert("characters", or(&params.characters, "Let the story decide"));
    vars.insert("plot", or(&params.plot, "Create an original adventure"));
    vars.insert(
        "moral",
        or(&params.moral_lesson, "Include a positive message about kindness, courage, and wisdom"),
    );
    vars.insert("page_count", params.page_count.to_string());
    vars.insert("language", language_instruction(&params.language));
    vars.insert(
        "avatar",
        or(&params.avatar_description, "a cheerful, curious child"),
    );
    vars
}

fn story_details(vars: &PromptVars) -> Vec<String> {
    let get = |k: &str| vars.get(k).map(String::as_str).unwrap_or_default();
    vec![
        format!("Child's name: {}", get("name")),
        format!("Age: {} years old", get("age")),
        format!("Theme: {}", get("theme")),
        format!("Main characters: {}", get("characters")),
        format!("Plot: {}", get("plot")),
        format!("Moral lesson: {}", get("moral")),
        format!("Number of pages: exactly {}", get("page_count")),
        format!("Language: {}", get("language")),
        format!("Hero appearance: {}", get("avatar")),
    ]
}

fn requirements(vars: &PromptVars) -> Vec<String> {
    let name = vars.get("name").map(String::as_str).unwrap_or_default();
    let pages = vars.get("page_count").map(String::as_str).unwrap_or_default();
    vec![
        format!("Make {} the main character or hero of the story", name),
        "Use age-appropriate language and concepts".to_string(),
        "Each page should have 1-3 sentences for younger children, 2-4 for older".to_string(),
        "Image prompts should be detailed, vivid, and child-friendly".to_string(),
        format!("Ensure the story flows naturally across {} pages", pages),
        "Include a satisfying conclusion with the moral lesson".to_string(),
    ]
}

/// The language line. Non-English stories carry an English translation.
fn language_instruction(language: &str) -> String {
    let language = language.trim();
    if language.eq_ignore_ascii_case("english") {
        "English".to_string()
    } else {
        format!("{} with English translation in brackets", language)
    }
}

fn age_guidance(age: u8) -> &'static str {
    match age {
        0..=3 => "- Use very simple words and short sentences\n- Focus on basic concepts like colors, shapes, and emotions\n- Include repetitive phrases\n- Keep the story very simple and comforting",
        4..=6 => "- Use simple vocabulary with occasional new words\n- Short, clear sentences\n- Include basic emotions and simple problem-solving\n- Add some rhyming if possible",
        7..=9 => "- Use more complex vocabulary\n- Introduce basic adventure and friendship themes\n- Include simple moral lessons\n- Use descriptive language for imagery",
        _ => "- Use rich vocabulary and complex sentence structures\n- Include deeper themes like courage, perseverance, and empathy\n- Add some educational elements\n- Create more sophisticated plot developments",
    }
}

fn reading_level_guidance(level: ReadingLevel) -> &'static str {
    match level {
        ReadingLevel::Beginner => "- Use simple, common words\n- Very short sentences (3-8 words)\n- Repeat key phrases\n- Focus on basic actions and emotions",
        ReadingLevel::Intermediate => "- Mix simple and slightly complex words\n- Medium-length sentences (5-12 words)\n- Introduce new vocabulary gradually\n- Include some descriptive language",
        ReadingLevel::Advanced => "- Use rich, varied vocabulary\n- Longer, complex sentences\n- Include challenging but age-appropriate words\n- Use metaphors and detailed descriptions",
    }
}

/// Substitute `{key}` placeholders with values from `vars`.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
/// Rendering is a single left-to-right pass: substituted values are copied
/// verbatim and never scanned for placeholders themselves. Unknown
/// placeholders are left as written.
///
/// # Example
///
/// ```
/// use storybook_pipeline::prompt::{render, PromptVars};
///
/// let mut vars = PromptVars::new();
/// vars.insert("name", "Alice".to_string());
/// let result = render("Hello {name}, here is JSON: {{\"key\": \"val\"}}", &vars);
/// assert_eq!(result, r#"Hello Alice, here is JSON: {"key": "val"}"#);
/// ```
pub fn render(template: &str, vars: &PromptVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
            continue;
        }
        if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
            continue;
        }
        if tail.starts_with('{') {
            let value = tail
                .find('}')
                .and_then(|end| vars.get(&tail[1..end]).map(|v| (end, v)));
            if let Some((end, value)) = value {
                out.push_str(value);
                rest = &tail[end + 1..];
                continue;
            }
        }
        out.push_str(&tail[..1]);
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

/// Create a numbered list from items (1-indexed).
pub fn numbered_list(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Create a `- ` bulleted list from items.
pub fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap text in a labeled section.
pub fn section(label: &str, content: &str) -> String {
    format!("{}:\n{}", label, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(theme: &str) -> StoryParameters {
        StoryParameters::new("Maya", 6, theme, "key-123")
            .with_moral_lesson("Always share")
            .with_page_count(5)
    }

    #[test]
    fn test_render_basic() {
        let mut vars = PromptVars::new();
        vars.insert("name", "Alice".into());
        assert_eq!(render("Hello {name}", &vars), "Hello Alice");
    }

    #[test]
    fn test_render_escaped_braces_no_substitution() {
        let vars = PromptVars::new();
        let result = render("Output format: {{\"result\": {{\"value\": 42}}}}", &vars);
        assert_eq!(result, r#"Output format: {"result": {"value": 42}}"#);
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        let mut vars = PromptVars::new();
        vars.insert("name", "Maya".into());
        vars.insert("plot", "a robot named {name} finds {{stars}}".into());
        assert_eq!(
            render("{name}: {plot} {unknown}", &vars),
            "Maya: a robot named {name} finds {{stars}} {unknown}"
        );
    }

    #[test]
    fn test_user_text_with_braces_reaches_prompt_verbatim() {
        let params = StoryParameters::new("Maya", 6, "krishna", "key")
            .with_plot("a robot named {name} finds {page_count} stars");
        let built = build(&params);
        assert!(built
            .text
            .contains("Plot: a robot named {name} finds {page_count} stars"));
    }

    #[test]
    fn test_numbered_and_bullet_lists() {
        let items = vec!["First".to_string(), "Second".to_string()];
        assert_eq!(numbered_list(&items), "1. First\n2. Second");
        assert_eq!(bullet_list(&items), "- First\n- Second");
        assert_eq!(numbered_list(&[]), "");
    }

    #[test]
    fn test_section() {
        assert_eq!(section("Context", "body"), "Context:\nbody");
    }

    #[test]
    fn test_normalize_theme_key() {
        assert_eq!(normalize_theme_key("Talking Animals"), "talking-animals");
        assert_eq!(normalize_theme_key("fairy_tale"), "fairy-tale");
        assert_eq!(normalize_theme_key("  SPACE "), "space");
    }

    #[test]
    fn test_adventure_theme_uses_json_grammar() {
        let built = build(&params("space"));
        assert_eq!(built.grammar, Grammar::Json);
        assert_eq!(built.theme_key, Some("space"));
        assert!(built.text.contains("Theme: Space Adventure"));
        assert!(built.text.contains("\"coverImagePrompt\""));
        assert!(built.text.contains("\"pages\": ["));
        assert!(!built.text.contains('\x00'));
    }

    #[test]
    fn test_mythology_theme_uses_tagged_grammar() {
        let built = build(&params("Forest Sages"));
        assert_eq!(built.grammar, Grammar::TaggedLine);
        assert_eq!(built.theme_key, Some("forest-sages"));
        assert!(built.text.contains("TITLE:"));
        assert!(built.text.contains("PAGE 1:"));
        assert!(built.text.contains("TEXT:"));
        assert!(built.text.contains("IMAGE:"));
        assert!(built.text.contains("Maya learning ancient wisdom"));
        assert!(built.text.contains("for Maya (age 6)"));
    }

    #[test]
    fn test_prompt_embeds_every_output_parameter() {
        for theme in ["magic", "hanuman", "dinosaurs"] {
            let p = params(theme).with_language("Hindi");
            let built = build(&p);
            let text = &built.text;
            assert!(text.contains("Maya"), "{theme}: name");
            assert!(text.contains("Age: 6 years old"), "{theme}: age");
            assert!(text.contains("exactly 5"), "{theme}: page count");
            assert!(text.contains("Always share"), "{theme}: moral");
            assert!(
                text.contains("Hindi with English translation in brackets"),
                "{theme}: language"
            );
            if built.grammar == Grammar::TaggedLine {
                assert!(!text.contains('{'), "{theme}: unrendered placeholder");
            }
        }
    }

    #[test]
    fn test_unknown_theme_falls_back_to_default() {
        let built = build(&params("Dinosaur Island"));
        assert!(built.used_default_template());
        assert_eq!(built.grammar, Grammar::Json);
        assert!(built.text.contains("Theme: Dinosaur Island"));
    }

    #[test]
    fn test_build_strict_rejects_unknown_theme() {
        assert!(matches!(
            build_strict(&params("dinosaurs")),
            Err(StoryError::Validation(_))
        ));
        assert!(build_strict(&params("ganesha")).is_ok());
    }

    #[test]
    fn test_build_is_deterministic() {
        let p = params("krishna")
            .with_avatar_description("curly hair, red scarf")
            .with_plot("finds a lost calf");
        assert_eq!(build(&p), build(&p));
        let q = params("underwater");
        assert_eq!(build(&q).text, build(&q).text);
    }

    #[test]
    fn test_guidance_varies_with_age_and_level() {
        let young = build(&StoryParameters::new("Sam", 3, "space", "k")).text;
        let older = build(
            &StoryParameters::new("Sam", 11, "space", "k")
                .with_reading_level(ReadingLevel::Advanced),
        )
        .text;
        assert!(young.contains("Include repetitive phrases"));
        assert!(older.contains("more sophisticated plot developments"));
        assert!(older.contains("Use metaphors"));
    }
}
