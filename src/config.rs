//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds the deployment-level settings (endpoints, models,
//! image dimensions, timeouts). [`GenerationConfig`] holds the sampling
//! policy for story text and is deliberately not part of the
//! deserializable config.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Art-style keywords appended to every illustration prompt.
pub const DEFAULT_STYLE_SUFFIX: &str =
    "childrens book illustration, Pixar style, soft colorful lighting, whimsical and magical, child-friendly, high quality digital art";

/// Sampling policy for the story text request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    pub top_k: u32,

    pub top_p: f64,

    /// Maximum tokens to generate.
    pub max_output_tokens: u32,

    /// Threshold applied to every harm category.
    pub safety_threshold: &'static str,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.8,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
            safety_threshold: "BLOCK_MEDIUM_AND_ABOVE",
        }
    }
}

impl GenerationConfig {
    /// Harm categories the safety threshold is applied to.
    const HARM_CATEGORIES: [&'static str; 4] = [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ];

    /// The `generationConfig` object of a generate-content request.
    pub fn to_json(&self) -> Value {
        json!({
            "temperature": self.temperature,
            "topK": self.top_k,
            "topP": self.top_p,
            "maxOutputTokens": self.max_output_tokens,
        })
    }

    /// The `safetySettings` array of a generate-content request.
    pub fn safety_settings(&self) -> Value {
        Value::Array(
            Self::HARM_CATEGORIES
                .iter()
                .map(|c| json!({"category": c, "threshold": self.safety_threshold}))
                .collect(),
        )
    }
}

/// Text-generation provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextProviderConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for TextProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
        }
    }
}

/// Image-generation provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub base_url: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    /// Ask the provider not to watermark the image.
    pub nologo: bool,
    pub style_suffix: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://image.pollinations.ai".to_string(),
            model: "flux".to_string(),
            width: 1024,
            height: 1024,
            nologo: true,
            style_suffix: DEFAULT_STYLE_SUFFIX.to_string(),
        }
    }
}

/// Top-level pipeline configuration. Every field has a default.
///
/// # Example
///
/// ```
/// use storybook_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::default();
/// assert_eq!(config.text.model, "gemini-2.0-flash");
/// assert!(config.allow_theme_fallback);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub text: TextProviderConfig,
    pub image: ImageConfig,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Use the default template for unknown theme keys instead of rejecting them.
    pub allow_theme_fallback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            text: TextProviderConfig::default(),
            image: ImageConfig::default(),
            timeout_secs: 60,
            allow_theme_fallback: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML document. Missing fields keep their defaults.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> crate::error::Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| crate::StoryError::InvalidConfig(e.to_string()))?;
        config.normalize();
        Ok(config)
    }

    /// Normalize base URLs in place.
    pub fn normalize(&mut self) {
        self.text.base_url = normalize_base_url(&self.text.base_url);
        self.image.base_url = normalize_base_url(&self.image.base_url);
    }
}

/// Strip trailing slashes and known provider path suffixes from a base URL,
/// so backends can append their own paths without doubling them.
///
/// e.g. `"https://generativelanguage.googleapis.com/v1beta/"` -> `"https://generativelanguage.googleapis.com"`
pub(crate) fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    for suffix in &["/v1/images/generations", "/v1beta/models", "/v1beta", "/v1", "/prompt"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_json() {
        let cfg = GenerationConfig::default().to_json();
        assert_eq!(cfg["temperature"], 0.8);
        assert_eq!(cfg["topK"], 40);
        assert_eq!(cfg["topP"], 0.95);
        assert_eq!(cfg["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_safety_settings_cover_all_categories() {
        let settings = GenerationConfig::default().safety_settings();
        let arr = settings.as_array().expect("array");
        assert_eq!(arr.len(), 4);
        assert!(arr
            .iter()
            .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE"));
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://generativelanguage.googleapis.com/v1beta/"),
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1"),
            "https://api.openai.com"
        );
        assert_eq!(
            normalize_base_url("https://image.pollinations.ai/prompt/"),
            "https://image.pollinations.ai"
        );
        assert_eq!(normalize_base_url("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn test_partial_json_config_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"image": {"width": 512}, "allow_theme_fallback": false}"#)
                .unwrap();
        assert_eq!(cfg.image.width, 512);
        assert_eq!(cfg.image.height, 1024);
        assert_eq!(cfg.text.model, "gemini-2.0-flash");
        assert!(!cfg.allow_theme_fallback);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_from_yaml_str() {
        let yaml = "text:\n  model: gemini-1.5-flash\n  base_url: https://example.test/v1beta/\ntimeout_secs: 30\n";
        let cfg = PipelineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.text.model, "gemini-1.5-flash");
        assert_eq!(cfg.text.base_url, "https://example.test");
        assert_eq!(cfg.timeout_secs, 30);
    }
}
