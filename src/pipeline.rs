use crate::{
    avatar::{AvatarGenerator, HeroAvatar},
    backend::{GeminiBackend, TextBackend},
    config::PipelineConfig,
    diagnostics::ParseDiagnostics,
    error::Result,
    events::{emit, Event, EventHandler},
    generator::StoryTextGenerator,
    illustration::Illustrator,
    image::{ImageBackend, PollinationsBackend},
    parser, prompt,
    types::{GeneratedStory, ProgressEvent, StoryParameters},
    StoryError,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Progress checkpoints of a run.
const PROGRESS_STORY: f64 = 10.0;
const PROGRESS_COVER: f64 = 40.0;
const PROGRESS_PAGES_START: f64 = 60.0;
const PROGRESS_PAGES_SPAN: f64 = 35.0;
const PROGRESS_DONE: f64 = 100.0;

/// Everything a run produced, including what it recovered from.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub story: GeneratedStory,

    /// How the story reply was parsed.
    pub diagnostics: ParseDiagnostics,

    /// Targets (`"cover"`, `"page-N"`) left without an illustration.
    pub missing_illustrations: Vec<String>,
}

/// Orchestrates one storybook: prompt, story text, parse, cover, pages.
///
/// Runs are sequential: one network request at a time, pages illustrated in
/// order. A run owns its story until it returns; nothing is shared between
/// runs except the HTTP client and the backends.
///
/// Only two things end a run early: invalid parameters
/// ([`StoryError::Validation`]) and a failed story-text request
/// ([`StoryError::Provider`] / [`StoryError::Request`]). An unusable reply is
/// replaced by the fallback story, and an illustration failure leaves that
/// cover or page without an image.
pub struct StoryPipeline {
    client: Client,
    config: PipelineConfig,
    text_backend: Arc<dyn TextBackend>,
    image_backend: Arc<dyn ImageBackend>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for StoryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoryPipeline")
            .field("config", &self.config)
            .field("text_backend", &self.text_backend.name())
            .field("image_backend", &self.image_backend.name())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

impl StoryPipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> StoryPipelineBuilder {
        StoryPipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate a complete storybook.
    ///
    /// `on_progress` receives a non-decreasing series of checkpoints: 10
    /// (story text), 40 (cover), 60, then one step per page up to 95, then
    /// 100 when the story is returned.
    pub async fn run<F>(&self, params: &StoryParameters, on_progress: F) -> Result<GeneratedStory>
    where
        F: FnMut(ProgressEvent),
    {
        self.run_with_report(params, on_progress)
            .await
            .map(|report| report.story)
    }

    /// Like [`run`](Self::run), also reporting parse diagnostics and the
    /// illustrations that could not be produced.
    #[instrument(skip_all, fields(theme = %params.theme, pages = params.page_count))]
    pub async fn run_with_report<F>(
        &self,
        params: &StoryParameters,
        mut on_progress: F,
    ) -> Result<RunReport>
    where
        F: FnMut(ProgressEvent),
    {
        params.validate()?;
        let built = if self.config.allow_theme_fallback {
            prompt::build(params)
        } else {
            prompt::build_strict(params)?
        };
        if built.used_default_template() {
            info!(theme = %params.theme, "unknown theme, using the default template");
        }

        // Story text. The only network step whose failure is fatal.
        on_progress(ProgressEvent::new(PROGRESS_STORY, "Generating story"));
        emit(&self.event_handler, Event::StepStart { step: "story-text".into() });
        let generator =
            StoryTextGenerator::new(&self.client, self.text_backend.as_ref(), &self.config.text);
        let reply = match generator.generate(&built.text, &params.text_credential).await {
            Ok(reply) => reply,
            Err(e) => {
                emit(
                    &self.event_handler,
                    Event::StepEnd { step: "story-text".into(), ok: false },
                );
                return Err(e);
            }
        };
        let (mut story, diagnostics) = parser::parse_with_diagnostics(&reply, built.grammar);
        if let Some(ref e) = diagnostics.parse_error {
            emit(&self.event_handler, Event::ParseRecovered { reason: e.to_string() });
        }
        emit(
            &self.event_handler,
            Event::StepEnd { step: "story-text".into(), ok: true },
        );

        let illustrator = Illustrator::new(
            &self.client,
            self.image_backend.as_ref(),
            &self.config.image,
            params.image_credential.as_deref(),
            &self.event_handler,
        );
        let avatar = params.avatar_description.as_deref();
        let mut missing = Vec::new();

        on_progress(ProgressEvent::new(PROGRESS_COVER, "Creating cover art"));
        story.cover_image_url = self
            .illustrate_target(&illustrator, "cover", &story.cover_image_prompt, avatar)
            .await;
        if story.cover_image_url.is_none() {
            missing.push("cover".to_string());
        }

        on_progress(ProgressEvent::new(PROGRESS_PAGES_START, "Illustrating pages"));
        let total = story.pages.len();
        for (i, page) in story.pages.iter_mut().enumerate() {
            let target = format!("page-{}", page.page_number);
            page.image_url = self
                .illustrate_target(&illustrator, &target, &page.image_prompt, avatar)
                .await;
            if page.image_url.is_none() {
                missing.push(target);
            }
            let done = (i + 1) as f64 / total as f64;
            on_progress(ProgressEvent::new(
                PROGRESS_PAGES_START + PROGRESS_PAGES_SPAN * done,
                format!("Illustrated page {} of {}", i + 1, total),
            ));
        }

        on_progress(ProgressEvent::new(PROGRESS_DONE, "Complete"));
        info!(
            title = %story.title,
            pages = story.pages.len(),
            missing_illustrations = missing.len(),
            "storybook ready"
        );
        Ok(RunReport {
            story,
            diagnostics,
            missing_illustrations: missing,
        })
    }

    /// Turn an uploaded photo into the hero avatar, using the image backend.
    ///
    /// Never fails; see [`AvatarGenerator::generate`]. Pass the result to
    /// [`StoryParameters::with_hero_avatar`] so every illustration features it.
    pub async fn create_avatar(
        &self,
        child_name: &str,
        photo_url: &str,
        image_credential: Option<&str>,
    ) -> HeroAvatar {
        emit(&self.event_handler, Event::StepStart { step: "avatar".into() });
        let avatar = AvatarGenerator::new(
            &self.client,
            self.image_backend.as_ref(),
            &self.config.image,
            image_credential,
            &self.event_handler,
        )
        .generate(child_name, photo_url)
        .await;
        emit(
            &self.event_handler,
            Event::StepEnd { step: "avatar".into(), ok: avatar.generated },
        );
        avatar
    }

    /// Illustrate one target, absorbing any failure.
    async fn illustrate_target(
        &self,
        illustrator: &Illustrator<'_>,
        target: &str,
        prompt: &str,
        avatar: Option<&str>,
    ) -> Option<String> {
        emit(&self.event_handler, Event::StepStart { step: target.to_string() });
        let result = illustrator.illustrate(target, prompt, avatar).await;
        emit(
            &self.event_handler,
            Event::StepEnd { step: target.to_string(), ok: result.is_ok() },
        );
        match result {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(illustration = target, error = %e, "illustration failed, leaving it empty");
                emit(
                    &self.event_handler,
                    Event::IllustrationFailed {
                        target: target.to_string(),
                        reason: e.to_string(),
                    },
                );
                None
            }
        }
    }
}

/// Builder for [`StoryPipeline`].
pub struct StoryPipelineBuilder {
    config: PipelineConfig,
    client: Option<Client>,
    text_backend: Option<Arc<dyn TextBackend>>,
    image_backend: Option<Arc<dyn ImageBackend>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl StoryPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            client: None,
            text_backend: None,
            image_backend: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Set the whole configuration. Default: [`PipelineConfig::default`].
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the HTTP client. If not set, one is built with the configured timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the story-text backend. Default: [`GeminiBackend`].
    pub fn text_backend(mut self, backend: Arc<dyn TextBackend>) -> Self {
        self.text_backend = Some(backend);
        self
    }

    /// Set the image backend. Default: [`PollinationsBackend`].
    pub fn image_backend(mut self, backend: Arc<dyn ImageBackend>) -> Self {
        self.image_backend = Some(backend);
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the per-request timeout, overriding `timeout_secs` from the config.
    ///
    /// Ignored when a custom `Client` is supplied via [`client`](Self::client).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<StoryPipeline> {
        let mut config = self.config;
        config.normalize();
        if config.text.model.trim().is_empty() {
            return Err(StoryError::InvalidConfig("text model is empty".into()));
        }
        if config.image.width == 0 || config.image.height == 0 {
            return Err(StoryError::InvalidConfig(format!(
                "image size {}x{} is empty",
                config.image.width, config.image.height
            )));
        }

        let client = match self.client {
            Some(client) => client,
            None => {
                let timeout = self
                    .timeout
                    .unwrap_or(Duration::from_secs(config.timeout_secs));
                Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| StoryError::InvalidConfig(format!("HTTP client: {}", e)))?
            }
        };

        Ok(StoryPipeline {
            client,
            config,
            text_backend: self.text_backend.unwrap_or_else(|| Arc::new(GeminiBackend)),
            image_backend: self
                .image_backend
                .unwrap_or_else(|| Arc::new(PollinationsBackend)),
            event_handler: self.event_handler,
        })
    }
}

impl Default for StoryPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::events::FnEventHandler;
    use crate::image::MockImageBackend;
    use crate::parser::{Grammar, FALLBACK_TITLE};
    use std::sync::Mutex;

    const JSON_REPLY: &str = r#"Here is your story!
{
  "title": "Maya and the Moon",
  "coverImagePrompt": "a girl in a silver rocket",
  "pages": [
    {"pageNumber": 1, "text": "Maya built a rocket.", "imagePrompt": "a cardboard rocket"},
    {"pageNumber": 2, "text": "She flew to the moon.", "imagePrompt": "a rocket near the moon"},
    {"pageNumber": 3, "text": "She waved at Earth.", "imagePrompt": "Earth from the moon"}
  ]
}"#;

    const TAGGED_REPLY: &str = "TITLE: The Little Flute\nPAGE 1:\nTEXT: Krishna played.\nIMAGE: a boy with a flute\nPAGE 2:\nTEXT: The cows danced.\nIMAGE: cows dancing";

    fn params(theme: &str) -> StoryParameters {
        StoryParameters::new("Maya", 6, theme, "text-key").with_page_count(3)
    }

    fn pipeline(
        text: Arc<MockBackend>,
        images: Arc<MockImageBackend>,
        events: Option<Arc<dyn EventHandler>>,
    ) -> StoryPipeline {
        let mut builder = StoryPipeline::builder()
            .text_backend(text)
            .image_backend(images);
        if let Some(h) = events {
            builder = builder.event_handler(h);
        }
        builder.build().unwrap()
    }

    fn recorder() -> (Arc<Mutex<Vec<Event>>>, Arc<dyn EventHandler>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> =
            Arc::new(FnEventHandler(move |e: Event| sink.lock().unwrap().push(e)));
        (seen, handler)
    }

    #[tokio::test]
    async fn test_full_run_illustrates_cover_and_every_page() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text.clone(), images.clone(), None);

        let mut progress = Vec::new();
        let story = p.run(&params("space"), |e| progress.push(e)).await.unwrap();

        assert_eq!(story.title, "Maya and the Moon");
        assert_eq!(story.pages.len(), 3);
        assert!(story.has_contiguous_pages());
        assert_eq!(story.cover_image_url.as_deref(), Some("mock://image/0"));
        assert_eq!(story.pages[0].image_url.as_deref(), Some("mock://image/1"));
        assert_eq!(story.pages[2].image_url.as_deref(), Some("mock://image/3"));
        assert_eq!(text.calls(), 1);
        assert_eq!(images.calls(), 4);

        let percents: Vec<f64> = progress.iter().map(|e| e.percent).collect();
        assert_eq!(percents.len(), 7);
        assert_eq!(&percents[..3], &[10.0, 40.0, 60.0]);
        assert_eq!(percents[5], 95.0);
        assert_eq!(percents[6], 100.0);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_images_requested_in_page_order() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text, images.clone(), None);
        p.run(&params("space"), |_| {}).await.unwrap();

        let prompts = images.prompts();
        assert!(prompts[0].starts_with("a girl in a silver rocket"));
        assert!(prompts[1].starts_with("a cardboard rocket"));
        assert!(prompts[2].starts_with("a rocket near the moon"));
        assert!(prompts[3].starts_with("Earth from the moon"));
    }

    #[tokio::test]
    async fn test_page_failure_leaves_only_that_page_unillustrated() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        // Call 0 is the cover, call 2 is page 2.
        let images = Arc::new(MockImageBackend::failing_on([2]));
        let (seen, handler) = recorder();
        let p = pipeline(text, images.clone(), Some(handler));

        let report = p.run_with_report(&params("space"), |_| {}).await.unwrap();
        let story = report.story;

        assert_eq!(story.pages.len(), 3);
        assert!(story.pages[0].image_url.is_some());
        assert!(story.pages[1].image_url.is_none());
        assert!(story.pages[2].image_url.is_some());
        assert_eq!(story.unillustrated_pages(), vec![2]);
        assert_eq!(report.missing_illustrations, vec!["page-2"]);
        assert_eq!(images.calls(), 4);

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|e| matches!(
            e,
            Event::IllustrationFailed { target, .. } if target == "page-2"
        )));
    }

    #[tokio::test]
    async fn test_cover_failure_is_not_fatal() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::failing_on([0]));
        let p = pipeline(text, images, None);

        let story = p.run(&params("space"), |_| {}).await.unwrap();
        assert!(story.cover_image_url.is_none());
        assert!(story.unillustrated_pages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_uses_direct_url_when_available() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::failing_on([1]).with_direct_url());
        let p = pipeline(text, images, None);

        let story = p.run(&params("space"), |_| {}).await.unwrap();
        let url = story.pages[0].image_url.as_deref().unwrap_or_default();
        assert!(url.starts_with("mock://direct/"));
    }

    #[tokio::test]
    async fn test_provider_error_is_fatal() {
        let text = Arc::new(MockBackend::failing(500, "internal error"));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text, images.clone(), None);

        let mut progress = Vec::new();
        let err = p
            .run(&params("space"), |e| progress.push(e.percent))
            .await
            .unwrap_err();
        match err {
            StoryError::Provider { status, ref body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("expected provider error, got {other:?}"),
        }
        assert_eq!(progress, vec![10.0]);
        assert_eq!(images.calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_any_request() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text.clone(), images.clone(), None);

        let mut called = false;
        let bad = StoryParameters::new("Maya", 0, "space", "text-key");
        let err = p.run(&bad, |_| called = true).await.unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));
        assert!(!called);
        assert_eq!(text.calls(), 0);
        assert_eq!(images.calls(), 0);
    }

    #[tokio::test]
    async fn test_unusable_reply_yields_fallback_story() {
        let text = Arc::new(MockBackend::fixed("Sorry, I cannot write that."));
        let images = Arc::new(MockImageBackend::new());
        let (seen, handler) = recorder();
        let p = pipeline(text, images, Some(handler));

        let report = p.run_with_report(&params("space"), |_| {}).await.unwrap();
        assert_eq!(report.story.title, FALLBACK_TITLE);
        assert_eq!(report.story.pages.len(), 1);
        assert!(report.story.pages[0].image_url.is_some());
        assert!(report.diagnostics.recovered());
        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::ParseRecovered { .. })));
    }

    #[tokio::test]
    async fn test_mythology_theme_uses_tagged_grammar() {
        let text = Arc::new(MockBackend::fixed(TAGGED_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text.clone(), images, None);

        let report = p.run_with_report(&params("krishna"), |_| {}).await.unwrap();
        assert_eq!(report.diagnostics.grammar, Grammar::TaggedLine);
        assert_eq!(report.story.title, "The Little Flute");
        assert_eq!(report.story.pages.len(), 2);
        assert!(text.prompts()[0].contains("TITLE:"));
    }

    #[tokio::test]
    async fn test_hero_avatar_features_in_every_illustration() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text.clone(), images.clone(), None);

        let avatar = p.create_avatar("Maya", "data:image/png;base64,AA", None).await;
        assert!(avatar.generated);
        assert_eq!(avatar.avatar_url, "mock://image/0");

        let params = params("space").with_hero_avatar(&avatar);
        p.run(&params, |_| {}).await.unwrap();
        assert!(text.prompts()[0].contains("representing Maya"));
        let prompts = images.prompts();
        assert_eq!(prompts.len(), 5);
        assert!(prompts[1..]
            .iter()
            .all(|p| p.contains("featuring a cheerful cartoon character representing Maya")));
    }

    #[tokio::test]
    async fn test_failed_avatar_uses_photo() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::failing_on([0]));
        let p = pipeline(text, images, None);

        let avatar = p.create_avatar("Maya", "data:image/png;base64,AA", None).await;
        assert!(!avatar.generated);
        assert_eq!(avatar.avatar_url, "data:image/png;base64,AA");
        assert_eq!(avatar.description, "Maya, a brave and curious child");
    }

    #[tokio::test]
    async fn test_hindi_story_pages_are_illustrated() {
        let reply = "TITLE: गणेश और मोदक\nPAGE 1:\nTEXT: गणेश को मोदक पसंद है।\nIMAGE: मोदक के साथ गणेश\nPAGE 2:\nTEXT: माया ने मोदक बनाए।\nIMAGE: रसोई में माया";
        let text = Arc::new(MockBackend::fixed(reply));
        let images = Arc::new(MockImageBackend::failing_on([2]).with_direct_url());
        let p = pipeline(text, images.clone(), None);
        let params = params("ganesha").with_language("Hindi");

        let report = p.run_with_report(&params, |_| {}).await.unwrap();
        assert!(report.missing_illustrations.is_empty());
        assert_eq!(images.calls(), 3);
        assert!(images.prompts()[1].starts_with("मोदक के साथ गणेश, "));
        assert_eq!(report.story.pages[0].image_url.as_deref(), Some("mock://image/1"));
        assert!(report.story.pages[1]
            .image_url
            .as_deref()
            .is_some_and(|u| u.starts_with("mock://direct/")));
    }

    #[tokio::test]
    async fn test_unknown_theme_rejected_when_fallback_disabled() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let config = PipelineConfig {
            allow_theme_fallback: false,
            ..PipelineConfig::default()
        };
        let p = StoryPipeline::builder()
            .config(config)
            .text_backend(text.clone())
            .image_backend(images)
            .build()
            .unwrap();

        let err = p.run(&params("dinosaurs"), |_| {}).await.unwrap_err();
        assert!(matches!(err, StoryError::Validation(_)));
        assert_eq!(text.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_theme_falls_back_by_default() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text.clone(), images, None);

        let report = p.run_with_report(&params("dinosaurs"), |_| {}).await.unwrap();
        assert_eq!(report.diagnostics.grammar, Grammar::Json);
        assert!(text.prompts()[0].contains("dinosaurs"));
    }

    #[tokio::test]
    async fn test_avatar_and_credential_reach_image_requests() {
        let text = Arc::new(MockBackend::fixed(JSON_REPLY));
        let images = Arc::new(MockImageBackend::new());
        let p = pipeline(text, images.clone(), None);
        let params = params("space")
            .with_avatar_description("a girl with curly hair")
            .with_image_credential("img-key");

        p.run(&params, |_| {}).await.unwrap();
        let requests = images.requests();
        assert!(requests
            .iter()
            .all(|r| r.prompt.contains("featuring a girl with curly hair")));
        assert!(requests
            .iter()
            .all(|r| r.credential.as_deref() == Some("img-key")));
    }

    #[test]
    fn test_build_rejects_empty_image_size() {
        let mut config = PipelineConfig::default();
        config.image.width = 0;
        let err = StoryPipeline::builder().config(config).build().unwrap_err();
        assert!(matches!(err, StoryError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_normalizes_base_urls() {
        let mut config = PipelineConfig::default();
        config.text.base_url = "https://generativelanguage.googleapis.com/v1beta/".into();
        let p = StoryPipeline::builder().config(config).build().unwrap();
        assert_eq!(
            p.config().text.base_url,
            "https://generativelanguage.googleapis.com"
        );
    }
}
