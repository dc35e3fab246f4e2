//! # Storybook Pipeline
//!
//! Personalized children's storybooks from a handful of form fields.
//!
//! One [`StoryPipeline::run`] turns [`StoryParameters`] into a
//! [`GeneratedStory`]: it builds a theme-specific prompt, asks a text model
//! for the story, parses the reply defensively, then illustrates the cover
//! and every page in order, reporting progress along the way.
//!
//! ## Core Concepts
//!
//! - **[`prompt`]**: pure prompt construction. The theme picks a template,
//!   and the template picks the reply [`Grammar`](parser::Grammar).
//! - **[`parser`]**: JSON and tagged-line grammars. Never fails: an
//!   unusable reply becomes the one-page fallback story.
//! - **[`TextBackend`]** / **[`ImageBackend`]**: object-safe provider
//!   seams, with Gemini, Pollinations and mock implementations.
//! - **[`illustration`]**: prompt sanitizing, random seeds, and the direct
//!   URL fallback.
//! - **[`avatar`]**: the hero's cartoon portrait and the description that
//!   ties every illustration to it, falling back to the uploaded photo.
//! - **[`store`]**: saved-story gallery, monthly credits and the current
//!   avatar over an injected key-value store.
//!
//! Only invalid parameters and text-provider failures end a run early.
//! Everything downstream is absorbed and reported through
//! [`events`] and `tracing`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use storybook_pipeline::{StoryParameters, StoryPipeline};
//! use storybook_pipeline::store::{FileStore, StoryGallery, StoryOwner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = StoryPipeline::builder().build()?;
//!     let params = StoryParameters::new("Maya", 6, "space", "GEMINI_API_KEY")
//!         .with_moral_lesson("Be brave and kind")
//!         .with_page_count(5);
//!
//!     let story = pipeline
//!         .run(&params, |p| println!("{:>5.1}% {}", p.percent, p.step))
//!         .await?;
//!
//!     let gallery = StoryGallery::new(FileStore::open("./stories")?);
//!     let id = gallery.save(story, StoryOwner::from(&params))?;
//!     println!("saved {}", id);
//!     Ok(())
//! }
//! ```

pub mod avatar;
pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod generator;
pub mod illustration;
pub mod image;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod store;
pub mod types;

pub use avatar::{AvatarGenerator, HeroAvatar};
pub use backend::{GeminiBackend, MockBackend, TextBackend, TextRequest, TextResponse};
pub use config::{GenerationConfig, ImageConfig, PipelineConfig, TextProviderConfig};
pub use diagnostics::ParseDiagnostics;
pub use error::{Result, StoryError};
pub use events::{Event, EventHandler, FnEventHandler};
pub use generator::StoryTextGenerator;
pub use illustration::{IllustrationError, Illustrator};
#[cfg(feature = "openai")]
pub use image::OpenAiImageBackend;
pub use image::{ImageBackend, ImageOutput, ImageRequest, MockImageBackend, PollinationsBackend};
pub use parser::{fallback_story, parse, parse_with_diagnostics, Grammar, ParseError};
pub use pipeline::{RunReport, StoryPipeline, StoryPipelineBuilder};
pub use prompt::BuiltPrompt;
pub use store::{
    AvatarSlot, CreditBalance, CreditLedger, FileStore, KeyValueStore, MemoryStore, SavedStory, StoryGallery,
    StoryOwner,
};
pub use types::{GeneratedStory, ProgressEvent, ReadingLevel, StoryPage, StoryParameters};
