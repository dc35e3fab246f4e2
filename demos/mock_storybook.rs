//! Example: a whole storybook run on mock backends, no API keys needed.
//!
//! Run with: `cargo run --example mock_storybook`

use std::sync::Arc;
use storybook_pipeline::events::{Event, FnEventHandler};
use storybook_pipeline::{
    AvatarSlot, CreditLedger, MemoryStore, MockBackend, MockImageBackend, StoryGallery,
    StoryOwner, StoryParameters, StoryPipeline,
};

const REPLY: &str = r#"Here is your story!
{
  "title": "Maya and the Moon Garden",
  "coverImagePrompt": "a girl in a silver rocket above a glowing garden",
  "pages": [
    {"pageNumber": 1, "text": "Maya built a rocket from a cardboard box.", "imagePrompt": "a cardboard rocket in a backyard"},
    {"pageNumber": 2, "text": "She landed in a garden of moon flowers.", "imagePrompt": "glowing flowers on the moon"},
    {"pageNumber": 3, "text": "She shared the seeds with her friends.", "imagePrompt": "children planting silver seeds"}
  ]
}"#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The third image request fails; the mock's direct URL stands in for it.
    let images = Arc::new(MockImageBackend::failing_on([2]).with_direct_url());
    let pipeline = StoryPipeline::builder()
        .text_backend(Arc::new(MockBackend::fixed(REPLY)))
        .image_backend(images.clone())
        .event_handler(Arc::new(FnEventHandler(|event: Event| {
            if let Event::IllustrationFallback { target, reason } = event {
                println!("  fallback for {}: {}", target, reason);
            }
        })))
        .build()?;

    let store = Arc::new(MemoryStore::new());
    let credits = CreditLedger::new(store.clone());
    if !credits.use_credit()? {
        println!("No credits left, {} days until reset", credits.days_until_reset()?);
        return Ok(());
    }

    let avatar = pipeline
        .create_avatar("Maya", "data:image/png;base64,iVBORw0KGgo=", None)
        .await;
    AvatarSlot::new(store.clone()).save(&avatar)?;
    println!("Hero: {}", avatar.description);

    let params = StoryParameters::new("Maya", 6, "space", "mock-key")
        .with_moral_lesson("Sharing makes things grow")
        .with_page_count(3)
        .with_hero_avatar(&avatar);

    let report = pipeline
        .run_with_report(&params, |p| println!("{:>5.1}% {}", p.percent, p.step))
        .await?;

    let story = report.story;
    println!("\n{}", story.title);
    for page in &story.pages {
        println!(
            "  {}. {} [{}]",
            page.page_number,
            page.text,
            page.image_url.as_deref().unwrap_or("no image")
        );
    }
    println!("Image requests: {}", images.calls());
    println!("Parse recovered: {}", report.diagnostics.recovered());

    let gallery = StoryGallery::new(store);
    let id = gallery.save(story, StoryOwner::from(&params).with_hero_avatar(&avatar))?;
    println!("Saved as {} ({} in gallery)", id, gallery.list()?.len());
    println!("Credits left: {}", credits.balance()?.balance);

    Ok(())
}
