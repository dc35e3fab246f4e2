//! Event hooks for pipeline lifecycle and recovered failures.
//!
//! Provides an optional, non-intrusive way to observe a pipeline run beyond
//! the progress callback. The pipeline emits events when steps start and
//! finish and whenever it absorbs a failure (a recovered parse, an
//! illustration fallback, or a missing illustration).

use std::sync::Arc;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum Event {
    /// A pipeline step has started.
    StepStart {
        /// Step identifier (e.g. `"story-text"`, `"cover"`, `"page-3"`).
        step: String,
    },
    /// A pipeline step has finished.
    StepEnd {
        step: String,
        /// Whether the step produced its result.
        ok: bool,
    },
    /// The model reply matched neither grammar and the fallback story was used.
    ParseRecovered {
        /// Why parsing failed.
        reason: String,
    },
    /// The primary image request failed and the direct URL was used instead.
    IllustrationFallback {
        /// `"cover"` or `"page-N"`.
        target: String,
        reason: String,
    },
    /// No illustration could be produced; the target is left without an image.
    IllustrationFailed {
        target: String,
        reason: String,
    },
    /// The hero avatar could not be generated and the uploaded photo is used.
    AvatarFallback {
        reason: String,
    },
}

/// Handler for pipeline events.
///
/// This is entirely optional -- the pipeline works without an event handler.
///
/// # Example
///
/// ```
/// use storybook_pipeline::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::StepStart { step } => println!("[start] {}", step),
///             Event::IllustrationFailed { target, reason } => {
///                 println!("[no image] {}: {}", target, reason)
///             }
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event. Must not block.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use storybook_pipeline::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::ParseRecovered { reason } = event {
///         eprintln!("story reply was unusable: {}", reason);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_without_handler_is_noop() {
        emit(&None, Event::StepStart { step: "x".into() });
    }

    #[test]
    fn test_fn_handler_receives_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Option<Arc<dyn EventHandler>> =
            Some(Arc::new(FnEventHandler(move |e: Event| {
                if let Event::StepEnd { step, ok } = e {
                    sink.lock().unwrap().push((step, ok));
                }
            })));

        emit(&handler, Event::StepEnd { step: "cover".into(), ok: false });
        emit(&handler, Event::StepStart { step: "ignored".into() });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[("cover".to_string(), false)]);
    }
}
