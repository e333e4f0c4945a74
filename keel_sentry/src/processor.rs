use keel_core::Pivot;
use sentry::protocol::{Event, Frame, Stacktrace};
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

/// A transformation applied to every event right before it is sent.
///
/// Returning `None` drops the event.
pub trait EventProcessor: Send + Sync {
    /// Transforms or drops the given event.
    fn process(&self, event: Event<'static>) -> Option<Event<'static>>;
}

impl<F> EventProcessor for F
where
    F: Fn(Event<'static>) -> Option<Event<'static>> + Send + Sync,
{
    fn process(&self, event: Event<'static>) -> Option<Event<'static>> {
        self(event)
    }
}

/// An ordered chain of [`EventProcessor`]s. An event dropped by one processor
/// is not seen by the following ones.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: Vec<Arc<dyn EventProcessor>>,
}

impl ProcessorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the given processor.
    pub fn with(mut self, processor: impl EventProcessor + 'static) -> Self {
        self.processors.push(Arc::new(processor));
        self
    }

    /// The number of processors in the chain.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Reports whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Runs the event through every processor, in order.
    pub fn process(&self, event: Event<'static>) -> Option<Event<'static>> {
        self.processors
            .iter()
            .try_fold(event, |event, processor| processor.process(event))
    }
}

impl Debug for ProcessorChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.processors.len())
            .finish()
    }
}

/// Strips the application root directory from stack frame paths, and marks
/// frames under it as in-app.
///
/// Frames with an absolute path are matched against the root directory.
/// Frames with only a relative file name are matched against the module
/// prefix, when one is given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimPath {
    root: Option<String>,
    module: Option<String>,
}

impl TrimPath {
    /// Trims the given root directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: Some(with_trailing_slash(root.as_ref().to_string_lossy().into_owned())),
            module: None,
        }
    }

    /// Trims the [pivot directory](Pivot) of the running process.
    pub fn detect() -> Self {
        Self {
            root: Pivot::resolve()
                .map(|root| with_trailing_slash(root.to_string_lossy().into_owned())),
            module: None,
        }
    }

    /// Also trims the given prefix from relative file names (e.g., `src/`
    /// or a crate name).
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(with_trailing_slash(module.into()));
        self
    }

    fn trim_stacktrace(&self, stacktrace: &mut Stacktrace) {
        for frame in stacktrace.frames.iter_mut() {
            self.trim_frame(frame);
        }
    }

    fn trim_frame(&self, frame: &mut Frame) {
        if let Some(abs_path) = frame.abs_path.as_mut() {
            let Some(root) = self.root.as_deref() else {
                return;
            };

            let trimmed = abs_path.strip_prefix(root).map(str::to_string);
            frame.in_app = Some(trimmed.is_some());
            if let Some(trimmed) = trimmed {
                *abs_path = trimmed;
            }
        } else if let Some(filename) = frame.filename.as_mut() {
            let Some(module) = self.module.as_deref() else {
                return;
            };

            let trimmed = filename.strip_prefix(module).map(str::to_string);
            frame.in_app = Some(trimmed.is_some());
            if let Some(trimmed) = trimmed {
                *filename = trimmed;
            }
        }
    }
}

impl EventProcessor for TrimPath {
    fn process(&self, mut event: Event<'static>) -> Option<Event<'static>> {
        for exception in event.exception.values.iter_mut() {
            if let Some(stacktrace) = exception.stacktrace.as_mut() {
                self.trim_stacktrace(stacktrace);
            }
        }

        for thread in event.threads.values.iter_mut() {
            if let Some(stacktrace) = thread.stacktrace.as_mut() {
                self.trim_stacktrace(stacktrace);
            }
        }

        Some(event)
    }
}

fn with_trailing_slash(mut path: String) -> String {
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sentry::protocol::{Exception, Level};

    fn frame(abs_path: Option<&str>, filename: Option<&str>) -> Frame {
        Frame {
            abs_path: abs_path.map(str::to_string),
            filename: filename.map(str::to_string),
            ..Frame::default()
        }
    }

    fn event_with(frames: Vec<Frame>) -> Event<'static> {
        Event {
            exception: vec![Exception {
                ty: "panic".to_string(),
                stacktrace: Some(Stacktrace {
                    frames,
                    ..Stacktrace::default()
                }),
                ..Exception::default()
            }]
            .into(),
            ..Event::default()
        }
    }

    fn frames_of(event: &Event<'static>) -> Vec<(Option<String>, Option<String>, Option<bool>)> {
        event.exception.values[0]
            .stacktrace
            .as_ref()
            .unwrap()
            .frames
            .iter()
            .map(|frame| (frame.abs_path.clone(), frame.filename.clone(), frame.in_app))
            .collect()
    }

    #[test]
    fn trims_root_and_marks_in_app() {
        // Given
        let processor = TrimPath::new("/srv/app").with_module("demo");
        let event = event_with(vec![
            frame(Some("/srv/app/src/main.rs"), None),
            frame(Some("/rustc/abc/library/core/src/panicking.rs"), None),
            frame(None, Some("demo/src/lib.rs")),
            frame(None, Some("tokio/src/runtime.rs")),
        ]);

        // When
        let event = processor.process(event).unwrap();

        // Then
        assert_eq!(
            frames_of(&event),
            vec![
                (Some("src/main.rs".to_string()), None, Some(true)),
                (
                    Some("/rustc/abc/library/core/src/panicking.rs".to_string()),
                    None,
                    Some(false),
                ),
                (None, Some("src/lib.rs".to_string()), Some(true)),
                (None, Some("tokio/src/runtime.rs".to_string()), Some(false)),
            ],
        );
    }

    #[test]
    fn chain_runs_in_order_and_stops_on_drop() {
        // Given
        let chain = ProcessorChain::new()
            .with(|mut event: Event<'static>| {
                event.level = Level::Fatal;
                Some(event)
            })
            .with(|event: Event<'static>| (event.level != Level::Fatal).then_some(event));

        // When
        let result = chain.process(Event::default());

        // Then
        assert_eq!(chain.len(), 2);
        assert!(result.is_none());
    }

    #[test]
    fn empty_chain_passes_events() {
        // Given
        let chain = ProcessorChain::new();
        let event = Event {
            message: Some("kept".to_string()),
            ..Event::default()
        };

        // When
        let result = chain.process(event).unwrap();

        // Then
        assert_eq!(result.message.as_deref(), Some("kept"));
    }
}
