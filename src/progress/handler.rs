//! Progress handler trait and events

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

/// Why a dependency node was left untouched by a rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The resolver returned nothing, or the node carries no artifact
    Unresolved,

    /// More than one resolved dependency or artifact where exactly one is required
    AmbiguousResolution { count: usize },

    /// The package manifest could not be read
    ManifestRead { message: String },

    /// The resolver failed outright
    Resolve { message: String },

    /// The package does not carry the obfuscation markers
    NotObfuscated,

    /// Another step already holds a name or output this node needs
    StepCollision { step: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unresolved => write!(f, "unresolved"),
            SkipReason::AmbiguousResolution { count } => {
                write!(f, "resolved to {} candidates where one was expected", count)
            }
            SkipReason::ManifestRead { message } => {
                write!(f, "failed to read manifest: {}", message)
            }
            SkipReason::Resolve { message } => write!(f, "resolution failed: {}", message),
            SkipReason::NotObfuscated => write!(f, "not obfuscated"),
            SkipReason::StepCollision { step } => {
                write!(f, "step '{}' is already registered", step)
            }
        }
    }
}

/// Events emitted while rewriting the dependency graph and running steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A node was not rewritten
    NodeSkipped {
        dependency: String,
        reason: SkipReason,
    },

    /// A replacement was registered for a node
    ReplacementRegistered { dependency: String, group: String },

    /// No sources artifact exists; sources will be decompiled
    MissingSources { dependency: String },

    /// All deferred step chains were bound
    Finalized { replacements: usize },

    /// A step started executing
    StepStarted { step: String },

    /// A step produced its output
    StepFinished { step: String, duration: Duration },

    /// A step failed
    StepFailed { step: String, error: String },
}

/// Trait for handling progress events
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Handler that keeps every event, mostly useful for inspecting a pass afterwards
#[derive(Debug, Default)]
pub struct CollectingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn missing_sources(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::MissingSources { dependency } => Some(dependency),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<(String, SkipReason)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ProgressEvent::NodeSkipped { dependency, reason } => Some((dependency, reason)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressHandler for CollectingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fans events out to several handlers
pub struct FanOutHandler {
    handlers: Vec<std::sync::Arc<dyn ProgressHandler>>,
}

impl FanOutHandler {
    pub fn new(handlers: Vec<std::sync::Arc<dyn ProgressHandler>>) -> Self {
        Self { handlers }
    }
}

impl ProgressHandler for FanOutHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        for handler in &self.handlers {
            handler.on_progress(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        let handler = NoOpHandler;
        handler.on_progress(&ProgressEvent::Finalized { replacements: 0 });
    }

    #[test]
    fn test_collecting_handler() {
        let handler = CollectingHandler::new();
        handler.on_progress(&ProgressEvent::MissingSources {
            dependency: "com.example:lib:1.0".to_string(),
        });
        handler.on_progress(&ProgressEvent::NodeSkipped {
            dependency: "com.example:other:1.0".to_string(),
            reason: SkipReason::NotObfuscated,
        });

        assert_eq!(handler.events().len(), 2);
        assert_eq!(handler.missing_sources(), vec!["com.example:lib:1.0"]);
        assert_eq!(
            handler.skipped(),
            vec![(
                "com.example:other:1.0".to_string(),
                SkipReason::NotObfuscated
            )]
        );
    }

    #[test]
    fn test_fan_out() {
        let count = Arc::new(AtomicUsize::new(0));
        let handlers: Vec<Arc<dyn ProgressHandler>> = (0..2)
            .map(|_| {
                Arc::new(CountingHandler {
                    count: count.clone(),
                }) as Arc<dyn ProgressHandler>
            })
            .collect();
        let handler = FanOutHandler::new(handlers);

        handler.on_progress(&ProgressEvent::StepStarted {
            step: "provideLib".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_skip_reason_display() {
        let reason = SkipReason::AmbiguousResolution { count: 2 };
        assert_eq!(
            reason.to_string(),
            "resolved to 2 candidates where one was expected"
        );
    }
}
