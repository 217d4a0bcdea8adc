//! Compiler event reporting.

use serde::Serialize;
use std::sync::Mutex;

/// Something worth telling the user about, short of an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum CompilerEvent {
    Ignored { path: String, reason: String },
    /// A file nothing could resolve. Reported once per file.
    Unresolved { path: String, reason: String },
    OversizedContainer { path: String, size: u64 },
    PatchFailed { path: String, from: String, error: String },
    RecordFailed { path: String, error: String },
}

/// Receives compiler events. Shared across worker threads.
pub trait Reporter: Send + Sync {
    fn report(&self, event: CompilerEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, event: CompilerEvent) {
        match event {
            CompilerEvent::Ignored { path, reason } => {
                tracing::debug!("Ignored {}: {}", path, reason)
            }
            CompilerEvent::Unresolved { path, reason } => {
                tracing::warn!("Unresolved {}: {}", path, reason)
            }
            CompilerEvent::OversizedContainer { path, size } => {
                tracing::warn!("Container {} is {} bytes; deconstruction may be slow", path, size)
            }
            CompilerEvent::PatchFailed { path, from, error } => {
                tracing::warn!("Patching {} from {} failed: {}", path, from, error)
            }
            CompilerEvent::RecordFailed { path, error } => {
                tracing::error!("Failed to resolve {}: {}", path, error)
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<CompilerEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CompilerEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, event: CompilerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter_keeps_order() {
        let reporter = CollectingReporter::new();
        reporter.report(CompilerEvent::Unresolved {
            path: "a".into(),
            reason: "r".into(),
        });
        reporter.report(CompilerEvent::OversizedContainer {
            path: "b".into(),
            size: 3,
        });
        let events = reporter.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], CompilerEvent::OversizedContainer { size: 3, .. }));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&CompilerEvent::Ignored {
            path: "logs/a.log".into(),
            reason: "logs".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"ignored","path":"logs/a.log","reason":"logs"}"#);
    }
}
