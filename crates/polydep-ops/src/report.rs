//! Error report collaborator.
//!
//! The pipeline hands every structured event to an [`ErrorReporter`]; it
//! never formats prose itself.

use std::sync::Mutex;

use polydep_core::events::ErrorEvent;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, event: &ErrorEvent);
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ErrorEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ErrorEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, event: &ErrorEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

/// Logs each event at `warn` with its kind as a field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, event: &ErrorEvent) {
        tracing::warn!(kind = event.kind(), "{event}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order() {
        let reporter = CollectingReporter::new();
        let a = ErrorEvent::Io {
            path: "a.cs".into(),
            message: "denied".into(),
        };
        let b = ErrorEvent::Io {
            path: "b.cs".into(),
            message: "denied".into(),
        };
        reporter.report(&a);
        reporter.report(&b);
        assert_eq!(reporter.events(), vec![a, b]);
        TracingReporter.report(&reporter.events()[0]);
    }
}
