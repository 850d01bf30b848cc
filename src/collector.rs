//! Event collector for testing.
//!
//! `EventCollector` accumulates [`TraceEvent`]s for later inspection and
//! assertion. Share it with a reconciler through an `Arc`.

use parking_lot::Mutex;

use crate::commit::CommitSummary;
use crate::element::ElementKind;
use crate::fiber::{EffectTag, FiberId};
use crate::tracer::{TraceEvent, Tracer};

/// Tracer that records every event.
///
/// # Example
///
/// ```ignore
/// use fiber_reconciler::{EventCollector, ReconcilerBuilder, RecordingTarget};
/// use std::sync::Arc;
///
/// let collector = Arc::new(EventCollector::new());
/// let mut reconciler = ReconcilerBuilder::new()
///     .tracer(collector.clone())
///     .build(RecordingTarget::new());
/// // render and pump here
/// assert!(!collector.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<TraceEvent>>,
}

impl EventCollector {
    /// Create a new empty event collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get collected events as a vector.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Take collected events, clearing the collector.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Get the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Check if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for EventCollector {
    fn on_render_requested(&self, root: FiberId) {
        self.push(TraceEvent::RenderRequested { root });
    }

    fn on_unit_start(&self, fiber: FiberId, kind: ElementKind) {
        self.push(TraceEvent::UnitStart { fiber, kind });
    }

    fn on_unit_end(&self, fiber: FiberId) {
        self.push(TraceEvent::UnitEnd { fiber });
    }

    fn on_fiber_created(&self, fiber: FiberId, kind: ElementKind, effect: EffectTag) {
        self.push(TraceEvent::FiberCreated {
            fiber,
            kind,
            effect,
        });
    }

    fn on_deletion_queued(&self, fiber: FiberId, kind: ElementKind) {
        self.push(TraceEvent::DeletionQueued { fiber, kind });
    }

    fn on_yield(&self, units: usize) {
        self.push(TraceEvent::Yielded { units });
    }

    fn on_commit_start(&self, deletions: usize) {
        self.push(TraceEvent::CommitStart { deletions });
    }

    fn on_commit_end(&self, summary: &CommitSummary) {
        self.push(TraceEvent::CommitEnd {
            summary: *summary,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_basic() {
        let collector = EventCollector::new();
        assert!(collector.is_empty());

        collector.on_yield(3);
        collector.on_commit_start(1);

        assert_eq!(collector.len(), 2);
        assert_eq!(
            collector.events(),
            vec![
                TraceEvent::Yielded { units: 3 },
                TraceEvent::CommitStart { deletions: 1 }
            ]
        );
    }

    #[test]
    fn test_collector_take() {
        let collector = EventCollector::new();
        collector.on_unit_end(FiberId::from_raw(4));

        let events = collector.take();
        assert_eq!(
            events,
            vec![TraceEvent::UnitEnd {
                fiber: FiberId::from_raw(4)
            }]
        );
        assert!(collector.is_empty());

        collector.on_yield(1);
        collector.clear();
        assert_eq!(collector.len(), 0);
    }
}
