//! Tracer trait for observing reconciliation.
//!
//! This module defines the [`Tracer`] trait and the [`TraceEvent`] record used
//! by collectors. The default [`NoopTracer`] costs nothing when observation is
//! not needed.
//!
//! # Example
//!
//! ```ignore
//! use fiber_reconciler::{FiberId, ReconcilerBuilder, RecordingTarget, Tracer};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn on_yield(&self, units: usize) {
//!         println!("yielded after {units} units");
//!     }
//! }
//!
//! let reconciler = ReconcilerBuilder::new()
//!     .tracer(PrintTracer)
//!     .build(RecordingTarget::new());
//! ```

use std::sync::Arc;

use crate::commit::CommitSummary;
use crate::element::ElementKind;
use crate::fiber::{EffectTag, FiberId};

/// One observed step, as recorded by [`EventCollector`](crate::EventCollector).
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    /// A render session started with a new work-in-progress root.
    RenderRequested {
        /// The work-in-progress root.
        root: FiberId,
    },
    /// A unit of work started.
    UnitStart {
        /// The fiber being processed.
        fiber: FiberId,
        /// Its kind.
        kind: ElementKind,
    },
    /// A unit of work finished.
    UnitEnd {
        /// The processed fiber.
        fiber: FiberId,
    },
    /// The reconciler created a fiber.
    FiberCreated {
        /// The new fiber.
        fiber: FiberId,
        /// Its kind.
        kind: ElementKind,
        /// Its effect.
        effect: EffectTag,
    },
    /// An old fiber was queued for deletion.
    DeletionQueued {
        /// The obsolete fiber.
        fiber: FiberId,
        /// Its kind.
        kind: ElementKind,
    },
    /// The scheduler returned control to the host.
    Yielded {
        /// Units processed in the slice.
        units: usize,
    },
    /// Commit started.
    CommitStart {
        /// Size of the deletion list.
        deletions: usize,
    },
    /// Commit finished.
    CommitEnd {
        /// What was applied.
        summary: CommitSummary,
    },
}

/// Observer of reconciliation.
///
/// All methods have default empty implementations, so implementations only
/// override the events they are interested in.
pub trait Tracer: Send + Sync + 'static {
    /// Called when `render` creates a work-in-progress root.
    #[inline]
    fn on_render_requested(&self, _root: FiberId) {}

    /// Called before a unit of work.
    #[inline]
    fn on_unit_start(&self, _fiber: FiberId, _kind: ElementKind) {}

    /// Called after a unit of work.
    #[inline]
    fn on_unit_end(&self, _fiber: FiberId) {}

    /// Called for every fiber the reconciler creates.
    #[inline]
    fn on_fiber_created(&self, _fiber: FiberId, _kind: ElementKind, _effect: EffectTag) {}

    /// Called when an old fiber is queued for deletion.
    #[inline]
    fn on_deletion_queued(&self, _fiber: FiberId, _kind: ElementKind) {}

    /// Called when a slice ends with work remaining.
    #[inline]
    fn on_yield(&self, _units: usize) {}

    /// Called before the commit pass.
    #[inline]
    fn on_commit_start(&self, _deletions: usize) {}

    /// Called after a successful commit pass.
    #[inline]
    fn on_commit_end(&self, _summary: &CommitSummary) {}
}

/// Zero-cost tracer that discards all events.
///
/// This is the default tracer of [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

impl<T: Tracer + ?Sized> Tracer for Arc<T> {
    fn on_render_requested(&self, root: FiberId) {
        (**self).on_render_requested(root)
    }

    fn on_unit_start(&self, fiber: FiberId, kind: ElementKind) {
        (**self).on_unit_start(fiber, kind)
    }

    fn on_unit_end(&self, fiber: FiberId) {
        (**self).on_unit_end(fiber)
    }

    fn on_fiber_created(&self, fiber: FiberId, kind: ElementKind, effect: EffectTag) {
        (**self).on_fiber_created(fiber, kind, effect)
    }

    fn on_deletion_queued(&self, fiber: FiberId, kind: ElementKind) {
        (**self).on_deletion_queued(fiber, kind)
    }

    fn on_yield(&self, units: usize) {
        (**self).on_yield(units)
    }

    fn on_commit_start(&self, deletions: usize) {
        (**self).on_commit_start(deletions)
    }

    fn on_commit_end(&self, summary: &CommitSummary) {
        (**self).on_commit_end(summary)
    }
}
