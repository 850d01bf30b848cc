//! Reconciler runtime: render sessions, the cooperative work loop and commit.

use std::time::Duration;

use tracing::{debug, trace};

use crate::commit::{commit_root, CommitSummary};
use crate::element::{validate_kind, Element};
use crate::error::{ReconcileError, TargetOp};
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId};
use crate::host::{HostScheduler, IdleDeadline, Unbounded};
use crate::reconcile::reconcile_children;
use crate::target::RenderTarget;
use crate::tracer::{NoopTracer, Tracer};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No session in flight.
    #[default]
    Idle,
    /// A work-in-progress tree is being built.
    Working,
    /// Effects are being applied.
    Committing,
}

/// Outcome of a [`Reconciler::pump`] or [`Reconciler::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    /// There was no session to work on.
    Idle,
    /// Work remains; resume with another slice.
    Yielded,
    /// The session finished and was committed.
    Committed(CommitSummary),
}

/// Tuning knobs of a [`Reconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Yield once the slice has less than this much time left.
    pub yield_threshold: Duration,
    /// Yield after this many units in one slice regardless of time.
    pub max_units_per_slice: Option<usize>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            yield_threshold: Duration::from_millis(1),
            max_units_per_slice: None,
        }
    }
}

impl ReconcilerConfig {
    fn should_yield<D: IdleDeadline + ?Sized>(&self, deadline: &D, processed: usize) -> bool {
        if self
            .max_units_per_slice
            .is_some_and(|max| processed >= max)
        {
            return true;
        }
        deadline.time_remaining() < self.yield_threshold
    }
}

/// State of one render request, from `render` to commit.
#[derive(Debug)]
struct RenderSession {
    root: FiberId,
    next_unit: Option<FiberId>,
    deletions: Vec<FiberId>,
}

/// Incremental tree reconciler bound to one render target.
///
/// Exactly one fiber tree is current and at most one session is in flight.
///
/// # Example
///
/// ```ignore
/// let mut target = RecordingTarget::new();
/// let root = target.root();
/// let mut reconciler = Reconciler::new(target);
///
/// reconciler.render(Element::host("div").child("hello")?, root)?;
/// let slice = Duration::from_millis(5);
/// while reconciler.pump(&InstantDeadline::after(slice))? == PumpStatus::Yielded {
///     // hand control back to the host
/// }
/// ```
pub struct Reconciler<R: RenderTarget, T: Tracer = NoopTracer> {
    arena: FiberArena<R::Handle>,
    current_root: Option<FiberId>,
    session: Option<RenderSession>,
    phase: Phase,
    target: R,
    config: ReconcilerConfig,
    tracer: T,
}

impl<R: RenderTarget> Reconciler<R> {
    /// Create a reconciler with default settings.
    pub fn new(target: R) -> Self {
        ReconcilerBuilder::new().build(target)
    }
}

impl<R: RenderTarget, T: Tracer> Reconciler<R, T> {
    /// Start a new session rendering `element` into `root`.
    ///
    /// The previous committed tree becomes the diff baseline when it was
    /// rendered into the same root handle. Otherwise its top-level nodes are
    /// queued for deletion, so the old root is emptied at commit.
    ///
    /// # Errors
    ///
    /// `ReconcileError::RenderInProgress` if a session has not committed yet,
    /// `ReconcileError::Element` if `element` is a host element with an empty
    /// tag.
    pub fn render(&mut self, element: Element, root: R::Handle) -> Result<(), ReconcileError> {
        if self.session.is_some() {
            return Err(ReconcileError::RenderInProgress);
        }
        validate_kind(element.kind())?;

        let alternate = self
            .current_root
            .filter(|id| self.arena.node(*id).handle.as_ref() == Some(&root));
        let moved_from = self.current_root.filter(|_| alternate.is_none());
        let deletions = moved_from
            .map(|previous| self.arena.children(previous))
            .unwrap_or_default();

        let wip = self.arena.insert(Fiber::root(root, element, alternate));
        self.phase = Phase::Working;
        debug!(
            root = ?wip,
            has_alternate = alternate.is_some(),
            detached = deletions.len(),
            "render session started"
        );
        self.tracer.on_render_requested(wip);
        for &id in &deletions {
            let fiber = self.arena.node_mut(id);
            fiber.effect = EffectTag::Delete;
            self.tracer.on_deletion_queued(id, fiber.kind.clone());
        }
        self.session = Some(RenderSession {
            root: wip,
            next_unit: Some(wip),
            deletions,
        });
        Ok(())
    }

    /// Process units of work until the deadline asks to yield or the tree is
    /// complete; a complete tree is committed before returning.
    ///
    /// The deadline is consulted after each unit, so every call makes progress.
    /// A failed unit is retried by the next call.
    pub fn pump<D: IdleDeadline + ?Sized>(
        &mut self,
        deadline: &D,
    ) -> Result<PumpStatus, ReconcileError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(PumpStatus::Idle);
        };

        let mut processed = 0;
        while let Some(unit) = session.next_unit {
            session.next_unit = match perform_unit_of_work(
                &mut self.arena,
                &mut self.target,
                &self.tracer,
                session.root,
                unit,
                &mut session.deletions,
            ) {
                Ok(next) => next,
                Err(err) => {
                    debug!(?unit, error = %err, "unit of work failed; will retry on next pump");
                    return Err(err);
                }
            };
            processed += 1;
            if session.next_unit.is_some() && self.config.should_yield(deadline, processed) {
                break;
            }
        }

        if session.next_unit.is_some() {
            trace!(units = processed, "yielding to host");
            self.tracer.on_yield(processed);
            return Ok(PumpStatus::Yielded);
        }

        self.commit().map(PumpStatus::Committed)
    }

    /// Pump slices from `host` until the session commits or the host stops
    /// granting slices. Starvation is not an error: the status is `Yielded`.
    pub fn run<H: HostScheduler>(&mut self, host: &mut H) -> Result<PumpStatus, ReconcileError> {
        loop {
            if self.session.is_none() {
                return Ok(PumpStatus::Idle);
            }
            let Some(deadline) = host.request_work_slice() else {
                debug!("host stopped granting slices");
                return Ok(PumpStatus::Yielded);
            };
            match self.pump(&deadline)? {
                PumpStatus::Yielded => continue,
                status => return Ok(status),
            }
        }
    }

    /// Finish the current session in one go.
    pub fn flush_sync(&mut self) -> Result<PumpStatus, ReconcileError> {
        self.pump(&Unbounded)
    }

    fn commit(&mut self) -> Result<CommitSummary, ReconcileError> {
        let Some(session) = self.session.take() else {
            return Ok(CommitSummary::default());
        };
        self.phase = Phase::Committing;
        self.tracer.on_commit_start(session.deletions.len());

        let result = commit_root(
            &mut self.arena,
            &mut self.target,
            session.root,
            &session.deletions,
        );
        self.phase = Phase::Idle;

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                debug!(error = %err, "commit failed; discarding session");
                self.arena.release_tree(session.root);
                return Err(err);
            }
        };

        if let Some(previous) = self.current_root.replace(session.root) {
            self.arena.release_tree(previous);
        }
        self.arena.clear_alternates(session.root);
        self.tracer.on_commit_end(&summary);
        Ok(summary)
    }

    /// Current scheduler state.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Root of the last committed tree.
    pub fn current_root(&self) -> Option<FiberId> {
        self.current_root
    }

    /// Root of the tree being built, if a session is in flight.
    pub fn work_in_progress_root(&self) -> Option<FiberId> {
        self.session.as_ref().map(|s| s.root)
    }

    /// Next fiber the scheduler will process.
    pub fn next_unit(&self) -> Option<FiberId> {
        self.session.as_ref().and_then(|s| s.next_unit)
    }

    /// Deletion list of the session in flight.
    pub fn deletions(&self) -> &[FiberId] {
        self.session
            .as_ref()
            .map(|s| s.deletions.as_slice())
            .unwrap_or_default()
    }

    /// Get a fiber of either tree.
    pub fn fiber(&self, id: FiberId) -> Option<&Fiber<R::Handle>> {
        self.arena.get(id)
    }

    /// The fiber arena.
    pub fn arena(&self) -> &FiberArena<R::Handle> {
        &self.arena
    }

    /// The render target.
    pub fn target(&self) -> &R {
        &self.target
    }

    /// The render target, mutably.
    pub fn target_mut(&mut self) -> &mut R {
        &mut self.target
    }

    /// Consume the reconciler, returning the render target.
    pub fn into_target(self) -> R {
        self.target
    }

    /// The tracer.
    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// The active configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Process one fiber: ensure its handle, reconcile its children and return the
/// pre-order successor within the session tree.
fn perform_unit_of_work<R: RenderTarget, T: Tracer>(
    arena: &mut FiberArena<R::Handle>,
    target: &mut R,
    tracer: &T,
    root: FiberId,
    unit: FiberId,
    deletions: &mut Vec<FiberId>,
) -> Result<Option<FiberId>, ReconcileError> {
    tracer.on_unit_start(unit, arena.node(unit).kind.clone());

    if arena.node(unit).handle.is_none() && arena.node(unit).kind.has_handle() {
        let handle = target
            .create_handle(&arena.node(unit).kind)
            .map_err(|e| ReconcileError::renderer(TargetOp::CreateHandle, e))?;
        arena.node_mut(unit).handle = Some(handle);
    }

    let children = arena.node(unit).children.clone();
    reconcile_children(arena, unit, &children, deletions, tracer);

    tracer.on_unit_end(unit);
    Ok(arena.next_in_preorder(unit, root))
}

/// Builder for [`Reconciler`].
///
/// # Example
///
/// ```ignore
/// let reconciler = ReconcilerBuilder::new()
///     .yield_threshold(Duration::from_micros(500))
///     .max_units_per_slice(64)
///     .build(RecordingTarget::new());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReconcilerBuilder<T = NoopTracer> {
    config: ReconcilerConfig,
    tracer: T,
}

impl ReconcilerBuilder {
    /// Builder with default settings and no tracer.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Tracer> ReconcilerBuilder<T> {
    /// Yield once a slice has less than `threshold` left.
    pub fn yield_threshold(mut self, threshold: Duration) -> Self {
        self.config.yield_threshold = threshold;
        self
    }

    /// Cap the number of units processed per slice.
    pub fn max_units_per_slice(mut self, units: usize) -> Self {
        self.config.max_units_per_slice = Some(units);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Observe reconciliation with `tracer`.
    pub fn tracer<U: Tracer>(self, tracer: U) -> ReconcilerBuilder<U> {
        ReconcilerBuilder {
            config: self.config,
            tracer,
        }
    }

    /// Build the reconciler for `target`.
    pub fn build<R: RenderTarget>(self, target: R) -> Reconciler<R, T> {
        Reconciler {
            arena: FiberArena::new(),
            current_root: None,
            session: None,
            phase: Phase::Idle,
            target,
            config: self.config,
            tracer: self.tracer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::UnitDeadline;
    use crate::target::RecordingTarget;

    #[test]
    fn test_state_machine() {
        let target = RecordingTarget::new();
        let root = target.root();
        let mut reconciler = Reconciler::new(target);
        assert_eq!(reconciler.phase(), Phase::Idle);
        assert_eq!(reconciler.flush_sync().unwrap(), PumpStatus::Idle);

        reconciler
            .render(Element::host("div").child("hi").unwrap(), root)
            .unwrap();
        assert_eq!(reconciler.phase(), Phase::Working);
        assert_eq!(reconciler.next_unit(), reconciler.work_in_progress_root());

        assert_eq!(
            reconciler.pump(&UnitDeadline::new(1)).unwrap(),
            PumpStatus::Yielded
        );
        assert_eq!(reconciler.phase(), Phase::Working);

        let status = reconciler.flush_sync().unwrap();
        assert!(matches!(status, PumpStatus::Committed(_)));
        assert_eq!(reconciler.phase(), Phase::Idle);
        assert!(reconciler.work_in_progress_root().is_none());
        assert!(reconciler.current_root().is_some());
    }

    #[test]
    fn test_render_in_progress_is_rejected() {
        let target = RecordingTarget::new();
        let root = target.root();
        let mut reconciler = Reconciler::new(target);
        reconciler.render(Element::host("a"), root).unwrap();
        let wip = reconciler.work_in_progress_root();

        let err = reconciler.render(Element::host("b"), root).unwrap_err();
        assert!(matches!(err, ReconcileError::RenderInProgress));
        assert_eq!(reconciler.work_in_progress_root(), wip);
    }

    #[test]
    fn test_max_units_per_slice() {
        let target = RecordingTarget::new();
        let root = target.root();
        let mut reconciler = ReconcilerBuilder::new()
            .max_units_per_slice(2)
            .build(target);
        let element = Element::host("ul")
            .with_children([Element::host("li"), Element::host("li"), Element::host("li")])
            .unwrap();
        reconciler.render(element, root).unwrap();

        // root, ul, li, li, li
        assert_eq!(reconciler.flush_sync().unwrap(), PumpStatus::Yielded);
        assert_eq!(reconciler.flush_sync().unwrap(), PumpStatus::Yielded);
        assert!(matches!(
            reconciler.flush_sync().unwrap(),
            PumpStatus::Committed(_)
        ));
    }

    #[test]
    fn test_previous_tree_is_released() {
        let target = RecordingTarget::new();
        let root = target.root();
        let mut reconciler = Reconciler::new(target);
        let element = Element::host("p").child("x").unwrap();

        reconciler.render(element.clone(), root).unwrap();
        reconciler.flush_sync().unwrap();
        // root, p, text
        assert_eq!(reconciler.arena().len(), 3);

        reconciler.render(element, root).unwrap();
        reconciler.flush_sync().unwrap();
        assert_eq!(reconciler.arena().len(), 3);

        let current = reconciler.current_root().unwrap();
        assert!(reconciler
            .arena()
            .subtree(current)
            .into_iter()
            .all(|id| reconciler.fiber(id).unwrap().alternate().is_none()));
    }
}
