#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[cfg(feature = "collector")]
mod collector;
mod commit;
mod element;
mod error;
mod fiber;
mod host;
mod reconcile;
mod scheduler;
mod target;
pub mod tracer;

#[cfg(feature = "collector")]
pub use collector::EventCollector;
pub use commit::CommitSummary;
pub use element::{
    create_element, event_name, Callback, Child, Element, ElementKind, Prop, PropInput,
    PropValue, Properties, CHILDREN, EVENT_PREFIX, NODE_VALUE,
};
pub use error::{ElementError, ReconcileError, TargetOp};
pub use fiber::{EffectTag, Fiber, FiberArena, FiberId};
pub use host::{
    FixedSliceHost, HostScheduler, IdleDeadline, InstantDeadline, TimedHost, Unbounded,
    UnitDeadline,
};
pub use scheduler::{Phase, PumpStatus, Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use target::{NodeId, RecordingTarget, RenderTarget, TargetCall};
pub use tracer::{NoopTracer, TraceEvent, Tracer};
