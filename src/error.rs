//! Error types for element construction and reconciliation.

use std::sync::Arc;

use thiserror::Error;

/// Malformed element descriptions, reported synchronously at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementError {
    /// `children` is carried by the element itself and cannot be a property.
    #[error("`children` is a reserved property name")]
    ReservedName,

    /// A property was given an empty name.
    #[error("property name must not be empty")]
    EmptyName,

    /// A host element was given an empty tag.
    #[error("host element tag must not be empty")]
    EmptyKind,

    /// A callback was passed under a name that is not an event name.
    #[error("property `{name}` is not an event name but was given a callback")]
    CallbackOnAttribute {
        /// The offending property name.
        name: String,
    },

    /// A plain value was passed under an event name.
    #[error("property `{name}` is an event name but was given a plain value")]
    ValueOnEvent {
        /// The offending property name.
        name: String,
    },

    /// NaN and infinities have no stable textual form.
    #[error("property `{name}` holds a non-finite number")]
    NonFiniteNumber {
        /// The offending property name (or `nodeValue` for promoted children).
        name: String,
    },

    /// Text nodes are leaves.
    #[error("text elements cannot have children")]
    TextChildren,
}

/// Backend operation that failed, carried by [`ReconcileError::Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOp {
    /// `create_handle`
    CreateHandle,
    /// `attach_child`
    AttachChild,
    /// `detach_child`
    DetachChild,
    /// `set_property`
    SetProperty,
    /// `remove_property`
    RemoveProperty,
    /// `add_event_binding`
    AddEventBinding,
    /// `remove_event_binding`
    RemoveEventBinding,
}

impl std::fmt::Display for TargetOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetOp::CreateHandle => "create_handle",
            TargetOp::AttachChild => "attach_child",
            TargetOp::DetachChild => "detach_child",
            TargetOp::SetProperty => "set_property",
            TargetOp::RemoveProperty => "remove_property",
            TargetOp::AddEventBinding => "add_event_binding",
            TargetOp::RemoveEventBinding => "remove_event_binding",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the [`Reconciler`](crate::Reconciler).
///
/// Backend failures are wrapped as they come from the [`RenderTarget`](crate::RenderTarget);
/// they are reported once and never retried. A failure during commit leaves the
/// render target in an indeterminate state.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// `render` was called while a previous session was still being worked on.
    #[error("a render session is already in progress")]
    RenderInProgress,

    /// The render target rejected an operation.
    #[error("render target failed during {op}: {cause}")]
    Renderer {
        /// The failing backend operation.
        op: TargetOp,
        /// The backend's error.
        cause: Arc<anyhow::Error>,
    },

    /// The element tree could not be built.
    #[error(transparent)]
    Element(#[from] ElementError),
}

impl ReconcileError {
    pub(crate) fn renderer(op: TargetOp, source: anyhow::Error) -> Self {
        ReconcileError::Renderer {
            op,
            cause: Arc::new(source),
        }
    }

    /// Returns the failing backend operation if this is a renderer error.
    pub fn target_op(&self) -> Option<TargetOp> {
        match self {
            ReconcileError::Renderer { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Attempts to downcast the backend error to a specific type.
    pub fn downcast_ref<E: std::error::Error + Send + Sync + 'static>(&self) -> Option<&E> {
        match self {
            ReconcileError::Renderer { cause, .. } => cause.downcast_ref::<E>(),
            _ => None,
        }
    }
}
