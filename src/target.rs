//! Render target backends.
//!
//! The reconciler never assumes a concrete surface. Anything implementing
//! [`RenderTarget`] can be driven: a DOM bridge, a terminal UI or the
//! [`RecordingTarget`] test double shipped here.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use anyhow::{anyhow, bail};
use slab::Slab;

use crate::element::{Callback, ElementKind, PropValue, NODE_VALUE};
use crate::error::TargetOp;

/// Capability set of a live render surface.
///
/// Each call is reported as an `anyhow::Result`; failures are propagated to the
/// caller of the reconciler wrapped in
/// [`ReconcileError::Renderer`](crate::ReconcileError::Renderer).
pub trait RenderTarget {
    /// Opaque reference to a live node.
    type Handle: Clone + PartialEq + fmt::Debug;

    /// Create a detached node for `kind`.
    fn create_handle(&mut self, kind: &ElementKind) -> anyhow::Result<Self::Handle>;

    /// Append `child` as the last child of `parent`.
    fn attach_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> anyhow::Result<()>;

    /// Remove `child` from `parent`.
    fn detach_child(&mut self, parent: &Self::Handle, child: &Self::Handle) -> anyhow::Result<()>;

    /// Assign a plain property.
    fn set_property(
        &mut self,
        handle: &Self::Handle,
        name: &str,
        value: &PropValue,
    ) -> anyhow::Result<()>;

    /// Reset a plain property to the backend's default.
    fn remove_property(&mut self, handle: &Self::Handle, name: &str) -> anyhow::Result<()>;

    /// Attach `callback` to `event`.
    fn add_event_binding(
        &mut self,
        handle: &Self::Handle,
        event: &str,
        callback: &Callback,
    ) -> anyhow::Result<()>;

    /// Detach a previously attached `callback` from `event`.
    fn remove_event_binding(
        &mut self,
        handle: &Self::Handle,
        event: &str,
        callback: &Callback,
    ) -> anyhow::Result<()>;
}

/// Handle of a node inside a [`RecordingTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// One backend call, as recorded by [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq)]
pub enum TargetCall {
    /// `create_handle`
    Create {
        /// The new node.
        node: NodeId,
        /// Its kind.
        kind: ElementKind,
    },
    /// `attach_child`
    Attach {
        /// Parent node.
        parent: NodeId,
        /// Attached node.
        child: NodeId,
    },
    /// `detach_child`
    Detach {
        /// Parent node.
        parent: NodeId,
        /// Detached node.
        child: NodeId,
    },
    /// `set_property`
    SetProperty {
        /// Target node.
        node: NodeId,
        /// Property name.
        name: String,
        /// Assigned value.
        value: PropValue,
    },
    /// `remove_property`
    RemoveProperty {
        /// Target node.
        node: NodeId,
        /// Property name.
        name: String,
    },
    /// `add_event_binding`
    AddEventBinding {
        /// Target node.
        node: NodeId,
        /// Event name.
        event: String,
    },
    /// `remove_event_binding`
    RemoveEventBinding {
        /// Target node.
        node: NodeId,
        /// Event name.
        event: String,
    },
}

impl TargetCall {
    /// The backend operation this call corresponds to.
    pub fn op(&self) -> TargetOp {
        match self {
            TargetCall::Create { .. } => TargetOp::CreateHandle,
            TargetCall::Attach { .. } => TargetOp::AttachChild,
            TargetCall::Detach { .. } => TargetOp::DetachChild,
            TargetCall::SetProperty { .. } => TargetOp::SetProperty,
            TargetCall::RemoveProperty { .. } => TargetOp::RemoveProperty,
            TargetCall::AddEventBinding { .. } => TargetOp::AddEventBinding,
            TargetCall::RemoveEventBinding { .. } => TargetOp::RemoveEventBinding,
        }
    }
}

#[derive(Debug)]
struct Node {
    kind: ElementKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, PropValue>,
    bindings: Vec<(String, Callback)>,
}

impl Node {
    fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
            attributes: BTreeMap::new(),
            bindings: Vec::new(),
        }
    }
}

/// In-memory render target that keeps a live node table and logs every call.
///
/// Used as the backend in tests: the log exposes the exact mutation order, and
/// [`RecordingTarget::markup`] renders the live tree for structural comparison.
/// [`RecordingTarget::fail_on`] makes the next call of one operation fail.
#[derive(Debug)]
pub struct RecordingTarget {
    nodes: Slab<Node>,
    root: NodeId,
    calls: Vec<TargetCall>,
    fail_on: Option<TargetOp>,
}

impl Default for RecordingTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTarget {
    /// Create a target with a single container node.
    pub fn new() -> Self {
        let mut nodes = Slab::new();
        let root = NodeId(nodes.insert(Node::new(ElementKind::Host("root".to_string()))));
        Self {
            nodes,
            root,
            calls: Vec::new(),
            fail_on: None,
        }
    }

    /// The container node to render into.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> &[TargetCall] {
        &self.calls
    }

    /// Take the recorded calls, clearing the log.
    pub fn take_calls(&mut self) -> Vec<TargetCall> {
        std::mem::take(&mut self.calls)
    }

    /// Make the next call of `op` fail.
    pub fn fail_on(&mut self, op: TargetOp) {
        self.fail_on = Some(op);
    }

    /// Children of `node` in order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// Attribute `name` of `node`.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&PropValue> {
        self.nodes.get(node.0)?.attributes.get(name)
    }

    /// Callbacks bound to `event` on `node`, in binding order.
    pub fn bindings(&self, node: NodeId, event: &str) -> Vec<Callback> {
        self.nodes
            .get(node.0)
            .map(|n| {
                n.bindings
                    .iter()
                    .filter(|(e, _)| e == event)
                    .map(|(_, cb)| cb.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render the subtree under `node` (excluding `node` itself) as markup.
    ///
    /// Attributes are printed in name order, bindings as `on:<event>`, text
    /// nodes as their content.
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        if node.kind == ElementKind::Text {
            if let Some(value) = node.attributes.get(NODE_VALUE) {
                let _ = write!(out, "{value}");
            }
            return;
        }
        let _ = write!(out, "<{}", node.kind);
        for (name, value) in &node.attributes {
            let _ = write!(out, " {name}=\"{value}\"");
        }
        for (event, _) in &node.bindings {
            let _ = write!(out, " on:{event}");
        }
        out.push('>');
        for child in &node.children {
            self.write_node(*child, out);
        }
        let _ = write!(out, "</{}>", node.kind);
    }

    fn check(&mut self, op: TargetOp) -> anyhow::Result<()> {
        if self.fail_on == Some(op) {
            self.fail_on = None;
            bail!("injected {op} failure");
        }
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> anyhow::Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .ok_or_else(|| anyhow!("unknown node {}", id.0))
    }
}

impl RenderTarget for RecordingTarget {
    type Handle = NodeId;

    fn create_handle(&mut self, kind: &ElementKind) -> anyhow::Result<NodeId> {
        self.check(TargetOp::CreateHandle)?;
        if !kind.has_handle() || *kind == ElementKind::Root {
            bail!("{kind} has no backend node");
        }
        let node = NodeId(self.nodes.insert(Node::new(kind.clone())));
        self.calls.push(TargetCall::Create {
            node,
            kind: kind.clone(),
        });
        Ok(node)
    }

    fn attach_child(&mut self, parent: &NodeId, child: &NodeId) -> anyhow::Result<()> {
        self.check(TargetOp::AttachChild)?;
        if self.node_mut(*child)?.parent.is_some() {
            bail!("node {} is already attached", child.0);
        }
        self.node_mut(*parent)?.children.push(*child);
        self.node_mut(*child)?.parent = Some(*parent);
        self.calls.push(TargetCall::Attach {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn detach_child(&mut self, parent: &NodeId, child: &NodeId) -> anyhow::Result<()> {
        self.check(TargetOp::DetachChild)?;
        let siblings = &mut self.node_mut(*parent)?.children;
        let Some(position) = siblings.iter().position(|c| c == child) else {
            bail!("node {} is not a child of {}", child.0, parent.0);
        };
        siblings.remove(position);
        self.node_mut(*child)?.parent = None;
        self.calls.push(TargetCall::Detach {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn set_property(
        &mut self,
        handle: &NodeId,
        name: &str,
        value: &PropValue,
    ) -> anyhow::Result<()> {
        self.check(TargetOp::SetProperty)?;
        self.node_mut(*handle)?
            .attributes
            .insert(name.to_string(), value.clone());
        self.calls.push(TargetCall::SetProperty {
            node: *handle,
            name: name.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn remove_property(&mut self, handle: &NodeId, name: &str) -> anyhow::Result<()> {
        self.check(TargetOp::RemoveProperty)?;
        self.node_mut(*handle)?.attributes.remove(name);
        self.calls.push(TargetCall::RemoveProperty {
            node: *handle,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_event_binding(
        &mut self,
        handle: &NodeId,
        event: &str,
        callback: &Callback,
    ) -> anyhow::Result<()> {
        self.check(TargetOp::AddEventBinding)?;
        self.node_mut(*handle)?
            .bindings
            .push((event.to_string(), callback.clone()));
        self.calls.push(TargetCall::AddEventBinding {
            node: *handle,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_event_binding(
        &mut self,
        handle: &NodeId,
        event: &str,
        callback: &Callback,
    ) -> anyhow::Result<()> {
        self.check(TargetOp::RemoveEventBinding)?;
        let bindings = &mut self.node_mut(*handle)?.bindings;
        let Some(position) = bindings
            .iter()
            .position(|(e, cb)| e == event && cb == callback)
        else {
            bail!("no `{event}` binding with this callback on node {}", handle.0);
        };
        bindings.remove(position);
        self.calls.push(TargetCall::RemoveEventBinding {
            node: *handle,
            event: event.to_string(),
        });
        Ok(())
    }
}
