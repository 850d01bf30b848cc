//! Fiber work units and the arena that owns them.
//!
//! Fibers form a first-child/next-sibling tree. Every link (`parent`, `child`,
//! `sibling`, `alternate`) is a [`FiberId`] into the [`FiberArena`], so the
//! current tree and the work-in-progress tree coexist without ownership cycles.

use std::sync::Arc;

use slab::Slab;

use crate::element::{Element, ElementKind, Properties};

/// Generation-checked reference to a fiber inside a [`FiberArena`].
///
/// Arena slots are reused once a tree is released; the generation makes an id
/// of a released fiber resolve to nothing instead of to the slot's new tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiberId {
    index: usize,
    generation: u64,
}

impl FiberId {
    /// Slot index inside the arena. Slots are reused once a tree is released.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Allocation counter value the id was issued with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[cfg(test)]
    pub(crate) fn from_raw(index: usize) -> Self {
        Self {
            index,
            generation: 0,
        }
    }
}

/// Pending mutation of a fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EffectTag {
    /// Nothing to apply (the session root).
    #[default]
    None,
    /// New node; created, filled and attached at commit.
    Insert,
    /// Existing node; its properties are diffed against the alternate.
    Update,
    /// Obsolete node from the previous tree; detached at commit.
    Delete,
}

/// One unit of work mirroring a tree position.
#[derive(Debug)]
pub struct Fiber<H> {
    pub(crate) kind: ElementKind,
    pub(crate) properties: Properties,
    pub(crate) children: Arc<Vec<Element>>,
    pub(crate) handle: Option<H>,
    pub(crate) parent: Option<FiberId>,
    pub(crate) child: Option<FiberId>,
    pub(crate) sibling: Option<FiberId>,
    pub(crate) alternate: Option<FiberId>,
    pub(crate) effect: EffectTag,
}

impl<H> Fiber<H> {
    /// Container fiber of a session, bound to the caller's root handle.
    pub(crate) fn root(handle: H, element: Element, alternate: Option<FiberId>) -> Self {
        Self {
            kind: ElementKind::Root,
            properties: Properties::new(),
            children: Arc::new(vec![element]),
            handle: Some(handle),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            effect: EffectTag::None,
        }
    }

    /// Fiber for `element` with no handle and no links besides `parent`.
    pub(crate) fn from_element(element: &Element, parent: FiberId, effect: EffectTag) -> Self {
        Self {
            kind: element.kind().clone(),
            properties: element.properties().clone(),
            children: element.shared_children(),
            handle: None,
            parent: Some(parent),
            child: None,
            sibling: None,
            alternate: None,
            effect,
        }
    }

    /// The node type.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Properties to be applied at commit.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Element children that this fiber's unit of work reconciles.
    pub fn pending_children(&self) -> &[Element] {
        &self.children
    }

    /// Render-target handle, if created.
    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    /// Parent fiber; `None` only for session roots.
    pub fn parent(&self) -> Option<FiberId> {
        self.parent
    }

    /// First child.
    pub fn child(&self) -> Option<FiberId> {
        self.child
    }

    /// Next sibling.
    pub fn sibling(&self) -> Option<FiberId> {
        self.sibling
    }

    /// Counterpart in the previously committed tree.
    pub fn alternate(&self) -> Option<FiberId> {
        self.alternate
    }

    /// Pending mutation.
    pub fn effect(&self) -> EffectTag {
        self.effect
    }
}

#[derive(Debug)]
struct Slot<H> {
    generation: u64,
    fiber: Fiber<H>,
}

/// Slab-backed storage for every live fiber of both trees.
///
/// Every public lookup is checked: an id whose fiber was released yields
/// `None` or an empty result.
#[derive(Debug)]
pub struct FiberArena<H> {
    fibers: Slab<Slot<H>>,
    next_generation: u64,
}

impl<H> Default for FiberArena<H> {
    fn default() -> Self {
        Self {
            fibers: Slab::new(),
            next_generation: 0,
        }
    }
}

impl<H> FiberArena<H> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, fiber: Fiber<H>) -> FiberId {
        let generation = self.next_generation;
        self.next_generation += 1;
        let index = self.fibers.insert(Slot { generation, fiber });
        FiberId { index, generation }
    }

    /// Get a live fiber by id.
    pub fn get(&self, id: FiberId) -> Option<&Fiber<H>> {
        self.fibers
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .map(|slot| &slot.fiber)
    }

    pub(crate) fn get_mut(&mut self, id: FiberId) -> Option<&mut Fiber<H>> {
        self.fibers
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .map(|slot| &mut slot.fiber)
    }

    /// Fiber the reconciler itself allocated and still owns.
    pub(crate) fn node(&self, id: FiberId) -> &Fiber<H> {
        let slot = &self.fibers[id.index];
        debug_assert_eq!(slot.generation, id.generation, "stale fiber id");
        &slot.fiber
    }

    pub(crate) fn node_mut(&mut self, id: FiberId) -> &mut Fiber<H> {
        let slot = &mut self.fibers[id.index];
        debug_assert_eq!(slot.generation, id.generation, "stale fiber id");
        &mut slot.fiber
    }

    /// Whether `id` refers to a live fiber.
    pub fn contains(&self, id: FiberId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live fibers across both trees.
    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    /// Returns true if no fibers are allocated.
    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Child chain of `id`, in sibling order.
    pub fn children(&self, id: FiberId) -> Vec<FiberId> {
        let mut out = Vec::new();
        let mut next = self.get(id).and_then(|f| f.child);
        while let Some(child) = next {
            out.push(child);
            next = self.get(child).and_then(|f| f.sibling);
        }
        out
    }

    /// Pre-order successor of `id` within the subtree rooted at `root`.
    ///
    /// Prefers the first child; otherwise walks up through siblings and then
    /// parents' siblings, stopping at `root`.
    pub fn next_in_preorder(&self, id: FiberId, root: FiberId) -> Option<FiberId> {
        let fiber = self.get(id)?;
        if let Some(child) = fiber.child {
            return Some(child);
        }
        let mut cursor = id;
        while cursor != root {
            let fiber = self.get(cursor)?;
            if let Some(sibling) = fiber.sibling {
                return Some(sibling);
            }
            cursor = fiber.parent?;
        }
        None
    }

    /// All fibers of the subtree rooted at `root`, in pre-order. Empty when
    /// `root` is not live.
    pub fn subtree(&self, root: FiberId) -> Vec<FiberId> {
        if !self.contains(root) {
            return Vec::new();
        }
        let mut out = vec![root];
        let mut next = self.next_in_preorder(root, root);
        while let Some(id) = next {
            out.push(id);
            next = self.next_in_preorder(id, root);
        }
        out
    }

    /// Handle of the nearest strict ancestor of `id` that owns one.
    pub fn nearest_host_ancestor(&self, id: FiberId) -> Option<&H> {
        let mut cursor = self.get(id)?.parent;
        while let Some(parent) = cursor {
            let fiber = self.get(parent)?;
            if let Some(handle) = fiber.handle.as_ref() {
                return Some(handle);
            }
            cursor = fiber.parent;
        }
        None
    }

    /// Topmost handles inside the subtree of `id`: its own handle, or the
    /// nearest handle-owning descendants when `id` is a pass-through fiber.
    pub fn host_handles(&self, id: FiberId) -> Vec<&H> {
        let Some(fiber) = self.get(id) else {
            return Vec::new();
        };
        if let Some(handle) = fiber.handle.as_ref() {
            return vec![handle];
        }
        self.children(id)
            .into_iter()
            .flat_map(|child| self.host_handles(child))
            .collect()
    }

    /// Free every fiber of the subtree rooted at `root`.
    pub(crate) fn release_tree(&mut self, root: FiberId) {
        for id in self.subtree(root) {
            self.fibers.remove(id.index);
        }
    }

    /// Drop the links into the previous tree once it has been released.
    pub(crate) fn clear_alternates(&mut self, root: FiberId) {
        for id in self.subtree(root) {
            if let Some(fiber) = self.get_mut(id) {
                fiber.alternate = None;
            }
        }
    }
}
