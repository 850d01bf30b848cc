//! Commit pass: applies queued effects to the render target.
//!
//! Runs in one uninterrupted pass. Deletions are applied first, then the new
//! tree is walked in pre-order from the root's child. A backend failure stops
//! the pass and leaves the target partially updated.

use tracing::{debug, warn};

use crate::element::{Prop, Properties};
use crate::error::{ReconcileError, TargetOp};
use crate::fiber::{EffectTag, FiberArena, FiberId};
use crate::target::RenderTarget;

/// What a commit applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitSummary {
    /// Fibers removed from the target.
    pub deleted: usize,
    /// Fibers inserted into the target.
    pub inserted: usize,
    /// Fibers whose properties were diffed.
    pub updated: usize,
    /// Backend property and event-binding calls issued.
    pub property_mutations: usize,
}

/// Apply `deletions`, then every effect of the tree rooted at `root`.
pub(crate) fn commit_root<R: RenderTarget>(
    arena: &mut FiberArena<R::Handle>,
    target: &mut R,
    root: FiberId,
    deletions: &[FiberId],
) -> Result<CommitSummary, ReconcileError> {
    let mut summary = CommitSummary::default();

    for &fiber in deletions {
        commit_deletion(arena, target, fiber)?;
        summary.deleted += 1;
    }

    let mut next = arena.node(root).child;
    while let Some(id) = next {
        match arena.node(id).effect {
            EffectTag::Insert => {
                commit_insert(arena, target, id, &mut summary)?;
                summary.inserted += 1;
            }
            EffectTag::Update => {
                if let Some(handle) = arena.node(id).handle.clone() {
                    let old = arena
                        .node(id)
                        .alternate
                        .map(|alt| arena.node(alt).properties.clone())
                        .unwrap_or_default();
                    summary.property_mutations +=
                        update_properties(target, &handle, &old, &arena.node(id).properties)?;
                }
                summary.updated += 1;
            }
            EffectTag::None | EffectTag::Delete => {}
        }
        next = arena.next_in_preorder(id, root);
    }

    debug!(
        deleted = summary.deleted,
        inserted = summary.inserted,
        updated = summary.updated,
        property_mutations = summary.property_mutations,
        "commit applied"
    );
    Ok(summary)
}

fn commit_deletion<R: RenderTarget>(
    arena: &FiberArena<R::Handle>,
    target: &mut R,
    fiber: FiberId,
) -> Result<(), ReconcileError> {
    let Some(parent) = arena.nearest_host_ancestor(fiber) else {
        warn!(?fiber, "deleted fiber has no ancestor with a handle");
        return Ok(());
    };
    for handle in arena.host_handles(fiber) {
        target
            .detach_child(parent, handle)
            .map_err(|e| ReconcileError::renderer(TargetOp::DetachChild, e))?;
    }
    Ok(())
}

fn commit_insert<R: RenderTarget>(
    arena: &mut FiberArena<R::Handle>,
    target: &mut R,
    id: FiberId,
    summary: &mut CommitSummary,
) -> Result<(), ReconcileError> {
    if !arena.node(id).kind.has_handle() {
        return Ok(());
    }
    let handle = match arena.node(id).handle.clone() {
        Some(handle) => handle,
        None => {
            let handle = target
                .create_handle(&arena.node(id).kind)
                .map_err(|e| ReconcileError::renderer(TargetOp::CreateHandle, e))?;
            arena.node_mut(id).handle = Some(handle.clone());
            handle
        }
    };
    let properties = &arena.node(id).properties;
    summary.property_mutations +=
        update_properties(target, &handle, &Properties::new(), properties)?;

    let Some(parent) = arena.nearest_host_ancestor(id) else {
        warn!(?id, "inserted fiber has no ancestor with a handle");
        return Ok(());
    };
    target
        .attach_child(parent, &handle)
        .map_err(|e| ReconcileError::renderer(TargetOp::AttachChild, e))
}

/// Bring `handle` from `old` to `new`, returning the number of backend calls.
///
/// Order: detach removed or changed bindings, reset vanished attributes, set new
/// or changed attributes, attach new or changed bindings. Unchanged entries are
/// not touched.
pub(crate) fn update_properties<R: RenderTarget>(
    target: &mut R,
    handle: &R::Handle,
    old: &Properties,
    new: &Properties,
) -> Result<usize, ReconcileError> {
    let mut calls = 0;

    for (name, prop) in old.iter() {
        if let Prop::Event { event, callback } = prop {
            if new.get(name) != Some(prop) {
                target
                    .remove_event_binding(handle, event, callback)
                    .map_err(|e| ReconcileError::renderer(TargetOp::RemoveEventBinding, e))?;
                calls += 1;
            }
        }
    }

    for (name, prop) in old.iter() {
        if let Prop::Attribute(_) = prop {
            if !matches!(new.get(name), Some(Prop::Attribute(_))) {
                target
                    .remove_property(handle, name)
                    .map_err(|e| ReconcileError::renderer(TargetOp::RemoveProperty, e))?;
                calls += 1;
            }
        }
    }

    for (name, prop) in new.iter() {
        if let Prop::Attribute(value) = prop {
            if old.get(name) != Some(prop) {
                target
                    .set_property(handle, name, value)
                    .map_err(|e| ReconcileError::renderer(TargetOp::SetProperty, e))?;
                calls += 1;
            }
        }
    }

    for (name, prop) in new.iter() {
        if let Prop::Event { event, callback } = prop {
            if old.get(name) != Some(prop) {
                target
                    .add_event_binding(handle, event, callback)
                    .map_err(|e| ReconcileError::renderer(TargetOp::AddEventBinding, e))?;
                calls += 1;
            }
        }
    }

    Ok(calls)
}
