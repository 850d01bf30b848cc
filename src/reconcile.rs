//! Positional child reconciliation.
//!
//! New element children are matched against the previous fiber chain by
//! position only. Reordering a list therefore shows up as delete + insert
//! pairs rather than moves.

use crate::element::Element;
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId};
use crate::tracer::Tracer;

/// Build the new child chain of `parent` from `elements`.
///
/// The old chain starts at `parent.alternate.child`. Matching kinds become
/// [`EffectTag::Update`] fibers reusing the old handle, unmatched new elements
/// become [`EffectTag::Insert`] fibers and unmatched old fibers are tagged
/// [`EffectTag::Delete`] and pushed onto `deletions`.
pub(crate) fn reconcile_children<H: Clone, T: Tracer + ?Sized>(
    arena: &mut FiberArena<H>,
    parent: FiberId,
    elements: &[Element],
    deletions: &mut Vec<FiberId>,
    tracer: &T,
) {
    let mut old = arena.node(parent).alternate.and_then(|alt| arena.node(alt).child);
    let mut previous: Option<FiberId> = None;
    let mut index = 0;
    arena.node_mut(parent).child = None;

    while index < elements.len() || old.is_some() {
        let element = elements.get(index);
        let same_kind = match (element, old) {
            (Some(element), Some(old)) => arena.node(old).kind == *element.kind(),
            _ => false,
        };

        let created = match (element, old) {
            (Some(element), Some(old)) if same_kind => {
                let mut fiber = Fiber::from_element(element, parent, EffectTag::Update);
                fiber.handle = arena.node(old).handle.clone();
                fiber.alternate = Some(old);
                Some(arena.insert(fiber))
            }
            (Some(element), _) => {
                Some(arena.insert(Fiber::from_element(element, parent, EffectTag::Insert)))
            }
            (None, _) => None,
        };

        if let Some(old) = old.filter(|_| !same_kind) {
            arena.node_mut(old).effect = EffectTag::Delete;
            deletions.push(old);
            tracer.on_deletion_queued(old, arena.node(old).kind.clone());
        }

        if let Some(id) = created {
            match previous {
                None => arena.node_mut(parent).child = Some(id),
                Some(previous) => arena.node_mut(previous).sibling = Some(id),
            }
            previous = Some(id);
            tracer.on_fiber_created(id, arena.node(id).kind.clone(), arena.node(id).effect);
        }

        old = old.and_then(|old| arena.node(old).sibling);
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::NoopTracer;

    fn effects(arena: &FiberArena<u32>, parent: FiberId) -> Vec<EffectTag> {
        arena
            .children(parent)
            .into_iter()
            .map(|id| arena.node(id).effect)
            .collect()
    }

    /// Commit-like setup: an old parent with children, and a new parent whose
    /// alternate is the old one.
    fn with_old_children(kinds: &[&str]) -> (FiberArena<u32>, FiberId, Vec<FiberId>) {
        let mut arena = FiberArena::new();
        let old_parent = arena.insert(Fiber::root(0, Element::fragment(), None));
        let elements: Vec<Element> = kinds.iter().map(|k| Element::host(*k)).collect();
        let mut deletions = Vec::new();
        reconcile_children(&mut arena, old_parent, &elements, &mut deletions, &NoopTracer);
        for (n, id) in arena.children(old_parent).into_iter().enumerate() {
            arena.node_mut(id).handle = Some(n as u32 + 1);
        }
        let new_parent = arena.insert(Fiber::root(0, Element::fragment(), Some(old_parent)));
        let old_children = arena.children(old_parent);
        (arena, new_parent, old_children)
    }

    #[test]
    fn test_first_render_inserts_everything() {
        let (arena, _, old) = with_old_children(&["a", "b"]);
        assert_eq!(old.len(), 2);
        assert!(old.iter().all(|id| arena.node(*id).effect == EffectTag::Insert));
    }

    #[test]
    fn test_positional_match() {
        let (mut arena, parent, old) = with_old_children(&["a", "b", "c"]);
        let mut deletions = Vec::new();
        let elements = [Element::host("a"), Element::host("x"), Element::host("c")];
        reconcile_children(&mut arena, parent, &elements, &mut deletions, &NoopTracer);

        assert_eq!(
            effects(&arena, parent),
            vec![EffectTag::Update, EffectTag::Insert, EffectTag::Update]
        );
        assert_eq!(deletions, vec![old[1]]);
        assert_eq!(arena.node(old[1]).effect, EffectTag::Delete);

        let new = arena.children(parent);
        assert_eq!(arena.node(new[0]).alternate, Some(old[0]));
        assert_eq!(arena.node(new[0]).handle, Some(1));
        assert_eq!(arena.node(new[1]).alternate, None);
        assert_eq!(arena.node(new[1]).handle, None);
        assert_eq!(arena.node(new[2]).handle, Some(3));
        assert!(new.iter().all(|id| arena.node(*id).parent == Some(parent)));
    }

    #[test]
    fn test_shorter_new_list_deletes_tail() {
        let (mut arena, parent, old) = with_old_children(&["a", "b", "c"]);
        let mut deletions = Vec::new();
        reconcile_children(&mut arena, parent, &[Element::host("a")], &mut deletions, &NoopTracer);
        assert_eq!(effects(&arena, parent), vec![EffectTag::Update]);
        assert_eq!(deletions, vec![old[1], old[2]]);
    }

    #[test]
    fn test_longer_new_list_inserts_tail() {
        let (mut arena, parent, _) = with_old_children(&["a"]);
        let mut deletions = Vec::new();
        let elements = [Element::host("a"), Element::host("b"), Element::text("t")];
        reconcile_children(&mut arena, parent, &elements, &mut deletions, &NoopTracer);
        assert_eq!(
            effects(&arena, parent),
            vec![EffectTag::Update, EffectTag::Insert, EffectTag::Insert]
        );
        assert!(deletions.is_empty());
    }

    #[test]
    fn test_reorder_is_delete_plus_insert() {
        let (mut arena, parent, old) = with_old_children(&["a", "b"]);
        let mut deletions = Vec::new();
        let elements = [Element::host("b"), Element::host("a")];
        reconcile_children(&mut arena, parent, &elements, &mut deletions, &NoopTracer);
        assert_eq!(
            effects(&arena, parent),
            vec![EffectTag::Insert, EffectTag::Insert]
        );
        assert_eq!(deletions, old);
    }

    #[test]
    fn test_empty_new_list() {
        let (mut arena, parent, old) = with_old_children(&["a", "b"]);
        let mut deletions = Vec::new();
        reconcile_children(&mut arena, parent, &[], &mut deletions, &NoopTracer);
        assert_eq!(arena.node(parent).child, None);
        assert_eq!(deletions, old);
    }
}
