//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Arena helpers shared by the schema and data trees.

/// A trait implemented by all handle types that can be created from an
/// arena index and the container owning the arena.
#[doc(hidden)]
pub trait Binding<'a>
where
    Self: Sized,
    <Self as Binding<'a>>::Container: 'a,
{
    type Container;

    fn from_raw(container: &'a Self::Container, id: usize) -> Self;

    fn from_raw_opt(
        container: &'a Self::Container,
        id: Option<usize>,
    ) -> Option<Self> {
        id.map(|id| Self::from_raw(container, id))
    }
}

/// Tree links of an arena node.
///
/// Siblings form a circular list through `prev`: the first sibling's `prev`
/// is the last sibling and a lone node points to itself. `next` of the last
/// sibling is `None`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct NodeLinks {
    pub parent: Option<usize>,
    pub next: Option<usize>,
    pub prev: usize,
    pub child: Option<usize>,
}

/// Arena giving access to the links of its nodes.
pub(crate) trait LinkArena {
    fn links(&self, id: usize) -> &NodeLinks;
    fn links_mut(&mut self, id: usize) -> &mut NodeLinks;

    fn last_sibling(&self, first: usize) -> usize {
        self.links(first).prev
    }

    fn siblings_from(&self, first: Option<usize>) -> SiblingIds<'_, Self>
    where
        Self: Sized,
    {
        SiblingIds { arena: self, next: first }
    }
}

/// Iterator over sibling indexes.
pub(crate) struct SiblingIds<'a, A: LinkArena> {
    arena: &'a A,
    next: Option<usize>,
}

// ===== impl NodeLinks =====

impl NodeLinks {
    pub(crate) fn new(id: usize) -> NodeLinks {
        NodeLinks {
            parent: None,
            next: None,
            prev: id,
            child: None,
        }
    }
}

// ===== impl SiblingIds =====

impl<A: LinkArena> Iterator for SiblingIds<'_, A> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let id = self.next?;
        self.next = self.arena.links(id).next;
        Some(id)
    }
}

// ===== global functions =====

/// Appends `id` as the last node of the sibling list starting at `first`.
pub(crate) fn link_append<A: LinkArena>(
    arena: &mut A,
    first: &mut Option<usize>,
    parent: Option<usize>,
    id: usize,
) {
    match *first {
        None => {
            let links = arena.links_mut(id);
            links.parent = parent;
            links.next = None;
            links.prev = id;
            *first = Some(id);
        }
        Some(head) => {
            let last = arena.links(head).prev;
            arena.links_mut(last).next = Some(id);
            let links = arena.links_mut(id);
            links.parent = parent;
            links.next = None;
            links.prev = last;
            arena.links_mut(head).prev = id;
        }
    }
}

/// Inserts `id` right before `sibling`, which must be linked in the list
/// starting at `first`.
pub(crate) fn link_before<A: LinkArena>(
    arena: &mut A,
    first: &mut Option<usize>,
    sibling: usize,
    id: usize,
) {
    let parent = arena.links(sibling).parent;
    let prev = arena.links(sibling).prev;
    if *first == Some(sibling) {
        *first = Some(id);
    } else {
        arena.links_mut(prev).next = Some(id);
    }
    let links = arena.links_mut(id);
    links.parent = parent;
    links.next = Some(sibling);
    links.prev = prev;
    arena.links_mut(sibling).prev = id;
}

/// Inserts `id` right after `sibling`.
pub(crate) fn link_after<A: LinkArena>(
    arena: &mut A,
    first: &mut Option<usize>,
    sibling: usize,
    id: usize,
) {
    match arena.links(sibling).next {
        Some(next) => link_before(arena, first, next, id),
        None => {
            let parent = arena.links(sibling).parent;
            link_append(arena, first, parent, id)
        }
    }
}

/// Removes `id` from the sibling list starting at `first`.
pub(crate) fn link_remove<A: LinkArena>(
    arena: &mut A,
    first: &mut Option<usize>,
    id: usize,
) {
    let next = arena.links(id).next;
    let prev = arena.links(id).prev;
    if *first == Some(id) {
        *first = next;
        if let Some(next) = next {
            arena.links_mut(next).prev = prev;
        }
    } else {
        arena.links_mut(prev).next = next;
        match next {
            Some(next) => arena.links_mut(next).prev = prev,
            None => {
                if let Some(head) = *first {
                    arena.links_mut(head).prev = prev;
                }
            }
        }
    }
    let links = arena.links_mut(id);
    links.parent = None;
    links.next = None;
    links.prev = id;
}

/// Checks the circular sibling invariant of the list starting at `first`.
#[cfg(test)]
pub(crate) fn siblings_consistent<A: LinkArena>(
    arena: &A,
    first: Option<usize>,
) -> bool {
    let Some(head) = first else {
        return true;
    };
    let mut prev = arena.links(head).prev;
    let mut last = head;
    let mut node = Some(head);
    let mut first_iter = true;
    while let Some(id) = node {
        if !first_iter && arena.links(id).prev != prev {
            return false;
        }
        first_iter = false;
        prev = id;
        last = id;
        node = arena.links(id).next;
    }
    arena.links(head).prev == last
}

/// Quotes a predicate value, preferring single quotes.
pub(crate) fn quote_value(value: &str) -> String {
    if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    struct Arena(Vec<NodeLinks>);

    impl LinkArena for Arena {
        fn links(&self, id: usize) -> &NodeLinks {
            &self.0[id]
        }

        fn links_mut(&mut self, id: usize) -> &mut NodeLinks {
            &mut self.0[id]
        }
    }

    fn arena(n: usize) -> Arena {
        Arena((0..n).map(NodeLinks::new).collect())
    }

    fn order(arena: &Arena, first: Option<usize>) -> Vec<usize> {
        arena.siblings_from(first).collect()
    }

    #[test]
    fn append_and_insert() {
        let mut arena = arena(4);
        let mut first = None;
        link_append(&mut arena, &mut first, None, 0);
        assert_eq!(arena.links(0).prev, 0);
        link_append(&mut arena, &mut first, None, 2);
        link_before(&mut arena, &mut first, 0, 1);
        link_after(&mut arena, &mut first, 2, 3);
        assert_eq!(order(&arena, first), vec![1, 0, 2, 3]);
        assert_eq!(arena.last_sibling(1), 3);
        assert!(siblings_consistent(&arena, first));
    }

    #[test]
    fn remove_keeps_invariant() {
        let mut arena = arena(3);
        let mut first = None;
        for id in 0..3 {
            link_append(&mut arena, &mut first, None, id);
        }
        link_remove(&mut arena, &mut first, 2);
        assert_eq!(order(&arena, first), vec![0, 1]);
        assert_eq!(arena.links(0).prev, 1);
        link_remove(&mut arena, &mut first, 0);
        assert_eq!(first, Some(1));
        assert_eq!(arena.links(1).prev, 1);
        assert!(siblings_consistent(&arena, first));
        link_remove(&mut arena, &mut first, 1);
        assert_eq!(first, None);
    }
}
