//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG iterators.

use crate::context::Context;
use crate::data::{DataNodeRef, Metadata};
use crate::schema::SchemaModule;
use crate::utils::Binding;

/// Common methods used by multiple data and schema node iterators.
#[doc(hidden)]
pub trait NodeIterable<'a>: Sized + Clone + PartialEq + Binding<'a> {
    /// Returns the parent node.
    fn parent(&self) -> Option<Self>;

    /// Returns the next sibling node.
    fn next_sibling(&self) -> Option<Self>;

    /// Returns the fist child none.
    fn first_child(&self) -> Option<Self>;
}

/// An iterator over the sibings of a node.
#[derive(Debug)]
pub struct Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over the ancestors of a node.
#[derive(Debug)]
pub struct Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over all elements in a tree (depth-first search algorithm).
///
/// When traversing over schema trees, note that _actions_ and _notifications_
/// are ignored.
#[derive(Debug)]
pub struct Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    start: T,
    next: Option<T>,
    _marker: std::marker::PhantomData<&'a T>,
}

/// An iterator over a set of nodes, usually the result of an XPath query.
#[derive(Debug)]
pub struct Set<'a, T>
where
    T: NodeIterable<'a>,
{
    container: &'a T::Container,
    ids: std::vec::IntoIter<usize>,
}

/// An iterator over a list of schema modules.
#[derive(Debug)]
pub struct SchemaModules<'a> {
    context: &'a Context,
    index: usize,
    skip_internal: bool,
}

/// An iterator over a list of metadata.
#[derive(Debug)]
pub struct MetadataList<'a, 'b> {
    dnode: DataNodeRef<'a, 'b>,
    index: usize,
}

// ===== impl Siblings =====

impl<'a, T> Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(next: Option<T>) -> Siblings<'a, T> {
        Siblings {
            next,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Siblings<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let ret = self.next.clone();
        if let Some(next) = &self.next {
            self.next = next.next_sibling();
        }
        ret
    }
}

// ===== impl Ancestors =====

impl<'a, T> Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(next: Option<T>) -> Ancestors<'a, T> {
        Ancestors {
            next,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Ancestors<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let node = self.next.clone();
        if let Some(next) = &self.next {
            self.next = next.parent();
        }
        node
    }
}

// ===== impl Traverse =====

impl<'a, T> Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(start: T) -> Traverse<'a, T> {
        let next = start.clone();

        Traverse {
            start,
            next: Some(next),
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'a, T> Iterator for Traverse<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let ret = self.next.clone();

        if let Some(next) = &mut self.next {
            // Select element for the next run - children first.
            *next = match next.first_child() {
                Some(child) => child,
                None => {
                    // No children.
                    if *next == self.start {
                        self.next = None;
                        return ret;
                    }

                    // Try siblings.
                    loop {
                        match next.next_sibling() {
                            Some(iter) => break iter,
                            None => {
                                // Parent is already processed, go to its
                                // sibling.
                                match next.parent() {
                                    Some(parent) => *next = parent,
                                    None => {
                                        self.next = None;
                                        return ret;
                                    }
                                }

                                // If no siblings, go back through parents.
                                if *next != self.start {
                                    continue;
                                }

                                // We are done, no next element to process.
                                self.next = None;
                                return ret;
                            }
                        }
                    }
                }
            }
        }
        ret
    }
}

// ===== impl Set =====

impl<'a, T> Set<'a, T>
where
    T: NodeIterable<'a>,
{
    pub fn new(container: &'a T::Container, ids: Vec<usize>) -> Set<'a, T> {
        Set {
            container,
            ids: ids.into_iter(),
        }
    }
}

impl<'a, T> Iterator for Set<'a, T>
where
    T: NodeIterable<'a>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.ids.next().map(|id| T::from_raw(self.container, id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl<'a, T> ExactSizeIterator for Set<'a, T> where T: NodeIterable<'a> {}

// ===== impl SchemaModules =====

impl<'a> SchemaModules<'a> {
    pub fn new(context: &'a Context, skip_internal: bool) -> SchemaModules<'a> {
        SchemaModules {
            context,
            index: 0,
            skip_internal,
        }
    }
}

impl<'a> Iterator for SchemaModules<'a> {
    type Item = SchemaModule<'a>;

    fn next(&mut self) -> Option<SchemaModule<'a>> {
        while self.index < self.context.modules.len() {
            let id = self.index;
            self.index += 1;
            if self.skip_internal && self.context.modules[id].internal {
                continue;
            }
            return Some(SchemaModule::from_raw(self.context, id));
        }
        None
    }
}

// ===== impl MetadataList =====

impl<'a, 'b> MetadataList<'a, 'b> {
    pub fn new(dnode: DataNodeRef<'a, 'b>) -> MetadataList<'a, 'b> {
        MetadataList { dnode, index: 0 }
    }
}

impl<'a, 'b> Iterator for MetadataList<'a, 'b> {
    type Item = Metadata<'a, 'b>;

    fn next(&mut self) -> Option<Metadata<'a, 'b>> {
        if self.index >= self.dnode.meta_count() {
            return None;
        }
        let meta = Metadata::new(self.dnode.clone(), self.index);
        self.index += 1;
        Some(meta)
    }
}
