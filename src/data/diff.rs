//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data tree differences.
//!
//! A diff is a data tree whose nodes carry "yang" annotations. Every node
//! has an effective operation, inherited from the nearest annotated parent.
//! Instances of user-ordered lists and leaf-lists are placed after the
//! instance named by `key` (lists) or `value` (leaf-lists), the empty string
//! meaning the first position; the `orig-*` annotations hold the values of
//! the first tree. Keyless list instances are addressed by their 1-based
//! `position` and `orig-position` instead. Operations apply in document
//! order.

use crate::context::{Context, Prefixes};
use crate::data::{
    DataDiff, DataDiffFlags, DataTree, NodeFlags, NodeValue,
};
use crate::error::{Error, ErrorCode, Result};
use crate::schema::{SchemaFlags, SchemaNodeKind};
use crate::utils::quote_value;

const YANG: &str = "yang";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Op {
    None,
    Create,
    Delete,
    Replace,
}

/// Diff builder.
struct Differ<'t, 'a> {
    first: &'t DataTree<'a>,
    second: &'t DataTree<'a>,
    diff: DataTree<'a>,
    defaults: bool,
    // Matched ancestors of the current siblings: node of the second tree
    // and its copy in the diff, once created.
    chain: Vec<(usize, Option<usize>)>,
}

// ===== impl Op =====

impl Op {
    fn parse(value: &str) -> Option<Op> {
        match value {
            "none" => Some(Op::None),
            "create" => Some(Op::Create),
            "delete" => Some(Op::Delete),
            "replace" => Some(Op::Replace),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Op::None => "none",
            Op::Create => "create",
            Op::Delete => "delete",
            Op::Replace => "replace",
        }
    }
}

// ===== impl Differ =====

impl<'a> Differ<'_, 'a> {
    fn skip(&self, tree: &DataTree<'a>, id: usize) -> bool {
        if !self.defaults && tree.nodes[id].flags.contains(NodeFlags::DEFAULT) {
            return true;
        }
        is_list_key(tree, id)
    }

    // Creates the "none" ancestors of a change, returning the diff parent.
    fn ensure_parent(&mut self) -> Result<Option<usize>> {
        let mut parent = None;
        for index in 0..self.chain.len() {
            let (id, copy) = self.chain[index];
            let copy = match copy {
                Some(copy) => copy,
                None => {
                    let copy = self.copy_single(parent, id);
                    // Descendants inherit the operation.
                    if parent.is_none() {
                        self.diff.set_meta(copy, YANG, "operation", Op::None.as_str())?;
                    }
                    self.chain[index].1 = Some(copy);
                    copy
                }
            };
            parent = Some(copy);
        }
        Ok(parent)
    }

    // Copies a node of the second tree with its list keys.
    fn copy_single(&mut self, parent: Option<usize>, id: usize) -> usize {
        let second = self.second;
        let copy = self.diff.copy_node(second, id, false);
        self.diff.link_child(parent, copy);
        for child in second.child_ids(Some(id)) {
            if is_list_key(second, child) {
                let key = self.diff.copy_node(second, child, false);
                self.diff.link_child(Some(copy), key);
            }
        }
        self.diff.rehash(copy);
        copy
    }

    fn siblings(&mut self, first_parent: Option<usize>, second_parent: Option<usize>) -> Result<()> {
        let (first, second) = (self.first, self.second);
        for fid in first.child_ids(first_parent) {
            if self.skip(first, fid) || is_keyless(first, fid) {
                continue;
            }
            match second.find_instance(second_parent, first, fid) {
                Some(sid) if !self.skip(second, sid) => self.matched(fid, sid)?,
                _ => self.deleted(first_parent, fid)?,
            }
        }
        for sid in second.child_ids(second_parent) {
            if self.skip(second, sid) || is_user_ordered(second, sid) || is_keyless(second, sid) {
                continue;
            }
            match first.find_instance(first_parent, second, sid) {
                Some(fid) if !self.skip(first, fid) => {}
                _ => {
                    self.created(sid)?;
                }
            }
        }
        self.keyless(first_parent, second_parent)?;
        self.user_ordered(first_parent, second_parent)
    }

    fn deleted(&mut self, first_parent: Option<usize>, fid: usize) -> Result<()> {
        let first = self.first;
        let parent = self.ensure_parent()?;
        let copy = self.diff.copy_subtree(parent, first, fid, false);
        self.diff.set_meta(copy, YANG, "operation", Op::Delete.as_str())?;
        if is_user_ordered(first, fid) {
            let preceding = preceding_ident(first, first_parent, fid);
            self.diff.set_meta(copy, YANG, orig_position_meta(first, fid), &preceding)?;
        }
        Ok(())
    }

    fn created(&mut self, sid: usize) -> Result<usize> {
        let second = self.second;
        let parent = self.ensure_parent()?;
        let copy = self.diff.copy_subtree(parent, second, sid, false);
        self.diff.set_meta(copy, YANG, "operation", Op::Create.as_str())?;
        Ok(copy)
    }

    fn matched(&mut self, fid: usize, sid: usize) -> Result<()> {
        let (first, second) = (self.first, self.second);
        let default_changed = self.defaults
            && first.nodes[fid].flags.contains(NodeFlags::DEFAULT)
                != second.nodes[sid].flags.contains(NodeFlags::DEFAULT);
        match (&first.nodes[fid].value, &second.nodes[sid].value) {
            (NodeValue::Term(old), NodeValue::Term(new)) => {
                let is_leaf = second
                    .snode(sid)
                    .is_some_and(|snode| snode.kind == SchemaNodeKind::Leaf);
                if !is_leaf || (old.canonical == new.canonical && !default_changed) {
                    return Ok(());
                }
                let parent = self.ensure_parent()?;
                let copy = self.copy_single(parent, sid);
                self.diff.set_meta(copy, YANG, "operation", Op::Replace.as_str())?;
                let orig_default = first.nodes[fid].flags.contains(NodeFlags::DEFAULT);
                self.diff
                    .set_meta(copy, YANG, "orig-default", &orig_default.to_string())?;
                self.diff.set_meta(copy, YANG, "orig-value", &old.canonical)?;
            }
            (NodeValue::Any(old), NodeValue::Any(new)) => {
                let old = old.to_string();
                if old == new.to_string() {
                    return Ok(());
                }
                let parent = self.ensure_parent()?;
                let copy = self.copy_single(parent, sid);
                self.diff.set_meta(copy, YANG, "operation", Op::Replace.as_str())?;
                self.diff.set_meta(copy, YANG, "orig-value", &old)?;
            }
            (NodeValue::Opaque(old), NodeValue::Opaque(new)) if old.value != new.value => {
                let parent = self.ensure_parent()?;
                let copy = self.diff.copy_subtree(parent, second, sid, false);
                self.diff.set_meta(copy, YANG, "operation", Op::Replace.as_str())?;
            }
            _ => {
                self.chain.push((sid, None));
                let result = self.siblings(Some(fid), Some(sid));
                self.chain.pop();
                result?;
            }
        }
        Ok(())
    }

    // Keyless list instances are only known by their position: changes are
    // deletions, creations and moves of whole instances. Deletions come
    // first, from the last position, then every other instance is created or
    // moved into its final position in ascending order.
    fn keyless(&mut self, first_parent: Option<usize>, second_parent: Option<usize>) -> Result<()> {
        let (first, second) = (self.first, self.second);
        let mut schemas = Vec::new();
        let children = first
            .child_ids(first_parent)
            .into_iter()
            .map(|id| (first, id))
            .chain(second.child_ids(second_parent).into_iter().map(|id| (second, id)));
        for (tree, id) in children {
            let schema = tree.nodes[id].schema;
            if is_keyless(tree, id) && !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }

        for schema in schemas.into_iter().flatten() {
            let old: Vec<usize> = first
                .instances(first_parent, schema)
                .into_iter()
                .filter(|id| !self.skip(first, *id))
                .collect();
            let new: Vec<usize> = second
                .instances(second_parent, schema)
                .into_iter()
                .filter(|id| !self.skip(second, *id))
                .collect();

            // Pair every new instance with the first unused equal old one.
            let mut used = vec![false; old.len()];
            let pairs: Vec<Option<usize>> = new
                .iter()
                .map(|sid| {
                    let index = (0..old.len()).find(|index| {
                        !used[*index] && same_subtree(first, old[*index], second, *sid)
                    })?;
                    used[index] = true;
                    Some(old[index])
                })
                .collect();

            for (index, fid) in old.iter().enumerate().rev() {
                if used[index] {
                    continue;
                }
                let parent = self.ensure_parent()?;
                let copy = self.diff.copy_subtree(parent, first, *fid, false);
                self.diff.set_meta(copy, YANG, "operation", Op::Delete.as_str())?;
                self.diff
                    .set_meta(copy, YANG, "orig-position", &(index + 1).to_string())?;
            }

            let mut current: Vec<Option<usize>> = old
                .iter()
                .zip(&used)
                .filter(|(_, used)| **used)
                .map(|(fid, _)| Some(*fid))
                .collect();
            for (index, (sid, pair)) in new.iter().zip(pairs).enumerate() {
                let Some(fid) = pair else {
                    let copy = self.created(*sid)?;
                    self.diff.set_meta(copy, YANG, "position", &(index + 1).to_string())?;
                    current.insert(index, None);
                    continue;
                };
                let pos = current
                    .iter()
                    .position(|other| *other == Some(fid))
                    .ok_or_else(|| Error::new(ErrorCode::Int, "Moved instance not found."))?;
                if pos == index {
                    continue;
                }
                let parent = self.ensure_parent()?;
                let copy = self.diff.copy_subtree(parent, second, *sid, false);
                self.diff.set_meta(copy, YANG, "operation", Op::Replace.as_str())?;
                self.diff.set_meta(copy, YANG, "position", &(index + 1).to_string())?;
                self.diff
                    .set_meta(copy, YANG, "orig-position", &(pos + 1).to_string())?;
                current.remove(pos);
                current.insert(index, Some(fid));
            }
        }
        Ok(())
    }

    // Creations and moves of user-ordered instances, in their final order.
    fn user_ordered(&mut self, first_parent: Option<usize>, second_parent: Option<usize>) -> Result<()> {
        let (first, second) = (self.first, self.second);
        let mut schemas = Vec::new();
        for sid in second.child_ids(second_parent) {
            let schema = second.nodes[sid].schema;
            if is_user_ordered(second, sid) && !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }

        for schema in schemas.into_iter().flatten() {
            let old: Vec<usize> = first
                .instances(first_parent, schema)
                .into_iter()
                .filter(|id| !self.skip(first, *id))
                .collect();
            let new: Vec<usize> = second
                .instances(second_parent, schema)
                .into_iter()
                .filter(|id| !self.skip(second, *id))
                .collect();
            // Identities of the kept instances in their current order.
            let mut current: Vec<String> = old
                .iter()
                .filter(|id| {
                    second
                        .find_instance(second_parent, first, **id)
                        .is_some_and(|sid| !self.skip(second, sid))
                })
                .map(|id| instance_ident(first, *id))
                .collect();

            for (index, sid) in new.iter().enumerate() {
                let ident = instance_ident(second, *sid);
                let preceding = match index {
                    0 => String::new(),
                    _ => instance_ident(second, new[index - 1]),
                };
                let position_meta = position_meta(second, *sid);
                match current.iter().position(|i| *i == ident) {
                    None => {
                        let copy = self.created(*sid)?;
                        self.diff.set_meta(copy, YANG, position_meta, &preceding)?;
                        current.insert(index.min(current.len()), ident);
                    }
                    Some(pos) if pos == index => {}
                    Some(pos) => {
                        let fid = first
                            .find_instance(first_parent, second, *sid)
                            .ok_or_else(|| Error::new(ErrorCode::Int, "Moved instance not found."))?;
                        let orig = preceding_ident(first, first_parent, fid);
                        let parent = self.ensure_parent()?;
                        let copy = match self.diff.find_instance(parent, second, *sid) {
                            Some(copy) => {
                                // Moves apply in order, after the changes below.
                                self.diff.unlink_node(copy);
                                self.diff.link_child(parent, copy);
                                copy
                            }
                            None => self.copy_single(parent, *sid),
                        };
                        self.diff.set_meta(copy, YANG, "operation", Op::Replace.as_str())?;
                        self.diff.set_meta(copy, YANG, position_meta, &preceding)?;
                        self.diff
                            .set_meta(copy, YANG, orig_position_meta(second, *sid), &orig)?;
                        let moved = current.remove(pos);
                        current.insert(index, moved);
                    }
                }
            }
        }
        Ok(())
    }
}

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Learn the differences between 2 data trees.
    ///
    /// The resulting diff is represented as a data tree with specific metadata
    /// from the internal 'yang' module. Most importantly, every node has an
    /// effective 'operation' metadata. If there is none defined on the
    /// node, it inherits the operation from the nearest parent. Top-level nodes
    /// must always have the 'operation' metadata defined. Additional
    /// metadata ('orig-default', 'value', 'orig-value', 'key', 'orig-key',
    /// 'position', 'orig-position')
    /// are used for storing more information about the value in the first
    /// or the second tree.
    pub fn diff(
        &self,
        dtree: &DataTree<'a>,
        options: DataDiffFlags,
    ) -> Result<DataDiff<'a>> {
        let mut differ = Differ {
            first: self,
            second: dtree,
            diff: DataTree::new(self.context),
            defaults: options.contains(DataDiffFlags::DEFAULTS),
            chain: Vec::new(),
        };
        differ
            .siblings(None, None)
            .map_err(|error| self.context.log_error(error))?;
        let mut tree = differ.diff;
        for dnode in &mut tree.nodes {
            dnode.flags.remove(NodeFlags::DEFAULT);
        }
        Ok(DataDiff { tree })
    }

    /// Apply the whole diff tree on the data tree.
    pub fn diff_apply(&mut self, diff: &DataDiff<'a>) -> Result<()> {
        self.apply_siblings(None, &diff.tree, None, Op::None)
            .map_err(|error| self.context.log_error(error))
    }

    fn apply_siblings(
        &mut self,
        parent: Option<usize>,
        diff: &DataTree<'a>,
        diff_parent: Option<usize>,
        inherited: Op,
    ) -> Result<()> {
        for did in diff.child_ids(diff_parent) {
            let op = match diff.meta_value(did, YANG, "operation") {
                Some(value) => Op::parse(value).ok_or_else(|| {
                    Error::inval(format!("Unknown diff operation \"{}\".", value))
                })?,
                None => inherited,
            };
            if op == Op::None && is_list_key(diff, did) {
                continue;
            }
            if op != Op::None && is_keyless(diff, did) {
                self.apply_keyless(parent, diff, did, op)?;
                continue;
            }
            self.apply_node(parent, diff, did, op)?;
        }
        Ok(())
    }

    fn apply_node(
        &mut self,
        parent: Option<usize>,
        diff: &DataTree<'a>,
        did: usize,
        op: Op,
    ) -> Result<()> {
        let existing = self.find_instance(parent, diff, did);
        match op {
            Op::Create => {
                if let Some(id) = existing {
                    if !self.nodes[id].flags.contains(NodeFlags::DEFAULT) {
                        return Err(Error::new(
                            ErrorCode::Exist,
                            format!("Node \"{}\" to be created already exists.", self.node_path(id)),
                        ));
                    }
                    self.free_node(id);
                }
                let id = self.copy_subtree(parent, diff, did, true);
                self.strip_diff_meta(id);
                if is_user_ordered(diff, did) {
                    self.place(id, diff.meta_value(did, YANG, position_meta(diff, did)))?;
                }
            }
            Op::Delete => {
                let id = existing.ok_or_else(|| missing(diff, did))?;
                self.free_node(id);
            }
            Op::Replace => {
                let id = existing.ok_or_else(|| missing(diff, did))?;
                if is_user_ordered(diff, did) {
                    self.place(id, diff.meta_value(did, YANG, position_meta(diff, did)))?;
                } else if !matches!(diff.nodes[did].value, NodeValue::Inner) {
                    self.nodes[id].value = diff.nodes[did].value.clone();
                    self.nodes[id].flags.remove(NodeFlags::DEFAULT);
                    let mut ancestor = self.nodes[id].links.parent;
                    while let Some(p) = ancestor {
                        self.nodes[p].flags.remove(NodeFlags::DEFAULT);
                        ancestor = self.nodes[p].links.parent;
                    }
                    self.rehash(id);
                    self.mark_dirty(Some(id));
                    if let NodeValue::Opaque(_) = self.nodes[id].value {
                        for child in self.child_ids(Some(id)) {
                            self.free_node(child);
                        }
                        self.copy_children(id, diff, did, true);
                    }
                    return Ok(());
                }
                self.apply_siblings(Some(id), diff, Some(did), Op::None)?;
            }
            Op::None => {
                let id = existing.ok_or_else(|| missing(diff, did))?;
                self.apply_siblings(Some(id), diff, Some(did), Op::None)?;
            }
        }
        Ok(())
    }

    fn apply_keyless(
        &mut self,
        parent: Option<usize>,
        diff: &DataTree<'a>,
        did: usize,
        op: Op,
    ) -> Result<()> {
        let Some(schema) = diff.nodes[did].schema else {
            return Ok(());
        };
        let instances = self.instances(parent, schema);
        let at = |name: &str| -> Result<usize> {
            let position = position_value(diff, did, name)?;
            instances.get(position - 1).copied().ok_or_else(|| missing(diff, did))
        };
        match op {
            Op::Create => {
                let position = position_value(diff, did, "position")?;
                if position > instances.len() + 1 {
                    return Err(missing(diff, did));
                }
                let id = self.copy_subtree(parent, diff, did, true);
                self.strip_diff_meta(id);
                self.move_to_position(id, position);
            }
            Op::Delete => {
                let id = at("orig-position")?;
                self.free_node(id);
            }
            Op::Replace => {
                let id = at("orig-position")?;
                let position = position_value(diff, did, "position")?;
                if position > instances.len() {
                    return Err(missing(diff, did));
                }
                self.move_to_position(id, position);
            }
            Op::None => {}
        }
        Ok(())
    }

    // Moves an instance so that it ends up at the 1-based `position` among
    // the instances of its schema node.
    fn move_to_position(&mut self, id: usize, position: usize) {
        let parent = self.nodes[id].links.parent;
        let Some(schema) = self.nodes[id].schema else {
            return;
        };
        let others: Vec<usize> = self
            .instances(parent, schema)
            .into_iter()
            .filter(|other| *other != id)
            .collect();
        let (anchor, before) = match others.get(position - 1) {
            Some(anchor) => (*anchor, true),
            None => match others.last() {
                Some(last) => (*last, false),
                None => return,
            },
        };
        self.unlink_node(id);
        self.link_at(anchor, id, before);
    }

    // Moves a user-ordered instance right after the named one.
    fn place(&mut self, id: usize, preceding: Option<&str>) -> Result<()> {
        let Some(preceding) = preceding else {
            return Ok(());
        };
        let parent = self.nodes[id].links.parent;
        let Some(schema) = self.nodes[id].schema else {
            return Ok(());
        };
        let instances: Vec<usize> = self
            .instances(parent, schema)
            .into_iter()
            .filter(|other| *other != id)
            .collect();
        let Some(first) = instances.first().copied() else {
            return Ok(());
        };
        if preceding.is_empty() {
            self.unlink_node(id);
            self.link_at(first, id, true);
            return Ok(());
        }
        let anchor = instances
            .into_iter()
            .find(|other| instance_ident(self, *other) == preceding)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Preceding instance \"{}\" of \"{}\" not found.",
                    preceding,
                    self.node_path(id)
                ))
            })?;
        self.unlink_node(id);
        self.link_at(anchor, id, false);
        Ok(())
    }

    fn strip_diff_meta(&mut self, id: usize) {
        let context: &'a Context = self.context;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.nodes[next]
                .meta
                .retain(|meta| &*context.modules[meta.module].name != YANG);
            stack.extend(self.child_ids(Some(next)));
        }
    }
}

// ===== global functions =====

/// Builds the diff undoing the given one.
pub(crate) fn reverse<'a>(diff: &DataTree<'a>) -> Result<DataTree<'a>> {
    let mut tree = diff.duplicate()?;
    let ids: Vec<usize> = tree.traverse().map(|dnode| dnode.id().0).collect();
    for id in ids {
        let Some(op) = tree.meta_value(id, YANG, "operation").and_then(Op::parse) else {
            continue;
        };
        let user_ordered = is_user_ordered(&tree, id) || is_keyless(&tree, id);
        let position = position_meta(&tree, id);
        let orig_position = orig_position_meta(&tree, id);
        match op {
            Op::None => {}
            Op::Create | Op::Delete => {
                let reversed = if op == Op::Create { Op::Delete } else { Op::Create };
                tree.set_meta(id, YANG, "operation", reversed.as_str())?;
                if user_ordered {
                    let (from, to) = match op {
                        Op::Create => (position, orig_position),
                        _ => (orig_position, position),
                    };
                    if let Some(value) = tree.meta_value(id, YANG, from).map(str::to_owned) {
                        tree.remove_meta(id, YANG, from);
                        tree.set_meta(id, YANG, to, &value)?;
                    }
                }
            }
            Op::Replace if user_ordered => {
                let value = tree.meta_value(id, YANG, position).map(str::to_owned);
                let orig = tree.meta_value(id, YANG, orig_position).map(str::to_owned);
                if let (Some(value), Some(orig)) = (value, orig) {
                    tree.set_meta(id, YANG, position, &orig)?;
                    tree.set_meta(id, YANG, orig_position, &value)?;
                }
            }
            Op::Replace => {
                let Some(orig) = tree.meta_value(id, YANG, "orig-value").map(str::to_owned) else {
                    continue;
                };
                let current = tree.nodes[id].value.clone();
                match (&current, tree.nodes[id].schema) {
                    (NodeValue::Term(value), Some(schema)) => {
                        let restored = tree.store_term(schema, &orig, Prefixes::Json)?;
                        tree.nodes[id].value = NodeValue::Term(restored);
                        tree.set_meta(id, YANG, "orig-value", &value.canonical)?;
                    }
                    (NodeValue::Any(value), _) => {
                        tree.nodes[id].value =
                            NodeValue::Any(crate::data::AnyValue::String(orig));
                        tree.set_meta(id, YANG, "orig-value", &value.to_string())?;
                    }
                    _ => {}
                }
                tree.rehash(id);
            }
        }
    }

    // Keyless list changes are positional and undo in the opposite order.
    let mut parents = vec![None];
    parents.extend(tree.traverse().map(|dnode| Some(dnode.id().0)));
    for parent in parents {
        let mut schemas = Vec::new();
        for child in tree.child_ids(parent) {
            let schema = tree.nodes[child].schema;
            if is_keyless(&tree, child) && !schemas.contains(&schema) {
                schemas.push(schema);
            }
        }
        for schema in schemas.into_iter().flatten() {
            let instances = tree.instances(parent, schema);
            let Some(mut head) = instances.first().copied() else {
                continue;
            };
            for id in instances.into_iter().skip(1) {
                tree.unlink_node(id);
                tree.link_at(head, id, true);
                head = id;
            }
        }
    }
    Ok(tree)
}

fn is_list_key(tree: &DataTree<'_>, id: usize) -> bool {
    tree.snode(id)
        .is_some_and(|snode| snode.flags.contains(SchemaFlags::KEY))
        && tree.nodes[id].links.parent.is_some()
}

fn is_user_ordered(tree: &DataTree<'_>, id: usize) -> bool {
    tree.snode(id).is_some_and(|snode| {
        snode.is_user_ordered()
            && matches!(snode.kind, SchemaNodeKind::List | SchemaNodeKind::LeafList)
    }) && !is_keyless(tree, id)
}

fn is_keyless(tree: &DataTree<'_>, id: usize) -> bool {
    tree.snode(id).is_some_and(|snode| {
        snode.kind == SchemaNodeKind::List && snode.flags.contains(SchemaFlags::KEYLESS)
    })
}

fn position_meta(tree: &DataTree<'_>, id: usize) -> &'static str {
    match tree.snode(id).map(|snode| snode.kind) {
        Some(SchemaNodeKind::LeafList) => "value",
        _ if is_keyless(tree, id) => "position",
        _ => "key",
    }
}

fn orig_position_meta(tree: &DataTree<'_>, id: usize) -> &'static str {
    match tree.snode(id).map(|snode| snode.kind) {
        Some(SchemaNodeKind::LeafList) => "orig-value",
        _ if is_keyless(tree, id) => "orig-position",
        _ => "orig-key",
    }
}

// 1-based position stored in a diff annotation.
fn position_value(diff: &DataTree<'_>, did: usize, name: &str) -> Result<usize> {
    diff.meta_value(did, YANG, name)
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|position| *position > 0)
        .ok_or_else(|| {
            Error::inval(format!(
                "Missing or invalid \"{}\" annotation of \"{}\".",
                name,
                diff.node_path(did)
            ))
        })
}

// Whether two subtrees hold the same children and values, in order.
fn same_subtree(a: &DataTree<'_>, aid: usize, b: &DataTree<'_>, bid: usize) -> bool {
    if a.nodes[aid].schema != b.nodes[bid].schema {
        return false;
    }
    let values_match = match (&a.nodes[aid].value, &b.nodes[bid].value) {
        (NodeValue::Term(x), NodeValue::Term(y)) => x.canonical == y.canonical,
        (NodeValue::Any(x), NodeValue::Any(y)) => x.to_string() == y.to_string(),
        (NodeValue::Opaque(x), NodeValue::Opaque(y)) => {
            x.name == y.name && x.value == y.value
        }
        (NodeValue::Inner, NodeValue::Inner) => true,
        _ => false,
    };
    if !values_match {
        return false;
    }
    let achildren = a.child_ids(Some(aid));
    let bchildren = b.child_ids(Some(bid));
    achildren.len() == bchildren.len()
        && achildren
            .iter()
            .zip(&bchildren)
            .all(|(x, y)| same_subtree(a, *x, b, *y))
}

/// Identity of a user-ordered instance: key predicates of a list instance
/// or the value of a leaf-list instance.
fn instance_ident(tree: &DataTree<'_>, id: usize) -> String {
    let Some(snode) = tree.snode(id) else {
        return String::new();
    };
    match snode.kind {
        SchemaNodeKind::LeafList => tree.canonical(id).unwrap_or_default().to_owned(),
        _ => snode
            .list_keys()
            .iter()
            .zip(tree.key_values(id))
            .map(|(key, value)| {
                format!(
                    "[{}={}]",
                    tree.context.schema.nodes[*key].name,
                    quote_value(value.unwrap_or(""))
                )
            })
            .collect(),
    }
}

// Identity of the instance preceding `id`, empty for the first one.
fn preceding_ident(tree: &DataTree<'_>, parent: Option<usize>, id: usize) -> String {
    let Some(schema) = tree.nodes[id].schema else {
        return String::new();
    };
    let instances = tree.instances(parent, schema);
    match instances.iter().position(|other| *other == id) {
        Some(index) if index > 0 => instance_ident(tree, instances[index - 1]),
        _ => String::new(),
    }
}

fn missing(diff: &DataTree<'_>, did: usize) -> Error {
    Error::not_found(format!(
        "Node \"{}\" from the diff not found in the data tree.",
        diff.node_path(did)
    ))
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations() {
        for op in [Op::None, Op::Create, Op::Delete, Op::Replace] {
            assert_eq!(Op::parse(op.as_str()), Some(op));
        }
        assert_eq!(Op::parse("merge"), None);
    }
}
