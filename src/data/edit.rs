//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Creation, insertion, removal and merging of data nodes.

use crate::context::{Context, Prefixes};
use crate::data::{
    json, xml, AnyValue, DataAnyValue, DataMergeFlags, DataNodeId,
    DataPrinterFlags, DataTree, NewValueCreationFlags, NodeFlags, NodeValue,
    Opaque,
};
use crate::error::{Error, ErrorCode, Result, ValidationErrorCode};
use crate::path::{parse_data_path, PathPredicate};
use crate::schema::{SchemaFlags, SchemaModule, SchemaNodeKind};

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Create a new node or modify existing one in the data tree based on a
    /// path.
    ///
    /// If path points to a list key and the list instance does not exist,
    /// the key value from the predicate is used and value is ignored. Also,
    /// if a leaf-list is being created and both a predicate is defined in
    /// path and value is set, the predicate is preferred.
    ///
    /// For key-less lists and state leaf-lists, positional predicates can be
    /// used. If no preciate is used for these nodes, they are always created.
    ///
    /// The output parameter can be used to change the behavior to ignore
    /// RPC/action input schema nodes and use only output ones.
    ///
    /// Returns the last created or modified node (if any).
    pub fn new_path(
        &mut self,
        path: &str,
        value: Option<&str>,
        output: bool,
    ) -> Result<Option<DataNodeId>> {
        let mut options = NewValueCreationFlags::UPDATE;
        if output {
            options |= NewValueCreationFlags::OUTPUT;
        }
        self.new_path_with_flags(path, value, options)
    }

    /// Same as [`DataTree::new_path`], with explicit creation options.
    pub fn new_path_with_flags(
        &mut self,
        path: &str,
        value: Option<&str>,
        options: NewValueCreationFlags,
    ) -> Result<Option<DataNodeId>> {
        self.create_path(path, value, options)
            .map(|id| id.map(DataNodeId))
            .map_err(|error| self.context.log_error(error.with_path(path)))
    }

    fn create_path(
        &mut self,
        path: &str,
        value: Option<&str>,
        options: NewValueCreationFlags,
    ) -> Result<Option<usize>> {
        let context: &'a Context = self.context;
        context.check_compiled()?;
        let segments = parse_data_path(path)?;
        let output = options.contains(NewValueCreationFlags::OUTPUT);
        let update = options.contains(NewValueCreationFlags::UPDATE);
        let mut parent: Option<usize> = None;
        let mut module = None;
        let mut last = None;

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            if let Some(prefix) = &segment.prefix {
                module = Some(context.module_by_name(prefix).ok_or_else(|| {
                    Error::not_found(format!("Module \"{}\" not found.", prefix))
                })?);
            }
            let module = module.unwrap_or(0);
            if parent.is_some_and(|p| self.nodes[p].schema.is_none()) {
                return Err(Error::inval("Cannot create nodes under an opaque node."));
            }
            let parent_schema = parent.and_then(|p| self.nodes[p].schema);
            let Some(schema) = self.schema_child(parent_schema, module, &segment.name, output)
            else {
                return Err(Error::valid(
                    ValidationErrorCode::Xpath,
                    format!("Not found node \"{}\" in path.", segment.name),
                ));
            };
            let snode = &context.schema.nodes[schema];
            let instances = self.instances(parent, schema);
            let existing = instances
                .iter()
                .enumerate()
                .find(|(n, id)| self.matches_predicates(**id, &segment.predicates, n + 1))
                .map(|(_, id)| *id);
            let positional = matches!(
                segment.predicates.as_slice(),
                [PathPredicate::Position(_)]
            );

            match snode.kind {
                SchemaNodeKind::List if !snode.flags.contains(SchemaFlags::KEYLESS) => {
                    if segment.predicates.is_empty() {
                        return Err(Error::valid(
                            ValidationErrorCode::Xpath,
                            format!("Predicate missing for list \"{}\" in path.", snode.name),
                        ));
                    }
                    match existing {
                        Some(_) if is_last && !update => {
                            return Err(exists(&snode.name));
                        }
                        Some(id) => parent = Some(id),
                        None => {
                            let keys = snode
                                .list_keys()
                                .iter()
                                .map(|key| {
                                    let key = &context.schema.nodes[*key];
                                    segment
                                        .predicates
                                        .iter()
                                        .find_map(|pred| match pred {
                                            PathPredicate::Key { name, value, .. }
                                                if *name == *key.name =>
                                            {
                                                Some(value.clone())
                                            }
                                            _ => None,
                                        })
                                        .ok_or_else(|| {
                                            Error::valid(
                                                ValidationErrorCode::Xpath,
                                                format!(
                                                    "Key \"{}\" missing in path predicate.",
                                                    key.name
                                                ),
                                            )
                                        })
                                })
                                .collect::<Result<Vec<String>>>()?;
                            let id = self.create_list(parent, schema, &keys)?;
                            last = Some(id);
                            parent = Some(id);
                        }
                    }
                }
                SchemaNodeKind::List | SchemaNodeKind::LeafList
                    if positional || segment.predicates.is_empty() && !snode.is_config() =>
                {
                    // Key-less lists and state leaf-lists.
                    let position = match segment.predicates.as_slice() {
                        [PathPredicate::Position(n)] => Some(*n as usize),
                        _ => None,
                    };
                    match (existing, position) {
                        (Some(id), Some(_)) => {
                            if is_last && snode.kind == SchemaNodeKind::LeafList {
                                if let Some(text) = value {
                                    if self.change_value(id, text)? {
                                        last = Some(id);
                                    }
                                }
                            }
                            parent = Some(id);
                        }
                        (_, Some(n)) if n != instances.len() + 1 => {
                            return Err(Error::valid(
                                ValidationErrorCode::Xpath,
                                format!("Invalid position {} of \"{}\".", n, snode.name),
                            ));
                        }
                        _ => {
                            let id = match snode.kind {
                                SchemaNodeKind::List => self.create_inner(parent, schema),
                                _ => self.create_term(parent, schema, value.unwrap_or(""))?,
                            };
                            last = Some(id);
                            parent = Some(id);
                        }
                    }
                }
                SchemaNodeKind::LeafList => {
                    let text = segment
                        .predicates
                        .iter()
                        .find_map(|pred| match pred {
                            PathPredicate::Value(value) => Some(value.as_str()),
                            _ => None,
                        })
                        .or(value)
                        .unwrap_or("");
                    let existing = instances
                        .iter()
                        .copied()
                        .find(|id| self.value_matches_text(*id, text));
                    match existing {
                        Some(_) if is_last && !update => return Err(exists(&snode.name)),
                        Some(id) => {
                            if self.nodes[id].flags.contains(NodeFlags::DEFAULT) {
                                self.make_explicit(id);
                                last = Some(id);
                            }
                            parent = Some(id);
                        }
                        None => {
                            let id = self.create_term(parent, schema, text)?;
                            last = Some(id);
                            parent = Some(id);
                        }
                    }
                }
                SchemaNodeKind::Leaf => {
                    if !is_last {
                        return Err(Error::valid(
                            ValidationErrorCode::Xpath,
                            format!("Leaf \"{}\" can't have children.", snode.name),
                        ));
                    }
                    let text = value.unwrap_or("");
                    match existing {
                        Some(_) if !update => return Err(exists(&snode.name)),
                        Some(id) => {
                            if self.change_value(id, text)? {
                                last = Some(id);
                            }
                            parent = Some(id);
                        }
                        None => {
                            let id = match self.create_term(parent, schema, text) {
                                Ok(id) => id,
                                Err(error)
                                    if options.contains(NewValueCreationFlags::OPAQ)
                                        && error.errcode == ErrorCode::Valid =>
                                {
                                    let opaque = Opaque {
                                        name: snode.name.to_string(),
                                        module: Some(
                                            context.modules[snode.module].name.to_string(),
                                        ),
                                        namespace: None,
                                        value: text.to_owned(),
                                    };
                                    self.create_opaque(parent, opaque)
                                }
                                Err(error) => return Err(error),
                            };
                            last = Some(id);
                            parent = Some(id);
                        }
                    }
                }
                SchemaNodeKind::AnyData => {
                    let any = AnyValue::String(value.unwrap_or("").to_owned());
                    match existing {
                        Some(_) if !update => return Err(exists(&snode.name)),
                        Some(id) => {
                            self.nodes[id].value = NodeValue::Any(any);
                            self.make_explicit(id);
                            last = Some(id);
                            parent = Some(id);
                        }
                        None => {
                            let id = self.alloc(Some(schema), NodeValue::Any(any));
                            self.link_child(parent, id);
                            self.created(id);
                            last = Some(id);
                            parent = Some(id);
                        }
                    }
                }
                _ => match existing {
                    Some(_) if is_last && !update => return Err(exists(&snode.name)),
                    Some(id) => parent = Some(id),
                    None => {
                        let id = self.create_inner(parent, schema);
                        last = Some(id);
                        parent = Some(id);
                    }
                },
            }
        }
        Ok(last)
    }

    /// Create a new inner node (container, notification, RPC or action) in the
    /// data tree.
    ///
    /// The module is required for top-level nodes, otherwise it defaults to
    /// the module of the parent.
    ///
    /// Returns the created node.
    pub fn new_inner(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
    ) -> Result<DataNodeId> {
        let context: &'a Context = self.context;
        let result = self.resolve_new(parent, module, name).and_then(|(parent, schema)| {
            match context.schema.nodes[schema].kind {
                SchemaNodeKind::Container
                | SchemaNodeKind::Rpc
                | SchemaNodeKind::Action
                | SchemaNodeKind::Notification => {}
                _ => return Err(Error::inval(format!("\"{}\" is not an inner node.", name))),
            }
            if !self.instances(parent, schema).is_empty() {
                return Err(exists(name));
            }
            Ok(self.create_inner(parent, schema))
        });
        result
            .map(DataNodeId)
            .map_err(|error| self.context.log_error(error))
    }

    /// Create a new list node in the data tree.
    ///
    /// The `keys` parameter should be a string containing key-value pairs in
    /// the format:"[key1='val1'][key2='val2']...". The order of the key-value
    /// pairs does not matter.
    ///
    /// Returns the created node.
    pub fn new_list(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        keys: &str,
    ) -> Result<DataNodeId> {
        let context: &'a Context = self.context;
        let result = self.resolve_new(parent, module, name).and_then(|(parent, schema)| {
            let snode = &context.schema.nodes[schema];
            let module_name = &context.modules[snode.module].name;
            let segments = parse_data_path(&format!("/{}:{}{}", module_name, name, keys))?;
            let predicates = segments
                .into_iter()
                .next()
                .map(|segment| segment.predicates)
                .unwrap_or_default();
            let values = snode
                .list_keys()
                .iter()
                .map(|key| {
                    let key = &context.schema.nodes[*key];
                    predicates
                        .iter()
                        .find_map(|pred| match pred {
                            PathPredicate::Key { name, value, .. } if *name == *key.name => {
                                Some(value.clone())
                            }
                            _ => None,
                        })
                        .ok_or_else(|| {
                            Error::inval(format!("Missing value of list key \"{}\".", key.name))
                        })
                })
                .collect::<Result<Vec<String>>>()?;
            self.create_list(parent, schema, &values)
        });
        result
            .map(DataNodeId)
            .map_err(|error| self.context.log_error(error))
    }

    /// Create a new list node in the data tree.
    ///
    /// The `keys` parameter should be a slice of strings representing the key
    /// values for the new list instance. All keys must be provided in the
    /// correct order.
    ///
    /// Returns the created node.
    pub fn new_list2(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        keys: &[impl AsRef<str>],
    ) -> Result<DataNodeId> {
        let keys: Vec<String> = keys.iter().map(|key| key.as_ref().to_owned()).collect();
        let result = self
            .resolve_new(parent, module, name)
            .and_then(|(parent, schema)| self.create_list(parent, schema, &keys));
        result
            .map(DataNodeId)
            .map_err(|error| self.context.log_error(error))
    }

    /// Create a new term node (leaf or leaf-list) in the data tree.
    ///
    /// Returns the created node.
    pub fn new_term(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        value: Option<&str>,
    ) -> Result<DataNodeId> {
        let context: &'a Context = self.context;
        let result = self.resolve_new(parent, module, name).and_then(|(parent, schema)| {
            let snode = &context.schema.nodes[schema];
            let text = value.unwrap_or("");
            let duplicate = self.instances(parent, schema).into_iter().any(|id| {
                !self.nodes[id].flags.contains(NodeFlags::DEFAULT)
                    && (snode.kind == SchemaNodeKind::Leaf
                        || snode.is_config() && self.value_matches_text(id, text))
            });
            match snode.kind {
                SchemaNodeKind::Leaf | SchemaNodeKind::LeafList if duplicate => Err(exists(name)),
                SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
                    self.create_term(parent, schema, text)
                }
                _ => Err(Error::inval(format!("\"{}\" is not a leaf or leaf-list.", name))),
            }
        });
        result
            .map(DataNodeId)
            .map_err(|error| self.context.log_error(error))
    }

    /// Create a new anydata or anyxml node in the data tree.
    pub fn new_any(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
        value: DataAnyValue<'_, '_>,
    ) -> Result<DataNodeId> {
        let any = match value {
            DataAnyValue::Tree(tree) => {
                let roots = tree.child_ids(None);
                let options = DataPrinterFlags::WITH_SIBLINGS | DataPrinterFlags::SHRINK;
                AnyValue::Tree {
                    json: json::print(tree, &roots, options),
                    xml: xml::print(tree, &roots, options),
                }
            }
            DataAnyValue::String(value) => AnyValue::String(value.to_owned()),
            DataAnyValue::Xml(value) => AnyValue::Xml(value.to_owned()),
            DataAnyValue::Json(value) => AnyValue::Json(value.to_owned()),
        };
        let result = self.resolve_new(parent, module, name).and_then(|(parent, schema)| {
            if self.context.schema.nodes[schema].kind != SchemaNodeKind::AnyData {
                return Err(Error::inval(format!("\"{}\" is not an anydata or anyxml.", name)));
            }
            if !self.instances(parent, schema).is_empty() {
                return Err(exists(name));
            }
            let id = self.alloc(Some(schema), NodeValue::Any(any));
            self.link_child(parent, id);
            self.rehash(id);
            self.created(id);
            Ok(id)
        });
        result
            .map(DataNodeId)
            .map_err(|error| self.context.log_error(error))
    }

    /// Create a new opaque node, without a schema definition.
    pub fn new_opaq(
        &mut self,
        parent: Option<DataNodeId>,
        module: Option<&str>,
        name: &str,
        value: Option<&str>,
    ) -> Result<DataNodeId> {
        if let Some(parent) = parent {
            self.check_id(parent)?;
        }
        let namespace = module
            .and_then(|module| self.context.module_by_name(module))
            .map(|module| self.context.modules[module].namespace.to_string());
        let opaque = Opaque {
            name: name.to_owned(),
            module: module.map(str::to_owned),
            namespace,
            value: value.unwrap_or("").to_owned(),
        };
        Ok(DataNodeId(self.create_opaque(parent.map(|p| p.0), opaque)))
    }

    /// Insert a copy of every top-level node of `subtree` as children of
    /// `parent`.
    ///
    /// Returns the inserted nodes.
    pub fn insert_child(
        &mut self,
        parent: DataNodeId,
        subtree: &DataTree<'a>,
    ) -> Result<Vec<DataNodeId>> {
        self.check_id(parent)?;
        self.insert_under(Some(parent.0), subtree)
            .map_err(|error| self.context.log_error(error))
    }

    /// Insert a copy of every top-level node of `subtree` as siblings of
    /// `sibling`, or as top-level nodes when `sibling` is `None`. Schema
    /// order is kept.
    pub fn insert_sibling(
        &mut self,
        sibling: Option<DataNodeId>,
        subtree: &DataTree<'a>,
    ) -> Result<Vec<DataNodeId>> {
        let parent = match sibling {
            Some(sibling) => {
                self.check_id(sibling)?;
                self.nodes[sibling.0].links.parent
            }
            None => None,
        };
        self.insert_under(parent, subtree)
            .map_err(|error| self.context.log_error(error))
    }

    /// Insert a copy of `subtree` right before `sibling`. Only instances of the
    /// same user-ordered list or leaf-list can be placed this way.
    pub fn insert_before(
        &mut self,
        sibling: DataNodeId,
        subtree: &DataTree<'a>,
    ) -> Result<Vec<DataNodeId>> {
        self.insert_at(sibling, subtree, true)
            .map_err(|error| self.context.log_error(error))
    }

    /// Insert a copy of `subtree` right after `sibling`. Only instances of the
    /// same user-ordered list or leaf-list can be placed this way.
    pub fn insert_after(
        &mut self,
        sibling: DataNodeId,
        subtree: &DataTree<'a>,
    ) -> Result<Vec<DataNodeId>> {
        self.insert_at(sibling, subtree, false)
            .map_err(|error| self.context.log_error(error))
    }

    fn insert_under(
        &mut self,
        parent: Option<usize>,
        subtree: &DataTree<'a>,
    ) -> Result<Vec<DataNodeId>> {
        let parent_schema = match parent {
            Some(parent) => match self.nodes[parent].schema {
                Some(schema) => Some(schema),
                None => {
                    return Err(Error::inval("Cannot insert under an opaque node."));
                }
            },
            None => None,
        };
        let roots = subtree.child_ids(None);
        for root in &roots {
            if let Some(schema) = subtree.nodes[*root].schema {
                if self.context.schema.data_parent(schema) != parent_schema {
                    return Err(Error::inval(format!(
                        "Node \"{}\" can't be inserted here.",
                        self.context.schema.nodes[schema].name
                    )));
                }
            }
            self.check_duplicate(parent, subtree, *root)?;
        }
        let mut ids = Vec::new();
        for root in roots {
            let id = self.copy_subtree(parent, subtree, root, true);
            self.created(id);
            ids.push(DataNodeId(id));
        }
        Ok(ids)
    }

    fn insert_at(
        &mut self,
        sibling: DataNodeId,
        subtree: &DataTree<'a>,
        before: bool,
    ) -> Result<Vec<DataNodeId>> {
        self.check_id(sibling)?;
        let schema = self.nodes[sibling.0].schema;
        let user_ordered = self
            .snode(sibling.0)
            .is_some_and(|snode| snode.is_user_ordered());
        let parent = self.nodes[sibling.0].links.parent;
        let roots = subtree.child_ids(None);
        for root in &roots {
            if !user_ordered || subtree.nodes[*root].schema != schema {
                return Err(Error::inval(
                    "Only instances of the same user-ordered list or leaf-list can be placed relative to each other.",
                ));
            }
            self.check_duplicate(parent, subtree, *root)?;
        }
        let mut ids = Vec::new();
        let mut anchor = sibling.0;
        for root in roots {
            let id = self.copy_node_detached(subtree, root);
            self.nodes[id].links.parent = parent;
            self.link_at(anchor, id, before && anchor == sibling.0);
            self.rehash(id);
            self.created(id);
            // Keep the relative order of the inserted nodes.
            anchor = id;
            ids.push(DataNodeId(id));
        }
        Ok(ids)
    }

    /// Copies a subtree without linking its root.
    fn copy_node_detached(&mut self, src: &DataTree<'a>, src_id: usize) -> usize {
        let id = self.copy_node(src, src_id, true);
        self.copy_children(id, src, src_id, true);
        id
    }

    fn check_duplicate(
        &self,
        parent: Option<usize>,
        src: &DataTree<'_>,
        src_id: usize,
    ) -> Result<()> {
        let Some(snode) = src.snode(src_id) else {
            return Ok(());
        };
        let multi = match snode.kind {
            SchemaNodeKind::List => snode.flags.contains(SchemaFlags::KEYLESS),
            SchemaNodeKind::LeafList => !snode.is_config(),
            _ => false,
        };
        if multi {
            return Ok(());
        }
        match self.find_instance(parent, src, src_id) {
            Some(id) if !self.nodes[id].flags.contains(NodeFlags::DEFAULT) => {
                Err(exists(&snode.name))
            }
            _ => Ok(()),
        }
    }

    /// Unlink the node from the tree, returning its subtree as a new tree.
    pub fn unlink(&mut self, node: DataNodeId) -> Result<DataTree<'a>> {
        self.check_id(node)?;
        self.check_not_key(node.0)?;
        let mut tree = DataTree::new(self.context);
        tree.copy_subtree(None, self, node.0, true);
        self.free_node(node.0);
        Ok(tree)
    }

    /// Remove a data node.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let id = match self.find_path_ids(path, false) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(self.context.log_error(
                    Error::not_found(format!("Data node \"{}\" not found.", path))
                        .with_path(path),
                ))
            }
            Err(error) => return Err(self.context.log_error(error)),
        };
        self.remove_node(DataNodeId(id))
    }

    /// Remove the data node (and its subtree) with the given handle.
    pub fn remove_node(&mut self, node: DataNodeId) -> Result<()> {
        self.check_id(node)?;
        self.check_not_key(node.0)
            .map_err(|error| self.context.log_error(error))?;
        self.free_node(node.0);
        Ok(())
    }

    fn check_not_key(&self, id: usize) -> Result<()> {
        let is_key = self
            .snode(id)
            .is_some_and(|snode| snode.flags.contains(SchemaFlags::KEY));
        if is_key && self.nodes[id].links.parent.is_some() {
            return Err(Error::inval("List keys can't be removed."));
        }
        Ok(())
    }

    /// Change the value of a term node.
    ///
    /// Returns whether the value (or the default flag) actually changed.
    pub fn change_term(&mut self, node: DataNodeId, value: &str) -> Result<bool> {
        self.check_id(node)?;
        self.check_not_key(node.0)
            .and_then(|_| self.change_value(node.0, value))
            .map_err(|error| self.context.log_error(error))
    }

    fn change_value(&mut self, id: usize, text: &str) -> Result<bool> {
        let Some(schema) = self.nodes[id].schema else {
            return Err(Error::inval("Opaque nodes have no typed value."));
        };
        let value = self.store_term(schema, text, Prefixes::Json)?;
        let unchanged = matches!(&self.nodes[id].value,
            NodeValue::Term(old) if old.canonical == value.canonical);
        let implicit = self.nodes[id].flags.contains(NodeFlags::DEFAULT);
        if unchanged && !implicit {
            return Ok(false);
        }
        if !unchanged {
            let snode = &self.context.schema.nodes[schema];
            if snode.kind == SchemaNodeKind::LeafList && snode.is_config() {
                let parent = self.nodes[id].links.parent;
                let taken = self.instances(parent, schema).into_iter().any(|other| {
                    other != id
                        && matches!(&self.nodes[other].value,
                            NodeValue::Term(v) if v.canonical == value.canonical)
                });
                if taken {
                    return Err(exists(&snode.name));
                }
            }
        }
        self.nodes[id].value = NodeValue::Term(value);
        self.make_explicit(id);
        self.rehash(id);
        Ok(true)
    }

    /// Create a copy of the data tree.
    pub fn duplicate(&self) -> Result<DataTree<'a>> {
        let mut dup = DataTree::new(self.context);
        for root in self.child_ids(None) {
            dup.copy_subtree(None, self, root, true);
        }
        Ok(dup)
    }

    /// Merge the source data tree into the target data tree. Merge may not be
    /// complete until validation is called on the resulting data tree (data
    /// from more cases may be present, default and non-default values).
    pub fn merge(&mut self, source: &DataTree<'a>) -> Result<()> {
        self.merge_with_flags(source, DataMergeFlags::empty())
    }

    /// Same as [`DataTree::merge`], with explicit merge options.
    pub fn merge_with_flags(
        &mut self,
        source: &DataTree<'a>,
        options: DataMergeFlags,
    ) -> Result<()> {
        for root in source.child_ids(None) {
            self.merge_node(None, source, root, options);
        }
        Ok(())
    }

    fn merge_node(
        &mut self,
        parent: Option<usize>,
        src: &DataTree<'a>,
        src_id: usize,
        options: DataMergeFlags,
    ) {
        let Some(id) = self.find_instance(parent, src, src_id) else {
            let id = self.copy_subtree(parent, src, src_id, true);
            self.created(id);
            return;
        };
        let src_default = src.nodes[src_id].flags.contains(NodeFlags::DEFAULT);
        let target_default = self.nodes[id].flags.contains(NodeFlags::DEFAULT);
        match &src.nodes[src_id].value {
            NodeValue::Term(value) => {
                if src_default && !target_default && !options.contains(DataMergeFlags::DEFAULTS) {
                    return;
                }
                let changed = !matches!(&self.nodes[id].value,
                    NodeValue::Term(old) if old.canonical == value.canonical);
                if changed || src_default != target_default {
                    self.nodes[id].value = NodeValue::Term(value.clone());
                    if src_default {
                        self.nodes[id].flags.insert(NodeFlags::DEFAULT);
                        self.mark_dirty(Some(id));
                    } else {
                        self.make_explicit(id);
                    }
                    self.rehash(id);
                }
            }
            NodeValue::Any(any) => {
                self.nodes[id].value = NodeValue::Any(any.clone());
                self.make_explicit(id);
            }
            NodeValue::Inner | NodeValue::Opaque(_) => {
                for child in src.child_ids(Some(src_id)) {
                    self.merge_node(Some(id), src, child, options);
                }
            }
        }
    }

    // ----- helpers -----

    fn resolve_new(
        &self,
        parent: Option<DataNodeId>,
        module: Option<&SchemaModule<'_>>,
        name: &str,
    ) -> Result<(Option<usize>, usize)> {
        self.context.check_compiled()?;
        let parent = match parent {
            Some(parent) => {
                self.check_id(parent)?;
                Some(parent.0)
            }
            None => None,
        };
        let parent_snode = parent.and_then(|p| self.snode(p));
        if parent.is_some() && parent_snode.is_none() {
            return Err(Error::inval("Cannot create nodes under an opaque node."));
        }
        let module = match (module, parent_snode) {
            (Some(module), _) => module.id(),
            (None, Some(snode)) => snode.module,
            (None, None) => {
                return Err(Error::inval(format!(
                    "Module of top-level node \"{}\" not specified.",
                    name
                )));
            }
        };
        let parent_schema = parent.and_then(|p| self.nodes[p].schema);
        let schema = self
            .schema_child(parent_schema, module, name, false)
            .or_else(|| self.schema_child(parent_schema, module, name, true))
            .ok_or_else(|| {
                Error::not_found(format!("Schema node \"{}\" not found.", name))
            })?;
        Ok((parent, schema))
    }

    fn created(&mut self, id: usize) {
        self.nodes[id].flags.insert(NodeFlags::NEW);
        self.mark_dirty(Some(id));
    }

    // Turns an implicit node into an explicit one.
    fn make_explicit(&mut self, id: usize) {
        self.nodes[id].flags.remove(NodeFlags::DEFAULT);
        self.nodes[id].flags.insert(NodeFlags::NEW);
        let mut ancestor = self.nodes[id].links.parent;
        while let Some(p) = ancestor {
            self.nodes[p].flags.remove(NodeFlags::DEFAULT);
            ancestor = self.nodes[p].links.parent;
        }
        self.mark_dirty(Some(id));
    }

    fn value_matches_text(&self, id: usize, text: &str) -> bool {
        self.matches_predicates(id, &[PathPredicate::Value(text.to_owned())], 0)
    }

    pub(crate) fn create_inner(&mut self, parent: Option<usize>, schema: usize) -> usize {
        let id = self.alloc(Some(schema), NodeValue::Inner);
        self.link_child(parent, id);
        self.rehash(id);
        self.created(id);
        id
    }

    pub(crate) fn create_term(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        text: &str,
    ) -> Result<usize> {
        let value = self
            .store_term(schema, text, Prefixes::Json)
            .map_err(|error| error.with_path(self.child_path(parent, schema)))?;
        let id = self.alloc(Some(schema), NodeValue::Term(value));
        self.link_child(parent, id);
        self.rehash(id);
        self.created(id);
        Ok(id)
    }

    fn create_list(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        keys: &[String],
    ) -> Result<usize> {
        let context: &'a Context = self.context;
        let snode = &context.schema.nodes[schema];
        if snode.kind != SchemaNodeKind::List {
            return Err(Error::inval(format!("\"{}\" is not a list.", snode.name)));
        }
        let key_schemas = snode.list_keys();
        if key_schemas.len() != keys.len() {
            return Err(Error::inval(format!(
                "List \"{}\" has {} keys, {} given.",
                snode.name,
                key_schemas.len(),
                keys.len()
            )));
        }
        let mut values = Vec::with_capacity(keys.len());
        for (key, text) in key_schemas.iter().zip(keys) {
            values.push(self.store_term(*key, text, Prefixes::Json)?);
        }
        let duplicate = self.instances(parent, schema).into_iter().any(|id| {
            self.key_values(id)
                .iter()
                .zip(&values)
                .all(|(old, new)| *old == Some(&*new.canonical))
        });
        if duplicate {
            return Err(exists(&snode.name));
        }

        let id = self.alloc(Some(schema), NodeValue::Inner);
        for (key, value) in key_schemas.iter().zip(values) {
            let key_id = self.alloc(Some(*key), NodeValue::Term(value));
            let mut head = self.nodes[id].links.child;
            crate::utils::link_append(self, &mut head, Some(id), key_id);
            self.nodes[id].links.child = head;
            self.rehash(key_id);
        }
        self.link_child(parent, id);
        self.rehash(id);
        self.created(id);
        Ok(id)
    }

    fn create_opaque(&mut self, parent: Option<usize>, opaque: Opaque) -> usize {
        let id = self.alloc(None, NodeValue::Opaque(opaque));
        self.link_child(parent, id);
        self.rehash(id);
        self.created(id);
        id
    }
}

fn exists(name: &str) -> Error {
    Error::new(
        ErrorCode::Exist,
        format!("Data node \"{}\" already exists.", name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextFlags;
    use crate::data::Data;
    use crate::schema::SchemaInputFormat;
    use crate::utils::siblings_consistent;

    const MODULE: &str = r#"module t {
      namespace "urn:t";
      prefix t;
      container c {
        leaf-list ll { type string; ordered-by user; }
        list l {
          key "k";
          ordered-by user;
          leaf k { type string; }
          leaf v { type string; }
        }
      }
    }"#;

    fn assert_consistent(tree: &DataTree<'_>) {
        assert!(siblings_consistent(tree, tree.first));
        for dnode in tree.nodes.iter().filter(|dnode| dnode.alive) {
            assert!(siblings_consistent(tree, dnode.links.child));
        }
    }

    #[test]
    fn edits_keep_sibling_lists_consistent() {
        let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
        ctx.parse_module_str(MODULE, SchemaInputFormat::YANG, &[])
            .unwrap();
        let mut tree = DataTree::new(&ctx);
        for key in ["a", "b", "c"] {
            let path = format!("/t:c/l[k='{}']/v", key);
            tree.new_path(&path, Some("x"), false).unwrap();
            let path = format!("/t:c/ll[.='{}']", key);
            tree.new_path(&path, None, false).unwrap();
        }
        assert_consistent(&tree);

        let b = tree.find_path("/t:c/l[k='b']").unwrap().id();
        let detached = tree.unlink(b).unwrap();
        assert_consistent(&tree);
        assert_consistent(&detached);

        let a = tree.find_path("/t:c/l[k='a']").unwrap().id();
        tree.insert_before(a, &detached).unwrap();
        assert_consistent(&tree);

        tree.remove("/t:c/ll[.='a']").unwrap();
        tree.remove("/t:c/l[k='c']").unwrap();
        assert_consistent(&tree);

        let keys: Vec<String> = tree
            .find_xpath("/t:c/l/k")
            .unwrap()
            .filter_map(|dnode| dnode.value_canonical())
            .collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
