//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Comparison of the schemas of two contexts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::context::Context;
use crate::schema::types::base_name;
use crate::schema::{
    DataValueType, SchemaLeafType, SchemaNode, SchemaNodeKind, SchemaPathFormat,
};

/// A single difference between two schema trees.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchemaChange {
    /// Schema path of the node.
    pub path: String,
    pub kind: SchemaChangeKind,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SchemaChangeKind {
    /// The node exists only in the new context.
    NodeAdded,
    /// The node exists only in the old context.
    NodeRemoved { status: &'static str },
    /// A single-valued property differs.
    Changed {
        attribute: &'static str,
        old: Option<String>,
        new: Option<String>,
    },
    /// A value was added to a set-valued property (must, base-type, length,
    /// range, pattern, enum or bit).
    OptionAdded { option: &'static str, value: String },
    /// A value was removed from a set-valued property.
    OptionRemoved { option: &'static str, value: String },
    ExtensionAdded {
        module: String,
        name: String,
        argument: Option<String>,
    },
    ExtensionRemoved {
        module: String,
        name: String,
        argument: Option<String>,
    },
    ExtensionChanged {
        module: String,
        name: String,
        old: Option<String>,
        new: Option<String>,
    },
}

// ===== impl SchemaChange =====

impl fmt::Display for SchemaChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = &self.path;
        match &self.kind {
            SchemaChangeKind::NodeAdded => write!(f, "+{}: added node", path),
            SchemaChangeKind::NodeRemoved { status } => {
                write!(f, "-{}: removed status={} node", path, status)
            }
            SchemaChangeKind::Changed {
                attribute,
                old,
                new,
            } => write!(
                f,
                "*{}: {} \"{}\" -> \"{}\"",
                path,
                attribute,
                old.as_deref().unwrap_or_default(),
                new.as_deref().unwrap_or_default()
            ),
            SchemaChangeKind::OptionAdded { option, value } => {
                write!(f, "+{}: {} \"{}\"", path, option, value)
            }
            SchemaChangeKind::OptionRemoved { option, value } => {
                write!(f, "-{}: {} \"{}\"", path, option, value)
            }
            SchemaChangeKind::ExtensionAdded {
                module,
                name,
                argument,
            } => write!(
                f,
                "+{}: extension {}:{} \"{}\"",
                path,
                module,
                name,
                argument.as_deref().unwrap_or_default()
            ),
            SchemaChangeKind::ExtensionRemoved {
                module,
                name,
                argument,
            } => write!(
                f,
                "-{}: extension {}:{} \"{}\"",
                path,
                module,
                name,
                argument.as_deref().unwrap_or_default()
            ),
            SchemaChangeKind::ExtensionChanged {
                module,
                name,
                old,
                new,
            } => write!(
                f,
                "*{}: extension {}:{} \"{}\" -> \"{}\"",
                path,
                module,
                name,
                old.as_deref().unwrap_or_default(),
                new.as_deref().unwrap_or_default()
            ),
        }
    }
}

// ===== helper functions =====

fn flatten<'a>(
    node: SchemaNode<'a>,
    exclude: &mut dyn FnMut(&SchemaNode<'_>) -> bool,
    nodes: &mut BTreeMap<String, SchemaNode<'a>>,
) {
    if exclude(&node) {
        return;
    }
    for child in node.all_children() {
        flatten(child, exclude, nodes);
    }
    nodes.insert(node.path(SchemaPathFormat::LOG), node);
}

fn collect<'a>(
    context: &'a Context,
    exclude: &mut dyn FnMut(&SchemaNode<'_>) -> bool,
) -> BTreeMap<String, SchemaNode<'a>> {
    let mut nodes = BTreeMap::new();
    for module in context.modules(true) {
        for node in module.data().chain(module.rpcs()).chain(module.notifications()) {
            flatten(node, exclude, &mut nodes);
        }
    }
    nodes
}

fn status(node: &SchemaNode<'_>) -> &'static str {
    if node.is_status_obsolete() {
        "obsolete"
    } else if node.is_status_deprecated() {
        "deprecated"
    } else {
        "current"
    }
}

fn keyword(kind: SchemaNodeKind) -> &'static str {
    match kind {
        SchemaNodeKind::Container => "container",
        SchemaNodeKind::Case => "case",
        SchemaNodeKind::Choice => "choice",
        SchemaNodeKind::Leaf => "leaf",
        SchemaNodeKind::LeafList => "leaf-list",
        SchemaNodeKind::List => "list",
        SchemaNodeKind::AnyData => "anydata",
        SchemaNodeKind::Rpc => "rpc",
        SchemaNodeKind::Input => "input",
        SchemaNodeKind::Output => "output",
        SchemaNodeKind::Action => "action",
        SchemaNodeKind::Notification => "notification",
    }
}

// Type and the member types of unions, recursively.
fn type_closure<'a>(ty: SchemaLeafType<'a>, out: &mut Vec<SchemaLeafType<'a>>) {
    for member in ty.union_types() {
        type_closure(member, out);
    }
    out.push(ty);
}

#[derive(Default)]
struct TypeFacets {
    bases: BTreeSet<String>,
    lengths: BTreeSet<String>,
    ranges: BTreeSet<String>,
    patterns: BTreeSet<String>,
    inverted_patterns: BTreeSet<String>,
    enums: BTreeSet<String>,
    bits: BTreeSet<String>,
}

fn type_facets(node: &SchemaNode<'_>) -> TypeFacets {
    let mut facets = TypeFacets::default();
    let Some(ty) = node.leaf_type() else {
        return facets;
    };
    let mut types = Vec::new();
    type_closure(ty, &mut types);
    for ty in &types {
        if ty.base_type() != DataValueType::Union {
            facets.bases.insert(base_name(ty.base_type()).to_owned());
        }
        facets.lengths.extend(ty.length().map(str::to_owned));
        facets.ranges.extend(ty.range().map(str::to_owned));
        for (pattern, inverted) in ty.patterns() {
            match inverted {
                true => facets.inverted_patterns.insert(pattern.to_owned()),
                false => facets.patterns.insert(pattern.to_owned()),
            };
        }
        facets
            .enums
            .extend(ty.enums().into_iter().map(|(name, _)| name.to_owned()));
        facets
            .bits
            .extend(ty.bits().into_iter().map(|(name, _)| name.to_owned()));
    }
    facets
}

struct Changes<'c> {
    path: &'c str,
    out: &'c mut Vec<SchemaChange>,
}

// ===== impl Changes =====

impl Changes<'_> {
    fn push(&mut self, kind: SchemaChangeKind) {
        self.out.push(SchemaChange {
            path: self.path.to_owned(),
            kind,
        });
    }

    fn attribute(
        &mut self,
        attribute: &'static str,
        old: Option<String>,
        new: Option<String>,
    ) {
        if old != new {
            self.push(SchemaChangeKind::Changed { attribute, old, new });
        }
    }

    fn options(
        &mut self,
        option: &'static str,
        old: &BTreeSet<String>,
        new: &BTreeSet<String>,
    ) {
        for value in old.difference(new) {
            self.push(SchemaChangeKind::OptionRemoved {
                option,
                value: value.clone(),
            });
        }
        for value in new.difference(old) {
            self.push(SchemaChangeKind::OptionAdded {
                option,
                value: value.clone(),
            });
        }
    }

    fn compare(&mut self, old: &SchemaNode<'_>, new: &SchemaNode<'_>) {
        let bool_str = |value: bool| Some(value.to_string());

        self.attribute(
            "node-type",
            Some(keyword(old.kind()).to_owned()),
            Some(keyword(new.kind()).to_owned()),
        );
        self.attribute(
            "description",
            old.description().map(str::to_owned),
            new.description().map(str::to_owned),
        );
        self.attribute("mandatory", bool_str(old.is_mandatory()), bool_str(new.is_mandatory()));
        self.attribute(
            "status",
            Some(status(old).to_owned()),
            Some(status(new).to_owned()),
        );
        let config_false =
            |node: &SchemaNode<'_>| node.is_state().then(|| "false".to_owned());
        self.attribute("config", config_false(old), config_false(new));

        let musts = |node: &SchemaNode<'_>| -> BTreeSet<String> {
            node.musts().map(|must| must.condition().to_owned()).collect()
        };
        self.options("must", &musts(old), &musts(new));

        self.extensions(old, new);

        let is_term = |kind| matches!(kind, SchemaNodeKind::Leaf | SchemaNodeKind::LeafList);
        if is_term(old.kind()) && old.kind() == new.kind() {
            let old_facets = type_facets(old);
            let new_facets = type_facets(new);
            self.options("base-type", &old_facets.bases, &new_facets.bases);
            self.attribute(
                "units",
                old.units().map(str::to_owned),
                new.units().map(str::to_owned),
            );
            self.options("length", &old_facets.lengths, &new_facets.lengths);
            self.options("pattern", &old_facets.patterns, &new_facets.patterns);
            self.options(
                "invert-match pattern",
                &old_facets.inverted_patterns,
                &new_facets.inverted_patterns,
            );
            self.options("range", &old_facets.ranges, &new_facets.ranges);
            self.options("enum", &old_facets.enums, &new_facets.enums);
            self.options("bit", &old_facets.bits, &new_facets.bits);
        }

        match (old.kind(), new.kind()) {
            (SchemaNodeKind::Leaf, SchemaNodeKind::Leaf) => {
                self.attribute(
                    "default",
                    old.default_value_canonical().map(str::to_owned),
                    new.default_value_canonical().map(str::to_owned),
                );
            }
            (SchemaNodeKind::LeafList, SchemaNodeKind::LeafList) => {
                let defaults = |node: &SchemaNode<'_>| {
                    let values = node.default_values_canonical();
                    (!values.is_empty()).then(|| values.join(", "))
                };
                self.attribute("defaults", defaults(old), defaults(new));
                self.attribute(
                    "ordered",
                    bool_str(old.is_user_ordered()),
                    bool_str(new.is_user_ordered()),
                );
            }
            (SchemaNodeKind::Container, SchemaNodeKind::Container) => {
                self.attribute(
                    "presence",
                    old.presence().map(str::to_owned),
                    new.presence().map(str::to_owned),
                );
            }
            (SchemaNodeKind::List, SchemaNodeKind::List) => {
                let keys = |node: &SchemaNode<'_>| {
                    let mut keys: Vec<&str> = node.list_keys().map(|key| key.name()).collect();
                    keys.sort_unstable();
                    Some(keys.join(" "))
                };
                self.attribute("key", keys(old), keys(new));
                self.attribute(
                    "ordered",
                    bool_str(old.is_user_ordered()),
                    bool_str(new.is_user_ordered()),
                );
            }
            _ => {}
        }
    }

    fn extensions(&mut self, old: &SchemaNode<'_>, new: &SchemaNode<'_>) {
        let index = |node: &SchemaNode<'_>| -> BTreeMap<(String, String), Option<String>> {
            let module = node.module();
            node.extension_instances()
                .iter()
                .map(|ext| {
                    let owner = module
                        .imports()
                        .find(|import| import.prefix() == ext.prefix)
                        .map(|import| import.module().name().to_owned())
                        .unwrap_or_else(|| module.name().to_owned());
                    ((owner, ext.name.clone()), ext.arg.clone())
                })
                .collect()
        };
        let old_exts = index(old);
        let new_exts = index(new);
        for ((module, name), argument) in &old_exts {
            if !new_exts.contains_key(&(module.clone(), name.clone())) {
                self.push(SchemaChangeKind::ExtensionRemoved {
                    module: module.clone(),
                    name: name.clone(),
                    argument: argument.clone(),
                });
            }
        }
        for ((module, name), argument) in &new_exts {
            match old_exts.get(&(module.clone(), name.clone())) {
                None => self.push(SchemaChangeKind::ExtensionAdded {
                    module: module.clone(),
                    name: name.clone(),
                    argument: argument.clone(),
                }),
                Some(old) if old != argument => {
                    self.push(SchemaChangeKind::ExtensionChanged {
                        module: module.clone(),
                        name: name.clone(),
                        old: old.clone(),
                        new: argument.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
}

// ===== global functions =====

/// Compares the schemas of two contexts and returns all the differences,
/// sorted by schema path.
///
/// The `exclude` callback is called with each node found in either context.
/// When it returns `true`, the node and all its descendants are left out of
/// the comparison.
pub fn schema_diff(
    old: &Context,
    new: &Context,
    mut exclude: impl FnMut(&SchemaNode<'_>) -> bool,
) -> Vec<SchemaChange> {
    let old_nodes = collect(old, &mut exclude);
    let new_nodes = collect(new, &mut exclude);

    let mut paths: BTreeSet<&String> = old_nodes.keys().collect();
    paths.extend(new_nodes.keys());

    let mut changes = Vec::new();
    for path in paths {
        match (old_nodes.get(path), new_nodes.get(path)) {
            (Some(old), Some(new)) => {
                let mut diff = Changes {
                    path,
                    out: &mut changes,
                };
                diff.compare(old, new);
            }
            (Some(old), None) => changes.push(SchemaChange {
                path: path.clone(),
                kind: SchemaChangeKind::NodeRemoved {
                    status: status(old),
                },
            }),
            (None, Some(_)) => changes.push(SchemaChange {
                path: path.clone(),
                kind: SchemaChangeKind::NodeAdded,
            }),
            (None, None) => {}
        }
    }
    changes
}
