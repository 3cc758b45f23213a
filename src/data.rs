//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG instance data.

mod diff;
mod edit;
pub(crate) mod json;
mod lyb;
mod validate;
pub(crate) mod xml;

use bitflags::bitflags;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::sync::Arc;

use crate::context::{Context, ContextFlags, Prefixes};
use crate::error::{Error, Result, ValidationErrorCode};
use crate::iter::{
    Ancestors, MetadataList, NodeIterable, Set, Siblings, Traverse,
};
use crate::path::{parse_data_path, PathPredicate};
use crate::schema::types::{store_value, Encoding, Value, ValueEnv};
use crate::schema::{
    DataValue, Payload, SNode, SchemaFlags, SchemaModule, SchemaNode,
    SchemaNodeKind,
};
use crate::utils::*;
use crate::xpath::eval::{compile_expr, DataEval, Item, Val};
use crate::xpath::{PrefixFormat, XPathValue};

/// YANG data tree.
#[derive(Debug)]
pub struct DataTree<'a> {
    pub(crate) context: &'a Context,
    pub(crate) nodes: Vec<DNode>,
    pub(crate) first: Option<usize>,
}

/// YANG data node reference.
#[derive(Clone, Debug)]
pub struct DataNodeRef<'a, 'b> {
    tree: &'a DataTree<'b>,
    id: usize,
}

/// Stable handle of a data node within its tree.
///
/// Handles stay valid until the node is removed from the tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DataNodeId(pub(crate) usize);

/// The structure provides information about metadata of a data element. Such
/// attributes must map to annotations as specified in RFC 7952. The only
/// exception is the filter type (in NETCONF get operations) and edit-config's
/// operation attributes. In XML, they are represented as standard XML
/// attributes. In JSON, they are represented as JSON elements starting with the
/// '@' character (for more information, see the YANG metadata RFC).
#[derive(Clone, Debug)]
pub struct Metadata<'a, 'b> {
    dnode: DataNodeRef<'a, 'b>,
    index: usize,
}

/// YANG data tree diff.
#[derive(Debug)]
pub struct DataDiff<'a> {
    tree: DataTree<'a>,
}

/// YANG data diff operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataDiffOp {
    Create,
    Delete,
    Replace,
}

/// Data input/output formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataFormat {
    /// XML instance data format.
    XML,
    /// JSON instance data format.
    JSON,
    /// LYB instance data format.
    LYB,
}

/// Data operation type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DataOperation {
    /// Generic YANG instance data.
    Data,
    /// Instance of a YANG RPC/action request with only "input" data children.
    /// Including all parents in case of an action
    RpcYang,
    /// Instance of a YANG RPC/action reply with only "output" data children.
    /// Including all parents in case of an action.
    ReplyYang,
    /// Instance of a YANG notification, including all parents in case of a
    /// nested one.
    NotificationYang,
}

/// Validation state of a data node. Structural edits reset the node and its
/// ancestors to `Unvalidated`.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub enum ValidationState {
    #[default]
    Unvalidated,
    DefaultsApplied,
    StructurallyValid,
    Clean,
}

/// Value of a new anydata or anyxml node.
#[derive(Clone, Copy, Debug)]
pub enum DataAnyValue<'a, 'b> {
    /// A data tree, kept in both data encodings.
    Tree(&'a DataTree<'b>),
    String(&'a str),
    Xml(&'a str),
    Json(&'a str),
}

bitflags! {
    /// Data parser options.
    ///
    /// Various options to change the data tree parsers behavior.
    ///
    /// Default parser behavior:
    /// - complete input file is always parsed. In case of XML, even not
    ///   well-formed XML document (multiple top-level elements) is parsed in
    ///   its entirety.
    /// - parser silently ignores data without matching schema node definition.
    /// - list instances are checked whether they have all the keys, error is
    ///   raised if not.
    ///
    /// Default parser validation behavior:
    /// - the provided data are expected to provide complete datastore content
    ///   (both the configuration and state data) and performs data validation
    ///   according to all YANG rules, specifics follow.
    /// - list instances are expected to have all the keys (it is not checked).
    /// - instantiated (status) obsolete data print a warning.
    /// - all types are fully resolved (leafref/instance-identifier targets,
    ///   unions) and must be valid (lists have all the keys, leaf(-lists)
    ///   correct values).
    /// - when statements on existing nodes are evaluated, if not satisfied, a
    ///   validation error is raised.
    /// - if-feature statements are evaluated.
    /// - invalid multiple data instances/data from several cases cause a
    ///   validation error.
    /// - implicit nodes (NP containers and default values) are added.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataParserFlags: u32 {
        /// Data will be only parsed and no validation will be performed. When
        /// statements are kept unevaluated, union types may not be fully
        /// resolved, if-feature statements are not checked, and default values
        /// are not added (only the ones parsed are present).
        const NO_VALIDATION = 0x0001;
        /// Instead of silently ignoring data without schema definition raise an
        /// error.
        const STRICT = 0x0002;
        /// Instead of silently ignoring data without definition, parse them
        /// into an opaq node.
        const OPAQ = 0x0004;
        /// Forbid state data in the parsed data.
        const NO_STATE = 0x0008;
    }
}

bitflags! {
    /// Data validation options.
    ///
    /// Various options to change data validation behaviour, both for the parser
    /// and separate validation.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataValidationFlags: u32 {
        /// Consider state data not allowed and raise an error if they are found.
        const NO_STATE = 0x0001;
        /// Validate only modules whose data actually exist.
        const PRESENT = 0x0002;
        /// Do not stop at the first error, collect (and log) all of them.
        const MULTI_ERROR = 0x0004;
    }
}

bitflags! {
    /// Data printer flags.
    ///
    /// Various options to change the data printers behaviour.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataPrinterFlags: u32 {
        /// Flag for printing also the (following) sibling nodes of the data
        /// node.
        const WITH_SIBLINGS = 0x0001;
        /// Flag for output without indentation and formatting new lines.
        const SHRINK = 0x0002;
        /// Preserve empty non-presence containers.
        const KEEP_EMPTY_CONT = 0x0004;
        /// Explicit with-defaults mode. Only the data explicitly being present
        /// in the data tree are printed, so the implicitly added default nodes
        /// are not printed. Note that this is the default value when no WD
        /// option is specified.
        const WD_EXPLICIT = 0x0000;
        /// Trim mode avoids printing the nodes with the value equal to their
        /// default value.
        const WD_TRIM = 0x0010;
        /// Include implicit default nodes.
        const WD_ALL = 0x0020;
        /// Same as WD_ALL, but nodes with their default value are tagged with
        /// the "ietf-netconf-with-defaults:default" annotation.
        const WD_ALL_TAG = 0x0040;
        /// Include implicit default nodes, but tag only those added
        /// implicitly, not the explicit ones with the default value.
        const WD_IMPL_TAG = 0x0080;
    }
}

bitflags! {
    /// Implicit node creation options.
    ///
    /// Default behavior:
    /// - both configuration and state missing implicit nodes are added.
    /// - for existing RPC/action nodes, input implicit nodes are added.
    /// - all implicit node types are added (non-presence containers,
    ///   default leaves, and default leaf-lists).
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataImplicitFlags: u32 {
        /// Do not add any implicit state nodes.
        const NO_STATE = 0x0001;
        /// Do not add any implicit config nodes.
        const NO_CONFIG = 0x0002;
        /// For RPC/action nodes, add output implicit nodes instead of input.
        const OUTPUT = 0x0004;
        /// Do not add any default nodes (leaves/leaf-lists), only non-presence
        /// containers.
        const NO_DEFAULTS = 0x0008;
    }
}

bitflags! {
    /// Data diff options.
    ///
    /// Default behavior:
    /// - Any default nodes are treated as non-existent and ignored.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataDiffFlags: u16 {
        /// Default nodes in the trees are not ignored but treated similarly to
        /// explicit nodes. Also, leaves and leaf-lists are added into diff even
        /// in case only their default flag (state) was changed.
        const DEFAULTS = 0x0001;
    }
}

bitflags! {
    /// Data merge options.
    ///
    /// Default behavior:
    /// - source data tree is not modified in any way,
    /// - any default nodes in the source are ignored if there are explicit
    ///   nodes in the target.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataMergeFlags: u16 {
        /// Default nodes in the source tree replace even explicit nodes in the
        /// target.
        const DEFAULTS = 0x0001;
    }
}

bitflags! {
    /// Data duplication options.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct DataDuplicateFlags: u32 {
        /// If a nested node is being duplicated, duplicate also all the
        /// parents. Keys are also duplicated for lists.
        const WITH_PARENTS = 0x0001;
        /// Do not duplicate metadata.
        const NO_META = 0x0002;
    }
}

bitflags! {
    /// Options for creating new nodes from paths.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct NewValueCreationFlags: u32 {
        /// If the target node exists, is a leaf, and it is updated with a new
        /// value or its default flag is changed, it is returned. If the target
        /// node exists and is not a leaf or generally no change occurs in the
        /// tree, the call fails.
        const UPDATE = 0x0001;
        /// Flag in case the schema of an RPC or action is used, create output
        /// nodes instead of input ones.
        const OUTPUT = 0x0002;
        /// Do not check type validity of the value and, in case it is invalid,
        /// create an opaque node instead of failing.
        const OPAQ = 0x0004;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct NodeFlags: u8 {
        /// Implicitly created node (default value or NP container).
        const DEFAULT = 0x01;
        /// All "when" conditions of the node were evaluated as true.
        const WHEN_TRUE = 0x02;
        /// Created by an edit since the last validation.
        const NEW = 0x04;
    }
}

/// Instance of a metadata annotation.
#[derive(Clone, Debug)]
pub(crate) struct Meta {
    pub module: usize,
    pub name: Arc<str>,
    pub value: Value,
}

/// Opaque node, without schema definition.
#[derive(Clone, Debug, Default)]
pub(crate) struct Opaque {
    pub name: String,
    pub module: Option<String>,
    pub namespace: Option<String>,
    pub value: String,
}

/// Value of an anydata or anyxml node.
#[derive(Clone, Debug)]
pub(crate) enum AnyValue {
    String(String),
    Xml(String),
    Json(String),
    /// A data tree printed in both encodings.
    Tree { json: String, xml: String },
}

impl std::fmt::Display for AnyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnyValue::String(value) | AnyValue::Xml(value) | AnyValue::Json(value) => {
                write!(f, "{}", value)
            }
            AnyValue::Tree { json, .. } => write!(f, "{}", json),
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum NodeValue {
    Inner,
    Term(Value),
    Any(AnyValue),
    Opaque(Opaque),
}

/// Data node stored in the tree arena.
#[derive(Clone, Debug)]
pub(crate) struct DNode {
    pub schema: Option<usize>,
    pub links: NodeLinks,
    pub flags: NodeFlags,
    pub state: ValidationState,
    pub hash: u64,
    pub meta: Vec<Meta>,
    pub value: NodeValue,
    pub alive: bool,
}

/// Options shared by the data parsers.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParseOptions {
    pub flags: DataParserFlags,
    pub op: DataOperation,
}

/// Outcome of looking up the schema of a parsed node.
pub(crate) enum Lookup {
    Schema(usize),
    Opaque,
    Skip,
}

/// Methods common to data trees, data node references and data diffs.
pub trait Data<'a> {
    #[doc(hidden)]
    fn context(&self) -> &'a Context {
        self.tree().context
    }

    #[doc(hidden)]
    fn tree(&self) -> &DataTree<'a>;

    #[doc(hidden)]
    fn start(&self) -> Option<usize>;

    /// Search in the given data for instances of nodes matching the provided
    /// XPath.
    ///
    /// The expected format of the expression is JSON, meaning the first node in
    /// every path must have its module name as prefix or be the special `*`
    /// value for all the nodes.
    fn find_xpath(&self, xpath: &str) -> Result<Set<'_, DataNodeRef<'_, 'a>>> {
        let tree = self.tree();
        let current = match self.start() {
            Some(id) if self.is_node() => Item::Node(id),
            _ => Item::Root,
        };
        let ids = tree
            .eval_xpath(current, xpath, PrefixFormat::Json)
            .and_then(|value| match value {
                Val::Set(items) => Ok(items
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Node(id) => Some(id),
                        _ => None,
                    })
                    .collect::<Vec<_>>()),
                _ => Err(Error::valid(
                    ValidationErrorCode::Xpath,
                    format!("XPath \"{}\" does not select nodes.", xpath),
                )),
            })
            .map_err(|error| self.context().log_error(error))?;
        Ok(Set::new(tree, ids))
    }

    /// Search in the given data for a single node matching the provided
    /// path.
    ///
    /// The path must be absolute and in the JSON format, meaning the first
    /// node must have its module name as prefix. Lists must be identified by
    /// all their keys.
    fn find_path(&self, path: &str) -> Result<DataNodeRef<'_, 'a>> {
        let tree = self.tree();
        match tree.find_path_ids(path, false) {
            Ok(Some(id)) => Ok(DataNodeRef::from_raw(tree, id)),
            Ok(None) => Err(self.context().log_error(
                Error::not_found(format!("Data node \"{}\" not found.", path))
                    .with_path(path),
            )),
            Err(error) => Err(self.context().log_error(error)),
        }
    }

    #[doc(hidden)]
    fn is_node(&self) -> bool {
        false
    }

    /// Print data tree in the specified format.
    fn print_file<W: Write>(
        &self,
        mut writer: W,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<()> {
        let bytes = self.print_bytes(format, options)?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Print data tree in the specified format to a `String`.
    ///
    /// # Warning
    /// For printing a data tree in the `DataFormat::LYB` format, use the
    /// [`Data::print_bytes`] method instead. The `LYB` format is binary and
    /// cannot be represented in a `String`.
    fn print_string(
        &self,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<String> {
        if format == DataFormat::LYB {
            return Err(Error::inval(
                "LYB data can only be printed into bytes.",
            ));
        }
        let bytes = self.print_bytes(format, options)?;
        String::from_utf8(bytes).map_err(|error| Error::inval(error.to_string()))
    }

    /// Print data tree in the specified format to a bytes vector.
    fn print_bytes(
        &self,
        format: DataFormat,
        options: DataPrinterFlags,
    ) -> Result<Vec<u8>> {
        let tree = self.tree();
        let roots: Vec<usize> = match self.start() {
            Some(start) if options.contains(DataPrinterFlags::WITH_SIBLINGS) => {
                let parent = tree.nodes[start].links.parent;
                tree.siblings_from(tree.head(parent)).collect()
            }
            Some(start) => vec![start],
            None => Vec::new(),
        };
        Ok(match format {
            DataFormat::JSON => json::print(tree, &roots, options).into_bytes(),
            DataFormat::XML => xml::print(tree, &roots, options).into_bytes(),
            DataFormat::LYB => lyb::print(tree, &roots),
        })
    }
}

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Create new empty data tree.
    pub fn new(context: &'a Context) -> DataTree<'a> {
        DataTree {
            context,
            nodes: Vec::new(),
            first: None,
        }
    }

    /// Parse (and validate) input data as a YANG data tree.
    pub fn parse_file<R: Read>(
        context: &'a Context,
        mut reader: R,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataTree<'a>> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        DataTree::parse_string(
            context,
            data,
            format,
            parser_options,
            validation_options,
        )
    }

    /// Parse (and validate) input data as a YANG data tree.
    pub fn parse_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        mut parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataTree<'a>> {
        if context.get_options().contains(ContextFlags::NO_STATE) {
            parser_options |= DataParserFlags::NO_STATE;
        }
        let options = ParseOptions {
            flags: parser_options,
            op: DataOperation::Data,
        };
        let result = DataTree::parse_data(context, data.as_ref(), format, options)
            .and_then(|mut tree| {
                if !parser_options.contains(DataParserFlags::NO_VALIDATION) {
                    let mut validation = validation_options;
                    if parser_options.contains(DataParserFlags::NO_STATE) {
                        validation |= DataValidationFlags::NO_STATE;
                    }
                    tree.validate_all(validation, true)?;
                }
                Ok(tree)
            });
        result.map_err(|error| context.log_error(error))
    }

    /// Parse YANG data into an operation data tree.
    pub fn parse_op_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        op: DataOperation,
    ) -> Result<DataTree<'a>> {
        let options = ParseOptions {
            flags: DataParserFlags::NO_VALIDATION | DataParserFlags::STRICT,
            op,
        };
        DataTree::parse_data(context, data.as_ref(), format, options)
            .map_err(|error| context.log_error(error))
    }

    fn parse_data(
        context: &'a Context,
        data: &[u8],
        format: DataFormat,
        options: ParseOptions,
    ) -> Result<DataTree<'a>> {
        context.check_compiled()?;
        let mut tree = DataTree::new(context);
        match format {
            DataFormat::JSON => json::parse(&mut tree, data, options)?,
            DataFormat::XML => xml::parse(&mut tree, data, options)?,
            DataFormat::LYB => lyb::parse(&mut tree, data)?,
        }
        tree.check_operation(options.op)?;
        Ok(tree)
    }

    /// Returns a reference to the fist top-level data node, unless the data
    /// tree is empty.
    pub fn reference<'b>(&'b self) -> Option<DataNodeRef<'b, 'a>> {
        DataNodeRef::from_raw_opt(self, self.first)
    }

    /// Returns a reference to the node with the given handle.
    pub fn node<'b>(&'b self, id: DataNodeId) -> Option<DataNodeRef<'b, 'a>> {
        match self.nodes.get(id.0) {
            Some(dnode) if dnode.alive => Some(DataNodeRef::from_raw(self, id.0)),
            _ => None,
        }
    }

    /// Whether the data tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }

    /// Evaluate an XPath expression on the data tree.
    ///
    /// The context node is the given node, or the document root when `None`.
    /// Metadata selected by the expression are not part of the returned
    /// node-set.
    pub fn evaluate_xpath<'b>(
        &'b self,
        node: Option<DataNodeId>,
        expression: &str,
        format: PrefixFormat<'_>,
    ) -> Result<XPathValue<DataNodeRef<'b, 'a>>> {
        let current = match node {
            Some(id) => {
                self.check_id(id)?;
                Item::Node(id.0)
            }
            None => Item::Root,
        };
        let value = self
            .eval_xpath(current, expression, format)
            .map_err(|error| self.context.log_error(error))?;
        Ok(match value {
            Val::Set(items) => XPathValue::NodeSet(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Item::Node(id) => Some(DataNodeRef::from_raw(self, id)),
                        _ => None,
                    })
                    .collect(),
            ),
            Val::Bool(value) => XPathValue::Boolean(value),
            Val::Num(value) => XPathValue::Number(value),
            Val::Str(value) => XPathValue::String(value),
        })
    }

    pub(crate) fn eval_xpath(
        &self,
        current: Item,
        expression: &str,
        format: PrefixFormat<'_>,
    ) -> Result<Val> {
        self.context.check_compiled()?;
        let (expr, default, mode) = compile_expr(self.context, expression, format)?;
        let module = default
            .or_else(|| match current {
                Item::Node(id) => self.snode(id).map(|snode| snode.module),
                _ => None,
            })
            .unwrap_or(0);
        DataEval::new(self, current, module, mode).eval(&expr, current)
    }

    /// Returns an iterator over all elements in the data tree and its sibling
    /// trees (depth-first search algorithm).
    pub fn traverse<'b>(&'b self) -> impl Iterator<Item = DataNodeRef<'b, 'a>> {
        let top = Siblings::new(self.reference());
        top.flat_map(|dnode| dnode.traverse())
    }

    // ----- arena -----

    pub(crate) fn check_id(&self, id: DataNodeId) -> Result<()> {
        match self.nodes.get(id.0) {
            Some(dnode) if dnode.alive => Ok(()),
            _ => Err(Error::inval("Invalid data node handle.")),
        }
    }

    pub(crate) fn snode(&self, id: usize) -> Option<&'a SNode> {
        let context: &'a Context = self.context;
        self.nodes[id].schema.map(|schema| &context.schema.nodes[schema])
    }

    pub(crate) fn alloc(&mut self, schema: Option<usize>, value: NodeValue) -> usize {
        let id = self.nodes.len();
        self.nodes.push(DNode {
            schema,
            links: NodeLinks::new(id),
            flags: NodeFlags::empty(),
            state: ValidationState::Unvalidated,
            hash: 0,
            meta: Vec::new(),
            value,
            alive: true,
        });
        id
    }

    /// First node of the sibling list under `parent` (top level if `None`).
    pub(crate) fn head(&self, parent: Option<usize>) -> Option<usize> {
        match parent {
            Some(parent) => self.nodes[parent].links.child,
            None => self.first,
        }
    }

    fn set_head(&mut self, parent: Option<usize>, head: Option<usize>) {
        match parent {
            Some(parent) => self.nodes[parent].links.child = head,
            None => self.first = head,
        }
    }

    pub(crate) fn child_ids(&self, parent: Option<usize>) -> Vec<usize> {
        self.siblings_from(self.head(parent)).collect()
    }

    /// Instances of `schema` among the children of `parent`.
    pub(crate) fn instances(&self, parent: Option<usize>, schema: usize) -> Vec<usize> {
        self.siblings_from(self.head(parent))
            .filter(|id| self.nodes[*id].schema == Some(schema))
            .collect()
    }

    /// Links `id` under `parent` keeping siblings in schema order. Instances
    /// of the same schema node stay together, opaque nodes go last.
    pub(crate) fn link_child(&mut self, parent: Option<usize>, id: usize) {
        let mut head = self.head(parent);
        let order = self.snode(id).map(|snode| snode.order);
        let schema = self.nodes[id].schema;
        let mut after = None;
        let mut before = None;
        if let Some(order) = order {
            for sibling in self.siblings_from(head) {
                if sibling == id {
                    continue;
                }
                if self.nodes[sibling].schema == schema {
                    after = Some(sibling);
                } else if after.is_none() && before.is_none() {
                    match self.snode(sibling) {
                        Some(snode) if snode.order <= order => {}
                        _ => before = Some(sibling),
                    }
                }
            }
        }
        match (after, before) {
            (Some(sibling), _) => link_after(self, &mut head, sibling, id),
            (None, Some(sibling)) => link_before(self, &mut head, sibling, id),
            (None, None) => link_append(self, &mut head, parent, id),
        }
        self.set_head(parent, head);
        self.nodes[id].links.parent = parent;
        self.after_insert(id);
    }

    /// Links `id` right before or after `sibling`.
    pub(crate) fn link_at(&mut self, sibling: usize, id: usize, before: bool) {
        let parent = self.nodes[sibling].links.parent;
        let mut head = self.head(parent);
        if before {
            link_before(self, &mut head, sibling, id);
        } else {
            link_after(self, &mut head, sibling, id);
        }
        self.set_head(parent, head);
        self.after_insert(id);
    }

    fn after_insert(&mut self, id: usize) {
        let parent = self.nodes[id].links.parent;
        if !self.nodes[id].flags.contains(NodeFlags::DEFAULT) {
            // NP containers holding explicit data are explicit too.
            let mut ancestor = parent;
            while let Some(p) = ancestor {
                if !self.nodes[p].flags.contains(NodeFlags::DEFAULT) {
                    break;
                }
                self.nodes[p].flags.remove(NodeFlags::DEFAULT);
                ancestor = self.nodes[p].links.parent;
            }
            self.replace_defaults(id);
        }
        self.mark_dirty(Some(id));
        if let Some(parent) = parent {
            if self.snode(id).is_some_and(|snode| snode.flags.contains(SchemaFlags::KEY)) {
                self.rehash(parent);
            }
        }
    }

    // An explicit instance replaces the implicit ones of the same node.
    fn replace_defaults(&mut self, id: usize) {
        let Some(snode) = self.snode(id) else {
            return;
        };
        if !matches!(snode.kind, SchemaNodeKind::Leaf | SchemaNodeKind::LeafList | SchemaNodeKind::Container) {
            return;
        }
        let schema = self.nodes[id].schema;
        let parent = self.nodes[id].links.parent;
        let defaults: Vec<usize> = self
            .siblings_from(self.head(parent))
            .filter(|sibling| {
                *sibling != id
                    && self.nodes[*sibling].schema == schema
                    && self.nodes[*sibling].flags.contains(NodeFlags::DEFAULT)
            })
            .collect();
        for sibling in defaults {
            if snode.kind == SchemaNodeKind::Container {
                // Keep the implicit children of the replaced container.
                continue;
            }
            self.free_node(sibling);
        }
    }

    /// Unlinks `id` from its siblings; the subtree stays allocated.
    pub(crate) fn unlink_node(&mut self, id: usize) {
        let parent = self.nodes[id].links.parent;
        self.mark_dirty(parent);
        let mut head = self.head(parent);
        link_remove(self, &mut head, id);
        self.set_head(parent, head);
        if let Some(parent) = parent {
            self.update_np_default(parent);
        }
    }

    /// Unlinks and frees the subtree of `id`.
    pub(crate) fn free_node(&mut self, id: usize) {
        self.unlink_node(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            self.nodes[next].alive = false;
            stack.extend(self.siblings_from(self.nodes[next].links.child));
        }
    }

    // NP containers with only implicit children become implicit themselves.
    fn update_np_default(&mut self, mut id: usize) {
        loop {
            let is_np = matches!(
                self.snode(id).map(|snode| (&snode.kind, &snode.payload)),
                Some((SchemaNodeKind::Container, Payload::Container { presence: None }))
            );
            if !is_np || self.nodes[id].flags.contains(NodeFlags::DEFAULT) {
                return;
            }
            let explicit = self
                .siblings_from(self.nodes[id].links.child)
                .any(|child| !self.nodes[child].flags.contains(NodeFlags::DEFAULT));
            if explicit {
                return;
            }
            self.nodes[id].flags.insert(NodeFlags::DEFAULT);
            match self.nodes[id].links.parent {
                Some(parent) => id = parent,
                None => return,
            }
        }
    }

    /// Resets the validation state of a node and its ancestors.
    pub(crate) fn mark_dirty(&mut self, mut id: Option<usize>) {
        while let Some(node) = id {
            self.nodes[node].state = ValidationState::Unvalidated;
            id = self.nodes[node].links.parent;
        }
    }

    // ----- values -----

    /// Validates a value of a term node.
    pub(crate) fn store_term(
        &self,
        schema: usize,
        text: &str,
        prefixes: Prefixes<'_>,
    ) -> Result<Value> {
        self.store_encoded_term(schema, text, prefixes, Encoding::Text)
    }

    /// Validates a JSON-encoded value of a term node.
    pub(crate) fn store_encoded_term(
        &self,
        schema: usize,
        text: &str,
        prefixes: Prefixes<'_>,
        encoding: Encoding,
    ) -> Result<Value> {
        let snode = &self.context.schema.nodes[schema];
        let Some(ty) = snode.leaf_type() else {
            return Err(Error::inval(format!(
                "Node \"{}\" is not a leaf or leaf-list.",
                snode.name
            )));
        };
        let env = ValueEnv {
            modules: &self.context.modules,
            store: &self.context.schema,
            prefixes,
            module: snode.module,
            encoding,
        };
        store_value(ty, text, &env).map_err(|error| {
            let path = self.context.schema.schema_path(
                &self.context.modules,
                schema,
                crate::schema::SchemaPathFormat::DATA,
            );
            let mut err = Error::valid(ValidationErrorCode::Data, error.msg)
                .with_schema_path(path)
                .with_apptag(error.apptag);
            if error.plugin {
                err = err.from_plugin();
            }
            err
        })
    }

    /// Validates a metadata value against its annotation.
    pub(crate) fn store_meta(
        &self,
        module: usize,
        name: &str,
        text: &str,
        prefixes: Prefixes<'_>,
    ) -> Result<Meta> {
        self.store_encoded_meta(module, name, text, prefixes, Encoding::Text)
    }

    pub(crate) fn store_encoded_meta(
        &self,
        module: usize,
        name: &str,
        text: &str,
        prefixes: Prefixes<'_>,
        encoding: Encoding,
    ) -> Result<Meta> {
        let Some(annotation) = self.context.schema.annotation(module, name) else {
            return Err(Error::valid(
                ValidationErrorCode::Data,
                format!(
                    "Annotation \"{}:{}\" definition not found.",
                    self.context.modules[module].name, name
                ),
            ));
        };
        let env = ValueEnv {
            modules: &self.context.modules,
            store: &self.context.schema,
            prefixes,
            module,
            encoding,
        };
        let value = store_value(&annotation.ty, text, &env).map_err(|error| {
            Error::valid(ValidationErrorCode::Data, error.msg).with_apptag(error.apptag)
        })?;
        Ok(Meta {
            module,
            name: annotation.name.clone(),
            value,
        })
    }

    /// Sets (or replaces) a metadata instance given by module name.
    pub(crate) fn set_meta(
        &mut self,
        id: usize,
        module: &str,
        name: &str,
        text: &str,
    ) -> Result<()> {
        let module = self
            .context
            .module_by_name(module)
            .ok_or_else(|| Error::not_found(format!("Module \"{}\" not found.", module)))?;
        let meta = self.store_meta(module, name, text, Prefixes::Json)?;
        let list = &mut self.nodes[id].meta;
        match list
            .iter_mut()
            .find(|m| m.module == module && *m.name == *name)
        {
            Some(existing) => *existing = meta,
            None => list.push(meta),
        }
        Ok(())
    }

    pub(crate) fn remove_meta(&mut self, id: usize, module: &str, name: &str) {
        let modules = &self.context.modules;
        self.nodes[id]
            .meta
            .retain(|m| !(&*modules[m.module].name == module && &*m.name == name));
    }

    pub(crate) fn meta_value(&self, id: usize, module: &str, name: &str) -> Option<&str> {
        let modules = &self.context.modules;
        self.nodes[id]
            .meta
            .iter()
            .find(|m| &*modules[m.module].name == module && &*m.name == name)
            .map(|m| &*m.value.canonical)
    }

    pub(crate) fn canonical(&self, id: usize) -> Option<&str> {
        match &self.nodes[id].value {
            NodeValue::Term(value) => Some(&value.canonical),
            _ => None,
        }
    }

    /// Canonical values of the keys of a list instance, in key order.
    pub(crate) fn key_values(&self, id: usize) -> Vec<Option<&str>> {
        let Some(snode) = self.snode(id) else {
            return Vec::new();
        };
        snode
            .list_keys()
            .iter()
            .map(|key| {
                self.siblings_from(self.nodes[id].links.child)
                    .find(|child| self.nodes[*child].schema == Some(*key))
                    .and_then(|child| self.canonical(child))
            })
            .collect()
    }

    /// Whether the term node holds the default value of its schema node.
    /// Inner nodes never do.
    pub(crate) fn is_default_node(&self, id: usize) -> bool {
        let dnode = &self.nodes[id];
        let Some(snode) = self.snode(id) else {
            return false;
        };
        if !snode.is_term() {
            return false;
        }
        if dnode.flags.contains(NodeFlags::DEFAULT) {
            return true;
        }
        match (&snode.payload, &dnode.value) {
            (Payload::Leaf { default: Some(default), .. }, NodeValue::Term(value)) => {
                default.canonical == value.canonical
            }
            _ => false,
        }
    }

    // ----- hashes -----

    pub(crate) fn rehash(&mut self, id: usize) {
        self.nodes[id].hash = self.compute_hash(id);
    }

    fn compute_hash(&self, id: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        match self.snode(id) {
            Some(snode) => {
                snode.module.hash(&mut hasher);
                snode.name.hash(&mut hasher);
                match snode.kind {
                    SchemaNodeKind::List if snode.flags.contains(SchemaFlags::KEYLESS) => {
                        self.hash_subtree(id, &mut hasher);
                    }
                    SchemaNodeKind::List => {
                        for value in self.key_values(id) {
                            value.hash(&mut hasher);
                        }
                    }
                    SchemaNodeKind::LeafList => self.canonical(id).hash(&mut hasher),
                    _ => {}
                }
            }
            None => {
                if let NodeValue::Opaque(opaque) = &self.nodes[id].value {
                    opaque.name.hash(&mut hasher);
                    opaque.module.hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }

    fn hash_subtree(&self, id: usize, hasher: &mut DefaultHasher) {
        for child in self.siblings_from(self.nodes[id].links.child) {
            self.nodes[child].schema.hash(hasher);
            self.canonical(child).hash(hasher);
            self.hash_subtree(child, hasher);
        }
    }

    // ----- lookups -----

    /// Schema child of a data node (or top-level schema node) by name.
    pub(crate) fn schema_child(
        &self,
        parent: Option<usize>,
        module: usize,
        name: &str,
        output: bool,
    ) -> Option<usize> {
        let store = &self.context.schema;
        let parent_snode = parent.map(|p| &store.nodes[p]);
        let operation = matches!(
            parent_snode.map(|snode| snode.kind),
            Some(SchemaNodeKind::Rpc | SchemaNodeKind::Action)
        );
        let candidates = match parent {
            Some(_) => store.data_children(parent, None),
            None => store.data_children(None, Some(module)),
        };
        candidates.into_iter().find(|id| {
            let snode = &store.nodes[*id];
            snode.module == module
                && &*snode.name == name
                && (!operation || snode.flags.contains(SchemaFlags::IN_OUTPUT) == output)
        })
    }

    /// Looks up the schema node of a child being parsed.
    pub(crate) fn lookup_child(
        &self,
        parent: Option<usize>,
        module: Option<usize>,
        name: &str,
        options: &ParseOptions,
    ) -> Result<Lookup> {
        if let Some(parent) = parent {
            if self.nodes[parent].schema.is_none() {
                return Ok(Lookup::Opaque);
            }
        }
        let parent_schema = parent.and_then(|p| self.nodes[p].schema);
        let output = options.op == DataOperation::ReplyYang;
        let found = module.and_then(|module| self.schema_child(parent_schema, module, name, output));
        match found {
            Some(schema) => {
                let snode = &self.context.schema.nodes[schema];
                let is_op = matches!(
                    snode.kind,
                    SchemaNodeKind::Rpc | SchemaNodeKind::Action | SchemaNodeKind::Notification
                );
                if is_op && options.op == DataOperation::Data {
                    return Err(Error::valid(
                        ValidationErrorCode::Data,
                        format!("Unexpected operation node \"{}\" in data.", name),
                    ));
                }
                if options.flags.contains(DataParserFlags::NO_STATE)
                    && snode.flags.contains(SchemaFlags::CONFIG_R)
                {
                    return Err(Error::valid(
                        ValidationErrorCode::Data,
                        format!("Unexpected state node \"{}\" found.", name),
                    ));
                }
                Ok(Lookup::Schema(schema))
            }
            None if options.flags.contains(DataParserFlags::OPAQ) => Ok(Lookup::Opaque),
            None if options.flags.contains(DataParserFlags::STRICT) => Err(Error::valid(
                ValidationErrorCode::Data,
                format!("Node \"{}\" not found in the schema.", name),
            )),
            None => Ok(Lookup::Skip),
        }
    }

    /// Checks a parsed list instance has all its keys and stamps its hash.
    pub(crate) fn finish_node(&mut self, id: usize) -> Result<()> {
        if let Some(snode) = self.snode(id) {
            if snode.kind == SchemaNodeKind::List {
                if self.key_values(id).iter().any(|value| value.is_none()) {
                    return Err(Error::valid(
                        ValidationErrorCode::Data,
                        format!("List instance is missing its key of \"{}\".", snode.name),
                    )
                    .with_path(self.node_path(id)));
                }
            }
        }
        self.rehash(id);
        Ok(())
    }

    fn check_operation(&self, op: DataOperation) -> Result<()> {
        if op == DataOperation::Data {
            return Ok(());
        }
        let mut stack: Vec<usize> = self.child_ids(None);
        let mut found = 0;
        while let Some(id) = stack.pop() {
            match self.snode(id).map(|snode| snode.kind) {
                Some(SchemaNodeKind::Rpc | SchemaNodeKind::Action) => {
                    if op == DataOperation::NotificationYang {
                        break;
                    }
                    found += 1;
                }
                Some(SchemaNodeKind::Notification) => {
                    if op != DataOperation::NotificationYang {
                        break;
                    }
                    found += 1;
                }
                Some(SchemaNodeKind::Container | SchemaNodeKind::List) => {
                    stack.extend(self.child_ids(Some(id)));
                }
                _ => {}
            }
        }
        if found != 1 {
            return Err(Error::valid(
                ValidationErrorCode::Data,
                "Operation data must contain exactly one operation node.",
            ));
        }
        Ok(())
    }

    /// Generates the data path of a node.
    pub(crate) fn node_path(&self, id: usize) -> String {
        let mut chain = vec![id];
        let mut parent = self.nodes[id].links.parent;
        while let Some(p) = parent {
            chain.push(p);
            parent = self.nodes[p].links.parent;
        }
        let modules = &self.context.modules;
        let mut path = String::new();
        let mut prev_module = None;
        for id in chain.into_iter().rev() {
            path.push('/');
            let Some(snode) = self.snode(id) else {
                if let NodeValue::Opaque(opaque) = &self.nodes[id].value {
                    if let Some(module) = &opaque.module {
                        path.push_str(module);
                        path.push(':');
                    }
                    path.push_str(&opaque.name);
                }
                prev_module = None;
                continue;
            };
            if prev_module != Some(snode.module) {
                path.push_str(&modules[snode.module].name);
                path.push(':');
                prev_module = Some(snode.module);
            }
            path.push_str(&snode.name);
            match snode.kind {
                SchemaNodeKind::List if !snode.flags.contains(SchemaFlags::KEYLESS) => {
                    let keys = snode.list_keys();
                    for (key, value) in keys.iter().zip(self.key_values(id)) {
                        let key = &self.context.schema.nodes[*key];
                        path.push('[');
                        if key.module != snode.module {
                            path.push_str(&modules[key.module].name);
                            path.push(':');
                        }
                        path.push_str(&key.name);
                        path.push('=');
                        path.push_str(&quote_value(value.unwrap_or("")));
                        path.push(']');
                    }
                }
                SchemaNodeKind::LeafList if snode.is_config() => {
                    path.push_str("[.=");
                    path.push_str(&quote_value(self.canonical(id).unwrap_or("")));
                    path.push(']');
                }
                SchemaNodeKind::List | SchemaNodeKind::LeafList => {
                    let parent = self.nodes[id].links.parent;
                    let position = self
                        .siblings_from(self.head(parent))
                        .filter(|s| self.nodes[*s].schema == self.nodes[id].schema)
                        .position(|s| s == id)
                        .unwrap_or(0);
                    path.push_str(&format!("[{}]", position + 1));
                }
                _ => {}
            }
        }
        path
    }

    /// Data path of a (not yet created) child, used in parser errors.
    pub(crate) fn child_path(&self, parent: Option<usize>, schema: usize) -> String {
        let snode = &self.context.schema.nodes[schema];
        let mut path = parent.map(|p| self.node_path(p)).unwrap_or_default();
        path.push('/');
        if parent.and_then(|p| self.snode(p)).map(|p| p.module) != Some(snode.module) {
            path.push_str(&self.context.modules[snode.module].name);
            path.push(':');
        }
        path.push_str(&snode.name);
        path
    }

    /// Whether the instance `id` matches the predicates of a path step.
    pub(crate) fn matches_predicates(&self, id: usize, predicates: &[PathPredicate], position: usize) -> bool {
        predicates.iter().all(|pred| match pred {
            PathPredicate::Key { name, value, .. } => self
                .siblings_from(self.nodes[id].links.child)
                .find(|child| {
                    self.snode(*child)
                        .is_some_and(|snode| &*snode.name == name.as_str())
                })
                .is_some_and(|child| self.value_matches(child, value)),
            PathPredicate::Value(value) => self.value_matches(id, value),
            PathPredicate::Position(n) => position == *n as usize,
        })
    }

    // Literals compare by their canonical form.
    fn value_matches(&self, id: usize, literal: &str) -> bool {
        let Some(canonical) = self.canonical(id) else {
            return false;
        };
        if canonical == literal {
            return true;
        }
        match self.nodes[id].schema {
            Some(schema) => self
                .store_term(schema, literal, Prefixes::Json)
                .is_ok_and(|value| &*value.canonical == canonical),
            None => false,
        }
    }

    /// Resolves an absolute data path to a node.
    pub(crate) fn find_path_ids(&self, path: &str, output: bool) -> Result<Option<usize>> {
        self.context.check_compiled()?;
        let segments = parse_data_path(path)?;
        let mut parent: Option<usize> = None;
        let mut module = None;
        for segment in &segments {
            if let Some(prefix) = &segment.prefix {
                module = Some(self.context.module_by_name(prefix).ok_or_else(|| {
                    Error::valid(
                        ValidationErrorCode::Xpath,
                        format!("Module \"{}\" not found.", prefix),
                    )
                    .with_path(path)
                })?);
            }
            let module = module.unwrap_or(0);
            let parent_schema = parent.and_then(|p| self.nodes[p].schema);
            // Operation instances holding output nodes are replies.
            let output = output || self.holds_output(parent);
            let Some(schema) = self
                .schema_child(parent_schema, module, &segment.name, output)
                .or_else(|| self.schema_child(parent_schema, module, &segment.name, !output))
            else {
                return Err(Error::valid(
                    ValidationErrorCode::Xpath,
                    format!("Not found node \"{}\" in path.", segment.name),
                )
                .with_path(path));
            };
            let snode = &self.context.schema.nodes[schema];
            if snode.kind == SchemaNodeKind::List
                && !snode.flags.contains(SchemaFlags::KEYLESS)
                && segment.predicates.is_empty()
            {
                return Err(Error::valid(
                    ValidationErrorCode::Xpath,
                    format!("Predicate missing for list \"{}\" in path.", snode.name),
                )
                .with_path(path));
            }
            let found = self
                .instances(parent, schema)
                .into_iter()
                .enumerate()
                .find(|(i, id)| self.matches_predicates(*id, &segment.predicates, i + 1))
                .map(|(_, id)| id);
            match found {
                Some(id) => parent = Some(id),
                None => return Ok(None),
            }
        }
        Ok(parent)
    }

    fn holds_output(&self, parent: Option<usize>) -> bool {
        parent.is_some_and(|parent| {
            self.siblings_from(self.nodes[parent].links.child).any(|child| {
                self.snode(child)
                    .is_some_and(|snode| snode.flags.contains(SchemaFlags::IN_OUTPUT))
            })
        })
    }

    /// Target of an instance-identifier value.
    pub(crate) fn resolve_instance(&self, canonical: &str) -> Option<usize> {
        self.find_path_ids(canonical, false).ok().flatten()
    }

    /// Finds the counterpart of `other_id` (from `other`) among the
    /// children of `parent`.
    pub(crate) fn find_instance(
        &self,
        parent: Option<usize>,
        other: &DataTree<'_>,
        other_id: usize,
    ) -> Option<usize> {
        let odnode = &other.nodes[other_id];
        let Some(schema) = odnode.schema else {
            let NodeValue::Opaque(oopaque) = &odnode.value else {
                return None;
            };
            return self.siblings_from(self.head(parent)).find(|id| {
                matches!(&self.nodes[*id].value, NodeValue::Opaque(opaque)
                    if opaque.name == oopaque.name && opaque.module == oopaque.module)
            });
        };
        let snode = &self.context.schema.nodes[schema];
        let mut candidates = self.instances(parent, schema).into_iter();
        match snode.kind {
            SchemaNodeKind::List if snode.flags.contains(SchemaFlags::KEYLESS) => {
                let position = other
                    .instances(other.nodes[other_id].links.parent, schema)
                    .iter()
                    .position(|id| *id == other_id)?;
                candidates.nth(position)
            }
            SchemaNodeKind::List => {
                let keys = other.key_values(other_id);
                candidates.find(|id| self.key_values(*id) == keys)
            }
            SchemaNodeKind::LeafList => {
                let value = other.canonical(other_id);
                candidates.find(|id| self.canonical(*id) == value)
            }
            _ => candidates.next(),
        }
    }

    /// Copies the subtree of `src_id` from `src` under `parent`, returning
    /// the new node.
    pub(crate) fn copy_subtree(
        &mut self,
        parent: Option<usize>,
        src: &DataTree<'_>,
        src_id: usize,
        with_meta: bool,
    ) -> usize {
        let id = self.copy_node(src, src_id, with_meta);
        self.link_child(parent, id);
        self.copy_children(id, src, src_id, with_meta);
        self.rehash(id);
        id
    }

    fn copy_node(&mut self, src: &DataTree<'_>, src_id: usize, with_meta: bool) -> usize {
        let sdnode = &src.nodes[src_id];
        let id = self.alloc(sdnode.schema, sdnode.value.clone());
        let dnode = &mut self.nodes[id];
        dnode.flags = sdnode.flags & (NodeFlags::DEFAULT | NodeFlags::WHEN_TRUE);
        dnode.hash = sdnode.hash;
        if with_meta {
            dnode.meta = sdnode.meta.clone();
        }
        id
    }

    fn copy_children(&mut self, id: usize, src: &DataTree<'_>, src_id: usize, with_meta: bool) {
        let mut head = None;
        for schild in src.siblings_from(src.nodes[src_id].links.child) {
            let child = self.copy_node(src, schild, with_meta);
            link_append(self, &mut head, Some(id), child);
            self.nodes[id].links.child = head;
            self.copy_children(child, src, schild, with_meta);
        }
    }
}

impl<'a> Data<'a> for DataTree<'a> {
    fn tree(&self) -> &DataTree<'a> {
        self
    }

    fn start(&self) -> Option<usize> {
        self.first
    }
}

impl LinkArena for DataTree<'_> {
    fn links(&self, id: usize) -> &NodeLinks {
        &self.nodes[id].links
    }

    fn links_mut(&mut self, id: usize) -> &mut NodeLinks {
        &mut self.nodes[id].links
    }
}

// ===== impl DataNodeRef =====

impl<'a, 'b> DataNodeRef<'a, 'b> {
    /// Handle of this node, usable with the editing methods of the tree.
    pub fn id(&self) -> DataNodeId {
        DataNodeId(self.id)
    }

    fn dnode(&self) -> &'a DNode {
        &self.tree.nodes[self.id]
    }

    /// Schema definition of this node, `None` for opaque nodes.
    pub fn schema(&self) -> Option<SchemaNode<'b>> {
        self.dnode()
            .schema
            .map(|schema| SchemaNode::from_raw(self.tree.context, schema))
    }

    /// Name of the node.
    pub fn name(&self) -> &'a str {
        match (self.tree.snode(self.id), &self.dnode().value) {
            (Some(snode), _) => &snode.name,
            (None, NodeValue::Opaque(opaque)) => &opaque.name,
            _ => "",
        }
    }

    /// Get the owner module of the data node. It is the module of the top-level
    /// schema node. Generally, in case of augments it is the target module,
    /// recursively, otherwise it is the module where the data node is defined.
    pub fn owner_module(&self) -> Option<SchemaModule<'b>> {
        let top = self.inclusive_ancestors().last().unwrap_or_else(|| self.clone());
        let module = top.tree.snode(top.id)?.module;
        Some(SchemaModule::from_raw(self.tree.context, module))
    }

    /// Returns an iterator over the ancestor data nodes.
    pub fn ancestors(&self) -> Ancestors<'a, DataNodeRef<'a, 'b>> {
        let parent = self.parent();
        Ancestors::new(parent)
    }

    /// Returns an iterator over this data node and its ancestors.
    pub fn inclusive_ancestors(&self) -> Ancestors<'a, DataNodeRef<'a, 'b>> {
        Ancestors::new(Some(self.clone()))
    }

    /// Returns an iterator over the sibling data nodes.
    pub fn siblings(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        let sibling = self.next_sibling();
        Siblings::new(sibling)
    }

    /// Returns an iterator over this data node and its siblings.
    pub fn inclusive_siblings(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        Siblings::new(Some(self.clone()))
    }

    /// Returns an iterator over the child data nodes.
    pub fn children(&self) -> Siblings<'a, DataNodeRef<'a, 'b>> {
        let child = self.first_child();
        Siblings::new(child)
    }

    /// Returns an iterator over all elements in the data tree (depth-first
    /// search algorithm).
    pub fn traverse(&self) -> Traverse<'a, DataNodeRef<'a, 'b>> {
        Traverse::new(self.clone())
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = DataNodeRef<'a, 'b>> {
        self.children()
            .filter(|dnode| dnode.schema().is_some_and(|snode| snode.is_list_key()))
    }

    /// Returns an iterator over all metadata associated to this node.
    pub fn meta(&self) -> MetadataList<'a, 'b> {
        MetadataList::new(self.clone())
    }

    pub(crate) fn meta_count(&self) -> usize {
        self.dnode().meta.len()
    }

    /// Generate path of the given node.
    pub fn path(&self) -> String {
        self.tree.node_path(self.id)
    }

    /// Node's value (canonical string representation).
    pub fn value_canonical(&self) -> Option<String> {
        self.tree.canonical(self.id).map(str::to_owned)
    }

    /// Node's value (typed representation).
    pub fn value(&self) -> Option<DataValue> {
        match &self.dnode().value {
            NodeValue::Term(value) => Some(value.typed.clone()),
            _ => None,
        }
    }

    /// Value of an anydata/anyxml node.
    pub fn any_value(&self) -> Option<DataAnyValue<'a, 'b>> {
        match &self.dnode().value {
            NodeValue::Any(AnyValue::String(value)) => Some(DataAnyValue::String(value)),
            NodeValue::Any(AnyValue::Xml(value)) => Some(DataAnyValue::Xml(value)),
            NodeValue::Any(AnyValue::Json(value) | AnyValue::Tree { json: value, .. }) => {
                Some(DataAnyValue::Json(value))
            }
            _ => None,
        }
    }

    /// Value of an opaque node.
    pub fn opaque_value(&self) -> Option<&'a str> {
        match &self.dnode().value {
            NodeValue::Opaque(opaque) => Some(&opaque.value),
            _ => None,
        }
    }

    /// Check whether a node value equals to its default one.
    pub fn is_default(&self) -> bool {
        self.tree.is_default_node(self.id)
    }

    /// Whether the node was created implicitly (default value or
    /// non-presence container).
    pub fn is_implicit(&self) -> bool {
        self.dnode().flags.contains(NodeFlags::DEFAULT)
    }

    /// Validation state of the node.
    pub fn validation_state(&self) -> ValidationState {
        self.dnode().state
    }

    /// Structural hash of the node: module, name and, for list and
    /// leaf-list instances, the key values or the value. Equal nodes have
    /// equal hashes; the converse does not hold.
    pub fn hash(&self) -> u64 {
        match self.tree.snode(self.id) {
            Some(snode) if snode.flags.contains(SchemaFlags::KEYLESS) => {
                self.tree.compute_hash(self.id)
            }
            _ => self.dnode().hash,
        }
    }

    /// Create a copy of the data subtree.
    ///
    /// When the `with_parents` parameter is set, duplicate also all the node
    /// parents. Keys are also duplicated for lists.
    pub fn duplicate(&self, with_parents: bool) -> Result<DataTree<'b>> {
        let flags = if with_parents {
            DataDuplicateFlags::WITH_PARENTS
        } else {
            DataDuplicateFlags::empty()
        };
        self.duplicate_with_flags(flags)
    }

    /// Create a copy of the data subtree with the given options.
    pub fn duplicate_with_flags(&self, options: DataDuplicateFlags) -> Result<DataTree<'b>> {
        let tree = self.tree;
        let with_meta = !options.contains(DataDuplicateFlags::NO_META);
        let mut dup = DataTree::new(tree.context);
        let mut parent = None;
        if options.contains(DataDuplicateFlags::WITH_PARENTS) {
            let ancestors: Vec<usize> = self.ancestors().map(|dnode| dnode.id).collect();
            for ancestor in ancestors.into_iter().rev() {
                let id = dup.copy_node(tree, ancestor, with_meta);
                dup.link_child(parent, id);
                // Keys of the list ancestors.
                if let Some(snode) = tree.snode(ancestor) {
                    for key in snode.list_keys() {
                        for child in tree.instances(Some(ancestor), *key) {
                            dup.copy_subtree(Some(id), tree, child, with_meta);
                        }
                    }
                }
                dup.rehash(id);
                parent = Some(id);
            }
        }
        let is_key = tree
            .snode(self.id)
            .is_some_and(|snode| snode.flags.contains(SchemaFlags::KEY));
        if !(is_key && parent.is_some()) {
            dup.copy_subtree(parent, tree, self.id, with_meta);
        }
        Ok(dup)
    }

    /// Converts the subtree into a JSON value, with members named as in the
    /// JSON data encoding.
    pub fn to_json_value(&self) -> serde_json::Value {
        json::to_json_value(self.tree, self.id)
    }
}

impl<'a> Data<'a> for DataNodeRef<'_, 'a> {
    fn tree(&self) -> &DataTree<'a> {
        self.tree
    }

    fn start(&self) -> Option<usize> {
        Some(self.id)
    }

    fn is_node(&self) -> bool {
        true
    }
}

impl<'a, 'b> Binding<'a> for DataNodeRef<'a, 'b> {
    type Container = DataTree<'b>;

    fn from_raw(tree: &'a DataTree<'b>, id: usize) -> DataNodeRef<'a, 'b> {
        DataNodeRef { tree, id }
    }
}

impl<'a, 'b> NodeIterable<'a> for DataNodeRef<'a, 'b> {
    fn parent(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_raw_opt(self.tree, self.dnode().links.parent)
    }

    fn next_sibling(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_raw_opt(self.tree, self.dnode().links.next)
    }

    fn first_child(&self) -> Option<DataNodeRef<'a, 'b>> {
        DataNodeRef::from_raw_opt(self.tree, self.dnode().links.child)
    }
}

impl PartialEq for DataNodeRef<'_, '_> {
    fn eq(&self, other: &DataNodeRef<'_, '_>) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

// ===== impl Metadata =====

impl<'a, 'b> Metadata<'a, 'b> {
    pub(crate) fn new(dnode: DataNodeRef<'a, 'b>, index: usize) -> Metadata<'a, 'b> {
        Metadata { dnode, index }
    }

    fn raw(&self) -> &'a Meta {
        &self.dnode.tree.nodes[self.dnode.id].meta[self.index]
    }

    /// Metadata name.
    pub fn name(&self) -> &'a str {
        &self.raw().name
    }

    /// Module defining the annotation.
    pub fn module(&self) -> SchemaModule<'b> {
        SchemaModule::from_raw(self.dnode.tree.context, self.raw().module)
    }

    /// Metadata value representation.
    pub fn value(&self) -> &'a str {
        &self.raw().value.canonical
    }
}

impl PartialEq for Metadata<'_, '_> {
    fn eq(&self, other: &Metadata<'_, '_>) -> bool {
        self.dnode == other.dnode && self.index == other.index
    }
}

// ===== impl DataDiff =====

impl<'a> DataDiff<'a> {
    /// Parse (and validate) input data as a YANG data diff.
    pub fn parse_string(
        context: &'a Context,
        data: impl AsRef<[u8]>,
        format: DataFormat,
        parser_options: DataParserFlags,
        validation_options: DataValidationFlags,
    ) -> Result<DataDiff<'a>> {
        let dtree = DataTree::parse_string(
            context,
            data,
            format,
            parser_options,
            validation_options,
        )?;

        Ok(DataDiff { tree: dtree })
    }

    /// Data tree holding the diff nodes and their annotations.
    pub fn tree(&self) -> &DataTree<'a> {
        &self.tree
    }

    /// Returns an iterator over the data changes.
    pub fn iter(&self) -> impl Iterator<Item = (DataDiffOp, DataNodeRef<'_, 'a>)> {
        self.tree.traverse().filter_map(|dnode| {
            match dnode.meta().find(|meta| meta.name() == "operation") {
                Some(meta) => match meta.value() {
                    "create" => Some((DataDiffOp::Create, dnode)),
                    "delete" => Some((DataDiffOp::Delete, dnode)),
                    "replace" => Some((DataDiffOp::Replace, dnode)),
                    _ => None,
                },
                None => None,
            }
        })
    }

    /// Reverse a diff and make the opposite changes. Meaning change create to
    /// delete, delete to create, or move from place A to B to move from B
    /// to A and so on.
    pub fn reverse(&self) -> Result<DataDiff<'a>> {
        let tree = diff::reverse(&self.tree)
            .map_err(|error| self.tree.context.log_error(error))?;
        Ok(DataDiff { tree })
    }
}

impl<'a> Data<'a> for DataDiff<'a> {
    fn tree(&self) -> &DataTree<'a> {
        &self.tree
    }

    fn start(&self) -> Option<usize> {
        self.tree.first
    }
}
