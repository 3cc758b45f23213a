//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG schema data.

pub(crate) mod compile;
pub mod diff;
pub mod parsed;
pub(crate) mod printer;
pub(crate) mod types;

use bitflags::bitflags;
use num_derive::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::{Context, ModuleEntry};
use crate::error::{Error, Result};
use crate::iter::{Ancestors, NodeIterable, Siblings, Traverse};
use crate::utils::*;
use crate::xpath::Expr;

pub use parsed::{ExtensionInstance, ParsedModule, Status};
use types::{CompiledType, Value};

/// Available YANG schema tree structures representing YANG module.
#[derive(Clone, Debug)]
pub struct SchemaModule<'a> {
    context: &'a Context,
    id: usize,
}

/// Schema input formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaInputFormat {
    YANG,
    YIN,
}

/// Schema output formats.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaOutputFormat {
    YANG,
    YIN,
    TREE,
}

/// Schema path format.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaPathFormat {
    /// Descriptive path format used in log messages.
    LOG,
    /// Similar to LOG except that schema-only nodes (choice, case, input,
    /// output) are skipped.
    DATA,
}

bitflags! {
    /// Schema printer flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct SchemaPrinterFlags: u32 {
        /// Flag for output without indentation and formatting new lines.
        const SHRINK = 0x02;
        /// Print only top-level/reference node information, do not print
        /// information from the substatements.
        const NO_SUBSTMT = 0x10;
    }
}

/// Generic YANG schema node.
#[derive(Clone, Debug)]
pub struct SchemaNode<'a> {
    context: &'a Context,
    id: usize,
    kind: SchemaNodeKind,
}

/// YANG schema node kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaNodeKind {
    Container,
    Case,
    Choice,
    Leaf,
    LeafList,
    List,
    AnyData,
    Rpc,
    Input,
    Output,
    Action,
    Notification,
}

/// YANG must substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtMust<'a> {
    must: &'a Must,
}

/// YANG when substatement.
#[derive(Clone, Debug)]
pub struct SchemaStmtWhen<'a> {
    when: &'a When,
}

/// YANG leaf(-list) type.
#[derive(Clone, Debug)]
pub struct SchemaLeafType<'a> {
    context: &'a Context,
    ty: &'a Arc<CompiledType>,
}

/// YANG identity.
#[derive(Clone, Debug)]
pub struct SchemaIdentity<'a> {
    context: &'a Context,
    id: usize,
}

/// YANG import of a module.
#[derive(Clone, Debug)]
pub struct SchemaImport<'a> {
    context: &'a Context,
    prefix: &'a str,
    module: usize,
    revision: Option<&'a str>,
}

/// YANG data value type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, FromPrimitive)]
pub enum DataValueType {
    Unknown = 0,
    Binary = 1,
    Uint8 = 2,
    Uint16 = 3,
    Uint32 = 4,
    Uint64 = 5,
    String = 6,
    Bits = 7,
    Bool = 8,
    Dec64 = 9,
    Empty = 10,
    Enum = 11,
    IdentityRef = 12,
    InstanceId = 13,
    LeafRef = 14,
    Union = 15,
    Int8 = 16,
    Int16 = 17,
    Int32 = 18,
    Int64 = 19,
}

/// YANG data value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    Empty,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Other(String),
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub(crate) struct SchemaFlags: u16 {
        const CONFIG_W = 0x0001;
        const CONFIG_R = 0x0002;
        const MANDATORY = 0x0004;
        const USER_ORDERED = 0x0008;
        const KEY = 0x0010;
        const KEYLESS = 0x0020;
        const DISABLED = 0x0040;
        const IN_INPUT = 0x0080;
        const IN_OUTPUT = 0x0100;
        const IN_NOTIF = 0x0200;
        const IS_ANYXML = 0x0400;
        const SET_DFLT = 0x0800;
    }
}

/// Compiled `when` statement bound to one schema node.
#[derive(Debug)]
pub(crate) struct When {
    pub cond: Arc<Expr>,
    pub source: Arc<str>,
    pub module: usize,
    /// Evaluated on the nearest data ancestor instead of the node itself
    /// (uses, augment, choice and case conditions).
    pub on_parent: bool,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

/// Compiled `must` statement.
#[derive(Debug)]
pub(crate) struct Must {
    pub cond: Arc<Expr>,
    pub source: Arc<str>,
    pub module: usize,
    pub emsg: Option<Arc<str>>,
    pub eapptag: Option<Arc<str>>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
}

#[derive(Debug)]
pub(crate) struct Identity {
    pub module: usize,
    pub name: Arc<str>,
    pub bases: Vec<usize>,
    pub derived: Vec<usize>,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub status: Status,
}

/// Node-type specific part of a compiled node.
#[derive(Debug)]
pub(crate) enum Payload {
    None,
    Container {
        presence: Option<Arc<str>>,
    },
    Leaf {
        ty: Arc<CompiledType>,
        units: Option<Arc<str>>,
        default: Option<Value>,
        dflt_src: Option<(Arc<str>, usize)>,
    },
    LeafList {
        ty: Arc<CompiledType>,
        units: Option<Arc<str>>,
        defaults: Vec<Value>,
        dflt_src: Vec<(Arc<str>, usize)>,
        min: u32,
        max: Option<u32>,
    },
    List {
        keys: Vec<usize>,
        uniques: Vec<Vec<usize>>,
        min: u32,
        max: Option<u32>,
    },
    Choice {
        default: Option<usize>,
    },
}

/// Compiled schema node stored in the context arena.
#[derive(Debug)]
pub(crate) struct SNode {
    pub kind: SchemaNodeKind,
    /// Namespace module.
    pub module: usize,
    pub name: Arc<str>,
    pub links: NodeLinks,
    pub actions: Option<usize>,
    pub notifs: Option<usize>,
    pub flags: SchemaFlags,
    pub status: Status,
    pub dsc: Option<Arc<str>>,
    pub ref_: Option<Arc<str>>,
    pub whens: Vec<Arc<When>>,
    pub musts: Vec<Arc<Must>>,
    pub exts: Vec<ExtensionInstance>,
    /// Depth-first position, used to keep data siblings in schema order.
    pub order: u32,
    pub payload: Payload,
}

/// Compiled trees of one module.
#[derive(Clone, Debug, Default)]
pub(crate) struct ModuleSchema {
    pub compiled: bool,
    pub data: Option<usize>,
    pub rpcs: Option<usize>,
    pub notifs: Option<usize>,
    pub identities: Vec<usize>,
}

/// Metadata annotation defined by `md:annotation`.
#[derive(Debug)]
pub(crate) struct Annotation {
    pub module: usize,
    pub name: Arc<str>,
    pub ty: Arc<CompiledType>,
}

/// Compiled schema of a context.
#[derive(Debug, Default)]
pub(crate) struct SchemaStore {
    pub nodes: Vec<SNode>,
    pub identities: Vec<Identity>,
    pub modules: Vec<ModuleSchema>,
    pub identity_index: HashMap<(usize, Arc<str>), usize>,
    pub annotations: Vec<Annotation>,
}

// ===== impl SchemaModule =====

impl<'a> SchemaModule<'a> {
    fn entry(&self) -> &'a ModuleEntry {
        &self.context.modules[self.id]
    }

    fn compiled(&self) -> Option<&'a ModuleSchema> {
        self.context.schema.modules.get(self.id)
    }

    /// Name of the module.
    pub fn name(&self) -> &'a str {
        &self.entry().name
    }

    /// Revision of the module.
    pub fn revision(&self) -> Option<&'a str> {
        self.entry().revision.as_deref()
    }

    /// Namespace of the module.
    pub fn namespace(&self) -> &'a str {
        &self.entry().namespace
    }

    /// Prefix of the module.
    pub fn prefix(&self) -> &'a str {
        &self.entry().prefix
    }

    /// File path, if the schema was read from a file.
    pub fn filepath(&self) -> Option<&'a str> {
        self.entry().filepath.as_deref()
    }

    /// Party responsible for the module.
    pub fn organization(&self) -> Option<&'a str> {
        self.entry().parsed.organization.as_deref()
    }

    /// Contact information for the module.
    pub fn contact(&self) -> Option<&'a str> {
        self.entry().parsed.contact.as_deref()
    }

    /// Description of the module.
    pub fn description(&self) -> Option<&'a str> {
        self.entry().parsed.description.as_deref()
    }

    /// Cross-reference for the module.
    pub fn reference(&self) -> Option<&'a str> {
        self.entry().parsed.reference.as_deref()
    }

    /// Returns whether the module is implemented.
    pub fn is_implemented(&self) -> bool {
        self.entry().implemented
    }

    /// Returns whether the module is one of the modules loaded when the
    /// context was created.
    pub fn is_internal(&self) -> bool {
        self.entry().internal
    }

    /// Returns whether the module is compiled.
    pub fn is_compiled(&self) -> bool {
        self.compiled().map(|c| c.compiled).unwrap_or(false)
    }

    /// Parsed representation of the module (submodules merged).
    pub fn parsed(&self) -> &'a ParsedModule {
        &self.entry().parsed
    }

    /// Get the current real status of the specified feature in the module.
    pub fn feature_value(&self, feature: &str) -> Result<bool> {
        self.entry()
            .features
            .iter()
            .find(|(name, _)| &**name == feature)
            .map(|(_, enabled)| *enabled)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Feature \"{}\" not found in module \"{}\".",
                    feature,
                    self.name()
                ))
            })
    }

    /// Returns the features of the module with their state.
    pub fn features(&self) -> impl Iterator<Item = (&'a str, bool)> + 'a {
        self.entry()
            .features
            .iter()
            .map(|(name, enabled)| (name.as_ref(), *enabled))
    }

    /// Revision dates of the module, most recent first.
    pub fn revisions(&self) -> Vec<&'a str> {
        let mut revisions: Vec<&str> = self
            .entry()
            .parsed
            .revisions
            .iter()
            .map(|r| r.date.as_str())
            .collect();
        revisions.sort_unstable_by(|a, b| b.cmp(a));
        revisions
    }

    /// Returns an iterator over the imports of the module.
    pub fn imports(&self) -> impl Iterator<Item = SchemaImport<'a>> + 'a {
        let context = self.context;
        let entry = self.entry();
        entry.imports.iter().map(move |(prefix, module)| {
            let revision = entry
                .parsed
                .imports
                .iter()
                .find(|import| import.prefix == **prefix)
                .and_then(|import| import.revision.as_deref());
            SchemaImport {
                context,
                prefix,
                module: *module,
                revision,
            }
        })
    }

    /// Returns an iterator over the identities defined in the module.
    pub fn identities(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.compiled()
            .into_iter()
            .flat_map(|c| c.identities.iter())
            .map(move |id| SchemaIdentity { context, id: *id })
    }

    /// Extension instances of the module statement.
    pub fn extension_instances(&self) -> &'a [ExtensionInstance] {
        &self.entry().parsed.exts
    }

    /// Print schema tree in the specified format into a file.
    pub fn print_file<W: std::io::Write>(
        &self,
        mut writer: W,
        format: SchemaOutputFormat,
        options: SchemaPrinterFlags,
    ) -> Result<()> {
        let out = self.print_string(format, options)?;
        writer.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Print schema tree in the specified format into a string.
    pub fn print_string(
        &self,
        format: SchemaOutputFormat,
        options: SchemaPrinterFlags,
    ) -> Result<String> {
        printer::print_module(self, format, options)
    }

    /// Returns an iterator over the top-level data nodes.
    pub fn data(&self) -> Siblings<'a, SchemaNode<'a>> {
        let first = self.compiled().and_then(|c| c.data);
        Siblings::new(SchemaNode::from_raw_opt(self.context, first))
    }

    /// Returns an iterator over the list of RPCs.
    pub fn rpcs(&self) -> Siblings<'a, SchemaNode<'a>> {
        let first = self.compiled().and_then(|c| c.rpcs);
        Siblings::new(SchemaNode::from_raw_opt(self.context, first))
    }

    /// Returns an iterator over the list of notifications.
    pub fn notifications(&self) -> Siblings<'a, SchemaNode<'a>> {
        let first = self.compiled().and_then(|c| c.notifs);
        Siblings::new(SchemaNode::from_raw_opt(self.context, first))
    }

    /// Returns an iterator over all data nodes in the schema module
    /// (depth-first search algorithm).
    ///
    /// NOTE: augmentations (from other modules or from the module itself) are
    /// also iterated over.
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let data = self.data().flat_map(|snode| snode.traverse());
        let rpcs = self.rpcs().flat_map(|snode| snode.traverse());
        let notifications =
            self.notifications().flat_map(|snode| snode.traverse());
        data.chain(rpcs).chain(notifications)
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }
}

impl<'a> Binding<'a> for SchemaModule<'a> {
    type Container = Context;

    fn from_raw(context: &'a Context, id: usize) -> SchemaModule<'a> {
        SchemaModule { context, id }
    }
}

impl PartialEq for SchemaModule<'_> {
    fn eq(&self, other: &SchemaModule<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

// ===== impl SchemaImport =====

impl<'a> SchemaImport<'a> {
    /// Prefix the module is imported with.
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    /// Imported module.
    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::from_raw(self.context, self.module)
    }

    /// Requested revision-date.
    pub fn revision(&self) -> Option<&'a str> {
        self.revision
    }
}

// ===== impl SchemaIdentity =====

impl<'a> SchemaIdentity<'a> {
    fn identity(&self) -> &'a Identity {
        &self.context.schema.identities[self.id]
    }

    pub fn name(&self) -> &'a str {
        &self.identity().name
    }

    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::from_raw(self.context, self.identity().module)
    }

    pub fn description(&self) -> Option<&'a str> {
        self.identity().dsc.as_deref()
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.identity().ref_.as_deref()
    }

    pub fn bases(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.identity()
            .bases
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }

    pub fn derived(&self) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.identity()
            .derived
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }

    /// Returns whether the identity is derived (directly or indirectly) from
    /// the given one.
    pub fn is_derived_from(&self, base: &SchemaIdentity<'_>) -> bool {
        self.context.schema.identity_derived_from(self.id, base.id)
    }
}

impl PartialEq for SchemaIdentity<'_> {
    fn eq(&self, other: &SchemaIdentity<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

// ===== impl SchemaNode =====

impl<'a> SchemaNode<'a> {
    fn snode(&self) -> &'a SNode {
        &self.context.schema.nodes[self.id]
    }

    #[doc(hidden)]
    fn check_flag(&self, flag: SchemaFlags) -> bool {
        self.snode().flags.contains(flag)
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Schema node module.
    pub fn module(&self) -> SchemaModule<'a> {
        SchemaModule::from_raw(self.context, self.snode().module)
    }

    /// Returns the kind of the schema node.
    pub fn kind(&self) -> SchemaNodeKind {
        self.kind
    }

    /// Schema node name.
    pub fn name(&self) -> &'a str {
        &self.snode().name
    }

    /// Description statement.
    pub fn description(&self) -> Option<&'a str> {
        self.snode().dsc.as_deref()
    }

    /// Reference statement.
    pub fn reference(&self) -> Option<&'a str> {
        self.snode().ref_.as_deref()
    }

    /// Generate path of the node.
    pub fn path(&self, format: SchemaPathFormat) -> String {
        self.context
            .schema
            .schema_path(&self.context.modules, self.id, format)
    }

    /// Evaluate an xpath expression on the node.
    pub fn find_xpath(&self, xpath: &str) -> Result<Vec<SchemaNode<'a>>> {
        self.context.check_compiled()?;
        let ids = crate::xpath::eval::schema_xpath(
            self.context,
            Some(self.id),
            xpath,
        )?;
        Ok(ids
            .into_iter()
            .map(|id| SchemaNode::from_raw(self.context, id))
            .collect())
    }

    /// Get a schema node based on the given data path (JSON format).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'a>> {
        self.context.find_path(path)
    }

    /// Returns whether the node is a configuration node.
    pub fn is_config(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Case
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData => self.check_flag(SchemaFlags::CONFIG_W),
            _ => false,
        }
    }

    /// Returns whether the node is a state node.
    pub fn is_state(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Case
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData => self.check_flag(SchemaFlags::CONFIG_R),
            _ => false,
        }
    }

    /// Returns whether the node's status is "current".
    pub fn is_status_current(&self) -> bool {
        self.snode().status == Status::Current
    }

    /// Returns whether the node's status is "deprecated".
    pub fn is_status_deprecated(&self) -> bool {
        self.snode().status == Status::Deprecated
    }

    /// Returns whether the node's status is "obsolete".
    pub fn is_status_obsolete(&self) -> bool {
        self.snode().status == Status::Obsolete
    }

    /// Returns whether the node is mandatory.
    pub fn is_mandatory(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Container
            | SchemaNodeKind::Choice
            | SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::List
            | SchemaNodeKind::AnyData => self.check_flag(SchemaFlags::MANDATORY),
            _ => false,
        }
    }

    /// Returns whether the node is a non-presence container.
    pub fn is_np_container(&self) -> bool {
        matches!(
            self.snode().payload,
            Payload::Container { presence: None }
        )
    }

    /// Returns whether the node is a list's key.
    pub fn is_list_key(&self) -> bool {
        match self.kind {
            SchemaNodeKind::Leaf => self.check_flag(SchemaFlags::KEY),
            _ => false,
        }
    }

    /// Returns whether the node is a keyless list.
    pub fn is_keyless_list(&self) -> bool {
        match self.kind {
            SchemaNodeKind::List => self.check_flag(SchemaFlags::KEYLESS),
            _ => false,
        }
    }

    /// Returns whether the node is an user-ordered list or leaf-list.
    pub fn is_user_ordered(&self) -> bool {
        match self.kind {
            SchemaNodeKind::LeafList | SchemaNodeKind::List => {
                self.check_flag(SchemaFlags::USER_ORDERED)
            }
            _ => false,
        }
    }

    /// Returns whether the node is an anyxml node.
    pub fn is_anyxml(&self) -> bool {
        self.check_flag(SchemaFlags::IS_ANYXML)
    }

    /// Returns whether the node was disabled by its if-features (only kept
    /// with `ContextFlags::KEEP_DISABLED_NODES`).
    pub fn is_disabled(&self) -> bool {
        self.check_flag(SchemaFlags::DISABLED)
    }

    /// Returns whether the node appears only in the schema tree and not in the
    /// data tree.
    pub fn is_schema_only(&self) -> bool {
        matches!(self.kind(), SchemaNodeKind::Choice | SchemaNodeKind::Case)
    }

    /// Returns whether the node is in the subtree of an input statement.
    pub fn is_within_input(&self) -> bool {
        self.check_flag(SchemaFlags::IN_INPUT)
    }

    /// Returns whether the node is in the subtree of an output statement.
    pub fn is_within_output(&self) -> bool {
        self.check_flag(SchemaFlags::IN_OUTPUT)
    }

    /// Returns whether the node is in the subtree of a notification statement.
    pub fn is_within_notification(&self) -> bool {
        self.check_flag(SchemaFlags::IN_NOTIF)
    }

    /// Returns whether a default value is set.
    pub fn has_default(&self) -> bool {
        match &self.snode().payload {
            Payload::Leaf { default, .. } => default.is_some(),
            Payload::LeafList { defaults, .. } => !defaults.is_empty(),
            Payload::Choice { default } => default.is_some(),
            _ => false,
        }
    }

    /// The default value of the leaf (canonical string representation).
    pub fn default_value_canonical(&self) -> Option<&'a str> {
        match &self.snode().payload {
            Payload::Leaf {
                default: Some(value),
                ..
            } => Some(&value.canonical),
            _ => None,
        }
    }

    /// The default value of the leaf.
    pub fn default_value(&self) -> Option<DataValue> {
        match &self.snode().payload {
            Payload::Leaf {
                default: Some(value),
                ..
            } => Some(value.typed.clone()),
            _ => None,
        }
    }

    /// The default values of the leaf-list (canonical string
    /// representation).
    pub fn default_values_canonical(&self) -> Vec<&'a str> {
        match &self.snode().payload {
            Payload::LeafList { defaults, .. } => {
                defaults.iter().map(|value| value.canonical.as_ref()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// The default case of the choice.
    pub fn default_case(&self) -> Option<SchemaNode<'a>> {
        match &self.snode().payload {
            Payload::Choice { default } => {
                SchemaNode::from_raw_opt(self.context, *default)
            }
            _ => None,
        }
    }

    /// Resolved type of the leaf or leaf-list.
    pub fn leaf_type(&self) -> Option<SchemaLeafType<'a>> {
        self.snode().leaf_type().map(|ty| SchemaLeafType {
            context: self.context,
            ty,
        })
    }

    /// Units of the leaf(-list)'s type.
    pub fn units(&self) -> Option<&'a str> {
        match &self.snode().payload {
            Payload::Leaf { units, .. } | Payload::LeafList { units, .. } => {
                units.as_deref()
            }
            _ => None,
        }
    }

    /// The min-elements statement of the list or leaf-list.
    pub fn min_elements(&self) -> Option<u32> {
        match &self.snode().payload {
            Payload::List { min, .. } | Payload::LeafList { min, .. }
                if *min != 0 =>
            {
                Some(*min)
            }
            _ => None,
        }
    }

    /// The max-elements statement of the list or leaf-list.
    pub fn max_elements(&self) -> Option<u32> {
        match &self.snode().payload {
            Payload::List { max, .. } | Payload::LeafList { max, .. } => *max,
            _ => None,
        }
    }

    /// Array of must restrictions.
    pub fn musts(&self) -> impl Iterator<Item = SchemaStmtMust<'a>> + 'a {
        self.snode()
            .musts
            .iter()
            .map(|must| SchemaStmtMust { must })
    }

    /// Array of when statements.
    pub fn whens(&self) -> impl Iterator<Item = SchemaStmtWhen<'a>> + 'a {
        self.snode()
            .whens
            .iter()
            .map(|when| SchemaStmtWhen { when })
    }

    /// Extension instances of the node.
    pub fn extension_instances(&self) -> &'a [ExtensionInstance] {
        &self.snode().exts
    }

    /// Array of actions.
    pub fn actions(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(SchemaNode::from_raw_opt(
            self.context,
            self.snode().actions,
        ))
    }

    /// Array of notifications.
    pub fn notifications(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(SchemaNode::from_raw_opt(
            self.context,
            self.snode().notifs,
        ))
    }

    /// Input of the RPC or action.
    pub fn input(&self) -> Option<SchemaNode<'a>> {
        match self.kind {
            SchemaNodeKind::Rpc | SchemaNodeKind::Action => self
                .children()
                .find(|snode| snode.kind() == SchemaNodeKind::Input),
            _ => None,
        }
    }

    /// Output of the RPC or action.
    pub fn output(&self) -> Option<SchemaNode<'a>> {
        match self.kind {
            SchemaNodeKind::Rpc | SchemaNodeKind::Action => self
                .children()
                .find(|snode| snode.kind() == SchemaNodeKind::Output),
            _ => None,
        }
    }

    /// Returns an iterator over the ancestor schema nodes.
    pub fn ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        let parent = self.parent();
        Ancestors::new(parent)
    }

    /// Returns an iterator over this schema node and its ancestors.
    pub fn inclusive_ancestors(&self) -> Ancestors<'a, SchemaNode<'a>> {
        Ancestors::new(Some(self.clone()))
    }

    /// Returns an iterator over the sibling schema nodes.
    pub fn siblings(&self) -> Siblings<'a, SchemaNode<'a>> {
        let sibling = self.next_sibling();
        Siblings::new(sibling)
    }

    /// Returns an iterator over this schema node and its siblings.
    pub fn inclusive_siblings(&self) -> Siblings<'a, SchemaNode<'a>> {
        Siblings::new(Some(self.clone()))
    }

    /// Returns an iterator over the child schema nodes.
    pub fn children(&self) -> Siblings<'a, SchemaNode<'a>> {
        let child = self.first_child();
        Siblings::new(child)
    }

    /// Returns an iterator over the child schema nodes, actions and
    /// notifications.
    pub fn all_children(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        self.children()
            .chain(self.actions())
            .chain(self.notifications())
    }

    /// Returns an iterator over all elements in the schema tree (depth-first
    /// search algorithm).
    pub fn traverse(&self) -> Traverse<'a, SchemaNode<'a>> {
        Traverse::new(self.clone())
    }

    /// Returns an iterator over the keys of the list.
    pub fn list_keys(&self) -> impl Iterator<Item = SchemaNode<'a>> {
        let context = self.context;
        let keys: &'a [usize] = match &self.snode().payload {
            Payload::List { keys, .. } => keys,
            _ => &[],
        };
        keys.iter().map(move |id| SchemaNode::from_raw(context, *id))
    }

    /// Returns the unique statements of the list, each as the set of leafs
    /// it constrains.
    pub fn list_uniques(&self) -> Vec<Vec<SchemaNode<'a>>> {
        match &self.snode().payload {
            Payload::List { uniques, .. } => uniques
                .iter()
                .map(|unique| {
                    unique
                        .iter()
                        .map(|id| SchemaNode::from_raw(self.context, *id))
                        .collect()
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Presence statement of the container.
    pub fn presence(&self) -> Option<&'a str> {
        match &self.snode().payload {
            Payload::Container { presence } => presence.as_deref(),
            _ => None,
        }
    }
}

impl<'a> Binding<'a> for SchemaNode<'a> {
    type Container = Context;

    fn from_raw(context: &'a Context, id: usize) -> SchemaNode<'a> {
        let kind = context.schema.nodes[id].kind;
        SchemaNode { context, id, kind }
    }
}

impl<'a> NodeIterable<'a> for SchemaNode<'a> {
    fn parent(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_raw_opt(self.context, self.snode().links.parent)
    }

    fn next_sibling(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_raw_opt(self.context, self.snode().links.next)
    }

    fn first_child(&self) -> Option<SchemaNode<'a>> {
        SchemaNode::from_raw_opt(self.context, self.snode().links.child)
    }
}

impl PartialEq for SchemaNode<'_> {
    fn eq(&self, other: &SchemaNode<'_>) -> bool {
        std::ptr::eq(self.context, other.context) && self.id == other.id
    }
}

// ===== impl SchemaStmtMust =====

impl<'a> SchemaStmtMust<'a> {
    /// XPath condition.
    pub fn condition(&self) -> &'a str {
        &self.must.source
    }

    pub fn description(&self) -> Option<&'a str> {
        self.must.dsc.as_deref()
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.must.ref_.as_deref()
    }

    pub fn error_msg(&self) -> Option<&'a str> {
        self.must.emsg.as_deref()
    }

    pub fn error_apptag(&self) -> Option<&'a str> {
        self.must.eapptag.as_deref()
    }
}

// ===== impl SchemaStmtWhen =====

impl<'a> SchemaStmtWhen<'a> {
    /// XPath condition.
    pub fn condition(&self) -> &'a str {
        &self.when.source
    }

    pub fn description(&self) -> Option<&'a str> {
        self.when.dsc.as_deref()
    }

    pub fn reference(&self) -> Option<&'a str> {
        self.when.ref_.as_deref()
    }

    /// Returns whether both statements share one compiled condition.
    pub fn shares_condition(&self, other: &SchemaStmtWhen<'_>) -> bool {
        Arc::ptr_eq(&self.when.cond, &other.when.cond)
    }
}

// ===== impl SchemaLeafType =====

impl<'a> SchemaLeafType<'a> {
    /// Returns the resolved base type.
    pub fn base_type(&self) -> DataValueType {
        self.ty.base
    }

    /// Returns the typedef name if it exists.
    pub fn typedef_name(&self) -> Option<String> {
        self.ty.name.as_deref().map(str::to_owned)
    }

    /// Returns the real type of the leafref, corresponding to the first
    /// non-leafref in a possible chain of leafrefs.
    pub fn leafref_real_type(&self) -> Option<SchemaLeafType<'a>> {
        if self.base_type() != DataValueType::LeafRef {
            return None;
        }
        self.ty.realtype.get().map(|ty| SchemaLeafType {
            context: self.context,
            ty,
        })
    }

    /// Path of the leafref.
    pub fn leafref_path(&self) -> Option<&'a str> {
        self.ty.path.as_ref().map(|path| path.source.as_ref())
    }

    /// Member types of the union.
    pub fn union_types(&self) -> impl Iterator<Item = SchemaLeafType<'a>> + 'a {
        let context = self.context;
        self.ty
            .types
            .iter()
            .map(move |ty| SchemaLeafType { context, ty })
    }

    /// Enumeration names and values.
    pub fn enums(&self) -> Vec<(&'a str, i32)> {
        self.ty
            .enums
            .iter()
            .map(|item| (item.name.as_ref(), item.value))
            .collect()
    }

    /// Bit names and positions.
    pub fn bits(&self) -> Vec<(&'a str, u32)> {
        self.ty
            .bits
            .iter()
            .map(|item| (item.name.as_ref(), item.position))
            .collect()
    }

    pub fn fraction_digits(&self) -> Option<u8> {
        match self.ty.base {
            DataValueType::Dec64 => Some(self.ty.fraction_digits),
            _ => None,
        }
    }

    pub fn require_instance(&self) -> bool {
        self.ty.require_instance
    }

    /// Length restriction as written in the schema.
    pub fn length(&self) -> Option<&'a str> {
        self.ty.length.as_ref().map(|length| length.source.as_ref())
    }

    /// Range restriction as written in the schema.
    pub fn range(&self) -> Option<&'a str> {
        self.ty.range.as_ref().map(|range| range.source.as_ref())
    }

    /// Patterns with their invert-match flag.
    pub fn patterns(&self) -> Vec<(&'a str, bool)> {
        self.ty
            .patterns
            .iter()
            .map(|pattern| (pattern.source.as_ref(), pattern.inverted))
            .collect()
    }

    /// Base identities of the identityref.
    pub fn identity_bases(
        &self,
    ) -> impl Iterator<Item = SchemaIdentity<'a>> + 'a {
        let context = self.context;
        self.ty
            .bases
            .iter()
            .map(move |id| SchemaIdentity { context, id: *id })
    }
}

// ===== impl DataValue =====

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataValue::Uint8(v) => write!(f, "{}", v),
            DataValue::Uint16(v) => write!(f, "{}", v),
            DataValue::Uint32(v) => write!(f, "{}", v),
            DataValue::Uint64(v) => write!(f, "{}", v),
            DataValue::Bool(v) => write!(f, "{}", v),
            DataValue::Empty => Ok(()),
            DataValue::Int8(v) => write!(f, "{}", v),
            DataValue::Int16(v) => write!(f, "{}", v),
            DataValue::Int32(v) => write!(f, "{}", v),
            DataValue::Int64(v) => write!(f, "{}", v),
            DataValue::Other(v) => write!(f, "{}", v),
        }
    }
}

// ===== impl SNode =====

impl SNode {
    pub(crate) fn new(
        kind: SchemaNodeKind,
        module: usize,
        name: Arc<str>,
        id: usize,
    ) -> SNode {
        SNode {
            kind,
            module,
            name,
            links: NodeLinks::new(id),
            actions: None,
            notifs: None,
            flags: SchemaFlags::empty(),
            status: Status::Current,
            dsc: None,
            ref_: None,
            whens: Vec::new(),
            musts: Vec::new(),
            exts: Vec::new(),
            order: 0,
            payload: Payload::None,
        }
    }

    pub(crate) fn leaf_type(&self) -> Option<&Arc<CompiledType>> {
        match &self.payload {
            Payload::Leaf { ty, .. } | Payload::LeafList { ty, .. } => Some(ty),
            _ => None,
        }
    }

    /// Whether instances of the node appear in data trees.
    pub(crate) fn is_data(&self) -> bool {
        !matches!(
            self.kind,
            SchemaNodeKind::Choice
                | SchemaNodeKind::Case
                | SchemaNodeKind::Input
                | SchemaNodeKind::Output
        )
    }

    pub(crate) fn is_term(&self) -> bool {
        matches!(self.kind, SchemaNodeKind::Leaf | SchemaNodeKind::LeafList)
    }

    pub(crate) fn is_config(&self) -> bool {
        self.flags.contains(SchemaFlags::CONFIG_W)
    }

    pub(crate) fn is_user_ordered(&self) -> bool {
        self.flags.contains(SchemaFlags::USER_ORDERED)
    }

    pub(crate) fn list_keys(&self) -> &[usize] {
        match &self.payload {
            Payload::List { keys, .. } => keys,
            _ => &[],
        }
    }
}

// ===== impl SchemaStore =====

impl LinkArena for SchemaStore {
    fn links(&self, id: usize) -> &NodeLinks {
        &self.nodes[id].links
    }

    fn links_mut(&mut self, id: usize) -> &mut NodeLinks {
        &mut self.nodes[id].links
    }
}

impl SchemaStore {
    pub(crate) fn children(&self, parent: usize) -> SiblingIds<'_, SchemaStore> {
        self.siblings_from(self.nodes[parent].links.child)
    }

    /// Top-level nodes of a module: data, RPCs, then notifications.
    pub(crate) fn top_level(
        &self,
        module: usize,
    ) -> impl Iterator<Item = usize> + '_ {
        let schema = self.modules.get(module).cloned().unwrap_or_default();
        self.siblings_from(schema.data)
            .chain(self.siblings_from(schema.rpcs))
            .chain(self.siblings_from(schema.notifs))
    }

    /// Children of a node as they appear in data trees: choice and case
    /// are transparent, RPCs and actions expose input then output.
    pub(crate) fn data_children(&self, parent: Option<usize>, module: Option<usize>) -> Vec<usize> {
        let mut out = Vec::new();
        match parent {
            Some(parent) => {
                for id in self.children(parent) {
                    self.collect_data(id, &mut out);
                }
                let snode = &self.nodes[parent];
                out.extend(self.siblings_from(snode.actions));
                out.extend(self.siblings_from(snode.notifs));
            }
            None => {
                let modules: Vec<usize> = match module {
                    Some(module) => vec![module],
                    None => (0..self.modules.len()).collect(),
                };
                for module in modules {
                    for id in self.top_level(module) {
                        self.collect_data(id, &mut out);
                    }
                }
            }
        }
        out
    }

    fn collect_data(&self, id: usize, out: &mut Vec<usize>) {
        if self.nodes[id].is_data() {
            out.push(id);
        } else {
            for child in self.children(id) {
                self.collect_data(child, out);
            }
        }
    }

    /// Finds the data child of `parent` (or a top-level node) by module and
    /// name.
    pub(crate) fn find_data_child(
        &self,
        parent: Option<usize>,
        module: usize,
        name: &str,
    ) -> Option<usize> {
        let candidates = match parent {
            Some(_) => self.data_children(parent, None),
            None => self.data_children(None, Some(module)),
        };
        candidates.into_iter().find(|id| {
            let snode = &self.nodes[*id];
            snode.module == module && &*snode.name == name
        })
    }

    /// Nearest ancestor that is instantiated in data trees.
    pub(crate) fn data_parent(&self, id: usize) -> Option<usize> {
        let mut parent = self.nodes[id].links.parent;
        while let Some(p) = parent {
            if self.nodes[p].is_data() {
                return Some(p);
            }
            parent = self.nodes[p].links.parent;
        }
        None
    }

    pub(crate) fn annotation(&self, module: usize, name: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|annotation| annotation.module == module && &*annotation.name == name)
    }

    pub(crate) fn identity(&self, module: usize, name: &str) -> Option<usize> {
        self.identity_index.get(&(module, Arc::from(name))).copied()
    }

    /// Whether `ident` is derived, directly or not, from `base`.
    pub(crate) fn identity_derived_from(&self, ident: usize, base: usize) -> bool {
        let mut stack = self.identities[ident].bases.clone();
        let mut visited = Vec::new();
        while let Some(id) = stack.pop() {
            if id == base {
                return true;
            }
            if !visited.contains(&id) {
                visited.push(id);
                stack.extend(self.identities[id].bases.iter().copied());
            }
        }
        false
    }

    pub(crate) fn identity_name(&self, modules: &[ModuleEntry], id: usize) -> String {
        let identity = &self.identities[id];
        format!("{}:{}", modules[identity.module].name, identity.name)
    }

    pub(crate) fn schema_path(
        &self,
        modules: &[ModuleEntry],
        id: usize,
        format: SchemaPathFormat,
    ) -> String {
        let mut chain = vec![id];
        let mut parent = self.nodes[id].links.parent;
        while let Some(p) = parent {
            chain.push(p);
            parent = self.nodes[p].links.parent;
        }
        let mut path = String::new();
        let mut prev_module = None;
        for id in chain.into_iter().rev() {
            let snode = &self.nodes[id];
            if format == SchemaPathFormat::DATA && !snode.is_data() {
                continue;
            }
            path.push('/');
            if prev_module != Some(snode.module) {
                path.push_str(&modules[snode.module].name);
                path.push(':');
                prev_module = Some(snode.module);
            }
            path.push_str(&snode.name);
        }
        path
    }
}
