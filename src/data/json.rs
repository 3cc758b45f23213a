//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! JSON encoding of YANG data (RFC 7951).

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

use crate::context::Prefixes;
use crate::data::{
    AnyValue, DataPrinterFlags, DataTree, Lookup, Meta, NodeFlags, NodeValue,
    Opaque, ParseOptions,
};
use crate::error::{Error, Result, ValidationErrorCode};
use crate::schema::types::{Encoding, Value};
use crate::schema::{DataValue, SchemaFlags, SchemaNodeKind};
use crate::utils::LinkArena;

/// Generic JSON value keeping member order and duplicate members.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum JsonValue {
    Null,
    Bool(bool),
    Number(String),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

struct JsonVisitor;

struct Parser<'t, 'a> {
    tree: &'t mut DataTree<'a>,
    options: ParseOptions,
}

struct Printer<'t, 'a> {
    tree: &'t DataTree<'a>,
    options: DataPrinterFlags,
    out: String,
    level: usize,
}

const WD_MODULE: &str = "ietf-netconf-with-defaults";

// ===== impl JsonValue =====

impl JsonValue {
    /// JSON type of a scalar member value.
    fn encoding(&self) -> Encoding {
        match self {
            JsonValue::Number(_) => Encoding::Number,
            JsonValue::Bool(_) => Encoding::Bool,
            JsonValue::Array(_) => Encoding::Empty,
            _ => Encoding::String,
        }
    }

    /// Text of a scalar member value. `[null]` is the value of the empty
    /// type.
    fn scalar_text(&self) -> Option<String> {
        match self {
            JsonValue::String(value) | JsonValue::Number(value) => {
                Some(value.clone())
            }
            JsonValue::Bool(value) => Some(value.to_string()),
            JsonValue::Array(items)
                if items.len() == 1 && items[0] == JsonValue::Null =>
            {
                Some(String::new())
            }
            _ => None,
        }
    }

    /// Compact serialization.
    pub(crate) fn write(&self, out: &mut String) {
        match self {
            JsonValue::Null => out.push_str("null"),
            JsonValue::Bool(value) => out.push_str(&value.to_string()),
            JsonValue::Number(value) => out.push_str(value),
            JsonValue::String(value) => out.push_str(&quote(value)),
            JsonValue::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write(out);
                }
                out.push(']');
            }
            JsonValue::Object(members) => {
                out.push('{');
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&quote(name));
                    out.push(':');
                    value.write(out);
                }
                out.push('}');
            }
        }
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<JsonValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(JsonVisitor)
    }
}

impl<'de> Visitor<'de> for JsonVisitor {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a JSON value")
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(value.to_string()))
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(value.to_string()))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Number(value.to_string()))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::String(value.to_owned()))
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::String(value))
    }

    fn visit_unit<E>(self) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<JsonValue, E> {
        Ok(JsonValue::Null)
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<JsonValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(JsonValue::Array(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<JsonValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut members = Vec::new();
        while let Some((name, value)) = map.next_entry::<String, JsonValue>()? {
            members.push((name, value));
        }
        Ok(JsonValue::Object(members))
    }
}

// ===== impl Parser =====

impl<'t, 'a> Parser<'t, 'a> {
    fn members(
        &mut self,
        parent: Option<usize>,
        parent_module: Option<usize>,
        members: Vec<(String, JsonValue)>,
    ) -> Result<()> {
        let context = self.tree.context;
        let mut annotations = Vec::new();
        let mut created: Vec<(String, Vec<usize>)> = Vec::new();

        for (member, value) in members {
            if member == "@" {
                if let Some(parent) = parent {
                    self.meta(parent, value)?;
                }
                continue;
            }
            if let Some(name) = member.strip_prefix('@') {
                annotations.push((name.to_owned(), value));
                continue;
            }

            let (prefix, name) = split_name(&member);
            if parent.is_none() && prefix.is_none() {
                return Err(Error::valid(
                    ValidationErrorCode::SyntaxJson,
                    format!(
                        "Top-level JSON object member \"{}\" must be namespace-qualified.",
                        member
                    ),
                ));
            }
            let module = match prefix {
                Some(prefix) => context.module_by_name(prefix),
                None => parent_module,
            };
            match self.tree.lookup_child(parent, module, name, &self.options)? {
                Lookup::Schema(schema) => {
                    let ids = self.schema_member(parent, schema, value)?;
                    created.push((member.clone(), ids));
                }
                Lookup::Opaque => {
                    let module_name = prefix
                        .map(str::to_owned)
                        .or_else(|| self.opaque_module(parent))
                        .or_else(|| {
                            parent_module.map(|m| context.modules[m].name.to_string())
                        });
                    self.opaque(parent, module_name, name, value)?;
                }
                Lookup::Skip => {}
            }
        }

        // Annotations of terms are siblings named "@<member>".
        for (name, value) in annotations {
            let Some((_, ids)) = created.iter().find(|(member, _)| *member == name)
            else {
                continue;
            };
            match value {
                JsonValue::Array(items) => {
                    for (id, item) in ids.iter().zip(items) {
                        if item != JsonValue::Null {
                            self.meta(*id, item)?;
                        }
                    }
                }
                value => {
                    if let Some(id) = ids.first() {
                        self.meta(*id, value)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn schema_member(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        value: JsonValue,
    ) -> Result<Vec<usize>> {
        let snode = &self.tree.context.schema.nodes[schema];
        match (snode.kind, value) {
            (SchemaNodeKind::Leaf, value) => Ok(vec![self.term(parent, schema, &value)?]),
            (SchemaNodeKind::LeafList, JsonValue::Array(items)) => items
                .iter()
                .map(|item| self.term(parent, schema, item))
                .collect(),
            (SchemaNodeKind::List, JsonValue::Array(items)) => {
                let mut ids = Vec::new();
                for item in items {
                    let JsonValue::Object(members) = item else {
                        return Err(self.unexpected(parent, schema, "object"));
                    };
                    ids.push(self.inner(parent, schema, members)?);
                }
                Ok(ids)
            }
            (SchemaNodeKind::AnyData, value) => {
                let any = match value {
                    JsonValue::String(value) => AnyValue::String(value),
                    value => {
                        let mut json = String::new();
                        value.write(&mut json);
                        AnyValue::Json(json)
                    }
                };
                let id = self.tree.alloc(Some(schema), NodeValue::Any(any));
                self.tree.link_child(parent, id);
                self.tree.rehash(id);
                Ok(vec![id])
            }
            (
                SchemaNodeKind::Container
                | SchemaNodeKind::Rpc
                | SchemaNodeKind::Action
                | SchemaNodeKind::Notification,
                JsonValue::Object(members),
            ) => Ok(vec![self.inner(parent, schema, members)?]),
            (SchemaNodeKind::LeafList | SchemaNodeKind::List, _) => {
                Err(self.unexpected(parent, schema, "array"))
            }
            _ => Err(self.unexpected(parent, schema, "object")),
        }
    }

    fn unexpected(&self, parent: Option<usize>, schema: usize, expected: &str) -> Error {
        let snode = &self.tree.context.schema.nodes[schema];
        Error::valid(
            ValidationErrorCode::SyntaxJson,
            format!("Expected JSON {} for node \"{}\".", expected, snode.name),
        )
        .with_path(self.tree.child_path(parent, schema))
    }

    fn inner(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        members: Vec<(String, JsonValue)>,
    ) -> Result<usize> {
        let module = self.tree.context.schema.nodes[schema].module;
        let id = self.tree.alloc(Some(schema), NodeValue::Inner);
        self.tree.link_child(parent, id);
        self.members(Some(id), Some(module), members)?;
        self.tree.finish_node(id)?;
        Ok(id)
    }

    fn term(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        value: &JsonValue,
    ) -> Result<usize> {
        let Some(text) = value.scalar_text() else {
            return Err(self.unexpected(parent, schema, "scalar"));
        };
        let value = self
            .tree
            .store_encoded_term(schema, &text, Prefixes::Json, value.encoding())
            .map_err(|error| error.with_path(self.tree.child_path(parent, schema)))?;
        let id = self.tree.alloc(Some(schema), NodeValue::Term(value));
        self.tree.link_child(parent, id);
        self.tree.rehash(id);
        Ok(id)
    }

    fn opaque_module(&self, parent: Option<usize>) -> Option<String> {
        match &self.tree.nodes[parent?].value {
            NodeValue::Opaque(opaque) => opaque.module.clone(),
            _ => None,
        }
    }

    fn opaque(
        &mut self,
        parent: Option<usize>,
        module: Option<String>,
        name: &str,
        value: JsonValue,
    ) -> Result<()> {
        match value {
            JsonValue::Array(items) if !matches!(items.as_slice(), [JsonValue::Null]) => {
                for item in items {
                    self.opaque(parent, module.clone(), name, item)?;
                }
            }
            JsonValue::Object(members) => {
                let id = self.alloc_opaque(parent, module.clone(), name, String::new());
                let parent_module =
                    module.as_deref().and_then(|m| self.tree.context.module_by_name(m));
                self.members(Some(id), parent_module, members)?;
            }
            value => {
                let text = value.scalar_text().unwrap_or_default();
                self.alloc_opaque(parent, module, name, text);
            }
        }
        Ok(())
    }

    fn alloc_opaque(
        &mut self,
        parent: Option<usize>,
        module: Option<String>,
        name: &str,
        value: String,
    ) -> usize {
        let opaque = Opaque {
            name: name.to_owned(),
            module,
            namespace: None,
            value,
        };
        let id = self.tree.alloc(None, NodeValue::Opaque(opaque));
        self.tree.link_child(parent, id);
        self.tree.rehash(id);
        id
    }

    fn meta(&mut self, id: usize, value: JsonValue) -> Result<()> {
        let JsonValue::Object(members) = value else {
            return Err(Error::valid(
                ValidationErrorCode::SyntaxJson,
                "Metadata must be encoded as a JSON object.",
            )
            .with_path(self.tree.node_path(id)));
        };
        let context = self.tree.context;
        let strict = self
            .options
            .flags
            .contains(crate::data::DataParserFlags::STRICT);
        for (member, value) in members {
            let (prefix, name) = split_name(&member);
            let module = prefix.and_then(|prefix| context.module_by_name(prefix));
            let known = module
                .is_some_and(|module| context.schema.annotation(module, name).is_some());
            let (Some(module), true) = (module, known) else {
                if strict {
                    return Err(Error::valid(
                        ValidationErrorCode::Data,
                        format!("Unknown metadata \"{}\".", member),
                    )
                    .with_path(self.tree.node_path(id)));
                }
                continue;
            };
            let text = value.scalar_text().unwrap_or_default();
            let meta = self
                .tree
                .store_encoded_meta(module, name, &text, Prefixes::Json, value.encoding())
                .map_err(|error| error.with_path(self.tree.node_path(id)))?;
            self.tree.nodes[id].meta.push(meta);
        }
        Ok(())
    }
}

// ===== impl Printer =====

impl<'t, 'a> Printer<'t, 'a> {
    fn shrink(&self) -> bool {
        self.options.contains(DataPrinterFlags::SHRINK)
    }

    fn newline(&mut self) {
        if !self.shrink() {
            self.out.push('\n');
            for _ in 0..self.level {
                self.out.push_str("  ");
            }
        }
    }

    fn key(&mut self, first: &mut bool, name: &str) {
        if !*first {
            self.out.push(',');
        }
        *first = false;
        self.newline();
        self.out.push_str(&quote(name));
        self.out.push(':');
        if !self.shrink() {
            self.out.push(' ');
        }
    }

    fn open(&mut self, c: char) {
        self.out.push(c);
        self.level += 1;
    }

    fn close(&mut self, c: char, empty: bool) {
        self.level -= 1;
        if !empty {
            self.newline();
        }
        self.out.push(c);
    }

    fn member_name(&self, id: usize, parent_module: Option<usize>) -> String {
        let context = self.tree.context;
        match (self.tree.snode(id), &self.tree.nodes[id].value) {
            (Some(snode), _) if Some(snode.module) == parent_module => {
                snode.name.to_string()
            }
            (Some(snode), _) => {
                format!("{}:{}", context.modules[snode.module].name, snode.name)
            }
            (None, NodeValue::Opaque(opaque)) => {
                let inherited = parent_module.map(|m| &*context.modules[m].name);
                match &opaque.module {
                    Some(module) if Some(module.as_str()) != inherited => {
                        format!("{}:{}", module, opaque.name)
                    }
                    _ => opaque.name.clone(),
                }
            }
            _ => String::new(),
        }
    }

    fn node_module(&self, id: usize) -> Option<usize> {
        match (self.tree.snode(id), &self.tree.nodes[id].value) {
            (Some(snode), _) => Some(snode.module),
            (None, NodeValue::Opaque(opaque)) => opaque
                .module
                .as_deref()
                .and_then(|m| self.tree.context.module_by_name(m)),
            _ => None,
        }
    }

    /// Prints the members of an open object.
    fn members(&mut self, ids: &[usize], parent_module: Option<usize>, meta_of: Option<usize>) {
        let mut first = true;
        if let Some(id) = meta_of {
            let meta = self.meta_list(id);
            if !meta.is_empty() {
                self.key(&mut first, "@");
                self.meta_object(&meta);
            }
        }

        let mut i = 0;
        while i < ids.len() {
            let id = ids[i];
            let schema = self.tree.nodes[id].schema;
            let kind = self.tree.snode(id).map(|snode| snode.kind);
            let mut run = vec![id];
            if matches!(kind, Some(SchemaNodeKind::List | SchemaNodeKind::LeafList)) {
                while i + 1 < ids.len() && self.tree.nodes[ids[i + 1]].schema == schema {
                    i += 1;
                    run.push(ids[i]);
                }
            }
            i += 1;
            run.retain(|id| printable(self.tree, *id, self.options));
            if run.is_empty() {
                continue;
            }

            let name = self.member_name(id, parent_module);
            self.key(&mut first, &name);
            match kind {
                Some(SchemaNodeKind::List) => {
                    self.open('[');
                    for (n, entry) in run.iter().enumerate() {
                        if n > 0 {
                            self.out.push(',');
                        }
                        self.newline();
                        self.inner(*entry);
                    }
                    self.close(']', false);
                }
                Some(SchemaNodeKind::LeafList) => {
                    self.open('[');
                    for (n, entry) in run.iter().enumerate() {
                        if n > 0 {
                            self.out.push(',');
                        }
                        self.newline();
                        self.value(*entry);
                    }
                    self.close(']', false);
                    let metas: Vec<Vec<Meta>> =
                        run.iter().map(|entry| self.meta_list(*entry)).collect();
                    if metas.iter().any(|meta| !meta.is_empty()) {
                        let name = format!("@{}", name);
                        self.key(&mut first, &name);
                        self.open('[');
                        for (n, meta) in metas.iter().enumerate() {
                            if n > 0 {
                                self.out.push(',');
                            }
                            self.newline();
                            if meta.is_empty() {
                                self.out.push_str("null");
                            } else {
                                self.meta_object(meta);
                            }
                        }
                        self.close(']', false);
                    }
                }
                Some(SchemaNodeKind::Leaf) => {
                    self.value(id);
                    let meta = self.meta_list(id);
                    if !meta.is_empty() {
                        let name = format!("@{}", name);
                        self.key(&mut first, &name);
                        self.meta_object(&meta);
                    }
                }
                Some(SchemaNodeKind::AnyData) => self.value(id),
                None if self.tree.nodes[id].links.child.is_none() => self.value(id),
                _ => self.inner(id),
            }
        }
    }

    fn inner(&mut self, id: usize) {
        let children: Vec<usize> = self.tree.child_ids(Some(id));
        let module = self.node_module(id);
        self.open('{');
        let mark = self.out.len();
        self.members(&children, module, Some(id));
        let empty = self.out.len() == mark;
        self.close('}', empty);
    }

    fn value(&mut self, id: usize) {
        let tree = self.tree;
        match &tree.nodes[id].value {
            NodeValue::Term(value) => {
                let text = scalar(value);
                self.out.push_str(&text);
            }
            NodeValue::Any(AnyValue::Json(json) | AnyValue::Tree { json, .. }) => {
                if json.is_empty() {
                    self.out.push_str("{}");
                } else {
                    self.out.push_str(json);
                }
            }
            NodeValue::Any(AnyValue::String(value) | AnyValue::Xml(value)) => {
                self.out.push_str(&quote(value));
            }
            NodeValue::Opaque(opaque) => self.out.push_str(&quote(&opaque.value)),
            NodeValue::Inner => self.out.push_str("{}"),
        }
    }

    /// Metadata printed for a node, including the with-defaults tag.
    fn meta_list(&self, id: usize) -> Vec<Meta> {
        let mut list = self.tree.nodes[id].meta.clone();
        if default_tag(self.tree, id, self.options) {
            if let Some(meta) = wd_default_meta(self.tree) {
                list.push(meta);
            }
        }
        list
    }

    fn meta_object(&mut self, meta: &[Meta]) {
        let modules = &self.tree.context.modules;
        self.open('{');
        let mut first = true;
        for meta in meta {
            let name = format!("{}:{}", modules[meta.module].name, meta.name);
            self.key(&mut first, &name);
            self.out.push_str(&scalar(&meta.value));
        }
        self.close('}', meta.is_empty());
    }
}

// ===== helper functions =====

fn split_name(member: &str) -> (Option<&str>, &str) {
    match member.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, member),
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

/// JSON encoding of a stored value.
fn scalar(value: &Value) -> String {
    match &value.typed {
        DataValue::Uint8(_)
        | DataValue::Uint16(_)
        | DataValue::Uint32(_)
        | DataValue::Int8(_)
        | DataValue::Int16(_)
        | DataValue::Int32(_) => value.canonical.to_string(),
        DataValue::Bool(value) => value.to_string(),
        DataValue::Empty => "[null]".to_owned(),
        _ => quote(&value.canonical),
    }
}

/// The "ietf-netconf-with-defaults:default" annotation set to true.
pub(crate) fn wd_default_meta(tree: &DataTree<'_>) -> Option<Meta> {
    let module = tree
        .context
        .modules
        .iter()
        .position(|m| &*m.name == WD_MODULE)?;
    tree.store_meta(module, "default", "true", Prefixes::Json).ok()
}

/// Whether a node shows up in the output under the with-defaults mode.
pub(crate) fn printable(tree: &DataTree<'_>, id: usize, options: DataPrinterFlags) -> bool {
    let dnode = &tree.nodes[id];
    let Some(snode) = tree.snode(id) else {
        return true;
    };
    if snode.kind == SchemaNodeKind::Container
        && matches!(snode.payload, crate::schema::Payload::Container { presence: None })
    {
        return options.contains(DataPrinterFlags::KEEP_EMPTY_CONT)
            || !dnode.meta.is_empty()
            || tree
                .siblings_from(dnode.links.child)
                .any(|child| printable(tree, child, options));
    }
    let all = options.intersects(
        DataPrinterFlags::WD_ALL | DataPrinterFlags::WD_ALL_TAG | DataPrinterFlags::WD_IMPL_TAG,
    );
    if dnode.flags.contains(NodeFlags::DEFAULT) && !all {
        return false;
    }
    if options.contains(DataPrinterFlags::WD_TRIM)
        && snode.is_term()
        && !snode.flags.contains(SchemaFlags::KEY)
        && tree.is_default_node(id)
    {
        return false;
    }
    true
}

/// Whether a term is tagged with the with-defaults annotation.
pub(crate) fn default_tag(tree: &DataTree<'_>, id: usize, options: DataPrinterFlags) -> bool {
    if !tree.snode(id).is_some_and(|snode| snode.is_term()) {
        return false;
    }
    if options.contains(DataPrinterFlags::WD_ALL_TAG) {
        return tree.is_default_node(id);
    }
    if options.contains(DataPrinterFlags::WD_IMPL_TAG) {
        return tree.nodes[id].flags.contains(NodeFlags::DEFAULT);
    }
    false
}

// ===== global functions =====

/// Parses JSON data into the (empty) tree.
pub(crate) fn parse(tree: &mut DataTree<'_>, data: &[u8], options: ParseOptions) -> Result<()> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let root: JsonValue = serde_json::from_slice(data).map_err(|error| {
        Error::valid(ValidationErrorCode::SyntaxJson, error.to_string())
            .with_line(error.line() as u64)
    })?;
    let JsonValue::Object(members) = root else {
        return Err(Error::valid(
            ValidationErrorCode::SyntaxJson,
            "JSON data must be an object.",
        ));
    };
    let mut parser = Parser { tree, options };
    parser.members(None, None, members)
}

/// Prints the given sibling nodes as a JSON object.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[usize], options: DataPrinterFlags) -> String {
    let mut printer = Printer {
        tree,
        options,
        out: String::new(),
        level: 0,
    };
    printer.open('{');
    printer.members(roots, None, None);
    let empty = printer.out.len() == 1;
    printer.close('}', empty);
    if !printer.shrink() {
        printer.out.push('\n');
    }
    printer.out
}

/// JSON value of a single subtree.
pub(crate) fn to_json_value(tree: &DataTree<'_>, id: usize) -> serde_json::Value {
    let text = print(tree, &[id], DataPrinterFlags::SHRINK);
    serde_json::from_str(&text).unwrap_or(serde_json::Value::Null)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_order_is_kept() {
        let value: JsonValue =
            serde_json::from_str(r#"{"b": 1, "a": [null], "b": "x"}"#).unwrap();
        let JsonValue::Object(members) = &value else {
            panic!("not an object");
        };
        let names: Vec<&str> = members.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["b", "a", "b"]);
        assert_eq!(members[1].1.scalar_text().as_deref(), Some(""));
        let mut out = String::new();
        value.write(&mut out);
        assert_eq!(out, r#"{"b":1,"a":[null],"b":"x"}"#);
    }

    #[test]
    fn names() {
        assert_eq!(split_name("mod:leaf"), (Some("mod"), "leaf"));
        assert_eq!(split_name("leaf"), (None, "leaf"));
        assert_eq!(quote("a\"b"), r#""a\"b""#);
    }
}
