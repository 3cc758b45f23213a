//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XML encoding of YANG data (RFC 7950, section 7).

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::rc::Rc;

use crate::context::Prefixes;
use crate::data::json::{default_tag, printable, wd_default_meta};
use crate::data::{
    AnyValue, DataParserFlags, DataPrinterFlags, DataTree, Lookup, NodeValue,
    Opaque, ParseOptions,
};
use crate::error::{Error, Result, ValidationErrorCode};
use crate::schema::types::print_value_xml;
use crate::schema::SchemaNodeKind;

/// Generic XML element.
#[derive(Debug, Default)]
pub(crate) struct Element {
    prefix: Option<String>,
    name: String,
    namespace: Option<String>,
    /// Namespace declarations in scope, the last one of a prefix wins.
    scope: Rc<Vec<(String, String)>>,
    /// Namespace declarations of this element.
    decls: Vec<(String, String)>,
    attrs: Vec<(Option<String>, String, String)>,
    children: Vec<Element>,
    text: String,
    line: u64,
}

struct Parser<'t, 'a> {
    tree: &'t mut DataTree<'a>,
    options: ParseOptions,
}

struct Printer<'t, 'a> {
    tree: &'t DataTree<'a>,
    options: DataPrinterFlags,
    out: String,
    level: usize,
    declared: Vec<(String, String)>,
}

// ===== impl Element =====

impl Element {
    fn lookup(&self, prefix: Option<&str>) -> Option<String> {
        let prefix = prefix.unwrap_or("");
        self.scope
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.clone())
    }

    /// Serializes the element back into XML text.
    fn write(&self, out: &mut String, top: bool) {
        out.push('<');
        let qname = match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        };
        out.push_str(&qname);
        if top && self.prefix.is_none() && !self.decls.iter().any(|(p, _)| p.is_empty()) {
            if let Some(ns) = &self.namespace {
                out.push_str(&format!(" xmlns=\"{}\"", escape(ns.as_str())));
            }
        }
        for (prefix, ns) in &self.decls {
            match prefix.is_empty() {
                true => out.push_str(&format!(" xmlns=\"{}\"", escape(ns.as_str()))),
                false => out.push_str(&format!(
                    " xmlns:{}=\"{}\"",
                    prefix,
                    escape(ns.as_str())
                )),
            }
        }
        for (prefix, name, value) in &self.attrs {
            out.push(' ');
            if let Some(prefix) = prefix {
                out.push_str(prefix);
                out.push(':');
            }
            out.push_str(&format!("{}=\"{}\"", name, escape(value.as_str())));
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        out.push_str(&escape(self.text.as_str()));
        for child in &self.children {
            child.write(out, false);
        }
        out.push_str(&format!("</{}>", qname));
    }
}

// ===== impl Parser =====

impl<'t, 'a> Parser<'t, 'a> {
    fn elements(&mut self, parent: Option<usize>, elements: Vec<Element>) -> Result<()> {
        let context = self.tree.context;
        for element in elements {
            if parent.is_none() && element.namespace.is_none() {
                return Err(Error::valid(
                    ValidationErrorCode::SyntaxXml,
                    format!("Missing XML namespace of element \"{}\".", element.name),
                )
                .with_line(element.line));
            }
            let module = element
                .namespace
                .as_deref()
                .and_then(|ns| context.module_by_ns(ns));
            match self.tree.lookup_child(parent, module, &element.name, &self.options)? {
                Lookup::Schema(schema) => self.schema_element(parent, schema, element)?,
                Lookup::Opaque => self.opaque(parent, element)?,
                Lookup::Skip => {}
            }
        }
        Ok(())
    }

    fn schema_element(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        element: Element,
    ) -> Result<()> {
        let kind = self.tree.context.schema.nodes[schema].kind;
        let id = match kind {
            SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
                if !element.children.is_empty() {
                    return Err(Error::valid(
                        ValidationErrorCode::SyntaxXml,
                        format!("Unexpected child elements of \"{}\".", element.name),
                    )
                    .with_line(element.line)
                    .with_path(self.tree.child_path(parent, schema)));
                }
                let value = self
                    .tree
                    .store_term(schema, &element.text, Prefixes::Xml(&element.scope))
                    .map_err(|error| {
                        error
                            .with_line(element.line)
                            .with_path(self.tree.child_path(parent, schema))
                    })?;
                let id = self.tree.alloc(Some(schema), NodeValue::Term(value));
                self.tree.link_child(parent, id);
                id
            }
            SchemaNodeKind::AnyData => {
                let any = if element.children.is_empty() {
                    AnyValue::String(element.text.clone())
                } else {
                    let mut xml = String::new();
                    for child in &element.children {
                        child.write(&mut xml, true);
                    }
                    AnyValue::Xml(xml)
                };
                let id = self.tree.alloc(Some(schema), NodeValue::Any(any));
                self.tree.link_child(parent, id);
                id
            }
            _ => {
                let id = self.tree.alloc(Some(schema), NodeValue::Inner);
                self.tree.link_child(parent, id);
                self.meta(id, &element)?;
                self.elements(Some(id), element.children)?;
                self.tree.finish_node(id)?;
                return Ok(());
            }
        };
        self.meta(id, &element)?;
        self.tree.rehash(id);
        Ok(())
    }

    fn opaque(&mut self, parent: Option<usize>, element: Element) -> Result<()> {
        let context = self.tree.context;
        let module = element
            .namespace
            .as_deref()
            .and_then(|ns| context.module_by_ns(ns))
            .map(|module| context.modules[module].name.to_string());
        let opaque = Opaque {
            name: element.name,
            module,
            namespace: element.namespace,
            value: element.text,
        };
        let id = self.tree.alloc(None, NodeValue::Opaque(opaque));
        self.tree.link_child(parent, id);
        self.tree.rehash(id);
        self.elements(Some(id), element.children)
    }

    fn meta(&mut self, id: usize, element: &Element) -> Result<()> {
        let context = self.tree.context;
        let strict = self.options.flags.contains(DataParserFlags::STRICT);
        for (prefix, name, value) in &element.attrs {
            let Some(prefix) = prefix else {
                continue;
            };
            let module = element
                .lookup(Some(prefix))
                .and_then(|ns| context.module_by_ns(&ns));
            let known = module
                .is_some_and(|module| context.schema.annotation(module, name).is_some());
            let (Some(module), true) = (module, known) else {
                if strict {
                    return Err(Error::valid(
                        ValidationErrorCode::Data,
                        format!("Unknown XML attribute \"{}:{}\".", prefix, name),
                    )
                    .with_line(element.line)
                    .with_path(self.tree.node_path(id)));
                }
                continue;
            };
            let meta = self
                .tree
                .store_meta(module, name, value, Prefixes::Xml(&element.scope))
                .map_err(|error| {
                    error.with_line(element.line).with_path(self.tree.node_path(id))
                })?;
            self.tree.nodes[id].meta.push(meta);
        }
        Ok(())
    }
}

// ===== impl Printer =====

impl<'t, 'a> Printer<'t, 'a> {
    fn newline(&mut self) {
        if !self.options.contains(DataPrinterFlags::SHRINK) {
            self.out.push('\n');
        }
    }

    fn indent(&mut self) {
        if !self.options.contains(DataPrinterFlags::SHRINK) {
            for _ in 0..self.level {
                self.out.push_str("  ");
            }
        }
    }

    // Declares a prefix unless an ancestor already did.
    fn declare(&mut self, prefix: &str, ns: &str) {
        if self
            .declared
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .is_some_and(|(_, declared)| declared == ns)
        {
            return;
        }
        self.out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(ns)));
        self.declared.push((prefix.to_owned(), ns.to_owned()));
    }

    fn node(&mut self, id: usize, parent_ns: Option<&str>) {
        if !printable(self.tree, id, self.options) {
            return;
        }
        let tree = self.tree;
        let context = tree.context;
        let modules = &context.modules;
        let dnode = &tree.nodes[id];
        let (name, ns): (&str, Option<&str>) = match (tree.snode(id), &dnode.value) {
            (Some(snode), _) => (&snode.name, Some(&modules[snode.module].namespace)),
            (None, NodeValue::Opaque(opaque)) => (&opaque.name, opaque.namespace.as_deref()),
            _ => return,
        };
        let mark = self.declared.len();

        self.indent();
        self.out.push('<');
        self.out.push_str(name);
        if let Some(ns) = ns {
            if Some(ns) != parent_ns {
                self.out.push_str(&format!(" xmlns=\"{}\"", escape(ns)));
            }
        }

        let mut meta = dnode.meta.clone();
        if default_tag(tree, id, self.options) {
            meta.extend(wd_default_meta(tree));
        }
        let mut attrs = String::new();
        for meta in &meta {
            let module = &modules[meta.module];
            self.declare(&module.prefix, &module.namespace);
            let (text, used) = print_value_xml(&meta.value, modules, &context.schema);
            for module in used {
                self.declare(&modules[module].prefix, &modules[module].namespace);
            }
            attrs.push_str(&format!(
                " {}:{}=\"{}\"",
                module.prefix,
                meta.name,
                escape(text.as_str())
            ));
        }

        match &dnode.value {
            NodeValue::Term(value) => {
                let (text, used) = print_value_xml(value, modules, &context.schema);
                for module in used {
                    self.declare(&modules[module].prefix, &modules[module].namespace);
                }
                self.out.push_str(&attrs);
                if text.is_empty() {
                    self.out.push_str("/>");
                } else {
                    self.out.push('>');
                    self.out.push_str(&escape(text.as_str()));
                    self.out.push_str(&format!("</{}>", name));
                }
            }
            NodeValue::Any(any) => {
                self.out.push_str(&attrs);
                let text = match any {
                    AnyValue::Xml(xml) | AnyValue::Tree { xml, .. } => xml.clone(),
                    AnyValue::String(value) | AnyValue::Json(value) => {
                        escape(value.as_str()).into_owned()
                    }
                };
                if text.is_empty() {
                    self.out.push_str("/>");
                } else {
                    self.out.push('>');
                    self.out.push_str(&text);
                    self.out.push_str(&format!("</{}>", name));
                }
            }
            NodeValue::Inner | NodeValue::Opaque(_) => {
                self.out.push_str(&attrs);
                let children: Vec<usize> = tree
                    .child_ids(Some(id))
                    .into_iter()
                    .filter(|child| printable(tree, *child, self.options))
                    .collect();
                let text = match &dnode.value {
                    NodeValue::Opaque(opaque) => opaque.value.as_str(),
                    _ => "",
                };
                if children.is_empty() {
                    if text.is_empty() {
                        self.out.push_str("/>");
                    } else {
                        self.out.push('>');
                        self.out.push_str(&escape(text));
                        self.out.push_str(&format!("</{}>", name));
                    }
                } else {
                    self.out.push('>');
                    self.newline();
                    self.level += 1;
                    for child in children {
                        self.node(child, ns);
                    }
                    self.level -= 1;
                    self.indent();
                    self.out.push_str(&format!("</{}>", name));
                }
            }
        }
        self.newline();
        self.declared.truncate(mark);
    }
}

// ===== helper functions =====

fn error(source: &str, position: usize, msg: impl Into<String>) -> Error {
    let end = position.min(source.len());
    let line = source.as_bytes()[..end]
        .iter()
        .filter(|b| **b == b'\n')
        .count() as u64
        + 1;
    Error::valid(ValidationErrorCode::SyntaxXml, msg).with_line(line)
}

fn start_element(
    source: &str,
    position: usize,
    parent: Option<&Element>,
    start: &BytesStart<'_>,
) -> Result<Element> {
    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let (prefix, name) = match qname.split_once(':') {
        Some((prefix, name)) => (Some(prefix.to_owned()), name.to_owned()),
        None => (None, qname.clone()),
    };

    let mut decls = Vec::new();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| error(source, position, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| error(source, position, e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            decls.push((String::new(), value));
        } else if let Some(ns_prefix) = key.strip_prefix("xmlns:") {
            decls.push((ns_prefix.to_owned(), value));
        } else {
            match key.split_once(':') {
                Some((p, local)) => attrs.push((Some(p.to_owned()), local.to_owned(), value)),
                None => attrs.push((None, key, value)),
            }
        }
    }

    let parent_scope = parent.map(|parent| parent.scope.clone()).unwrap_or_default();
    let scope = if decls.is_empty() {
        parent_scope
    } else {
        let mut scope = (*parent_scope).clone();
        scope.extend(decls.iter().cloned());
        Rc::new(scope)
    };
    let mut element = Element {
        prefix,
        name,
        scope,
        decls,
        attrs,
        line: error(source, position, "").line,
        ..Default::default()
    };
    element.namespace = element.lookup(element.prefix.as_deref());
    if element.prefix.is_some() && element.namespace.is_none() {
        return Err(error(
            source,
            position,
            format!("Unknown XML prefix of element \"{}\".", qname),
        ));
    }
    Ok(element)
}

/// Reads XML text into generic elements. Several top-level elements are
/// allowed.
pub(crate) fn read_elements(data: &[u8]) -> Result<Vec<Element>> {
    let source = std::str::from_utf8(data)
        .map_err(|e| Error::valid(ValidationErrorCode::SyntaxXml, e.to_string()))?;
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots = Vec::new();

    loop {
        let position = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let element = start_element(source, position, stack.last(), &start)?;
                stack.push(element);
            }
            Ok(Event::Empty(start)) => {
                let element = start_element(source, position, stack.last(), &start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => roots.push(element),
                }
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| error(source, position, e.to_string()))?;
                match stack.last_mut() {
                    Some(element) => element.text.push_str(&text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(error(source, position, "Unexpected text outside of elements."))
                    }
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(element) = stack.last_mut() {
                    element
                        .text
                        .push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let Some(mut element) = stack.pop() else {
                    return Err(error(source, position, "Unexpected closing element."));
                };
                // Whitespace between child elements is not a value.
                if !element.children.is_empty() && element.text.trim().is_empty() {
                    element.text.clear();
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => roots.push(element),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(error(source, position, e.to_string())),
        }
    }
    if !stack.is_empty() {
        return Err(error(source, source.len(), "Unexpected end of XML data."));
    }
    Ok(roots)
}

// ===== global functions =====

/// Parses XML data into the (empty) tree.
pub(crate) fn parse(tree: &mut DataTree<'_>, data: &[u8], options: ParseOptions) -> Result<()> {
    let elements = read_elements(data)?;
    let mut parser = Parser { tree, options };
    parser.elements(None, elements)
}

/// Prints the given sibling nodes as XML elements.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[usize], options: DataPrinterFlags) -> String {
    let mut printer = Printer {
        tree,
        options,
        out: String::new(),
        level: 0,
        declared: Vec::new(),
    };
    for root in roots {
        printer.node(*root, None);
    }
    printer.out
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_are_scoped() {
        let elements = read_elements(
            br#"<a xmlns="urn:a" xmlns:b="urn:b"><b:x>1</b:x><y xmlns="urn:c"/></a><z xmlns="urn:z"/>"#,
        )
        .unwrap();
        assert_eq!(elements.len(), 2);
        let a = &elements[0];
        assert_eq!(a.namespace.as_deref(), Some("urn:a"));
        assert_eq!(a.children[0].namespace.as_deref(), Some("urn:b"));
        assert_eq!(a.children[0].text, "1");
        assert_eq!(a.children[1].namespace.as_deref(), Some("urn:c"));
        assert_eq!(elements[1].namespace.as_deref(), Some("urn:z"));
    }

    #[test]
    fn malformed_input() {
        assert!(read_elements(b"<a xmlns=\"urn:a\"><b></a>").is_err());
        assert!(read_elements(b"<x:a/>").is_err());
        assert!(read_elements(b"<a xmlns=\"urn:a\">").is_err());
    }

    #[test]
    fn elements_are_written_back() {
        let elements =
            read_elements(br#"<a xmlns="urn:a"><b attr="1">x &amp; y</b><c/></a>"#).unwrap();
        let mut out = String::new();
        elements[0].children[0].write(&mut out, true);
        assert_eq!(out, r#"<b xmlns="urn:a" attr="1">x &amp; y</b>"#);
    }
}
