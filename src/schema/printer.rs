//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema printers.
//!
//! YANG and YIN output is regenerated from the statement tree of the parsed
//! module. The TREE output follows RFC 8340 and is built from the compiled
//! schema.

use quick_xml::escape::escape;

use crate::error::{Error, Result};
use crate::parser::yin::{yin_arg, YinArg, YIN_NAMESPACE};
use crate::parser::Stmt;
use crate::schema::types::base_name;
use crate::schema::{
    Payload, SchemaFlags, SchemaModule, SchemaNodeKind, SchemaOutputFormat,
    SchemaPrinterFlags,
};
use crate::utils::LinkArena;

// Statements kept with `NO_SUBSTMT`.
const HEADER_KEYWORDS: &[&str] = &[
    "yang-version",
    "namespace",
    "prefix",
    "belongs-to",
    "import",
    "include",
    "organization",
    "contact",
    "description",
    "reference",
    "revision",
];

// Arguments printed quoted even when they don't need to be.
const QUOTED_KEYWORDS: &[&str] = &[
    "augment",
    "contact",
    "default",
    "description",
    "deviation",
    "error-message",
    "must",
    "namespace",
    "organization",
    "path",
    "pattern",
    "presence",
    "reference",
    "units",
    "when",
];

struct Writer {
    out: String,
    shrink: bool,
}

// ===== impl Writer =====

impl Writer {
    fn newline(&mut self) {
        if !self.shrink {
            self.out.push('\n');
        }
    }

    fn indent(&mut self, level: usize) {
        if !self.shrink {
            self.out.push_str(&"  ".repeat(level));
        }
    }

    // ----- YANG -----

    fn yang_stmt(&mut self, stmt: &Stmt, level: usize, options: SchemaPrinterFlags) {
        self.indent(level);
        self.out.push_str(&stmt.keyword);
        if let Some(arg) = &stmt.arg {
            self.out.push(' ');
            let column = if self.shrink {
                0
            } else {
                level * 2 + stmt.keyword.len() + 1
            };
            self.yang_arg(&stmt.keyword, arg, column);
        }
        let substmts: Vec<&Stmt> = stmt
            .substmts
            .iter()
            .filter(|sub| {
                level > 0
                    || !options.contains(SchemaPrinterFlags::NO_SUBSTMT)
                    || HEADER_KEYWORDS.contains(&sub.keyword.as_str())
            })
            .collect();
        if substmts.is_empty() {
            self.out.push(';');
            self.newline();
            return;
        }
        self.out.push_str(if self.shrink { "{" } else { " {" });
        self.newline();
        for sub in substmts {
            self.yang_stmt(sub, level + 1, options);
        }
        self.indent(level);
        self.out.push('}');
        self.newline();
    }

    fn yang_arg(&mut self, keyword: &str, arg: &str, column: usize) {
        let needs_quotes = arg.is_empty()
            || QUOTED_KEYWORDS.contains(&keyword)
            || arg.contains(|c: char| {
                c.is_whitespace() || matches!(c, '"' | '\'' | ';' | '{' | '}' | '+')
            })
            || arg.contains("//")
            || arg.contains("/*");
        if !needs_quotes {
            self.out.push_str(arg);
            return;
        }
        if arg.contains('\\') && !arg.contains('\'') {
            self.out.push('\'');
            self.out.push_str(arg);
            self.out.push('\'');
            return;
        }
        self.out.push('"');
        for (i, line) in arg.split('\n').enumerate() {
            if i > 0 {
                self.out.push('\n');
                // Continuation lines are stripped up to the opening quote.
                if !line.is_empty() {
                    self.out.push_str(&" ".repeat(column + 1));
                }
            }
            for c in line.chars() {
                match c {
                    '"' => self.out.push_str("\\\""),
                    '\\' => self.out.push_str("\\\\"),
                    '\t' => self.out.push_str("\\t"),
                    c => self.out.push(c),
                }
            }
        }
        self.out.push('"');
    }

    // ----- YIN -----

    fn yin_stmt(
        &mut self,
        module: &SchemaModule<'_>,
        stmt: &Stmt,
        level: usize,
        namespaces: &str,
        options: SchemaPrinterFlags,
    ) {
        let arg_kind = arg_encoding(module, stmt);
        self.indent(level);
        self.out.push('<');
        self.out.push_str(&stmt.keyword);
        if let (ArgEncoding::Attribute(name), Some(arg)) = (arg_kind, &stmt.arg) {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape(arg.as_str()));
            self.out.push('"');
        }
        self.out.push_str(namespaces);

        let substmts: Vec<&Stmt> = stmt
            .substmts
            .iter()
            .filter(|sub| {
                level > 0
                    || !options.contains(SchemaPrinterFlags::NO_SUBSTMT)
                    || HEADER_KEYWORDS.contains(&sub.keyword.as_str())
            })
            .collect();
        let text = match (arg_kind, &stmt.arg) {
            (ArgEncoding::Element(name), Some(arg)) => Some((name, arg)),
            _ => None,
        };
        if substmts.is_empty() && text.is_none() {
            self.out.push_str("/>");
            self.newline();
            return;
        }
        self.out.push('>');
        self.newline();
        if let Some((name, arg)) = text {
            self.indent(level + 1);
            self.out.push_str(&format!("<{}>{}</{}>", name, escape(arg.as_str()), name));
            self.newline();
        }
        for sub in substmts {
            self.yin_stmt(module, sub, level + 1, "", options);
        }
        self.indent(level);
        self.out.push_str(&format!("</{}>", stmt.keyword));
        self.newline();
    }
}

// Argument encoding of a statement. Extension instances follow the
// definition of their extension.
#[derive(Clone, Copy)]
enum ArgEncoding<'m> {
    None,
    Attribute(&'m str),
    Element(&'m str),
}

fn arg_encoding<'m>(module: &'m SchemaModule<'_>, stmt: &Stmt) -> ArgEncoding<'m> {
    let Some(prefix) = stmt.prefix() else {
        return match yin_arg(&stmt.keyword) {
            YinArg::None => ArgEncoding::None,
            YinArg::Attribute(name) => ArgEncoding::Attribute(name),
            YinArg::Element(name) => ArgEncoding::Element(name),
        };
    };
    let context = module.context;
    let entry = &context.modules[module.id];
    let name = stmt
        .keyword
        .split_once(':')
        .map(|(_, name)| name)
        .unwrap_or(&stmt.keyword);
    let defining = if prefix == &*entry.prefix {
        Some(module.id)
    } else {
        entry
            .imports
            .iter()
            .find(|(import, _)| &**import == prefix)
            .map(|(_, id)| *id)
    };
    let extension = defining.and_then(|id| {
        context.modules[id]
            .parsed
            .extensions
            .iter()
            .find(|ext| ext.name == name)
    });
    match extension {
        Some(ext) => match &ext.argument {
            None => ArgEncoding::None,
            Some(arg) if ext.yin_element => ArgEncoding::Element(arg),
            Some(arg) => ArgEncoding::Attribute(arg),
        },
        None => ArgEncoding::Attribute("name"),
    }
}

// ===== TREE =====

struct TreePrinter<'m, 'a> {
    module: &'m SchemaModule<'a>,
    out: String,
}

// ===== impl TreePrinter =====

impl TreePrinter<'_, '_> {
    fn print(mut self) -> String {
        let context = self.module.context;
        let id = self.module.id;
        let entry = &context.modules[id];
        let store = &context.schema;
        let keyword = if entry.parsed.is_submodule {
            "submodule"
        } else {
            "module"
        };
        self.out.push_str(&format!("{}: {}\n", keyword, entry.name));

        let Some(schema) = store.modules.get(id) else {
            return self.out;
        };
        let data: Vec<usize> = store.siblings_from(schema.data).collect();
        self.siblings(&data, "  ", None);

        // Nodes of this module grafted onto other modules.
        let mut augments: Vec<(usize, Vec<usize>)> = Vec::new();
        for (node, snode) in store.nodes.iter().enumerate() {
            if snode.module != id {
                continue;
            }
            let Some(parent) = snode.links.parent else {
                continue;
            };
            if store.nodes[parent].module == id {
                continue;
            }
            match augments.iter_mut().find(|(target, _)| *target == parent) {
                Some((_, nodes)) => nodes.push(node),
                None => augments.push((parent, vec![node])),
            }
        }
        for (target, nodes) in augments {
            let path = store.schema_path(
                &context.modules,
                target,
                crate::schema::SchemaPathFormat::LOG,
            );
            self.out.push_str(&format!("\n  augment {}:\n", path));
            self.siblings(&nodes, "    ", None);
        }

        let rpcs: Vec<usize> = store.siblings_from(schema.rpcs).collect();
        if !rpcs.is_empty() {
            self.out.push_str("\n  rpcs:\n");
            self.siblings(&rpcs, "    ", None);
        }
        let notifs: Vec<usize> = store.siblings_from(schema.notifs).collect();
        if !notifs.is_empty() {
            self.out.push_str("\n  notifications:\n");
            self.siblings(&notifs, "    ", None);
        }
        self.out
    }

    fn siblings(&mut self, ids: &[usize], prefix: &str, inherited: Option<&'static str>) {
        let store = &self.module.context.schema;
        let width = ids
            .iter()
            .map(|id| self.label(*id).len())
            .max()
            .unwrap_or(0);
        for (index, id) in ids.iter().enumerate() {
            let last = index + 1 == ids.len();
            self.node(*id, prefix, width, inherited);
            let snode = &store.nodes[*id];
            let children: Vec<usize> = store
                .children(*id)
                .chain(store.siblings_from(snode.actions))
                .chain(store.siblings_from(snode.notifs))
                .collect();
            if children.is_empty() {
                continue;
            }
            let nested = format!("{}{}", prefix, if last { "   " } else { "|  " });
            let flags = match snode.kind {
                SchemaNodeKind::Input => Some("-w"),
                SchemaNodeKind::Output => Some("ro"),
                _ => inherited,
            };
            self.siblings(&children, &nested, flags);
        }
    }

    fn label(&self, id: usize) -> String {
        let context = self.module.context;
        let snode = &context.schema.nodes[id];
        let name = if snode.module == self.module.id {
            snode.name.to_string()
        } else {
            format!("{}:{}", context.modules[snode.module].prefix, snode.name)
        };
        let optional = !snode.flags.contains(SchemaFlags::MANDATORY);
        match snode.kind {
            SchemaNodeKind::Choice => format!("({}){}", name, if optional { "?" } else { "" }),
            SchemaNodeKind::Case => format!(":({})", name),
            SchemaNodeKind::Container => match &snode.payload {
                Payload::Container { presence: Some(_) } => format!("{}!", name),
                _ => name,
            },
            SchemaNodeKind::List | SchemaNodeKind::LeafList => format!("{}*", name),
            SchemaNodeKind::Leaf | SchemaNodeKind::AnyData if optional => format!("{}?", name),
            _ => name,
        }
    }

    fn node(&mut self, id: usize, prefix: &str, width: usize, inherited: Option<&'static str>) {
        let context = self.module.context;
        let snode = &context.schema.nodes[id];
        let flags = match snode.kind {
            SchemaNodeKind::Rpc | SchemaNodeKind::Action => "-x",
            SchemaNodeKind::Notification => "-n",
            SchemaNodeKind::Input => "-w",
            SchemaNodeKind::Output => "ro",
            SchemaNodeKind::Choice | SchemaNodeKind::Case if inherited.is_none() => {
                if snode.is_config() {
                    "rw"
                } else {
                    "ro"
                }
            }
            _ => match inherited {
                Some(flags) => flags,
                None if snode.is_config() => "rw",
                None => "ro",
            },
        };
        let label = self.label(id);
        let mut line = format!("{}+--{} {}", prefix, flags, label);
        match snode.kind {
            SchemaNodeKind::Input => line = format!("{}+---w input", prefix),
            SchemaNodeKind::Output => line = format!("{}+--ro output", prefix),
            SchemaNodeKind::Leaf | SchemaNodeKind::LeafList => {
                if let Some(ty) = snode.leaf_type() {
                    let type_name = match (&ty.name, &ty.path) {
                        (_, Some(path)) => format!("-> {}", path.source),
                        (Some(name), _) => match ty.module {
                            Some(module) if module != self.module.id => {
                                format!("{}:{}", context.modules[module].prefix, name)
                            }
                            _ => name.to_string(),
                        },
                        (None, None) => base_name(ty.base).to_owned(),
                    };
                    line.push_str(&" ".repeat(width.saturating_sub(label.len()) + 3));
                    line.push_str(&type_name);
                }
            }
            SchemaNodeKind::AnyData => {
                line.push_str(&" ".repeat(width.saturating_sub(label.len()) + 3));
                line.push_str(if snode.flags.contains(SchemaFlags::IS_ANYXML) {
                    "anyxml"
                } else {
                    "anydata"
                });
            }
            SchemaNodeKind::List => {
                let keys: Vec<&str> = snode
                    .list_keys()
                    .iter()
                    .map(|key| &*context.schema.nodes[*key].name)
                    .collect();
                if !keys.is_empty() {
                    line.push_str(&format!(" [{}]", keys.join(" ")));
                }
            }
            _ => {}
        }
        self.out.push_str(line.trim_end());
        self.out.push('\n');
    }
}

// ===== global functions =====

pub(crate) fn print_module(
    module: &SchemaModule<'_>,
    format: SchemaOutputFormat,
    options: SchemaPrinterFlags,
) -> Result<String> {
    let context = module.context;
    let entry = context
        .modules
        .get(module.id)
        .ok_or_else(|| Error::inval("Invalid module."))?;
    let stmt = &entry.parsed.stmt;
    let mut writer = Writer {
        out: String::new(),
        shrink: options.contains(SchemaPrinterFlags::SHRINK),
    };
    match format {
        SchemaOutputFormat::YANG => {
            writer.yang_stmt(stmt, 0, options);
        }
        SchemaOutputFormat::YIN => {
            writer.out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
            writer.newline();
            let mut namespaces = format!(" xmlns=\"{}\"", YIN_NAMESPACE);
            let own_prefix = match entry.parsed.is_submodule {
                false => Some(entry.prefix.to_string()),
                true => stmt
                    .find("belongs-to")
                    .and_then(|belongs| belongs.find_arg("prefix"))
                    .map(str::to_owned),
            };
            if let Some(prefix) = own_prefix {
                namespaces.push_str(&format!(
                    " xmlns:{}=\"{}\"",
                    prefix,
                    escape(&*entry.namespace)
                ));
            }
            for (prefix, import) in &entry.imports {
                namespaces.push_str(&format!(
                    " xmlns:{}=\"{}\"",
                    prefix,
                    escape(&*context.modules[*import].namespace)
                ));
            }
            writer.yin_stmt(module, stmt, 0, &namespaces, options);
        }
        SchemaOutputFormat::TREE => {
            let printer = TreePrinter {
                module,
                out: String::new(),
            };
            return Ok(printer.print());
        }
    }
    Ok(writer.out)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_yang_stmt;

    fn print_yang(source: &str, shrink: bool) -> String {
        let stmt = parse_yang_stmt(source).unwrap();
        let mut writer = Writer {
            out: String::new(),
            shrink,
        };
        writer.yang_stmt(&stmt, 0, SchemaPrinterFlags::empty());
        writer.out
    }

    fn strip_lines(mut stmt: Stmt) -> Stmt {
        stmt.line = 0;
        stmt.substmts = stmt.substmts.into_iter().map(strip_lines).collect();
        stmt
    }

    #[test]
    fn yang_output_parses_back() {
        let source = "module m {\n  namespace \"urn:m\";\n  prefix m;\n  \
                      description\n    \"first line\n     indented \\\"line\\\"\";\n  \
                      leaf l { type string { pattern '\\d+'; } }\n}";
        let printed = print_yang(source, false);
        assert_eq!(
            strip_lines(parse_yang_stmt(&printed).unwrap()),
            strip_lines(parse_yang_stmt(source).unwrap())
        );
        assert!(printed.contains("  prefix m;\n"));
    }

    #[test]
    fn shrink() {
        let printed = print_yang("module m { prefix m; container c; }", true);
        assert_eq!(printed, "module m{prefix m;container c;}");
    }
}
