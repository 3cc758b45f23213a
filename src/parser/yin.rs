//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YIN (XML) reader producing generic statements.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result, ValidationErrorCode};
use crate::parser::Stmt;

pub(crate) const YIN_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:yin:1";

/// How the argument of a YIN statement is encoded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum YinArg {
    None,
    Attribute(&'static str),
    Element(&'static str),
}

// Element under construction along with its namespace declarations.
struct Frame {
    stmt: Stmt,
    namespaces: Vec<(String, String)>,
    text_arg: Option<&'static str>,
    in_text: bool,
}

// ===== global functions =====

/// Returns the argument encoding of a YANG keyword.
pub(crate) fn yin_arg(keyword: &str) -> YinArg {
    match keyword {
        "input" | "output" => YinArg::None,
        "contact" | "description" | "organization" | "reference" => {
            YinArg::Element("text")
        }
        "error-message" => YinArg::Element("value"),
        "augment" | "deviation" => YinArg::Attribute("target"),
        "belongs-to" | "import" | "include" => YinArg::Attribute("module"),
        "must" | "when" => YinArg::Attribute("condition"),
        "namespace" => YinArg::Attribute("uri"),
        "revision" | "revision-date" => YinArg::Attribute("date"),
        "refine" => YinArg::Attribute("target-node"),
        "unique" => YinArg::Attribute("tag"),
        "config" | "default" | "deviate" | "error-app-tag"
        | "fraction-digits" | "key" | "length" | "mandatory"
        | "max-elements" | "min-elements" | "modifier" | "ordered-by"
        | "path" | "pattern" | "position" | "prefix" | "presence" | "range"
        | "require-instance" | "status" | "value" | "yang-version"
        | "yin-element" => YinArg::Attribute("value"),
        _ => YinArg::Attribute("name"),
    }
}

fn error(source: &str, position: usize, msg: impl Into<String>) -> Error {
    let end = position.min(source.len());
    let line = source.as_bytes()[..end]
        .iter()
        .filter(|b| **b == b'\n')
        .count() as u64
        + 1;
    Error::valid(ValidationErrorCode::SyntaxYin, msg).with_line(line)
}

fn resolve_ns<'f>(frames: &'f [Frame], prefix: Option<&str>) -> Option<&'f str> {
    let prefix = prefix.unwrap_or("");
    frames.iter().rev().find_map(|frame| {
        frame
            .namespaces
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, ns)| ns.as_str())
    })
}

fn start_frame(
    source: &str,
    position: usize,
    frames: &[Frame],
    element: &BytesStart<'_>,
) -> Result<Frame> {
    let qname = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let (prefix, local) = match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix.to_owned()), local.to_owned()),
        None => (None, qname.clone()),
    };

    let mut namespaces = Vec::new();
    let mut attributes = Vec::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| error(source, position, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| error(source, position, e.to_string()))?
            .into_owned();
        if key == "xmlns" {
            namespaces.push((String::new(), value));
        } else if let Some(ns_prefix) = key.strip_prefix("xmlns:") {
            namespaces.push((ns_prefix.to_owned(), value));
        } else {
            attributes.push((key, value));
        }
    }

    let lookup_ns = |prefix: Option<&str>| -> Option<String> {
        let p = prefix.unwrap_or("");
        namespaces
            .iter()
            .find(|(np, _)| np == p)
            .map(|(_, ns)| ns.clone())
            .or_else(|| resolve_ns(frames, prefix).map(str::to_owned))
    };
    let namespace = lookup_ns(prefix.as_deref());
    let line = error(source, position, "").line;

    let mut stmt = Stmt {
        keyword: local.clone(),
        arg: None,
        line,
        substmts: Vec::new(),
    };
    let mut text_arg = None;
    if namespace.as_deref() == Some(YIN_NAMESPACE) {
        match yin_arg(&local) {
            YinArg::None => {}
            YinArg::Attribute(name) => {
                stmt.arg = attributes
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.clone());
            }
            YinArg::Element(name) => text_arg = Some(name),
        }
    } else {
        // Extension instance, its argument is the first attribute.
        let prefix = prefix.ok_or_else(|| {
            error(
                source,
                position,
                format!("Element \"{}\" is not in the YIN namespace.", local),
            )
        })?;
        stmt.keyword = format!("{}:{}", prefix, local);
        stmt.arg = attributes.first().map(|(_, value)| value.clone());
    }

    Ok(Frame {
        stmt,
        namespaces,
        text_arg,
        in_text: false,
    })
}

/// Reads a YIN document into a statement tree.
pub(crate) fn parse_yin_stmt(source: &str) -> Result<Stmt> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut frames: Vec<Frame> = Vec::new();
    let mut root: Option<Stmt> = None;
    loop {
        let position = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| error(source, position, e.to_string()))?;
        match event {
            Event::Start(element) => {
                // The text child of a text-argument statement.
                if let Some(parent) = frames.last_mut() {
                    let local = element.local_name();
                    if parent.text_arg.map(|t| t.as_bytes())
                        == Some(local.as_ref())
                    {
                        parent.in_text = true;
                        continue;
                    }
                }
                let frame = start_frame(source, position, &frames, &element)?;
                frames.push(frame);
            }
            Event::Empty(element) => {
                let frame = start_frame(source, position, &frames, &element)?;
                match frames.last_mut() {
                    Some(parent) => parent.stmt.substmts.push(frame.stmt),
                    None => root = Some(frame.stmt),
                }
            }
            Event::Text(text) => {
                if let Some(frame) = frames.last_mut() {
                    if frame.in_text {
                        let text = text
                            .unescape()
                            .map_err(|e| error(source, position, e.to_string()))?;
                        frame.stmt.arg = Some(text.into_owned());
                    }
                }
            }
            Event::CData(data) => {
                if let Some(frame) = frames.last_mut() {
                    if frame.in_text {
                        frame.stmt.arg = Some(
                            String::from_utf8_lossy(&data.into_inner())
                                .into_owned(),
                        );
                    }
                }
            }
            Event::End(_) => {
                if let Some(frame) = frames.last_mut() {
                    if frame.in_text {
                        frame.in_text = false;
                        if frame.stmt.arg.is_none() {
                            frame.stmt.arg = Some(String::new());
                        }
                        continue;
                    }
                }
                let frame = frames.pop().ok_or_else(|| {
                    error(source, position, "Unbalanced closing element.")
                })?;
                match frames.last_mut() {
                    Some(parent) => parent.stmt.substmts.push(frame.stmt),
                    None => root = Some(frame.stmt),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !frames.is_empty() {
        return Err(error(source, source.len(), "Unexpected end of document."));
    }
    root.ok_or_else(|| error(source, 0, "Empty YIN document."))
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_statements() {
        let stmt = parse_yin_stmt(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<module name="m" xmlns="urn:ietf:params:xml:ns:yang:yin:1" xmlns:m="urn:m">
  <namespace uri="urn:m"/>
  <prefix value="m"/>
  <description>
    <text>Some &lt;text&gt;</text>
  </description>
  <leaf name="l">
    <type name="string"/>
    <m:tag m:arg="x"/>
  </leaf>
</module>"#,
        )
        .unwrap();
        assert_eq!(stmt.keyword, "module");
        assert_eq!(stmt.arg.as_deref(), Some("m"));
        assert_eq!(stmt.find_arg("namespace"), Some("urn:m"));
        assert_eq!(stmt.find_arg("description"), Some("Some <text>"));
        let leaf = stmt.find("leaf").unwrap();
        assert_eq!(leaf.substmts[1].keyword, "m:tag");
        assert_eq!(leaf.substmts[1].arg.as_deref(), Some("x"));
    }
}
