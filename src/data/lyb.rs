//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! LYB, a compact binary encoding of data trees.
//!
//! Layout: magic, module table (name and revision of every module used),
//! then the top-level siblings. A sibling list is a sequence of node records
//! terminated by a zero byte. Integers are little-endian, strings are
//! length-prefixed UTF-8.

use crate::context::Prefixes;
use crate::data::{AnyValue, DataTree, NodeFlags, NodeValue, Opaque};
use crate::error::{Error, Result};
use crate::utils::LinkArena;

const MAGIC: &[u8; 4] = b"LYB\x01";

const TAG_END: u8 = 0;
const TAG_SCHEMA: u8 = 1;
const TAG_OPAQUE: u8 = 2;

const VALUE_INNER: u8 = 0;
const VALUE_TERM: u8 = 1;
const VALUE_ANY_STRING: u8 = 2;
const VALUE_ANY_XML: u8 = 3;
const VALUE_ANY_JSON: u8 = 4;
const VALUE_ANY_TREE: u8 = 5;

struct Writer<'t, 'a> {
    tree: &'t DataTree<'a>,
    modules: Vec<usize>,
    body: Vec<u8>,
}

struct Reader<'d> {
    data: &'d [u8],
    pos: usize,
}

// ===== impl Writer =====

impl Writer<'_, '_> {
    fn module(&mut self, module: usize) -> u16 {
        let index = match self.modules.iter().position(|m| *m == module) {
            Some(index) => index,
            None => {
                self.modules.push(module);
                self.modules.len() - 1
            }
        };
        index as u16
    }

    fn siblings(&mut self, ids: &[usize]) {
        for id in ids {
            self.node(*id);
        }
        self.body.push(TAG_END);
    }

    fn node(&mut self, id: usize) {
        let tree = self.tree;
        let dnode = &tree.nodes[id];
        match (tree.snode(id), &dnode.value) {
            (Some(snode), _) => {
                self.body.push(TAG_SCHEMA);
                let module = self.module(snode.module);
                put_u16(&mut self.body, module);
                put_str(&mut self.body, &snode.name);
            }
            (None, NodeValue::Opaque(opaque)) => {
                self.body.push(TAG_OPAQUE);
                put_str(&mut self.body, &opaque.name);
                put_str(&mut self.body, opaque.module.as_deref().unwrap_or(""));
                put_str(&mut self.body, opaque.namespace.as_deref().unwrap_or(""));
                put_str(&mut self.body, &opaque.value);
            }
            _ => return,
        }

        self.body.push(dnode.flags.bits() & NodeFlags::DEFAULT.bits());
        put_u16(&mut self.body, dnode.meta.len() as u16);
        for meta in &dnode.meta {
            let module = self.module(meta.module);
            put_u16(&mut self.body, module);
            put_str(&mut self.body, &meta.name);
            put_str(&mut self.body, &meta.value.canonical);
        }

        match &dnode.value {
            NodeValue::Term(value) => {
                self.body.push(VALUE_TERM);
                put_str(&mut self.body, &value.canonical);
            }
            NodeValue::Any(any) => match any {
                AnyValue::String(value) => {
                    self.body.push(VALUE_ANY_STRING);
                    put_str(&mut self.body, value);
                }
                AnyValue::Xml(value) => {
                    self.body.push(VALUE_ANY_XML);
                    put_str(&mut self.body, value);
                }
                AnyValue::Json(value) => {
                    self.body.push(VALUE_ANY_JSON);
                    put_str(&mut self.body, value);
                }
                AnyValue::Tree { json, xml } => {
                    self.body.push(VALUE_ANY_TREE);
                    put_str(&mut self.body, json);
                    put_str(&mut self.body, xml);
                }
            },
            NodeValue::Inner | NodeValue::Opaque(_) => {
                self.body.push(VALUE_INNER);
                let children: Vec<usize> = tree.siblings_from(dnode.links.child).collect();
                self.siblings(&children);
            }
        }
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_le_bytes());
    out.extend_from_slice(value.as_bytes());
}

// ===== impl Reader =====

impl<'d> Reader<'d> {
    fn bytes(&mut self, len: usize) -> Result<&'d [u8]> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(invalid("unexpected end of data"));
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| invalid("invalid UTF-8 string"))
    }
}

fn invalid(msg: &str) -> Error {
    Error::inval(format!("Invalid LYB data: {}.", msg))
}

struct Loader<'r, 'd, 't, 'a> {
    reader: &'r mut Reader<'d>,
    tree: &'t mut DataTree<'a>,
    modules: Vec<usize>,
}

impl Loader<'_, '_, '_, '_> {
    fn module(&self, index: u16) -> Result<usize> {
        self.modules
            .get(index as usize)
            .copied()
            .ok_or_else(|| invalid("unknown module index"))
    }

    fn siblings(&mut self, parent: Option<usize>) -> Result<()> {
        loop {
            match self.reader.u8()? {
                TAG_END => return Ok(()),
                TAG_SCHEMA => self.schema_node(parent)?,
                TAG_OPAQUE => self.opaque_node(parent)?,
                _ => return Err(invalid("unknown node record")),
            }
        }
    }

    fn schema_node(&mut self, parent: Option<usize>) -> Result<()> {
        let module = self.reader.u16()?;
        let module = self.module(module)?;
        let name = self.reader.string()?;
        let parent_schema = parent.and_then(|p| self.tree.nodes[p].schema);
        let schema = self
            .tree
            .schema_child(parent_schema, module, &name, false)
            .or_else(|| self.tree.schema_child(parent_schema, module, &name, true))
            .ok_or_else(|| {
                Error::not_found(format!("Schema node \"{}\" of LYB data not found.", name))
            })?;
        let (flags, meta) = self.header()?;
        let value = match self.reader.u8()? {
            VALUE_TERM => {
                let text = self.reader.string()?;
                NodeValue::Term(self.tree.store_term(schema, &text, Prefixes::Json)?)
            }
            VALUE_INNER => NodeValue::Inner,
            kind => NodeValue::Any(self.any(kind)?),
        };
        let inner = matches!(value, NodeValue::Inner);
        let id = self.tree.alloc(Some(schema), value);
        self.tree.nodes[id].flags = flags;
        self.tree.nodes[id].meta = meta;
        self.tree.link_child(parent, id);
        if inner {
            self.siblings(Some(id))?;
            self.tree.finish_node(id)?;
        } else {
            self.tree.rehash(id);
        }
        Ok(())
    }

    fn opaque_node(&mut self, parent: Option<usize>) -> Result<()> {
        let name = self.reader.string()?;
        let module = self.reader.string()?;
        let namespace = self.reader.string()?;
        let value = self.reader.string()?;
        let (flags, meta) = self.header()?;
        if self.reader.u8()? != VALUE_INNER {
            return Err(invalid("opaque node with a value record"));
        }
        let opaque = Opaque {
            name,
            module: (!module.is_empty()).then_some(module),
            namespace: (!namespace.is_empty()).then_some(namespace),
            value,
        };
        let id = self.tree.alloc(None, NodeValue::Opaque(opaque));
        self.tree.nodes[id].flags = flags;
        self.tree.nodes[id].meta = meta;
        self.tree.link_child(parent, id);
        self.siblings(Some(id))?;
        self.tree.rehash(id);
        Ok(())
    }

    fn header(&mut self) -> Result<(NodeFlags, Vec<crate::data::Meta>)> {
        let flags = NodeFlags::from_bits_truncate(self.reader.u8()?) & NodeFlags::DEFAULT;
        let count = self.reader.u16()?;
        let mut meta = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let module = self.reader.u16()?;
            let module = self.module(module)?;
            let name = self.reader.string()?;
            let value = self.reader.string()?;
            meta.push(self.tree.store_meta(module, &name, &value, Prefixes::Json)?);
        }
        Ok((flags, meta))
    }

    fn any(&mut self, kind: u8) -> Result<AnyValue> {
        Ok(match kind {
            VALUE_ANY_STRING => AnyValue::String(self.reader.string()?),
            VALUE_ANY_XML => AnyValue::Xml(self.reader.string()?),
            VALUE_ANY_JSON => AnyValue::Json(self.reader.string()?),
            VALUE_ANY_TREE => {
                let json = self.reader.string()?;
                let xml = self.reader.string()?;
                AnyValue::Tree { json, xml }
            }
            _ => return Err(invalid("unknown value record")),
        })
    }
}

// ===== global functions =====

/// Prints the given sibling nodes in the LYB format.
pub(crate) fn print(tree: &DataTree<'_>, roots: &[usize]) -> Vec<u8> {
    let mut writer = Writer {
        tree,
        modules: Vec::new(),
        body: Vec::new(),
    };
    writer.siblings(roots);

    let mut out = Vec::with_capacity(writer.body.len() + 64);
    out.extend_from_slice(MAGIC);
    put_u16(&mut out, writer.modules.len() as u16);
    for module in &writer.modules {
        let module = &tree.context.modules[*module];
        put_str(&mut out, &module.name);
        put_str(&mut out, module.revision.as_deref().unwrap_or(""));
    }
    out.extend_from_slice(&writer.body);
    out
}

/// Parses LYB data into the (empty) tree.
pub(crate) fn parse(tree: &mut DataTree<'_>, data: &[u8]) -> Result<()> {
    let mut reader = Reader { data, pos: 0 };
    if reader.bytes(MAGIC.len())? != MAGIC {
        return Err(invalid("bad magic number"));
    }
    let count = reader.u16()?;
    let mut modules = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = reader.string()?;
        let revision = reader.string()?;
        let module = tree
            .context
            .modules
            .iter()
            .position(|m| {
                *m.name == *name
                    && m.implemented
                    && m.revision.as_deref().unwrap_or("") == revision
            })
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Module \"{}\" of LYB data is not implemented in the context.",
                    name
                ))
            })?;
        modules.push(module);
    }
    let mut loader = Loader {
        reader: &mut reader,
        tree,
        modules,
    };
    loader.siblings(None)?;
    if loader.reader.pos != data.len() {
        return Err(invalid("trailing data"));
    }
    Ok(())
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() {
        let mut out = Vec::new();
        put_u16(&mut out, 0x0102);
        put_str(&mut out, "abc");
        let mut reader = Reader { data: &out, pos: 0 };
        assert_eq!(reader.u16().unwrap(), 0x0102);
        assert_eq!(reader.string().unwrap(), "abc");
        assert!(reader.u8().is_err());
    }
}
