//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! XPath evaluation over data trees and the compiled schema.

use std::cell::OnceCell;

use crate::context::{resolve_prefix, Context, Prefixes};
use crate::data::{DataTree, NodeValue};
use crate::error::{Error, ErrorCode, Result, ValidationErrorCode};
use crate::schema::types::{store_value, CompiledType, Encoding, ValueEnv};
use crate::schema::{DataValueType, SNode};
use crate::utils::LinkArena;
use crate::xpath::{
    Axis, BinOp, Expr, LocationPath, NodeTest, PrefixFormat, QName, Step,
};

/// Node of the XPath data model.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Item {
    /// Document root, parent of the top-level nodes.
    Root,
    Node(usize),
    /// Metadata of a node, by index.
    Meta(usize, usize),
}

/// Intermediate evaluation result.
#[derive(Clone, Debug)]
pub(crate) enum Val {
    Set(Vec<Item>),
    Bool(bool),
    Num(f64),
    Str(String),
}

/// How prefixes of literals (identities, typed values) are resolved.
#[derive(Clone, Debug)]
pub(crate) enum PrefixMode {
    Schema,
    Json,
    Xml(Vec<(String, String)>),
}

/// Evaluator of one expression over a data tree.
pub(crate) struct DataEval<'t, 'a> {
    tree: &'t DataTree<'a>,
    current: Item,
    /// Module of the expression (unprefixed literals, `Schema` prefixes).
    module: usize,
    mode: PrefixMode,
    order: OnceCell<Vec<u32>>,
}

#[derive(Clone, Copy)]
struct Ctx {
    node: Item,
    pos: usize,
    size: usize,
}

// ===== impl Val =====

impl Val {
    fn into_set(self) -> Result<Vec<Item>> {
        match self {
            Val::Set(items) => Ok(items),
            _ => Err(xpath_error("expression does not evaluate to a node-set")),
        }
    }
}

// ===== impl DataEval =====

impl<'t, 'a> DataEval<'t, 'a> {
    pub(crate) fn new(
        tree: &'t DataTree<'a>,
        current: Item,
        module: usize,
        mode: PrefixMode,
    ) -> DataEval<'t, 'a> {
        DataEval {
            tree,
            current,
            module,
            mode,
            order: OnceCell::new(),
        }
    }

    fn context(&self) -> &'a Context {
        self.tree.context
    }

    /// Evaluates `expr` with `node` as the context node.
    pub(crate) fn eval(&self, expr: &Expr, node: Item) -> Result<Val> {
        self.expr(
            expr,
            Ctx {
                node,
                pos: 1,
                size: 1,
            },
        )
    }

    pub(crate) fn eval_bool(&self, expr: &Expr, node: Item) -> Result<bool> {
        let value = self.eval(expr, node)?;
        Ok(self.boolean(&value))
    }

    fn expr(&self, expr: &Expr, ctx: Ctx) -> Result<Val> {
        match expr {
            Expr::Binary(BinOp::Or, left, right) => {
                let left = self.expr(left, ctx)?;
                if self.boolean(&left) {
                    return Ok(Val::Bool(true));
                }
                let right = self.expr(right, ctx)?;
                Ok(Val::Bool(self.boolean(&right)))
            }
            Expr::Binary(BinOp::And, left, right) => {
                let left = self.expr(left, ctx)?;
                if !self.boolean(&left) {
                    return Ok(Val::Bool(false));
                }
                let right = self.expr(right, ctx)?;
                Ok(Val::Bool(self.boolean(&right)))
            }
            Expr::Binary(BinOp::Union, left, right) => {
                let mut items = self.expr(left, ctx)?.into_set()?;
                items.extend(self.expr(right, ctx)?.into_set()?);
                Ok(Val::Set(self.sorted(items)))
            }
            Expr::Binary(
                op @ (BinOp::Eq
                | BinOp::Ne
                | BinOp::Lt
                | BinOp::Le
                | BinOp::Gt
                | BinOp::Ge),
                left,
                right,
            ) => {
                let left = self.expr(left, ctx)?;
                let right = self.expr(right, ctx)?;
                Ok(Val::Bool(self.compare(*op, &left, &right)))
            }
            Expr::Binary(op, left, right) => {
                let left = self.expr(left, ctx)?;
                let right = self.expr(right, ctx)?;
                let (l, r) = (self.number(&left), self.number(&right));
                let result = match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => l / r,
                    _ => l % r,
                };
                Ok(Val::Num(result))
            }
            Expr::Neg(expr) => {
                let value = self.expr(expr, ctx)?;
                Ok(Val::Num(-self.number(&value)))
            }
            Expr::Literal(value) => Ok(Val::Str(value.clone())),
            Expr::Number(value) => Ok(Val::Num(*value)),
            Expr::Function(name, args) => self.function(name, args, ctx),
            Expr::Path(path) => self.path(path, ctx).map(Val::Set),
            Expr::Filter(primary, predicates, steps) => {
                let mut items = self.expr(primary, ctx)?.into_set()?;
                for pred in predicates {
                    items = self.filter(items, pred)?;
                }
                self.steps(items, steps).map(Val::Set)
            }
        }
    }

    fn path(&self, path: &LocationPath, ctx: Ctx) -> Result<Vec<Item>> {
        let start = if path.absolute {
            vec![Item::Root]
        } else {
            vec![ctx.node]
        };
        self.steps(start, &path.steps)
    }

    fn steps(&self, mut items: Vec<Item>, steps: &[Step]) -> Result<Vec<Item>> {
        for step in steps {
            let mut next = Vec::new();
            for item in &items {
                let mut found: Vec<Item> = self
                    .axis(*item, step.axis)
                    .into_iter()
                    .filter(|candidate| self.test(*candidate, step))
                    .collect();
                for pred in &step.predicates {
                    found = self.filter(found, pred)?;
                }
                next.extend(found);
            }
            items = if items.len() > 1 || step.axis != Axis::Child {
                self.sorted(next)
            } else {
                next
            };
        }
        Ok(items)
    }

    fn filter(&self, items: Vec<Item>, pred: &Expr) -> Result<Vec<Item>> {
        let size = items.len();
        let mut out = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            let ctx = Ctx {
                node: item,
                pos: i + 1,
                size,
            };
            let keep = match self.expr(pred, ctx)? {
                Val::Num(n) => n == (i + 1) as f64,
                value => self.boolean(&value),
            };
            if keep {
                out.push(item);
            }
        }
        Ok(out)
    }

    // ----- data model -----

    fn children(&self, item: Item) -> Vec<Item> {
        let first = match item {
            Item::Root => self.tree.first,
            Item::Node(id) => self.tree.nodes[id].links.child,
            Item::Meta(..) => None,
        };
        self.tree.siblings_from(first).map(Item::Node).collect()
    }

    fn parent(&self, item: Item) -> Option<Item> {
        match item {
            Item::Root => None,
            Item::Node(id) => Some(
                self.tree.nodes[id]
                    .links
                    .parent
                    .map(Item::Node)
                    .unwrap_or(Item::Root),
            ),
            Item::Meta(id, _) => Some(Item::Node(id)),
        }
    }

    fn axis(&self, item: Item, axis: Axis) -> Vec<Item> {
        match axis {
            Axis::Child => self.children(item),
            Axis::SelfNode => vec![item],
            Axis::Parent => self.parent(item).into_iter().collect(),
            Axis::Ancestor | Axis::AncestorOrSelf => {
                let mut out = Vec::new();
                if axis == Axis::AncestorOrSelf {
                    out.push(item);
                }
                let mut parent = self.parent(item);
                while let Some(p) = parent {
                    out.push(p);
                    parent = self.parent(p);
                }
                out
            }
            Axis::Descendant | Axis::DescendantOrSelf => {
                let mut out = Vec::new();
                if axis == Axis::DescendantOrSelf {
                    out.push(item);
                }
                let mut stack = self.children(item);
                stack.reverse();
                while let Some(next) = stack.pop() {
                    out.push(next);
                    let mut children = self.children(next);
                    children.reverse();
                    stack.extend(children);
                }
                out
            }
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Item::Node(id) = item else {
                    return Vec::new();
                };
                let siblings = self.children(self.parent(item).unwrap_or(Item::Root));
                let Some(pos) = siblings.iter().position(|s| *s == Item::Node(id))
                else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    siblings[pos + 1..].to_vec()
                } else {
                    siblings[..pos].iter().rev().copied().collect()
                }
            }
            Axis::Attribute => match item {
                Item::Node(id) => (0..self.tree.nodes[id].meta.len())
                    .map(|i| Item::Meta(id, i))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    fn test(&self, item: Item, step: &Step) -> bool {
        match &step.test {
            NodeTest::Node => true,
            NodeTest::Text => false,
            NodeTest::Wildcard(qname) => {
                let principal = match item {
                    Item::Root => false,
                    Item::Node(_) => step.axis != Axis::Attribute,
                    Item::Meta(..) => step.axis == Axis::Attribute,
                };
                principal
                    && qname
                        .as_ref()
                        .and_then(|q| q.module)
                        .map(|module| self.item_module(item) == Some(module))
                        .unwrap_or(true)
            }
            NodeTest::Name(qname) => self.name_matches(item, qname),
        }
    }

    fn name_matches(&self, item: Item, qname: &QName) -> bool {
        let name = match item {
            Item::Root => return false,
            Item::Node(id) => match self.snode(id) {
                Some(snode) => &*snode.name,
                None => match &self.tree.nodes[id].value {
                    NodeValue::Opaque(opaque) => {
                        return qname.module.is_none() && opaque.name == qname.name
                    }
                    _ => return false,
                },
            },
            Item::Meta(id, index) => &*self.tree.nodes[id].meta[index].name,
        };
        name == qname.name
            && qname
                .module
                .map(|module| self.item_module(item) == Some(module))
                .unwrap_or(true)
    }

    fn snode(&self, id: usize) -> Option<&'a SNode> {
        self.tree.nodes[id]
            .schema
            .map(|schema| &self.context().schema.nodes[schema])
    }

    fn item_module(&self, item: Item) -> Option<usize> {
        match item {
            Item::Root => None,
            Item::Node(id) => self.snode(id).map(|snode| snode.module),
            Item::Meta(id, index) => Some(self.tree.nodes[id].meta[index].module),
        }
    }

    fn order(&self) -> &Vec<u32> {
        self.order.get_or_init(|| {
            let mut order = vec![u32::MAX; self.tree.nodes.len()];
            let mut counter = 1;
            let mut stack: Vec<usize> =
                self.tree.siblings_from(self.tree.first).collect();
            stack.reverse();
            while let Some(id) = stack.pop() {
                order[id] = counter;
                counter += 1;
                let mut children: Vec<usize> = self
                    .tree
                    .siblings_from(self.tree.nodes[id].links.child)
                    .collect();
                children.reverse();
                stack.extend(children);
            }
            order
        })
    }

    fn sort_key(&self, item: Item) -> (u32, usize) {
        match item {
            Item::Root => (0, 0),
            Item::Node(id) => (self.order()[id], 0),
            Item::Meta(id, index) => (self.order()[id], index + 1),
        }
    }

    /// Sorts items in document order and removes duplicates.
    fn sorted(&self, mut items: Vec<Item>) -> Vec<Item> {
        if items.len() < 2 {
            return items;
        }
        items.sort_by_key(|item| self.sort_key(*item));
        items.dedup();
        items
    }

    pub(crate) fn string_value(&self, item: Item) -> String {
        match item {
            Item::Root => {
                let mut out = String::new();
                for child in self.children(Item::Root) {
                    out.push_str(&self.string_value(child));
                }
                out
            }
            Item::Node(id) => match &self.tree.nodes[id].value {
                NodeValue::Term(value) => value.canonical.to_string(),
                NodeValue::Any(any) => any.to_string(),
                NodeValue::Opaque(opaque) => opaque.value.clone(),
                NodeValue::Inner => {
                    let mut out = String::new();
                    for child in self.children(item) {
                        out.push_str(&self.string_value(child));
                    }
                    out
                }
            },
            Item::Meta(id, index) => {
                self.tree.nodes[id].meta[index].value.canonical.to_string()
            }
        }
    }

    // ----- conversions -----

    fn boolean(&self, value: &Val) -> bool {
        match value {
            Val::Set(items) => !items.is_empty(),
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
        }
    }

    fn number(&self, value: &Val) -> f64 {
        match value {
            Val::Set(items) => match items.first() {
                Some(item) => str_to_number(&self.string_value(*item)),
                None => f64::NAN,
            },
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Num(n) => *n,
            Val::Str(s) => str_to_number(s),
        }
    }

    fn string(&self, value: &Val) -> String {
        match value {
            Val::Set(items) => items
                .first()
                .map(|item| self.string_value(*item))
                .unwrap_or_default(),
            Val::Bool(b) => b.to_string(),
            Val::Num(n) => number_to_string(*n),
            Val::Str(s) => s.clone(),
        }
    }

    fn prefixes(&self) -> Prefixes<'_> {
        match &self.mode {
            PrefixMode::Schema => Prefixes::Schema(self.module),
            PrefixMode::Json => Prefixes::Json,
            PrefixMode::Xml(namespaces) => Prefixes::Xml(namespaces),
        }
    }

    // ----- comparisons -----

    fn compare(&self, op: BinOp, left: &Val, right: &Val) -> bool {
        match (left, right) {
            (Val::Set(l), Val::Set(r)) => l.iter().any(|a| {
                let a = self.string_value(*a);
                r.iter().any(|b| {
                    compare_atoms(op, &Val::Str(a.clone()), &Val::Str(self.string_value(*b)))
                })
            }),
            (Val::Set(items), other) => self.compare_set(op, items, other),
            (other, Val::Set(items)) => self.compare_set(mirror(op), items, other),
            (l, r) => compare_atoms(op, l, r),
        }
    }

    fn compare_set(&self, op: BinOp, items: &[Item], other: &Val) -> bool {
        match other {
            Val::Bool(b) => compare_atoms(op, &Val::Bool(!items.is_empty()), &Val::Bool(*b)),
            Val::Num(n) => items.iter().any(|item| {
                compare_atoms(
                    op,
                    &Val::Num(str_to_number(&self.string_value(*item))),
                    &Val::Num(*n),
                )
            }),
            Val::Str(s) => items.iter().any(|item| match op {
                BinOp::Eq => self.equals_literal(*item, s),
                BinOp::Ne => !self.equals_literal(*item, s),
                _ => compare_atoms(
                    op,
                    &Val::Str(self.string_value(*item)),
                    &Val::Str(s.clone()),
                ),
            }),
            Val::Set(_) => false,
        }
    }

    // Typed nodes compare by canonical value, so that prefixed identities
    // and non-canonical literals match.
    fn equals_literal(&self, item: Item, literal: &str) -> bool {
        let text = self.string_value(item);
        if text == literal {
            return true;
        }
        let Item::Node(id) = item else {
            return false;
        };
        let (Some(snode), NodeValue::Term(value)) =
            (self.snode(id), &self.tree.nodes[id].value)
        else {
            return false;
        };
        let Some(ty) = snode.leaf_type() else {
            return false;
        };
        let env = ValueEnv {
            modules: &self.context().modules,
            store: &self.context().schema,
            prefixes: self.prefixes(),
            module: self.module,
            encoding: Encoding::Text,
        };
        store_value(ty, literal, &env)
            .map(|stored| stored.canonical == value.canonical)
            .unwrap_or(false)
    }

    // ----- functions -----

    fn arg(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<Val> {
        match args.get(index) {
            Some(arg) => self.expr(arg, ctx),
            None => Ok(Val::Set(vec![ctx.node])),
        }
    }

    fn arg_string(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<String> {
        let value = self.arg(args, index, ctx)?;
        Ok(self.string(&value))
    }

    fn arg_number(&self, args: &[Expr], index: usize, ctx: Ctx) -> Result<f64> {
        let value = self.arg(args, index, ctx)?;
        Ok(self.number(&value))
    }

    fn function(&self, name: &str, args: &[Expr], ctx: Ctx) -> Result<Val> {
        let value = match name {
            "last" => Val::Num(ctx.size as f64),
            "position" => Val::Num(ctx.pos as f64),
            "count" => Val::Num(self.arg(args, 0, ctx)?.into_set()?.len() as f64),
            "current" => Val::Set(vec![self.current]),
            "name" | "local-name" | "namespace-uri" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                let Some(item) = items.first().copied() else {
                    return Ok(Val::Str(String::new()));
                };
                Val::Str(self.item_name(item, name))
            }
            "string" => Val::Str(self.arg_string(args, 0, ctx)?),
            "concat" => {
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&self.arg_string(args, i, ctx)?);
                }
                Val::Str(out)
            }
            "starts-with" => {
                let s = self.arg_string(args, 0, ctx)?;
                Val::Bool(s.starts_with(&self.arg_string(args, 1, ctx)?))
            }
            "contains" => {
                let s = self.arg_string(args, 0, ctx)?;
                Val::Bool(s.contains(&self.arg_string(args, 1, ctx)?))
            }
            "substring-before" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                Val::Str(s.split_once(&pat).map(|(b, _)| b.to_owned()).unwrap_or_default())
            }
            "substring-after" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pat = self.arg_string(args, 1, ctx)?;
                Val::Str(s.split_once(&pat).map(|(_, a)| a.to_owned()).unwrap_or_default())
            }
            "substring" => {
                let s = self.arg_string(args, 0, ctx)?;
                let start = xpath_round(self.arg_number(args, 1, ctx)?);
                let end = match args.get(2) {
                    Some(_) => start + xpath_round(self.arg_number(args, 2, ctx)?),
                    None => f64::INFINITY,
                };
                Val::Str(
                    s.chars()
                        .enumerate()
                        .filter(|(i, _)| {
                            let p = (*i + 1) as f64;
                            p >= start && p < end
                        })
                        .map(|(_, c)| c)
                        .collect(),
                )
            }
            "string-length" => {
                Val::Num(self.arg_string(args, 0, ctx)?.chars().count() as f64)
            }
            "normalize-space" => Val::Str(
                self.arg_string(args, 0, ctx)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "translate" => {
                let s = self.arg_string(args, 0, ctx)?;
                let from: Vec<char> = self.arg_string(args, 1, ctx)?.chars().collect();
                let to: Vec<char> = self.arg_string(args, 2, ctx)?.chars().collect();
                Val::Str(
                    s.chars()
                        .filter_map(|c| match from.iter().position(|f| *f == c) {
                            Some(i) => to.get(i).copied(),
                            None => Some(c),
                        })
                        .collect(),
                )
            }
            "boolean" => {
                let value = self.arg(args, 0, ctx)?;
                Val::Bool(self.boolean(&value))
            }
            "not" => {
                let value = self.arg(args, 0, ctx)?;
                Val::Bool(!self.boolean(&value))
            }
            "true" => Val::Bool(true),
            "false" | "lang" => Val::Bool(false),
            "number" => Val::Num(self.arg_number(args, 0, ctx)?),
            "sum" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                Val::Num(
                    items
                        .iter()
                        .map(|item| str_to_number(&self.string_value(*item)))
                        .sum(),
                )
            }
            "floor" => Val::Num(self.arg_number(args, 0, ctx)?.floor()),
            "ceiling" => Val::Num(self.arg_number(args, 0, ctx)?.ceil()),
            "round" => Val::Num(xpath_round(self.arg_number(args, 0, ctx)?)),
            "re-match" => {
                let s = self.arg_string(args, 0, ctx)?;
                let pattern = self.arg_string(args, 1, ctx)?;
                let matcher = self
                    .context()
                    .plugins
                    .matcher()
                    .compile(&pattern)
                    .map_err(xpath_error)?;
                Val::Bool(matcher.is_match(&s))
            }
            "deref" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                match items.first() {
                    Some(Item::Node(id)) => Val::Set(self.deref(*id)?),
                    _ => Val::Set(Vec::new()),
                }
            }
            "derived-from" | "derived-from-or-self" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                let base = self.identity(&self.arg_string(args, 1, ctx)?)?;
                let or_self = name == "derived-from-or-self";
                let store = &self.context().schema;
                Val::Bool(items.iter().any(|item| {
                    match self.term_value(*item).and_then(|(_, v)| v.ident) {
                        Some(ident) => {
                            (or_self && ident == base)
                                || store.identity_derived_from(ident, base)
                        }
                        None => false,
                    }
                }))
            }
            "enum-value" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                let number = items
                    .first()
                    .and_then(|item| self.term_value(*item))
                    .filter(|(_, value)| value.base == DataValueType::Enum)
                    .and_then(|(ty, value)| {
                        value_type(ty, value)
                            .enums
                            .iter()
                            .find(|item| item.name == value.canonical)
                            .map(|item| item.value as f64)
                    })
                    .unwrap_or(f64::NAN);
                Val::Num(number)
            }
            "bit-is-set" => {
                let items = self.arg(args, 0, ctx)?.into_set()?;
                let bit = self.arg_string(args, 1, ctx)?;
                Val::Bool(
                    items
                        .first()
                        .and_then(|item| self.term_value(*item))
                        .filter(|(_, value)| value.base == DataValueType::Bits)
                        .map(|(_, value)| {
                            value.canonical.split_whitespace().any(|b| b == bit)
                        })
                        .unwrap_or(false),
                )
            }
            _ => {
                return Err(xpath_error(format!("unknown function \"{}\"", name)))
            }
        };
        Ok(value)
    }

    fn item_name(&self, item: Item, function: &str) -> String {
        let modules = &self.context().modules;
        let (module, local) = match item {
            Item::Root => return String::new(),
            Item::Node(id) => match self.snode(id) {
                Some(snode) => (Some(snode.module), snode.name.to_string()),
                None => match &self.tree.nodes[id].value {
                    NodeValue::Opaque(opaque) => (None, opaque.name.clone()),
                    _ => (None, String::new()),
                },
            },
            Item::Meta(id, index) => {
                let meta = &self.tree.nodes[id].meta[index];
                (Some(meta.module), meta.name.to_string())
            }
        };
        match function {
            "local-name" => local,
            "namespace-uri" => module
                .map(|m| modules[m].namespace.to_string())
                .unwrap_or_default(),
            _ => match module {
                Some(m) if m != self.module => format!("{}:{}", modules[m].name, local),
                _ => local,
            },
        }
    }

    fn term_value(
        &self,
        item: Item,
    ) -> Option<(&'a std::sync::Arc<CompiledType>, &'t crate::schema::types::Value)>
    {
        let Item::Node(id) = item else {
            return None;
        };
        let ty = self.snode(id)?.leaf_type()?;
        match &self.tree.nodes[id].value {
            NodeValue::Term(value) => Some((ty, value)),
            _ => None,
        }
    }

    fn identity(&self, text: &str) -> Result<usize> {
        let (prefix, name) = match text.split_once(':') {
            Some((prefix, name)) => (Some(prefix), name),
            None => (None, text),
        };
        let context = self.context();
        resolve_prefix(&context.modules, &self.prefixes(), prefix, self.module)
            .and_then(|module| context.schema.identity(module, name))
            .ok_or_else(|| {
                xpath_error(format!("identity \"{}\" not found", text))
            })
    }

    /// Targets of a leafref or instance-identifier node.
    pub(crate) fn deref(&self, id: usize) -> Result<Vec<Item>> {
        let Some((ty, value)) = self.term_value(Item::Node(id)) else {
            return Ok(Vec::new());
        };
        let ty = match &value.member {
            Some(member) if ty.base == DataValueType::Union => member,
            _ => ty,
        };
        match ty.base {
            DataValueType::LeafRef => {
                let Some(path) = &ty.path else {
                    return Ok(Vec::new());
                };
                let eval = DataEval::new(
                    self.tree,
                    Item::Node(id),
                    path.module,
                    PrefixMode::Schema,
                );
                let targets = eval.eval(&path.expr, Item::Node(id))?.into_set()?;
                Ok(targets
                    .into_iter()
                    .filter(|target| match target {
                        Item::Node(t) => matches!(
                            &self.tree.nodes[*t].value,
                            NodeValue::Term(v) if v.canonical == value.canonical
                        ),
                        _ => false,
                    })
                    .collect())
            }
            DataValueType::InstanceId => Ok(self
                .tree
                .resolve_instance(&value.canonical)
                .map(Item::Node)
                .into_iter()
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

// ===== helper functions =====

fn xpath_error(msg: impl std::fmt::Display) -> Error {
    Error::valid(ValidationErrorCode::Xpath, format!("XPath evaluation failed: {}.", msg))
}

// Type that accepted the value: the union member or the leafref target.
fn value_type<'v>(
    ty: &'v std::sync::Arc<CompiledType>,
    value: &'v crate::schema::types::Value,
) -> &'v CompiledType {
    let ty = value.member.as_ref().unwrap_or(ty);
    match ty.base {
        DataValueType::LeafRef => ty.realtype.get().map(|t| &**t).unwrap_or(ty),
        _ => ty,
    }
}

fn mirror(op: BinOp) -> BinOp {
    match op {
        BinOp::Lt => BinOp::Gt,
        BinOp::Le => BinOp::Ge,
        BinOp::Gt => BinOp::Lt,
        BinOp::Ge => BinOp::Le,
        op => op,
    }
}

fn compare_atoms(op: BinOp, left: &Val, right: &Val) -> bool {
    let as_number = |value: &Val| match value {
        Val::Num(n) => *n,
        Val::Bool(true) => 1.0,
        Val::Bool(false) => 0.0,
        Val::Str(s) => str_to_number(s),
        Val::Set(_) => f64::NAN,
    };
    match op {
        BinOp::Eq | BinOp::Ne => {
            let equal = match (left, right) {
                (Val::Bool(_), _) | (_, Val::Bool(_)) => {
                    atom_bool(left) == atom_bool(right)
                }
                (Val::Num(_), _) | (_, Val::Num(_)) => {
                    as_number(left) == as_number(right)
                }
                (Val::Str(l), Val::Str(r)) => l == r,
                _ => false,
            };
            if op == BinOp::Eq {
                equal
            } else {
                !equal
            }
        }
        _ => {
            let (l, r) = (as_number(left), as_number(right));
            match op {
                BinOp::Lt => l < r,
                BinOp::Le => l <= r,
                BinOp::Gt => l > r,
                _ => l >= r,
            }
        }
    }
}

fn atom_bool(value: &Val) -> bool {
    match value {
        Val::Bool(b) => *b,
        Val::Num(n) => *n != 0.0 && !n.is_nan(),
        Val::Str(s) => !s.is_empty(),
        Val::Set(items) => !items.is_empty(),
    }
}

pub(crate) fn str_to_number(text: &str) -> f64 {
    let text = text.trim();
    let digits = text.strip_prefix('-').unwrap_or(text);
    let valid = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits != ".";
    if valid {
        text.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub(crate) fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        format!("{}", n)
    }
}

fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        n
    } else {
        (n + 0.5).floor()
    }
}

// Unprefixed JSON names take the module of the previous step.
fn inherit_modules(expr: &mut Expr) {
    match expr {
        Expr::Binary(_, left, right) => {
            inherit_modules(left);
            inherit_modules(right);
        }
        Expr::Neg(expr) => inherit_modules(expr),
        Expr::Literal(_) | Expr::Number(_) => (),
        Expr::Function(_, args) => args.iter_mut().for_each(inherit_modules),
        Expr::Path(path) => inherit_steps(&mut path.steps),
        Expr::Filter(primary, predicates, steps) => {
            inherit_modules(primary);
            predicates.iter_mut().for_each(inherit_modules);
            inherit_steps(steps);
        }
    }
}

fn inherit_steps(steps: &mut [Step]) {
    let mut last: Option<usize> = None;
    for step in steps {
        if let NodeTest::Name(qname) = &mut step.test {
            match qname.module {
                Some(module) => last = Some(module),
                None => qname.module = last,
            }
        }
        step.predicates.iter_mut().for_each(inherit_modules);
    }
}

/// Parses `source` and binds its prefixes according to `format`. Returns
/// the expression with its default module and the literal prefix mode.
pub(crate) fn compile_expr(
    context: &Context,
    source: &str,
    format: PrefixFormat<'_>,
) -> Result<(Expr, Option<usize>, PrefixMode)> {
    let mut expr = Expr::parse(source)?;
    let modules = &context.modules;
    let bind_error = |msg: String| {
        Error::valid(
            ValidationErrorCode::Xpath,
            format!("Invalid XPath expression \"{}\": {}", source, msg),
        )
    };
    match format {
        PrefixFormat::Schema(name) => {
            let module = context.module_by_name(name).ok_or_else(|| {
                Error::not_found(format!("Module \"{}\" not found.", name))
            })?;
            expr.resolve_prefixes(Some(module), &mut |prefix: &str| {
                modules[module].module_by_prefix(module, prefix)
            })
            .map_err(bind_error)?;
            Ok((expr, Some(module), PrefixMode::Schema))
        }
        PrefixFormat::Json => {
            expr.resolve_prefixes(None, &mut |prefix: &str| {
                context.module_by_name(prefix)
            })
            .map_err(bind_error)?;
            inherit_modules(&mut expr);
            Ok((expr, None, PrefixMode::Json))
        }
        PrefixFormat::Xml(namespaces) => {
            let owned: Vec<(String, String)> = namespaces
                .iter()
                .map(|(p, ns)| (p.to_string(), ns.to_string()))
                .collect();
            let default = owned
                .iter()
                .find(|(p, _)| p.is_empty())
                .and_then(|(_, ns)| context.module_by_ns(ns));
            expr.resolve_prefixes(default, &mut |prefix: &str| {
                owned
                    .iter()
                    .find(|(p, _)| p == prefix)
                    .and_then(|(_, ns)| context.module_by_ns(ns))
            })
            .map_err(bind_error)?;
            Ok((expr, default, PrefixMode::Xml(owned)))
        }
    }
}

/// Evaluates an expression on the schema. Predicates are not evaluated and
/// only location paths and their unions are accepted.
pub(crate) fn schema_xpath(
    context: &Context,
    start: Option<usize>,
    source: &str,
) -> Result<Vec<usize>> {
    let (expr, _, _) = compile_expr(context, source, PrefixFormat::Json)?;
    let mut found = schema_expr(context, start, &expr)?;
    let store = &context.schema;
    found.sort_by_key(|id| store.nodes[*id].order);
    found.dedup();
    Ok(found)
}

fn schema_expr(
    context: &Context,
    start: Option<usize>,
    expr: &Expr,
) -> Result<Vec<usize>> {
    match expr {
        Expr::Binary(BinOp::Union, left, right) => {
            let mut found = schema_expr(context, start, left)?;
            found.extend(schema_expr(context, start, right)?);
            Ok(found)
        }
        Expr::Path(path) => {
            let store = &context.schema;
            let mut items: Vec<Option<usize>> =
                vec![if path.absolute { None } else { start }];
            for step in &path.steps {
                let mut next: Vec<Option<usize>> = Vec::new();
                for item in &items {
                    let candidates: Vec<Option<usize>> = match step.axis {
                        Axis::Child => store
                            .data_children(*item, None)
                            .into_iter()
                            .map(Some)
                            .collect(),
                        Axis::SelfNode => vec![*item],
                        Axis::Parent => match item {
                            Some(id) => vec![store.data_parent(*id)],
                            None => Vec::new(),
                        },
                        Axis::Descendant | Axis::DescendantOrSelf => {
                            let mut out = Vec::new();
                            if step.axis == Axis::DescendantOrSelf {
                                out.push(*item);
                            }
                            let mut stack = store.data_children(*item, None);
                            while let Some(id) = stack.pop() {
                                out.push(Some(id));
                                stack.extend(store.data_children(Some(id), None));
                            }
                            out
                        }
                        Axis::Ancestor | Axis::AncestorOrSelf => {
                            let mut out = Vec::new();
                            if step.axis == Axis::AncestorOrSelf {
                                out.push(*item);
                            }
                            let mut parent = item.and_then(|id| store.data_parent(id));
                            while let Some(p) = parent {
                                out.push(Some(p));
                                parent = store.data_parent(p);
                            }
                            out
                        }
                        _ => Vec::new(),
                    };
                    for candidate in candidates {
                        let matches = match (&step.test, candidate) {
                            (NodeTest::Node, _) => true,
                            (_, None) => false,
                            (NodeTest::Text, _) => false,
                            (NodeTest::Wildcard(qname), Some(id)) => qname
                                .as_ref()
                                .and_then(|q| q.module)
                                .map(|m| store.nodes[id].module == m)
                                .unwrap_or(true),
                            (NodeTest::Name(qname), Some(id)) => {
                                let snode = &store.nodes[id];
                                *snode.name == qname.name
                                    && qname
                                        .module
                                        .map(|m| snode.module == m)
                                        .unwrap_or(true)
                            }
                        };
                        if matches && !next.contains(&candidate) {
                            next.push(candidate);
                        }
                    }
                }
                items = next;
            }
            Ok(items.into_iter().flatten().collect())
        }
        _ => Err(Error::new(
            ErrorCode::Inval,
            "Schema XPath must be a location path.",
        )),
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_conversions() {
        assert_eq!(str_to_number(" 42 "), 42.0);
        assert_eq!(str_to_number("-1.5"), -1.5);
        assert!(str_to_number("inf").is_nan());
        assert!(str_to_number("1e3").is_nan());
        assert!(str_to_number(".").is_nan());
        assert_eq!(number_to_string(3.0), "3");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(xpath_round(2.5), 3.0);
        assert_eq!(xpath_round(-2.5), -2.0);
    }

    #[test]
    fn atom_comparisons() {
        let one = Val::Num(1.0);
        assert!(compare_atoms(BinOp::Eq, &one, &Val::Str("1".to_owned())));
        assert!(compare_atoms(BinOp::Eq, &Val::Bool(true), &Val::Str("x".to_owned())));
        assert!(compare_atoms(BinOp::Lt, &one, &Val::Num(2.0)));
        assert!(!compare_atoms(BinOp::Lt, &one, &Val::Num(f64::NAN)));
        assert_eq!(mirror(BinOp::Lt), BinOp::Gt);
    }

    #[test]
    fn json_names_inherit_modules() {
        let mut expr = Expr::parse("/a:x/y[z = 1]/b:w/v").unwrap();
        expr.resolve_prefixes(None, &mut |prefix: &str| match prefix {
            "a" => Some(1),
            "b" => Some(2),
            _ => None,
        })
        .unwrap();
        inherit_modules(&mut expr);
        let mut modules = Vec::new();
        expr.for_each_step(&mut |step: &Step| {
            if let NodeTest::Name(qname) = &step.test {
                modules.push((qname.name.clone(), qname.module));
            }
        });
        assert_eq!(
            modules,
            vec![
                ("x".to_owned(), Some(1)),
                ("y".to_owned(), Some(1)),
                ("z".to_owned(), None),
                ("w".to_owned(), Some(2)),
                ("v".to_owned(), Some(2)),
            ]
        );
    }
}
