//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema compilation.
//!
//! Turns the parsed modules of a context into the compiled [`SchemaStore`]:
//! groupings are instantiated, typedefs resolved, augments and deviations
//! applied, leafref targets bound and default values stored. Each
//! compilation starts from scratch, a module that fails to compile is left
//! out of the compiled schema.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::context::{Context, ContextFlags, ModuleEntry, Prefixes};
use crate::dict::Dictionary;
use crate::error::{Error, Result, ValidationErrorCode};
use crate::path::{parse_schema_nodeid, NodeIdSegment};
use crate::plugins::PluginRegistry;
use crate::schema::parsed::{
    build_type, DeviateKind, ExtensionInstance, ParsedAugment,
    ParsedDeviate, ParsedDeviation, ParsedGrouping, ParsedModule, ParsedMust,
    ParsedNode, ParsedNodeKind, ParsedRefine, ParsedType, ParsedTypedef,
    ParsedWhen, Status,
};
use crate::schema::types::{
    builtin_base, is_integer, parse_restriction, store_value, BitItem,
    CompiledType, Encoding, EnumItem, LeafrefPath, Pattern, Restriction,
    Value, ValueEnv,
};
use crate::schema::{
    Annotation, DataValueType, Identity, ModuleSchema, Must, Payload, SNode,
    SchemaFlags, SchemaNodeKind, SchemaStore, When,
};
use crate::utils::{link_append, link_before, link_remove, LinkArena};
use crate::xpath::{Axis, Expr, NodeTest};

const FEATURE_DEPTH_MAX: usize = 16;

/// Flags inherited by the whole subtree of a node.
const SUBTREE_FLAGS: SchemaFlags = SchemaFlags::IN_INPUT
    .union(SchemaFlags::IN_OUTPUT)
    .union(SchemaFlags::IN_NOTIF)
    .union(SchemaFlags::DISABLED);

/// Definitions visible at one nesting level.
#[derive(Clone, Copy)]
struct Frame<'c> {
    typedefs: &'c [ParsedTypedef],
    groupings: &'c [ParsedGrouping],
}

/// Lexical scope of a statement.
#[derive(Clone)]
struct Scope<'c> {
    frames: Vec<Frame<'c>>,
    /// Module resolving prefixes (the defining module).
    module: usize,
}

/// Properties a node gets from its parent.
#[derive(Clone, Copy)]
struct Inherit {
    /// Namespace module of the new nodes.
    ns: usize,
    /// Config of the parent, `None` inside operations and notifications.
    config: Option<bool>,
    status: Status,
    flags: SchemaFlags,
}

/// Parsed `if-feature` expression.
#[derive(Debug)]
enum FeatureExpr {
    Feature(String),
    Not(Box<FeatureExpr>),
    And(Box<FeatureExpr>, Box<FeatureExpr>),
    Or(Box<FeatureExpr>, Box<FeatureExpr>),
}

struct FeatureParser<'e> {
    source: &'e str,
    tokens: Vec<&'e str>,
    pos: usize,
}

/// Annotation type collected before compilation.
struct AnnotationDef {
    module: usize,
    name: String,
    ty: ParsedType,
}

struct Compiler<'c> {
    modules: &'c [ModuleEntry],
    plugins: &'c PluginRegistry,
    dict: &'c Dictionary,
    keep_disabled: bool,
    store: SchemaStore,
    failed: Vec<bool>,
    typedefs: HashMap<*const ParsedTypedef, Arc<CompiledType>>,
    typedef_stack: Vec<*const ParsedTypedef>,
    grouping_stack: Vec<*const ParsedGrouping>,
    exprs: HashMap<(*const String, usize, usize), Arc<Expr>>,
    errors: Vec<Error>,
}

// ===== impl Scope =====

impl<'c> Scope<'c> {
    fn top(modules: &'c [ModuleEntry], module: usize) -> Scope<'c> {
        let parsed: &'c ParsedModule = &modules[module].parsed;
        Scope {
            frames: vec![Frame {
                typedefs: &parsed.typedefs,
                groupings: &parsed.groupings,
            }],
            module,
        }
    }

    fn nested(
        &self,
        typedefs: &'c [ParsedTypedef],
        groupings: &'c [ParsedGrouping],
    ) -> Scope<'c> {
        let mut scope = self.clone();
        if !typedefs.is_empty() || !groupings.is_empty() {
            scope.frames.push(Frame {
                typedefs,
                groupings,
            });
        }
        scope
    }

    /// Scope of a definition found at frame `level`.
    fn truncated(&self, level: usize) -> Scope<'c> {
        Scope {
            frames: self.frames[..=level].to_vec(),
            module: self.module,
        }
    }
}

// ===== impl FeatureParser =====

impl<'e> FeatureParser<'e> {
    fn parse(source: &'e str) -> std::result::Result<FeatureExpr, String> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (i, c) in source.char_indices() {
            if c == '(' || c == ')' || c.is_whitespace() {
                if let Some(s) = start.take() {
                    tokens.push(&source[s..i]);
                }
                if !c.is_whitespace() {
                    tokens.push(&source[i..i + 1]);
                }
            } else if start.is_none() {
                start = Some(i);
            }
        }
        if let Some(s) = start {
            tokens.push(&source[s..]);
        }
        let mut parser = FeatureParser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error());
        }
        Ok(expr)
    }

    fn error(&self) -> String {
        format!("Invalid value \"{}\" of if-feature.", self.source)
    }

    fn peek(&self) -> Option<&'e str> {
        self.tokens.get(self.pos).copied()
    }

    fn or(&mut self) -> std::result::Result<FeatureExpr, String> {
        let mut left = self.and()?;
        while self.peek() == Some("or") {
            self.pos += 1;
            let right = self.and()?;
            left = FeatureExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> std::result::Result<FeatureExpr, String> {
        let mut left = self.not()?;
        while self.peek() == Some("and") {
            self.pos += 1;
            let right = self.not()?;
            left = FeatureExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> std::result::Result<FeatureExpr, String> {
        match self.peek() {
            Some("not") => {
                self.pos += 1;
                Ok(FeatureExpr::Not(Box::new(self.not()?)))
            }
            Some("(") => {
                self.pos += 1;
                let expr = self.or()?;
                if self.peek() != Some(")") {
                    return Err(self.error());
                }
                self.pos += 1;
                Ok(expr)
            }
            Some(token) if !matches!(token, ")" | "and" | "or") => {
                self.pos += 1;
                Ok(FeatureExpr::Feature(token.to_owned()))
            }
            _ => Err(self.error()),
        }
    }
}

// ===== impl Compiler =====

impl<'c> Compiler<'c> {
    fn new(context: &'c Context) -> Compiler<'c> {
        let count = context.modules.len();
        Compiler {
            modules: &context.modules,
            plugins: &context.plugins,
            dict: &context.dict,
            keep_disabled: context
                .options
                .contains(ContextFlags::KEEP_DISABLED_NODES),
            store: SchemaStore {
                modules: vec![ModuleSchema::default(); count],
                ..Default::default()
            },
            failed: vec![false; count],
            typedefs: HashMap::new(),
            typedef_stack: Vec::new(),
            grouping_stack: Vec::new(),
            exprs: HashMap::new(),
            errors: Vec::new(),
        }
    }

    fn implemented(&self) -> Vec<usize> {
        (0..self.modules.len())
            .filter(|m| self.modules[*m].implemented && !self.failed[*m])
            .collect()
    }

    fn fail(&mut self, module: usize, error: Error) {
        log::debug!(
            "module {} failed to compile: {}",
            self.modules[module].name,
            error
        );
        self.failed[module] = true;
        self.errors.push(error);
    }

    fn run(&mut self, annotations: &'c [AnnotationDef]) {
        self.identities();

        for module in self.implemented() {
            let mark = self.store.nodes.len();
            if let Err(error) = self.module_data(module) {
                self.store.nodes.truncate(mark);
                let identities =
                    std::mem::take(&mut self.store.modules[module].identities);
                self.store.modules[module] = ModuleSchema {
                    identities,
                    ..Default::default()
                };
                self.fail(module, error);
            }
        }

        self.augments();
        self.deviations();

        for annotation in annotations {
            if !self.modules[annotation.module].implemented {
                continue;
            }
            let scope = Scope::top(self.modules, annotation.module);
            match self.type_(&annotation.ty, &scope, annotation.module) {
                Ok(ty) => self.store.annotations.push(Annotation {
                    module: annotation.module,
                    name: self.dict.insert(&annotation.name),
                    ty,
                }),
                Err(error) => self.fail(annotation.module, error),
            }
        }

        let nodes = self.reachable();
        for id in &nodes {
            if let Err(error) = self.resolve_leafrefs(*id) {
                let module = self.store.nodes[*id].module;
                self.fail(module, error);
            }
        }
        for id in &nodes {
            if let Err(error) = self.store_defaults(*id) {
                let module = self.store.nodes[*id].module;
                self.fail(module, error);
            }
        }
        self.number_nodes();

        for module in 0..self.modules.len() {
            self.store.modules[module].compiled =
                self.modules[module].implemented && !self.failed[module];
        }
    }

    // ----- identities and features -----

    fn identities(&mut self) {
        let modules = self.modules;
        for (module, entry) in modules.iter().enumerate() {
            for parsed in &entry.parsed.identities {
                let id = self.store.identities.len();
                let name = self.dict.insert(&parsed.name);
                self.store.identities.push(Identity {
                    module,
                    name: name.clone(),
                    bases: Vec::new(),
                    derived: Vec::new(),
                    dsc: parsed.description.as_deref().map(Arc::from),
                    ref_: parsed.reference.as_deref().map(Arc::from),
                    status: parsed.status,
                });
                self.store.identity_index.insert((module, name), id);
                self.store.modules[module].identities.push(id);
            }
        }

        for (module, entry) in modules.iter().enumerate() {
            for parsed in &entry.parsed.identities {
                let Some(id) = self.store.identity(module, &parsed.name) else {
                    continue;
                };
                for base in &parsed.bases {
                    match self.identity_ref(base, module) {
                        Ok(base) => {
                            self.store.identities[id].bases.push(base);
                            self.store.identities[base].derived.push(id);
                        }
                        Err(error) => self.fail(module, error),
                    }
                }
            }
        }

        for id in 0..self.store.identities.len() {
            if self.store.identity_derived_from(id, id) {
                let module = self.store.identities[id].module;
                let error = Error::valid(
                    ValidationErrorCode::Reference,
                    format!(
                        "Identity \"{}\" is indirectly derived from itself.",
                        self.store.identities[id].name
                    ),
                );
                self.fail(module, error);
            }
        }
    }

    fn identity_ref(&self, name: &str, module: usize) -> Result<usize> {
        let (prefix, local) = split_qname(name);
        let target = self.prefix_module(prefix, module)?;
        self.store.identity(target, local).ok_or_else(|| {
            Error::valid(
                ValidationErrorCode::Reference,
                format!("Unable to find base ({}) of identityref.", name),
            )
        })
    }

    fn prefix_module(&self, prefix: Option<&str>, module: usize) -> Result<usize> {
        match prefix {
            None => Ok(module),
            Some(prefix) => self.modules[module]
                .module_by_prefix(module, prefix)
                .ok_or_else(|| {
                    Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Prefix \"{}\" not defined in module \"{}\".",
                            prefix, self.modules[module].name
                        ),
                    )
                }),
        }
    }

    fn iffeatures(&self, exprs: &[String], module: usize) -> Result<bool> {
        for expr in exprs {
            let parsed = FeatureParser::parse(expr).map_err(|msg| {
                Error::valid(ValidationErrorCode::Semantics, msg)
            })?;
            if !self.eval_feature(&parsed, module, 0)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn eval_feature(
        &self,
        expr: &FeatureExpr,
        module: usize,
        depth: usize,
    ) -> Result<bool> {
        match expr {
            FeatureExpr::Not(expr) => {
                Ok(!self.eval_feature(expr, module, depth)?)
            }
            FeatureExpr::And(left, right) => {
                Ok(self.eval_feature(left, module, depth)?
                    && self.eval_feature(right, module, depth)?)
            }
            FeatureExpr::Or(left, right) => {
                Ok(self.eval_feature(left, module, depth)?
                    || self.eval_feature(right, module, depth)?)
            }
            FeatureExpr::Feature(name) => {
                if depth > FEATURE_DEPTH_MAX {
                    return Err(Error::valid(
                        ValidationErrorCode::Reference,
                        format!("Feature \"{}\" depends on itself.", name),
                    ));
                }
                let (prefix, local) = split_qname(name);
                let target = self.prefix_module(prefix, module)?;
                let entry = &self.modules[target];
                let feature = entry
                    .parsed
                    .features
                    .iter()
                    .find(|feature| feature.name == local)
                    .ok_or_else(|| {
                        Error::valid(
                            ValidationErrorCode::Reference,
                            format!(
                                "Invalid if-feature - unable to find feature \"{}\".",
                                name
                            ),
                        )
                    })?;
                if !entry.feature_enabled(local).unwrap_or(false) {
                    return Ok(false);
                }
                for expr in &feature.iffeatures {
                    let parsed = FeatureParser::parse(expr).map_err(|msg| {
                        Error::valid(ValidationErrorCode::Semantics, msg)
                    })?;
                    if !self.eval_feature(&parsed, target, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    // ----- expressions -----

    fn expr(
        &mut self,
        source: &'c String,
        ns: usize,
        module: usize,
    ) -> Result<Arc<Expr>> {
        let key = (source as *const String, ns, module);
        if let Some(expr) = self.exprs.get(&key) {
            return Ok(expr.clone());
        }
        let mut expr = Expr::parse(source)?;
        let modules = self.modules;
        expr.resolve_prefixes(Some(ns), &mut |prefix: &str| {
            modules[module].module_by_prefix(module, prefix)
        })
        .map_err(|msg| {
            Error::valid(
                ValidationErrorCode::Xpath,
                format!("Invalid XPath expression \"{}\": {}", source, msg),
            )
        })?;
        let expr = Arc::new(expr);
        self.exprs.insert(key, expr.clone());
        Ok(expr)
    }

    fn when(
        &mut self,
        when: &'c ParsedWhen,
        ns: usize,
        module: usize,
        on_parent: bool,
    ) -> Result<Arc<When>> {
        Ok(Arc::new(When {
            cond: self.expr(&when.condition, ns, module)?,
            source: Arc::from(when.condition.as_str()),
            module: ns,
            on_parent,
            dsc: when.description.as_deref().map(Arc::from),
            ref_: when.reference.as_deref().map(Arc::from),
        }))
    }

    fn must(
        &mut self,
        must: &'c ParsedMust,
        ns: usize,
        module: usize,
    ) -> Result<Arc<Must>> {
        Ok(Arc::new(Must {
            cond: self.expr(&must.condition, ns, module)?,
            source: Arc::from(must.condition.as_str()),
            module: ns,
            emsg: must.error_message.as_deref().map(Arc::from),
            eapptag: must.error_app_tag.as_deref().map(Arc::from),
            dsc: must.description.as_deref().map(Arc::from),
            ref_: must.reference.as_deref().map(Arc::from),
        }))
    }

    fn check_exts(&self, exts: &[ExtensionInstance], module: usize) -> Result<()> {
        for ext in exts {
            let target = self.modules[module]
                .module_by_prefix(module, &ext.prefix)
                .ok_or_else(|| {
                    Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Invalid prefix \"{}\" of extension instance \"{}:{}\".",
                            ext.prefix, ext.prefix, ext.name
                        ),
                    )
                    .with_line(ext.line)
                })?;
            let entry = &self.modules[target];
            if !entry.parsed.extensions.iter().any(|e| e.name == ext.name) {
                return Err(Error::valid(
                    ValidationErrorCode::Reference,
                    format!(
                        "Extension definition of extension instance \"{}:{}\" not found.",
                        ext.prefix, ext.name
                    ),
                )
                .with_line(ext.line));
            }
            if let Some(plugin) =
                self.plugins.extension_plugin(&entry.name, &ext.name)
            {
                plugin.compile(ext).map_err(|msg| {
                    Error::valid(ValidationErrorCode::Semantics, msg)
                        .with_line(ext.line)
                        .from_plugin()
                })?;
            }
        }
        Ok(())
    }

    // ----- types -----

    fn find_typedef(
        &self,
        name: &str,
        scope: &Scope<'c>,
    ) -> Result<(&'c ParsedTypedef, Scope<'c>)> {
        let (prefix, local) = split_qname(name);
        let module = self.prefix_module(prefix, scope.module)?;
        if module != scope.module {
            let parsed: &'c ParsedModule = &self.modules[module].parsed;
            if let Some(typedef) =
                parsed.typedefs.iter().find(|typedef| typedef.name == local)
            {
                return Ok((typedef, Scope::top(self.modules, module)));
            }
        } else {
            for (level, frame) in scope.frames.iter().enumerate().rev() {
                let typedefs: &'c [ParsedTypedef] = frame.typedefs;
                if let Some(typedef) =
                    typedefs.iter().find(|typedef| typedef.name == local)
                {
                    return Ok((typedef, scope.truncated(level)));
                }
            }
        }
        Err(Error::valid(
            ValidationErrorCode::Reference,
            format!("Referenced type \"{}\" not found.", name),
        ))
    }

    fn typedef(
        &mut self,
        typedef: &'c ParsedTypedef,
        scope: &Scope<'c>,
    ) -> Result<Arc<CompiledType>> {
        let key = typedef as *const ParsedTypedef;
        if let Some(ty) = self.typedefs.get(&key) {
            return Ok(ty.clone());
        }
        if self.typedef_stack.contains(&key) {
            return Err(Error::valid(
                ValidationErrorCode::Reference,
                format!(
                    "Invalid typedef \"{}\" - circular chain of types detected.",
                    typedef.name
                ),
            )
            .with_line(typedef.line));
        }
        self.typedef_stack.push(key);
        let result = self.type_(&typedef.type_, scope, scope.module);
        self.typedef_stack.pop();
        let base = result?;

        let mut ty = (*base).clone();
        ty.name = Some(self.dict.insert(&typedef.name));
        ty.module = Some(scope.module);
        if let Some(default) = &typedef.default {
            ty.default = Some((Arc::from(default.as_str()), scope.module));
        }
        if let Some(units) = &typedef.units {
            ty.units = Some(Arc::from(units.as_str()));
        }
        if let Some(plugin) = self
            .plugins
            .type_plugin(&self.modules[scope.module].name, &typedef.name)
        {
            ty.plugin = Some(plugin);
        }
        let ty = Arc::new(ty);
        self.typedefs.insert(key, ty.clone());
        Ok(ty)
    }

    fn type_(
        &mut self,
        parsed: &'c ParsedType,
        scope: &Scope<'c>,
        ns: usize,
    ) -> Result<Arc<CompiledType>> {
        self.type_inner(parsed, scope, ns)
            .map_err(|error| match error.line {
                0 => error.with_line(parsed.line),
                _ => error,
            })
    }

    fn type_inner(
        &mut self,
        parsed: &'c ParsedType,
        scope: &Scope<'c>,
        ns: usize,
    ) -> Result<Arc<CompiledType>> {
        let builtin = match split_qname(&parsed.name) {
            (None, name) => builtin_base(name),
            _ => None,
        };
        let base = match builtin {
            Some(base) => Arc::new(CompiledType::builtin(base)),
            None => {
                let (typedef, tscope) = self.find_typedef(&parsed.name, scope)?;
                self.typedef(typedef, &tscope)?
            }
        };

        if let Some(base) = builtin {
            let missing = match base {
                DataValueType::Dec64 if parsed.fraction_digits.is_none() => {
                    Some("fraction-digits")
                }
                DataValueType::Enum if parsed.enums.is_empty() => Some("enum"),
                DataValueType::Bits if parsed.bits.is_empty() => Some("bit"),
                DataValueType::LeafRef if parsed.path.is_none() => Some("path"),
                DataValueType::IdentityRef if parsed.bases.is_empty() => {
                    Some("base")
                }
                DataValueType::Union if parsed.types.is_empty() => Some("type"),
                _ => None,
            };
            if let Some(missing) = missing {
                return Err(type_error(format!(
                    "Missing {} substatement for {} type.",
                    missing, parsed.name
                )));
            }
        }

        let restricted = parsed.range.is_some()
            || parsed.length.is_some()
            || !parsed.patterns.is_empty()
            || !parsed.enums.is_empty()
            || !parsed.bits.is_empty()
            || parsed.fraction_digits.is_some()
            || parsed.path.is_some()
            || parsed.require_instance.is_some()
            || !parsed.bases.is_empty()
            || !parsed.types.is_empty();
        if !restricted {
            return Ok(base);
        }

        let mut ty = (*base).clone();
        ty.realtype = OnceLock::new();

        if let Some(digits) = parsed.fraction_digits {
            if builtin != Some(DataValueType::Dec64) {
                return Err(type_error(format!(
                    "Invalid fraction-digits substatement for type \"{}\".",
                    parsed.name
                )));
            }
            if !(1..=18).contains(&digits) {
                return Err(type_error(format!(
                    "Invalid value \"{}\" of fraction-digits.",
                    digits
                )));
            }
            ty.fraction_digits = digits;
        }

        if let Some(range) = &parsed.range {
            if !is_integer(ty.base) && ty.base != DataValueType::Dec64 {
                return Err(type_error(format!(
                    "Invalid range restriction for type \"{}\".",
                    parsed.name
                )));
            }
            let parts = parse_restriction(
                &range.arg,
                ty.base,
                ty.fraction_digits,
                &ty.bounds(false),
            )
            .map_err(type_error)?;
            ty.range = Some(Restriction {
                parts,
                source: Arc::from(range.arg.as_str()),
                error_message: range.error_message.as_deref().map(Arc::from),
                error_app_tag: range.error_app_tag.as_deref().map(Arc::from),
            });
        }

        if let Some(length) = &parsed.length {
            if !matches!(ty.base, DataValueType::String | DataValueType::Binary)
            {
                return Err(type_error(format!(
                    "Invalid length restriction for type \"{}\".",
                    parsed.name
                )));
            }
            let parts = parse_restriction(
                &length.arg,
                DataValueType::Uint64,
                0,
                &ty.bounds(true),
            )
            .map_err(type_error)?;
            ty.length = Some(Restriction {
                parts,
                source: Arc::from(length.arg.as_str()),
                error_message: length.error_message.as_deref().map(Arc::from),
                error_app_tag: length.error_app_tag.as_deref().map(Arc::from),
            });
        }

        if !parsed.patterns.is_empty() {
            if ty.base != DataValueType::String {
                return Err(type_error(format!(
                    "Invalid pattern restriction for type \"{}\".",
                    parsed.name
                )));
            }
            for pattern in &parsed.patterns {
                let matcher = self
                    .plugins
                    .matcher()
                    .compile(&pattern.arg)
                    .map_err(type_error)?;
                ty.patterns.push(Pattern {
                    source: Arc::from(pattern.arg.as_str()),
                    matcher: Arc::from(matcher),
                    inverted: pattern.inverted,
                    error_message: pattern
                        .error_message
                        .as_deref()
                        .map(Arc::from),
                    error_app_tag: pattern
                        .error_app_tag
                        .as_deref()
                        .map(Arc::from),
                });
            }
        }

        if !parsed.enums.is_empty() {
            if ty.base != DataValueType::Enum {
                return Err(type_error(format!(
                    "Invalid enum substatement for type \"{}\".",
                    parsed.name
                )));
            }
            ty.enums = self.enums(parsed, &ty.enums, scope.module)?;
        }

        if !parsed.bits.is_empty() {
            if ty.base != DataValueType::Bits {
                return Err(type_error(format!(
                    "Invalid bit substatement for type \"{}\".",
                    parsed.name
                )));
            }
            ty.bits = self.bits(parsed, &ty.bits, scope.module)?;
        }

        if let Some(path) = &parsed.path {
            if builtin != Some(DataValueType::LeafRef) {
                return Err(type_error(format!(
                    "Invalid path substatement for type \"{}\".",
                    parsed.name
                )));
            }
            let expr = self.expr(path, ns, scope.module)?;
            if !matches!(&*expr, Expr::Path(_)) {
                return Err(type_error(format!(
                    "Invalid leafref path \"{}\".",
                    path
                )));
            }
            ty.path = Some(LeafrefPath {
                expr,
                source: Arc::from(path.as_str()),
                module: ns,
            });
        }

        if let Some(require) = parsed.require_instance {
            if !matches!(
                ty.base,
                DataValueType::LeafRef | DataValueType::InstanceId
            ) {
                return Err(type_error(format!(
                    "Invalid require-instance substatement for type \"{}\".",
                    parsed.name
                )));
            }
            ty.require_instance = require;
        }

        if !parsed.bases.is_empty() {
            if builtin != Some(DataValueType::IdentityRef) {
                return Err(type_error(format!(
                    "Invalid base substatement for type \"{}\".",
                    parsed.name
                )));
            }
            for base in &parsed.bases {
                let base = self.identity_ref(base, scope.module)?;
                ty.bases.push(base);
            }
        }

        if !parsed.types.is_empty() {
            if builtin != Some(DataValueType::Union) {
                return Err(type_error(format!(
                    "Invalid type substatement for type \"{}\".",
                    parsed.name
                )));
            }
            for member in &parsed.types {
                let member = self.type_(member, scope, ns)?;
                ty.types.push(member);
            }
        }

        Ok(Arc::new(ty))
    }

    fn enums(
        &self,
        parsed: &ParsedType,
        base: &[EnumItem],
        module: usize,
    ) -> Result<Vec<EnumItem>> {
        let mut items: Vec<EnumItem> = Vec::new();
        let mut next: i64 = 0;
        for item in &parsed.enums {
            if !self.iffeatures(&item.iffeatures, module)? {
                continue;
            }
            if items.iter().any(|i| *i.name == *item.name) {
                return Err(type_error(format!(
                    "The enum name \"{}\" is used multiple times.",
                    item.name
                )));
            }
            let value = if !base.is_empty() {
                let derived = base
                    .iter()
                    .find(|i| *i.name == *item.name)
                    .ok_or_else(|| {
                        type_error(format!(
                            "Invalid enumeration - derived type adds new item \"{}\".",
                            item.name
                        ))
                    })?;
                if item.value.is_some_and(|value| value != derived.value) {
                    return Err(type_error(format!(
                        "Invalid enumeration - value of the item \"{}\" has changed from {} to {} in the derived type.",
                        item.name,
                        derived.value,
                        item.value.unwrap_or_default()
                    )));
                }
                derived.value
            } else {
                let value = match item.value {
                    Some(value) => value,
                    None => i32::try_from(next).map_err(|_| {
                        type_error(format!(
                            "Invalid enumeration - it is not possible to auto-assign enum value for \"{}\" since the highest value is already 2147483647.",
                            item.name
                        ))
                    })?,
                };
                if items.iter().any(|i| i.value == value) {
                    return Err(type_error(format!(
                        "Invalid enumeration - value {} collide in items \"{}\".",
                        value, item.name
                    )));
                }
                next = next.max(value as i64 + 1);
                value
            };
            items.push(EnumItem {
                name: self.dict.insert(&item.name),
                value,
            });
        }
        Ok(items)
    }

    fn bits(
        &self,
        parsed: &ParsedType,
        base: &[BitItem],
        module: usize,
    ) -> Result<Vec<BitItem>> {
        let mut items: Vec<BitItem> = Vec::new();
        let mut next: u64 = 0;
        for bit in &parsed.bits {
            if !self.iffeatures(&bit.iffeatures, module)? {
                continue;
            }
            if items.iter().any(|i| *i.name == *bit.name) {
                return Err(type_error(format!(
                    "The bit name \"{}\" is used multiple times.",
                    bit.name
                )));
            }
            let position = if !base.is_empty() {
                let derived = base
                    .iter()
                    .find(|i| *i.name == *bit.name)
                    .ok_or_else(|| {
                        type_error(format!(
                            "Invalid bits - derived type adds new item \"{}\".",
                            bit.name
                        ))
                    })?;
                if bit.position.is_some_and(|pos| pos != derived.position) {
                    return Err(type_error(format!(
                        "Invalid bits - position of the item \"{}\" has changed in the derived type.",
                        bit.name
                    )));
                }
                derived.position
            } else {
                let position = match bit.position {
                    Some(position) => position,
                    None => u32::try_from(next).map_err(|_| {
                        type_error(format!(
                            "Invalid bits - it is not possible to auto-assign bit position for \"{}\".",
                            bit.name
                        ))
                    })?,
                };
                if items.iter().any(|i| i.position == position) {
                    return Err(type_error(format!(
                        "Invalid bits - position {} collide in items \"{}\".",
                        position, bit.name
                    )));
                }
                next = next.max(position as u64 + 1);
                position
            };
            items.push(BitItem {
                name: self.dict.insert(&bit.name),
                position,
            });
        }
        items.sort_by_key(|bit| bit.position);
        Ok(items)
    }

    // ----- data nodes -----

    fn new_node(&mut self, kind: SchemaNodeKind, ns: usize, name: &str) -> usize {
        let id = self.store.nodes.len();
        self.store
            .nodes
            .push(SNode::new(kind, ns, self.dict.insert(name), id));
        id
    }

    fn module_data(&mut self, module: usize) -> Result<()> {
        let parsed: &'c ParsedModule = &self.modules[module].parsed;
        log::trace!("compiling module {}", parsed.name);
        self.check_exts(&parsed.exts, module)?;
        let scope = Scope::top(self.modules, module);
        let inherit = Inherit {
            ns: module,
            config: Some(true),
            status: Status::Current,
            flags: SchemaFlags::empty(),
        };
        for node in parsed
            .data
            .iter()
            .chain(&parsed.rpcs)
            .chain(&parsed.notifications)
        {
            for id in self.node(node, &scope, inherit)? {
                self.link_top(module, id);
            }
        }
        Ok(())
    }

    fn node(
        &mut self,
        parsed: &'c ParsedNode,
        scope: &Scope<'c>,
        inherit: Inherit,
    ) -> Result<Vec<usize>> {
        self.node_inner(parsed, scope, inherit)
            .map_err(|error| match error.line {
                0 => error.with_line(parsed.line),
                _ => error,
            })
    }

    fn node_inner(
        &mut self,
        parsed: &'c ParsedNode,
        scope: &Scope<'c>,
        inherit: Inherit,
    ) -> Result<Vec<usize>> {
        if let ParsedNodeKind::Uses { refines, augments } = &parsed.kind {
            return self.uses(parsed, refines, augments, scope, inherit);
        }

        let mut flags = inherit.flags & SUBTREE_FLAGS;
        if !self.iffeatures(&parsed.iffeatures, scope.module)? {
            if !self.keep_disabled {
                return Ok(Vec::new());
            }
            flags |= SchemaFlags::DISABLED;
        }

        let kind = match &parsed.kind {
            ParsedNodeKind::Container { .. } => SchemaNodeKind::Container,
            ParsedNodeKind::Leaf { .. } => SchemaNodeKind::Leaf,
            ParsedNodeKind::LeafList { .. } => SchemaNodeKind::LeafList,
            ParsedNodeKind::List { .. } => SchemaNodeKind::List,
            ParsedNodeKind::Choice { .. } => SchemaNodeKind::Choice,
            ParsedNodeKind::Case => SchemaNodeKind::Case,
            ParsedNodeKind::AnyData { .. } | ParsedNodeKind::AnyXml { .. } => {
                SchemaNodeKind::AnyData
            }
            ParsedNodeKind::Rpc => SchemaNodeKind::Rpc,
            ParsedNodeKind::Action => SchemaNodeKind::Action,
            ParsedNodeKind::Notification => SchemaNodeKind::Notification,
            ParsedNodeKind::Input
            | ParsedNodeKind::Output
            | ParsedNodeKind::Uses { .. } => {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    format!(
                        "Unexpected \"{}\" statement.",
                        parsed.kind.keyword()
                    ),
                ));
            }
        };

        let status = parsed.status.unwrap_or(inherit.status);
        if status < inherit.status {
            return Err(Error::valid(
                ValidationErrorCode::Semantics,
                format!(
                    "A \"{}\" definition \"{}\" is not allowed under a \"{}\" parent.",
                    status_name(status),
                    parsed.name,
                    status_name(inherit.status)
                ),
            ));
        }

        let config = match kind {
            SchemaNodeKind::Rpc
            | SchemaNodeKind::Action
            | SchemaNodeKind::Notification => None,
            _ => match inherit.config {
                None => None,
                Some(parent) => {
                    let own = parsed.config.unwrap_or(parent);
                    if own && !parent {
                        return Err(Error::valid(
                            ValidationErrorCode::Semantics,
                            "Configuration node cannot be child of any state data node.",
                        ));
                    }
                    Some(own)
                }
            },
        };
        match config {
            Some(true) => flags |= SchemaFlags::CONFIG_W,
            Some(false) => flags |= SchemaFlags::CONFIG_R,
            None => (),
        }

        let id = self.new_node(kind, inherit.ns, &parsed.name);
        self.check_exts(&parsed.exts, scope.module)?;
        {
            let snode = &mut self.store.nodes[id];
            snode.status = status;
            snode.dsc = parsed.description.as_deref().map(Arc::from);
            snode.ref_ = parsed.reference.as_deref().map(Arc::from);
            snode.exts = parsed.exts.clone();
        }
        if let Some(when) = &parsed.when {
            let on_parent =
                matches!(kind, SchemaNodeKind::Choice | SchemaNodeKind::Case);
            let when = self.when(when, inherit.ns, scope.module, on_parent)?;
            self.store.nodes[id].whens.push(when);
        }
        for must in &parsed.musts {
            let must = self.must(must, inherit.ns, scope.module)?;
            self.store.nodes[id].musts.push(must);
        }

        let scope = scope.nested(&parsed.typedefs, &parsed.groupings);
        let mut child_inherit = Inherit {
            ns: inherit.ns,
            config,
            status,
            flags: flags & SUBTREE_FLAGS,
        };

        let payload = match &parsed.kind {
            ParsedNodeKind::Container { presence } => Payload::Container {
                presence: presence.as_deref().map(Arc::from),
            },
            ParsedNodeKind::Leaf {
                type_,
                units,
                default,
                mandatory,
            } => {
                let ty = unshare_leafrefs(&self.type_(type_, &scope, inherit.ns)?);
                if *mandatory == Some(true) {
                    flags |= SchemaFlags::MANDATORY;
                }
                Payload::Leaf {
                    units: units
                        .as_deref()
                        .map(Arc::from)
                        .or_else(|| ty.units.clone()),
                    ty,
                    default: None,
                    dflt_src: default
                        .as_deref()
                        .map(|default| (Arc::from(default), scope.module)),
                }
            }
            ParsedNodeKind::LeafList {
                type_,
                units,
                defaults,
                min_elements,
                max_elements,
                ordered_by_user,
            } => {
                let ty = unshare_leafrefs(&self.type_(type_, &scope, inherit.ns)?);
                let min = min_elements.unwrap_or(0);
                check_min_max(min, *max_elements)?;
                if min > 0 {
                    flags |= SchemaFlags::MANDATORY;
                }
                if *ordered_by_user {
                    flags |= SchemaFlags::USER_ORDERED;
                }
                Payload::LeafList {
                    units: units
                        .as_deref()
                        .map(Arc::from)
                        .or_else(|| ty.units.clone()),
                    ty,
                    defaults: Vec::new(),
                    dflt_src: defaults
                        .iter()
                        .map(|default| (Arc::from(default.as_str()), scope.module))
                        .collect(),
                    min,
                    max: *max_elements,
                }
            }
            ParsedNodeKind::List {
                min_elements,
                max_elements,
                ordered_by_user,
                ..
            } => {
                let min = min_elements.unwrap_or(0);
                check_min_max(min, *max_elements)?;
                if min > 0 {
                    flags |= SchemaFlags::MANDATORY;
                }
                if *ordered_by_user {
                    flags |= SchemaFlags::USER_ORDERED;
                }
                Payload::List {
                    keys: Vec::new(),
                    uniques: Vec::new(),
                    min,
                    max: *max_elements,
                }
            }
            ParsedNodeKind::Choice { mandatory, .. }
            | ParsedNodeKind::AnyData { mandatory }
            | ParsedNodeKind::AnyXml { mandatory } => {
                if *mandatory == Some(true) {
                    flags |= SchemaFlags::MANDATORY;
                }
                if matches!(parsed.kind, ParsedNodeKind::AnyXml { .. }) {
                    flags |= SchemaFlags::IS_ANYXML;
                }
                match kind {
                    SchemaNodeKind::Choice => Payload::Choice { default: None },
                    _ => Payload::None,
                }
            }
            _ => Payload::None,
        };
        self.store.nodes[id].flags = flags;
        self.store.nodes[id].payload = payload;

        match kind {
            SchemaNodeKind::Rpc | SchemaNodeKind::Action => {
                child_inherit.config = None;
                self.operation(id, parsed, &scope, child_inherit)?;
            }
            SchemaNodeKind::Notification => {
                child_inherit.config = None;
                child_inherit.flags |= SchemaFlags::IN_NOTIF;
                for child in parsed
                    .children
                    .iter()
                    .chain(&parsed.actions)
                    .chain(&parsed.notifications)
                {
                    for cid in self.node(child, &scope, child_inherit)? {
                        self.link(id, cid)?;
                    }
                }
            }
            SchemaNodeKind::Choice => {
                for child in &parsed.children {
                    for cid in self.node(child, &scope, child_inherit)? {
                        self.link_case(id, cid)?;
                    }
                }
                if let ParsedNodeKind::Choice {
                    default: Some(default),
                    ..
                } = &parsed.kind
                {
                    self.set_choice_default(id, default)?;
                }
            }
            SchemaNodeKind::Leaf
            | SchemaNodeKind::LeafList
            | SchemaNodeKind::AnyData => (),
            _ => {
                for child in parsed
                    .children
                    .iter()
                    .chain(&parsed.actions)
                    .chain(&parsed.notifications)
                {
                    for cid in self.node(child, &scope, child_inherit)? {
                        self.link(id, cid)?;
                    }
                }
            }
        }

        if let ParsedNodeKind::List { key, uniques, .. } = &parsed.kind {
            self.list_keys(id, key.as_deref())?;
            for unique in uniques {
                let unique = self.unique(id, unique, scope.module)?;
                if let Payload::List { uniques, .. } =
                    &mut self.store.nodes[id].payload
                {
                    uniques.push(unique);
                }
            }
        }

        Ok(vec![id])
    }

    /// Creates the input and output of an RPC or action.
    fn operation(
        &mut self,
        id: usize,
        parsed: &'c ParsedNode,
        scope: &Scope<'c>,
        inherit: Inherit,
    ) -> Result<()> {
        for (kind, flag) in [
            (SchemaNodeKind::Input, SchemaFlags::IN_INPUT),
            (SchemaNodeKind::Output, SchemaFlags::IN_OUTPUT),
        ] {
            let name = match kind {
                SchemaNodeKind::Input => "input",
                _ => "output",
            };
            let io = self.new_node(kind, inherit.ns, name);
            self.store.nodes[io].flags = inherit.flags & SUBTREE_FLAGS;
            self.store.nodes[io].status = inherit.status;
            let io_inherit = Inherit {
                flags: inherit.flags | flag,
                ..inherit
            };
            let io_parsed = parsed.children.iter().find(|child| {
                match kind {
                    SchemaNodeKind::Input => {
                        matches!(child.kind, ParsedNodeKind::Input)
                    }
                    _ => matches!(child.kind, ParsedNodeKind::Output),
                }
            });
            if let Some(io_parsed) = io_parsed {
                for must in &io_parsed.musts {
                    let must = self.must(must, inherit.ns, scope.module)?;
                    self.store.nodes[io].musts.push(must);
                }
                let scope =
                    scope.nested(&io_parsed.typedefs, &io_parsed.groupings);
                for child in io_parsed
                    .children
                    .iter()
                    .chain(&io_parsed.actions)
                    .chain(&io_parsed.notifications)
                {
                    for cid in self.node(child, &scope, io_inherit)? {
                        self.link(io, cid)?;
                    }
                }
            }
            self.link(id, io)?;
        }
        Ok(())
    }

    fn find_grouping(
        &self,
        name: &str,
        scope: &Scope<'c>,
    ) -> Result<(&'c ParsedGrouping, Scope<'c>)> {
        let (prefix, local) = split_qname(name);
        let module = self.prefix_module(prefix, scope.module)?;
        if module != scope.module {
            let parsed: &'c ParsedModule = &self.modules[module].parsed;
            if let Some(grouping) =
                parsed.groupings.iter().find(|grouping| grouping.name == local)
            {
                return Ok((grouping, Scope::top(self.modules, module)));
            }
        } else {
            for (level, frame) in scope.frames.iter().enumerate().rev() {
                let groupings: &'c [ParsedGrouping] = frame.groupings;
                if let Some(grouping) =
                    groupings.iter().find(|grouping| grouping.name == local)
                {
                    return Ok((grouping, scope.truncated(level)));
                }
            }
        }
        Err(Error::valid(
            ValidationErrorCode::Reference,
            format!("Grouping \"{}\" referenced by a uses statement not found.", name),
        ))
    }

    fn uses(
        &mut self,
        parsed: &'c ParsedNode,
        refines: &'c [ParsedRefine],
        augments: &'c [ParsedAugment],
        scope: &Scope<'c>,
        mut inherit: Inherit,
    ) -> Result<Vec<usize>> {
        if !self.iffeatures(&parsed.iffeatures, scope.module)? {
            if !self.keep_disabled {
                return Ok(Vec::new());
            }
            inherit.flags |= SchemaFlags::DISABLED;
        }
        if let Some(status) = parsed.status {
            inherit.status = inherit.status.max(status);
        }

        let (grouping, gscope) = self.find_grouping(&parsed.name, scope)?;
        let key = grouping as *const ParsedGrouping;
        if self.grouping_stack.contains(&key) {
            return Err(Error::valid(
                ValidationErrorCode::Reference,
                format!(
                    "Grouping \"{}\" references itself through a uses statement.",
                    grouping.name
                ),
            ));
        }
        self.grouping_stack.push(key);
        let gscope = gscope.nested(&grouping.typedefs, &grouping.groupings);
        let mut nodes = Vec::new();
        let mut result = Ok(());
        for child in grouping
            .children
            .iter()
            .chain(&grouping.actions)
            .chain(&grouping.notifications)
        {
            match self.node(child, &gscope, inherit) {
                Ok(ids) => nodes.extend(ids),
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
        self.grouping_stack.pop();
        result?;

        if let Some(when) = &parsed.when {
            let when = self.when(when, inherit.ns, scope.module, true)?;
            for id in &nodes {
                self.store.nodes[*id].whens.push(when.clone());
            }
        }
        for refine in refines {
            self.refine(&mut nodes, refine, scope)
                .map_err(|error| error.with_line(refine.line))?;
        }
        for augment in augments {
            self.uses_augment(&nodes, augment, scope, inherit)
                .map_err(|error| error.with_line(augment.line))?;
        }
        Ok(nodes)
    }

    fn refine(
        &mut self,
        roots: &mut Vec<usize>,
        refine: &'c ParsedRefine,
        scope: &Scope<'c>,
    ) -> Result<()> {
        let target = self.descendant(roots, &refine.target, scope.module)?;
        let kind = self.store.nodes[target].kind;
        let ns = self.store.nodes[target].module;

        if !self.iffeatures(&refine.iffeatures, scope.module)? {
            if self.keep_disabled {
                self.set_subtree_flag(target, SchemaFlags::DISABLED);
            } else if roots.contains(&target) {
                roots.retain(|id| *id != target);
                return Ok(());
            } else {
                self.unlink(target);
                return Ok(());
            }
        }

        self.check_exts(&refine.exts, scope.module)?;
        {
            let snode = &mut self.store.nodes[target];
            if let Some(dsc) = &refine.description {
                snode.dsc = Some(Arc::from(dsc.as_str()));
            }
            if let Some(ref_) = &refine.reference {
                snode.ref_ = Some(Arc::from(ref_.as_str()));
            }
            snode.exts.extend(refine.exts.iter().cloned());
        }
        if let Some(config) = refine.config {
            self.set_config(target, config)?;
        }
        if let Some(mandatory) = refine.mandatory {
            if !matches!(
                kind,
                SchemaNodeKind::Leaf
                    | SchemaNodeKind::Choice
                    | SchemaNodeKind::AnyData
            ) {
                return Err(refine_error(&refine.target, "mandatory"));
            }
            self.store.nodes[target]
                .flags
                .set(SchemaFlags::MANDATORY, mandatory);
        }
        if let Some(presence) = &refine.presence {
            match &mut self.store.nodes[target].payload {
                Payload::Container { presence: current } => {
                    *current = Some(Arc::from(presence.as_str()));
                }
                _ => return Err(refine_error(&refine.target, "presence")),
            }
        }
        if !refine.defaults.is_empty() {
            self.replace_defaults(target, &refine.defaults, scope.module)
                .map_err(|_| refine_error(&refine.target, "default"))?;
        }
        if refine.min_elements.is_some() || refine.max_elements.is_some() {
            self.set_min_max(target, refine.min_elements, refine.max_elements)?;
        }
        for must in &refine.musts {
            let must = self.must(must, ns, scope.module)?;
            self.store.nodes[target].musts.push(must);
        }
        Ok(())
    }

    fn uses_augment(
        &mut self,
        roots: &[usize],
        augment: &'c ParsedAugment,
        scope: &Scope<'c>,
        inherit: Inherit,
    ) -> Result<()> {
        let mut flags = SchemaFlags::empty();
        if !self.iffeatures(&augment.iffeatures, scope.module)? {
            if !self.keep_disabled {
                return Ok(());
            }
            flags |= SchemaFlags::DISABLED;
        }
        let target = self.descendant(roots, &augment.target, scope.module)?;
        self.augment_into(target, augment, scope, inherit.ns, flags)
    }

    /// Compiles the augment's children and links them into `target`.
    fn augment_into(
        &mut self,
        target: usize,
        augment: &'c ParsedAugment,
        scope: &Scope<'c>,
        ns: usize,
        flags: SchemaFlags,
    ) -> Result<()> {
        let tnode = &self.store.nodes[target];
        if !matches!(
            tnode.kind,
            SchemaNodeKind::Container
                | SchemaNodeKind::List
                | SchemaNodeKind::Choice
                | SchemaNodeKind::Case
                | SchemaNodeKind::Input
                | SchemaNodeKind::Output
                | SchemaNodeKind::Notification
                | SchemaNodeKind::Action
        ) {
            return Err(Error::valid(
                ValidationErrorCode::Reference,
                format!(
                    "Augment's target node \"{}\" is not a container, list, choice, case, input, output, notification or action.",
                    augment.target
                ),
            ));
        }
        let config = if tnode.flags.contains(SchemaFlags::CONFIG_W) {
            Some(true)
        } else if tnode.flags.contains(SchemaFlags::CONFIG_R) {
            Some(false)
        } else {
            None
        };
        let target_kind = tnode.kind;
        let mut inherit_flags = (tnode.flags & SUBTREE_FLAGS) | flags;
        match target_kind {
            SchemaNodeKind::Input => inherit_flags |= SchemaFlags::IN_INPUT,
            SchemaNodeKind::Output => inherit_flags |= SchemaFlags::IN_OUTPUT,
            SchemaNodeKind::Notification => {
                inherit_flags |= SchemaFlags::IN_NOTIF
            }
            _ => (),
        }
        let inherit = Inherit {
            ns,
            config,
            status: augment.status.max(tnode.status),
            flags: inherit_flags,
        };

        let mut ids = Vec::new();
        for child in augment
            .children
            .iter()
            .chain(&augment.actions)
            .chain(&augment.notifications)
        {
            ids.extend(self.node(child, scope, inherit)?);
        }
        if let Some(when) = &augment.when {
            let when = self.when(when, ns, scope.module, true)?;
            for id in &ids {
                self.store.nodes[*id].whens.push(when.clone());
            }
        }
        for id in ids {
            if target_kind == SchemaNodeKind::Choice {
                self.link_case(target, id)?;
            } else {
                if self.store.nodes[id].kind == SchemaNodeKind::Case {
                    return Err(Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Invalid augment of non-choice node \"{}\" with a case.",
                            augment.target
                        ),
                    ));
                }
                self.link(target, id)?;
            }
        }
        Ok(())
    }

    fn augments(&mut self) {
        let modules = self.modules;
        let mut pending: Vec<(usize, &'c ParsedAugment)> = Vec::new();
        for module in self.implemented() {
            let parsed: &'c ParsedModule = &modules[module].parsed;
            pending.extend(parsed.augments.iter().map(|augment| (module, augment)));
        }

        // Targets may be created by other augments.
        while !pending.is_empty() {
            let mut progress = false;
            let mut retry = Vec::new();
            for (module, augment) in pending {
                if self.failed[module] {
                    continue;
                }
                match self.module_augment(module, augment) {
                    Ok(true) => progress = true,
                    Ok(false) => retry.push((module, augment)),
                    Err(error) => {
                        self.fail(module, error.with_line(augment.line));
                        progress = true;
                    }
                }
            }
            if !progress {
                for (module, augment) in retry {
                    let error = Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Augment target node \"{}\" from module \"{}\" was not found.",
                            augment.target, modules[module].name
                        ),
                    )
                    .with_line(augment.line);
                    self.fail(module, error);
                }
                break;
            }
            pending = retry;
        }
    }

    fn module_augment(
        &mut self,
        module: usize,
        augment: &'c ParsedAugment,
    ) -> Result<bool> {
        let Some(target) = self.absolute_target(&augment.target, module)? else {
            return Ok(false);
        };
        let mut flags = SchemaFlags::empty();
        if !self.iffeatures(&augment.iffeatures, module)? {
            if !self.keep_disabled {
                return Ok(true);
            }
            flags |= SchemaFlags::DISABLED;
        }
        log::trace!(
            "augmenting {} from module {}",
            augment.target,
            self.modules[module].name
        );
        let scope = Scope::top(self.modules, module);
        self.augment_into(target, augment, &scope, module, flags)?;
        Ok(true)
    }

    fn deviations(&mut self) {
        let modules = self.modules;
        for module in self.implemented() {
            let parsed: &'c ParsedModule = &modules[module].parsed;
            for deviation in &parsed.deviations {
                if let Err(error) = self.deviation(module, deviation) {
                    self.fail(module, error.with_line(deviation.line));
                    break;
                }
            }
        }
    }

    fn deviation(
        &mut self,
        module: usize,
        deviation: &'c ParsedDeviation,
    ) -> Result<()> {
        let target = self
            .absolute_target(&deviation.target, module)?
            .ok_or_else(|| {
                Error::valid(
                    ValidationErrorCode::Reference,
                    format!(
                        "Deviation(s) target node \"{}\" from module \"{}\" was not found.",
                        deviation.target, self.modules[module].name
                    ),
                )
            })?;
        for deviate in &deviation.deviates {
            match deviate.kind {
                DeviateKind::NotSupported => {
                    self.unlink(target);
                    return Ok(());
                }
                DeviateKind::Add => self.deviate_add(target, deviate, module)?,
                DeviateKind::Replace => {
                    self.deviate_replace(target, deviate, module)?
                }
                DeviateKind::Delete => {
                    self.deviate_delete(target, deviate, module)?
                }
            }
        }
        Ok(())
    }

    fn deviate_add(
        &mut self,
        target: usize,
        deviate: &'c ParsedDeviate,
        module: usize,
    ) -> Result<()> {
        if let Some(units) = &deviate.units {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf { units: current, .. }
                | Payload::LeafList { units: current, .. } => {
                    if let Some(current) = current {
                        return Err(deviate_error(format!(
                            "Invalid deviation adding \"units\" property which already exists (with value \"{}\").",
                            current
                        )));
                    }
                    *current = Some(Arc::from(units.as_str()));
                }
                _ => return Err(deviate_invalid("units")),
            }
        }
        for must in &deviate.musts {
            let must = self.must(must, module, module)?;
            self.store.nodes[target].musts.push(must);
        }
        for unique in &deviate.uniques {
            let unique = self.unique(target, unique, module)?;
            match &mut self.store.nodes[target].payload {
                Payload::List { uniques, .. } => uniques.push(unique),
                _ => return Err(deviate_invalid("unique")),
            }
        }
        if let Some(current) = self.choice_default(target) {
            if let Some(default) = deviate.defaults.first() {
                if current.is_some() {
                    return Err(deviate_error(
                        "Invalid deviation adding \"default\" property which already exists.",
                    ));
                }
                self.set_choice_default(target, default)?;
            }
        } else if !deviate.defaults.is_empty() {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf { dflt_src, .. } => {
                    if dflt_src.is_some() || deviate.defaults.len() > 1 {
                        return Err(deviate_error(
                            "Invalid deviation adding \"default\" property which already exists.",
                        ));
                    }
                    *dflt_src =
                        Some((Arc::from(deviate.defaults[0].as_str()), module));
                }
                Payload::LeafList { dflt_src, .. } => {
                    dflt_src.extend(
                        deviate
                            .defaults
                            .iter()
                            .map(|d| (Arc::from(d.as_str()), module)),
                    );
                }
                _ => return Err(deviate_invalid("default")),
            }
        }
        self.deviate_common(target, deviate)
    }

    fn deviate_replace(
        &mut self,
        target: usize,
        deviate: &'c ParsedDeviate,
        module: usize,
    ) -> Result<()> {
        if let Some(parsed) = &deviate.type_ {
            let scope = Scope::top(self.modules, module);
            let ty = unshare_leafrefs(&self.type_(parsed, &scope, module)?);
            match &mut self.store.nodes[target].payload {
                Payload::Leaf { ty: current, .. }
                | Payload::LeafList { ty: current, .. } => *current = ty,
                _ => return Err(deviate_invalid("type")),
            }
        }
        if let Some(units) = &deviate.units {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf {
                    units: Some(current),
                    ..
                }
                | Payload::LeafList {
                    units: Some(current),
                    ..
                } => *current = Arc::from(units.as_str()),
                _ => return Err(deviate_invalid("units")),
            }
        }
        if let Some(current) = self.choice_default(target) {
            if let Some(default) = deviate.defaults.first() {
                if current.is_none() {
                    return Err(deviate_invalid("default"));
                }
                self.set_choice_default(target, default)?;
            }
        } else if !deviate.defaults.is_empty() {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf {
                    dflt_src: dflt_src @ Some(_),
                    ..
                } => {
                    *dflt_src =
                        Some((Arc::from(deviate.defaults[0].as_str()), module));
                }
                _ => return Err(deviate_invalid("default")),
            }
        }
        self.deviate_common(target, deviate)
    }

    fn deviate_delete(
        &mut self,
        target: usize,
        deviate: &'c ParsedDeviate,
        module: usize,
    ) -> Result<()> {
        if let Some(units) = &deviate.units {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf {
                    units: current @ Some(_),
                    ..
                }
                | Payload::LeafList {
                    units: current @ Some(_),
                    ..
                } if current.as_deref() == Some(units.as_str()) => {
                    *current = None
                }
                _ => return Err(deviate_invalid("units")),
            }
        }
        for must in &deviate.musts {
            let musts = &mut self.store.nodes[target].musts;
            let len = musts.len();
            musts.retain(|m| *m.source != *must.condition);
            if musts.len() == len {
                return Err(deviate_error(format!(
                    "Invalid deviation deleting \"must\" property \"{}\" which does not match any of the target's property values.",
                    must.condition
                )));
            }
        }
        for unique in &deviate.uniques {
            let unique = self.unique(target, unique, module)?;
            match &mut self.store.nodes[target].payload {
                Payload::List { uniques, .. } => {
                    let len = uniques.len();
                    uniques.retain(|u| *u != unique);
                    if uniques.len() == len {
                        return Err(deviate_invalid("unique"));
                    }
                }
                _ => return Err(deviate_invalid("unique")),
            }
        }
        for default in &deviate.defaults {
            match &mut self.store.nodes[target].payload {
                Payload::Leaf { dflt_src, .. }
                    if dflt_src
                        .as_ref()
                        .is_some_and(|(value, _)| **value == **default) =>
                {
                    *dflt_src = None;
                }
                Payload::LeafList { dflt_src, .. }
                    if dflt_src.iter().any(|(value, _)| **value == **default) =>
                {
                    dflt_src.retain(|(value, _)| **value != **default);
                }
                Payload::Choice { default: current @ Some(_) } => {
                    *current = None;
                }
                _ => return Err(deviate_invalid("default")),
            }
        }
        Ok(())
    }

    /// Properties shared by "add" and "replace".
    fn deviate_common(
        &mut self,
        target: usize,
        deviate: &'c ParsedDeviate,
    ) -> Result<()> {
        if let Some(config) = deviate.config {
            self.set_config(target, config)?;
        }
        if let Some(mandatory) = deviate.mandatory {
            if !matches!(
                self.store.nodes[target].kind,
                SchemaNodeKind::Leaf
                    | SchemaNodeKind::Choice
                    | SchemaNodeKind::AnyData
            ) {
                return Err(deviate_invalid("mandatory"));
            }
            self.store.nodes[target]
                .flags
                .set(SchemaFlags::MANDATORY, mandatory);
        }
        if deviate.min_elements.is_some() || deviate.max_elements.is_some() {
            self.set_min_max(target, deviate.min_elements, deviate.max_elements)?;
        }
        Ok(())
    }

    // ----- node helpers -----

    fn link(&mut self, parent: usize, id: usize) -> Result<()> {
        let pnode = &self.store.nodes[parent];
        let kind = self.store.nodes[id].kind;
        let name = self.store.nodes[id].name.clone();
        let module = self.store.nodes[id].module;
        let duplicate = self
            .store
            .siblings_from(pnode.links.child)
            .chain(self.store.siblings_from(pnode.actions))
            .chain(self.store.siblings_from(pnode.notifs))
            .any(|sibling| {
                let snode = &self.store.nodes[sibling];
                snode.name == name && snode.module == module
            });
        if duplicate {
            return Err(Error::valid(
                ValidationErrorCode::Semantics,
                format!("Duplicate identifier \"{}\" of data definition/RPC/action/notification statement.", name),
            ));
        }
        let mut first = match kind {
            SchemaNodeKind::Action => pnode.actions,
            SchemaNodeKind::Notification => pnode.notifs,
            _ => pnode.links.child,
        };
        link_append(&mut self.store, &mut first, Some(parent), id);
        let pnode = &mut self.store.nodes[parent];
        match kind {
            SchemaNodeKind::Action => pnode.actions = first,
            SchemaNodeKind::Notification => pnode.notifs = first,
            _ => pnode.links.child = first,
        }
        Ok(())
    }

    /// Links a choice child, wrapping shorthand nodes in an implicit case.
    fn link_case(&mut self, choice: usize, id: usize) -> Result<()> {
        if self.store.nodes[id].kind == SchemaNodeKind::Case {
            return self.link(choice, id);
        }
        let snode = &self.store.nodes[id];
        let (module, name) = (snode.module, snode.name.clone());
        let case = self.new_node(SchemaNodeKind::Case, module, &name);
        let cnode = &self.store.nodes[choice];
        let flags = cnode.flags
            & (SUBTREE_FLAGS | SchemaFlags::CONFIG_W | SchemaFlags::CONFIG_R);
        let status = cnode.status;
        self.store.nodes[case].flags = flags;
        self.store.nodes[case].status = status;
        // Conditions of the shorthand node move to its case.
        let whens: Vec<Arc<When>> = self.store.nodes[id]
            .whens
            .iter()
            .filter(|when| when.on_parent)
            .cloned()
            .collect();
        self.store.nodes[id].whens.retain(|when| !when.on_parent);
        self.store.nodes[case].whens = whens;
        self.link(case, id)?;
        self.link(choice, case)
    }

    fn link_top(&mut self, module: usize, id: usize) {
        let schema = &self.store.modules[module];
        let kind = self.store.nodes[id].kind;
        let mut first = match kind {
            SchemaNodeKind::Rpc => schema.rpcs,
            SchemaNodeKind::Notification => schema.notifs,
            _ => schema.data,
        };
        link_append(&mut self.store, &mut first, None, id);
        let schema = &mut self.store.modules[module];
        match kind {
            SchemaNodeKind::Rpc => schema.rpcs = first,
            SchemaNodeKind::Notification => schema.notifs = first,
            _ => schema.data = first,
        }
    }

    fn unlink(&mut self, id: usize) {
        let kind = self.store.nodes[id].kind;
        match self.store.nodes[id].links.parent {
            Some(parent) => {
                let pnode = &self.store.nodes[parent];
                let mut first = match kind {
                    SchemaNodeKind::Action => pnode.actions,
                    SchemaNodeKind::Notification => pnode.notifs,
                    _ => pnode.links.child,
                };
                link_remove(&mut self.store, &mut first, id);
                let pnode = &mut self.store.nodes[parent];
                match kind {
                    SchemaNodeKind::Action => pnode.actions = first,
                    SchemaNodeKind::Notification => pnode.notifs = first,
                    _ => pnode.links.child = first,
                }
                // A case left empty by a removed shorthand node goes too.
                if self.store.nodes[parent].kind == SchemaNodeKind::Case
                    && self.store.nodes[parent].links.child.is_none()
                    && self.store.nodes[parent].name == self.store.nodes[id].name
                {
                    self.unlink(parent);
                }
            }
            None => {
                let module = self.store.nodes[id].module;
                let schema = &self.store.modules[module];
                let mut first = match kind {
                    SchemaNodeKind::Rpc => schema.rpcs,
                    SchemaNodeKind::Notification => schema.notifs,
                    _ => schema.data,
                };
                if !self.store.siblings_from(first).any(|sibling| sibling == id) {
                    return;
                }
                link_remove(&mut self.store, &mut first, id);
                let schema = &mut self.store.modules[module];
                match kind {
                    SchemaNodeKind::Rpc => schema.rpcs = first,
                    SchemaNodeKind::Notification => schema.notifs = first,
                    _ => schema.data = first,
                }
            }
        }
    }

    /// All children of a node: data nodes, actions and notifications.
    fn schema_children(&self, id: usize) -> Vec<usize> {
        let snode = &self.store.nodes[id];
        self.store
            .siblings_from(snode.links.child)
            .chain(self.store.siblings_from(snode.actions))
            .chain(self.store.siblings_from(snode.notifs))
            .collect()
    }

    fn match_child(
        &self,
        candidates: &[usize],
        module: Option<usize>,
        name: &str,
    ) -> Option<usize> {
        let mut fallback = None;
        for id in candidates {
            let snode = &self.store.nodes[*id];
            if &*snode.name != name {
                continue;
            }
            if module.map_or(true, |module| snode.module == module) {
                return Some(*id);
            }
            fallback.get_or_insert(*id);
        }
        fallback
    }

    fn segment_module(
        &self,
        segment: &NodeIdSegment,
        module: usize,
    ) -> Result<Option<usize>> {
        match &segment.prefix {
            Some(prefix) => self.prefix_module(Some(prefix), module).map(Some),
            None => Ok(None),
        }
    }

    /// Resolves a descendant schema node identifier among `roots`.
    fn descendant(
        &self,
        roots: &[usize],
        path: &str,
        module: usize,
    ) -> Result<usize> {
        let not_found = || {
            Error::valid(
                ValidationErrorCode::Reference,
                format!("Target node \"{}\" was not found.", path),
            )
        };
        let (absolute, segments) = parse_schema_nodeid(path)?;
        if absolute {
            return Err(Error::valid(
                ValidationErrorCode::Reference,
                format!("Invalid descendant-schema-nodeid value \"{}\".", path),
            ));
        }
        let mut candidates = roots.to_vec();
        let mut current = None;
        for segment in &segments {
            let smodule = self.segment_module(segment, module)?;
            let found = self
                .match_child(&candidates, smodule, &segment.name)
                .ok_or_else(not_found)?;
            candidates = self.schema_children(found);
            current = Some(found);
        }
        current.ok_or_else(not_found)
    }

    /// Resolves an absolute schema node identifier in the compiled trees.
    fn absolute_target(&self, path: &str, module: usize) -> Result<Option<usize>> {
        let (absolute, segments) = parse_schema_nodeid(path)?;
        if !absolute {
            return Err(Error::valid(
                ValidationErrorCode::Reference,
                format!("Invalid absolute-schema-nodeid value \"{}\".", path),
            ));
        }
        let mut current = None;
        for segment in &segments {
            let smodule = self.segment_module(segment, module)?;
            let candidates: Vec<usize> = match current {
                None => self
                    .store
                    .top_level(smodule.unwrap_or(module))
                    .collect(),
                Some(parent) => self.schema_children(parent),
            };
            let expected = smodule.unwrap_or(module);
            match self.match_child(&candidates, Some(expected), &segment.name) {
                Some(found) => current = Some(found),
                None => return Ok(None),
            }
        }
        Ok(current)
    }

    fn list_keys(&mut self, list: usize, key: Option<&str>) -> Result<()> {
        let Some(key) = key else {
            if self.store.nodes[list].is_config() {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    "Missing key in list representing configuration data.",
                ));
            }
            self.store.nodes[list].flags |= SchemaFlags::KEYLESS;
            return Ok(());
        };

        let mut keys = Vec::new();
        for name in key.split_whitespace() {
            let (_, name) = split_qname(name);
            let found = self
                .store
                .children(list)
                .find(|id| &*self.store.nodes[*id].name == name)
                .ok_or_else(|| {
                    Error::valid(
                        ValidationErrorCode::Reference,
                        format!("The list's key \"{}\" not found.", name),
                    )
                })?;
            let snode = &self.store.nodes[found];
            if snode.kind != SchemaNodeKind::Leaf {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    format!("Key \"{}\" is not a leaf.", name),
                ));
            }
            if keys.contains(&found) {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    format!("Duplicated key identifier \"{}\".", name),
                ));
            }
            let config_mask = SchemaFlags::CONFIG_W | SchemaFlags::CONFIG_R;
            if snode.flags & config_mask != self.store.nodes[list].flags & config_mask
            {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    format!(
                        "Key \"{}\" of the list must have the same config as the list.",
                        name
                    ),
                ));
            }
            if !snode.whens.is_empty() {
                return Err(Error::valid(
                    ValidationErrorCode::Semantics,
                    format!("List's key \"{}\" must not have any \"when\" statement.", name),
                ));
            }
            keys.push(found);
        }

        // Keys go first, in key order.
        let mut first = self.store.nodes[list].links.child;
        for key in keys.iter().rev() {
            self.store.nodes[*key].flags |= SchemaFlags::KEY;
            link_remove(&mut self.store, &mut first, *key);
            match first {
                Some(head) => link_before(&mut self.store, &mut first, head, *key),
                None => link_append(&mut self.store, &mut first, Some(list), *key),
            }
        }
        self.store.nodes[list].links.child = first;
        if let Payload::List { keys: current, .. } =
            &mut self.store.nodes[list].payload
        {
            *current = keys;
        }
        Ok(())
    }

    fn unique(&self, list: usize, unique: &str, module: usize) -> Result<Vec<usize>> {
        let mut leafs = Vec::new();
        for nodeid in unique.split_whitespace() {
            let leaf = self
                .descendant(&self.schema_children(list), nodeid, module)
                .map_err(|_| {
                    Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Invalid descendant-schema-nodeid value \"{}\" - target node not found.",
                            nodeid
                        ),
                    )
                })?;
            if self.store.nodes[leaf].kind != SchemaNodeKind::Leaf {
                return Err(Error::valid(
                    ValidationErrorCode::Reference,
                    format!(
                        "Unique's descendant-schema-nodeid \"{}\" refers to a non-leaf node.",
                        nodeid
                    ),
                ));
            }
            leafs.push(leaf);
        }
        Ok(leafs)
    }

    fn set_choice_default(&mut self, choice: usize, name: &str) -> Result<()> {
        let (_, name) = split_qname(name);
        let case = self
            .store
            .children(choice)
            .find(|id| &*self.store.nodes[*id].name == name)
            .ok_or_else(|| {
                Error::valid(
                    ValidationErrorCode::Reference,
                    format!("Default case \"{}\" not found.", name),
                )
            })?;
        if self.store.nodes[choice].flags.contains(SchemaFlags::MANDATORY) {
            return Err(Error::valid(
                ValidationErrorCode::Semantics,
                "Invalid mandatory choice with a default case.",
            ));
        }
        if let Payload::Choice { default } = &mut self.store.nodes[choice].payload {
            *default = Some(case);
        }
        Ok(())
    }

    fn replace_defaults(
        &mut self,
        target: usize,
        defaults: &[String],
        module: usize,
    ) -> Result<()> {
        let invalid = || {
            Error::valid(ValidationErrorCode::Semantics, "Invalid default.")
        };
        if self.choice_default(target).is_some() {
            if defaults.len() != 1 {
                return Err(invalid());
            }
            return self.set_choice_default(target, &defaults[0]);
        }
        match &mut self.store.nodes[target].payload {
            Payload::Leaf { dflt_src, .. } => {
                if defaults.len() != 1 {
                    return Err(invalid());
                }
                *dflt_src = Some((Arc::from(defaults[0].as_str()), module));
            }
            Payload::LeafList { dflt_src, .. } => {
                *dflt_src = defaults
                    .iter()
                    .map(|d| (Arc::from(d.as_str()), module))
                    .collect();
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }

    /// Default case of a choice; `None` when the node is not a choice.
    fn choice_default(&self, target: usize) -> Option<Option<usize>> {
        match &self.store.nodes[target].payload {
            Payload::Choice { default } => Some(*default),
            _ => None,
        }
    }

    fn set_min_max(
        &mut self,
        target: usize,
        min: Option<u32>,
        max: Option<Option<u32>>,
    ) -> Result<()> {
        let snode = &mut self.store.nodes[target];
        let (cur_min, cur_max) = match &mut snode.payload {
            Payload::List { min, max, .. } | Payload::LeafList { min, max, .. } => {
                (min, max)
            }
            _ => {
                return Err(Error::valid(
                    ValidationErrorCode::Reference,
                    "Invalid min-elements or max-elements target.",
                ))
            }
        };
        if let Some(min) = min {
            *cur_min = min;
        }
        if let Some(max) = max {
            *cur_max = max;
        }
        check_min_max(*cur_min, *cur_max)?;
        let mandatory = *cur_min > 0;
        snode.flags.set(SchemaFlags::MANDATORY, mandatory);
        Ok(())
    }

    fn set_config(&mut self, target: usize, config: bool) -> Result<()> {
        let snode = &self.store.nodes[target];
        if snode.flags.intersects(
            SchemaFlags::IN_INPUT | SchemaFlags::IN_OUTPUT | SchemaFlags::IN_NOTIF,
        ) {
            return Err(Error::valid(
                ValidationErrorCode::Semantics,
                "Invalid config inside an operation or notification.",
            ));
        }
        if config {
            if let Some(parent) = snode.links.parent {
                if self.store.nodes[parent].flags.contains(SchemaFlags::CONFIG_R) {
                    return Err(Error::valid(
                        ValidationErrorCode::Semantics,
                        "Configuration node cannot be child of any state data node.",
                    ));
                }
            }
        }
        let mut stack = vec![target];
        while let Some(id) = stack.pop() {
            let snode = &mut self.store.nodes[id];
            if id == target || !config {
                snode.flags.remove(SchemaFlags::CONFIG_W | SchemaFlags::CONFIG_R);
                snode.flags |= if config {
                    SchemaFlags::CONFIG_W
                } else {
                    SchemaFlags::CONFIG_R
                };
            }
            if !config {
                stack.extend(self.store.children(id));
            }
        }
        Ok(())
    }

    fn set_subtree_flag(&mut self, target: usize, flag: SchemaFlags) {
        let mut stack = vec![target];
        while let Some(id) = stack.pop() {
            self.store.nodes[id].flags |= flag;
            stack.extend(self.schema_children(id));
        }
    }

    // ----- finalization -----

    /// Nodes reachable from the compiled module trees, in DFS order.
    fn reachable(&self) -> Vec<usize> {
        let mut out = Vec::new();
        for module in 0..self.modules.len() {
            let mut stack: Vec<usize> = self.store.top_level(module).collect();
            stack.reverse();
            while let Some(id) = stack.pop() {
                out.push(id);
                let mut children = self.schema_children(id);
                children.reverse();
                stack.extend(children);
            }
        }
        out
    }

    fn number_nodes(&mut self) {
        for (order, id) in self.reachable().into_iter().enumerate() {
            self.store.nodes[id].order = order as u32;
        }
    }

    fn resolve_leafrefs(&self, id: usize) -> Result<()> {
        let Some(ty) = self.store.nodes[id].leaf_type() else {
            return Ok(());
        };
        self.resolve_type(id, ty, &mut vec![id])
    }

    fn resolve_type(
        &self,
        id: usize,
        ty: &Arc<CompiledType>,
        visiting: &mut Vec<usize>,
    ) -> Result<()> {
        match ty.base {
            DataValueType::Union => {
                for member in &ty.types {
                    self.resolve_type(id, member, visiting)?;
                }
                Ok(())
            }
            DataValueType::LeafRef if ty.realtype.get().is_none() => {
                let path = ty.path.as_ref().ok_or_else(|| {
                    type_error("Missing path substatement for leafref type.")
                })?;
                let target = self.leafref_target(id, path)?;
                let target_ty = self.store.nodes[target]
                    .leaf_type()
                    .cloned()
                    .ok_or_else(|| {
                        Error::valid(
                            ValidationErrorCode::Reference,
                            format!(
                                "Invalid leafref path \"{}\" - target node is {} instead of leaf or leaf-list.",
                                path.source,
                                kind_name(self.store.nodes[target].kind)
                            ),
                        )
                    })?;
                if visiting.contains(&target) {
                    return Err(Error::valid(
                        ValidationErrorCode::Reference,
                        format!(
                            "Invalid leafref path \"{}\" - circular chain of leafrefs detected.",
                            path.source
                        ),
                    ));
                }
                visiting.push(target);
                self.resolve_type(target, &target_ty, visiting)?;
                visiting.pop();
                let real = match target_ty.base {
                    DataValueType::LeafRef => {
                        target_ty.realtype.get().cloned().ok_or_else(|| {
                            type_error("Unresolved leafref target type.")
                        })?
                    }
                    _ => target_ty,
                };
                let _ = ty.realtype.set(real);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Walks a leafref path through the schema; predicates are not checked.
    fn leafref_target(&self, id: usize, path: &LeafrefPath) -> Result<usize> {
        let invalid = |msg: &str| {
            Error::valid(
                ValidationErrorCode::Reference,
                format!("Invalid leafref path \"{}\" - {}.", path.source, msg),
            )
        };
        let Expr::Path(location) = &*path.expr else {
            return Err(invalid("not a location path"));
        };
        let mut current = if location.absolute { None } else { Some(id) };
        for step in &location.steps {
            match step.axis {
                Axis::Parent => {
                    let node = current.ok_or_else(|| {
                        invalid("too many \"..\" in the path")
                    })?;
                    current = self.store.data_parent(node);
                }
                Axis::SelfNode => (),
                Axis::Child => {
                    let NodeTest::Name(qname) = &step.test else {
                        return Err(invalid("unsupported node test"));
                    };
                    let module = qname.module.unwrap_or(path.module);
                    let found = self
                        .store
                        .find_data_child(current, module, &qname.name)
                        .ok_or_else(|| invalid("target node not found"))?;
                    current = Some(found);
                }
                _ => return Err(invalid("unsupported axis")),
            }
        }
        current.ok_or_else(|| invalid("no target node"))
    }

    fn store_defaults(&mut self, id: usize) -> Result<()> {
        let snode = &self.store.nodes[id];
        let implicit = !snode
            .flags
            .intersects(SchemaFlags::KEY | SchemaFlags::MANDATORY);
        match &snode.payload {
            Payload::Leaf { ty, dflt_src, .. } => {
                if dflt_src.is_some()
                    && snode.flags.contains(SchemaFlags::MANDATORY)
                {
                    return Err(Error::valid(
                        ValidationErrorCode::Semantics,
                        format!(
                            "Invalid mandatory leaf \"{}\" with a default value.",
                            snode.name
                        ),
                    ));
                }
                let src = match dflt_src {
                    Some(src) => Some(src.clone()),
                    None if implicit => ty.default.clone(),
                    None => None,
                };
                let Some((text, module)) = src else {
                    return Ok(());
                };
                let ty = ty.clone();
                let value = self.default_value(&ty, &text, module, id)?;
                let snode = &mut self.store.nodes[id];
                snode.flags |= SchemaFlags::SET_DFLT;
                if let Payload::Leaf { default, .. } = &mut snode.payload {
                    *default = Some(value);
                }
            }
            Payload::LeafList { ty, dflt_src, min, .. } => {
                let mut src = dflt_src.clone();
                if src.is_empty() && *min == 0 {
                    src.extend(ty.default.clone());
                }
                if src.is_empty() {
                    return Ok(());
                }
                let ty = ty.clone();
                let mut values = Vec::new();
                for (text, module) in src {
                    values.push(self.default_value(&ty, &text, module, id)?);
                }
                let snode = &mut self.store.nodes[id];
                snode.flags |= SchemaFlags::SET_DFLT;
                if let Payload::LeafList { defaults, .. } = &mut snode.payload {
                    *defaults = values;
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn default_value(
        &self,
        ty: &Arc<CompiledType>,
        text: &str,
        module: usize,
        id: usize,
    ) -> Result<Value> {
        let env = ValueEnv {
            modules: self.modules,
            store: &self.store,
            prefixes: Prefixes::Schema(module),
            module,
            encoding: Encoding::Text,
        };
        store_value(ty, text, &env).map_err(|error| {
            Error::valid(
                ValidationErrorCode::Data,
                format!(
                    "Invalid default - value \"{}\" does not fit the type ({}).",
                    text, error.msg
                ),
            )
            .with_schema_path(self.store.schema_path(
                self.modules,
                id,
                crate::schema::SchemaPathFormat::LOG,
            ))
        })
    }
}

// ===== helper functions =====

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, name),
    }
}

fn type_error(msg: impl Into<String>) -> Error {
    Error::valid(ValidationErrorCode::Semantics, msg)
}

fn refine_error(target: &str, property: &str) -> Error {
    Error::valid(
        ValidationErrorCode::Semantics,
        format!(
            "Invalid refine of \"{}\" - {} cannot be refined on this node.",
            target, property
        ),
    )
}

fn deviate_error(msg: impl Into<String>) -> Error {
    Error::valid(ValidationErrorCode::Semantics, msg)
}

fn deviate_invalid(property: &str) -> Error {
    deviate_error(format!(
        "Invalid deviation of \"{}\" property for the target node.",
        property
    ))
}

fn check_min_max(min: u32, max: Option<u32>) -> Result<()> {
    match max {
        Some(max) if max < min => Err(Error::valid(
            ValidationErrorCode::Semantics,
            format!(
                "Invalid combination of min-elements ({}) and max-elements ({}).",
                min, max
            ),
        )),
        _ => Ok(()),
    }
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Current => "current",
        Status::Deprecated => "deprecated",
        Status::Obsolete => "obsolete",
    }
}

fn kind_name(kind: SchemaNodeKind) -> &'static str {
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

fn contains_leafref(ty: &CompiledType) -> bool {
    match ty.base {
        DataValueType::LeafRef => true,
        DataValueType::Union => ty.types.iter().any(|t| contains_leafref(t)),
        _ => false,
    }
}

/// Leafref types resolve per node, so they are never shared.
fn unshare_leafrefs(ty: &Arc<CompiledType>) -> Arc<CompiledType> {
    match ty.base {
        DataValueType::LeafRef => {
            let mut copy = (**ty).clone();
            copy.realtype = OnceLock::new();
            Arc::new(copy)
        }
        DataValueType::Union if contains_leafref(ty) => {
            let mut copy = (**ty).clone();
            copy.types = copy.types.iter().map(unshare_leafrefs).collect();
            Arc::new(copy)
        }
        _ => ty.clone(),
    }
}

/// Collects the `md:annotation` definitions of all modules.
fn collect_annotations(
    modules: &[ModuleEntry],
    errors: &mut Vec<Error>,
) -> Vec<AnnotationDef> {
    let mut out = Vec::new();
    for (module, entry) in modules.iter().enumerate() {
        for ext in &entry.parsed.exts {
            let Some(target) = entry.module_by_prefix(module, &ext.prefix) else {
                continue;
            };
            if &*modules[target].name != "ietf-yang-metadata"
                || ext.name != "annotation"
            {
                continue;
            }
            let (Some(name), Some(stmt)) =
                (&ext.arg, ext.substmts.iter().find(|s| s.keyword == "type"))
            else {
                continue;
            };
            match build_type(stmt, entry.format) {
                Ok(ty) => out.push(AnnotationDef {
                    module,
                    name: name.clone(),
                    ty,
                }),
                Err(error) => errors.push(error),
            }
        }
    }
    out
}

/// Compiles the implemented modules of the context.
///
/// Returns the new schema along with every error met; modules that failed
/// are not marked as compiled.
pub(crate) fn compile(context: &Context) -> (SchemaStore, Vec<Error>) {
    let mut errors = Vec::new();
    let annotations = collect_annotations(&context.modules, &mut errors);
    let mut compiler = Compiler::new(context);
    compiler.errors = errors;
    compiler.run(&annotations);
    (compiler.store, compiler.errors)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextFlags;
    use crate::schema::SchemaInputFormat;
    use crate::utils::siblings_consistent;

    const MODULE: &str = r#"module t {
      namespace "urn:t";
      prefix t;

      feature f1;
      feature f2 { if-feature f1; }

      typedef ref { type leafref { path "../name"; } }

      grouping g {
        leaf x {
          when "../enabled = 'true'";
          type string;
        }
      }

      container a {
        leaf enabled { type boolean; }
        leaf name { type string; }
        leaf r { type ref; }
        uses g;
      }
      container b {
        leaf enabled { type boolean; }
        leaf name { type uint8; }
        leaf r { type ref; }
        uses g;
        leaf gated { if-feature "f1 and f2"; type string; }
      }
      list l {
        key "k2 k1";
        leaf v { type string; }
        leaf k1 { type string; }
        leaf k2 { type int8; }
      }
    }"#;

    fn context(features: &[&str]) -> Context {
        let mut ctx = Context::new(ContextFlags::NO_YANGLIBRARY).unwrap();
        ctx.parse_module_str(MODULE, SchemaInputFormat::YANG, features)
            .unwrap();
        ctx
    }

    #[test]
    fn feature_expressions() {
        assert!(FeatureParser::parse("a and (b or not c)").is_ok());
        assert!(FeatureParser::parse("a and").is_err());
        assert!(FeatureParser::parse("(a").is_err());
        assert!(FeatureParser::parse("a b").is_err());
    }

    #[test]
    fn grouping_when_is_shared() {
        let ctx = context(&[]);
        let xa = ctx.find_path("/t:a/x").unwrap();
        let xb = ctx.find_path("/t:b/x").unwrap();
        let wa = xa.whens().next().unwrap();
        let wb = xb.whens().next().unwrap();
        assert!(wa.shares_condition(&wb));
    }

    #[test]
    fn leafref_typedef_resolves_per_node() {
        let ctx = context(&[]);
        let ra = ctx.find_path("/t:a/r").unwrap();
        let rb = ctx.find_path("/t:b/r").unwrap();
        let real = |node: &crate::schema::SchemaNode<'_>| {
            node.leaf_type()
                .and_then(|ty| ty.leafref_real_type())
                .map(|ty| ty.base_type())
        };
        assert_eq!(real(&ra), Some(DataValueType::String));
        assert_eq!(real(&rb), Some(DataValueType::Uint8));
    }

    #[test]
    fn keys_come_first() {
        let ctx = context(&[]);
        let list = ctx.find_path("/t:l").unwrap();
        let names: Vec<&str> = list.children().map(|c| c.name()).collect();
        assert_eq!(names, vec!["k2", "k1", "v"]);
        assert!(list.children().take(2).all(|c| c.is_list_key()));
    }

    #[test]
    fn sibling_lists_are_consistent() {
        let ctx = context(&["f1", "f2"]);
        let store = &ctx.schema;
        for schema in &store.modules {
            for first in [schema.data, schema.rpcs, schema.notifs] {
                assert!(siblings_consistent(store, first));
            }
        }
        for snode in &store.nodes {
            assert!(siblings_consistent(store, snode.links.child));
            assert!(siblings_consistent(store, snode.actions));
            assert!(siblings_consistent(store, snode.notifs));
        }
    }

    #[test]
    fn feature_dependencies() {
        assert!(context(&["f2"]).find_path("/t:b/gated").is_err());
        assert!(context(&["f1", "f2"]).find_path("/t:b/gated").is_ok());
    }
}
