//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Data tree validation and implicit nodes.

use std::collections::HashMap;

use crate::context::Context;
use crate::data::{
    DataImplicitFlags, DataTree, DataValidationFlags, NodeFlags, NodeValue,
    ValidationState,
};
use crate::error::{Error, ErrorCode, Result, ValidationErrorCode};
use crate::schema::{DataValueType, Payload, SchemaFlags, SchemaNodeKind, When};
use crate::xpath::eval::{DataEval, Item, PrefixMode};

/// Maximum number of implicit node and "when" evaluation rounds.
const WHEN_MAX_ITERATIONS: usize = 32;

/// Errors found by a validation run.
struct Report {
    multi: bool,
    errors: Vec<Error>,
}

// ===== impl Report =====

impl Report {
    fn push(&mut self, error: Error) -> Result<()> {
        if self.multi {
            self.errors.push(error);
            Ok(())
        } else {
            Err(error)
        }
    }
}

// ===== impl DataTree =====

impl<'a> DataTree<'a> {
    /// Fully validate the data tree.
    pub fn validate(&mut self, options: DataValidationFlags) -> Result<()> {
        self.validate_all(options, false)
            .map_err(|error| self.context.log_error(error))
    }

    /// Validates the tree. Nodes with a false "when" condition are
    /// reported when coming from a parser and silently removed otherwise.
    ///
    /// With `MULTI_ERROR` every error is logged and the first one returned.
    pub(crate) fn validate_all(
        &mut self,
        options: DataValidationFlags,
        from_parse: bool,
    ) -> Result<()> {
        let context: &'a Context = self.context;
        context.check_compiled()?;
        let modules = self.validated_modules(options);
        let mut report = Report {
            multi: options.contains(DataValidationFlags::MULTI_ERROR),
            errors: Vec::new(),
        };
        let result = self.run_validation(&modules, options, from_parse, &mut report);
        let mut errors = report.errors;
        if let Err(error) = result {
            errors.push(error);
        }
        if errors.is_empty() {
            for dnode in self.nodes.iter_mut().filter(|dnode| dnode.alive) {
                dnode.state = ValidationState::Clean;
                dnode.flags.remove(NodeFlags::NEW);
            }
            return Ok(());
        }
        let first = errors.remove(0);
        for error in errors {
            context.log_error(error);
        }
        Err(first)
    }

    /// Add any missing implicit nodes (non-presence containers and default
    /// leaves and leaf-lists) to the data tree.
    pub fn add_implicit(&mut self, options: DataImplicitFlags) -> Result<()> {
        let modules = self.validated_modules(DataValidationFlags::empty());
        self.add_implicit_under(None, &modules, options)
            .map(|_| ())
            .map_err(|error| self.context.log_error(error))
    }

    fn run_validation(
        &mut self,
        modules: &[usize],
        options: DataValidationFlags,
        from_parse: bool,
        report: &mut Report,
    ) -> Result<()> {
        log::trace!("validating data tree ({} modules)", modules.len());
        self.resolve_choices(None, from_parse, report)?;

        let mut implicit = DataImplicitFlags::empty();
        if options.contains(DataValidationFlags::NO_STATE) {
            implicit |= DataImplicitFlags::NO_STATE;
        }
        let mut converged = false;
        for _ in 0..WHEN_MAX_ITERATIONS {
            let added = self.add_implicit_under(None, modules, implicit)?;
            let removed = self.evaluate_whens(from_parse, report)?;
            if added == 0 && removed == 0 {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(Error::new(
                ErrorCode::Incomplete,
                "Evaluation of \"when\" conditions does not converge.",
            ));
        }
        self.set_states(ValidationState::DefaultsApplied);

        self.check_structure(None, modules, options, report)?;
        self.set_states(ValidationState::StructurallyValid);
        self.check_musts(report)?;
        self.check_references(report)
    }

    fn set_states(&mut self, state: ValidationState) {
        for dnode in self.nodes.iter_mut().filter(|dnode| dnode.alive) {
            dnode.state = state;
        }
    }

    // Implemented modules, or only those with data in the tree.
    fn validated_modules(&self, options: DataValidationFlags) -> Vec<usize> {
        let context = self.context;
        if options.contains(DataValidationFlags::PRESENT) {
            let mut modules = Vec::new();
            for id in self.child_ids(None) {
                if let Some(snode) = self.snode(id) {
                    if !modules.contains(&snode.module) {
                        modules.push(snode.module);
                    }
                }
            }
            modules
        } else {
            (0..context.modules.len())
                .filter(|module| context.modules[*module].implemented)
                .collect()
        }
    }

    // Nodes in document order.
    fn preorder(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.child_ids(None).into_iter().rev().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.child_ids(Some(id)).into_iter().rev());
        }
        out
    }

    // Schema children whose instances are siblings under `parent`.
    fn schema_children(&self, parent: Option<usize>, modules: &[usize], output: bool) -> Vec<usize> {
        let store = &self.context.schema;
        match parent.map(|p| self.nodes[p].schema) {
            None => modules
                .iter()
                .flat_map(|module| store.top_level(*module))
                .filter(|id| {
                    !matches!(
                        store.nodes[*id].kind,
                        SchemaNodeKind::Rpc | SchemaNodeKind::Notification
                    )
                })
                .collect(),
            Some(None) => Vec::new(),
            Some(Some(schema)) => match store.nodes[schema].kind {
                SchemaNodeKind::Container | SchemaNodeKind::List | SchemaNodeKind::Notification => {
                    store.children(schema).collect()
                }
                SchemaNodeKind::Rpc | SchemaNodeKind::Action => {
                    let wanted = if output {
                        SchemaNodeKind::Output
                    } else {
                        SchemaNodeKind::Input
                    };
                    store
                        .children(schema)
                        .filter(|id| store.nodes[*id].kind == wanted)
                        .flat_map(|id| store.children(id))
                        .collect()
                }
                _ => Vec::new(),
            },
        }
    }

    // ----- implicit nodes -----

    fn add_implicit_under(
        &mut self,
        parent: Option<usize>,
        modules: &[usize],
        options: DataImplicitFlags,
    ) -> Result<usize> {
        let output = options.contains(DataImplicitFlags::OUTPUT);
        let mut count = 0;
        for schema in self.schema_children(parent, modules, output) {
            self.implicit_schema(parent, schema, options, &mut count)?;
        }
        for child in self.child_ids(parent) {
            if self.nodes[child].alive && matches!(self.nodes[child].value, NodeValue::Inner) {
                count += self.add_implicit_under(Some(child), modules, options)?;
            }
        }
        Ok(count)
    }

    fn implicit_schema(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        options: DataImplicitFlags,
        count: &mut usize,
    ) -> Result<()> {
        let context: &'a Context = self.context;
        let snode = &context.schema.nodes[schema];
        if snode.flags.contains(SchemaFlags::DISABLED)
            || options.contains(DataImplicitFlags::NO_STATE)
                && snode.flags.contains(SchemaFlags::CONFIG_R)
            || options.contains(DataImplicitFlags::NO_CONFIG)
                && snode.flags.contains(SchemaFlags::CONFIG_W)
        {
            return Ok(());
        }
        let no_defaults = options.contains(DataImplicitFlags::NO_DEFAULTS);
        match (&snode.kind, &snode.payload) {
            (SchemaNodeKind::Choice, Payload::Choice { default }) => {
                if let Some(case) = self.active_case(parent, schema).or(*default) {
                    for child in context.schema.children(case) {
                        self.implicit_schema(parent, child, options, count)?;
                    }
                }
            }
            (SchemaNodeKind::Case, _) => {
                for child in context.schema.children(schema) {
                    self.implicit_schema(parent, child, options, count)?;
                }
            }
            (SchemaNodeKind::Container, Payload::Container { presence: None }) => {
                if self.instances(parent, schema).is_empty()
                    && self.create_implicit(parent, schema, NodeValue::Inner)?
                {
                    *count += 1;
                }
            }
            (SchemaNodeKind::Leaf, Payload::Leaf { default: Some(value), .. }) if !no_defaults => {
                if self.instances(parent, schema).is_empty()
                    && self.create_implicit(parent, schema, NodeValue::Term(value.clone()))?
                {
                    *count += 1;
                }
            }
            (SchemaNodeKind::LeafList, Payload::LeafList { defaults, .. }) if !no_defaults => {
                if self.instances(parent, schema).is_empty() {
                    for value in defaults {
                        if self.create_implicit(parent, schema, NodeValue::Term(value.clone()))? {
                            *count += 1;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    // Adds an implicit node unless its "when" conditions are false.
    fn create_implicit(
        &mut self,
        parent: Option<usize>,
        schema: usize,
        value: NodeValue,
    ) -> Result<bool> {
        let id = self.alloc(Some(schema), value);
        self.nodes[id].flags.insert(NodeFlags::DEFAULT);
        self.link_child(parent, id);
        self.rehash(id);
        if self.whens_hold(id)? {
            self.nodes[id].flags.insert(NodeFlags::WHEN_TRUE);
            Ok(true)
        } else {
            self.free_node(id);
            Ok(false)
        }
    }

    // ----- when -----

    // Conditions of the node and of its enclosing choices and cases.
    fn effective_whens(&self, schema: usize) -> Vec<&'a When> {
        let context: &'a Context = self.context;
        let store = &context.schema;
        let mut whens: Vec<&'a When> = store.nodes[schema].whens.iter().map(|w| &**w).collect();
        let mut parent = store.nodes[schema].links.parent;
        while let Some(p) = parent {
            if store.nodes[p].is_data() {
                break;
            }
            whens.extend(store.nodes[p].whens.iter().map(|w| &**w));
            parent = store.nodes[p].links.parent;
        }
        whens
    }

    fn eval_when(&self, when: &When, context_node: Item) -> Result<bool> {
        DataEval::new(self, context_node, when.module, PrefixMode::Schema)
            .eval_bool(&when.cond, context_node)
    }

    fn parent_item(&self, parent: Option<usize>) -> Item {
        match parent {
            Some(parent) => Item::Node(parent),
            None => Item::Root,
        }
    }

    fn whens_hold(&self, id: usize) -> Result<bool> {
        let Some(schema) = self.nodes[id].schema else {
            return Ok(true);
        };
        for when in self.effective_whens(schema) {
            let context_node = if when.on_parent {
                self.parent_item(self.nodes[id].links.parent)
            } else {
                Item::Node(id)
            };
            if !self.eval_when(when, context_node)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // Whether an absent node would exist. Conditions on the node itself
    // can't be evaluated, so such nodes are considered absent.
    fn absent_whens_hold(&self, parent: Option<usize>, schema: usize) -> Result<bool> {
        for when in self.effective_whens(schema) {
            if !when.on_parent || !self.eval_when(when, self.parent_item(parent))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // Returns the number of removed nodes.
    fn evaluate_whens(&mut self, from_parse: bool, report: &mut Report) -> Result<usize> {
        let mut removed = 0;
        for id in self.preorder() {
            if !self.nodes[id].alive {
                continue;
            }
            let Some(schema) = self.nodes[id].schema else {
                continue;
            };
            let whens = self.effective_whens(schema);
            if whens.is_empty() {
                continue;
            }
            if self.whens_hold(id)? {
                self.nodes[id].flags.insert(NodeFlags::WHEN_TRUE);
                continue;
            }
            self.nodes[id].flags.remove(NodeFlags::WHEN_TRUE);
            if !self.nodes[id].flags.contains(NodeFlags::DEFAULT) {
                let path = self.node_path(id);
                if from_parse {
                    let source = whens
                        .iter()
                        .find(|when| {
                            let context_node = if when.on_parent {
                                self.parent_item(self.nodes[id].links.parent)
                            } else {
                                Item::Node(id)
                            };
                            !self.eval_when(when, context_node).unwrap_or(false)
                        })
                        .map(|when| when.source.to_string())
                        .unwrap_or_default();
                    report.push(
                        Error::valid(
                            ValidationErrorCode::Data,
                            format!("When condition \"{}\" not satisfied.", source),
                        )
                        .with_path(path),
                    )?;
                } else {
                    log::debug!("removing {}: \"when\" condition is false", path);
                }
            }
            self.free_node(id);
            removed += 1;
        }
        Ok(removed)
    }

    // ----- choices -----

    // (choice, case) pairs enclosing a data node up to its data parent.
    fn case_chain(&self, schema: usize) -> Vec<(usize, usize)> {
        let store = &self.context.schema;
        let mut chain = Vec::new();
        let mut id = schema;
        while let Some(parent) = store.nodes[id].links.parent {
            match store.nodes[parent].kind {
                SchemaNodeKind::Case => {
                    if let Some(choice) = store.nodes[parent].links.parent {
                        chain.push((choice, parent));
                    }
                }
                SchemaNodeKind::Choice => {}
                _ => break,
            }
            id = parent;
        }
        chain
    }

    // Case of `choice` holding data under `parent`.
    fn active_case(&self, parent: Option<usize>, choice: usize) -> Option<usize> {
        self.child_ids(parent).into_iter().find_map(|id| {
            let schema = self.nodes[id].schema?;
            self.case_chain(schema)
                .into_iter()
                .find(|(c, _)| *c == choice)
                .map(|(_, case)| case)
        })
    }

    fn resolve_choices(
        &mut self,
        parent: Option<usize>,
        from_parse: bool,
        report: &mut Report,
    ) -> Result<()> {
        let children = self.child_ids(parent);
        let mut choices: Vec<(usize, Vec<(usize, Vec<usize>)>)> = Vec::new();
        for id in &children {
            let Some(schema) = self.nodes[*id].schema else {
                continue;
            };
            for (choice, case) in self.case_chain(schema) {
                let index = match choices.iter().position(|(c, _)| *c == choice) {
                    Some(index) => index,
                    None => {
                        choices.push((choice, Vec::new()));
                        choices.len() - 1
                    }
                };
                let cases = &mut choices[index].1;
                match cases.iter_mut().find(|(c, _)| *c == case) {
                    Some((_, ids)) => ids.push(*id),
                    None => cases.push((case, vec![*id])),
                }
            }
        }

        for (_, cases) in choices.iter().filter(|(_, cases)| cases.len() > 1) {
            let with_flag = |flag: NodeFlags, negate: bool| -> Vec<usize> {
                cases
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, ids))| {
                        ids.iter()
                            .any(|id| self.nodes[*id].flags.contains(flag) != negate)
                    })
                    .map(|(index, _)| index)
                    .collect()
            };
            let explicit = with_flag(NodeFlags::DEFAULT, true);
            let winner = match explicit.len() {
                0 => Some(0),
                1 => Some(explicit[0]),
                _ if from_parse => None,
                _ => {
                    let fresh: Vec<usize> = with_flag(NodeFlags::NEW, false)
                        .into_iter()
                        .filter(|index| explicit.contains(index))
                        .collect();
                    (fresh.len() == 1).then(|| fresh[0])
                }
            };
            match winner {
                Some(winner) => {
                    for (index, (_, ids)) in cases.iter().enumerate() {
                        if index == winner {
                            continue;
                        }
                        for id in ids {
                            if self.nodes[*id].alive {
                                self.free_node(*id);
                            }
                        }
                    }
                }
                None => {
                    let store = &self.context.schema;
                    let path = parent.map(|p| self.node_path(p)).unwrap_or_else(|| "/".to_owned());
                    report.push(
                        Error::valid(
                            ValidationErrorCode::Data,
                            format!(
                                "Data for both cases \"{}\" and \"{}\" exist.",
                                store.nodes[cases[explicit[0]].0].name,
                                store.nodes[cases[explicit[1]].0].name
                            ),
                        )
                        .with_path(path),
                    )?;
                }
            }
        }

        for id in children {
            if self.nodes[id].alive && self.nodes[id].links.child.is_some() {
                self.resolve_choices(Some(id), from_parse, report)?;
            }
        }
        Ok(())
    }

    // ----- structure -----

    fn check_structure(
        &self,
        parent: Option<usize>,
        modules: &[usize],
        options: DataValidationFlags,
        report: &mut Report,
    ) -> Result<()> {
        let children = self.child_ids(parent);
        let no_state = options.contains(DataValidationFlags::NO_STATE);
        for id in &children {
            let Some(snode) = self.snode(*id) else {
                continue;
            };
            if snode.flags.contains(SchemaFlags::DISABLED) {
                report.push(
                    Error::valid(
                        ValidationErrorCode::Data,
                        format!("Data are disabled by \"{}\" schema node if-feature.", snode.name),
                    )
                    .with_path(self.node_path(*id)),
                )?;
            }
            if no_state && snode.flags.contains(SchemaFlags::CONFIG_R) {
                report.push(
                    Error::valid(
                        ValidationErrorCode::Data,
                        format!("Unexpected data state node \"{}\" found.", snode.name),
                    )
                    .with_path(self.node_path(*id)),
                )?;
            }
        }
        self.check_duplicates(&children, report)?;

        let operation = parent
            .and_then(|p| self.snode(p))
            .is_some_and(|snode| matches!(snode.kind, SchemaNodeKind::Rpc | SchemaNodeKind::Action));
        if !operation {
            for schema in self.schema_children(parent, modules, false) {
                self.check_schema_node(parent, schema, options, report)?;
            }
        }

        for id in children {
            if self.nodes[id].schema.is_some() && matches!(self.nodes[id].value, NodeValue::Inner) {
                self.check_structure(Some(id), modules, options, report)?;
            }
        }
        Ok(())
    }

    fn check_duplicates(&self, children: &[usize], report: &mut Report) -> Result<()> {
        let mut seen: HashMap<u64, Vec<usize>> = HashMap::new();
        for id in children {
            let Some(snode) = self.snode(*id) else {
                continue;
            };
            let multiple = match snode.kind {
                SchemaNodeKind::List => snode.flags.contains(SchemaFlags::KEYLESS),
                SchemaNodeKind::LeafList => !snode.is_config(),
                _ => false,
            };
            if multiple {
                continue;
            }
            let bucket = seen.entry(self.nodes[*id].hash).or_default();
            let duplicate = bucket.iter().any(|other| {
                self.nodes[*other].schema == self.nodes[*id].schema
                    && match snode.kind {
                        SchemaNodeKind::List => self.key_values(*other) == self.key_values(*id),
                        SchemaNodeKind::LeafList => self.canonical(*other) == self.canonical(*id),
                        _ => true,
                    }
            });
            if duplicate {
                report.push(
                    Error::valid(
                        ValidationErrorCode::Data,
                        format!("Duplicate instance of \"{}\".", snode.name),
                    )
                    .with_path(self.node_path(*id)),
                )?;
            } else {
                bucket.push(*id);
            }
        }
        Ok(())
    }

    fn check_schema_node(
        &self,
        parent: Option<usize>,
        schema: usize,
        options: DataValidationFlags,
        report: &mut Report,
    ) -> Result<()> {
        let context: &'a Context = self.context;
        let snode = &context.schema.nodes[schema];
        if snode.flags.contains(SchemaFlags::DISABLED)
            || options.contains(DataValidationFlags::NO_STATE)
                && snode.flags.contains(SchemaFlags::CONFIG_R)
        {
            return Ok(());
        }
        let mandatory = snode.flags.contains(SchemaFlags::MANDATORY);
        match (&snode.kind, &snode.payload) {
            (SchemaNodeKind::Choice, _) => match self.active_case(parent, schema) {
                Some(case) => {
                    for child in context.schema.children(case) {
                        self.check_schema_node(parent, child, options, report)?;
                    }
                }
                None if mandatory && self.absent_whens_hold(parent, schema)? => {
                    report.push(
                        Error::valid(
                            ValidationErrorCode::Data,
                            format!("Mandatory choice \"{}\" data do not exist.", snode.name),
                        )
                        .with_path(self.child_path(parent, schema)),
                    )?;
                }
                None => {}
            },
            (SchemaNodeKind::Case, _) => {
                for child in context.schema.children(schema) {
                    self.check_schema_node(parent, child, options, report)?;
                }
            }
            (SchemaNodeKind::Leaf | SchemaNodeKind::AnyData | SchemaNodeKind::Container, _)
                if mandatory =>
            {
                if self.instances(parent, schema).is_empty()
                    && self.absent_whens_hold(parent, schema)?
                {
                    report.push(
                        Error::valid(
                            ValidationErrorCode::Data,
                            format!("Mandatory node \"{}\" instance does not exist.", snode.name),
                        )
                        .with_path(self.child_path(parent, schema)),
                    )?;
                }
            }
            (SchemaNodeKind::List, Payload::List { uniques, min, max, .. }) => {
                let instances = self.instances(parent, schema);
                self.check_elements(parent, schema, instances.len(), *min, *max, report)?;
                for unique in uniques {
                    self.check_unique(&instances, unique, report)?;
                }
            }
            (SchemaNodeKind::LeafList, Payload::LeafList { min, max, .. }) => {
                let count = self.instances(parent, schema).len();
                self.check_elements(parent, schema, count, *min, *max, report)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn check_elements(
        &self,
        parent: Option<usize>,
        schema: usize,
        count: usize,
        min: u32,
        max: Option<u32>,
        report: &mut Report,
    ) -> Result<()> {
        let name = &self.context.schema.nodes[schema].name;
        if count < min as usize && (count > 0 || self.absent_whens_hold(parent, schema)?) {
            report.push(
                Error::valid(ValidationErrorCode::Data, format!("Too few \"{}\" instances.", name))
                    .with_path(self.child_path(parent, schema))
                    .with_apptag(Some("too-few-elements".to_owned())),
            )?;
        }
        if max.is_some_and(|max| count > max as usize) {
            report.push(
                Error::valid(ValidationErrorCode::Data, format!("Too many \"{}\" instances.", name))
                    .with_path(self.child_path(parent, schema))
                    .with_apptag(Some("too-many-elements".to_owned())),
            )?;
        }
        Ok(())
    }

    fn check_unique(&self, instances: &[usize], unique: &[usize], report: &mut Report) -> Result<()> {
        let mut seen: Vec<(usize, Vec<&str>)> = Vec::new();
        for id in instances {
            let values: Option<Vec<&str>> = unique
                .iter()
                .map(|leaf| self.descendant_value(*id, *leaf))
                .collect();
            // Instances missing any of the leaves are not constrained.
            let Some(values) = values else {
                continue;
            };
            match seen.iter().find(|(_, other)| *other == values) {
                Some((other, _)) => {
                    let names: Vec<&str> = unique
                        .iter()
                        .map(|leaf| &*self.context.schema.nodes[*leaf].name)
                        .collect();
                    report.push(
                        Error::valid(
                            ValidationErrorCode::Data,
                            format!(
                                "Unique data leaf(s) \"{}\" not satisfied in \"{}\" and \"{}\".",
                                names.join(" "),
                                self.node_path(*other),
                                self.node_path(*id)
                            ),
                        )
                        .with_path(self.node_path(*id))
                        .with_apptag(Some("data-not-unique".to_owned())),
                    )?;
                }
                None => seen.push((*id, values)),
            }
        }
        Ok(())
    }

    // Value of the descendant instance of the `leaf` schema node.
    fn descendant_value(&self, id: usize, leaf: usize) -> Option<&str> {
        let store = &self.context.schema;
        let list = self.nodes[id].schema?;
        let mut chain = vec![leaf];
        let mut ancestor = store.data_parent(leaf);
        while let Some(schema) = ancestor {
            if schema == list {
                break;
            }
            chain.push(schema);
            ancestor = store.data_parent(schema);
        }
        ancestor?;
        let mut node = id;
        for schema in chain.into_iter().rev() {
            node = self.instances(Some(node), schema).into_iter().next()?;
        }
        self.canonical(node)
    }

    // ----- must and references -----

    fn check_musts(&self, report: &mut Report) -> Result<()> {
        for id in self.preorder() {
            let Some(snode) = self.snode(id) else {
                continue;
            };
            for must in &snode.musts {
                let eval = DataEval::new(self, Item::Node(id), must.module, PrefixMode::Schema);
                if eval.eval_bool(&must.cond, Item::Node(id))? {
                    continue;
                }
                let msg = match &must.emsg {
                    Some(emsg) => emsg.to_string(),
                    None => format!("Must condition \"{}\" not satisfied.", must.source),
                };
                let apptag = must
                    .eapptag
                    .as_deref()
                    .unwrap_or("must-violation")
                    .to_owned();
                report.push(
                    Error::valid(ValidationErrorCode::Data, msg)
                        .with_path(self.node_path(id))
                        .with_apptag(Some(apptag)),
                )?;
            }
        }
        Ok(())
    }

    fn check_references(&self, report: &mut Report) -> Result<()> {
        for id in self.preorder() {
            let (Some(snode), NodeValue::Term(value)) = (self.snode(id), &self.nodes[id].value)
            else {
                continue;
            };
            let Some(ty) = snode.leaf_type() else {
                continue;
            };
            let ty = match &value.member {
                Some(member) if ty.base == DataValueType::Union => member,
                _ => ty,
            };
            if !ty.require_instance
                || !matches!(ty.base, DataValueType::LeafRef | DataValueType::InstanceId)
            {
                continue;
            }
            let eval = DataEval::new(self, Item::Node(id), snode.module, PrefixMode::Schema);
            if !eval.deref(id)?.is_empty() {
                continue;
            }
            let msg = match (&ty.base, &ty.path) {
                (DataValueType::LeafRef, Some(path)) => format!(
                    "Invalid leafref value \"{}\" - no target instance \"{}\" with the same value.",
                    value.canonical, path.source
                ),
                _ => format!(
                    "Invalid instance-identifier \"{}\" value - required instance not found.",
                    value.canonical
                ),
            };
            report.push(
                Error::valid(ValidationErrorCode::Reference, msg)
                    .with_path(self.node_path(id))
                    .with_apptag(Some("instance-required".to_owned())),
            )?;
        }
        Ok(())
    }
}
