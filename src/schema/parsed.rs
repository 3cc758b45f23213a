//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Parsed (uncompiled) YANG module representation.
//!
//! The parsed tree mirrors the source closely: children are kept in
//! declaration order and all references (type names, grouping names, paths,
//! if-feature expressions) are still unresolved strings.

use crate::error::{Error, Result, ValidationErrorCode};
use crate::parser::Stmt;
use crate::schema::SchemaInputFormat;

/// Status of a definition.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

/// A parsed module or submodule.
#[derive(Clone, Debug)]
pub struct ParsedModule {
    pub name: String,
    pub is_submodule: bool,
    pub belongs_to: Option<String>,
    pub yang_version: Option<String>,
    pub namespace: Option<String>,
    pub prefix: String,
    pub imports: Vec<ParsedImport>,
    pub includes: Vec<ParsedInclude>,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub revisions: Vec<ParsedRevision>,
    pub extensions: Vec<ParsedExtension>,
    pub features: Vec<ParsedFeature>,
    pub identities: Vec<ParsedIdentity>,
    pub typedefs: Vec<ParsedTypedef>,
    pub groupings: Vec<ParsedGrouping>,
    pub data: Vec<ParsedNode>,
    pub rpcs: Vec<ParsedNode>,
    pub notifications: Vec<ParsedNode>,
    pub augments: Vec<ParsedAugment>,
    pub deviations: Vec<ParsedDeviation>,
    pub exts: Vec<ExtensionInstance>,
    /// Statement tree the module was built from.
    pub stmt: Stmt,
}

#[derive(Clone, Debug)]
pub struct ParsedImport {
    pub module: String,
    pub prefix: String,
    pub revision: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedInclude {
    pub submodule: String,
    pub revision: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedRevision {
    pub date: String,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedExtension {
    pub name: String,
    pub argument: Option<String>,
    pub yin_element: bool,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedFeature {
    pub name: String,
    pub iffeatures: Vec<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedIdentity {
    pub name: String,
    pub bases: Vec<String>,
    pub iffeatures: Vec<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedTypedef {
    pub name: String,
    pub type_: ParsedType,
    pub units: Option<String>,
    pub default: Option<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub line: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedType {
    pub name: String,
    pub range: Option<ParsedRestriction>,
    pub length: Option<ParsedRestriction>,
    pub patterns: Vec<ParsedPattern>,
    pub enums: Vec<ParsedEnum>,
    pub bits: Vec<ParsedBit>,
    pub fraction_digits: Option<u8>,
    pub path: Option<String>,
    pub require_instance: Option<bool>,
    pub bases: Vec<String>,
    pub types: Vec<ParsedType>,
    pub line: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedRestriction {
    pub arg: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedPattern {
    pub arg: String,
    pub inverted: bool,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedEnum {
    pub name: String,
    pub value: Option<i32>,
    pub iffeatures: Vec<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedBit {
    pub name: String,
    pub position: Option<u32>,
    pub iffeatures: Vec<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedMust {
    pub condition: String,
    pub error_message: Option<String>,
    pub error_app_tag: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedWhen {
    pub condition: String,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ParsedGrouping {
    pub name: String,
    pub typedefs: Vec<ParsedTypedef>,
    pub groupings: Vec<ParsedGrouping>,
    pub children: Vec<ParsedNode>,
    pub actions: Vec<ParsedNode>,
    pub notifications: Vec<ParsedNode>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub line: u64,
}

/// Statement-specific part of a parsed node.
#[derive(Clone, Debug)]
pub enum ParsedNodeKind {
    Container {
        presence: Option<String>,
    },
    Leaf {
        type_: ParsedType,
        units: Option<String>,
        default: Option<String>,
        mandatory: Option<bool>,
    },
    LeafList {
        type_: ParsedType,
        units: Option<String>,
        defaults: Vec<String>,
        min_elements: Option<u32>,
        max_elements: Option<u32>,
        ordered_by_user: bool,
    },
    List {
        key: Option<String>,
        uniques: Vec<String>,
        min_elements: Option<u32>,
        max_elements: Option<u32>,
        ordered_by_user: bool,
    },
    Choice {
        default: Option<String>,
        mandatory: Option<bool>,
    },
    Case,
    AnyData {
        mandatory: Option<bool>,
    },
    AnyXml {
        mandatory: Option<bool>,
    },
    Uses {
        refines: Vec<ParsedRefine>,
        augments: Vec<ParsedAugment>,
    },
    Rpc,
    Action,
    Input,
    Output,
    Notification,
}

/// A parsed data definition, operation or notification statement.
#[derive(Clone, Debug)]
pub struct ParsedNode {
    pub name: String,
    pub kind: ParsedNodeKind,
    pub line: u64,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub status: Option<Status>,
    pub config: Option<bool>,
    pub when: Option<ParsedWhen>,
    pub iffeatures: Vec<String>,
    pub musts: Vec<ParsedMust>,
    pub typedefs: Vec<ParsedTypedef>,
    pub groupings: Vec<ParsedGrouping>,
    pub children: Vec<ParsedNode>,
    pub actions: Vec<ParsedNode>,
    pub notifications: Vec<ParsedNode>,
    pub exts: Vec<ExtensionInstance>,
}

#[derive(Clone, Debug, Default)]
pub struct ParsedRefine {
    pub target: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub presence: Option<String>,
    pub defaults: Vec<String>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<Option<u32>>,
    pub musts: Vec<ParsedMust>,
    pub iffeatures: Vec<String>,
    pub exts: Vec<ExtensionInstance>,
    pub line: u64,
}

#[derive(Clone, Debug)]
pub struct ParsedAugment {
    pub target: String,
    pub when: Option<ParsedWhen>,
    pub iffeatures: Vec<String>,
    pub status: Status,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub children: Vec<ParsedNode>,
    pub actions: Vec<ParsedNode>,
    pub notifications: Vec<ParsedNode>,
    pub line: u64,
}

#[derive(Clone, Debug)]
pub struct ParsedDeviation {
    pub target: String,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub deviates: Vec<ParsedDeviate>,
    pub line: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeviateKind {
    NotSupported,
    Add,
    Replace,
    Delete,
}

#[derive(Clone, Debug)]
pub struct ParsedDeviate {
    pub kind: DeviateKind,
    pub units: Option<String>,
    pub musts: Vec<ParsedMust>,
    pub uniques: Vec<String>,
    pub defaults: Vec<String>,
    pub config: Option<bool>,
    pub mandatory: Option<bool>,
    pub min_elements: Option<u32>,
    pub max_elements: Option<Option<u32>>,
    pub type_: Option<ParsedType>,
}

/// An instance of an extension statement.
#[derive(Clone, Debug)]
pub struct ExtensionInstance {
    pub prefix: String,
    pub name: String,
    pub arg: Option<String>,
    pub substmts: Vec<Stmt>,
    pub line: u64,
}

struct Builder {
    format: SchemaInputFormat,
}

// ===== impl ParsedNodeKind =====

impl ParsedNodeKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ParsedNodeKind::Container { .. } => "container",
            ParsedNodeKind::Leaf { .. } => "leaf",
            ParsedNodeKind::LeafList { .. } => "leaf-list",
            ParsedNodeKind::List { .. } => "list",
            ParsedNodeKind::Choice { .. } => "choice",
            ParsedNodeKind::Case => "case",
            ParsedNodeKind::AnyData { .. } => "anydata",
            ParsedNodeKind::AnyXml { .. } => "anyxml",
            ParsedNodeKind::Uses { .. } => "uses",
            ParsedNodeKind::Rpc => "rpc",
            ParsedNodeKind::Action => "action",
            ParsedNodeKind::Input => "input",
            ParsedNodeKind::Output => "output",
            ParsedNodeKind::Notification => "notification",
        }
    }
}

// ===== impl ParsedNode =====

impl ParsedNode {
    fn new(name: String, kind: ParsedNodeKind, line: u64) -> ParsedNode {
        ParsedNode {
            name,
            kind,
            line,
            description: None,
            reference: None,
            status: None,
            config: None,
            when: None,
            iffeatures: Vec::new(),
            musts: Vec::new(),
            typedefs: Vec::new(),
            groupings: Vec::new(),
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            exts: Vec::new(),
        }
    }
}

// ===== impl ParsedModule =====

impl ParsedModule {
    /// Most recent revision date, if any.
    pub fn revision(&self) -> Option<&str> {
        self.revisions.iter().map(|r| r.date.as_str()).max()
    }

    /// Merges the definitions of an included submodule.
    pub(crate) fn merge_submodule(&mut self, sub: &ParsedModule) {
        self.typedefs.extend(sub.typedefs.iter().cloned());
        self.groupings.extend(sub.groupings.iter().cloned());
        self.features.extend(sub.features.iter().cloned());
        self.identities.extend(sub.identities.iter().cloned());
        self.extensions.extend(sub.extensions.iter().cloned());
        self.data.extend(sub.data.iter().cloned());
        self.rpcs.extend(sub.rpcs.iter().cloned());
        self.notifications.extend(sub.notifications.iter().cloned());
        self.augments.extend(sub.augments.iter().cloned());
        self.deviations.extend(sub.deviations.iter().cloned());
        self.exts.extend(sub.exts.iter().cloned());
        for import in &sub.imports {
            if !self.imports.iter().any(|i| i.prefix == import.prefix) {
                self.imports.push(import.clone());
            }
        }
    }
}

// ===== impl Builder =====

impl Builder {
    fn error(&self, line: u64, msg: impl Into<String>) -> Error {
        let vecode = match self.format {
            SchemaInputFormat::YANG => ValidationErrorCode::SyntaxYang,
            SchemaInputFormat::YIN => ValidationErrorCode::SyntaxYin,
        };
        Error::valid(vecode, msg).with_line(line)
    }

    fn arg(&self, stmt: &Stmt) -> Result<String> {
        stmt.arg.clone().ok_or_else(|| {
            self.error(
                stmt.line,
                format!("Missing argument of \"{}\".", stmt.keyword),
            )
        })
    }

    fn identifier(&self, stmt: &Stmt) -> Result<String> {
        let arg = self.arg(stmt)?;
        let valid = arg
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && arg.chars().all(|c| {
                c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
            });
        if !valid {
            return Err(self.error(
                stmt.line,
                format!(
                    "Invalid identifier \"{}\" of \"{}\".",
                    arg, stmt.keyword
                ),
            ));
        }
        Ok(arg)
    }

    fn bool_arg(&self, stmt: &Stmt) -> Result<bool> {
        match self.arg(stmt)?.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(self.error(
                stmt.line,
                format!("Invalid value \"{}\" of \"{}\".", other, stmt.keyword),
            )),
        }
    }

    fn u32_arg(&self, stmt: &Stmt) -> Result<u32> {
        let arg = self.arg(stmt)?;
        arg.parse::<u32>().map_err(|_| {
            self.error(
                stmt.line,
                format!("Invalid value \"{}\" of \"{}\".", arg, stmt.keyword),
            )
        })
    }

    fn max_arg(&self, stmt: &Stmt) -> Result<Option<u32>> {
        match stmt.arg.as_deref() {
            Some("unbounded") => Ok(None),
            _ => self.u32_arg(stmt).map(Some),
        }
    }

    fn status_arg(&self, stmt: &Stmt) -> Result<Status> {
        match self.arg(stmt)?.as_str() {
            "current" => Ok(Status::Current),
            "deprecated" => Ok(Status::Deprecated),
            "obsolete" => Ok(Status::Obsolete),
            other => Err(self.error(
                stmt.line,
                format!("Invalid value \"{}\" of \"status\".", other),
            )),
        }
    }

    fn ordered_by_arg(&self, stmt: &Stmt) -> Result<bool> {
        match self.arg(stmt)?.as_str() {
            "user" => Ok(true),
            "system" => Ok(false),
            other => Err(self.error(
                stmt.line,
                format!("Invalid value \"{}\" of \"ordered-by\".", other),
            )),
        }
    }

    // Accepts extension instances, rejects anything else.
    fn other(
        &self,
        parent: &Stmt,
        sub: &Stmt,
        exts: &mut Vec<ExtensionInstance>,
    ) -> Result<()> {
        match sub.keyword.split_once(':') {
            Some((prefix, name)) => {
                exts.push(ExtensionInstance {
                    prefix: prefix.to_owned(),
                    name: name.to_owned(),
                    arg: sub.arg.clone(),
                    substmts: sub.substmts.clone(),
                    line: sub.line,
                });
                Ok(())
            }
            None => Err(self.error(
                sub.line,
                format!(
                    "Invalid keyword \"{}\" as a child of \"{}\".",
                    sub.keyword, parent.keyword
                ),
            )),
        }
    }

    fn module(&self, stmt: Stmt) -> Result<ParsedModule> {
        let is_submodule = match stmt.keyword.as_str() {
            "module" => false,
            "submodule" => true,
            other => {
                return Err(self.error(
                    stmt.line,
                    format!(
                        "Invalid keyword \"{}\", expected \"module\" or \"submodule\".",
                        other
                    ),
                ));
            }
        };
        let mut module = ParsedModule {
            name: self.identifier(&stmt)?,
            is_submodule,
            belongs_to: None,
            yang_version: None,
            namespace: None,
            prefix: String::new(),
            imports: Vec::new(),
            includes: Vec::new(),
            organization: None,
            contact: None,
            description: None,
            reference: None,
            revisions: Vec::new(),
            extensions: Vec::new(),
            features: Vec::new(),
            identities: Vec::new(),
            typedefs: Vec::new(),
            groupings: Vec::new(),
            data: Vec::new(),
            rpcs: Vec::new(),
            notifications: Vec::new(),
            augments: Vec::new(),
            deviations: Vec::new(),
            exts: Vec::new(),
            stmt: Stmt::new("module", None),
        };

        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "yang-version" => {
                    let version = self.arg(sub)?;
                    if version != "1" && version != "1.1" {
                        return Err(self.error(
                            sub.line,
                            format!("Invalid yang-version \"{}\".", version),
                        ));
                    }
                    module.yang_version = Some(version);
                }
                "namespace" if !is_submodule => {
                    module.namespace = Some(self.arg(sub)?)
                }
                "prefix" if !is_submodule => module.prefix = self.arg(sub)?,
                "belongs-to" if is_submodule => {
                    module.belongs_to = Some(self.identifier(sub)?);
                    match sub.find_arg("prefix") {
                        Some(prefix) => module.prefix = prefix.to_owned(),
                        None => {
                            return Err(self.error(
                                sub.line,
                                "Missing \"prefix\" of \"belongs-to\".",
                            ));
                        }
                    }
                }
                "import" => module.imports.push(self.import(sub)?),
                "include" => module.includes.push(ParsedInclude {
                    submodule: self.identifier(sub)?,
                    revision: sub.find_arg("revision-date").map(str::to_owned),
                }),
                "organization" => module.organization = Some(self.arg(sub)?),
                "contact" => module.contact = Some(self.arg(sub)?),
                "description" => module.description = Some(self.arg(sub)?),
                "reference" => module.reference = Some(self.arg(sub)?),
                "revision" => module.revisions.push(ParsedRevision {
                    date: self.arg(sub)?,
                    description: sub.find_arg("description").map(str::to_owned),
                    reference: sub.find_arg("reference").map(str::to_owned),
                }),
                "extension" => module.extensions.push(self.extension(sub)?),
                "feature" => module.features.push(self.feature(sub)?),
                "identity" => module.identities.push(self.identity(sub)?),
                "typedef" => module.typedefs.push(self.typedef(sub)?),
                "grouping" => module.groupings.push(self.grouping(sub)?),
                "rpc" => module.rpcs.push(self.node(sub)?),
                "notification" => module.notifications.push(self.node(sub)?),
                "augment" => module.augments.push(self.augment(sub)?),
                "deviation" => module.deviations.push(self.deviation(sub)?),
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "uses" => {
                    module.data.push(self.node(sub)?)
                }
                _ => self.other(&stmt, sub, &mut module.exts)?,
            }
        }

        if !is_submodule {
            if module.namespace.is_none() {
                return Err(self.error(
                    stmt.line,
                    format!("Missing \"namespace\" of module \"{}\".", module.name),
                ));
            }
            if module.prefix.is_empty() {
                return Err(self.error(
                    stmt.line,
                    format!("Missing \"prefix\" of module \"{}\".", module.name),
                ));
            }
        } else if module.belongs_to.is_none() {
            return Err(self.error(
                stmt.line,
                format!(
                    "Missing \"belongs-to\" of submodule \"{}\".",
                    module.name
                ),
            ));
        }

        module.stmt = stmt;
        Ok(module)
    }

    fn import(&self, stmt: &Stmt) -> Result<ParsedImport> {
        let prefix = stmt.find_arg("prefix").ok_or_else(|| {
            self.error(stmt.line, "Missing \"prefix\" of \"import\".")
        })?;
        Ok(ParsedImport {
            module: self.identifier(stmt)?,
            prefix: prefix.to_owned(),
            revision: stmt.find_arg("revision-date").map(str::to_owned),
            description: stmt.find_arg("description").map(str::to_owned),
            reference: stmt.find_arg("reference").map(str::to_owned),
        })
    }

    fn extension(&self, stmt: &Stmt) -> Result<ParsedExtension> {
        let mut ext = ParsedExtension {
            name: self.identifier(stmt)?,
            argument: None,
            yin_element: false,
            status: Status::Current,
            description: None,
            reference: None,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "argument" => {
                    ext.argument = Some(self.identifier(sub)?);
                    if let Some(yin) = sub.find("yin-element") {
                        ext.yin_element = self.bool_arg(yin)?;
                    }
                }
                "status" => ext.status = self.status_arg(sub)?,
                "description" => ext.description = Some(self.arg(sub)?),
                "reference" => ext.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(ext)
    }

    fn feature(&self, stmt: &Stmt) -> Result<ParsedFeature> {
        let mut feature = ParsedFeature {
            name: self.identifier(stmt)?,
            iffeatures: Vec::new(),
            status: Status::Current,
            description: None,
            reference: None,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "if-feature" => feature.iffeatures.push(self.arg(sub)?),
                "status" => feature.status = self.status_arg(sub)?,
                "description" => feature.description = Some(self.arg(sub)?),
                "reference" => feature.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(feature)
    }

    fn identity(&self, stmt: &Stmt) -> Result<ParsedIdentity> {
        let mut identity = ParsedIdentity {
            name: self.identifier(stmt)?,
            bases: Vec::new(),
            iffeatures: Vec::new(),
            status: Status::Current,
            description: None,
            reference: None,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "base" => identity.bases.push(self.arg(sub)?),
                "if-feature" => identity.iffeatures.push(self.arg(sub)?),
                "status" => identity.status = self.status_arg(sub)?,
                "description" => identity.description = Some(self.arg(sub)?),
                "reference" => identity.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(identity)
    }

    fn typedef(&self, stmt: &Stmt) -> Result<ParsedTypedef> {
        let mut type_ = None;
        let mut typedef = ParsedTypedef {
            name: self.identifier(stmt)?,
            type_: ParsedType::default(),
            units: None,
            default: None,
            status: Status::Current,
            description: None,
            reference: None,
            line: stmt.line,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "type" => type_ = Some(self.type_(sub)?),
                "units" => typedef.units = Some(self.arg(sub)?),
                "default" => typedef.default = Some(self.arg(sub)?),
                "status" => typedef.status = self.status_arg(sub)?,
                "description" => typedef.description = Some(self.arg(sub)?),
                "reference" => typedef.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        typedef.type_ = type_.ok_or_else(|| {
            self.error(
                stmt.line,
                format!("Missing \"type\" of typedef \"{}\".", typedef.name),
            )
        })?;
        Ok(typedef)
    }

    fn restriction(&self, stmt: &Stmt) -> Result<ParsedRestriction> {
        let mut restr = ParsedRestriction {
            arg: self.arg(stmt)?,
            ..Default::default()
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "error-message" => restr.error_message = Some(self.arg(sub)?),
                "error-app-tag" => restr.error_app_tag = Some(self.arg(sub)?),
                "description" => restr.description = Some(self.arg(sub)?),
                "reference" => restr.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(restr)
    }

    fn type_(&self, stmt: &Stmt) -> Result<ParsedType> {
        let mut type_ = ParsedType {
            name: self.arg(stmt)?,
            line: stmt.line,
            ..Default::default()
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "range" => type_.range = Some(self.restriction(sub)?),
                "length" => type_.length = Some(self.restriction(sub)?),
                "pattern" => {
                    let mut pattern = ParsedPattern {
                        arg: self.arg(sub)?,
                        ..Default::default()
                    };
                    for psub in &sub.substmts {
                        match psub.keyword.as_str() {
                            "modifier" => {
                                if psub.arg.as_deref() != Some("invert-match") {
                                    return Err(self.error(
                                        psub.line,
                                        "Invalid value of \"modifier\".",
                                    ));
                                }
                                pattern.inverted = true;
                            }
                            "error-message" => {
                                pattern.error_message = Some(self.arg(psub)?)
                            }
                            "error-app-tag" => {
                                pattern.error_app_tag = Some(self.arg(psub)?)
                            }
                            "description" => {
                                pattern.description = Some(self.arg(psub)?)
                            }
                            "reference" => {
                                pattern.reference = Some(self.arg(psub)?)
                            }
                            _ => self.other(sub, psub, &mut Vec::new())?,
                        }
                    }
                    type_.patterns.push(pattern);
                }
                "enum" => {
                    let mut item = ParsedEnum {
                        name: self.arg(sub)?,
                        value: None,
                        iffeatures: Vec::new(),
                        status: Status::Current,
                        description: None,
                        reference: None,
                    };
                    for esub in &sub.substmts {
                        match esub.keyword.as_str() {
                            "value" => {
                                let arg = self.arg(esub)?;
                                item.value =
                                    Some(arg.parse::<i32>().map_err(|_| {
                                        self.error(
                                            esub.line,
                                            format!(
                                                "Invalid enum value \"{}\".",
                                                arg
                                            ),
                                        )
                                    })?);
                            }
                            "if-feature" => item.iffeatures.push(self.arg(esub)?),
                            "status" => item.status = self.status_arg(esub)?,
                            "description" => {
                                item.description = Some(self.arg(esub)?)
                            }
                            "reference" => item.reference = Some(self.arg(esub)?),
                            _ => self.other(sub, esub, &mut Vec::new())?,
                        }
                    }
                    type_.enums.push(item);
                }
                "bit" => {
                    let mut item = ParsedBit {
                        name: self.identifier(sub)?,
                        position: None,
                        iffeatures: Vec::new(),
                        status: Status::Current,
                        description: None,
                        reference: None,
                    };
                    for bsub in &sub.substmts {
                        match bsub.keyword.as_str() {
                            "position" => item.position = Some(self.u32_arg(bsub)?),
                            "if-feature" => item.iffeatures.push(self.arg(bsub)?),
                            "status" => item.status = self.status_arg(bsub)?,
                            "description" => {
                                item.description = Some(self.arg(bsub)?)
                            }
                            "reference" => item.reference = Some(self.arg(bsub)?),
                            _ => self.other(sub, bsub, &mut Vec::new())?,
                        }
                    }
                    type_.bits.push(item);
                }
                "fraction-digits" => {
                    let digits = self.u32_arg(sub)?;
                    if !(1..=18).contains(&digits) {
                        return Err(self.error(
                            sub.line,
                            format!("Invalid fraction-digits \"{}\".", digits),
                        ));
                    }
                    type_.fraction_digits = Some(digits as u8);
                }
                "path" => type_.path = Some(self.arg(sub)?),
                "require-instance" => {
                    type_.require_instance = Some(self.bool_arg(sub)?)
                }
                "base" => type_.bases.push(self.arg(sub)?),
                "type" => type_.types.push(self.type_(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(type_)
    }

    fn must(&self, stmt: &Stmt) -> Result<ParsedMust> {
        let restr = self.restriction(stmt)?;
        Ok(ParsedMust {
            condition: restr.arg,
            error_message: restr.error_message,
            error_app_tag: restr.error_app_tag,
            description: restr.description,
            reference: restr.reference,
        })
    }

    fn when(&self, stmt: &Stmt) -> Result<ParsedWhen> {
        let mut when = ParsedWhen {
            condition: self.arg(stmt)?,
            description: None,
            reference: None,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "description" => when.description = Some(self.arg(sub)?),
                "reference" => when.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(when)
    }

    fn grouping(&self, stmt: &Stmt) -> Result<ParsedGrouping> {
        let mut grouping = ParsedGrouping {
            name: self.identifier(stmt)?,
            typedefs: Vec::new(),
            groupings: Vec::new(),
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            status: Status::Current,
            description: None,
            reference: None,
            line: stmt.line,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "typedef" => grouping.typedefs.push(self.typedef(sub)?),
                "grouping" => grouping.groupings.push(self.grouping(sub)?),
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "uses" => {
                    grouping.children.push(self.node(sub)?)
                }
                "action" => grouping.actions.push(self.node(sub)?),
                "notification" => grouping.notifications.push(self.node(sub)?),
                "status" => grouping.status = self.status_arg(sub)?,
                "description" => grouping.description = Some(self.arg(sub)?),
                "reference" => grouping.reference = Some(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(grouping)
    }

    fn refine(&self, stmt: &Stmt) -> Result<ParsedRefine> {
        let mut refine = ParsedRefine {
            target: self.arg(stmt)?,
            line: stmt.line,
            ..Default::default()
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "description" => refine.description = Some(self.arg(sub)?),
                "reference" => refine.reference = Some(self.arg(sub)?),
                "config" => refine.config = Some(self.bool_arg(sub)?),
                "mandatory" => refine.mandatory = Some(self.bool_arg(sub)?),
                "presence" => refine.presence = Some(self.arg(sub)?),
                "default" => refine.defaults.push(self.arg(sub)?),
                "min-elements" => refine.min_elements = Some(self.u32_arg(sub)?),
                "max-elements" => refine.max_elements = Some(self.max_arg(sub)?),
                "must" => refine.musts.push(self.must(sub)?),
                "if-feature" => refine.iffeatures.push(self.arg(sub)?),
                _ => self.other(stmt, sub, &mut refine.exts)?,
            }
        }
        Ok(refine)
    }

    fn augment(&self, stmt: &Stmt) -> Result<ParsedAugment> {
        let mut augment = ParsedAugment {
            target: self.arg(stmt)?,
            when: None,
            iffeatures: Vec::new(),
            status: Status::Current,
            description: None,
            reference: None,
            children: Vec::new(),
            actions: Vec::new(),
            notifications: Vec::new(),
            line: stmt.line,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "when" => augment.when = Some(self.when(sub)?),
                "if-feature" => augment.iffeatures.push(self.arg(sub)?),
                "status" => augment.status = self.status_arg(sub)?,
                "description" => augment.description = Some(self.arg(sub)?),
                "reference" => augment.reference = Some(self.arg(sub)?),
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "uses" | "case" => {
                    augment.children.push(self.node(sub)?)
                }
                "action" => augment.actions.push(self.node(sub)?),
                "notification" => augment.notifications.push(self.node(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(augment)
    }

    fn deviation(&self, stmt: &Stmt) -> Result<ParsedDeviation> {
        let mut deviation = ParsedDeviation {
            target: self.arg(stmt)?,
            description: None,
            reference: None,
            deviates: Vec::new(),
            line: stmt.line,
        };
        for sub in &stmt.substmts {
            match sub.keyword.as_str() {
                "description" => deviation.description = Some(self.arg(sub)?),
                "reference" => deviation.reference = Some(self.arg(sub)?),
                "deviate" => deviation.deviates.push(self.deviate(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        if deviation.deviates.is_empty() {
            return Err(self.error(stmt.line, "Missing \"deviate\" of \"deviation\"."));
        }
        Ok(deviation)
    }

    fn deviate(&self, stmt: &Stmt) -> Result<ParsedDeviate> {
        let kind = match self.arg(stmt)?.as_str() {
            "not-supported" => DeviateKind::NotSupported,
            "add" => DeviateKind::Add,
            "replace" => DeviateKind::Replace,
            "delete" => DeviateKind::Delete,
            other => {
                return Err(self.error(
                    stmt.line,
                    format!("Invalid value \"{}\" of \"deviate\".", other),
                ));
            }
        };
        let mut deviate = ParsedDeviate {
            kind,
            units: None,
            musts: Vec::new(),
            uniques: Vec::new(),
            defaults: Vec::new(),
            config: None,
            mandatory: None,
            min_elements: None,
            max_elements: None,
            type_: None,
        };
        for sub in &stmt.substmts {
            if kind == DeviateKind::NotSupported && !sub.is_extension() {
                return Err(self.error(
                    sub.line,
                    "Deviate \"not-supported\" does not allow substatements.",
                ));
            }
            match sub.keyword.as_str() {
                "units" => deviate.units = Some(self.arg(sub)?),
                "must" => deviate.musts.push(self.must(sub)?),
                "unique" => deviate.uniques.push(self.arg(sub)?),
                "default" => deviate.defaults.push(self.arg(sub)?),
                "config" => deviate.config = Some(self.bool_arg(sub)?),
                "mandatory" => deviate.mandatory = Some(self.bool_arg(sub)?),
                "min-elements" => deviate.min_elements = Some(self.u32_arg(sub)?),
                "max-elements" => deviate.max_elements = Some(self.max_arg(sub)?),
                "type" => deviate.type_ = Some(self.type_(sub)?),
                _ => self.other(stmt, sub, &mut Vec::new())?,
            }
        }
        Ok(deviate)
    }

    fn node(&self, stmt: &Stmt) -> Result<ParsedNode> {
        let line = stmt.line;
        let keyword = stmt.keyword.as_str();
        let name = match keyword {
            "input" | "output" => keyword.to_owned(),
            "uses" => self.arg(stmt)?,
            _ => self.identifier(stmt)?,
        };

        // Statement-specific substatements first.
        let mut type_ = None;
        let mut units = None;
        let mut defaults = Vec::new();
        let mut mandatory = None;
        let mut presence = None;
        let mut key = None;
        let mut uniques = Vec::new();
        let mut min_elements = None;
        let mut max_elements = None;
        let mut ordered_by_user = false;
        let mut refines = Vec::new();
        let mut augments = Vec::new();

        let mut node = ParsedNode::new(name, ParsedNodeKind::Case, line);
        for sub in &stmt.substmts {
            let allowed = |list: &[&str]| list.contains(&keyword);
            match sub.keyword.as_str() {
                "description" if keyword != "input" && keyword != "output" => {
                    node.description = Some(self.arg(sub)?)
                }
                "reference" if keyword != "input" && keyword != "output" => {
                    node.reference = Some(self.arg(sub)?)
                }
                "status" if keyword != "input" && keyword != "output" => {
                    node.status = Some(self.status_arg(sub)?)
                }
                "config"
                    if allowed(&[
                        "container", "leaf", "leaf-list", "list", "choice",
                        "anydata", "anyxml",
                    ]) =>
                {
                    node.config = Some(self.bool_arg(sub)?)
                }
                "when"
                    if !allowed(&["rpc", "action", "input", "output", "notification"]) =>
                {
                    node.when = Some(self.when(sub)?)
                }
                "if-feature" if !allowed(&["input", "output"]) => {
                    node.iffeatures.push(self.arg(sub)?)
                }
                "must"
                    if allowed(&[
                        "container", "leaf", "leaf-list", "list", "anydata",
                        "anyxml", "input", "output", "notification",
                    ]) =>
                {
                    node.musts.push(self.must(sub)?)
                }
                "typedef"
                    if allowed(&[
                        "container", "list", "rpc", "action", "input", "output",
                        "notification",
                    ]) =>
                {
                    node.typedefs.push(self.typedef(sub)?)
                }
                "grouping"
                    if allowed(&[
                        "container", "list", "rpc", "action", "input", "output",
                        "notification",
                    ]) =>
                {
                    node.groupings.push(self.grouping(sub)?)
                }
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "uses"
                    if allowed(&[
                        "container", "list", "case", "input", "output",
                        "notification",
                    ]) =>
                {
                    node.children.push(self.node(sub)?)
                }
                "container" | "leaf" | "leaf-list" | "list" | "choice"
                | "anydata" | "anyxml" | "case"
                    if keyword == "choice" =>
                {
                    node.children.push(self.node(sub)?)
                }
                "input" | "output" if allowed(&["rpc", "action"]) => {
                    node.children.push(self.node(sub)?)
                }
                "action" if allowed(&["container", "list"]) => {
                    node.actions.push(self.node(sub)?)
                }
                "notification" if allowed(&["container", "list"]) => {
                    node.notifications.push(self.node(sub)?)
                }
                "type" if allowed(&["leaf", "leaf-list"]) => {
                    type_ = Some(self.type_(sub)?)
                }
                "units" if allowed(&["leaf", "leaf-list"]) => {
                    units = Some(self.arg(sub)?)
                }
                "default" if allowed(&["leaf", "leaf-list", "choice"]) => {
                    defaults.push(self.arg(sub)?)
                }
                "mandatory"
                    if allowed(&["leaf", "choice", "anydata", "anyxml"]) =>
                {
                    mandatory = Some(self.bool_arg(sub)?)
                }
                "presence" if keyword == "container" => {
                    presence = Some(self.arg(sub)?)
                }
                "key" if keyword == "list" => key = Some(self.arg(sub)?),
                "unique" if keyword == "list" => uniques.push(self.arg(sub)?),
                "min-elements" if allowed(&["leaf-list", "list"]) => {
                    min_elements = Some(self.u32_arg(sub)?)
                }
                "max-elements" if allowed(&["leaf-list", "list"]) => {
                    max_elements = self.max_arg(sub)?
                }
                "ordered-by" if allowed(&["leaf-list", "list"]) => {
                    ordered_by_user = self.ordered_by_arg(sub)?
                }
                "refine" if keyword == "uses" => refines.push(self.refine(sub)?),
                "augment" if keyword == "uses" => {
                    augments.push(self.augment(sub)?)
                }
                _ => self.other(stmt, sub, &mut node.exts)?,
            }
        }

        let missing_type = || {
            self.error(
                line,
                format!("Missing \"type\" of {} \"{}\".", keyword, node.name),
            )
        };
        node.kind = match keyword {
            "container" => ParsedNodeKind::Container { presence },
            "leaf" => {
                if defaults.len() > 1 {
                    return Err(self.error(
                        line,
                        format!("Duplicate \"default\" of leaf \"{}\".", node.name),
                    ));
                }
                ParsedNodeKind::Leaf {
                    type_: type_.ok_or_else(missing_type)?,
                    units,
                    default: defaults.pop(),
                    mandatory,
                }
            }
            "leaf-list" => ParsedNodeKind::LeafList {
                type_: type_.ok_or_else(missing_type)?,
                units,
                defaults,
                min_elements,
                max_elements,
                ordered_by_user,
            },
            "list" => ParsedNodeKind::List {
                key,
                uniques,
                min_elements,
                max_elements,
                ordered_by_user,
            },
            "choice" => ParsedNodeKind::Choice {
                default: defaults.pop(),
                mandatory,
            },
            "case" => ParsedNodeKind::Case,
            "anydata" => ParsedNodeKind::AnyData { mandatory },
            "anyxml" => ParsedNodeKind::AnyXml { mandatory },
            "uses" => ParsedNodeKind::Uses { refines, augments },
            "rpc" => ParsedNodeKind::Rpc,
            "action" => ParsedNodeKind::Action,
            "input" => ParsedNodeKind::Input,
            "output" => ParsedNodeKind::Output,
            "notification" => ParsedNodeKind::Notification,
            other => {
                return Err(self.error(
                    line,
                    format!("Invalid keyword \"{}\".", other),
                ));
            }
        };
        Ok(node)
    }
}

// ===== global functions =====

/// Builds a typed module out of its statement tree.
pub(crate) fn build_module(
    stmt: Stmt,
    format: SchemaInputFormat,
) -> Result<ParsedModule> {
    Builder { format }.module(stmt)
}

/// Builds a type out of a `type` statement (annotation types).
pub(crate) fn build_type(
    stmt: &Stmt,
    format: SchemaInputFormat,
) -> Result<ParsedType> {
    Builder { format }.type_(stmt)
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_module;

    #[test]
    fn typed_module() {
        let module = parse_module(
            r#"module m {
              namespace "urn:m";
              prefix m;
              revision 2020-01-01;
              revision 2021-06-01 { description "second"; }
              typedef percent { type uint8 { range "0..100"; } }
              container top {
                leaf name { type string; default "x"; }
                list item { key "id"; ordered-by user; leaf id { type uint32; } }
                uses g { refine "a" { mandatory true; } }
              }
              grouping g { leaf a { type m:percent; } }
            }"#,
            SchemaInputFormat::YANG,
        )
        .unwrap();
        assert_eq!(module.revision(), Some("2021-06-01"));
        assert_eq!(module.typedefs[0].name, "percent");
        let top = &module.data[0];
        assert_eq!(top.children.len(), 3);
        match &top.children[1].kind {
            ParsedNodeKind::List {
                key,
                ordered_by_user,
                ..
            } => {
                assert_eq!(key.as_deref(), Some("id"));
                assert!(ordered_by_user);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &top.children[2].kind {
            ParsedNodeKind::Uses { refines, .. } => {
                assert_eq!(refines[0].mandatory, Some(true))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn misplaced_keyword() {
        let error = parse_module(
            "module m { namespace urn:m; prefix m; leaf l { type string; key x; } }",
            SchemaInputFormat::YANG,
        )
        .unwrap_err();
        assert_eq!(error.vecode, ValidationErrorCode::SyntaxYang);
        assert!(error.msg.unwrap().contains("\"key\""));
    }

    #[test]
    fn extension_instances_are_kept() {
        let module = parse_module(
            "module m { namespace urn:m; prefix m; import e { prefix e; }
             e:annotation op { type string; }
             container c { e:hidden; } }",
            SchemaInputFormat::YANG,
        )
        .unwrap();
        assert_eq!(module.exts[0].name, "annotation");
        assert_eq!(module.exts[0].arg.as_deref(), Some("op"));
        assert_eq!(module.data[0].exts[0].prefix, "e");
    }
}
