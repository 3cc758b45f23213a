//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG context.

use bitflags::bitflags;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dict::Dictionary;
use crate::error::{Error, ErrorCode, Result};
use crate::iter::SchemaModules;
use crate::logging::{
    DefaultLogger, ErrorItem, LogCallback, LogLevel, LogOptions, LogState,
    LoggingCallbackAlreadySet,
};
use crate::parser::{parse_module, Stmt};
use crate::path::parse_data_path;
use crate::plugins::PluginRegistry;
use crate::schema::parsed::ParsedModule;
use crate::schema::{
    compile, SchemaInputFormat, SchemaModule, SchemaNode, SchemaStore,
};
use crate::utils::Binding;

/// Context of the YANG schemas.
///
/// The context owns every loaded module, the compiled schema and the log
/// state. Data trees borrow the context, so it can't be modified or dropped
/// while any of them is alive.
pub struct Context {
    pub(crate) modules: Vec<ModuleEntry>,
    pub(crate) schema: SchemaStore,
    pub(crate) dict: Dictionary,
    pub(crate) plugins: PluginRegistry,
    pub(crate) log: LogState,
    searchdirs: Vec<PathBuf>,
    loader: Option<Box<dyn ModuleLoader>>,
    pub(crate) options: ContextFlags,
    module_set_id: u16,
    internal_count: u32,
    recompile: bool,
}

bitflags! {
    /// Options to change context behavior.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ContextFlags: u16 {
        /// All the imported modules of the schema being parsed are implemented.
        const ALL_IMPLEMENTED = 0x01;

        /// Implement all imported modules "referenced" from an implemented
        /// module. Augment and deviation targets are always implemented; with
        /// this flag the modules of leafref targets are implemented as well.
        const REF_IMPLEMENTED = 0x02;

        /// Do not internally implement ietf-yang-library module. This option
        /// cannot be changed on existing context.
        const NO_YANGLIBRARY = 0x04;

        /// Do not search for schemas in context's searchdirs neither in current
        /// working directory.
        const DISABLE_SEARCHDIRS = 0x08;

        /// Do not automatically search for schemas in current working
        /// directory, which is by default searched automatically (despite not
        /// recursively).
        const DISABLE_SEARCHDIR_CWD = 0x10;

        /// Do not compile the schema after every module load, call
        /// [`Context::compile`] explicitly.
        const EXPLICIT_COMPILE = 0x80;

        /// Keep the nodes disabled by their if-features in the compiled
        /// schema, marked as disabled.
        const KEEP_DISABLED_NODES = 0x100;

        /// State data nodes are rejected by the data parsers.
        const NO_STATE = 0x200;
    }
}

/// Source of modules not found in the search directories.
///
/// Implemented for closures taking the module name and revision and, when a
/// submodule is requested, its name and revision.
pub trait ModuleLoader: Send + Sync {
    fn load(
        &self,
        module: &str,
        revision: Option<&str>,
        submodule: Option<&str>,
        submodule_revision: Option<&str>,
    ) -> Option<(String, SchemaInputFormat)>;
}

/// A module loaded into the context.
#[derive(Debug)]
pub(crate) struct ModuleEntry {
    pub name: Arc<str>,
    pub revision: Option<Arc<str>>,
    pub namespace: Arc<str>,
    pub prefix: Arc<str>,
    /// Parsed module with its submodules merged in.
    pub parsed: Arc<ParsedModule>,
    pub submodules: Vec<Arc<ParsedModule>>,
    pub filepath: Option<String>,
    pub implemented: bool,
    pub internal: bool,
    pub imports: Vec<(Arc<str>, usize)>,
    pub features: Vec<(Arc<str>, bool)>,
    pub format: SchemaInputFormat,
}

/// How prefixes found in values and expressions map to modules.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Prefixes<'p> {
    /// Import table of a module.
    Schema(usize),
    /// Module names.
    Json,
    /// XML namespace declarations, `""` being the default namespace.
    Xml(&'p [(String, String)]),
}

struct Snapshot {
    modules: usize,
    implemented: Vec<bool>,
    features: Vec<Vec<(Arc<str>, bool)>>,
}

const YANG_METADATA_MODULE: &str = r#"module ietf-yang-metadata {
  namespace "urn:ietf:params:xml:ns:yang:ietf-yang-metadata";
  prefix md;

  organization "IETF NETMOD (NETCONF Data Modeling Language) Working Group";
  description "This YANG module defines an 'extension' statement that allows
    for defining metadata annotations.";

  revision 2016-08-05 {
    description "Initial revision.";
    reference "RFC 7952: Defining and Using Metadata with YANG";
  }

  extension annotation {
    argument name;
    description "This extension allows for defining metadata annotations in
      YANG modules.";
  }
}
"#;

const YANG_MODULE: &str = r#"module yang {
  namespace "urn:ietf:params:xml:ns:yang:1";
  prefix yang;

  import ietf-yang-metadata {
    prefix md;
    revision-date 2016-08-05;
  }

  description "Annotations used by edits and data tree differences.";

  revision 2022-06-16 {
    description "Added annotations for user-ordered list differences.";
  }

  md:annotation operation {
    type enumeration {
      enum none;
      enum create;
      enum delete;
      enum replace;
      enum merge;
      enum remove;
    }
  }

  md:annotation orig-default {
    type boolean;
  }

  md:annotation orig-value {
    type string;
  }

  md:annotation key {
    type string;
  }

  md:annotation orig-key {
    type string;
  }

  md:annotation value {
    type string;
  }

  md:annotation position {
    type uint32 {
      range "1..max";
    }
  }

  md:annotation orig-position {
    type uint32 {
      range "1..max";
    }
  }
}
"#;

const WITH_DEFAULTS_MODULE: &str = r#"module ietf-netconf-with-defaults {
  namespace "urn:ietf:params:xml:ns:netconf:default:1.0";
  prefix ncwd;

  import ietf-yang-metadata {
    prefix md;
    revision-date 2016-08-05;
  }

  description "Default value annotation of the with-defaults report-all-tagged
    mode.";

  revision 2011-06-01;

  md:annotation default {
    type boolean;
  }
}
"#;

// ===== impl Context =====

impl Context {
    /// Create YANG context.
    ///
    /// Context is used to hold all information about schemas. Usually, the
    /// application is supposed to work with a single context holding all
    /// schemas according to which the data trees will be processed and
    /// validated.
    pub fn new(options: ContextFlags) -> Result<Context> {
        let mut context = Context {
            modules: Vec::new(),
            schema: SchemaStore::default(),
            dict: Dictionary::new(),
            plugins: PluginRegistry::new(),
            log: LogState::new(),
            searchdirs: Vec::new(),
            loader: None,
            options,
            module_set_id: 0,
            internal_count: 0,
            recompile: false,
        };

        for source in [YANG_METADATA_MODULE, YANG_MODULE, WITH_DEFAULTS_MODULE]
        {
            let mut stack = Vec::new();
            let id = context.add_module(
                source,
                SchemaInputFormat::YANG,
                None,
                true,
                &mut stack,
                None,
            )?;
            context.modules[id].internal = true;
            context.internal_count += 1;
        }
        context.compile()?;

        Ok(context)
    }

    /// Add the search path into the context.
    pub fn set_searchdir<P: AsRef<Path>>(&mut self, search_dir: P) -> Result<()> {
        let path = search_dir.as_ref();
        if !path.is_dir() {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Unable to use search directory \"{}\" (not a directory).",
                    path.display()
                ),
            ));
        }
        if !self.searchdirs.iter().any(|dir| dir == path) {
            self.searchdirs.push(path.to_path_buf());
        }
        Ok(())
    }

    /// Clean the search path from the context.
    pub fn unset_searchdir<P: AsRef<Path>>(&mut self, search_dir: P) -> Result<()> {
        let path = search_dir.as_ref();
        let len = self.searchdirs.len();
        self.searchdirs.retain(|dir| dir != path);
        if self.searchdirs.len() == len {
            return Err(Error::not_found(format!(
                "Invalid search directory \"{}\" to remove.",
                path.display()
            )));
        }
        Ok(())
    }

    /// Clean all search paths from the context.
    pub fn unset_searchdirs(&mut self) -> Result<()> {
        self.searchdirs.clear();
        Ok(())
    }

    /// Remove the most recently added search path(s) from the context.
    pub fn unset_searchdir_last(&mut self, count: u32) -> Result<()> {
        let keep = self.searchdirs.len().saturating_sub(count as usize);
        self.searchdirs.truncate(keep);
        Ok(())
    }

    /// Returns the search paths of the context.
    pub fn searchdirs(&self) -> impl Iterator<Item = &Path> {
        self.searchdirs.iter().map(PathBuf::as_path)
    }

    /// Set the module loader used when a module isn't found in the search
    /// directories.
    pub fn set_module_loader<L: ModuleLoader + 'static>(&mut self, loader: L) {
        self.loader = Some(Box::new(loader));
    }

    /// Remove the module loader.
    pub fn unset_module_loader(&mut self) {
        self.loader = None;
    }

    /// Get the currently set context's options.
    pub fn get_options(&self) -> ContextFlags {
        self.options
    }

    /// Set some of the context's options.
    pub fn set_options(&mut self, options: ContextFlags) -> Result<()> {
        if options.contains(ContextFlags::NO_YANGLIBRARY)
            && !self.options.contains(ContextFlags::NO_YANGLIBRARY)
        {
            return Err(Error::inval(
                "Option NO_YANGLIBRARY cannot be changed on existing context.",
            ));
        }
        if options.contains(ContextFlags::KEEP_DISABLED_NODES)
            && !self.options.contains(ContextFlags::KEEP_DISABLED_NODES)
        {
            self.recompile = true;
        }
        self.options |= options;
        Ok(())
    }

    /// Unset some of the context's options.
    pub fn unset_options(&mut self, options: ContextFlags) -> Result<()> {
        if options.contains(ContextFlags::KEEP_DISABLED_NODES)
            && self.options.contains(ContextFlags::KEEP_DISABLED_NODES)
        {
            self.recompile = true;
        }
        self.options.remove(options);
        Ok(())
    }

    /// Get current ID of the modules set.
    pub fn get_module_set_id(&self) -> u16 {
        self.module_set_id
    }

    /// Get YANG module of the given name and revision.
    ///
    /// If the revision is not specified, the schema with no revision is
    /// returned (if it is present in the context).
    pub fn get_module(
        &self,
        name: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|module| {
                &*module.name == name && module.revision.as_deref() == revision
            })
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// Get the latest revision of the YANG module specified by its name.
    ///
    /// YANG modules with no revision are supposed to be the oldest one.
    pub fn get_module_latest(&self, name: &str) -> Option<SchemaModule<'_>> {
        self.find_latest(|module| &*module.name == name)
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// Get the (only) implemented YANG module specified by its name.
    pub fn get_module_implemented(&self, name: &str) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|module| &*module.name == name && module.implemented)
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// YANG module of the given namespace and revision.
    ///
    /// If the revision is not specified, the schema with no revision is
    /// returned (if it is present in the context).
    pub fn get_module_ns(
        &self,
        ns: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|module| {
                &*module.namespace == ns && module.revision.as_deref() == revision
            })
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// Get the latest revision of the YANG module specified by its namespace.
    ///
    /// YANG modules with no revision are supposed to be the oldest one.
    pub fn get_module_latest_ns(&self, ns: &str) -> Option<SchemaModule<'_>> {
        self.find_latest(|module| &*module.namespace == ns)
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// Get the (only) implemented YANG module specified by its namespace.
    pub fn get_module_implemented_ns(
        &self,
        ns: &str,
    ) -> Option<SchemaModule<'_>> {
        self.modules
            .iter()
            .position(|module| &*module.namespace == ns && module.implemented)
            .map(|id| SchemaModule::from_raw(self, id))
    }

    /// Get list of loaded modules.
    ///
    /// Internal modules (loaded during the context creation) can be skipped by
    /// setting "skip_internal" to true.
    pub fn modules(&self, skip_internal: bool) -> SchemaModules<'_> {
        SchemaModules::new(self, skip_internal)
    }

    /// Returns an iterator over all data nodes from all modules in the YANG
    /// context (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'_>> {
        self.modules(false).flat_map(|module| module.traverse())
    }

    /// Get the number of internal modules, loaded with the context creation.
    pub fn internal_module_count(&self) -> u32 {
        self.internal_count
    }

    /// Returns the string dictionary shared by the context objects.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Returns the plugin registry. Changes take effect on the next
    /// compilation.
    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        self.recompile = true;
        &mut self.plugins
    }

    /// Try to find the model in the searchpaths and load it.
    ///
    /// The context itself is searched for the requested module first. If
    /// revision is not specified (the revision parameter is None), the module
    /// with the latest revision is loaded.
    ///
    /// The `features` parameter specifies the module features that should be
    /// enabled. If let empty, no features are enabled. The feature string '*'
    /// enables all module features.
    pub fn load_module(
        &mut self,
        name: &str,
        revision: Option<&str>,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        log::debug!("loading module {} (revision {:?})", name, revision);
        let snapshot = self.snapshot();
        let result = self
            .load_dependency(name, revision, true, &mut Vec::new())
            .map_err(|error| self.log_error(error))
            .and_then(|id| self.finish_load(id, features, &snapshot));
        match result {
            Ok(id) => Ok(SchemaModule::from_raw(self, id)),
            Err(error) => {
                self.rollback(snapshot);
                Err(error)
            }
        }
    }

    /// Parse a module from a string and implement it.
    pub fn parse_module_str(
        &mut self,
        data: &str,
        format: SchemaInputFormat,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        self.parse_module_common(data, format, None, features)
    }

    /// Parse a module from a file and implement it.
    pub fn parse_module_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        format: SchemaInputFormat,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|error| {
            Error::new(
                ErrorCode::Sys,
                format!("Unable to read \"{}\" ({}).", path.display(), error),
            )
        })?;
        let filepath = path.to_string_lossy().into_owned();
        self.parse_module_common(&data, format, Some(filepath), features)
    }

    fn parse_module_common(
        &mut self,
        data: &str,
        format: SchemaInputFormat,
        filepath: Option<String>,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let snapshot = self.snapshot();
        let result = self
            .add_module(data, format, filepath, true, &mut Vec::new(), None)
            .map_err(|error| self.log_error(error))
            .and_then(|id| self.finish_load(id, features, &snapshot));
        match result {
            Ok(id) => Ok(SchemaModule::from_raw(self, id)),
            Err(error) => {
                self.rollback(snapshot);
                Err(error)
            }
        }
    }

    /// Compile the schema of all implemented modules.
    ///
    /// Done automatically after every load unless
    /// [`ContextFlags::EXPLICIT_COMPILE`] is set, and required after feature
    /// changes.
    pub fn compile(&mut self) -> Result<()> {
        match self.compile_logged().into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Compiles the module set, logging every error met.
    fn compile_logged(&mut self) -> Vec<Error> {
        self.implement_targets();
        let (store, errors) = compile::compile(self);
        self.schema = store;
        self.recompile = false;
        log::debug!(
            "compiled {} schema nodes, {} error(s)",
            self.schema.nodes.len(),
            errors.len()
        );
        for error in &errors {
            self.log.error(error);
        }
        errors
    }

    /// Set a module as implemented.
    pub fn set_module_implemented(
        &mut self,
        name: &str,
        revision: Option<&str>,
    ) -> Result<()> {
        let id = self
            .find_loaded(name, revision)
            .ok_or_else(|| {
                Error::not_found(format!("Module \"{}\" not found.", name))
            })?;
        self.implement(id)?;
        if !self.options.contains(ContextFlags::EXPLICIT_COMPILE) {
            self.compile()?;
        } else {
            self.recompile = true;
        }
        self.module_set_id = self.module_set_id.wrapping_add(1);
        Ok(())
    }

    /// Get the current status of a feature.
    pub fn feature_value(&self, module: &str, feature: &str) -> Result<bool> {
        self.get_module_implemented(module)
            .or_else(|| self.get_module_latest(module))
            .ok_or_else(|| {
                Error::not_found(format!("Module \"{}\" not found.", module))
            })?
            .feature_value(feature)
    }

    /// Enable a feature of an implemented module. The schema must be
    /// recompiled afterwards.
    pub fn feature_enable(&mut self, module: &str, feature: &str) -> Result<()> {
        self.set_features(module, Some(feature), true)
    }

    /// Disable a feature of an implemented module. The schema must be
    /// recompiled afterwards.
    pub fn feature_disable(&mut self, module: &str, feature: &str) -> Result<()> {
        self.set_features(module, Some(feature), false)
    }

    /// Enable all the features of a module.
    pub fn feature_enable_all(&mut self, module: &str) -> Result<()> {
        self.set_features(module, None, true)
    }

    /// Disable all the features of a module.
    pub fn feature_disable_all(&mut self, module: &str) -> Result<()> {
        self.set_features(module, None, false)
    }

    /// Returns whether the compiled schema is out of date.
    pub fn needs_recompile(&self) -> bool {
        self.recompile
    }

    /// Get a schema node based on the given data path (JSON format).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'_>> {
        self.check_compiled()?;
        let segments = parse_data_path(path)?;
        let mut snode: Option<usize> = None;
        let mut module = None;
        for segment in &segments {
            if let Some(prefix) = &segment.prefix {
                module = Some(self.module_by_name(prefix).ok_or_else(|| {
                    Error::not_found(format!(
                        "Module \"{}\" not found in path \"{}\".",
                        prefix, path
                    ))
                })?);
            }
            let Some(module) = module else {
                return Err(Error::inval(format!("Invalid path \"{}\".", path)));
            };
            snode = Some(
                self.schema
                    .find_data_child(snode, module, &segment.name)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "Schema node \"{}\" not found in path \"{}\".",
                            segment.name, path
                        ))
                    })?,
            );
        }
        snode
            .map(|id| SchemaNode::from_raw(self, id))
            .ok_or_else(|| Error::inval(format!("Invalid path \"{}\".", path)))
    }

    /// Get a schema node based on the given data path (JSON format).
    pub fn find_single(&self, path: &str) -> Result<SchemaNode<'_>> {
        self.find_path(path)
    }

    /// Evaluate an xpath expression on schema nodes (JSON prefixes).
    pub fn find_xpath(&self, path: &str) -> Result<Vec<SchemaNode<'_>>> {
        self.check_compiled()?;
        let ids = crate::xpath::eval::schema_xpath(self, None, path)?;
        Ok(ids
            .into_iter()
            .map(|id| SchemaNode::from_raw(self, id))
            .collect())
    }

    // ----- logging -----

    /// Set the log level.
    pub fn set_log_level(&self, level: LogLevel) {
        self.log.set_level(level);
    }

    /// Get the log level.
    pub fn log_level(&self) -> LogLevel {
        self.log.level()
    }

    /// Log only errors.
    pub fn set_log_level_error(&self) {
        self.log.set_level(LogLevel::Error);
    }

    /// Log errors and warnings.
    pub fn set_log_level_warn(&self) {
        self.log.set_level(LogLevel::Warning);
    }

    /// Log errors, warnings and verbose messages.
    pub fn set_log_level_debug(&self) {
        self.log.set_level(LogLevel::Verbose);
    }

    /// Log everything.
    pub fn set_log_level_trace(&self) {
        self.log.set_level(LogLevel::Debug);
    }

    pub fn set_log_options(&self, options: LogOptions) {
        self.log.set_options(options);
    }

    pub fn log_options(&self) -> LogOptions {
        self.log.options()
    }

    /// Forward the context messages to the `log` crate.
    pub fn init_default_logger(
        &self,
    ) -> std::result::Result<(), LoggingCallbackAlreadySet> {
        self.log.init_callback(DefaultLogger::default())
    }

    /// Set a custom log callback (can be set only once).
    pub fn set_log_callback<C: LogCallback>(
        &self,
        callback: C,
    ) -> std::result::Result<(), LoggingCallbackAlreadySet> {
        self.log.init_callback(callback)
    }

    /// Stored error items in chronological order.
    pub fn errors(&self) -> Vec<ErrorItem> {
        self.log.errors()
    }

    /// Stored error items, the most recent first.
    pub fn errors_rev(&self) -> Vec<ErrorItem> {
        let mut errors = self.log.errors();
        errors.reverse();
        errors
    }

    /// The most recent stored error.
    pub fn last_error(&self) -> Option<ErrorItem> {
        self.log.last()
    }

    /// Clear the stored error items.
    pub fn clear_errors(&self) {
        self.log.clear();
    }

    // ----- internal -----

    pub(crate) fn check_compiled(&self) -> Result<()> {
        if self.recompile {
            return Err(Error::recompile());
        }
        Ok(())
    }

    pub(crate) fn log_error(&self, error: Error) -> Error {
        self.log.error(&error);
        error
    }

    /// Implemented module of the given name, or its latest revision.
    pub(crate) fn module_by_name(&self, name: &str) -> Option<usize> {
        self.modules
            .iter()
            .position(|module| &*module.name == name && module.implemented)
            .or_else(|| self.find_latest(|module| &*module.name == name))
    }

    pub(crate) fn module_by_ns(&self, ns: &str) -> Option<usize> {
        self.modules
            .iter()
            .position(|module| &*module.namespace == ns && module.implemented)
            .or_else(|| self.find_latest(|module| &*module.namespace == ns))
    }

    fn find_latest<F>(&self, filter: F) -> Option<usize>
    where
        F: Fn(&ModuleEntry) -> bool,
    {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, module)| filter(module))
            .max_by(|(_, a), (_, b)| a.revision.cmp(&b.revision))
            .map(|(id, _)| id)
    }

    fn find_loaded(&self, name: &str, revision: Option<&str>) -> Option<usize> {
        match revision {
            Some(revision) => self.modules.iter().position(|module| {
                &*module.name == name
                    && module.revision.as_deref() == Some(revision)
            }),
            None => self.module_by_name(name),
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            modules: self.modules.len(),
            implemented: self.modules.iter().map(|m| m.implemented).collect(),
            features: self.modules.iter().map(|m| m.features.clone()).collect(),
        }
    }

    fn rollback(&mut self, snapshot: Snapshot) {
        if self.modules.len() == snapshot.modules
            && self
                .modules
                .iter()
                .zip(&snapshot.implemented)
                .all(|(m, implemented)| m.implemented == *implemented)
            && self
                .modules
                .iter()
                .zip(&snapshot.features)
                .all(|(m, features)| m.features == *features)
        {
            return;
        }
        self.modules.truncate(snapshot.modules);
        for (module, implemented) in self.modules.iter_mut().zip(snapshot.implemented)
        {
            module.implemented = implemented;
        }
        for (module, features) in self.modules.iter_mut().zip(snapshot.features) {
            module.features = features;
        }
        // The previous module set compiled before, errors here would have
        // been reported then.
        let (store, _) = compile::compile(self);
        self.schema = store;
    }

    /// Enables the requested features and compiles the new module set.
    fn finish_load(
        &mut self,
        id: usize,
        features: &[&str],
        snapshot: &Snapshot,
    ) -> Result<usize> {
        self.enable_features(id, features)
            .map_err(|error| self.log_error(error))?;
        if self.options.contains(ContextFlags::EXPLICIT_COMPILE) {
            self.recompile = true;
        } else {
            // Errors of modules unrelated to this load do not fail it.
            let errors = self.compile_logged();
            let failed = (0..self.modules.len()).find(|id| {
                let new = *id >= snapshot.modules
                    || snapshot.implemented.get(*id) == Some(&false);
                new && self.modules[*id].implemented
                    && !self
                        .schema
                        .modules
                        .get(*id)
                        .map(|m| m.compiled)
                        .unwrap_or(false)
            });
            if let Some(failed) = failed {
                let error = match errors.into_iter().next() {
                    Some(error) => error,
                    None => self.log_error(Error::new(
                        ErrorCode::Valid,
                        format!(
                            "Compilation of module \"{}\" failed.",
                            self.modules[failed].name
                        ),
                    )),
                };
                return Err(error);
            }
        }
        self.module_set_id = self.module_set_id.wrapping_add(1);
        Ok(id)
    }

    fn enable_features(&mut self, id: usize, features: &[&str]) -> Result<()> {
        let module = &mut self.modules[id];
        for feature in features {
            if *feature == "*" {
                module.features.iter_mut().for_each(|(_, on)| *on = true);
                continue;
            }
            match module
                .features
                .iter_mut()
                .find(|(name, _)| &**name == *feature)
            {
                Some((_, on)) => *on = true,
                None => {
                    return Err(Error::not_found(format!(
                        "Feature \"{}\" not found in module \"{}\".",
                        feature, module.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn set_features(
        &mut self,
        module: &str,
        feature: Option<&str>,
        value: bool,
    ) -> Result<()> {
        let id = self
            .modules
            .iter()
            .position(|m| &*m.name == module && m.implemented)
            .ok_or_else(|| {
                Error::not_found(format!(
                    "Implemented module \"{}\" not found.",
                    module
                ))
            })?;
        let entry = &mut self.modules[id];
        let mut changed = false;
        match feature {
            Some(feature) => {
                let (_, on) = entry
                    .features
                    .iter_mut()
                    .find(|(name, _)| &**name == feature)
                    .ok_or_else(|| {
                        Error::not_found(format!(
                            "Feature \"{}\" not found in module \"{}\".",
                            feature, module
                        ))
                    })?;
                changed |= *on != value;
                *on = value;
            }
            None => {
                for (_, on) in entry.features.iter_mut() {
                    changed |= *on != value;
                    *on = value;
                }
            }
        }
        if changed {
            self.recompile = true;
            self.module_set_id = self.module_set_id.wrapping_add(1);
        }
        Ok(())
    }

    fn implement(&mut self, id: usize) -> Result<()> {
        if self.modules[id].implemented {
            return Ok(());
        }
        let name = self.modules[id].name.clone();
        if let Some(other) = self
            .modules
            .iter()
            .find(|m| m.name == name && m.implemented)
        {
            return Err(Error::new(
                ErrorCode::Denied,
                format!(
                    "Module \"{}@{}\" is already implemented in revision \"{}\".",
                    name,
                    self.modules[id].revision.as_deref().unwrap_or(""),
                    other.revision.as_deref().unwrap_or("")
                ),
            ));
        }
        self.modules[id].implemented = true;
        Ok(())
    }

    /// Implements the target modules of augments and deviations, and with
    /// [`ContextFlags::REF_IMPLEMENTED`] the modules of leafref targets.
    fn implement_targets(&mut self) {
        let with_leafrefs = self.options.contains(ContextFlags::REF_IMPLEMENTED);
        loop {
            let mut targets = Vec::new();
            for module in self.modules.iter().filter(|m| m.implemented) {
                let mut prefixes: Vec<&str> = module
                    .parsed
                    .augments
                    .iter()
                    .map(|a| a.target.as_str())
                    .chain(module.parsed.deviations.iter().map(|d| d.target.as_str()))
                    .map(|path| {
                        path.trim_start_matches('/')
                            .split(['/', ':'])
                            .next()
                            .unwrap_or("")
                    })
                    .collect();
                if with_leafrefs {
                    leafref_prefixes(&module.parsed.stmt, &mut prefixes);
                }
                for prefix in prefixes {
                    if let Some((_, target)) =
                        module.imports.iter().find(|(p, _)| &**p == prefix)
                    {
                        if !self.modules[*target].implemented {
                            targets.push(*target);
                        }
                    }
                }
            }
            if targets.is_empty() {
                break;
            }
            targets.sort_unstable();
            targets.dedup();
            for target in targets {
                if let Err(error) = self.implement(target) {
                    log::debug!("{}", error);
                    self.log.warn(&error.to_string(), None);
                    return;
                }
            }
        }
    }

    fn load_dependency(
        &mut self,
        name: &str,
        revision: Option<&str>,
        implement: bool,
        stack: &mut Vec<String>,
    ) -> Result<usize> {
        if let Some(id) = self.find_loaded(name, revision) {
            if implement {
                self.implement(id)?;
            }
            return Ok(id);
        }
        if stack.iter().any(|loading| loading == name) {
            return Err(Error::valid(
                crate::error::ValidationErrorCode::Reference,
                format!("A circular dependency (import) for module \"{}\".", name),
            ));
        }

        let (source, format, filepath) =
            self.find_source(name, revision, None)?.ok_or_else(|| {
                Error::not_found(match revision {
                    Some(revision) => format!(
                        "Loading \"{}@{}\" module failed (not found).",
                        name, revision
                    ),
                    None => {
                        format!("Loading \"{}\" module failed (not found).", name)
                    }
                })
            })?;
        self.add_module(
            &source,
            format,
            filepath,
            implement,
            stack,
            Some((name, revision)),
        )
    }

    fn add_module(
        &mut self,
        source: &str,
        format: SchemaInputFormat,
        filepath: Option<String>,
        implement: bool,
        stack: &mut Vec<String>,
        expected: Option<(&str, Option<&str>)>,
    ) -> Result<usize> {
        let mut parsed = parse_module(source, format)?;
        if parsed.is_submodule {
            return Err(Error::inval(format!(
                "Input data contains submodule \"{}\" which cannot be parsed directly without its main module.",
                parsed.name
            )));
        }
        if let Some((name, revision)) = expected {
            if parsed.name != name {
                return Err(Error::inval(format!(
                    "Unexpected module \"{}\" parsed instead of \"{}\".",
                    parsed.name, name
                )));
            }
            if revision.is_some() && parsed.revision() != revision {
                return Err(Error::inval(format!(
                    "Module \"{}\" parsed with the wrong revision (\"{}\" instead \"{}\").",
                    name,
                    parsed.revision().unwrap_or("none"),
                    revision.unwrap_or("none")
                )));
            }
        }
        let revision = parsed.revision().map(Arc::from);
        if self.modules.iter().any(|m| {
            *m.name == *parsed.name && m.revision.as_deref() == revision.as_deref()
        }) {
            return Err(Error::new(
                ErrorCode::Exist,
                format!("Module \"{}\" is already present in the context.", parsed.name),
            ));
        }

        // Submodules.
        let mut submodules = Vec::new();
        let includes = parsed.includes.clone();
        for include in &includes {
            let (sub_source, sub_format, _) = self
                .find_source(
                    &parsed.name,
                    revision.as_deref(),
                    Some((&include.submodule, include.revision.as_deref())),
                )?
                .ok_or_else(|| {
                    Error::not_found(format!(
                        "Loading \"{}\" submodule of \"{}\" failed (not found).",
                        include.submodule, parsed.name
                    ))
                })?;
            let sub = parse_module(&sub_source, sub_format)?;
            if !sub.is_submodule || sub.name != include.submodule {
                return Err(Error::inval(format!(
                    "Included \"{}\" is not the expected submodule.",
                    include.submodule
                )));
            }
            if sub.belongs_to.as_deref() != Some(parsed.name.as_str()) {
                return Err(Error::inval(format!(
                    "Included \"{}\" submodule from \"{}\" belongs-to a different module \"{}\".",
                    include.submodule,
                    parsed.name,
                    sub.belongs_to.as_deref().unwrap_or("")
                )));
            }
            parsed.merge_submodule(&sub);
            submodules.push(Arc::new(sub));
        }

        // Imports.
        stack.push(parsed.name.clone());
        let mut imports = Vec::new();
        let implement_imports = self.options.contains(ContextFlags::ALL_IMPLEMENTED);
        for import in parsed.imports.clone() {
            if import.module == parsed.name {
                stack.pop();
                return Err(Error::inval(format!(
                    "Module \"{}\" imports itself.",
                    parsed.name
                )));
            }
            match self.load_dependency(
                &import.module,
                import.revision.as_deref(),
                implement_imports,
                stack,
            ) {
                Ok(id) => imports.push((Arc::from(import.prefix.as_str()), id)),
                Err(error) => {
                    stack.pop();
                    return Err(error);
                }
            }
        }
        stack.pop();

        if implement {
            if let Some(other) =
                self.modules.iter().find(|m| *m.name == *parsed.name && m.implemented)
            {
                return Err(Error::new(
                    ErrorCode::Denied,
                    format!(
                        "Module \"{}\" is already implemented in revision \"{}\".",
                        parsed.name,
                        other.revision.as_deref().unwrap_or("")
                    ),
                ));
            }
        }

        let features = parsed
            .features
            .iter()
            .map(|feature| (Arc::from(feature.name.as_str()), false))
            .collect();
        let entry = ModuleEntry {
            name: self.dict.insert(&parsed.name),
            revision,
            namespace: self
                .dict
                .insert(parsed.namespace.as_deref().unwrap_or_default()),
            prefix: self.dict.insert(&parsed.prefix),
            parsed: Arc::new(parsed),
            submodules,
            filepath,
            implemented: implement,
            internal: false,
            imports,
            features,
            format,
        };
        log::trace!(
            "module {}@{} added (implemented: {})",
            entry.name,
            entry.revision.as_deref().unwrap_or("-"),
            entry.implemented
        );
        self.modules.push(entry);
        Ok(self.modules.len() - 1)
    }

    /// Looks up a module or submodule source in the search directories and
    /// then through the module loader.
    fn find_source(
        &self,
        name: &str,
        revision: Option<&str>,
        submodule: Option<(&str, Option<&str>)>,
    ) -> Result<Option<(String, SchemaInputFormat, Option<String>)>> {
        let (file_name, file_revision) = match submodule {
            Some((sub, sub_rev)) => (sub, sub_rev),
            None => (name, revision),
        };

        if !self.options.contains(ContextFlags::DISABLE_SEARCHDIRS) {
            let mut candidates = Vec::new();
            for dir in &self.searchdirs {
                collect_candidates(dir, file_name, true, &mut candidates);
            }
            if !self.options.contains(ContextFlags::DISABLE_SEARCHDIR_CWD) {
                if let Ok(cwd) = std::env::current_dir() {
                    collect_candidates(&cwd, file_name, false, &mut candidates);
                }
            }
            let chosen = match file_revision {
                Some(wanted) => candidates
                    .iter()
                    .find(|(_, rev, _)| rev.as_deref() == Some(wanted))
                    .or_else(|| candidates.iter().find(|(_, rev, _)| rev.is_none())),
                None => candidates
                    .iter()
                    .max_by(|(_, a, _), (_, b, _)| a.cmp(b)),
            };
            if let Some((path, _, format)) = chosen {
                log::trace!("reading {}", path.display());
                let source = std::fs::read_to_string(path)?;
                return Ok(Some((
                    source,
                    *format,
                    Some(path.to_string_lossy().into_owned()),
                )));
            }
        }

        if let Some(loader) = &self.loader {
            let loaded = match submodule {
                Some((sub, sub_rev)) => loader.load(name, revision, Some(sub), sub_rev),
                None => loader.load(name, revision, None, None),
            };
            if let Some((source, format)) = loaded {
                return Ok(Some((source, format, None)));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("modules", &self.modules.len())
            .field("nodes", &self.schema.nodes.len())
            .field("options", &self.options)
            .field("module_set_id", &self.module_set_id)
            .finish()
    }
}

// ===== impl ModuleLoader =====

impl<F> ModuleLoader for F
where
    F: Fn(
            &str,
            Option<&str>,
            Option<&str>,
            Option<&str>,
        ) -> Option<(String, SchemaInputFormat)>
        + Send
        + Sync,
{
    fn load(
        &self,
        module: &str,
        revision: Option<&str>,
        submodule: Option<&str>,
        submodule_revision: Option<&str>,
    ) -> Option<(String, SchemaInputFormat)> {
        self(module, revision, submodule, submodule_revision)
    }
}

// ===== impl ModuleEntry =====

impl ModuleEntry {
    /// Module imported with the given prefix (the own prefix included).
    pub(crate) fn module_by_prefix(&self, self_id: usize, prefix: &str) -> Option<usize> {
        if *self.prefix == *prefix {
            return Some(self_id);
        }
        self.imports
            .iter()
            .find(|(p, _)| &**p == prefix)
            .map(|(_, id)| *id)
    }

    pub(crate) fn feature_enabled(&self, name: &str) -> Option<bool> {
        self.features
            .iter()
            .find(|(feature, _)| &**feature == name)
            .map(|(_, on)| *on)
    }
}

// ===== global functions =====

// Prefixes used in the leafref paths of a statement tree.
fn leafref_prefixes<'s>(stmt: &'s Stmt, prefixes: &mut Vec<&'s str>) {
    if stmt.keyword == "path" {
        let segments = stmt.arg.as_deref().unwrap_or_default().split('/');
        for segment in segments {
            if let Some((prefix, _)) = segment.split_once(':') {
                let prefix = prefix.trim_start_matches(['[', ' ']).trim();
                if !prefix.is_empty()
                    && prefix
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
                {
                    prefixes.push(prefix);
                }
            }
        }
    }
    for substmt in &stmt.substmts {
        leafref_prefixes(substmt, prefixes);
    }
}

fn collect_candidates(
    dir: &Path,
    name: &str,
    recursive: bool,
    out: &mut Vec<(PathBuf, Option<String>, SchemaInputFormat)>,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                collect_candidates(&path, name, recursive, out);
            }
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|f| f.to_str()) else {
            continue;
        };
        let (stem, format) = if let Some(stem) = file_name.strip_suffix(".yang") {
            (stem, SchemaInputFormat::YANG)
        } else if let Some(stem) = file_name.strip_suffix(".yin") {
            (stem, SchemaInputFormat::YIN)
        } else {
            continue;
        };
        let (file_module, revision) = match stem.split_once('@') {
            Some((module, revision)) => (module, Some(revision.to_owned())),
            None => (stem, None),
        };
        if file_module == name {
            out.push((path.clone(), revision, format));
        }
    }
}

/// Maps a prefix to a module index. Unprefixed names belong to `default`.
pub(crate) fn resolve_prefix(
    modules: &[ModuleEntry],
    prefixes: &Prefixes<'_>,
    prefix: Option<&str>,
    default: usize,
) -> Option<usize> {
    let Some(prefix) = prefix else {
        return Some(default);
    };
    match prefixes {
        Prefixes::Schema(module) => modules[*module].module_by_prefix(*module, prefix),
        Prefixes::Json => modules
            .iter()
            .position(|m| &*m.name == prefix && m.implemented)
            .or_else(|| modules.iter().position(|m| &*m.name == prefix)),
        Prefixes::Xml(namespaces) => {
            let ns = namespaces
                .iter()
                .rev()
                .find(|(p, _)| p == prefix)
                .map(|(_, ns)| ns.as_str())?;
            modules
                .iter()
                .position(|m| &*m.namespace == ns && m.implemented)
                .or_else(|| modules.iter().position(|m| &*m.namespace == ns))
        }
    }
}
