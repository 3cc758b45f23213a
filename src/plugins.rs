//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Type and extension plugins.
//!
//! Plugins are registered on a [`Context`](crate::context::Context) before
//! compilation. Type plugins refine the canonical form of values of a given
//! typedef, extension plugins check extension instances, and the pattern
//! matcher compiles `pattern` restrictions.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::schema::parsed::ExtensionInstance;

/// Canonicalization and validation of values of one typedef.
pub trait TypePlugin: Send + Sync {
    /// Plugin identifier used in log messages.
    fn id(&self) -> &str;

    /// Validates a value already accepted by the built-in type rules and
    /// returns its canonical form.
    fn store(&self, value: &str) -> Result<String, String>;
}

/// Compile-time handling of extension instances.
pub trait ExtensionPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// Checks one instance of the extension.
    fn compile(&self, ext: &ExtensionInstance) -> Result<(), String>;
}

/// A compiled `pattern` restriction.
pub trait CompiledPattern: Send + Sync {
    fn is_match(&self, value: &str) -> bool;
}

/// Compiles XML Schema regular expressions used by `pattern`.
pub trait PatternMatcher: Send + Sync {
    fn compile(&self, pattern: &str) -> Result<Box<dyn CompiledPattern>, String>;
}

/// Default pattern matcher backed by the `regex` crate.
#[derive(Debug, Default)]
pub struct RegexMatcher {
    _private: (),
}

struct RegexPattern(regex::Regex);

/// Checks `md:annotation` instances.
#[derive(Debug, Default)]
pub struct AnnotationPlugin {
    _private: (),
}

/// Canonical IPv4 address (`ietf-inet-types`).
#[derive(Debug, Default)]
pub struct Ipv4AddressPlugin {
    _private: (),
}

/// Canonical IPv6 address (`ietf-inet-types`).
#[derive(Debug, Default)]
pub struct Ipv6AddressPlugin {
    _private: (),
}

/// Registry mapping typedefs and extensions to their plugins.
#[derive(Clone)]
pub struct PluginRegistry {
    types: HashMap<(String, String), Arc<dyn TypePlugin>>,
    extensions: HashMap<(String, String), Arc<dyn ExtensionPlugin>>,
    matcher: Arc<dyn PatternMatcher>,
}

// ===== impl RegexMatcher =====

impl RegexMatcher {
    /// Translates an XML Schema regular expression into `regex` syntax.
    ///
    /// XSD expressions are implicitly anchored and treat `^` and `$` as
    /// literals outside character classes.
    pub fn translate(pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 8);
        out.push_str("^(?:");
        let mut class_depth = 0;
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some('i') => out.push_str("[A-Za-z_:]"),
                    Some('I') => out.push_str("[^A-Za-z_:]"),
                    Some('c') => out.push_str("[A-Za-z0-9._:\\-]"),
                    Some('C') => out.push_str("[^A-Za-z0-9._:\\-]"),
                    Some(next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => out.push_str("\\\\"),
                },
                '[' => {
                    class_depth += 1;
                    out.push('[');
                }
                ']' if class_depth > 0 => {
                    class_depth -= 1;
                    out.push(']');
                }
                // Character class subtraction.
                '-' if class_depth > 0 && chars.peek() == Some(&'[') => {
                    out.push_str("--");
                }
                '^' if class_depth == 0 => out.push_str("\\^"),
                '$' if class_depth == 0 => out.push_str("\\$"),
                c => out.push(c),
            }
        }
        out.push_str(")$");
        out
    }
}

impl PatternMatcher for RegexMatcher {
    fn compile(&self, pattern: &str) -> Result<Box<dyn CompiledPattern>, String> {
        let translated = RegexMatcher::translate(pattern);
        regex::Regex::new(&translated)
            .map(|re| Box::new(RegexPattern(re)) as Box<dyn CompiledPattern>)
            .map_err(|error| {
                format!("Regular expression \"{}\" is not valid ({}).", pattern, error)
            })
    }
}

impl CompiledPattern for RegexPattern {
    fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

// ===== impl AnnotationPlugin =====

impl ExtensionPlugin for AnnotationPlugin {
    fn id(&self) -> &str {
        "ietf-yang-metadata:annotation"
    }

    fn compile(&self, ext: &ExtensionInstance) -> Result<(), String> {
        if ext.arg.is_none() {
            return Err("Annotation without a name.".to_owned());
        }
        match ext.substmts.iter().filter(|s| s.keyword == "type").count() {
            1 => Ok(()),
            0 => Err(format!(
                "Annotation \"{}\" is missing its \"type\".",
                ext.arg.as_deref().unwrap_or_default()
            )),
            _ => Err(format!(
                "Annotation \"{}\" has more than one \"type\".",
                ext.arg.as_deref().unwrap_or_default()
            )),
        }
    }
}

// ===== impl Ipv4AddressPlugin =====

impl TypePlugin for Ipv4AddressPlugin {
    fn id(&self) -> &str {
        "ipv4-address-no-zone"
    }

    fn store(&self, value: &str) -> Result<String, String> {
        value
            .parse::<Ipv4Addr>()
            .map(|addr| addr.to_string())
            .map_err(|_| format!("Invalid IPv4 address \"{}\".", value))
    }
}

// ===== impl Ipv6AddressPlugin =====

impl TypePlugin for Ipv6AddressPlugin {
    fn id(&self) -> &str {
        "ipv6-address-no-zone"
    }

    fn store(&self, value: &str) -> Result<String, String> {
        value
            .parse::<Ipv6Addr>()
            .map(|addr| addr.to_string())
            .map_err(|_| format!("Invalid IPv6 address \"{}\".", value))
    }
}

// ===== impl PluginRegistry =====

impl PluginRegistry {
    /// Creates a registry with the built-in plugins.
    pub fn new() -> PluginRegistry {
        let mut registry = PluginRegistry {
            types: HashMap::new(),
            extensions: HashMap::new(),
            matcher: Arc::new(RegexMatcher::default()),
        };
        registry.register_extension(
            "ietf-yang-metadata",
            "annotation",
            Arc::new(AnnotationPlugin::default()),
        );
        registry.register_type(
            "ietf-inet-types",
            "ipv4-address-no-zone",
            Arc::new(Ipv4AddressPlugin::default()),
        );
        registry.register_type(
            "ietf-inet-types",
            "ipv6-address-no-zone",
            Arc::new(Ipv6AddressPlugin::default()),
        );
        registry
    }

    pub fn register_type(
        &mut self,
        module: &str,
        typedef: &str,
        plugin: Arc<dyn TypePlugin>,
    ) {
        self.types
            .insert((module.to_owned(), typedef.to_owned()), plugin);
    }

    pub fn register_extension(
        &mut self,
        module: &str,
        extension: &str,
        plugin: Arc<dyn ExtensionPlugin>,
    ) {
        self.extensions
            .insert((module.to_owned(), extension.to_owned()), plugin);
    }

    pub fn set_pattern_matcher(&mut self, matcher: Arc<dyn PatternMatcher>) {
        self.matcher = matcher;
    }

    pub(crate) fn type_plugin(
        &self,
        module: &str,
        typedef: &str,
    ) -> Option<Arc<dyn TypePlugin>> {
        self.types
            .get(&(module.to_owned(), typedef.to_owned()))
            .cloned()
    }

    pub(crate) fn extension_plugin(
        &self,
        module: &str,
        extension: &str,
    ) -> Option<Arc<dyn ExtensionPlugin>> {
        self.extensions
            .get(&(module.to_owned(), extension.to_owned()))
            .cloned()
    }

    pub(crate) fn matcher(&self) -> &dyn PatternMatcher {
        self.matcher.as_ref()
    }
}

impl Default for PluginRegistry {
    fn default() -> PluginRegistry {
        PluginRegistry::new()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, value: &str) -> bool {
        RegexMatcher::default()
            .compile(pattern)
            .unwrap()
            .is_match(value)
    }

    #[test]
    fn patterns_are_anchored() {
        assert!(matches("[0-9]+", "123"));
        assert!(!matches("[0-9]+", "a123"));
        assert!(!matches("[0-9]+", "123a"));
        assert!(matches("a|b", "b"));
    }

    #[test]
    fn xsd_literals() {
        assert!(matches("$x^", "$x^"));
        assert!(matches("[^a]", "b"));
        assert!(matches("\\i\\c*", "ab-c"));
        assert!(!matches("[a-z-[aeiou]]+", "ae"));
        assert!(matches("[a-z-[aeiou]]+", "bcd"));
    }

    #[test]
    fn address_plugins() {
        let v4 = Ipv4AddressPlugin::default();
        assert_eq!(v4.store("192.0.2.1").unwrap(), "192.0.2.1");
        assert!(v4.store("192.0.2.256").is_err());
        let v6 = Ipv6AddressPlugin::default();
        assert_eq!(v6.store("2001:DB8:0:0::1").unwrap(), "2001:db8::1");
    }

    #[test]
    fn annotation_plugin() {
        let plugin = AnnotationPlugin::default();
        let mut ext = ExtensionInstance {
            prefix: "md".to_owned(),
            name: "annotation".to_owned(),
            arg: Some("op".to_owned()),
            substmts: vec![],
            line: 1,
        };
        assert!(plugin.compile(&ext).is_err());
        ext.substmts
            .push(crate::parser::Stmt::new("type", Some("string")));
        assert!(plugin.compile(&ext).is_ok());
    }
}
