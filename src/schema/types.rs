//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Compiled types and typed values.

use base64::Engine;
use std::sync::{Arc, OnceLock};

use crate::context::{resolve_prefix, ModuleEntry, Prefixes};
use crate::path::{parse_data_path, PathPredicate};
use crate::plugins::{CompiledPattern, TypePlugin};
use crate::schema::{DataValue, DataValueType, SchemaNodeKind, SchemaStore};
use crate::utils::quote_value;
use crate::xpath::Expr;

/// A compiled type: built-in base type plus accumulated restrictions.
#[derive(Clone)]
pub(crate) struct CompiledType {
    pub base: DataValueType,
    /// Name of the typedef this type was derived from.
    pub name: Option<Arc<str>>,
    /// Module defining the typedef.
    pub module: Option<usize>,
    pub range: Option<Restriction>,
    pub length: Option<Restriction>,
    pub patterns: Vec<Pattern>,
    pub enums: Vec<EnumItem>,
    pub bits: Vec<BitItem>,
    pub fraction_digits: u8,
    pub bases: Vec<usize>,
    pub path: Option<LeafrefPath>,
    pub require_instance: bool,
    pub realtype: OnceLock<Arc<CompiledType>>,
    pub types: Vec<Arc<CompiledType>>,
    pub default: Option<(Arc<str>, usize)>,
    pub units: Option<Arc<str>>,
    pub plugin: Option<Arc<dyn TypePlugin>>,
}

/// Range or length restriction as sorted disjoint intervals.
#[derive(Clone, Debug)]
pub(crate) struct Restriction {
    pub parts: Vec<(i128, i128)>,
    pub source: Arc<str>,
    pub error_message: Option<Arc<str>>,
    pub error_app_tag: Option<Arc<str>>,
}

#[derive(Clone)]
pub(crate) struct Pattern {
    pub source: Arc<str>,
    pub matcher: Arc<dyn CompiledPattern>,
    pub inverted: bool,
    pub error_message: Option<Arc<str>>,
    pub error_app_tag: Option<Arc<str>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct EnumItem {
    pub name: Arc<str>,
    pub value: i32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct BitItem {
    pub name: Arc<str>,
    pub position: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct LeafrefPath {
    pub expr: Arc<Expr>,
    pub source: Arc<str>,
    pub module: usize,
}

/// A stored (validated, canonical) value.
#[derive(Clone, Debug)]
pub(crate) struct Value {
    pub canonical: Arc<str>,
    pub typed: DataValue,
    /// Base type of the type that accepted the value.
    pub base: DataValueType,
    /// Identity of identityref values.
    pub ident: Option<usize>,
    /// Union member that accepted the value.
    pub member: Option<Arc<CompiledType>>,
}

/// Failure to store a value.
#[derive(Clone, Debug)]
pub(crate) struct TypeError {
    pub msg: String,
    pub apptag: Option<String>,
    pub plugin: bool,
}

/// JSON type a value was encoded with (RFC 7951, section 6).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Encoding {
    /// Plain text: XML, paths, schema defaults.
    Text,
    String,
    Number,
    Bool,
    Empty,
}

/// Everything value storing needs to resolve prefixes and identities.
pub(crate) struct ValueEnv<'a> {
    pub modules: &'a [ModuleEntry],
    pub store: &'a SchemaStore,
    pub prefixes: Prefixes<'a>,
    /// Module of unprefixed names.
    pub module: usize,
    pub encoding: Encoding,
}

// ===== impl CompiledType =====

impl CompiledType {
    pub(crate) fn builtin(base: DataValueType) -> CompiledType {
        CompiledType {
            base,
            name: None,
            module: None,
            range: None,
            length: None,
            patterns: Vec::new(),
            enums: Vec::new(),
            bits: Vec::new(),
            fraction_digits: 0,
            bases: Vec::new(),
            path: None,
            require_instance: true,
            realtype: OnceLock::new(),
            types: Vec::new(),
            default: None,
            units: None,
            plugin: None,
        }
    }

    /// Current bounds of range/length restrictions.
    pub(crate) fn bounds(&self, length: bool) -> Vec<(i128, i128)> {
        let restriction = if length { &self.length } else { &self.range };
        match restriction {
            Some(restr) => restr.parts.clone(),
            None if length => vec![(0, u64::MAX as i128)],
            None => vec![type_limits(self.base)],
        }
    }

    /// Type values are checked against: the leafref target type, or self.
    pub(crate) fn resolved(self: &Arc<Self>) -> Option<Arc<CompiledType>> {
        if self.base == DataValueType::LeafRef {
            self.realtype.get().cloned()
        } else {
            Some(self.clone())
        }
    }

    /// Whether values of this type contain prefixes.
    pub(crate) fn uses_prefixes(&self) -> bool {
        match self.base {
            DataValueType::IdentityRef | DataValueType::InstanceId => true,
            DataValueType::Union => self.types.iter().any(|t| t.uses_prefixes()),
            DataValueType::LeafRef => self
                .realtype
                .get()
                .map(|t| t.uses_prefixes())
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl std::fmt::Debug for CompiledType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledType")
            .field("base", &self.base)
            .field("name", &self.name)
            .finish()
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("inverted", &self.inverted)
            .finish()
    }
}

// ===== impl TypeError =====

impl TypeError {
    fn new(msg: impl Into<String>) -> TypeError {
        TypeError {
            msg: msg.into(),
            apptag: None,
            plugin: false,
        }
    }
}

// ===== impl ValueEnv =====

impl ValueEnv<'_> {
    fn resolve(&self, prefix: Option<&str>) -> Option<usize> {
        resolve_prefix(self.modules, &self.prefixes, prefix, self.module)
    }
}

// ===== global functions =====

/// Maps a built-in type name to its base type.
pub(crate) fn builtin_base(name: &str) -> Option<DataValueType> {
    let base = match name {
        "binary" => DataValueType::Binary,
        "bits" => DataValueType::Bits,
        "boolean" => DataValueType::Bool,
        "decimal64" => DataValueType::Dec64,
        "empty" => DataValueType::Empty,
        "enumeration" => DataValueType::Enum,
        "identityref" => DataValueType::IdentityRef,
        "instance-identifier" => DataValueType::InstanceId,
        "int8" => DataValueType::Int8,
        "int16" => DataValueType::Int16,
        "int32" => DataValueType::Int32,
        "int64" => DataValueType::Int64,
        "leafref" => DataValueType::LeafRef,
        "string" => DataValueType::String,
        "uint8" => DataValueType::Uint8,
        "uint16" => DataValueType::Uint16,
        "uint32" => DataValueType::Uint32,
        "uint64" => DataValueType::Uint64,
        "union" => DataValueType::Union,
        _ => return None,
    };
    Some(base)
}

// ===== impl Encoding =====

impl Encoding {
    /// JSON encoding of values of a base type. Unions and leafrefs defer to
    /// their member and target types.
    pub(crate) fn of(base: DataValueType) -> Option<Encoding> {
        match base {
            DataValueType::Int8
            | DataValueType::Int16
            | DataValueType::Int32
            | DataValueType::Uint8
            | DataValueType::Uint16
            | DataValueType::Uint32 => Some(Encoding::Number),
            DataValueType::Bool => Some(Encoding::Bool),
            DataValueType::Empty => Some(Encoding::Empty),
            DataValueType::Union | DataValueType::LeafRef | DataValueType::Unknown => None,
            _ => Some(Encoding::String),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Encoding::Text => "text",
            Encoding::String => "string",
            Encoding::Number => "number",
            Encoding::Bool => "boolean",
            Encoding::Empty => "empty",
        }
    }
}

/// YANG name of a base type.
pub(crate) fn base_name(base: DataValueType) -> &'static str {
    match base {
        DataValueType::Unknown => "unknown",
        DataValueType::Binary => "binary",
        DataValueType::Uint8 => "uint8",
        DataValueType::Uint16 => "uint16",
        DataValueType::Uint32 => "uint32",
        DataValueType::Uint64 => "uint64",
        DataValueType::String => "string",
        DataValueType::Bits => "bits",
        DataValueType::Bool => "boolean",
        DataValueType::Dec64 => "decimal64",
        DataValueType::Empty => "empty",
        DataValueType::Enum => "enumeration",
        DataValueType::IdentityRef => "identityref",
        DataValueType::InstanceId => "instance-identifier",
        DataValueType::LeafRef => "leafref",
        DataValueType::Union => "union",
        DataValueType::Int8 => "int8",
        DataValueType::Int16 => "int16",
        DataValueType::Int32 => "int32",
        DataValueType::Int64 => "int64",
    }
}

/// Value limits of numeric base types (decimal64 scaled).
pub(crate) fn type_limits(base: DataValueType) -> (i128, i128) {
    match base {
        DataValueType::Int8 => (i8::MIN as i128, i8::MAX as i128),
        DataValueType::Int16 => (i16::MIN as i128, i16::MAX as i128),
        DataValueType::Int32 => (i32::MIN as i128, i32::MAX as i128),
        DataValueType::Int64 | DataValueType::Dec64 => {
            (i64::MIN as i128, i64::MAX as i128)
        }
        DataValueType::Uint8 => (0, u8::MAX as i128),
        DataValueType::Uint16 => (0, u16::MAX as i128),
        DataValueType::Uint32 => (0, u32::MAX as i128),
        DataValueType::Uint64 => (0, u64::MAX as i128),
        _ => (0, u64::MAX as i128),
    }
}

pub(crate) fn is_integer(base: DataValueType) -> bool {
    matches!(
        base,
        DataValueType::Int8
            | DataValueType::Int16
            | DataValueType::Int32
            | DataValueType::Int64
            | DataValueType::Uint8
            | DataValueType::Uint16
            | DataValueType::Uint32
            | DataValueType::Uint64
    )
}

fn parse_integer(text: &str) -> Option<i128> {
    let digits = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = digits.parse::<i128>().ok()?;
    if text.starts_with('-') {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Parses a decimal64 lexical value scaled by `10^digits`.
pub(crate) fn parse_decimal(text: &str, digits: u8) -> Option<i128> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) if !f.is_empty() => (i, f),
        Some(_) => return None,
        None => (body, ""),
    };
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
        || frac_part.len() > digits as usize
    {
        return None;
    }
    let mut value = int_part.parse::<i128>().ok()?;
    let mut frac_digits = 0;
    for b in frac_part.bytes() {
        value = value * 10 + (b - b'0') as i128;
        frac_digits += 1;
    }
    for _ in frac_digits..digits {
        value *= 10;
    }
    Some(if negative { -value } else { value })
}

/// Canonical decimal64 form: no leading zeros, at least one fraction digit.
pub(crate) fn format_decimal(value: i128, digits: u8) -> String {
    let scale = 10i128.pow(digits as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    let int_part = abs / scale;
    let frac = format!("{:0width$}", abs % scale, width = digits as usize);
    let frac = frac.trim_end_matches('0');
    let frac = if frac.is_empty() { "0" } else { frac };
    format!("{}{}.{}", sign, int_part, frac)
}

/// Parses a range or length expression, checking it narrows `current`.
pub(crate) fn parse_restriction(
    arg: &str,
    base: DataValueType,
    digits: u8,
    current: &[(i128, i128)],
) -> Result<Vec<(i128, i128)>, String> {
    let lowest = current.first().map(|p| p.0).unwrap_or(0);
    let highest = current.last().map(|p| p.1).unwrap_or(0);
    let bound = |text: &str| -> Result<i128, String> {
        let text = text.trim();
        match text {
            "min" => Ok(lowest),
            "max" => Ok(highest),
            _ => {
                let value = if base == DataValueType::Dec64 {
                    parse_decimal(text, digits)
                } else {
                    parse_integer(text)
                };
                value.ok_or_else(|| format!("Invalid bound \"{}\".", text))
            }
        }
    };

    let mut parts: Vec<(i128, i128)> = Vec::new();
    for part in arg.split('|') {
        let (lo, hi) = match part.split_once("..") {
            Some((lo, hi)) => (bound(lo)?, bound(hi)?),
            None => {
                let value = bound(part)?;
                (value, value)
            }
        };
        if lo > hi {
            return Err(format!(
                "Invalid restriction \"{}\" - the lower bound is bigger than the upper one.",
                arg
            ));
        }
        if let Some(last) = parts.last() {
            if lo <= last.1 {
                return Err(format!(
                    "Invalid restriction \"{}\" - values are not in ascending order.",
                    arg
                ));
            }
        }
        if !current.iter().any(|(clo, chi)| *clo <= lo && hi <= *chi) {
            return Err(format!(
                "Invalid restriction \"{}\" - the derived restriction is not equally or more limiting.",
                arg
            ));
        }
        parts.push((lo, hi));
    }
    Ok(parts)
}

fn check_restriction(
    restriction: &Option<Restriction>,
    value: i128,
    msg: impl FnOnce() -> String,
) -> Result<(), TypeError> {
    if let Some(restr) = restriction {
        if !restr.parts.iter().any(|(lo, hi)| *lo <= value && value <= *hi) {
            return Err(TypeError {
                msg: restr
                    .error_message
                    .as_deref()
                    .map(str::to_owned)
                    .unwrap_or_else(msg),
                apptag: restr.error_app_tag.as_deref().map(str::to_owned),
                plugin: false,
            });
        }
    }
    Ok(())
}

fn typed_integer(base: DataValueType, value: i128) -> DataValue {
    match base {
        DataValueType::Int8 => DataValue::Int8(value as i8),
        DataValueType::Int16 => DataValue::Int16(value as i16),
        DataValueType::Int32 => DataValue::Int32(value as i32),
        DataValueType::Int64 => DataValue::Int64(value as i64),
        DataValueType::Uint8 => DataValue::Uint8(value as u8),
        DataValueType::Uint16 => DataValue::Uint16(value as u16),
        DataValueType::Uint32 => DataValue::Uint32(value as u32),
        _ => DataValue::Uint64(value as u64),
    }
}

fn value(canonical: String, typed: DataValue, base: DataValueType) -> Value {
    Value {
        canonical: Arc::from(canonical),
        typed,
        base,
        ident: None,
        member: None,
    }
}

/// Validates `text` against the type and returns the stored value.
pub(crate) fn store_value(
    ty: &Arc<CompiledType>,
    text: &str,
    env: &ValueEnv<'_>,
) -> Result<Value, TypeError> {
    let mut stored = store_builtin(ty, text, env)?;
    if let Some(plugin) = &ty.plugin {
        let canonical = plugin.store(&stored.canonical).map_err(|msg| {
            TypeError {
                msg,
                apptag: None,
                plugin: true,
            }
        })?;
        if let DataValue::Other(_) = stored.typed {
            stored.typed = DataValue::Other(canonical.clone());
        }
        stored.canonical = Arc::from(canonical);
    }
    Ok(stored)
}

fn store_builtin(
    ty: &Arc<CompiledType>,
    text: &str,
    env: &ValueEnv<'_>,
) -> Result<Value, TypeError> {
    let base = ty.base;
    if let Some(expected) = Encoding::of(base) {
        if env.encoding != Encoding::Text && env.encoding != expected {
            return Err(TypeError::new(format!(
                "Invalid non-{}-encoded {} value \"{}\".",
                expected.name(),
                base_name(base),
                text
            )));
        }
    }
    match base {
        _ if is_integer(base) => {
            let number = parse_integer(text).ok_or_else(|| {
                TypeError::new(format!(
                    "Invalid type {} value \"{}\".",
                    base_name(base),
                    text
                ))
            })?;
            let (min, max) = type_limits(base);
            if number < min || number > max {
                return Err(TypeError::new(format!(
                    "Value \"{}\" is out of type {} min/max bounds.",
                    text,
                    base_name(base)
                )));
            }
            check_restriction(&ty.range, number, || {
                format!("Unsatisfied range - value \"{}\" is out of the allowed range.", text)
            })?;
            Ok(value(number.to_string(), typed_integer(base, number), base))
        }
        DataValueType::Dec64 => {
            let number = parse_decimal(text, ty.fraction_digits)
                .filter(|n| *n >= i64::MIN as i128 && *n <= i64::MAX as i128)
                .ok_or_else(|| {
                    TypeError::new(format!(
                        "Invalid type decimal64 value \"{}\".",
                        text
                    ))
                })?;
            check_restriction(&ty.range, number, || {
                format!("Unsatisfied range - value \"{}\" is out of the allowed range.", text)
            })?;
            let canonical = format_decimal(number, ty.fraction_digits);
            Ok(value(canonical.clone(), DataValue::Other(canonical), base))
        }
        DataValueType::String => {
            let length = text.chars().count() as i128;
            check_restriction(&ty.length, length, || {
                format!(
                    "Unsatisfied length - string \"{}\" length is not allowed.",
                    text
                )
            })?;
            for pattern in &ty.patterns {
                if pattern.matcher.is_match(text) == pattern.inverted {
                    return Err(TypeError {
                        msg: pattern
                            .error_message
                            .as_deref()
                            .map(str::to_owned)
                            .unwrap_or_else(|| {
                                if pattern.inverted {
                                    format!(
                                        "Unsatisfied pattern - \"{}\" does not conform to inverted \"{}\".",
                                        text, pattern.source
                                    )
                                } else {
                                    format!(
                                        "Unsatisfied pattern - \"{}\" does not conform to \"{}\".",
                                        text, pattern.source
                                    )
                                }
                            }),
                        apptag: pattern.error_app_tag.as_deref().map(str::to_owned),
                        plugin: false,
                    });
                }
            }
            Ok(value(text.to_owned(), DataValue::Other(text.to_owned()), base))
        }
        DataValueType::Bool => match text {
            "true" => Ok(value("true".to_owned(), DataValue::Bool(true), base)),
            "false" => Ok(value("false".to_owned(), DataValue::Bool(false), base)),
            _ => Err(TypeError::new(format!(
                "Invalid boolean value \"{}\".",
                text
            ))),
        },
        DataValueType::Empty => {
            if text.is_empty() {
                Ok(value(String::new(), DataValue::Empty, base))
            } else {
                Err(TypeError::new(format!(
                    "Invalid empty value length {}.",
                    text.len()
                )))
            }
        }
        DataValueType::Enum => {
            match ty.enums.iter().find(|item| &*item.name == text) {
                Some(item) => Ok(value(
                    item.name.to_string(),
                    DataValue::Other(item.name.to_string()),
                    base,
                )),
                None => Err(TypeError::new(format!(
                    "Invalid enumeration value \"{}\".",
                    text
                ))),
            }
        }
        DataValueType::Bits => {
            let mut set: Vec<&BitItem> = Vec::new();
            for name in text.split_whitespace() {
                let bit = ty
                    .bits
                    .iter()
                    .find(|bit| &*bit.name == name)
                    .ok_or_else(|| {
                        TypeError::new(format!("Invalid bit \"{}\".", name))
                    })?;
                if set.iter().any(|b| b.position == bit.position) {
                    return Err(TypeError::new(format!(
                        "Bit \"{}\" defined multiple times.",
                        name
                    )));
                }
                set.push(bit);
            }
            set.sort_by_key(|bit| bit.position);
            let canonical = set
                .iter()
                .map(|bit| bit.name.as_ref())
                .collect::<Vec<_>>()
                .join(" ");
            Ok(value(canonical.clone(), DataValue::Other(canonical), base))
        }
        DataValueType::Binary => {
            let compact: String =
                text.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact.as_bytes())
                .map_err(|_| {
                    TypeError::new(format!(
                        "Invalid Base64 character in \"{}\".",
                        text
                    ))
                })?;
            check_restriction(&ty.length, bytes.len() as i128, || {
                format!(
                    "Unsatisfied length - binary value length {} is not allowed.",
                    bytes.len()
                )
            })?;
            let canonical =
                base64::engine::general_purpose::STANDARD.encode(&bytes);
            Ok(value(canonical.clone(), DataValue::Other(canonical), base))
        }
        DataValueType::IdentityRef => store_identityref(ty, text, env),
        DataValueType::InstanceId => {
            let canonical = canonical_instance_id(text, env)
                .map_err(TypeError::new)?;
            Ok(value(canonical.clone(), DataValue::Other(canonical), base))
        }
        DataValueType::LeafRef => {
            let real = ty.realtype.get().ok_or_else(|| {
                TypeError::new("Leafref type is not resolved.")
            })?;
            store_value(real, text, env)
        }
        DataValueType::Union => {
            for member in &ty.types {
                if let Ok(mut stored) = store_value(member, text, env) {
                    if stored.member.is_none() {
                        stored.member = Some(member.clone());
                    }
                    return Ok(stored);
                }
            }
            Err(TypeError::new(format!(
                "Invalid union value \"{}\" - no matching subtype found.",
                text
            )))
        }
        DataValueType::Unknown => {
            Err(TypeError::new("Value of unknown type."))
        }
        _ => Err(TypeError::new("Unsupported type.")),
    }
}

fn store_identityref(
    ty: &CompiledType,
    text: &str,
    env: &ValueEnv<'_>,
) -> Result<Value, TypeError> {
    let (prefix, name) = match text.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, text),
    };
    let module = env.resolve(prefix).ok_or_else(|| {
        TypeError::new(format!(
            "Invalid identityref \"{}\" value - unable to map prefix to YANG schema.",
            text
        ))
    })?;
    let ident = env.store.identity(module, name).ok_or_else(|| {
        TypeError::new(format!(
            "Invalid identityref \"{}\" value - identity not found in module \"{}\".",
            text, env.modules[module].name
        ))
    })?;
    for base in &ty.bases {
        if !env.store.identity_derived_from(ident, *base) {
            return Err(TypeError::new(format!(
                "Invalid identityref \"{}\" value - identity not derived from the base \"{}\".",
                text,
                env.store.identity_name(env.modules, *base)
            )));
        }
    }
    let canonical = format!("{}:{}", env.modules[module].name, name);
    Ok(Value {
        canonical: Arc::from(canonical.as_str()),
        typed: DataValue::Other(canonical),
        base: DataValueType::IdentityRef,
        ident: Some(ident),
        member: None,
    })
}

/// Converts an instance-identifier into its canonical (JSON) form after
/// checking every step against the schema.
fn canonical_instance_id(
    text: &str,
    env: &ValueEnv<'_>,
) -> Result<String, String> {
    let segments = parse_data_path(text.trim()).map_err(|e| e.to_string())?;
    let mut canonical = String::new();
    let mut parent: Option<usize> = None;
    let mut prev_module: Option<usize> = None;
    for segment in &segments {
        let module = match &segment.prefix {
            Some(prefix) => env.resolve(Some(prefix)),
            None => prev_module,
        }
        .ok_or_else(|| format!("Invalid instance-identifier \"{}\".", text))?;
        let snode = env
            .store
            .find_data_child(parent, module, &segment.name)
            .ok_or_else(|| {
                format!(
                    "Invalid instance-identifier \"{}\" value - node \"{}\" not found.",
                    text, segment.name
                )
            })?;
        canonical.push('/');
        if prev_module != Some(module) {
            canonical.push_str(&env.modules[module].name);
            canonical.push(':');
        }
        canonical.push_str(&segment.name);
        for pred in &segment.predicates {
            match pred {
                PathPredicate::Key { prefix, name, value } => {
                    let key_module = match prefix {
                        Some(prefix) => env.resolve(Some(prefix)),
                        None => Some(module),
                    }
                    .ok_or_else(|| {
                        format!("Invalid instance-identifier \"{}\".", text)
                    })?;
                    let key = env
                        .store
                        .find_data_child(Some(snode), key_module, name)
                        .filter(|k| {
                            env.store.nodes[*k].kind == SchemaNodeKind::Leaf
                        })
                        .ok_or_else(|| {
                            format!(
                                "Invalid instance-identifier \"{}\" value - key \"{}\" not found.",
                                text, name
                            )
                        })?;
                    let stored = match env.store.nodes[key].leaf_type() {
                        Some(kty) => store_value(kty, value, env)
                            .map_err(|e| e.msg)?
                            .canonical
                            .to_string(),
                        None => value.clone(),
                    };
                    canonical.push_str(&format!(
                        "[{}={}]",
                        name,
                        quote_value(&stored)
                    ));
                }
                PathPredicate::Value(value) => {
                    let stored = match env.store.nodes[snode].leaf_type() {
                        Some(lty) => store_value(lty, value, env)
                            .map_err(|e| e.msg)?
                            .canonical
                            .to_string(),
                        None => value.clone(),
                    };
                    canonical.push_str(&format!("[.={}]", quote_value(&stored)));
                }
                PathPredicate::Position(position) => {
                    canonical.push_str(&format!("[{}]", position));
                }
            }
        }
        parent = Some(snode);
        prev_module = Some(module);
    }
    Ok(canonical)
}

/// Prints a stored value using the given prefixes (XML needs namespace
/// prefixes for identityrefs). Returns the text and used modules.
pub(crate) fn print_value_xml(
    value: &Value,
    modules: &[ModuleEntry],
    store: &SchemaStore,
) -> (String, Vec<usize>) {
    match value.base {
        DataValueType::IdentityRef => match value.ident {
            Some(ident) => {
                let identity = &store.identities[ident];
                let module = &modules[identity.module];
                (
                    format!("{}:{}", module.prefix, identity.name),
                    vec![identity.module],
                )
            }
            None => (value.canonical.to_string(), Vec::new()),
        },
        DataValueType::InstanceId => {
            // Module names of the canonical form become prefixes, unprefixed
            // steps and keys take the prefix of the previous module.
            let mut used: Vec<usize> = Vec::new();
            let mut out = String::new();
            let mut current: Option<usize> = None;
            let mut quote: Option<char> = None;
            let mut chars = value.canonical.chars().peekable();
            while let Some(c) = chars.next() {
                out.push(c);
                if let Some(q) = quote {
                    if c == q {
                        quote = None;
                    }
                    continue;
                }
                match c {
                    '\'' | '"' => quote = Some(c),
                    '/' | '[' => {
                        let mut name = String::new();
                        while let Some(&n) = chars.peek() {
                            if n.is_alphanumeric()
                                || matches!(n, '_' | '-' | '.' | ':')
                            {
                                name.push(n);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        let local = match name.split_once(':') {
                            Some((module_name, local)) => {
                                current = modules
                                    .iter()
                                    .position(|m| {
                                        &*m.name == module_name && m.implemented
                                    })
                                    .or_else(|| {
                                        modules
                                            .iter()
                                            .position(|m| &*m.name == module_name)
                                    });
                                local
                            }
                            None => name.as_str(),
                        };
                        let qualified = !name.is_empty()
                            && name != "."
                            && !name.starts_with(|c: char| c.is_ascii_digit());
                        match current {
                            Some(module) if qualified => {
                                if !used.contains(&module) {
                                    used.push(module);
                                }
                                out.push_str(&modules[module].prefix);
                                out.push(':');
                                out.push_str(local);
                            }
                            _ => out.push_str(&name),
                        }
                    }
                    _ => (),
                }
            }
            (out, used)
        }
        _ => (value.canonical.to_string(), Vec::new()),
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimals() {
        assert_eq!(parse_decimal("1.5", 2), Some(150));
        assert_eq!(parse_decimal("-0.05", 2), Some(-5));
        assert_eq!(parse_decimal("1.555", 2), None);
        assert_eq!(parse_decimal("1.", 2), None);
        assert_eq!(format_decimal(150, 2), "1.5");
        assert_eq!(format_decimal(-5, 2), "-0.05");
        assert_eq!(format_decimal(100, 2), "1.0");
    }

    #[test]
    fn restrictions() {
        let current = vec![type_limits(DataValueType::Uint8)];
        let parts =
            parse_restriction("1..10 | 20..max", DataValueType::Uint8, 0, &current)
                .unwrap();
        assert_eq!(parts, vec![(1, 10), (20, 255)]);
        assert!(parse_restriction("10..1", DataValueType::Uint8, 0, &current)
            .is_err());
        assert!(parse_restriction("0..300", DataValueType::Uint8, 0, &current)
            .is_err());
        assert!(parse_restriction("5 | 1", DataValueType::Uint8, 0, &current)
            .is_err());
        // Narrowing an existing restriction.
        assert!(parse_restriction("11..12", DataValueType::Uint8, 0, &parts)
            .is_err());
        assert!(parse_restriction("2..3", DataValueType::Uint8, 0, &parts).is_ok());
    }

    #[test]
    fn integers() {
        assert_eq!(parse_integer("+42"), Some(42));
        assert_eq!(parse_integer("-7"), Some(-7));
        assert_eq!(parse_integer("0x10"), None);
        assert_eq!(parse_integer(""), None);
    }
}
