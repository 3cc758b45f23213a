//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Native YANG schema compiler and instance data engine.
//!
//! yangrs loads YANG 1.1 modules ([RFC 7950]) into a [`Context`], compiles
//! them into a resolved schema tree and uses that schema to parse, build,
//! validate, compare and print instance data in JSON ([RFC 7951]) and XML.
//!
//! [RFC 7950]: https://www.rfc-editor.org/rfc/rfc7950
//! [RFC 7951]: https://www.rfc-editor.org/rfc/rfc7951
//! [`Context`]: crate::context::Context
//!
//! ## Design Goals
//! * Pure Rust, no foreign libraries to build or link against
//! * Leverage Rust's ownership system to detect API misuse problems at compile
//!   time: schema and data handles borrow the context or tree they belong to
//! * Errors are values: every fallible operation returns [`Result`], and the
//!   context keeps a log of the errors it reported
//! * Pluggable type validation and XPath-free fast paths for the common cases
//!
//! ## Overview
//! * [`context`]: module loading, search directories and features
//! * [`schema`]: compiled schema inspection, printing and schema diffs
//! * [`data`]: data trees, parsing, printing, editing, validation and diffs
//! * [`plugins`]: type validation plugins and pattern matching
//! * [`logging`]: log levels, error records and the logging callback
//!
//! ## Examples
//!
//! See the programs under `demos/`.

mod error;

pub mod context;
pub mod data;
pub mod dict;
pub mod iter;
pub mod logging;
pub mod parser;
pub(crate) mod path;
pub mod plugins;
pub mod schema;
pub mod utils;
pub mod xpath;

pub use crate::error::{Error, ErrorCode, Result, ValidationErrorCode};
