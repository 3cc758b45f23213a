//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

use num_derive::FromPrimitive;

/// A convenience wrapper around `Result` for `yangrs::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Generic error codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive)]
pub enum ErrorCode {
    Success = 0,
    Mem = 1,
    Sys = 2,
    Inval = 3,
    Exist = 4,
    NotFound = 5,
    Int = 6,
    Valid = 7,
    Denied = 8,
    Incomplete = 9,
    Recompile = 10,
    Not = 11,
    Other = 12,
    Plugin = 128,
}

/// Detailed codes for errors of the [`ErrorCode::Valid`] class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromPrimitive)]
pub enum ValidationErrorCode {
    Success = 0,
    SyntaxYang = 1,
    SyntaxYin = 2,
    SyntaxXml = 3,
    SyntaxJson = 4,
    Reference = 5,
    Xpath = 6,
    Semantics = 7,
    Data = 8,
    Other = 9,
}

/// Error returned by all fallible operations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    pub errcode: ErrorCode,
    pub vecode: ValidationErrorCode,
    pub msg: Option<String>,
    pub path: Option<String>,
    pub schema_path: Option<String>,
    pub apptag: Option<String>,
    pub line: u64,
    /// Set when the error was raised by an extension or type plugin.
    pub plugin: bool,
}

// ===== impl ErrorCode =====

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ===== impl Error =====

impl Error {
    pub fn new(errcode: ErrorCode, msg: impl Into<String>) -> Error {
        Error {
            errcode,
            vecode: ValidationErrorCode::Success,
            msg: Some(msg.into()),
            path: None,
            schema_path: None,
            apptag: None,
            line: 0,
            plugin: false,
        }
    }

    /// Creates a validation-class error with the given detail code.
    pub fn valid(vecode: ValidationErrorCode, msg: impl Into<String>) -> Error {
        let mut error = Error::new(ErrorCode::Valid, msg);
        error.vecode = vecode;
        error
    }

    pub(crate) fn syntax_yang(line: u64, msg: impl Into<String>) -> Error {
        Error::valid(ValidationErrorCode::SyntaxYang, msg).with_line(line)
    }

    pub(crate) fn inval(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::Inval, msg)
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::NotFound, msg)
    }

    pub(crate) fn recompile() -> Error {
        Error::new(
            ErrorCode::Recompile,
            "Context requires recompilation after a feature change",
        )
    }

    pub(crate) fn with_line(mut self, line: u64) -> Error {
        self.line = line;
        self
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Error {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn with_schema_path(mut self, path: impl Into<String>) -> Error {
        self.schema_path = Some(path.into());
        self
    }

    pub(crate) fn with_apptag(mut self, apptag: Option<String>) -> Error {
        self.apptag = apptag;
        self
    }

    pub(crate) fn from_plugin(mut self) -> Error {
        self.plugin = true;
        self
    }
}

impl std::fmt::Display for Error {
    // Print only the base error message by default.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(msg) = &self.msg {
            write!(f, "{}", msg)
        } else {
            write!(f, "Unknown error: {}", self.errcode)
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error {
        Error::new(ErrorCode::Sys, error.to_string())
    }
}
