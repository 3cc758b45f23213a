//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Log callbacks and the per-context error store.

use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::error::{Error, ErrorCode, ValidationErrorCode};

/// Severity of a logged message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, FromPrimitive)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Verbose = 2,
    Debug = 3,
}

bitflags! {
    /// Options controlling what happens with logged errors.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct LogOptions: u8 {
        /// Pass messages to the log callback.
        const LOG = 0x01;
        /// Store all errors on the context.
        const STORE = 0x02;
        /// Store only the most recent error on the context.
        const STORE_LAST = 0x04;
    }
}

/// A custom logger to pass log records to.
pub trait LogCallback: Send + Sync + 'static {
    fn log<'a>(
        &'a self,
        level: LogLevel,
        msg: Option<Cow<'a, str>>,
        data_path: Option<Cow<'a, str>>,
        schema_path: Option<Cow<'a, str>>,
        line: u64,
    );
}

/// An error returned when the logging callback has already been initialized.
#[derive(Debug)]
pub struct LoggingCallbackAlreadySet {
    _private: (),
}

/// A stored error (or warning) record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorItem {
    pub level: LogLevel,
    pub errcode: ErrorCode,
    pub vecode: ValidationErrorCode,
    pub msg: Option<String>,
    pub data_path: Option<String>,
    pub schema_path: Option<String>,
    pub line: u64,
    pub apptag: Option<String>,
}

/// Log configuration and stored errors of one context.
pub(crate) struct LogState {
    level: AtomicU8,
    options: AtomicU8,
    callback: OnceLock<Box<dyn LogCallback>>,
    items: Mutex<Vec<ErrorItem>>,
}

/// A logger that to log engine messages using the `log` crate.
#[derive(Debug, Default)]
pub struct DefaultLogger {
    _private: (),
}

// ===== impl LoggingCallbackAlreadySet =====

impl std::fmt::Display for LoggingCallbackAlreadySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Logging callback already set")
    }
}

impl std::error::Error for LoggingCallbackAlreadySet {}

// ===== impl ErrorItem =====

impl From<&Error> for ErrorItem {
    fn from(error: &Error) -> ErrorItem {
        ErrorItem {
            level: LogLevel::Error,
            errcode: error.errcode,
            vecode: error.vecode,
            msg: error.msg.clone(),
            data_path: error.path.clone(),
            schema_path: error.schema_path.clone(),
            line: error.line,
            apptag: error.apptag.clone(),
        }
    }
}

// ===== impl LogState =====

impl LogState {
    pub(crate) fn new() -> LogState {
        LogState {
            level: AtomicU8::new(LogLevel::Warning as u8),
            options: AtomicU8::new(
                (LogOptions::LOG | LogOptions::STORE_LAST).bits(),
            ),
            callback: OnceLock::new(),
            items: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.level.load(Ordering::Relaxed))
            .unwrap_or(LogLevel::Warning)
    }

    pub(crate) fn set_level(&self, level: LogLevel) {
        self.level.store(level as u8, Ordering::Relaxed);
    }

    pub(crate) fn options(&self) -> LogOptions {
        LogOptions::from_bits_truncate(self.options.load(Ordering::Relaxed))
    }

    pub(crate) fn set_options(&self, options: LogOptions) {
        self.options.store(options.bits(), Ordering::Relaxed);
    }

    pub(crate) fn init_callback<C>(
        &self,
        callback: C,
    ) -> Result<(), LoggingCallbackAlreadySet>
    where
        C: LogCallback,
    {
        self.set_options(self.options() | LogOptions::LOG);
        self.callback
            .set(Box::new(callback))
            .map_err(|_| LoggingCallbackAlreadySet { _private: () })
    }

    fn items(&self) -> MutexGuard<'_, Vec<ErrorItem>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(
        &self,
        level: LogLevel,
        msg: &str,
        data_path: Option<&str>,
        schema_path: Option<&str>,
        line: u64,
    ) {
        if level > self.level() || !self.options().contains(LogOptions::LOG) {
            return;
        }
        if let Some(cb) = self.callback.get() {
            cb.log(
                level,
                Some(Cow::from(msg)),
                data_path.map(Cow::from),
                schema_path.map(Cow::from),
                line,
            );
        }
    }

    fn store(&self, item: ErrorItem) {
        let options = self.options();
        let mut items = self.items();
        if options.contains(LogOptions::STORE) {
            items.push(item);
        } else if options.contains(LogOptions::STORE_LAST) {
            items.clear();
            items.push(item);
        }
    }

    /// Log an error and keep it in the error store.
    pub(crate) fn error(&self, error: &Error) {
        self.emit(
            LogLevel::Error,
            error.msg.as_deref().unwrap_or(""),
            error.path.as_deref(),
            error.schema_path.as_deref(),
            error.line,
        );
        self.store(ErrorItem::from(error));
    }

    pub(crate) fn warn(&self, msg: &str, data_path: Option<&str>) {
        self.emit(LogLevel::Warning, msg, data_path, None, 0);
        let options = self.options();
        if options.contains(LogOptions::STORE) {
            self.items().push(ErrorItem {
                level: LogLevel::Warning,
                errcode: ErrorCode::Success,
                vecode: ValidationErrorCode::Success,
                msg: Some(msg.to_owned()),
                data_path: data_path.map(str::to_owned),
                schema_path: None,
                line: 0,
                apptag: None,
            });
        }
    }

    pub(crate) fn verbose(&self, msg: &str) {
        self.emit(LogLevel::Verbose, msg, None, None, 0);
    }

    pub(crate) fn errors(&self) -> Vec<ErrorItem> {
        self.items().clone()
    }

    pub(crate) fn last(&self) -> Option<ErrorItem> {
        self.items()
            .iter()
            .rev()
            .find(|item| item.level == LogLevel::Error)
            .cloned()
    }

    pub(crate) fn clear(&self) {
        self.items().clear();
    }
}

impl std::fmt::Debug for LogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogState")
            .field("level", &self.level())
            .field("options", &self.options())
            .finish()
    }
}

// ===== impl DefaultLogger =====

impl LogCallback for DefaultLogger {
    fn log<'a>(
        &'a self,
        level: LogLevel,
        msg: Option<Cow<'a, str>>,
        data_path: Option<Cow<'a, str>>,
        schema_path: Option<Cow<'a, str>>,
        line: u64,
    ) {
        let level = match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Verbose => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        };
        let msg = msg.unwrap_or_else(|| Cow::from(""));
        log::log! {
            target: "yangrs",
            level,
            "schema_path={schema_path:?}, data_path={data_path:?}, line={line}, msg={msg}",
        }
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_last_keeps_most_recent() {
        let state = LogState::new();
        state.error(&Error::inval("first"));
        state.error(&Error::inval("second"));
        let errors = state.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].msg.as_deref(), Some("second"));
    }

    #[test]
    fn store_accumulates_in_order() {
        let state = LogState::new();
        state.set_options(LogOptions::STORE);
        state.error(&Error::inval("first"));
        state.warn("careful", None);
        state.error(&Error::inval("second"));
        let errors = state.errors();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[1].level, LogLevel::Warning);
        assert_eq!(state.last().and_then(|e| e.msg), Some("second".into()));
        state.clear();
        assert!(state.errors().is_empty());
    }
}
