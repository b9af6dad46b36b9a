//! The log record shared by every formatter.

use std::borrow::Cow;

use chrono::{DateTime, Utc};

use crate::observability::level::Level;
use crate::observability::value::{FieldValue, Fields};

/// Attribute names that belong to the record itself.
///
/// An extra field with one of these names is never rendered under `extra`.
pub const RESERVED_ATTRS: [&str; 22] = [
    "args",
    "asctime",
    "created",
    "exc_info",
    "exc_text",
    "filename",
    "funcName",
    "levelname",
    "levelno",
    "lineno",
    "module",
    "msecs",
    "message",
    "msg",
    "name",
    "pathname",
    "process",
    "processName",
    "relativeCreated",
    "stack_info",
    "thread",
    "threadName",
];

/// Whether `key` names a core record attribute.
pub fn is_reserved(key: &str) -> bool {
    RESERVED_ATTRS.contains(&key)
}

/// Extra key set by the correlation filter.
pub const CORRELATION_ID_KEY: &str = "correlation_id";
/// Extra key set by the project filter.
pub const PROJECT_NAME_KEY: &str = "project_name";
/// Extra key set by the project filter.
pub const PROJECT_VERSION_KEY: &str = "project_version";

/// A single log event on its way to a sink.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub file: Cow<'static, str>,
    pub line: u32,
    pub created: DateTime<Utc>,
    /// Formatted error chain, when the record was logged with an error.
    pub exception: Option<String>,
    pub extra: Fields,
}

impl LogRecord {
    pub fn new(
        logger: impl Into<String>,
        level: Level,
        message: impl Into<String>,
        file: impl Into<Cow<'static, str>>,
        line: u32,
    ) -> Self {
        Self {
            level,
            logger: logger.into(),
            message: message.into(),
            file: file.into(),
            line,
            created: Utc::now(),
            exception: None,
            extra: Fields::new(),
        }
    }

    pub fn with_extra(mut self, extra: Fields) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    /// `file:line` of the call site.
    pub fn pathname(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.extra_str(CORRELATION_ID_KEY)
    }

    pub fn project_name(&self) -> Option<&str> {
        self.extra_str(PROJECT_NAME_KEY)
    }

    pub fn project_version(&self) -> Option<&str> {
        self.extra_str(PROJECT_VERSION_KEY)
    }

    fn extra_str(&self, key: &str) -> Option<&str> {
        match self.extra.get(key) {
            Some(FieldValue::Str(s)) => Some(s),
            _ => None,
        }
    }
}

/// Render an error and its sources, one per line.
pub fn format_error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = format!("Error: {error}");
    let mut source = error.source();
    if source.is_some() {
        text.push_str("\n\nCaused by:");
    }
    while let Some(cause) = source {
        text.push_str(&format!("\n    {cause}"));
        source = cause.source();
    }
    text
}
