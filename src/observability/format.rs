//! Record formatters.
//!
//! # Design Decisions
//! - Human lines are for terminals: colored level, local wall-clock time
//! - JSON lines are for collectors: one object per line, UTC timestamps
//! - Formatters hold no state; the same record always renders the same way

use std::borrow::Cow;

use chrono::{Local, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::observability::record::{is_reserved, LogRecord};
use crate::observability::value::{serialize_field, SerializeError};

/// Width the level name is padded to before the timestamp.
const LEVEL_COLUMN: usize = 9;

/// Error raised while rendering a record.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("failed to encode log line: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Renders `LEVEL:<pad>HH:MM:SS  message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter;

impl HumanFormatter {
    pub fn format(&self, record: &LogRecord) -> String {
        let name = record.level.name();
        let separator = " ".repeat(LEVEL_COLUMN.saturating_sub(name.chars().count()));
        let timestamp = record.created.with_timezone(&Local).format("%H:%M:%S");

        let mut line = format!(
            "{}:{}{}  {}",
            record.level.colored_name(),
            separator,
            timestamp,
            record.message
        );
        if let Some(exception) = &record.exception {
            line.push('\n');
            line.push_str(exception);
        }
        line
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    level: Cow<'static, str>,
    logger: &'a str,
    message: &'a str,
    pathname: String,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
}

/// Renders one JSON object per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        let mut extra = Map::new();
        for (key, value) in record.extra.iter() {
            if is_reserved(key) {
                continue;
            }
            extra.insert(key.to_string(), serialize_field(value)?);
        }

        let line = JsonLine {
            level: record.level.name(),
            logger: &record.logger,
            message: &record.message,
            pathname: record.pathname(),
            timestamp: record.created.to_rfc3339_opts(SecondsFormat::Millis, false),
            extra: (!extra.is_empty()).then_some(extra),
            exception: record.exception.as_deref(),
        };
        Ok(serde_json::to_string(&line)?)
    }
}

/// The formatter attached to a handler.
#[derive(Debug, Clone, Copy)]
pub enum Formatter {
    Human(HumanFormatter),
    Json(JsonFormatter),
}

impl Formatter {
    pub fn new(as_json: bool) -> Self {
        if as_json {
            Formatter::Json(JsonFormatter)
        } else {
            Formatter::Human(HumanFormatter)
        }
    }

    pub fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        match self {
            Formatter::Human(f) => Ok(f.format(record)),
            Formatter::Json(f) => f.format(record),
        }
    }
}
