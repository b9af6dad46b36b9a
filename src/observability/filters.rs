//! Record enrichment filters.

use std::sync::Arc;

use crate::observability::correlation::{self, NO_CORRELATION_ID};
use crate::observability::logging::RecordFilter;
use crate::observability::record::{
    LogRecord, CORRELATION_ID_KEY, PROJECT_NAME_KEY, PROJECT_VERSION_KEY,
};

/// Attach the current exchange's correlation id, or `default` outside one.
pub fn correlation_id(default: &str) -> RecordFilter {
    let default = default.to_string();
    Arc::new(move |mut record: LogRecord| {
        let id = correlation::current().unwrap_or_else(|| default.clone());
        record.extra.insert(CORRELATION_ID_KEY, id);
        Some(record)
    })
}

/// [`correlation_id`] with the `-` placeholder.
pub fn correlation_id_default() -> RecordFilter {
    correlation_id(NO_CORRELATION_ID)
}

/// Attach the project name and version to every record.
pub fn project_name_version(name: &str, version: &str) -> RecordFilter {
    let name = name.to_string();
    let version = version.to_string();
    Arc::new(move |mut record: LogRecord| {
        record.extra.insert(PROJECT_NAME_KEY, name.clone());
        record.extra.insert(PROJECT_VERSION_KEY, version.clone());
        Some(record)
    })
}
