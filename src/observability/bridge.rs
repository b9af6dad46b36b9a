//! Routes `tracing` events into a [`Logger`].
//!
//! Library diagnostics (tower-http, hyper) and the service's own
//! `tracing::info!` calls end up with the same filters, formatter and sink
//! as records logged through the logger directly.

use std::fmt;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::observability::level::Level;
use crate::observability::logging::Logger;
use crate::observability::record::LogRecord;
use crate::observability::value::{FieldValue, Fields};

/// `tracing_subscriber` layer forwarding events to a logger.
#[derive(Debug, Clone)]
pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = Level::from(metadata.level());
        if !self.logger.is_enabled_for(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let record = LogRecord::new(
            metadata.target(),
            level,
            visitor.message,
            metadata.file().unwrap_or("<unknown>").to_string(),
            metadata.line().unwrap_or(0),
        )
        .with_extra(visitor.fields);
        self.logger.handle(record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Fields,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, value: FieldValue) {
        self.fields.insert(field.name(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.put(field, value.into());
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.put(field, format!("{value:?}").into());
        }
    }
}
