//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Logger::info(message, extra)        tracing::info!(...)
//!     │                                   │
//!     │                             bridge.rs (LoggerLayer)
//!     ▼                                   ▼
//! logging.rs (level check → handlers → root handlers)
//!     → filters.rs (correlation id, project name/version)
//!     → format.rs (human line | JSON line)
//!     → value.rs (extra fields → JSON)
//!     → sink (stderr)
//! ```
//!
//! # Design Decisions
//! - JSON lines in production, colored human lines elsewhere
//! - Correlation id flows through a task-local, never through arguments
//! - Logging is best-effort and synchronous; nothing is queued or retried

pub mod bridge;
pub mod correlation;
pub mod filters;
pub mod format;
pub mod level;
pub mod logging;
pub mod record;
pub mod value;

pub use bridge::LoggerLayer;
pub use format::{FormatError, Formatter, HumanFormatter, JsonFormatter};
pub use level::Level;
pub use logging::{
    Handler, LogError, Logger, LoggerName, LoggerOptions, LoggerRegistry, MemorySink,
    RecordFilter, Sink,
};
pub use record::{LogRecord, RESERVED_ATTRS};
pub use value::{serialize_field, Coerce, Dump, FieldValue, Fields, SerializeError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

/// Build the application logger from settings.
pub fn app_logger(registry: &LoggerRegistry, settings: &Settings, sink: Sink) -> Logger {
    registry.create_logger(
        settings.app_name.as_str(),
        LoggerOptions {
            level: settings.level(),
            as_json: settings.is_production(),
            filters: vec![
                filters::correlation_id_default(),
                filters::project_name_version(&settings.app_name, &settings.app_version),
            ],
            sink,
        },
    )
}

/// Install the global `tracing` subscriber feeding `logger`.
///
/// `RUST_LOG` overrides the default directive derived from the settings.
pub fn install_tracing(
    logger: Logger,
    settings: &Settings,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level::tracing_directive(settings.level())));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(LoggerLayer::new(logger))
        .try_init()
}
