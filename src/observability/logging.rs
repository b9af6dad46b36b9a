//! Structured logging.
//!
//! # Responsibilities
//! - Own the named loggers of the process (`LoggerRegistry`)
//! - Build ready-to-use loggers bound to a stderr sink
//! - Run records through handler filters, formatter and sink
//!
//! # Design Decisions
//! - The registry is an explicit object created at startup, never a global
//! - Filters are closures `LogRecord -> Option<LogRecord>`
//! - A failing formatter reports on stderr and never unwinds into the caller
//! - Creating the same logger twice attaches a second handler; callers
//!   that do this get every record twice

use std::fmt;
use std::io::{self, Write};
use std::panic::Location;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use dashmap::DashMap;

use crate::observability::format::{FormatError, Formatter};
use crate::observability::level::Level;
use crate::observability::record::{format_error_chain, LogRecord};
use crate::observability::value::Fields;

/// Name reserved for the root logger.
pub const ROOT_LOGGER: &str = "root";

/// Error raised while emitting a record.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error("failed to write log line: {0}")]
    Io(#[from] io::Error),
}

/// Enrichment step applied by a handler before formatting.
///
/// Returning `None` drops the record for that handler.
pub type RecordFilter = Arc<dyn Fn(LogRecord) -> Option<LogRecord> + Send + Sync>;

/// Where formatted lines go.
#[derive(Clone, Default)]
pub enum Sink {
    #[default]
    Stderr,
    Memory(MemorySink),
}

impl Sink {
    /// A sink that keeps lines in memory, plus a handle to read them.
    pub fn memory() -> (Self, MemorySink) {
        let handle = MemorySink::default();
        (Sink::Memory(handle.clone()), handle)
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match self {
            Sink::Stderr => {
                let mut stderr = io::stderr().lock();
                writeln!(stderr, "{line}")?;
                stderr.flush()
            }
            Sink::Memory(buffer) => {
                buffer.push(line);
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::Stderr => f.write_str("Stderr"),
            Sink::Memory(_) => f.write_str("Memory"),
        }
    }
}

/// Shared in-memory line buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    fn push(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }

    /// Every line written so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Filters, formatter and sink bound together.
#[derive(Clone)]
pub struct Handler {
    formatter: Formatter,
    filters: Vec<RecordFilter>,
    sink: Sink,
}

impl Handler {
    pub fn new(formatter: Formatter, sink: Sink) -> Self {
        Self {
            formatter,
            filters: Vec::new(),
            sink,
        }
    }

    pub fn add_filter(&mut self, filter: RecordFilter) {
        self.filters.push(filter);
    }

    /// Filter, format and write one record.
    ///
    /// `Ok(false)` means a filter dropped the record.
    pub fn emit(&self, record: LogRecord) -> Result<bool, LogError> {
        let mut record = record;
        for filter in &self.filters {
            record = match filter(record) {
                Some(record) => record,
                None => return Ok(false),
            };
        }
        let line = self.formatter.format(&record)?;
        self.sink.write_line(&line)?;
        Ok(true)
    }

    fn handle(&self, record: &LogRecord) {
        if let Err(e) = self.emit(record.clone()) {
            handle_error(record, &e);
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("formatter", &self.formatter)
            .field("filters", &self.filters.len())
            .field("sink", &self.sink)
            .finish()
    }
}

fn handle_error(record: &LogRecord, error: &LogError) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(
        stderr,
        "--- Logging error ---\n{}\nMessage: {:?}\nLogged from {}",
        format_error_chain(error),
        record.message,
        record.pathname()
    );
}

/// Which logger to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggerName {
    Root,
    Named(String),
}

impl LoggerName {
    pub fn as_str(&self) -> &str {
        match self {
            LoggerName::Root => ROOT_LOGGER,
            LoggerName::Named(name) => name,
        }
    }
}

impl From<&str> for LoggerName {
    fn from(name: &str) -> Self {
        if name == ROOT_LOGGER {
            LoggerName::Root
        } else {
            LoggerName::Named(name.to_string())
        }
    }
}

impl From<String> for LoggerName {
    fn from(name: String) -> Self {
        LoggerName::from(name.as_str())
    }
}

/// Options for [`LoggerRegistry::create_logger`].
#[derive(Clone)]
pub struct LoggerOptions {
    pub level: Level,
    pub as_json: bool,
    pub filters: Vec<RecordFilter>,
    pub sink: Sink,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            as_json: false,
            filters: Vec::new(),
            sink: Sink::Stderr,
        }
    }
}

struct LoggerInner {
    name: String,
    level: AtomicU8,
    handlers: RwLock<Vec<Handler>>,
    parent: Option<Logger>,
}

/// A named logger. Cloning shares the same logger.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.name)
            .field("level", &self.level())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

impl Logger {
    fn new(name: &str, level: Level, parent: Option<Logger>) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                name: name.to_string(),
                level: AtomicU8::new(level.number()),
                handlers: RwLock::new(Vec::new()),
                parent,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Level set on this logger (may be `NOTSET`).
    pub fn level(&self) -> Level {
        Level::from_number(self.inner.level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, level: Level) {
        self.inner.level.store(level.number(), Ordering::Relaxed);
    }

    /// First level set walking up to the root.
    pub fn effective_level(&self) -> Level {
        let level = self.level();
        match (&self.inner.parent, level) {
            (Some(parent), Level::NOTSET) => parent.effective_level(),
            _ => level,
        }
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        level >= self.effective_level()
    }

    pub fn add_handler(&self, handler: Handler) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn clear_handlers(&self) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Log `message` at `level` with extra fields.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>, extra: Fields) {
        if !self.is_enabled_for(level) {
            return;
        }
        let location = Location::caller();
        let record = LogRecord::new(
            self.name(),
            level,
            message,
            location.file(),
            location.line(),
        )
        .with_extra(extra);
        self.handle(record);
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::TRACE, message, extra);
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::DEBUG, message, extra);
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::INFO, message, extra);
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::WARNING, message, extra);
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::ERROR, message, extra);
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>, extra: Fields) {
        self.log(Level::CRITICAL, message, extra);
    }

    /// Log at ERROR with the error chain attached.
    #[track_caller]
    pub fn exception(
        &self,
        message: impl Into<String>,
        error: &(dyn std::error::Error + 'static),
        extra: Fields,
    ) {
        if !self.is_enabled_for(Level::ERROR) {
            return;
        }
        let location = Location::caller();
        let record = LogRecord::new(
            self.name(),
            Level::ERROR,
            message,
            location.file(),
            location.line(),
        )
        .with_extra(extra)
        .with_exception(format_error_chain(error));
        self.handle(record);
    }

    /// Pass an already-built record to this logger's handlers and then to
    /// its ancestors'. Level checks are the caller's job.
    pub fn handle(&self, record: LogRecord) {
        let mut found = 0;
        let mut current = Some(self);
        while let Some(logger) = current {
            let handlers = logger
                .inner
                .handlers
                .read()
                .unwrap_or_else(|e| e.into_inner());
            for handler in handlers.iter() {
                found += 1;
                handler.handle(&record);
            }
            current = logger.inner.parent.as_ref();
        }

        if found == 0 && record.level >= Level::WARNING {
            let _ = writeln!(io::stderr().lock(), "{}", record.message);
        }
    }
}

/// Process-wide set of loggers, created once at startup.
pub struct LoggerRegistry {
    root: Logger,
    loggers: DashMap<String, Logger>,
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRegistry {
    pub fn new() -> Self {
        Self {
            root: Logger::new(ROOT_LOGGER, Level::WARNING, None),
            loggers: DashMap::new(),
        }
    }

    pub fn root(&self) -> Logger {
        self.root.clone()
    }

    /// Look up a logger, creating a bare one (no handlers, level inherited
    /// from the root) on first use.
    pub fn get(&self, name: &LoggerName) -> Logger {
        match name {
            LoggerName::Root => self.root(),
            LoggerName::Named(name) => self
                .loggers
                .entry(name.clone())
                .or_insert_with(|| Logger::new(name, Level::NOTSET, Some(self.root())))
                .clone(),
        }
    }

    /// Build a logger with one stream handler carrying the chosen formatter
    /// and every supplied filter.
    ///
    /// Not idempotent: each call adds another handler to the same logger.
    pub fn create_logger(&self, name: impl Into<LoggerName>, options: LoggerOptions) -> Logger {
        let name = name.into();
        let logger = self.get(&name);
        logger.set_level(options.level);

        let mut handler = Handler::new(Formatter::new(options.as_json), options.sink);
        for filter in options.filters {
            handler.add_filter(filter);
        }
        logger.add_handler(handler);

        match name {
            LoggerName::Root => logger.debug("created root logger", Fields::new()),
            LoggerName::Named(ref name) => {
                logger.debug(format!("created logger {name}"), Fields::new())
            }
        }
        logger
    }

    /// Detach every handler. Called once at process exit.
    pub fn shutdown(&self) {
        for entry in self.loggers.iter() {
            entry.value().clear_handlers();
        }
        self.root.clear_handlers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use serde_json::Value;

    fn json_options(level: Level) -> (LoggerOptions, MemorySink) {
        let (sink, lines) = Sink::memory();
        let options = LoggerOptions {
            level,
            as_json: true,
            filters: Vec::new(),
            sink,
        };
        (options, lines)
    }

    fn parse(lines: &[String]) -> Vec<Value> {
        lines
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn factory_logs_creation_at_debug() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::DEBUG);
        let logger = registry.create_logger("items-api", options);

        let records = parse(&lines.lines());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "created logger items-api");
        assert_eq!(records[0]["level"], "DEBUG");
        assert_eq!(logger.handler_count(), 1);
    }

    #[test]
    fn level_gates_records() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::WARNING);
        let logger = registry.create_logger("items-api", options);

        logger.info("ignored", Fields::new());
        logger.warning("kept", Fields::new());

        let records = parse(&lines.lines());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "kept");
    }

    #[test]
    fn repeated_creation_duplicates_output() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::INFO);
        registry.create_logger("items-api", options.clone());
        let logger = registry.create_logger("items-api", options);

        assert_eq!(logger.handler_count(), 2);
        logger.info("twice", Fields::new());
        assert_eq!(lines.lines().len(), 2);
    }

    #[test]
    fn filters_enrich_and_drop() {
        let registry = LoggerRegistry::new();
        let (mut options, lines) = json_options(Level::INFO);
        options.filters.push(Arc::new(|mut record: LogRecord| {
            record.extra.insert("stage", "test");
            Some(record)
        }));
        options.filters.push(Arc::new(|record: LogRecord| {
            (record.message != "secret").then_some(record)
        }));
        let logger = registry.create_logger("items-api", options);

        logger.info("visible", fields! { "n" => 1 });
        logger.info("secret", Fields::new());

        let records = parse(&lines.lines());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["extra"]["n"], 1);
        assert_eq!(records[0]["extra"]["stage"], "test");
    }

    #[test]
    fn named_loggers_propagate_to_root() {
        let registry = LoggerRegistry::new();
        let (options, root_lines) = json_options(Level::INFO);
        registry.create_logger(LoggerName::Root, options);
        let (options, app_lines) = json_options(Level::INFO);
        let logger = registry.create_logger("items-api", options);

        logger.info("hello", Fields::new());

        assert_eq!(app_lines.lines().len(), 1);
        let root = parse(&root_lines.lines());
        assert_eq!(root.len(), 1);
        assert_eq!(root[0]["logger"], "items-api");
    }

    #[test]
    fn bare_loggers_inherit_root_level() {
        let registry = LoggerRegistry::new();
        let logger = registry.get(&LoggerName::from("bare"));
        assert_eq!(logger.level(), Level::NOTSET);
        assert_eq!(logger.effective_level(), Level::WARNING);
        assert!(!logger.is_enabled_for(Level::INFO));
    }

    #[test]
    fn root_name_maps_to_root_logger() {
        assert_eq!(LoggerName::from("root"), LoggerName::Root);
        let registry = LoggerRegistry::new();
        assert_eq!(registry.get(&LoggerName::Root).name(), ROOT_LOGGER);
    }

    #[test]
    fn call_site_is_recorded() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::INFO);
        let logger = registry.create_logger("items-api", options);

        logger.info("here", Fields::new());
        let records = parse(&lines.lines());
        let pathname = records[0]["pathname"].as_str().unwrap();
        assert!(pathname.starts_with("src/observability/logging.rs:"), "{pathname}");
    }

    #[test]
    fn exception_carries_error_chain() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::INFO);
        let logger = registry.create_logger("items-api", options);

        let error = io::Error::new(io::ErrorKind::NotFound, "missing row");
        logger.exception("lookup failed", &error, Fields::new());
        let records = parse(&lines.lines());
        assert_eq!(records[0]["level"], "ERROR");
        assert_eq!(records[0]["exception"], "Error: missing row");
    }

    #[test]
    fn shutdown_detaches_handlers() {
        let registry = LoggerRegistry::new();
        let (options, lines) = json_options(Level::INFO);
        let logger = registry.create_logger("items-api", options);
        registry.shutdown();

        logger.info("after shutdown", Fields::new());
        assert!(lines.lines().is_empty());
        assert_eq!(logger.handler_count(), 0);
    }
}
