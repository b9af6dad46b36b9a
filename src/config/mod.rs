//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (Settings::default)
//!     → optional TOML file (--config)
//!     → environment (APP_ENV, LOG_LEVEL, PORT, ...)
//!     → loader.rs (figment extract)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded
//! - All fields have defaults to allow an empty environment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, ConfigError};
pub use schema::Settings;
pub use validation::ValidationError;
