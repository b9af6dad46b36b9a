//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>

use crate::config::schema::Settings;
use crate::observability::Level;

/// One semantic problem with the settings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("log_level {0:?} is not a known level")]
    LogLevel(String),

    #[error("app_env {0:?} must be `production` or `development`")]
    AppEnv(String),

    #[error("port must be non-zero")]
    Port,

    #[error("request_timeout_secs must be non-zero")]
    Timeout,
}

pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.log_level.parse::<Level>().is_err() {
        errors.push(ValidationError::LogLevel(settings.log_level.clone()));
    }
    if !settings.is_production() && !settings.is_development() {
        errors.push(ValidationError::AppEnv(settings.app_env.clone()));
    }
    if settings.port == 0 {
        errors.push(ValidationError::Port);
    }
    if settings.request_timeout_secs == 0 {
        errors.push(ValidationError::Timeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
