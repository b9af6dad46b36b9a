//! Settings loading: defaults, optional TOML file, then environment.

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;

use crate::config::schema::Settings;
use crate::config::validation::{validate_settings, ValidationError};

/// Environment variables read on top of the file.
pub const ENV_KEYS: [&str; 8] = [
    "APP_ENV",
    "APP_NAME",
    "APP_VERSION",
    "HOST",
    "PORT",
    "LOG_LEVEL",
    "REQUEST_TIMEOUT_SECS",
    "MAX_BODY_BYTES",
];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    Missing(String),

    #[error("parse error: {0}")]
    Parse(#[from] Box<figment::Error>),

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The provider chain without validation.
pub fn figment(path: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(Settings::default()));
    if let Some(path) = path {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::raw().only(&ENV_KEYS))
}

/// Load and validate settings.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::Missing(path.display().to_string()));
        }
    }

    let settings: Settings = figment(path).extract().map_err(Box::new)?;
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "settings.toml",
                r#"
                app_env = "development"
                port = 9000
                log_level = "INFO"
                "#,
            )?;
            jail.set_env("PORT", "9100");

            let settings = load_settings(Some(Path::new("settings.toml"))).unwrap();
            assert!(settings.is_development());
            assert_eq!(settings.port, 9100);
            assert_eq!(settings.log_level, "INFO");
            Ok(())
        });
    }

    #[test]
    fn unrelated_env_is_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("PATHNAME", "/nowhere");
            let settings = load_settings(None).unwrap();
            assert!(settings.is_production());
            assert_eq!(settings.port, 8000);
            Ok(())
        });
    }

    #[test]
    fn invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("LOG_LEVEL", "chatty");
            assert!(matches!(load_settings(None), Err(ConfigError::Validation(_))));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_settings(Some(Path::new("/definitely/not/here.toml"))),
            Err(ConfigError::Missing(_))
        ));
    }
}
