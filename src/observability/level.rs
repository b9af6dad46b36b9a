//! Log severity levels.
//!
//! Levels are plain numbers so that records can carry levels outside the
//! named set; those render as `Level N` and are never colorized.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use colored::{Color, Colorize};

/// A numeric log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(u8);

impl Level {
    /// Inherit the level of the parent logger.
    pub const NOTSET: Level = Level(0);
    pub const TRACE: Level = Level(5);
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);

    /// Build a level from its raw number.
    pub const fn from_number(value: u8) -> Self {
        Level(value)
    }

    /// Raw numeric value.
    pub const fn number(self) -> u8 {
        self.0
    }

    /// Display name (`INFO`, `WARNING`, ... or `Level N`).
    pub fn name(self) -> Cow<'static, str> {
        match self {
            Level::NOTSET => Cow::Borrowed("NOTSET"),
            Level::TRACE => Cow::Borrowed("TRACE"),
            Level::DEBUG => Cow::Borrowed("DEBUG"),
            Level::INFO => Cow::Borrowed("INFO"),
            Level::WARNING => Cow::Borrowed("WARNING"),
            Level::ERROR => Cow::Borrowed("ERROR"),
            Level::CRITICAL => Cow::Borrowed("CRITICAL"),
            Level(n) => Cow::Owned(format!("Level {n}")),
        }
    }

    /// Terminal color for this level, if it has one.
    pub fn color(self) -> Option<Color> {
        match self {
            Level::TRACE => Some(Color::Blue),
            Level::DEBUG => Some(Color::Cyan),
            Level::INFO => Some(Color::Green),
            Level::WARNING => Some(Color::Yellow),
            Level::ERROR => Some(Color::Red),
            Level::CRITICAL => Some(Color::BrightRed),
            _ => None,
        }
    }

    /// Level name wrapped in its color escape codes.
    pub fn colored_name(self) -> String {
        let name = self.name();
        match self.color() {
            Some(color) => name.as_ref().color(color).to_string(),
            None => name.into_owned(),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::TRACE => Level::TRACE,
            tracing::Level::DEBUG => Level::DEBUG,
            tracing::Level::INFO => Level::INFO,
            tracing::Level::WARN => Level::WARNING,
            tracing::Level::ERROR => Level::ERROR,
        }
    }
}

/// Error returned when a level string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(n) = trimmed.parse::<u8>() {
            return Ok(Level(n));
        }
        match trimmed.to_ascii_uppercase().as_str() {
            "NOTSET" => Ok(Level::NOTSET),
            "TRACE" => Ok(Level::TRACE),
            "DEBUG" => Ok(Level::DEBUG),
            "INFO" => Ok(Level::INFO),
            "WARNING" | "WARN" => Ok(Level::WARNING),
            "ERROR" => Ok(Level::ERROR),
            "CRITICAL" | "FATAL" => Ok(Level::CRITICAL),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Coarsest `tracing` level that still lets `level` through.
pub fn tracing_directive(level: Level) -> &'static str {
    match level.number() {
        0..=5 => "trace",
        6..=10 => "debug",
        11..=20 => "info",
        21..=30 => "warn",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names_and_numbers() {
        assert_eq!("debug".parse::<Level>().unwrap(), Level::DEBUG);
        assert_eq!("WARN".parse::<Level>().unwrap(), Level::WARNING);
        assert_eq!("fatal".parse::<Level>().unwrap(), Level::CRITICAL);
        assert_eq!("25".parse::<Level>().unwrap(), Level::from_number(25));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn unknown_levels_have_no_color() {
        let custom = Level::from_number(25);
        assert_eq!(custom.name(), "Level 25");
        assert_eq!(custom.color(), None);
        assert_eq!(custom.colored_name(), "Level 25");
    }

    #[test]
    fn fixed_color_table() {
        assert_eq!(Level::TRACE.color(), Some(Color::Blue));
        assert_eq!(Level::DEBUG.color(), Some(Color::Cyan));
        assert_eq!(Level::INFO.color(), Some(Color::Green));
        assert_eq!(Level::WARNING.color(), Some(Color::Yellow));
        assert_eq!(Level::ERROR.color(), Some(Color::Red));
        assert_eq!(Level::CRITICAL.color(), Some(Color::BrightRed));
    }

    #[test]
    fn tracing_directive_covers_range() {
        assert_eq!(tracing_directive(Level::DEBUG), "debug");
        assert_eq!(tracing_directive(Level::WARNING), "warn");
        assert_eq!(tracing_directive(Level::CRITICAL), "error");
    }
}
