use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::env::{
    env_or, JSONLOG_DATE_PATTERN_ENV, JSONLOG_PATTERN_ENV, JSONLOG_RELATIVE_PATHS_ENV, JSONLOG_RENAME_ENV,
    JSONLOG_STRUCTURED_STACKS_ENV, JSONLOG_STYLE_ENV,
};
use crate::pattern::{PatternStyle, UnknownStyle};
use crate::stack::StackMode;

/// Pattern used when none is configured.
pub const DEFAULT_PATTERN: &str = "%(message)s";

/// Date pattern used when none is configured, e.g. `2024-03-05 10:00:00,123`.
pub const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Configuration of a [`JsonFormatter`](crate::formatter::JsonFormatter).
///
/// **Fields**
/// - `pattern`: format string naming the fields to emit, in order.
/// - `style`: grammar of `pattern`.
/// - `date_pattern`: chrono strftime pattern for the `timestamp` field.
/// - `structured_stacks`: emit `stack` as `{"frames": [...]}` instead of text.
/// - `rename`: output key overrides, keyed by field name or alias.
/// - `relative_paths`: shorten dependency source paths in frames.
///
/// Deserializable with every field optional, so it can sit inside a larger
/// application config.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub pattern: String,
    pub style: PatternStyle,
    pub date_pattern: String,
    pub structured_stacks: bool,
    pub rename: BTreeMap<String, String>,
    pub relative_paths: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            style: PatternStyle::Percent,
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            structured_stacks: false,
            rename: BTreeMap::new(),
            relative_paths: false,
        }
    }
}

/// Error type returned for unusable configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Style(#[from] UnknownStyle),

    #[error("invalid date pattern `{0}`")]
    DatePattern(String),

    #[error("invalid value `{value}` for {key}")]
    Env { key: &'static str, value: String },
}

impl FormatterConfig {
    pub fn new(pattern: impl Into<String>, style: PatternStyle) -> Self {
        Self { pattern: pattern.into(), style, ..Self::default() }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    pub fn with_style(mut self, style: PatternStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_date_pattern(mut self, date_pattern: impl Into<String>) -> Self {
        self.date_pattern = date_pattern.into();
        self
    }

    pub fn with_structured_stacks(mut self, structured: bool) -> Self {
        self.structured_stacks = structured;
        self
    }

    pub fn with_rename(mut self, field: impl Into<String>, key: impl Into<String>) -> Self {
        self.rename.insert(field.into(), key.into());
        self
    }

    pub fn with_relative_paths(mut self, relative: bool) -> Self {
        self.relative_paths = relative;
        self
    }

    pub fn stack_mode(&self) -> StackMode {
        if self.structured_stacks {
            StackMode::Structured
        } else {
            StackMode::Blob
        }
    }

    /// Check the parts of the configuration that can be checked without a record.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if StrftimeItems::new(&self.date_pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::DatePattern(self.date_pattern.clone()));
        }
        Ok(())
    }

    /// Build a configuration from `JSONLOG_*` environment variables, using
    /// the defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let style = match std::env::var(JSONLOG_STYLE_ENV) {
            Ok(style) => style.parse()?,
            Err(_) => defaults.style,
        };

        Ok(Self {
            pattern: env_or(JSONLOG_PATTERN_ENV, &defaults.pattern),
            style,
            date_pattern: env_or(JSONLOG_DATE_PATTERN_ENV, &defaults.date_pattern),
            structured_stacks: env_flag(JSONLOG_STRUCTURED_STACKS_ENV)?,
            rename: parse_rename(&env_or(JSONLOG_RENAME_ENV, ""))?,
            relative_paths: env_flag(JSONLOG_RELATIVE_PATHS_ENV)?,
        })
    }
}

fn env_flag(key: &'static str) -> Result<bool, ConfigError> {
    let value = env_or(key, "");
    parse_flag(&value).ok_or(ConfigError::Env { key, value })
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

/// Parse `field=key,field=key`.
fn parse_rename(value: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut rename = BTreeMap::new();
    for pair in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                rename.insert(from.trim().to_string(), to.trim().to_string());
            }
            _ => {
                return Err(ConfigError::Env { key: JSONLOG_RENAME_ENV, value: value.to_string() });
            }
        }
    }
    Ok(rename)
}
