use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::attribute::Attribute;
use crate::compile::{compile, CompileOptions, CompiledField, ConfigWarning, FieldError};
use crate::config::{ConfigError, FormatterConfig};
use crate::pattern::{self, PatternStyle};
use crate::record::{display_value, LogRecord};
use crate::stack::StackMode;

/// Error returned when a record cannot be serialized.
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    #[error("field `{key}` could not be formatted: {source}")]
    Field {
        key: String,
        #[source]
        source: FieldError,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Renders [`LogRecord`]s as single-line JSON objects.
///
/// The pattern is parsed and compiled once in [`JsonFormatter::new`]; after
/// that the formatter is immutable and can be shared across threads (it is
/// `Send + Sync`). Declared fields come first, in pattern order and under
/// their renamed keys, followed by the record's extra attributes in
/// ascending key order.
#[derive(Debug)]
pub struct JsonFormatter {
    fields: Vec<CompiledField>,
    pattern: String,
    style: PatternStyle,
    rename: BTreeMap<String, String>,
    stack_mode: StackMode,
    relative_paths: bool,
    warnings: Vec<ConfigWarning>,
}

impl JsonFormatter {
    /// Compile `config` into a formatter.
    ///
    /// **Returns**
    /// - `Err(..)` if the date pattern is not a valid strftime pattern.
    /// - `Ok(..)` otherwise. Patterns that reference no known field or
    ///   rename maps naming absent fields are accepted; the problems are
    ///   logged and kept in [`JsonFormatter::warnings`].
    pub fn new(config: FormatterConfig) -> Result<Self, ConfigError> {
        let formatter = Self::compile(config)?;
        log_warnings(&formatter.pattern, formatter.style, &formatter.warnings);
        Ok(formatter)
    }

    /// Same as [`JsonFormatter::new`] without logging the warnings, for
    /// callers that emit them once their own subscriber is in place.
    pub(crate) fn compile(config: FormatterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let specs = pattern::parse(&config.pattern, config.style);
        let options = CompileOptions {
            pattern: &config.pattern,
            style: config.style,
            date_pattern: &config.date_pattern,
            stack_mode: config.stack_mode(),
            relative_paths: config.relative_paths,
            rename: &config.rename,
        };
        let compiled = compile(&specs, &options);

        Ok(Self {
            fields: compiled.fields,
            stack_mode: config.stack_mode(),
            pattern: config.pattern,
            style: config.style,
            rename: config.rename,
            relative_paths: config.relative_paths,
            warnings: compiled.warnings,
        })
    }

    /// Shorthand for [`FormatterConfig::from_env`] followed by [`JsonFormatter::new`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(FormatterConfig::from_env()?)
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    /// Configuration problems found while compiling.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn style(&self) -> PatternStyle {
        self.style
    }

    pub fn rename(&self) -> &BTreeMap<String, String> {
        &self.rename
    }

    pub fn stack_mode(&self) -> StackMode {
        self.stack_mode
    }

    pub fn relative_paths(&self) -> bool {
        self.relative_paths
    }

    /// Build the JSON object for `record` without serializing it.
    ///
    /// Extra attributes are stringified. Keys naming a record attribute
    /// (or one of its aliases) and keys already emitted are skipped.
    pub fn to_value(&self, record: &LogRecord) -> Result<Value, FormatError> {
        let mut output = Map::with_capacity(self.fields.len() + record.extra.len());
        for field in &self.fields {
            let value = field.extract(record).map_err(|source| FormatError::Field {
                key: field.key().to_string(),
                source,
            })?;
            output.insert(field.key().to_string(), value);
        }
        for (key, value) in &record.extra {
            if Attribute::from_name(key).is_some() || output.contains_key(key) {
                continue;
            }
            output.insert(key.clone(), Value::String(display_value(value)));
        }
        Ok(Value::Object(output))
    }

    /// Render `record` as compact JSON, without a trailing newline.
    pub fn format(&self, record: &LogRecord) -> Result<String, FormatError> {
        Ok(serde_json::to_string(&self.to_value(record)?)?)
    }
}

pub(crate) fn log_warnings(pattern: &str, style: PatternStyle, warnings: &[ConfigWarning]) {
    for warning in warnings {
        tracing::warn!(pattern = %pattern, style = %style, "{}", warning);
    }
}
