//! Environment variable names read by
//! [`FormatterConfig::from_env`](crate::config::FormatterConfig::from_env).
//! Nothing else in the crate looks at the environment.

/// Format pattern, e.g. `{timestamp} {level} {message}`.
pub const JSONLOG_PATTERN_ENV: &str = "JSONLOG_PATTERN";

/// Pattern style: `brace`, `dollar` or `percent` (or `{`, `$`, `%`).
pub const JSONLOG_STYLE_ENV: &str = "JSONLOG_STYLE";

/// chrono strftime pattern for the `timestamp` field.
pub const JSONLOG_DATE_PATTERN_ENV: &str = "JSONLOG_DATE_PATTERN";

/// Boolean: encode stacks as frame lists instead of text.
pub const JSONLOG_STRUCTURED_STACKS_ENV: &str = "JSONLOG_STRUCTURED_STACKS";

/// Boolean: shorten dependency source paths in frames.
pub const JSONLOG_RELATIVE_PATHS_ENV: &str = "JSONLOG_RELATIVE_PATHS";

/// Output key overrides as `field=key` pairs separated by commas.
pub const JSONLOG_RENAME_ENV: &str = "JSONLOG_RENAME";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
