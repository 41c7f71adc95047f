//! Pattern-driven JSON event formatting for `tracing`.
//!
//! A format pattern in one of three styles (`{name}`, `$name`, `%(name)s`)
//! selects which record attributes end up in the JSON object, in which
//! order and under which keys. The pattern is compiled once into a table of
//! extractors; formatting an event then only runs those extractors.
//!
//! ```no_run
//! use tracing_json_pattern::config::FormatterConfig;
//! use tracing_json_pattern::pattern::PatternStyle;
//!
//! let config = FormatterConfig::new("{timestamp} {level} {logger} {message}", PatternStyle::Brace)
//!     .with_rename("timestamp", "ts");
//! tracing_json_pattern::init::init_tracing(config).expect("install subscriber");
//! tracing::info!(user_id = 42, "signed in");
//! // {"ts":"2024-03-05 10:00:00,123","level":"INFO","logger":"app","message":"signed in","user_id":"42"}
//! ```
pub mod attribute;
pub mod record;
pub mod pattern;
pub mod scalar;
pub mod paths;
pub mod exception;
pub mod stack;
pub mod compile;
pub mod config;
pub mod env;
pub mod formatter;
pub mod layer;
pub mod init;

pub use config::FormatterConfig;
pub use formatter::{FormatError, JsonFormatter};
pub use pattern::PatternStyle;
pub use record::LogRecord;
