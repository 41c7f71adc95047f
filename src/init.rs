use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::config::{ConfigError, FormatterConfig};
use crate::formatter::{log_warnings, JsonFormatter};
use crate::record::mark_process_start;

/// Error type returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("global subscriber already set: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber that writes every event to
/// stdout as one JSON line produced by `formatter`.
///
/// **Effects**
///
/// This installs a [`Registry`] combined with a `fmt` layer using the
/// formatter as its event format, and pins the process start instant
/// used by the `elapsed_ms` field.
pub fn init_tracing_with_formatter(formatter: JsonFormatter) -> Result<(), InitError> {
    mark_process_start();
    let fmt_layer = tracing_subscriber::fmt::layer().event_format(formatter);
    let subscriber = Registry::default().with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Compile `config` and install it with [`init_tracing_with_formatter`].
///
/// Configuration warnings are logged once the subscriber is in place, so
/// they show up in the JSON output itself.
pub fn init_tracing(config: FormatterConfig) -> Result<(), InitError> {
    let formatter = JsonFormatter::compile(config)?;
    let (pattern, style) = (formatter.pattern().to_string(), formatter.style());
    let warnings = formatter.warnings().to_vec();
    init_tracing_with_formatter(formatter)?;
    log_warnings(&pattern, style, &warnings);
    Ok(())
}

/// Initialize tracing from `JSONLOG_*` environment variables.
///
/// Equivalent to calling [`init_tracing`] with
/// [`FormatterConfig::from_env`]. This is the recommended entrypoint for
/// typical services.
pub fn init_tracing_from_env() -> Result<(), InitError> {
    init_tracing(FormatterConfig::from_env()?)
}
