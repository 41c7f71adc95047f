use tracing::{debug, info, warn};

use tracing_json_pattern::init::init_tracing_from_env;

/// Run with e.g.
///
/// ```text
/// JSONLOG_STYLE='$' JSONLOG_PATTERN='$asctime $levelname $message' \
///     JSONLOG_RENAME='asctime=ts,levelname=severity' cargo run --example from_env
/// ```
fn main() {
    if let Err(err) = init_tracing_from_env() {
        eprintln!("invalid JSONLOG_* configuration: {err}");
        std::process::exit(1);
    }

    info!("configured from environment");
    debug!(cache_hits = 17, "cache stats");
    warn!(retries = 3, "upstream slow");
}
