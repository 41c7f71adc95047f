use std::time::Instant;
use tracing::{error, info, info_span, warn};

use tracing_json_pattern::init::init_tracing;
use tracing_json_pattern::{FormatterConfig, PatternStyle};

fn main() {
    let config = FormatterConfig::new(
        "{timestamp} {level:<5} {logger} {function} {line} {message}",
        PatternStyle::Brace,
    )
    .with_rename("timestamp", "ts")
    .with_rename("level", "severity");

    if let Err(err) = init_tracing(config) {
        eprintln!("failed to install subscriber: {err}");
        return;
    }

    info!("basic example started");

    let n: u64 = 5;
    let start = Instant::now();
    info_span!("handle_request").in_scope(|| {
        for i in 0..n {
            info!(iteration = i, user = "alice", "request handled");
        }
        warn!(queue_depth = 120, "queue is filling up");
    });

    if let Err(err) = "eighty".parse::<u16>() {
        error!(error = &err as &(dyn std::error::Error + 'static), "could not parse port");
    }

    info!(elapsed = ?start.elapsed(), "basic example finished");
}
