use tracing::info;

use tracing_json_pattern::init::init_tracing;
use tracing_json_pattern::record::Frame;
use tracing_json_pattern::stack::render_stack;
use tracing_json_pattern::{FormatterConfig, PatternStyle};

fn main() {
    // Percent style with classic attribute names; stacks are split into frames.
    let config = FormatterConfig::new(
        "%(asctime)s %(levelname)s %(name)s %(message)s %(stack_info)s",
        PatternStyle::Percent,
    )
    .with_structured_stacks(true)
    .with_relative_paths(true);

    if let Err(err) = init_tracing(config) {
        eprintln!("failed to install subscriber: {err}");
        return;
    }

    let stack = render_stack(&[
        Frame::new(file!(), Some(line!()), "structured_stacks::main").with_source("render_stack(&[..])"),
        Frame::new("/home/ci/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.38.0/src/runtime/task/mod.rs", Some(412), "tokio::runtime::task::poll"),
    ]);
    info!(stack = %stack, "rendered stack");
}
