use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;

use crate::exception::frame_value;
use crate::record::Frame;

/// First line of a rendered stack.
pub const STACK_BANNER: &str = "Stack (most recent call last):";

static LOCATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^  File "([^"]*)", line ([0-9]+|\?), in (.*)$"#).expect("valid stack location regex")
});

/// How the `stack` field is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackMode {
    /// The raw text is the value.
    #[default]
    Blob,
    /// `{"frames": [...]}` parsed from the text.
    Structured,
}

/// Encode a rendered stack.
///
/// In structured mode the banner line is dropped and the rest is read as
/// location/source pairs; a location line that does not parse still yields a
/// frame, with `?` for the file and function and no line number.
pub fn encode_stack(text: &str, mode: StackMode, relative_paths: bool) -> Value {
    match mode {
        StackMode::Blob => Value::String(text.to_string()),
        StackMode::Structured => {
            let lines: Vec<&str> = text.split('\n').skip(1).collect();
            let frames: Vec<Value> = lines
                .chunks_exact(2)
                .map(|pair| frame_value(&parse_frame(pair[0], pair[1]), relative_paths))
                .collect();
            json!({ "frames": frames })
        }
    }
}

fn parse_frame(location: &str, source: &str) -> Frame {
    let location = location.trim_end_matches('\r');
    let frame = match LOCATION.captures(location) {
        Some(caps) => Frame::new(&caps[1], caps[2].parse().ok(), &caps[3]),
        None => Frame::new("?", None, "?"),
    };
    frame.with_source(source.trim())
}

/// Render frames in the text form [`encode_stack`] reads back. A frame
/// without a line number is written as `line ?`.
pub fn render_stack(frames: &[Frame]) -> String {
    let mut out = String::from(STACK_BANNER);
    for frame in frames {
        let line = frame.line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string());
        out.push_str(&format!("\n  File \"{}\", line {}, in {}", frame.file, line, frame.function));
        out.push_str(&format!("\n    {}", frame.source.as_deref().unwrap_or("")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = "Stack (most recent call last):\n  File \"/srv/app/vendor/http/src/server.rs\", line 88, in http::server::serve\n    handler.call(req).await\n  File \"/srv/app/src/routes.rs\", line 12, in app::routes::index\n    tracing::info!(stack = %trace, \"served\");";

    #[test]
    fn frame_without_line_survives_round_trip() {
        let frames = [
            Frame::new("src/a.rs", None, "app::f").with_source("f()"),
            Frame::new("src/b.rs", Some(4), "app::g").with_source("g()"),
        ];
        let encoded = encode_stack(&render_stack(&frames), StackMode::Structured, false);
        assert_eq!(
            encoded["frames"],
            json!([
                {"file": "src/a.rs", "line": null, "function": "app::f", "source": "f()"},
                {"file": "src/b.rs", "line": 4, "function": "app::g", "source": "g()"},
            ])
        );
    }

    #[test]
    fn blob_mode_passes_text_through() {
        assert_eq!(encode_stack(STACK, StackMode::Blob, true), Value::String(STACK.to_string()));
    }

    #[test]
    fn structured_mode_parses_pairs() {
        let encoded = encode_stack(STACK, StackMode::Structured, false);
        let frames = encoded["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["file"], "/srv/app/vendor/http/src/server.rs");
        assert_eq!(frames[0]["line"], 88);
        assert_eq!(frames[0]["function"], "http::server::serve");
        assert_eq!(frames[0]["source"], "handler.call(req).await");
        assert_eq!(frames[1]["function"], "app::routes::index");
    }

    #[test]
    fn structured_mode_relativizes() {
        let encoded = encode_stack(STACK, StackMode::Structured, true);
        assert_eq!(encoded["frames"][0]["file"], "http/src/server.rs");
        assert_eq!(encoded["frames"][1]["file"], "/srv/app/src/routes.rs");
    }

    #[test]
    fn malformed_location_keeps_frame_count() {
        let text = "banner\n  File \"a.rs\", line 1, in f\n    f()\n  somewhere else\n    g()\n  File \"b.rs\", line 3, in h\n    h()";
        let encoded = encode_stack(text, StackMode::Structured, false);
        let frames = encoded["frames"].as_array().unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1]["file"], "?");
        assert_eq!(frames[1]["line"], Value::Null);
        assert_eq!(frames[1]["function"], "?");
        assert_eq!(frames[1]["source"], "g()");
    }

    #[test]
    fn render_round_trips_through_structured_mode() {
        let frames = vec![
            Frame::new("src/main.rs", Some(4), "app::main").with_source("run()"),
            Frame::new("src/lib.rs", Some(9), "app::run").with_source("panic!()"),
        ];
        let encoded = encode_stack(&render_stack(&frames), StackMode::Structured, false);
        assert_eq!(encoded["frames"].as_array().unwrap().len(), 2);
        assert_eq!(encoded["frames"][1]["source"], "panic!()");
    }
}
