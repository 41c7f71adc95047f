use serde_json::Value;
use std::sync::Arc;
use std::thread;
use tracing::Level;

use tracing_json_pattern::attribute::Attribute;
use tracing_json_pattern::compile::ConfigWarning;
use tracing_json_pattern::paths::relativize;
use tracing_json_pattern::record::{ExceptionInfo, Frame};
use tracing_json_pattern::stack::render_stack;
use tracing_json_pattern::{FormatError, FormatterConfig, JsonFormatter, LogRecord, PatternStyle};

const LEVELS: [Level; 5] = [Level::TRACE, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR];

fn parse(line: &str) -> Value {
    serde_json::from_str(line).expect("formatter emits valid JSON")
}

fn keys(value: &Value) -> Vec<String> {
    value.as_object().expect("object").keys().cloned().collect()
}

#[test]
fn renamed_key_replaces_field_name_for_every_level() {
    for style_pattern in [
        ("{level} {message}", PatternStyle::Brace),
        ("$level $message", PatternStyle::Dollar),
        ("%(level)s %(message)s", PatternStyle::Percent),
    ] {
        let config = FormatterConfig::new(style_pattern.0, style_pattern.1).with_rename("level", "severity");
        let formatter = JsonFormatter::new(config).unwrap();
        for level in LEVELS {
            let line = formatter.format(&LogRecord::new(level, "app", "hello")).unwrap();
            let value = parse(&line);
            assert!(value.get("level").is_none(), "{line}");
            assert_eq!(value["severity"], level.as_str());
        }
    }
}

#[test]
fn full_pattern_keeps_canonical_key_order() {
    let pattern: Vec<String> = Attribute::ALL.iter().map(|a| format!("{{{}}}", a.name())).collect();
    let formatter = JsonFormatter::new(FormatterConfig::new(pattern.join(" "), PatternStyle::Brace)).unwrap();
    assert!(formatter.warnings().is_empty());

    let record = LogRecord::new(Level::INFO, "app::server", "ready")
        .with_location("/srv/app/src/server.rs", 41)
        .with_module("app::server")
        .with_extra("port", 8080)
        .with_extra("host", "0.0.0.0");
    let value = parse(&formatter.format(&record).unwrap());

    let mut expected: Vec<String> = Attribute::ALL.iter().map(|a| a.name().to_string()).collect();
    expected.push("host".to_string());
    expected.push("port".to_string());
    assert_eq!(keys(&value), expected);

    assert_eq!(value["level_no"], 20);
    assert_eq!(value["filename"], "server.rs");
    assert_eq!(value["line"], 41);
    assert_eq!(value["process"], std::process::id());
    assert_eq!(value["exception"], Value::Null);
    assert_eq!(value["stack"], Value::Null);
    assert_eq!(value["port"], "8080");
    assert!(value["created"].is_f64());
}

#[test]
fn classic_percent_pattern() {
    let config = FormatterConfig::new(
        "%(asctime)s %(levelname)-8s %(name)s:%(lineno)d %(message)s",
        PatternStyle::Percent,
    )
    .with_date_pattern("%Y-%m-%dT%H:%M:%S");
    let formatter = JsonFormatter::new(config).unwrap();
    let record = LogRecord::new(Level::WARN, "app.db", "pool {} exhausted")
        .with_args(["primary"])
        .with_location("src/db.rs", 7);
    let value = parse(&formatter.format(&record).unwrap());

    assert_eq!(keys(&value), ["timestamp", "level", "logger", "line", "message"]);
    assert_eq!(value["level"], "WARN    ");
    assert_eq!(value["line"], 7);
    assert_eq!(value["message"], "pool primary exhausted");
    assert_eq!(value["timestamp"].as_str().unwrap().len(), "2024-03-05T10:00:00".len());
}

#[test]
fn escaped_references_produce_no_fields() {
    let formatter = JsonFormatter::new(FormatterConfig::new("%% \\%(line)d %(message)s", PatternStyle::Percent)).unwrap();
    assert_eq!(formatter.fields().len(), 1);

    let formatter = JsonFormatter::new(FormatterConfig::new("$$ \\$line ${message}", PatternStyle::Dollar)).unwrap();
    let line = formatter.format(&LogRecord::new(Level::INFO, "app", "m")).unwrap();
    assert_eq!(line, r#"{"message":"m"}"#);
}

#[test]
fn orphan_rename_and_empty_pattern_warn() {
    let config = FormatterConfig::new("{level}", PatternStyle::Brace).with_rename("thread", "tid");
    let formatter = JsonFormatter::new(config).unwrap();
    assert_eq!(formatter.warnings(), [ConfigWarning::UnknownRenameKeys(vec!["thread".to_string()])]);

    let formatter = JsonFormatter::new(FormatterConfig::new("%(message)s", PatternStyle::Brace)).unwrap();
    assert!(matches!(formatter.warnings(), [ConfigWarning::NoFields { .. }]));
}

#[test]
fn bad_sub_format_fails_only_at_format_time() {
    let formatter = JsonFormatter::new(FormatterConfig::new("{message:>>>}", PatternStyle::Brace)).unwrap();
    let err = formatter.format(&LogRecord::new(Level::INFO, "app", "m")).unwrap_err();
    assert!(matches!(err, FormatError::Field { ref key, .. } if key == "message"), "{err}");
}

#[test]
fn exception_with_relative_paths() {
    let config = FormatterConfig::new("{message} {exception}", PatternStyle::Brace).with_relative_paths(true);
    let formatter = JsonFormatter::new(config).unwrap();
    let info = ExceptionInfo::new("Elapsed", Some("deadline has elapsed".to_string())).with_frames(vec![
        Frame::new("/home/ci/.cargo/registry/src/index.crates.io-6f17d22bba15001f/tokio-1.38.0/src/time/timeout.rs", Some(202), "tokio::time::timeout"),
        Frame::new("/srv/app/src/client.rs", Some(55), "app::client::fetch"),
    ]);
    let value = parse(&formatter.format(&LogRecord::new(Level::ERROR, "app", "request failed").with_exception(info)).unwrap());

    let exception = &value["exception"];
    assert_eq!(keys(exception), ["type", "value", "frames"]);
    assert_eq!(exception["frames"][0]["file"], "tokio-1.38.0/src/time/timeout.rs");
    assert_eq!(exception["frames"][1]["file"], "/srv/app/src/client.rs");
}

#[test]
fn relativize_cuts_once() {
    let path = "/work/vendor/outer/vendor/inner.rs";
    let once = relativize(path).to_string();
    assert_eq!(once, "outer/vendor/inner.rs");
    assert_eq!(relativize(&once), once.as_str());
}

#[test]
fn stack_modes() {
    let text = render_stack(&[
        Frame::new("/srv/app/vendor/hyper/src/proto.rs", Some(10), "hyper::proto::poll").with_source("self.poll_inner()"),
        Frame::new("/srv/app/src/main.rs", Some(3), "app::main").with_source("serve()"),
    ]);
    let record = LogRecord::new(Level::DEBUG, "app", "where am i").with_stack(text.clone());

    let blob = JsonFormatter::new(FormatterConfig::new("{stack}", PatternStyle::Brace)).unwrap();
    assert_eq!(parse(&blob.format(&record).unwrap())["stack"], text.as_str());

    let structured = JsonFormatter::new(
        FormatterConfig::new("{stack}", PatternStyle::Brace)
            .with_structured_stacks(true)
            .with_relative_paths(true),
    )
    .unwrap();
    let value = parse(&structured.format(&record).unwrap());
    let frames = value["stack"]["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["file"], "hyper/src/proto.rs");
    assert_eq!(frames[0]["source"], "self.poll_inner()");
}

#[test]
fn shared_formatter_across_threads() {
    let formatter = Arc::new(
        JsonFormatter::new(FormatterConfig::new("{thread} {level} {message}", PatternStyle::Brace)).unwrap(),
    );
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let formatter = Arc::clone(&formatter);
            thread::spawn(move || {
                (0..50)
                    .map(|n| formatter.format(&LogRecord::new(Level::INFO, "app", format!("{i}-{n}"))).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let lines = handle.join().unwrap();
        assert_eq!(lines.len(), 50);
        let threads: Vec<Value> = lines.iter().map(|l| parse(l)["thread"].clone()).collect();
        assert!(threads.windows(2).all(|w| w[0] == w[1]));
    }
}
