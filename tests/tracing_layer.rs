use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use tracing_json_pattern::stack::render_stack;
use tracing_json_pattern::record::Frame;
use tracing_json_pattern::{FormatterConfig, JsonFormatter, PatternStyle};

/// In-memory writer shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = Capture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl Capture {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(|line| serde_json::from_str(line).expect("one JSON object per line"))
            .collect()
    }
}

fn capture(config: FormatterConfig, emit: impl FnOnce()) -> Vec<Value> {
    let writer = Capture::default();
    let formatter = JsonFormatter::new(config).unwrap();
    let layer = tracing_subscriber::fmt::layer().event_format(formatter).with_writer(writer.clone());
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::with_default(subscriber, emit);
    writer.lines()
}

#[test]
fn event_fields_and_extras() {
    let lines = capture(
        FormatterConfig::new("{level} {logger} {message} {line}", PatternStyle::Brace),
        || tracing::info!(user_id = 42, verified = true, "signed in"),
    );
    assert_eq!(lines.len(), 1);
    let line = &lines[0];
    assert_eq!(line["level"], "INFO");
    assert_eq!(line["logger"], "tracing_layer");
    assert_eq!(line["message"], "signed in");
    assert!(line["line"].is_u64());
    assert_eq!(line["user_id"], "42");
    assert_eq!(line["verified"], "true");
}

#[test]
fn rename_applies_at_every_level() {
    let config = FormatterConfig::new("%(levelname)s %(message)s", PatternStyle::Percent).with_rename("level", "severity");
    let lines = capture(config, || {
        tracing::trace!("t");
        tracing::debug!("d");
        tracing::info!("i");
        tracing::warn!("w");
        tracing::error!("e");
    });
    let levels: Vec<&str> = lines.iter().map(|l| l["severity"].as_str().unwrap()).collect();
    assert_eq!(levels, ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"]);
    assert!(lines.iter().all(|l| l.get("level").is_none()));
}

#[test]
fn innermost_span_is_the_function() {
    let lines = capture(FormatterConfig::new("$function $message", PatternStyle::Dollar), || {
        tracing::info!("outside");
        tracing::info_span!("handle_request").in_scope(|| {
            tracing::info_span!("load_user").in_scope(|| tracing::info!("inside"));
        });
    });
    assert_eq!(lines[0]["function"], Value::Null);
    assert_eq!(lines[1]["function"], "load_user");
}

#[test]
fn recorded_error_becomes_the_exception() {
    let lines = capture(FormatterConfig::new("{message} {exception}", PatternStyle::Brace), || {
        let err = "forty-two".parse::<u32>().unwrap_err();
        tracing::error!(error = &err as &(dyn std::error::Error + 'static), "bad input");
        tracing::error!("no error here");
    });
    assert_eq!(lines[0]["exception"]["type"], "ParseIntError");
    assert_eq!(lines[0]["exception"]["value"], "invalid digit found in string");
    assert!(lines[0].get("error").is_none());
    assert_eq!(lines[1]["exception"], Value::Null);
}

#[test]
fn stack_field_in_both_modes() {
    let text = render_stack(&[Frame::new("src/main.rs", Some(12), "app::main").with_source("run()")]);

    let emit = |text: &str| tracing::warn!(stack = %text, "slow path");
    let blob = capture(FormatterConfig::new("{stack}", PatternStyle::Brace), || emit(&text));
    assert_eq!(blob[0]["stack"], text.as_str());

    let structured = capture(
        FormatterConfig::new("{stack}", PatternStyle::Brace).with_structured_stacks(true),
        || emit(&text),
    );
    assert_eq!(structured[0]["stack"]["frames"][0]["function"], "app::main");
    assert_eq!(structured[0]["stack"]["frames"][0]["line"], 12);
}

#[test]
fn failing_field_falls_back_to_minimal_line() {
    let lines = capture(FormatterConfig::new("{message} {level:d}", PatternStyle::Brace), || {
        tracing::info!("still visible")
    });
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "still visible");
    assert_eq!(lines[0]["level"], "INFO");
    assert!(lines[0]["format_error"].as_str().unwrap().contains("level"));
}

#[test]
fn event_fields_named_like_attributes_are_not_extras() {
    let lines = capture(FormatterConfig::new("{message}", PatternStyle::Brace), || {
        tracing::info!(line = 5, thread = "fake", levelname = "LOUD", request_id = "r-1", "x")
    });
    let keys: Vec<&String> = lines[0].as_object().unwrap().keys().collect();
    assert_eq!(keys, ["message", "request_id"]);
}
