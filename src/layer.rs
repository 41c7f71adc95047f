use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::formatter::{FormatError, JsonFormatter};
use crate::record::{ExceptionInfo, LogRecord};

/// Event field holding the message.
pub const MESSAGE_FIELD: &str = "message";

/// Event field whose string value becomes [`LogRecord::stack`].
pub const STACK_FIELD: &str = "stack";

/// Copies the fields of a `tracing` event into a [`LogRecord`].
///
/// `message` and `stack` fill their dedicated attributes, the first error
/// recorded with `record_error` becomes the exception, and everything else
/// lands in [`LogRecord::extra`] as a typed JSON value.
pub struct RecordVisitor<'a> {
    record: &'a mut LogRecord,
}

impl<'a> RecordVisitor<'a> {
    pub fn new(record: &'a mut LogRecord) -> Self {
        Self { record }
    }

    fn insert(&mut self, field: &Field, value: Value) {
        self.record.extra.insert(field.name().to_string(), value);
    }
}

impl<'a> Visit for RecordVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            MESSAGE_FIELD => self.record.message = value.to_string(),
            STACK_FIELD => self.record.stack = Some(value.to_string()),
            _ => self.insert(field, Value::String(value.to_string())),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.record.exception.is_none() {
            self.record.exception = Some(ExceptionInfo::from_error(value));
        } else {
            self.insert(field, Value::String(value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            MESSAGE_FIELD => self.record.message = format!("{:?}", value),
            STACK_FIELD => self.record.stack = Some(format!("{:?}", value)),
            _ => self.insert(field, Value::String(format!("{:?}", value))),
        }
    }
}

/// Build a [`LogRecord`] from a `tracing` event.
///
/// The innermost span of the event's scope stands in for the calling
/// function and the event target for the logger name.
pub fn capture_event<S, N>(ctx: &FmtContext<'_, S, N>, event: &Event<'_>) -> LogRecord
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    let meta = event.metadata();
    let mut record = LogRecord::new(*meta.level(), meta.target(), String::new());
    record.module = meta.module_path().map(|s| s.to_string());
    record.path = meta.file().map(|s| s.to_string());
    record.line = meta.line();
    record.function = ctx
        .event_scope()
        .and_then(|mut scope| scope.next())
        .map(|span| span.name().to_string());

    event.record(&mut RecordVisitor::new(&mut record));
    record
}

/// Minimal line emitted when a field cannot be formatted, so the event is
/// still visible.
fn fallback_line(record: &LogRecord, err: &FormatError) -> String {
    let mut output = Map::new();
    output.insert("level".to_string(), Value::String(record.level.as_str().to_string()));
    output.insert("logger".to_string(), Value::String(record.logger.clone()));
    output.insert("message".to_string(), Value::String(record.message.clone()));
    output.insert("format_error".to_string(), Value::String(err.to_string()));
    Value::Object(output).to_string()
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let record = capture_event(ctx, event);
        let line = match self.format(&record) {
            Ok(line) => line,
            Err(err) => fallback_line(&record, &err),
        };
        writeln!(writer, "{}", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn fallback_line_is_json() {
        let record = LogRecord::new(Level::WARN, "app::db", "slow query");
        let err = FormatError::Json(serde_json::from_str::<Value>("{").unwrap_err());
        let value: Value = serde_json::from_str(&fallback_line(&record, &err)).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["message"], "slow query");
        assert!(value["format_error"].as_str().unwrap().starts_with("json error"));
    }
}
