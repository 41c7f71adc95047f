use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::Level;

use crate::attribute::Attribute;

/// One log occurrence handed to [`JsonFormatter::format`](crate::formatter::JsonFormatter::format).
///
/// The formatter only ever reads a record. Hosts other than `tracing` can
/// build one with [`LogRecord::new`] and the `with_*` methods.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub created: DateTime<Utc>,
    pub level: Level,
    pub logger: String,
    pub module: Option<String>,
    pub path: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
    /// Message template; `{}` placeholders are filled from `args`.
    pub message: String,
    pub args: Vec<Value>,
    pub process: u32,
    pub process_name: Option<String>,
    pub elapsed_ms: f64,
    pub thread: u64,
    pub thread_name: Option<String>,
    pub exception: Option<ExceptionInfo>,
    /// Pre-rendered call stack: a banner line followed by location/source pairs.
    pub stack: Option<String>,
    /// Caller-supplied attributes. Keys naming an [`Attribute`] are not
    /// emitted as extras.
    pub extra: BTreeMap<String, Value>,
}

/// A source location shared by exception frames and stack frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub file: String,
    pub line: Option<u32>,
    pub function: String,
    pub source: Option<String>,
}

impl Frame {
    pub fn new(file: impl Into<String>, line: Option<u32>, function: impl Into<String>) -> Self {
        Frame { file: file.into(), line, function: function.into(), source: None }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A captured error: its type name, rendered value and the frames it
/// travelled through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Option<String>,
    pub frames: Vec<Frame>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("message has {placeholders} placeholder(s) but {args} argument(s) were given")]
    ArgumentCount { placeholders: usize, args: usize },

    #[error("unmatched `{brace}` in message template at byte {offset}")]
    UnmatchedBrace { brace: char, offset: usize },
}

/// Numeric severity for a level, on the classic 10-step scale.
pub fn level_number(level: Level) -> u32 {
    match level {
        Level::TRACE => 5,
        Level::DEBUG => 10,
        Level::INFO => 20,
        Level::WARN => 30,
        Level::ERROR => 40,
    }
}

static PROCESS_START: OnceLock<Instant> = OnceLock::new();
static PROCESS_NAME: OnceLock<Option<String>> = OnceLock::new();
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: Cell<u64> = const { Cell::new(0) };
}

/// Pin the reference instant used for [`LogRecord::elapsed_ms`].
///
/// Called by [`init_tracing`](crate::init::init_tracing); otherwise the
/// first captured record sets it.
pub fn mark_process_start() -> Instant {
    *PROCESS_START.get_or_init(Instant::now)
}

fn process_name() -> Option<String> {
    PROCESS_NAME
        .get_or_init(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        })
        .clone()
}

/// Small sequential id for the calling thread, stable for its lifetime.
pub fn current_thread_id() -> u64 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

impl LogRecord {
    /// Build a record for `level` and `logger`, capturing the creation
    /// time, process and thread of the caller.
    pub fn new(level: Level, logger: impl Into<String>, message: impl Into<String>) -> Self {
        let start = mark_process_start();
        let current = std::thread::current();
        LogRecord {
            created: Utc::now(),
            level,
            logger: logger.into(),
            module: None,
            path: None,
            line: None,
            function: None,
            message: message.into(),
            args: Vec::new(),
            process: std::process::id(),
            process_name: process_name(),
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            thread: current_thread_id(),
            thread_name: current.name().map(str::to_string),
            exception: None,
            stack: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    pub fn with_location(mut self, path: impl Into<String>, line: u32) -> Self {
        self.path = Some(path.into());
        self.line = Some(line);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exception(mut self, exception: ExceptionInfo) -> Self {
        self.exception = Some(exception);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Final path component of [`LogRecord::path`].
    pub fn filename(&self) -> Option<String> {
        let path = self.path.as_deref()?;
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        Some(name.to_string())
    }

    /// Creation time in fractional seconds since the UNIX epoch.
    pub fn created_secs(&self) -> f64 {
        self.created.timestamp() as f64 + f64::from(self.created.timestamp_subsec_nanos()) / 1e9
    }

    pub fn msecs(&self) -> f64 {
        f64::from(self.created.timestamp_subsec_nanos()) / 1e6
    }

    /// Render the message template against the positional arguments.
    ///
    /// Without arguments the template is returned verbatim, braces included.
    pub fn rendered_message(&self) -> Result<String, MessageError> {
        if self.args.is_empty() {
            return Ok(self.message.clone());
        }

        let mut out = String::with_capacity(self.message.len());
        let mut args = self.args.iter();
        let mut placeholders = 0;
        let mut chars = self.message.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            match c {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    out.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    out.push('}');
                }
                '{' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    placeholders += 1;
                    if let Some(arg) = args.next() {
                        out.push_str(&display_value(arg));
                    }
                }
                '{' | '}' => return Err(MessageError::UnmatchedBrace { brace: c, offset }),
                _ => out.push(c),
            }
        }

        if placeholders != self.args.len() {
            return Err(MessageError::ArgumentCount { placeholders, args: self.args.len() });
        }
        Ok(out)
    }

    /// Raw JSON value of a scalar attribute.
    ///
    /// `Message` yields the unrendered template and `Timestamp` the RFC 3339
    /// creation time; the compiler gives both dedicated extractors.
    pub fn raw_value(&self, attr: Attribute) -> Value {
        match attr {
            Attribute::Timestamp => Value::String(self.created.to_rfc3339()),
            Attribute::Created => Value::from(self.created_secs()),
            Attribute::Exception => self
                .exception
                .as_ref()
                .and_then(|e| serde_json::to_value(e).ok())
                .unwrap_or(Value::Null),
            Attribute::Filename => self.filename().map(Value::String).unwrap_or(Value::Null),
            Attribute::Function => optional(&self.function),
            Attribute::Level => Value::String(self.level.as_str().to_string()),
            Attribute::LevelNo => Value::from(level_number(self.level)),
            Attribute::Line => self.line.map(Value::from).unwrap_or(Value::Null),
            Attribute::Module => optional(&self.module),
            Attribute::Msecs => Value::from(self.msecs()),
            Attribute::Message => Value::String(self.message.clone()),
            Attribute::Logger => Value::String(self.logger.clone()),
            Attribute::Path => optional(&self.path),
            Attribute::Process => Value::from(self.process),
            Attribute::ProcessName => optional(&self.process_name),
            Attribute::ElapsedMs => Value::from(self.elapsed_ms),
            Attribute::Stack => optional(&self.stack),
            Attribute::Thread => Value::from(self.thread),
            Attribute::ThreadName => optional(&self.thread_name),
        }
    }
}

fn optional(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

/// Text form of a JSON value: strings unquoted, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::INFO, "app", message)
    }

    #[test]
    fn message_without_args_is_verbatim() {
        let rec = record("literal {braces} stay");
        assert_eq!(rec.rendered_message().unwrap(), "literal {braces} stay");
    }

    #[test]
    fn message_fills_placeholders_in_order() {
        let rec = record("user {} failed {} times {{sic}}").with_args(vec![
            Value::from("bob"),
            Value::from(3),
        ]);
        assert_eq!(rec.rendered_message().unwrap(), "user bob failed 3 times {sic}");
    }

    #[test]
    fn message_argument_mismatch_is_reported() {
        let rec = record("only {}").with_args(vec![1, 2]);
        assert_eq!(
            rec.rendered_message(),
            Err(MessageError::ArgumentCount { placeholders: 1, args: 2 })
        );
    }

    #[test]
    fn derived_time_attributes() {
        let created = Utc.timestamp_opt(1_700_000_000, 250_500_000).unwrap();
        let rec = record("x").with_created(created);
        assert!((rec.created_secs() - 1_700_000_000.2505).abs() < 1e-6);
        assert!((rec.msecs() - 250.5).abs() < 1e-9);
    }

    #[test]
    fn filename_is_last_component() {
        let rec = record("x").with_location("/srv/app/src/db/pool.rs", 12);
        assert_eq!(rec.filename().as_deref(), Some("pool.rs"));
        assert_eq!(rec.raw_value(Attribute::Line), Value::from(12));
        assert_eq!(rec.raw_value(Attribute::Module), Value::Null);
    }

    #[test]
    fn thread_ids_are_stable_per_thread() {
        let here = current_thread_id();
        assert_eq!(here, current_thread_id());
        let other = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(here, other);
    }
}
