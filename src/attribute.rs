use std::fmt;

/// Closed set of [`LogRecord`](crate::record::LogRecord) attributes that a
/// pattern may reference.
///
/// Anything a pattern names outside this set is ignored by the compiler;
/// caller-supplied extra attributes travel separately in
/// [`LogRecord::extra`](crate::record::LogRecord::extra).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// Creation time rendered with the configured date pattern.
    Timestamp,
    /// Creation time as fractional seconds since the UNIX epoch.
    Created,
    /// Structured exception, or null.
    Exception,
    /// Final component of [`Attribute::Path`].
    Filename,
    /// Enclosing function (the innermost span name under `tracing`).
    Function,
    /// Level name, e.g. `INFO`.
    Level,
    /// Numeric level, see [`level_number`](crate::record::level_number).
    LevelNo,
    Line,
    Module,
    /// Millisecond part of the creation time, with fraction.
    Msecs,
    /// Message template rendered against its positional arguments.
    Message,
    /// Logger name (the event target under `tracing`).
    Logger,
    Path,
    Process,
    ProcessName,
    /// Milliseconds between process start and record creation.
    ElapsedMs,
    /// Call-stack text, as blob or structured frames.
    Stack,
    Thread,
    ThreadName,
}

impl Attribute {
    /// Every attribute, in canonical order.
    pub const ALL: [Attribute; 19] = [
        Attribute::Timestamp,
        Attribute::Created,
        Attribute::Exception,
        Attribute::Filename,
        Attribute::Function,
        Attribute::Level,
        Attribute::LevelNo,
        Attribute::Line,
        Attribute::Module,
        Attribute::Msecs,
        Attribute::Message,
        Attribute::Logger,
        Attribute::Path,
        Attribute::Process,
        Attribute::ProcessName,
        Attribute::ElapsedMs,
        Attribute::Stack,
        Attribute::Thread,
        Attribute::ThreadName,
    ];

    /// Canonical name, also the default output key.
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Timestamp => "timestamp",
            Attribute::Created => "created",
            Attribute::Exception => "exception",
            Attribute::Filename => "filename",
            Attribute::Function => "function",
            Attribute::Level => "level",
            Attribute::LevelNo => "level_no",
            Attribute::Line => "line",
            Attribute::Module => "module",
            Attribute::Msecs => "msecs",
            Attribute::Message => "message",
            Attribute::Logger => "logger",
            Attribute::Path => "path",
            Attribute::Process => "process",
            Attribute::ProcessName => "process_name",
            Attribute::ElapsedMs => "elapsed_ms",
            Attribute::Stack => "stack",
            Attribute::Thread => "thread",
            Attribute::ThreadName => "thread_name",
        }
    }

    /// Resolve a pattern field name, accepting canonical names and the
    /// classic logging aliases (`asctime`, `levelname`, `lineno`, ...).
    pub fn from_name(name: &str) -> Option<Attribute> {
        let attr = match name {
            "timestamp" | "asctime" => Attribute::Timestamp,
            "created" => Attribute::Created,
            "exception" | "exc_info" => Attribute::Exception,
            "filename" => Attribute::Filename,
            "function" | "funcName" => Attribute::Function,
            "level" | "levelname" => Attribute::Level,
            "level_no" | "levelno" => Attribute::LevelNo,
            "line" | "lineno" => Attribute::Line,
            "module" => Attribute::Module,
            "msecs" => Attribute::Msecs,
            "message" => Attribute::Message,
            "logger" | "name" => Attribute::Logger,
            "path" | "pathname" => Attribute::Path,
            "process" => Attribute::Process,
            "process_name" | "processName" => Attribute::ProcessName,
            "elapsed_ms" | "relativeCreated" => Attribute::ElapsedMs,
            "stack" | "stack_info" => Attribute::Stack,
            "thread" => Attribute::Thread,
            "thread_name" | "threadName" => Attribute::ThreadName,
            _ => return None,
        };
        Some(attr)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
