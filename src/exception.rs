use regex::Regex;
use serde_json::{json, Value};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::sync::LazyLock;

use crate::paths::relativize;
use crate::record::{ExceptionInfo, Frame};

static BACKTRACE_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+:\s+(.+?)\s*$").expect("valid backtrace symbol regex"));
static BACKTRACE_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s+at\s+(.+):(\d+):\d+\s*$").expect("valid backtrace location regex"));

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, value: Option<String>) -> Self {
        ExceptionInfo { type_name: type_name.into(), value, frames: Vec::new() }
    }

    /// Capture an error's type and message.
    ///
    /// Rust erases the concrete type behind `dyn Error`, so the type name is
    /// the leading identifier of its `Debug` output (`ParseIntError`,
    /// `Os`, ...), falling back to `Error`.
    pub fn from_error(err: &(dyn Error + 'static)) -> Self {
        let debug = format!("{err:?}");
        let ident: String = debug
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
            .collect();
        let type_name = match ident.trim_matches(':') {
            "" => "Error".to_string(),
            name => name.to_string(),
        };
        ExceptionInfo::new(type_name, Some(err.to_string()))
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    /// Attach the frames of a captured backtrace. Disabled or unsupported
    /// backtraces leave the frames untouched.
    pub fn with_backtrace(mut self, backtrace: &Backtrace) -> Self {
        if backtrace.status() == BacktraceStatus::Captured {
            self.frames = frames_from_backtrace(&backtrace.to_string());
        }
        self
    }
}

/// Frames of a rendered `std::backtrace::Backtrace`, innermost first.
///
/// Symbols without an `at file:line:col` line get a `?` file.
pub fn frames_from_backtrace(text: &str) -> Vec<Frame> {
    let mut frames: Vec<Frame> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = BACKTRACE_SYMBOL.captures(line) {
            frames.push(Frame::new("?", None, &caps[1]));
        } else if let Some(caps) = BACKTRACE_LOCATION.captures(line) {
            if let Some(frame) = frames.last_mut() {
                if frame.line.is_none() {
                    frame.file = caps[1].to_string();
                    frame.line = caps[2].parse().ok();
                }
            }
        }
    }
    frames
}

/// JSON shape of a frame: `{"file", "line", "function", "source"}`.
pub(crate) fn frame_value(frame: &Frame, relative_paths: bool) -> Value {
    let file = if relative_paths { relativize(&frame.file).to_string() } else { frame.file.clone() };
    json!({
        "file": file,
        "line": frame.line,
        "function": frame.function,
        "source": frame.source,
    })
}

/// Encode an exception as `{"type", "value", "frames"}`.
pub fn encode_exception(info: &ExceptionInfo, relative_paths: bool) -> Value {
    let frames: Vec<Value> = info.frames.iter().map(|f| frame_value(f, relative_paths)).collect();
    json!({
        "type": info.type_name,
        "value": info.value,
        "frames": frames,
    })
}
