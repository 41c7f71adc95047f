//! Field references in format patterns.
//!
//! Each [`PatternStyle`] has its own scanner. Scanners never fail: text
//! that does not form a complete field reference is skipped, and names are
//! not checked against the attribute set here.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Interpolation grammar of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum PatternStyle {
    /// `{name}` / `{name:format}`.
    Brace,
    /// `$name` / `${name}`.
    Dollar,
    /// `%(name)s` / `%(name)d`.
    #[default]
    Percent,
}

impl PatternStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternStyle::Brace => "brace",
            PatternStyle::Dollar => "dollar",
            PatternStyle::Percent => "percent",
        }
    }
}

impl fmt::Display for PatternStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown pattern style `{0}`, expected brace, dollar or percent")]
pub struct UnknownStyle(pub String);

impl FromStr for PatternStyle {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "brace" | "{" => Ok(PatternStyle::Brace),
            "dollar" | "$" => Ok(PatternStyle::Dollar),
            "percent" | "%" => Ok(PatternStyle::Percent),
            _ => Err(UnknownStyle(s.to_string())),
        }
    }
}

impl TryFrom<String> for PatternStyle {
    type Error = UnknownStyle;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A field reference found in a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Per-field sub-format, empty when none was given.
    pub format: String,
}

impl FieldSpec {
    fn new(name: &str, format: &str) -> Self {
        FieldSpec { name: name.to_string(), format: format.to_string() }
    }
}

/// Every field reference in `pattern`, in textual order, duplicates kept.
pub fn parse(pattern: &str, style: PatternStyle) -> Vec<FieldSpec> {
    match style {
        PatternStyle::Brace => parse_brace(pattern),
        PatternStyle::Dollar => parse_dollar(pattern),
        PatternStyle::Percent => parse_percent(pattern),
    }
}

fn parse_brace(pattern: &str) -> Vec<FieldSpec> {
    let bytes = pattern.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'}' if bytes.get(i + 1) == Some(&b'}') => i += 2,
            b'{' => {
                let rest = &pattern[i + 1..];
                let name_len = rest.find([':', '}', '{']).unwrap_or(rest.len());
                let name = &rest[..name_len];
                let after = &rest[name_len..];
                let parsed = if name.is_empty() {
                    None
                } else if after.starts_with('}') {
                    Some((FieldSpec::new(name, ""), name_len + 1))
                } else if let Some(spec) = after.strip_prefix(':') {
                    spec.find('}').map(|end| (FieldSpec::new(name, &spec[..end]), name_len + 1 + end + 1))
                } else {
                    None
                };
                match parsed {
                    Some((field, consumed)) => {
                        fields.push(field);
                        i += 1 + consumed;
                    }
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    fields
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn ident_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(&b) if is_ident_start(b) => 1 + bytes[1..].iter().take_while(|&&b| is_ident_continue(b)).count(),
        _ => 0,
    }
}

fn parse_dollar(pattern: &str) -> Vec<FieldSpec> {
    let bytes = pattern.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'$') {
            i += 2;
            continue;
        }
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'$') => i += 2,
            Some(b'{') => {
                let len = ident_len(&bytes[i + 2..]);
                if len > 0 && bytes.get(i + 2 + len) == Some(&b'}') {
                    fields.push(FieldSpec::new(&pattern[i + 2..i + 2 + len], ""));
                    i += 3 + len;
                } else {
                    i += 1;
                }
            }
            _ => {
                let len = ident_len(&bytes[i + 1..]);
                if len > 0 {
                    fields.push(FieldSpec::new(&pattern[i + 1..i + 1 + len], ""));
                }
                i += 1 + len;
            }
        }
    }
    fields
}

const PERCENT_FLAGS: &[u8] = b"#0- +";
const PERCENT_CONVERSIONS: &[u8] = b"sd";

fn parse_percent(pattern: &str) -> Vec<FieldSpec> {
    let bytes = pattern.as_bytes();
    let mut fields = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'%') {
            i += 2;
            continue;
        }
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        match bytes.get(i + 1) {
            Some(b'%') => i += 2,
            Some(b'(') => match percent_field(pattern, i + 2) {
                Some((field, end)) => {
                    fields.push(field);
                    i = end;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }
    fields
}

/// Parse `name)<flags><width><.precision><conversion>` starting at `start`,
/// just past `%(`. Returns the field and the offset after the conversion.
fn percent_field(pattern: &str, start: usize) -> Option<(FieldSpec, usize)> {
    let bytes = pattern.as_bytes();
    let close = start + pattern[start..].find(')')?;
    if close == start {
        return None;
    }
    let spec_start = close + 1;
    let mut j = spec_start;
    while j < bytes.len() && PERCENT_FLAGS.contains(&bytes[j]) {
        j += 1;
    }
    while j < bytes.len() && bytes[j].is_ascii_digit() {
        j += 1;
    }
    if bytes.get(j) == Some(&b'.') {
        j += 1;
        let digits = bytes[j..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        j += digits;
    }
    match bytes.get(j) {
        Some(c) if PERCENT_CONVERSIONS.contains(c) => {
            Some((FieldSpec::new(&pattern[start..close], &pattern[spec_start..=j]), j + 1))
        }
        _ => None,
    }
}
