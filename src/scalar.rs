//! Per-field sub-formats such as `>8`, `05d` or `.3f`.
//!
//! Brace patterns use the `[[fill]align][sign][#][0][width][,|_][.precision][type]`
//! grammar. Percent conversions are mapped onto the same model and are
//! lenient about value types: `s` accepts anything and `d` truncates floats.
//! A formatted field always becomes a JSON string.

use serde_json::{Number, Value};

use crate::record::display_value;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalarError {
    #[error("invalid format specifier `{spec}`: {reason}")]
    InvalidSpec { spec: String, reason: &'static str },

    #[error("unknown format code `{code}` in `{spec}`")]
    UnknownType { spec: String, code: char },

    #[error("format code `{code}` cannot be applied to a {found} value")]
    Mismatch { code: char, found: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    /// Padding goes between the sign and the digits.
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Minus,
    Plus,
    Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Int,
    Binary,
    Octal,
    Hex,
    HexUpper,
    Exp,
    ExpUpper,
    Fixed,
    FixedUpper,
    Percent,
}

impl Kind {
    fn from_code(code: char) -> Option<Kind> {
        let kind = match code {
            's' => Kind::Str,
            'd' => Kind::Int,
            'b' => Kind::Binary,
            'o' => Kind::Octal,
            'x' => Kind::Hex,
            'X' => Kind::HexUpper,
            'e' => Kind::Exp,
            'E' => Kind::ExpUpper,
            'f' => Kind::Fixed,
            'F' => Kind::FixedUpper,
            '%' => Kind::Percent,
            _ => return None,
        };
        Some(kind)
    }

    fn code(self) -> char {
        match self {
            Kind::Str => 's',
            Kind::Int => 'd',
            Kind::Binary => 'b',
            Kind::Octal => 'o',
            Kind::Hex => 'x',
            Kind::HexUpper => 'X',
            Kind::Exp => 'e',
            Kind::ExpUpper => 'E',
            Kind::Fixed => 'f',
            Kind::FixedUpper => 'F',
            Kind::Percent => '%',
        }
    }

    fn is_integral(self) -> bool {
        matches!(self, Kind::Int | Kind::Binary | Kind::Octal | Kind::Hex | Kind::HexUpper)
    }
}

/// A parsed sub-format, ready to apply to any number of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarFormat {
    spec: String,
    fill: Option<char>,
    align: Option<Align>,
    sign: Option<Sign>,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    kind: Option<Kind>,
    lenient: bool,
}

impl ScalarFormat {
    fn empty(spec: &str, lenient: bool) -> Self {
        ScalarFormat {
            spec: spec.to_string(),
            fill: None,
            align: None,
            sign: None,
            alternate: false,
            zero: false,
            width: 0,
            grouping: None,
            precision: None,
            kind: None,
            lenient,
        }
    }

    /// Parse a brace-style sub-format.
    pub fn parse(spec: &str) -> Result<Self, ScalarError> {
        let invalid = |reason: &'static str| ScalarError::InvalidSpec { spec: spec.to_string(), reason };
        let chars: Vec<char> = spec.chars().collect();
        let mut fmt = ScalarFormat::empty(spec, false);
        let mut i = 0;

        if let Some(align) = chars.get(1).copied().and_then(align_of) {
            fmt.fill = Some(chars[0]);
            fmt.align = Some(align);
            i = 2;
        } else if let Some(align) = chars.first().copied().and_then(align_of) {
            fmt.align = Some(align);
            i = 1;
        }

        fmt.sign = match chars.get(i) {
            Some('+') => Some(Sign::Plus),
            Some('-') => Some(Sign::Minus),
            Some(' ') => Some(Sign::Space),
            _ => None,
        };
        if fmt.sign.is_some() {
            i += 1;
        }
        if chars.get(i) == Some(&'#') {
            fmt.alternate = true;
            i += 1;
        }
        if chars.get(i) == Some(&'0') {
            fmt.zero = true;
            i += 1;
        }
        let (width, used) = digits(&chars[i..]).map_err(invalid)?;
        fmt.width = width.unwrap_or(0);
        i += used;
        if let Some(&sep @ (',' | '_')) = chars.get(i) {
            fmt.grouping = Some(sep);
            i += 1;
        }
        if chars.get(i) == Some(&'.') {
            let (precision, used) = digits(&chars[i + 1..]).map_err(invalid)?;
            fmt.precision = Some(precision.ok_or_else(|| invalid("missing precision"))?);
            i += 1 + used;
        }
        if let Some(&code) = chars.get(i) {
            fmt.kind = Some(Kind::from_code(code).ok_or(ScalarError::UnknownType {
                spec: spec.to_string(),
                code,
            })?);
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid("unexpected trailing characters"));
        }
        if fmt.precision.is_some() && fmt.kind.is_some_and(Kind::is_integral) {
            return Err(invalid("precision not allowed for integer types"));
        }
        Ok(fmt)
    }

    /// Parse the part of a percent conversion after `%(name)`, e.g. `-8.3s`.
    pub fn parse_percent(spec: &str) -> Result<Self, ScalarError> {
        let invalid = |reason: &'static str| ScalarError::InvalidSpec { spec: spec.to_string(), reason };
        let chars: Vec<char> = spec.chars().collect();
        let mut fmt = ScalarFormat::empty(spec, true);
        let mut i = 0;

        while let Some(&flag) = chars.get(i) {
            match flag {
                '-' => fmt.align = Some(Align::Left),
                '0' => fmt.zero = true,
                '+' => fmt.sign = Some(Sign::Plus),
                ' ' if fmt.sign.is_none() => fmt.sign = Some(Sign::Space),
                ' ' => {}
                '#' => fmt.alternate = true,
                _ => break,
            }
            i += 1;
        }
        if fmt.align == Some(Align::Left) {
            fmt.zero = false;
        }
        let (width, used) = digits(&chars[i..]).map_err(invalid)?;
        fmt.width = width.unwrap_or(0);
        i += used;
        if chars.get(i) == Some(&'.') {
            let (precision, used) = digits(&chars[i + 1..]).map_err(invalid)?;
            fmt.precision = Some(precision.ok_or_else(|| invalid("missing precision"))?);
            i += 1 + used;
        }
        match chars.get(i) {
            Some(&code @ ('s' | 'd')) => fmt.kind = Kind::from_code(code),
            Some(&code) => return Err(ScalarError::UnknownType { spec: spec.to_string(), code }),
            None => return Err(invalid("missing conversion")),
        }
        if i + 1 != chars.len() {
            return Err(invalid("unexpected trailing characters"));
        }
        Ok(fmt)
    }

    /// Format a field value. Null stays null, and a bare conversion that
    /// already matches the value's type (`s` on a string, `d` on an integer)
    /// keeps the value as is; anything else becomes a formatted string.
    ///
    /// Classic logging formatters always produce a string, so `%(lineno)d`
    /// there yields `"7"`; here it stays the JSON number `7`.
    pub fn format_value(&self, value: &Value) -> Result<Value, ScalarError> {
        let bare = self.fill.is_none()
            && self.align.is_none()
            && self.sign.is_none()
            && !self.alternate
            && !self.zero
            && self.width == 0
            && self.grouping.is_none()
            && self.precision.is_none();
        let identity = match (self.kind, value) {
            (_, Value::Null) => true,
            (None, _) => bare,
            (Some(Kind::Str), Value::String(_)) => bare,
            (Some(Kind::Int), Value::Number(n)) => bare && (n.is_i64() || n.is_u64()),
            _ => false,
        };
        if identity {
            return Ok(value.clone());
        }
        self.apply(value).map(Value::String)
    }

    /// Format `value` according to this sub-format.
    pub fn apply(&self, value: &Value) -> Result<String, ScalarError> {
        let code = self.kind.map(Kind::code).unwrap_or(' ');
        let mismatch = |found: &'static str| ScalarError::Mismatch { code, found };

        match (self.kind, value) {
            (_, Value::Null) => Err(mismatch("null")),
            (None | Some(Kind::Str), Value::String(s)) => self.format_str(s),
            (None, Value::Bool(b)) => self.format_str(if *b { "true" } else { "false" }),
            (Some(Kind::Str), other) if self.lenient => self.format_str(&display_value(other)),
            (Some(Kind::Str), other) => Err(mismatch(type_name(other))),
            (kind, Value::Number(n)) => self.format_number(kind, n).ok_or_else(|| mismatch("float")),
            (_, other) => Err(mismatch(type_name(other))),
        }
    }

    fn format_str(&self, s: &str) -> Result<String, ScalarError> {
        if !self.lenient {
            let reason = if self.sign.is_some() {
                Some("sign not allowed for strings")
            } else if self.align == Some(Align::AfterSign) {
                Some("'=' alignment not allowed for strings")
            } else if self.alternate {
                Some("alternate form not allowed for strings")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(ScalarError::InvalidSpec { spec: self.spec.clone(), reason });
            }
        }

        let text: String = match self.precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.to_string(),
        };
        let fill = self.fill.unwrap_or(if self.zero { '0' } else { ' ' });
        Ok(pad(&text, "", fill, self.align.unwrap_or(Align::Left), self.width))
    }

    /// Returns `None` when an integer-only conversion meets a float.
    fn format_number(&self, kind: Option<Kind>, n: &Number) -> Option<String> {
        let int = n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from));
        let float = n.as_f64().unwrap_or(0.0);

        let (negative, prefix, body) = match kind {
            Some(k) if k.is_integral() => {
                let v = match int {
                    Some(v) => v,
                    None if self.lenient && k == Kind::Int => float.trunc() as i128,
                    None => return None,
                };
                let mag = v.unsigned_abs();
                let (prefix, digits) = match k {
                    Kind::Binary => ("0b", format!("{mag:b}")),
                    Kind::Octal => ("0o", format!("{mag:o}")),
                    Kind::Hex => ("0x", format!("{mag:x}")),
                    Kind::HexUpper => ("0X", format!("{mag:X}")),
                    _ => ("", format!("{mag}")),
                };
                let digits = match (k, self.precision) {
                    (Kind::Int, Some(p)) if digits.len() < p => format!("{digits:0>p$}"),
                    _ => digits,
                };
                let prefix = if self.alternate { prefix } else { "" };
                (v < 0, prefix, self.group(&digits, if k == Kind::Int { 3 } else { 4 }))
            }
            Some(Kind::Exp | Kind::ExpUpper) => {
                let body = exponent(float.abs(), self.precision.unwrap_or(6));
                let body = if kind == Some(Kind::ExpUpper) { body.to_uppercase() } else { body };
                (float.is_sign_negative() && float != 0.0, "", self.group_float(&body))
            }
            Some(Kind::Percent) => {
                let body = format!("{:.*}%", self.precision.unwrap_or(6), float.abs() * 100.0);
                (float < 0.0, "", self.group_float(&body))
            }
            Some(_) => {
                let body = format!("{:.*}", self.precision.unwrap_or(6), float.abs());
                (float < 0.0, "", self.group_float(&body))
            }
            None => match (int, self.precision) {
                (Some(v), _) => (v < 0, "", self.group(&v.unsigned_abs().to_string(), 3)),
                (None, Some(p)) => (float < 0.0, "", self.group_float(&format!("{:.*}", p, float.abs()))),
                (None, None) => {
                    let text = n.to_string();
                    let body = text.trim_start_matches('-').to_string();
                    (float < 0.0, "", self.group_float(&body))
                }
            },
        };

        let sign = match (negative, self.sign) {
            (true, _) => "-",
            (false, Some(Sign::Plus)) => "+",
            (false, Some(Sign::Space)) => " ",
            (false, _) => "",
        };
        let head = format!("{sign}{prefix}");
        let (fill, align) = match (self.fill, self.align, self.zero) {
            (fill, Some(align), _) => (fill.unwrap_or(' '), align),
            (fill, None, true) => (fill.unwrap_or('0'), Align::AfterSign),
            (fill, None, false) => (fill.unwrap_or(' '), Align::Right),
        };
        Some(pad(&body, &head, fill, align, self.width))
    }

    fn group(&self, digits: &str, size: usize) -> String {
        let Some(sep) = self.grouping else {
            return digits.to_string();
        };
        let len = digits.len();
        let mut out = String::with_capacity(len + len / size);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (len - i) % size == 0 {
                out.push(sep);
            }
            out.push(c);
        }
        out
    }

    /// Group the integer part of a rendered float, leaving the rest intact.
    fn group_float(&self, body: &str) -> String {
        let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
        format!("{}{}", self.group(&body[..split], 3), &body[split..])
    }
}

fn align_of(c: char) -> Option<Align> {
    match c {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

/// Largest accepted width or precision.
const MAX_WIDTH: usize = u16::MAX as usize;

/// Leading decimal number and the count of digits it used.
fn digits(chars: &[char]) -> Result<(Option<usize>, usize), &'static str> {
    let used = chars.iter().take_while(|c| c.is_ascii_digit()).count();
    if used == 0 {
        return Ok((None, 0));
    }
    let text: String = chars[..used].iter().collect();
    match text.parse::<usize>() {
        Ok(n) if n <= MAX_WIDTH => Ok((Some(n), used)),
        _ => Err("width or precision too large"),
    }
}

/// `1.5e3` in the `1.500000e+03` shape.
fn exponent(value: f64, precision: usize) -> String {
    let raw = format!("{value:.precision$e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => raw,
    }
}

fn pad(body: &str, head: &str, fill: char, align: Align, width: usize) -> String {
    let len = head.chars().count() + body.chars().count();
    let missing = width.saturating_sub(len);
    let fill_n = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        Align::Left => format!("{head}{body}{}", fill_n(missing)),
        Align::Right => format!("{}{head}{body}", fill_n(missing)),
        Align::Center => {
            let left = missing / 2;
            format!("{}{head}{body}{}", fill_n(left), fill_n(missing - left))
        }
        Align::AfterSign => format!("{head}{}{body}", fill_n(missing)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
