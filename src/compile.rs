//! Turns parsed field references into a table of extraction closures.
//!
//! Everything that depends only on the configuration (name resolution,
//! renames, sub-format parsing, stack mode) is settled here, once; the
//! closures only read the record they are given.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Write as _};

use crate::attribute::Attribute;
use crate::exception::encode_exception;
use crate::pattern::{FieldSpec, PatternStyle};
use crate::record::{LogRecord, MessageError};
use crate::scalar::{ScalarError, ScalarFormat};
use crate::stack::{encode_stack, StackMode};

/// Failure of a single field while serializing a record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error(transparent)]
    Scalar(#[from] ScalarError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error("timestamp could not be rendered with `{0}`")]
    Timestamp(String),
}

/// Non-fatal problems found while compiling a pattern.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    #[error("rename map references fields that are not in the pattern: {}", .0.join(", "))]
    UnknownRenameKeys(Vec<String>),

    #[error("no attributes to serialize: `{pattern}` has no recognized {style}-style fields")]
    NoFields { pattern: String, style: PatternStyle },
}

type Extractor = Box<dyn Fn(&LogRecord) -> Result<Value, FieldError> + Send + Sync>;

/// One output key and the closure that produces its value.
pub struct CompiledField {
    key: String,
    attribute: Attribute,
    extract: Extractor,
}

impl CompiledField {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }

    pub fn extract(&self, record: &LogRecord) -> Result<Value, FieldError> {
        (self.extract)(record)
    }
}

impl fmt::Debug for CompiledField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledField")
            .field("key", &self.key)
            .field("attribute", &self.attribute)
            .finish_non_exhaustive()
    }
}

/// Inputs of [`compile`] besides the parsed fields.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions<'a> {
    pub pattern: &'a str,
    pub style: PatternStyle,
    /// Already validated strftime pattern.
    pub date_pattern: &'a str,
    pub stack_mode: StackMode,
    pub relative_paths: bool,
    pub rename: &'a BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct Compiled {
    pub fields: Vec<CompiledField>,
    pub warnings: Vec<ConfigWarning>,
}

type SubFormat = Option<Result<ScalarFormat, ScalarError>>;

fn sub_format(style: PatternStyle, spec: &str) -> SubFormat {
    if spec.is_empty() {
        return None;
    }
    match style {
        PatternStyle::Brace => Some(ScalarFormat::parse(spec)),
        PatternStyle::Percent => Some(ScalarFormat::parse_percent(spec)),
        PatternStyle::Dollar => None,
    }
}

fn apply_sub_format(sub: &SubFormat, value: Value) -> Result<Value, FieldError> {
    match sub {
        None => Ok(value),
        Some(Ok(format)) => Ok(format.format_value(&value)?),
        Some(Err(err)) => Err(err.clone().into()),
    }
}

fn extractor(attribute: Attribute, sub: SubFormat, options: &CompileOptions<'_>) -> Extractor {
    let relative_paths = options.relative_paths;
    match attribute {
        Attribute::Message => Box::new(move |record: &LogRecord| {
            let message = record.rendered_message()?;
            apply_sub_format(&sub, Value::String(message))
        }),
        Attribute::Timestamp => {
            let date_pattern = options.date_pattern.to_string();
            Box::new(move |record: &LogRecord| {
                let mut rendered = String::new();
                write!(rendered, "{}", record.created.format(&date_pattern))
                    .map_err(|_| FieldError::Timestamp(date_pattern.clone()))?;
                apply_sub_format(&sub, Value::String(rendered))
            })
        }
        Attribute::Exception => Box::new(move |record: &LogRecord| {
            Ok(record
                .exception
                .as_ref()
                .map(|info| encode_exception(info, relative_paths))
                .unwrap_or(Value::Null))
        }),
        Attribute::Stack => {
            let mode = options.stack_mode;
            Box::new(move |record: &LogRecord| {
                Ok(record
                    .stack
                    .as_deref()
                    .map(|text| encode_stack(text, mode, relative_paths))
                    .unwrap_or(Value::Null))
            })
        }
        other => Box::new(move |record: &LogRecord| apply_sub_format(&sub, record.raw_value(other))),
    }
}

/// Compile parsed field references into an ordered extractor table.
///
/// Unknown names are dropped. A repeated attribute keeps the position of
/// its first reference and the sub-format of its last. Fields renamed onto
/// the same output key collapse the same way.
pub fn compile(specs: &[FieldSpec], options: &CompileOptions<'_>) -> Compiled {
    let mut selected: Vec<(Attribute, &str)> = Vec::new();
    for spec in specs {
        let Some(attribute) = Attribute::from_name(&spec.name) else {
            continue;
        };
        match selected.iter_mut().find(|(a, _)| *a == attribute) {
            Some(entry) => entry.1 = spec.format.as_str(),
            None => selected.push((attribute, spec.format.as_str())),
        }
    }

    let mut renames: HashMap<Attribute, &str> = HashMap::new();
    let mut orphans = Vec::new();
    for (from, to) in options.rename {
        match Attribute::from_name(from) {
            Some(attribute) if selected.iter().any(|(a, _)| *a == attribute) => {
                renames.insert(attribute, to.as_str());
            }
            _ => orphans.push(from.clone()),
        }
    }

    let mut fields: Vec<CompiledField> = Vec::with_capacity(selected.len());
    for (attribute, spec) in selected {
        let key = renames.get(&attribute).copied().unwrap_or(attribute.name()).to_string();
        let field = CompiledField {
            extract: extractor(attribute, sub_format(options.style, spec), options),
            key,
            attribute,
        };
        match fields.iter_mut().find(|f| f.key == field.key) {
            Some(existing) => *existing = field,
            None => fields.push(field),
        }
    }

    let mut warnings = Vec::new();
    if !orphans.is_empty() {
        warnings.push(ConfigWarning::UnknownRenameKeys(orphans));
    }
    if fields.is_empty() {
        warnings.push(ConfigWarning::NoFields {
            pattern: options.pattern.to_string(),
            style: options.style,
        });
    }

    Compiled { fields, warnings }
}
