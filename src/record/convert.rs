//! Per-field value converters applied while parsing a record.

use serde::{Serialize, Serializer};
use serde_yaml::Value;

use crate::error::ExpressionError;
use crate::license::expression;

const TRUE_TOKENS: &[&str] = &["yes", "y", "true", "x"];
const FALSE_TOKENS: &[&str] = &["no", "n", "false"];

/// Value of a yes/no flag field.
///
/// Anything outside the accepted token set is kept verbatim as
/// [`Flag::Invalid`] so validation can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flag {
    Set(bool),
    Invalid(String),
}

impl Flag {
    pub fn is_true(&self) -> bool {
        matches!(self, Flag::Set(true))
    }

    /// Serialized form; `None` when the flag should be omitted.
    pub fn to_token(&self) -> Option<&str> {
        match self {
            Flag::Set(true) => Some("yes"),
            Flag::Set(false) => None,
            Flag::Invalid(value) => Some(value.as_str()),
        }
    }
}

impl Serialize for Flag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Flag::Set(value) => serializer.serialize_bool(*value),
            Flag::Invalid(value) => serializer.serialize_str(value),
        }
    }
}

/// Convert a raw flag value. Empty values yield `None`.
pub fn flag(value: &Value) -> Option<Flag> {
    match value {
        Value::Bool(b) => Some(Flag::Set(*b)),
        Value::Null => None,
        other => {
            let raw = scalar_to_string(other)?;
            let lower = raw.to_lowercase();
            if TRUE_TOKENS.contains(&lower.as_str()) {
                Some(Flag::Set(true))
            } else if FALSE_TOKENS.contains(&lower.as_str()) {
                Some(Flag::Set(false))
            } else {
                Some(Flag::Invalid(raw))
            }
        }
    }
}

/// Trim every line of a copyright statement.
pub fn copyright(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// POSIX form of a resource path, without leading or trailing slashes.
pub fn about_resource(value: &str) -> String {
    value.replace('\\', "/").trim_matches('/').to_string()
}

pub fn license_expression(value: &str) -> Result<String, ExpressionError> {
    expression::canonicalize(value)
}

/// Render a YAML value as a trimmed string; `None` when empty.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Sequence(items) => items
            .iter()
            .filter_map(scalar_to_string)
            .collect::<Vec<_>>()
            .join("\n"),
        other => serde_yaml::to_string(other).ok()?.trim().to_string(),
    };
    Some(text).filter(|t| !t.is_empty())
}

/// A list of strings given either as a YAML sequence or as one string with
/// an item per line.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other)
            .map(|s| {
                s.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
    }
}
