// Generic value tree produced from channel frames and API responses.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Longest rendering of a value embedded in a decode diagnostic.
const DESCRIBE_MAX_CHARS: usize = 80;

/// A JSON number, keeping integers exact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireNumber {
    /// Integer that fits in i64.
    Int(i64),
    /// Unsigned integer above i64::MAX.
    UInt(u64),
    Float(f64),
}

impl WireNumber {
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(value),
            Self::UInt(value) => i64::try_from(value).ok(),
            Self::Float(_) => None,
        }
    }

    pub fn as_u64(self) -> Option<u64> {
        match self {
            Self::Int(value) => u64::try_from(value).ok(),
            Self::UInt(value) => Some(value),
            Self::Float(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::UInt(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

impl fmt::Display for WireNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::UInt(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
        }
    }
}

impl From<serde_json::Number> for WireNumber {
    fn from(number: serde_json::Number) -> Self {
        if let Some(value) = number.as_i64() {
            Self::Int(value)
        } else if let Some(value) = number.as_u64() {
            Self::UInt(value)
        } else {
            Self::Float(number.as_f64().unwrap_or(f64::NAN))
        }
    }
}

/// The closed set of shapes a decoded JSON document can take.
///
/// Every decode operation pattern-matches on this instead of downcasting,
/// so a shape the caller did not expect always surfaces as a typed error.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WireValue {
    #[default]
    Null,
    Bool(bool),
    Number(WireNumber),
    String(String),
    Sequence(Vec<WireValue>),
    Mapping(BTreeMap<String, WireValue>),
}

impl WireValue {
    /// Parse strict JSON text. Sparse arrays must be repaired first.
    pub fn parse_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(text).map(Self::from)
    }

    pub fn int(value: i64) -> Self {
        Self::Number(WireNumber::Int(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[WireValue]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            Self::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Short name of the variant, used in type-mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    /// Compact rendering for logs and errors, truncated to a readable length.
    pub fn describe(&self) -> String {
        let rendered = self.to_string();
        if rendered.chars().count() <= DESCRIBE_MAX_CHARS {
            return format!("{} {rendered}", self.type_name());
        }
        let truncated: String = rendered.chars().take(DESCRIBE_MAX_CHARS).collect();
        format!("{} {truncated}…", self.type_name())
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()))
    }
}

impl From<Value> for WireValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number.into()),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(entries) => {
                Self::Mapping(entries.into_iter().map(|(key, value)| (key, value.into())).collect())
            }
        }
    }
}

impl From<WireValue> for Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(flag) => Value::Bool(flag),
            WireValue::Number(WireNumber::Int(number)) => Value::from(number),
            WireValue::Number(WireNumber::UInt(number)) => Value::from(number),
            WireValue::Number(WireNumber::Float(number)) => {
                serde_json::Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
            }
            WireValue::String(text) => Value::String(text),
            WireValue::Sequence(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            WireValue::Mapping(entries) => {
                Value::Object(entries.into_iter().map(|(key, value)| (key, value.into())).collect())
            }
        }
    }
}

impl From<&str> for WireValue {
    fn from(text: &str) -> Self {
        Self::String(text.to_string())
    }
}

impl From<String> for WireValue {
    fn from(text: String) -> Self {
        Self::String(text)
    }
}

impl From<Vec<WireValue>> for WireValue {
    fn from(items: Vec<WireValue>) -> Self {
        Self::Sequence(items)
    }
}
