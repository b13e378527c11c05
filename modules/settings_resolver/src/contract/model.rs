//! Contract models for the settings resolver
//!
//! These models are shared by the settings tree, the resolution engine and every
//! value provider. Item snapshots are what listeners receive, so they serialize
//! with the same field names the schema uses.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared semantic type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Integer,
    Float,
    String,
    Boolean,
    /// Arbitrary nested data, decoded from JSON text when needed
    #[serde(alias = "json")]
    Structured,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// A setting value as seen by the tree and by providers.
///
/// Numbers are doubles so that a failed numeric conversion can carry NaN
/// instead of being rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum SettingValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Structured(serde_json::Value),
}

impl SettingValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integer view of a finite number; NaN and infinities have none.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(n.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            _ => None,
        }
    }

    /// JSON projection of the value; non-finite numbers become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        self.clone().into()
    }
}

impl From<serde_json::Value> for SettingValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            other => Self::Structured(other),
        }
    }
}

impl From<SettingValue> for serde_json::Value {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Null => serde_json::Value::Null,
            SettingValue::Bool(b) => serde_json::Value::Bool(b),
            SettingValue::Number(n) => number_to_json(n),
            SettingValue::String(s) => serde_json::Value::String(s),
            SettingValue::Structured(v) => v,
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Textual form used when a value is coerced to `string`.
impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Structured(v) => write!(f, "{}", v),
        }
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

/// Runtime record for one leaf setting.
///
/// `name` is the colon-joined schema path (`"test1:settingOne"`) and is the join
/// key between the tree, the resolution engine and providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Correlation code used by record-backed providers
    pub code: Option<String>,
    /// Colon-joined path from the schema root
    pub name: String,
    /// Declared default, coerced at construction
    pub default: SettingValue,
    /// Current resolved value
    pub value: SettingValue,
    /// Environment variable override for the lookup key
    pub env_name: Option<String>,
    /// Provider tags this item is routed to
    pub tags: Vec<String>,
    /// Declared semantic type
    #[serde(rename = "type")]
    pub value_type: ValueType,
}

impl Item {
    pub fn is_tagged(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Path segments of the item name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split(crate::contract::PATH_SEPARATOR)
    }

    /// Copy of this item carrying a provider-supplied value.
    pub fn with_value(&self, value: impl Into<SettingValue>) -> Self {
        Self {
            value: value.into(),
            ..self.clone()
        }
    }
}

/// One entry of a provider's `loaded` batch.
///
/// `provided == None` means the provider has no value for the requested item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedItem {
    pub requested_item: Item,
    pub provided_item: Option<Item>,
}

impl LoadedItem {
    pub fn provided(requested_item: Item, provided_item: Item) -> Self {
        Self {
            requested_item,
            provided_item: Some(provided_item),
        }
    }

    pub fn missing(requested_item: Item) -> Self {
        Self {
            requested_item,
            provided_item: None,
        }
    }
}
