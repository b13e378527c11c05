//! Structural equality used to suppress redundant `changed` notifications

use crate::contract::SettingValue;
use serde_json::Value;

/// Deep equality of two setting values.
///
/// Numbers compare by value, so `2` and `2.0` are equal and NaN never equals
/// anything. Structured values compare key by key regardless of key order. A
/// structured scalar equals the plain value with the same JSON form.
pub fn deep_equal(a: &SettingValue, b: &SettingValue) -> bool {
    match (a, b) {
        (SettingValue::Null, SettingValue::Null) => true,
        (SettingValue::Bool(x), SettingValue::Bool(y)) => x == y,
        (SettingValue::Number(x), SettingValue::Number(y)) => x == y,
        (SettingValue::String(x), SettingValue::String(y)) => x == y,
        (SettingValue::Structured(x), SettingValue::Structured(y)) => json_equal(x, y),
        (SettingValue::Number(n), _) | (_, SettingValue::Number(n)) if !n.is_finite() => false,
        (SettingValue::Structured(_), _) | (_, SettingValue::Structured(_)) => {
            json_equal(&a.to_json(), &b.to_json())
        }
        _ => false,
    }
}

fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| json_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, l)| y.get(key).is_some_and(|r| json_equal(l, r)))
        }
        _ => a == b,
    }
}
