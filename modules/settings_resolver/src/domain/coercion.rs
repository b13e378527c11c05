//! Conversion of raw provider values into the declared setting type
//!
//! Null always passes through: coercion never invents a value, falling back to
//! the default is up to the caller.

use crate::contract::{CfgError, SettingValue, ValueType};

/// Coerce `raw` into `value_type`. Only a structured decode can fail.
pub fn coerce(name: &str, raw: SettingValue, value_type: ValueType) -> Result<SettingValue, CfgError> {
    if raw.is_null() {
        return Ok(raw);
    }

    let value = match value_type {
        ValueType::Integer => SettingValue::Number(to_number(&raw).trunc()),
        ValueType::Float => match raw {
            SettingValue::Number(_) => raw,
            other => SettingValue::Number(to_number(&other)),
        },
        ValueType::String => match raw {
            SettingValue::String(_) => raw,
            other => SettingValue::String(other.to_string()),
        },
        ValueType::Boolean => match raw {
            SettingValue::Bool(_) => raw,
            SettingValue::String(s) => SettingValue::Bool(s == "true"),
            _ => SettingValue::Bool(false),
        },
        ValueType::Structured => match raw {
            SettingValue::Structured(_) => raw,
            SettingValue::String(text) => {
                let decoded: serde_json::Value =
                    serde_json::from_str(&text).map_err(|source| CfgError::Coercion {
                        name: name.to_string(),
                        source,
                    })?;
                SettingValue::Structured(decoded)
            }
            other => SettingValue::Structured(other.to_json()),
        },
    };

    Ok(value)
}

fn to_number(raw: &SettingValue) -> f64 {
    match raw {
        SettingValue::Null => 0.0,
        SettingValue::Bool(b) => f64::from(u8::from(*b)),
        SettingValue::Number(n) => *n,
        SettingValue::String(s) => parse_number(s),
        SettingValue::Structured(_) => f64::NAN,
    }
}

/// Parse a numeric literal; anything that is not one yields NaN.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    let radix = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)];
    for (prefix, base) in radix {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return parse_radix(digits, base);
        }
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    // f64::from_str also accepts "inf" and "nan", which are not literals here
    let is_decimal = trimmed
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !is_decimal {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Unsigned digits in `base`, folded into a double so large literals keep
/// their magnitude
fn parse_radix(digits: &str, base: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits
        .chars()
        .try_fold(0.0_f64, |acc, c| {
            c.to_digit(base).map(|d| acc * f64::from(base) + f64::from(d))
        })
        .unwrap_or(f64::NAN)
}
