//! Leaf field validators for scalar values.

use super::validator::FieldValidator;
use crate::error::FieldError;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde_json::Value;

/// String validator with optional allowed values and length bounds.
#[derive(Debug, Clone, Default)]
pub struct Text {
    pub allowed: Vec<String>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

impl Text {
    pub fn one_of<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_len(min_len: Option<usize>, max_len: Option<usize>) -> Self {
        Self {
            min_len,
            max_len,
            ..Self::default()
        }
    }
}

impl FieldValidator for Text {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let text = value
            .as_str()
            .ok_or_else(|| FieldError::invalid("not a string"))?;

        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == text) {
            return Err(FieldError::invalid("not one of the allowed values"));
        }

        let len = text.chars().count();
        if let Some(min) = self.min_len {
            if len < min {
                return Err(FieldError::invalid(format!("is shorter than {min}")));
            }
        }
        if let Some(max) = self.max_len {
            if len > max {
                return Err(FieldError::invalid(format!("is longer than {max}")));
            }
        }

        Ok(value.clone())
    }
}

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boundaries {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

/// Integer validator.
///
/// Accepts JSON integers and floats without a fractional part.
#[derive(Debug, Clone, Default)]
pub struct Integer {
    pub boundaries: Option<Boundaries>,
}

impl Integer {
    pub fn between(min: i64, max: i64) -> Self {
        Self {
            boundaries: Some(Boundaries {
                min: Some(min),
                max: Some(max),
            }),
        }
    }

    pub fn at_least(min: i64) -> Self {
        Self {
            boundaries: Some(Boundaries {
                min: Some(min),
                max: None,
            }),
        }
    }
}

impl FieldValidator for Integer {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let number = match value {
            Value::Number(n) if n.is_u64() => n.as_i64(),
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole_i64)),
            _ => None,
        }
        .ok_or_else(|| FieldError::invalid("not an integer"))?;

        if let Some(bounds) = &self.boundaries {
            if let Some(min) = bounds.min {
                if number < min {
                    return Err(FieldError::invalid(format!("is lower than {min}")));
                }
            }
            if let Some(max) = bounds.max {
                if number > max {
                    return Err(FieldError::invalid(format!("is greater than {max}")));
                }
            }
        }

        Ok(Value::from(number))
    }
}

// 2^63 itself is out of range, so the upper bound is exclusive.
fn whole_i64(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (in_range && f.fract() == 0.0).then_some(f as i64)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Boolean;

impl FieldValidator for Boolean {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(FieldError::invalid("not a Boolean")),
        }
    }
}

/// Accepts only `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Null;

impl FieldValidator for Null {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        match value {
            Value::Null => Ok(Value::Null),
            _ => Err(FieldError::invalid("not null")),
        }
    }
}

/// RFC 3339 timestamp, normalized to UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct Time;

impl Time {
    /// Current time in the canonical stored form.
    pub fn now() -> Value {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl FieldValidator for Time {
    fn validate(&self, value: &Value) -> Result<Value, FieldError> {
        let text = value
            .as_str()
            .ok_or_else(|| FieldError::invalid("not a time"))?;
        let parsed = DateTime::<FixedOffset>::parse_from_rfc3339(text)
            .map_err(|_| FieldError::invalid("not a time"))?;

        Ok(Value::String(
            parsed
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        ))
    }
}
