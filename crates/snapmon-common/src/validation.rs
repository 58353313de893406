//! Schema validation for inbound snapshot payloads.
//!
//! The accepted shape is described declaratively by [`SNAPSHOT_SCHEMA`] and
//! [`METRIC_SCHEMA`]; a single routine walks a schema against a JSON object.
//! Validation stops at the first failure: snapshot fields in schema order,
//! then each metric in array order.

use crate::types::{MetricPayload, NewSnapshot};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

/// JSON kind a schema field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Array,
    Object,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Array => value.is_array(),
            FieldKind::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => write!(f, "string"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::Array => write!(f, "array"),
            FieldKind::Object => write!(f, "object"),
        }
    }
}

/// A required key of a payload object.
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Strings that are blank after trimming are rejected.
    pub non_empty: bool,
}

const fn field(name: &'static str, kind: FieldKind) -> Field {
    Field {
        name,
        kind,
        non_empty: false,
    }
}

const fn non_empty(name: &'static str) -> Field {
    Field {
        name,
        kind: FieldKind::String,
        non_empty: true,
    }
}

pub const SNAPSHOT_SCHEMA: &[Field] = &[
    non_empty("origin"),
    field("timestamp", FieldKind::String),
    field("metrics", FieldKind::Array),
];

pub const METRIC_SCHEMA: &[Field] = &[
    non_empty("name"),
    field("value", FieldKind::Number),
    field("unit", FieldKind::String),
];

/// Longest rendering of an offending value kept in an error message.
const MAX_ACTUAL_CHARS: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required key: '{key}'")]
    MissingField { key: String },

    #[error("Invalid type for key '{key}': {actual}; expected {expected}")]
    TypeMismatch {
        key: String,
        actual: String,
        expected: FieldKind,
    },

    #[error("Key '{key}' must not be empty")]
    EmptyField { key: String },

    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl ValidationError {
    /// The key (or key path such as `metrics[1].value`) the error refers to.
    pub fn key(&self) -> &str {
        match self {
            ValidationError::MissingField { key }
            | ValidationError::TypeMismatch { key, .. }
            | ValidationError::EmptyField { key } => key,
            ValidationError::InvalidTimestamp { .. } => "timestamp",
        }
    }

    /// Type mismatch for `key`, rendering (and truncating) the offending value.
    pub fn mismatch(key: impl Into<String>, actual: &Value, expected: FieldKind) -> Self {
        ValidationError::TypeMismatch {
            key: key.into(),
            actual: render(actual),
            expected,
        }
    }
}

fn render(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() <= MAX_ACTUAL_CHARS {
        return text;
    }
    let truncated: String = text.chars().take(MAX_ACTUAL_CHARS).collect();
    format!("{truncated}...")
}

/// Checks `value` against `schema`. `prefix` qualifies reported keys for
/// nested objects (`metrics[0]` → `metrics[0].name`).
fn check_object<'a>(
    value: &'a Value,
    prefix: Option<&str>,
    schema: &[Field],
) -> Result<&'a Map<String, Value>, ValidationError> {
    let object = value.as_object().ok_or_else(|| {
        ValidationError::mismatch(prefix.unwrap_or("snapshot"), value, FieldKind::Object)
    })?;

    for field in schema {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{}", field.name),
            None => field.name.to_string(),
        };
        let Some(found) = object.get(field.name) else {
            return Err(ValidationError::MissingField { key });
        };
        if !field.kind.matches(found) {
            return Err(ValidationError::mismatch(key, found, field.kind));
        }
        if field.non_empty && found.as_str().is_some_and(|s| s.trim().is_empty()) {
            return Err(ValidationError::EmptyField { key });
        }
    }

    Ok(object)
}

/// Checks a raw snapshot payload and every metric inside it.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use snapmon_common::validation::{validate_snapshot, ValidationError};
///
/// let ok = json!({"origin": "host-a", "timestamp": "2024-01-01T00:00:00Z", "metrics": []});
/// assert!(validate_snapshot(&ok).is_ok());
///
/// let missing = json!({"timestamp": "2024-01-01T00:00:00Z", "metrics": []});
/// assert_eq!(
///     validate_snapshot(&missing),
///     Err(ValidationError::MissingField { key: "origin".into() })
/// );
/// ```
pub fn validate_snapshot(payload: &Value) -> Result<(), ValidationError> {
    let object = check_object(payload, None, SNAPSHOT_SCHEMA)?;
    if let Some(Value::Array(metrics)) = object.get("metrics") {
        for (index, metric) in metrics.iter().enumerate() {
            check_object(metric, Some(&format!("metrics[{index}]")), METRIC_SCHEMA)?;
        }
    }
    Ok(())
}

/// Parses an ISO-8601 timestamp into UTC.
///
/// Offsets are honoured and converted; timestamps without an offset are
/// taken to be UTC already.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|source| ValidationError::InvalidTimestamp {
            value: raw.to_string(),
            source,
        })
}

fn str_field(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Validates `payload` and converts it into a [`NewSnapshot`].
pub fn parse_snapshot(payload: &Value) -> Result<NewSnapshot, ValidationError> {
    validate_snapshot(payload)?;

    let object = check_object(payload, None, SNAPSHOT_SCHEMA)?;
    let timestamp = parse_timestamp(&str_field(object, "timestamp"))?;
    let metrics = object
        .get("metrics")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|metric| MetricPayload {
                    name: str_field(metric, "name"),
                    value: metric.get("value").and_then(Value::as_f64).unwrap_or_default(),
                    unit: str_field(metric, "unit"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(NewSnapshot {
        origin: str_field(object, "origin"),
        timestamp,
        metrics,
    })
}
