//! Flattening of upstream JSON payloads into tabular rows.
//!
//! Mirrors what `pandas.json_normalize` did for the original lake: nested
//! objects become dotted column names (`fixture.status.short`), scalars map
//! onto [`FieldValue`] variants. Two deliberate choices:
//!
//! - Arrays of length one are descended into like nested objects (the
//!   dimension endpoints are fetched per season, so e.g. `seasons` carries a
//!   single element whose fields the normalizer needs as columns).
//! - Longer arrays are kept verbatim as a JSON string column — Bronze is an
//!   audit trail, not an analytical surface.

use serde_json::Value;
use thiserror::Error;

use crate::models::{FieldValue, Record};

/// A payload record that cannot be represented as a row.
#[derive(Debug, Error)]
#[error("payload record is not a JSON object (got {kind})")]
pub struct FlattenError {
    /// JSON kind of the offending payload.
    pub kind: &'static str,
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Converts one upstream record into a flat row with dotted column names.
pub fn flatten_record(value: &Value) -> Result<Record, FlattenError> {
    let Value::Object(_) = value else {
        return Err(FlattenError {
            kind: kind_of(value),
        });
    };
    let mut out = Record::new();
    flatten_into("", value, &mut out);
    Ok(out)
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Record) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_into(&key, v, out);
            }
        }
        Value::Array(items) if items.len() == 1 && items[0].is_object() => {
            flatten_into(prefix, &items[0], out);
        }
        other => {
            out.insert(prefix.to_string(), scalar_field(other));
        }
    }
}

/// Maps a scalar (or opaque array) JSON value onto a [`FieldValue`].
pub fn scalar_field(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                FieldValue::Int(i)
            } else {
                FieldValue::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => FieldValue::Str(s.clone()),
        // Multi-element or non-object arrays: keep the raw JSON.
        other => FieldValue::Str(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_objects_become_dotted_columns() {
        let payload = json!({
            "fixture": {"id": 100, "status": {"short": "NS"}},
            "goals": {"home": null, "away": null}
        });
        let row = flatten_record(&payload).unwrap();
        assert_eq!(row.get("fixture.id"), Some(&FieldValue::Int(100)));
        assert_eq!(
            row.get("fixture.status.short"),
            Some(&FieldValue::Str("NS".into()))
        );
        assert_eq!(row.get("goals.home"), Some(&FieldValue::Null));
    }

    #[test]
    fn single_element_object_array_is_descended() {
        let payload = json!({
            "league": {"id": 39},
            "seasons": [{"year": 2025, "current": true}]
        });
        let row = flatten_record(&payload).unwrap();
        assert_eq!(row.get("seasons.year"), Some(&FieldValue::Int(2025)));
        assert_eq!(row.get("seasons.current"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn longer_arrays_are_kept_as_json_text() {
        let payload = json!({
            "league": {"id": 39},
            "seasons": [{"year": 2024}, {"year": 2025}]
        });
        let row = flatten_record(&payload).unwrap();
        let raw = row.get("seasons").and_then(|v| v.as_str()).unwrap();
        assert!(raw.contains("2024") && raw.contains("2025"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = flatten_record(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.kind, "array");
    }
}
