//! Value conversion between driver values and the engine's storage classes.

use rusqlite::types::Value;

use crate::types::RowValues;

/// Format used when timestamps are stored as text.
pub const TIMESTAMP_FORMAT: &str = "%F %T%.f";

/// Convert a driver value into the engine's value type.
#[must_use]
pub fn to_engine_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(json) => Value::Text(json.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Convert an engine value into a driver value.
///
/// Storage classes map one to one; booleans, timestamps and JSON come back as
/// the integer or text they were stored as.
#[must_use]
pub fn from_engine_value(value: Value) -> RowValues {
    match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    }
}

/// Replace unset parameter slots with explicit `NULL`s.
#[must_use]
pub fn normalize_params(params: &[Option<RowValues>]) -> Vec<RowValues> {
    params
        .iter()
        .map(|p| p.clone().unwrap_or(RowValues::Null))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn unset_slots_become_null() {
        let params = [Some(RowValues::Int(1)), None, Some(RowValues::Null), None];
        let normalized = normalize_params(&params);
        assert_eq!(
            normalized,
            vec![
                RowValues::Int(1),
                RowValues::Null,
                RowValues::Null,
                RowValues::Null
            ]
        );
    }

    #[test]
    fn booleans_are_stored_as_integers() {
        assert_eq!(to_engine_value(&RowValues::Bool(true)), Value::Integer(1));
        assert_eq!(to_engine_value(&RowValues::Bool(false)), Value::Integer(0));
    }

    #[test]
    fn timestamps_are_stored_as_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 250)
            .unwrap();
        let stored = to_engine_value(&RowValues::Timestamp(dt));
        assert_eq!(stored, Value::Text("2024-02-29 13:05:09.250".into()));
        let back = from_engine_value(stored);
        assert_eq!(back.as_timestamp(), Some(dt));
    }

    #[test]
    fn json_is_stored_as_text() {
        let json = serde_json::json!({"a": [1, 2]});
        assert_eq!(
            to_engine_value(&RowValues::JSON(json)),
            Value::Text(r#"{"a":[1,2]}"#.into())
        );
    }
}
