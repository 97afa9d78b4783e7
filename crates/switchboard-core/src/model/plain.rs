//! Plain-data helpers shared by the model constructors.
//!
//! Serialization across the whole crate produces maps with string keys;
//! every canonical struct is tagged with [`TAG_KEY`] so a single `revive`
//! step can dispatch back to the typed value.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{Result, ValidationError};

/// Keyed container type used for free-form metadata throughout the model.
pub type JsonMap = Map<String, Value>;

/// Discriminator key stamped into every serialized canonical struct.
pub const TAG_KEY: &str = "__type__";

/// Stamps `tag` into an object value. Non-object values pass through.
pub fn tagged(tag: &str, mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.insert(TAG_KEY.to_string(), Value::String(tag.to_string()));
    }
    value
}

/// Reads and removes the discriminator from an object value.
pub fn take_tag(value: &mut Value) -> Option<String> {
    value
        .as_object_mut()
        .and_then(|map| map.remove(TAG_KEY))
        .and_then(|tag| tag.as_str().map(str::to_string))
}

/// Best-effort projection of an opaque scalar to a string.
///
/// Platform ids arrive as strings or integers depending on the adapter;
/// the normalized model stores them as strings.
pub fn stringify_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extracts `value` as an object map or reports a validation failure.
pub fn require_map(subject: &'static str, value: Value) -> Result<JsonMap> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::field(subject, other, ".", "must be a map").into()),
    }
}

/// Pulls a string-ish field, coercing numbers.
pub fn take_string(map: &mut JsonMap, key: &str) -> Option<String> {
    map.remove(key).as_ref().and_then(stringify_scalar)
}

/// Pulls a boolean field, defaulting to `false`.
pub fn take_bool(map: &mut JsonMap, key: &str) -> bool {
    map.remove(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

/// Pulls a metadata sub-map, defaulting to empty.
pub fn take_map(map: &mut JsonMap, key: &str) -> JsonMap {
    match map.remove(key) {
        Some(Value::Object(m)) => m,
        _ => JsonMap::new(),
    }
}

/// Parses a timestamp from an integer epoch, an RFC3339 string, or a
/// float epoch. Unparseable inputs yield `None`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                Utc.timestamp_opt(secs, 0).single()
            } else {
                n.as_f64()
                    .and_then(|f| Utc.timestamp_opt(f as i64, 0).single())
            }
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}

/// Renders a timestamp in the wire format (RFC3339, UTC).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagging_round_trip() {
        let mut v = tagged("message", json!({"id": "m1"}));
        assert_eq!(v["__type__"], "message");
        assert_eq!(take_tag(&mut v), Some("message".to_string()));
        assert!(v.as_object().unwrap().get(TAG_KEY).is_none());
    }

    #[test]
    fn scalars_stringify() {
        assert_eq!(stringify_scalar(&json!("abc")), Some("abc".into()));
        assert_eq!(stringify_scalar(&json!(42)), Some("42".into()));
        assert_eq!(stringify_scalar(&json!([1])), None);
    }

    #[test]
    fn timestamps_parse_from_epoch_and_rfc3339() {
        let from_epoch = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let from_str = parse_timestamp(&json!(from_epoch.to_rfc3339())).unwrap();
        assert_eq!(from_epoch, from_str);
        assert_eq!(parse_timestamp(&json!({"not": "a time"})), None);
    }
}
