//! Raw inbound payloads.

use serde::Serialize;
use serde_json::{Map, Value};

use game_events::non_empty_str;

/// A loosely-typed inbound body.
///
/// Always an object: anything that does not parse as a JSON object is
/// treated as an empty payload rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a body defensively. Empty, malformed or non-object bodies
    /// yield an empty payload.
    pub fn parse(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => Self(fields),
            Ok(other) => {
                tracing::debug!(shape = %json_shape(&other), "payload is not an object, using empty payload");
                Self::default()
            }
            Err(e) => {
                tracing::debug!(error = %e, "payload is not valid JSON, using empty payload");
                Self::default()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The field as a string, only if it is a non-empty string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        non_empty_str(self.0.get(key))
    }

    /// The `hit` field, only if it is an actual boolean.
    ///
    /// `"true"`, `1` and `null` all count as an unknown outcome.
    pub fn hit(&self) -> Option<bool> {
        self.0.get("hit").and_then(Value::as_bool)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

fn json_shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let payload = Payload::parse(br#"{"attacker": "Knight", "hit": false}"#);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.str_field("attacker"), Some("Knight"));
        assert_eq!(payload.hit(), Some(false));
    }

    #[test]
    fn test_parse_degrades_to_empty() {
        assert!(Payload::parse(b"").is_empty());
        assert!(Payload::parse(b"   \n").is_empty());
        assert!(Payload::parse(b"{not json").is_empty());
        assert!(Payload::parse(b"[1, 2, 3]").is_empty());
        assert!(Payload::parse(b"\"attack\"").is_empty());
        assert!(Payload::parse(b"null").is_empty());
    }

    #[test]
    fn test_hit_must_be_boolean() {
        assert_eq!(Payload::parse(br#"{"hit": "true"}"#).hit(), None);
        assert_eq!(Payload::parse(br#"{"hit": 1}"#).hit(), None);
        assert_eq!(Payload::parse(br#"{"hit": null}"#).hit(), None);
        assert_eq!(Payload::parse(br#"{"hit": true}"#).hit(), Some(true));
    }

    #[test]
    fn test_str_field_rejects_empty_and_non_strings() {
        let payload = Payload::parse(br#"{"a": "", "b": 5, "c": "ok"}"#);
        assert_eq!(payload.str_field("a"), None);
        assert_eq!(payload.str_field("b"), None);
        assert_eq!(payload.str_field("c"), Some("ok"));
        assert_eq!(payload.str_field("missing"), None);
    }
}
