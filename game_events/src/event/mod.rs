//! Event definitions for attacks and dashes.

mod attack;
mod dash;

pub use attack::*;
pub use dash::*;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Length of the random base-36 suffix appended to generated ids.
const ID_SUFFIX_LEN: usize = 11;

/// Unique identifier for events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap an existing identifier (producer-supplied or decoded from the wire).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate an id from the capture time plus a random base-36 suffix.
    ///
    /// Uniqueness is best effort, not cryptographically guaranteed.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..ID_SUFFIX_LEN)
            .map(|_| char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
            .collect();
        Self(format!("{}{}", now.timestamp_millis(), suffix))
    }

    /// Create a random UUID-based id (used for events created client-side).
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of events the system accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Attack,
    Dash,
}

impl EventKind {
    /// The routing tag used for handler dispatch and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Attack => "attack",
            EventKind::Dash => "dash",
        }
    }

    /// Keys owned by the canonical record of this kind.
    ///
    /// Payload fields with these names are never copied into `extra`.
    pub fn reserved_keys(&self) -> &'static [&'static str] {
        match self {
            EventKind::Attack => &[
                "id",
                "kind",
                "type",
                "timestamp",
                "ignored",
                "attacker",
                "defender",
                "attackType",
                "hit",
                "outcomeKnown",
                "recordKind",
            ],
            EventKind::Dash => &["id", "kind", "type", "timestamp", "ignored", "character"],
        }
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "attack" => Ok(EventKind::Attack),
            "dash" => Ok(EventKind::Dash),
            other => Err(EventError::UnknownKind(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an attack record carries its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Submitted without `hit`; the outcome is not yet known.
    Start,
    /// Submitted with an explicit `hit` boolean.
    Result,
}

/// Errors raised while decoding an event from its wire form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },
}

/// Variant-specific part of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EventBody {
    Attack(AttackEvent),
    Dash(DashEvent),
}

/// An immutable record of a single attack or dash.
///
/// On the wire the record is flat: the common fields, the variant fields and
/// any extra producer fields all sit at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Event {
    pub id: EventId,

    /// Capture time, RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,

    /// Out-of-band flag set by `markIgnored`; storage is unaffected.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ignored: bool,

    #[serde(flatten)]
    pub body: EventBody,

    /// Additional producer fields. Never holds a reserved key.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Create a new event with no extra fields.
    pub fn new(id: EventId, timestamp: DateTime<Utc>, body: EventBody) -> Self {
        Self {
            id,
            timestamp,
            ignored: false,
            body,
            extra: Map::new(),
        }
    }

    /// Create an attack event stamped now with a fresh random id.
    pub fn attack(attack: AttackEvent) -> Self {
        Self::new(EventId::random(), Utc::now(), EventBody::Attack(attack))
    }

    /// Create a dash event stamped now with a fresh random id.
    pub fn dash(dash: DashEvent) -> Self {
        Self::new(EventId::random(), Utc::now(), EventBody::Dash(dash))
    }

    /// Copy extra fields in without overwriting anything already present.
    ///
    /// Reserved keys for this event's kind are skipped.
    pub fn with_extra(mut self, fields: impl IntoIterator<Item = (String, Value)>) -> Self {
        let reserved = self.kind().reserved_keys();
        for (key, value) in fields {
            if reserved.contains(&key.as_str()) {
                continue;
            }
            self.extra.entry(key).or_insert(value);
        }
        self
    }

    pub fn kind(&self) -> EventKind {
        match self.body {
            EventBody::Attack(_) => EventKind::Attack,
            EventBody::Dash(_) => EventKind::Dash,
        }
    }

    pub fn as_attack(&self) -> Option<&AttackEvent> {
        match &self.body {
            EventBody::Attack(attack) => Some(attack),
            EventBody::Dash(_) => None,
        }
    }

    pub fn as_dash(&self) -> Option<&DashEvent> {
        match &self.body {
            EventBody::Dash(dash) => Some(dash),
            EventBody::Attack(_) => None,
        }
    }

    pub fn is_attack(&self) -> bool {
        self.kind() == EventKind::Attack
    }

    pub fn is_dash(&self) -> bool {
        self.kind() == EventKind::Dash
    }
}

/// Returns the value as a string slice if it is a non-empty string.
pub fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn take_label(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

impl TryFrom<Map<String, Value>> for Event {
    type Error = EventError;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let id = match map.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => EventId::from(s),
            Some(_) => return Err(EventError::InvalidField("id")),
            None => return Err(EventError::MissingField("id")),
        };

        let kind = match map.remove("kind") {
            Some(Value::String(s)) => s.parse::<EventKind>()?,
            Some(_) => return Err(EventError::InvalidField("kind")),
            None => return Err(EventError::MissingField("kind")),
        };

        let timestamp = match map.remove("timestamp") {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
                .map_err(|e| EventError::InvalidTimestamp {
                    value: s.clone(),
                    reason: e.to_string(),
                })?
                .with_timezone(&Utc),
            Some(_) => return Err(EventError::InvalidField("timestamp")),
            None => return Err(EventError::MissingField("timestamp")),
        };

        let ignored = matches!(map.remove("ignored"), Some(Value::Bool(true)));

        let body = match kind {
            EventKind::Attack => {
                let defaults = AttackEvent::default();
                // outcomeKnown/recordKind are always re-derived from `hit`
                let hit = match map.remove("hit") {
                    Some(Value::Bool(hit)) => Some(hit),
                    _ => None,
                };
                EventBody::Attack(AttackEvent::new(
                    take_label(&mut map, "attacker").unwrap_or(defaults.attacker),
                    take_label(&mut map, "defender").unwrap_or(defaults.defender),
                    take_label(&mut map, "attackType").unwrap_or(defaults.attack_type),
                    hit,
                ))
            }
            EventKind::Dash => EventBody::Dash(
                take_label(&mut map, "character")
                    .map(DashEvent::new)
                    .unwrap_or_default(),
            ),
        };

        for key in kind.reserved_keys() {
            map.remove(*key);
        }

        Ok(Event {
            id,
            timestamp,
            ignored,
            body,
            extra: map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_generated_id_shape() {
        let now = fixed_time();
        let id = EventId::generate(now);
        let millis = now.timestamp_millis().to_string();

        assert!(id.as_str().starts_with(&millis));
        assert_eq!(id.as_str().len(), millis.len() + ID_SUFFIX_LEN);
        assert!(id.as_str()[millis.len()..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        let now = fixed_time();
        assert_ne!(EventId::generate(now), EventId::generate(now));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("attack".parse::<EventKind>(), Ok(EventKind::Attack));
        assert_eq!("dash".parse::<EventKind>(), Ok(EventKind::Dash));
        assert_eq!(
            "jump".parse::<EventKind>(),
            Err(EventError::UnknownKind("jump".into()))
        );
    }

    #[test]
    fn test_attack_wire_shape() {
        let event = Event::new(
            EventId::new("a1"),
            fixed_time(),
            EventBody::Attack(AttackEvent::result("Kick", true)),
        );
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["id"], "a1");
        assert_eq!(value["kind"], "attack");
        assert_eq!(value["attackType"], "Kick");
        assert_eq!(value["attacker"], "Player");
        assert_eq!(value["defender"], "Dummy");
        assert_eq!(value["hit"], true);
        assert_eq!(value["outcomeKnown"], true);
        assert_eq!(value["recordKind"], "result");
        assert!(value.get("ignored").is_none());
    }

    #[test]
    fn test_start_record_omits_hit() {
        let event = Event::new(
            EventId::new("a2"),
            fixed_time(),
            EventBody::Attack(AttackEvent::start("Kick")),
        );
        let value = serde_json::to_value(&event).unwrap();

        assert!(value.get("hit").is_none());
        assert_eq!(value["outcomeKnown"], false);
        assert_eq!(value["recordKind"], "start");
    }

    #[test]
    fn test_extra_never_overrides_reserved_keys() {
        let extra = json!({"id": "spoofed", "hit": true, "combo": 3});
        let event = Event::new(
            EventId::new("a3"),
            fixed_time(),
            EventBody::Attack(AttackEvent::start("Kick")),
        )
        .with_extra(extra.as_object().cloned().unwrap());

        assert_eq!(event.id.as_str(), "a3");
        assert_eq!(event.extra.len(), 1);
        assert_eq!(event.extra["combo"], 3);
        assert_eq!(event.as_attack().unwrap().hit(), None);
    }

    #[test]
    fn test_extra_first_write_wins() {
        let event = Event::dash(DashEvent::default())
            .with_extra([("speed".to_string(), json!(1))])
            .with_extra([("speed".to_string(), json!(2))]);

        assert_eq!(event.extra["speed"], 1);
    }

    #[test]
    fn test_decode_rederives_record_kind() {
        let value = json!({
            "id": "x",
            "kind": "attack",
            "timestamp": "2024-05-01T12:00:00Z",
            "hit": false,
            "outcomeKnown": false,
            "recordKind": "start",
            "combo": 2
        });
        let event: Event = serde_json::from_value(value).unwrap();
        let attack = event.as_attack().unwrap();

        assert_eq!(attack.hit(), Some(false));
        assert!(attack.outcome_known());
        assert_eq!(attack.record_kind(), RecordKind::Result);
        assert_eq!(attack.attack_type, "Unknown Attack");
        assert_eq!(event.extra.len(), 1);
        assert_eq!(event.timestamp, fixed_time());
    }

    #[test]
    fn test_decode_dash_defaults_and_ignored() {
        let value = json!({
            "id": "d",
            "kind": "dash",
            "timestamp": "2024-05-01T12:00:00Z",
            "ignored": true
        });
        let event: Event = serde_json::from_value(value).unwrap();

        assert!(event.ignored);
        assert_eq!(event.as_dash().unwrap().character, "Player");
    }

    #[test]
    fn test_decode_errors() {
        let missing_id = json!({"kind": "dash", "timestamp": "2024-05-01T12:00:00Z"});
        let err = Event::try_from(missing_id.as_object().cloned().unwrap()).unwrap_err();
        assert_eq!(err, EventError::MissingField("id"));

        let bad_kind = json!({"id": "1", "kind": "jump", "timestamp": "2024-05-01T12:00:00Z"});
        let err = Event::try_from(bad_kind.as_object().cloned().unwrap()).unwrap_err();
        assert_eq!(err, EventError::UnknownKind("jump".into()));

        let bad_time = json!({"id": "1", "kind": "dash", "timestamp": "yesterday"});
        let err = Event::try_from(bad_time.as_object().cloned().unwrap()).unwrap_err();
        assert!(matches!(err, EventError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_wire_roundtrip_preserves_identity() {
        let original = Event::new(
            EventId::new("rt"),
            fixed_time(),
            EventBody::Attack(AttackEvent::result("Fireball", false).with_attacker("Mage")),
        )
        .with_extra([("mana".to_string(), json!(12))]);

        let decoded: Event =
            serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }
}
