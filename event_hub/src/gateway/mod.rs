//! Ingestion Gateway - turns raw payloads into events, records them, then
//! hands them to the registered handler.
//!
//! The ingestion pipeline works as follows:
//! 1. **Parse**: The body is parsed defensively into a [`Payload`]
//! 2. **Identify**: A fresh id is generated (or the idempotency key is used)
//! 3. **Normalize**: Canonical fields are computed with their defaults
//! 4. **Merge**: Other payload fields are copied into `extra` non-destructively
//! 5. **Append**: The event is written to the ledger
//! 6. **Dispatch**: The handler registered for the event's kind is invoked
//!
//! Append always commits before dispatch; a failing handler never rolls the
//! ledger back.

mod payload;

pub use payload::*;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

use game_events::{
    AttackEvent, DashEvent, Event, EventBody, EventId, EventKind, DEFAULT_ATTACKER,
    DEFAULT_CHARACTER, DEFAULT_DEFENDER, UNKNOWN_ATTACK,
};

use crate::handlers::{HandlerError, HandlerRegistry, HandlerReply};
use crate::ledger::{AppendOutcome, EventLedger};

/// Errors surfaced at the gateway boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IngestError {
    /// No handler is registered for a by-type dispatch.
    #[error("Event type not supported: {0}")]
    UnsupportedEventType(String),

    /// The registered handler failed. Any event was already recorded.
    #[error("handler for '{kind}' failed: {source}")]
    Handler {
        kind: String,
        #[source]
        source: HandlerError,
    },
}

/// Routing hints that travel alongside a payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestHints {
    /// Attack type taken from the request path, e.g. `/attack/kick`.
    pub attack_type: Option<String>,

    /// Producer-supplied key; when present it becomes the event id, so a
    /// retried delivery collides with the first one.
    pub idempotency_key: Option<String>,
}

impl IngestHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attack_type(mut self, attack_type: impl Into<String>) -> Self {
        self.attack_type = Some(attack_type.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub event_id: EventId,
    pub message: String,
    pub status: u16,
    /// Whether a registered handler processed the event.
    pub handled: bool,
    /// The id was already in the ledger; nothing was appended or dispatched.
    pub duplicate: bool,
}

/// Normalizes inbound payloads, appends them to the ledger and dispatches.
#[derive(Debug)]
pub struct IngestionGateway {
    ledger: Arc<EventLedger>,
    handlers: Arc<HandlerRegistry>,
    /// Last timestamp handed out; held across stamping and append so ledger
    /// order and timestamp order agree.
    last_stamp: Mutex<Option<DateTime<Utc>>>,
}

impl IngestionGateway {
    pub fn new(ledger: Arc<EventLedger>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            ledger,
            handlers,
            last_stamp: Mutex::new(None),
        }
    }

    pub fn ledger(&self) -> &Arc<EventLedger> {
        &self.ledger
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Ingest an attack. `path_hint` is the attack type taken from the route.
    pub fn ingest_attack(
        &self,
        payload: Payload,
        path_hint: Option<&str>,
    ) -> Result<Ingested, IngestError> {
        let mut hints = IngestHints::new();
        hints.attack_type = path_hint.map(str::to_string);
        self.ingest(EventKind::Attack, payload, hints)
    }

    /// Ingest a dash.
    pub fn ingest_dash(&self, payload: Payload) -> Result<Ingested, IngestError> {
        self.ingest(EventKind::Dash, payload, IngestHints::new())
    }

    /// Record an event of `kind`, then dispatch it.
    ///
    /// Succeeds whether or not a handler is registered; a missing handler is
    /// reported as `handled: false` with status 200.
    pub fn ingest(
        &self,
        kind: EventKind,
        payload: Payload,
        hints: IngestHints,
    ) -> Result<Ingested, IngestError> {
        let (event_id, outcome) = {
            let mut last_stamp = self.last_stamp.lock();
            let timestamp = next_stamp(&mut last_stamp);
            let id = match hints.idempotency_key.as_deref().filter(|k| !k.is_empty()) {
                Some(key) => EventId::new(key),
                None => EventId::generate(timestamp),
            };
            let event = normalize(kind, &payload, &hints, id, timestamp);
            let event_id = event.id.clone();
            (event_id, self.ledger.append(event))
        };

        if outcome == AppendOutcome::Duplicate {
            return Ok(Ingested {
                event_id,
                message: "Duplicate event ignored".to_string(),
                status: 200,
                handled: false,
                duplicate: true,
            });
        }

        match self.handlers.dispatch(kind.as_str(), &payload) {
            Some(Ok(reply)) => Ok(Ingested {
                event_id,
                message: reply.message,
                status: reply.status,
                handled: true,
                duplicate: false,
            }),
            Some(Err(source)) => {
                tracing::error!(
                    event_id = %event_id,
                    kind = %kind,
                    error = %source,
                    "event handler failed"
                );
                Err(IngestError::Handler {
                    kind: kind.as_str().to_string(),
                    source,
                })
            }
            None => Ok(Ingested {
                event_id,
                message: accepted_message(kind).to_string(),
                status: 200,
                handled: false,
                duplicate: false,
            }),
        }
    }

    /// Dispatch a payload to the handler for `event_type` without recording it.
    pub fn dispatch_by_type(
        &self,
        event_type: &str,
        payload: &Payload,
    ) -> Result<HandlerReply, IngestError> {
        match self.handlers.dispatch(event_type, payload) {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(source)) => {
                tracing::error!(event_type, error = %source, "event handler failed");
                Err(IngestError::Handler {
                    kind: event_type.to_string(),
                    source,
                })
            }
            None => Err(IngestError::UnsupportedEventType(event_type.to_string())),
        }
    }
}

/// Build the canonical event for a payload.
///
/// Attack type precedence: payload `attackType`, payload `type`, the path
/// hint, then `"Unknown Attack"`.
pub fn normalize(
    kind: EventKind,
    payload: &Payload,
    hints: &IngestHints,
    id: EventId,
    timestamp: DateTime<Utc>,
) -> Event {
    let body = match kind {
        EventKind::Attack => {
            let attack_type = payload
                .str_field("attackType")
                .or_else(|| payload.str_field("type"))
                .or_else(|| hints.attack_type.as_deref().filter(|t| !t.is_empty()))
                .unwrap_or(UNKNOWN_ATTACK);
            EventBody::Attack(AttackEvent::new(
                payload.str_field("attacker").unwrap_or(DEFAULT_ATTACKER),
                payload.str_field("defender").unwrap_or(DEFAULT_DEFENDER),
                attack_type,
                payload.hit(),
            ))
        }
        EventKind::Dash => EventBody::Dash(DashEvent::new(
            payload.str_field("character").unwrap_or(DEFAULT_CHARACTER),
        )),
    };

    Event::new(id, timestamp, body)
        .with_extra(payload.iter().map(|(k, v)| (k.clone(), v.clone())))
}

fn accepted_message(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Attack => "Attack event received successfully",
        EventKind::Dash => "Dash event received successfully",
    }
}

fn next_stamp(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let stamp = match *last {
        Some(prev) if prev > now => prev,
        _ => now,
    };
    *last = Some(stamp);
    stamp
}
