//! Handler Registry - routes events by type to at most one consumer.

use parking_lot::RwLock;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

use crate::gateway::Payload;

/// What a handler reports back to the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerReply {
    pub message: String,
    /// HTTP-style status code.
    pub status: u16,
}

impl HandlerReply {
    /// A 200 reply with the given message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::with_status(message, 200)
    }

    pub fn with_status(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }
}

/// A handler failed while processing a payload.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerError::Failed(message.into())
    }
}

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<HandlerReply, HandlerError>;

/// A consumer of raw event payloads.
///
/// Any `Fn(&Payload) -> HandlerResult` closure is a handler.
pub trait EventHandler: Send + Sync {
    fn handle(&self, payload: &Payload) -> HandlerResult;
}

impl<F> EventHandler for F
where
    F: Fn(&Payload) -> HandlerResult + Send + Sync,
{
    fn handle(&self, payload: &Payload) -> HandlerResult {
        self(payload)
    }
}

/// Maps an event-type tag to its active handler.
///
/// Registration is last-write-wins. A dispatch uses whichever handler was
/// registered when it looked the type up; the lock is released before the
/// handler runs, so handlers may register or unregister freely.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handler under `event_type`, replacing any previous one.
    ///
    /// Returns true if a handler was replaced.
    pub fn register(
        &self,
        event_type: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> bool {
        let event_type = event_type.into();
        tracing::info!(event_type = %event_type, "registering event handler");
        let replaced = self
            .handlers
            .write()
            .insert(event_type, Arc::new(handler))
            .is_some();
        tracing::debug!(handlers = ?self.registered_types(), "current handlers");
        replaced
    }

    /// Remove the handler for `event_type`. Returns true if one was removed.
    pub fn unregister(&self, event_type: &str) -> bool {
        self.handlers.write().remove(event_type).is_some()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers.read().contains_key(event_type)
    }

    /// Registered event types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<_> = self.handlers.read().keys().cloned().collect();
        types.sort();
        types
    }

    /// Invoke the handler for `event_type`, if any.
    ///
    /// Returns `None` when no handler is registered. A panicking handler is
    /// reported as [`HandlerError::Panicked`] and leaves the registry intact.
    pub fn dispatch(&self, event_type: &str, payload: &Payload) -> Option<HandlerResult> {
        let handler = self.handlers.read().get(event_type).cloned();
        tracing::debug!(
            event_type,
            handled = handler.is_some(),
            handlers = ?self.registered_types(),
            "dispatching event"
        );
        let handler = handler?;

        Some(
            catch_unwind(AssertUnwindSafe(|| handler.handle(payload))).unwrap_or_else(|panic| {
                Err(HandlerError::Panicked(panic_message(panic.as_ref())))
            }),
        )
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
