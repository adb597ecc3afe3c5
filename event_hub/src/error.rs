//! Error types for the HTTP boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::gateway::IngestError;

/// Errors returned by the HTTP handlers.
///
/// Each variant maps to a fixed status code and response body shape. None
/// of them is fatal to the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The by-type endpoint was called for a type with no handler.
    #[error("event type not supported: {0}")]
    UnsupportedEventType(String),

    /// A registered handler failed. `context` is the response message,
    /// e.g. "Error processing attack event".
    #[error("{context}: {error}")]
    Handler { context: &'static str, error: String },

    /// The event list could not be produced.
    #[error("failed to list events: {0}")]
    EventsUnavailable(String),

    /// Statistics could not be produced.
    #[error("failed to compute stats: {0}")]
    StatsUnavailable(String),

    /// The summarizer failed.
    #[error("failed to generate summary: {0}")]
    SummaryFailed(String),
}

impl ApiError {
    /// Convert a gateway error, labelling handler failures with `context`.
    pub fn from_ingest(context: &'static str, err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedEventType(event_type) => {
                ApiError::UnsupportedEventType(event_type)
            }
            IngestError::Handler { source, .. } => ApiError::Handler {
                context,
                error: source.to_string(),
            },
        }
    }

    /// Returns the HTTP status code for this error.
    ///
    /// - Unsupported event type: 404 Not Found
    /// - Everything else: 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedEventType(_) => StatusCode::NOT_FOUND,
            ApiError::Handler { .. }
            | ApiError::EventsUnavailable(_)
            | ApiError::StatsUnavailable(_)
            | ApiError::SummaryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::UnsupportedEventType(_) => json!({ "message": "Event type not supported" }),
            ApiError::Handler { context, error } => json!({ "message": context, "error": error }),
            ApiError::EventsUnavailable(_) => json!({ "events": [] }),
            ApiError::StatsUnavailable(_) => json!({ "error": "Failed to compute stats" }),
            ApiError::SummaryFailed(reason) => {
                json!({ "error": format!("Failed to generate summary: {reason}") })
            }
        };

        (status, Json(body)).into_response()
    }
}
