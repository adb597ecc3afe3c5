//! HTTP binding for the gateway, ledger, stats and summaries.
//!
//! Ingestion endpoints accept GET as an alias of POST; both append an event.
//! Bodies are only parsed when the request declares a JSON content type.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;

use game_events::{EventKind, StatsEngine};

use crate::error::ApiError;
use crate::gateway::{IngestHints, Ingested, IngestionGateway, Payload};
use crate::summary::{summarize_events, Summarizer, TallySummarizer};

/// Header carrying a producer-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
    pub stats: StatsEngine,
    pub summarizer: Arc<dyn Summarizer>,
}

impl AppState {
    /// State with default stats options and the local tally summarizer.
    pub fn new(gateway: Arc<IngestionGateway>) -> Self {
        Self {
            gateway,
            stats: StatsEngine::new(),
            summarizer: Arc::new(TallySummarizer),
        }
    }

    pub fn with_stats(mut self, stats: StatsEngine) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }
}

/// Build the router for all event endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/events/attack", get(ingest_attack).post(ingest_attack))
        .route(
            "/api/events/attack/{attack_type}",
            get(ingest_typed_attack).post(ingest_typed_attack),
        )
        .route("/api/events/dash", get(ingest_dash).post(ingest_dash))
        .route("/api/events/all", get(list_events).delete(clear_events))
        .route("/api/events/stats", get(stats))
        .route("/api/events/summary", get(summary))
        .route("/api/events/ignored/{id}", post(mark_ignored))
        .route(
            "/api/events/{event_type}",
            get(ingest_by_type).post(ingest_by_type),
        )
        .with_state(state)
}

/// Parse the body only when it is declared as JSON.
fn payload_from(headers: &HeaderMap, body: &Bytes) -> Payload {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if is_json {
        Payload::parse(body)
    } else {
        Payload::default()
    }
}

fn hints_from(headers: &HeaderMap, attack_type: Option<String>) -> IngestHints {
    IngestHints {
        attack_type,
        idempotency_key: headers
            .get(IDEMPOTENCY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string),
    }
}

fn status_from(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or_else(|_| {
        tracing::warn!(status = code, "handler returned an invalid status code");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

fn ingested_response(ingested: Ingested) -> Response {
    (
        status_from(ingested.status),
        Json(json!({ "message": ingested.message, "handled": ingested.handled })),
    )
        .into_response()
}

fn ingest(
    state: &AppState,
    kind: EventKind,
    headers: &HeaderMap,
    body: &Bytes,
    attack_type: Option<String>,
) -> Result<Response, ApiError> {
    let context = match kind {
        EventKind::Attack => "Error processing attack event",
        EventKind::Dash => "Error processing dash event",
    };
    let payload = payload_from(headers, body);
    let hints = hints_from(headers, attack_type);

    state
        .gateway
        .ingest(kind, payload, hints)
        .map(ingested_response)
        .map_err(|e| ApiError::from_ingest(context, e))
}

async fn ingest_attack(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ingest(&state, EventKind::Attack, &headers, &body, None)
}

async fn ingest_typed_attack(
    State(state): State<AppState>,
    Path(attack_type): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ingest(&state, EventKind::Attack, &headers, &body, Some(attack_type))
}

async fn ingest_dash(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    ingest(&state, EventKind::Dash, &headers, &body, None)
}

async fn ingest_by_type(
    State(state): State<AppState>,
    Path(event_type): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload = payload_from(&headers, &body);
    let reply = state
        .gateway
        .dispatch_by_type(&event_type, &payload)
        .map_err(|e| ApiError::from_ingest("Error processing event", e))?;

    Ok((
        status_from(reply.status),
        Json(json!({ "message": reply.message })),
    )
        .into_response())
}

async fn list_events(State(state): State<AppState>) -> Result<Response, ApiError> {
    let events = serde_json::to_value(state.gateway.ledger().snapshot()).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize events");
        ApiError::EventsUnavailable(e.to_string())
    })?;
    Ok(Json(json!({ "events": events })).into_response())
}

async fn clear_events(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cleared = state.gateway.ledger().clear();
    tracing::info!(cleared, "cleared event ledger");
    Json(json!({ "cleared": cleared }))
}

async fn mark_ignored(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let found = state.gateway.ledger().mark_ignored(&id);
    let status = if found {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    (status, Json(json!({ "ignored": found }))).into_response()
}

async fn stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let stats = state.stats.compute(&state.gateway.ledger().snapshot());
    let body = serde_json::to_value(stats).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize stats");
        ApiError::StatsUnavailable(e.to_string())
    })?;
    Ok(Json(body).into_response())
}

async fn summary(State(state): State<AppState>) -> Result<Response, ApiError> {
    let events = state.gateway.ledger().snapshot();
    let summary = summarize_events(state.summarizer.as_ref(), &events)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "summary generation failed");
            ApiError::SummaryFailed(e.to_string())
        })?;
    Ok(Json(json!({ "summary": summary })).into_response())
}
