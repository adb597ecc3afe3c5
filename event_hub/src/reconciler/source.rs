//! Where a client view pulls its snapshots from.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

use game_events::{Event, EventStats, StatsEngine};

use crate::ledger::EventLedger;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// A provider of ledger snapshots and server-side stats.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Newest-first events currently held by the server.
    async fn fetch_events(&self) -> Result<Vec<Event>, FetchError>;

    /// Server-computed statistics.
    async fn fetch_stats(&self) -> Result<EventStats, FetchError>;
}

#[derive(Deserialize)]
struct EventsEnvelope {
    #[serde(default)]
    events: Vec<Map<String, Value>>,
}

/// Polls a hub over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(self.url(path)).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_events(&self) -> Result<Vec<Event>, FetchError> {
        let envelope: EventsEnvelope = self.get("/api/events/all").await?.json().await?;

        // A malformed entry is skipped rather than failing the whole pull
        Ok(envelope
            .events
            .into_iter()
            .filter_map(|raw| match Event::try_from(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed server event");
                    None
                }
            })
            .collect())
    }

    async fn fetch_stats(&self) -> Result<EventStats, FetchError> {
        Ok(self.get("/api/events/stats").await?.json().await?)
    }
}

/// Reads an in-process ledger directly.
#[derive(Debug, Clone)]
pub struct LedgerSnapshotSource {
    ledger: Arc<EventLedger>,
    stats: StatsEngine,
}

impl LedgerSnapshotSource {
    pub fn new(ledger: Arc<EventLedger>) -> Self {
        Self {
            ledger,
            stats: StatsEngine::new(),
        }
    }

    pub fn with_stats(mut self, stats: StatsEngine) -> Self {
        self.stats = stats;
        self
    }
}

#[async_trait]
impl SnapshotSource for LedgerSnapshotSource {
    async fn fetch_events(&self) -> Result<Vec<Event>, FetchError> {
        Ok(self.ledger.snapshot())
    }

    async fn fetch_stats(&self) -> Result<EventStats, FetchError> {
        Ok(self.stats.compute(&self.ledger.snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_events::{AttackEvent, DashEvent};

    #[test]
    fn test_http_source_trims_base_url() {
        let source = HttpSnapshotSource::new("http://localhost:9002/");
        assert_eq!(
            source.url("/api/events/all"),
            "http://localhost:9002/api/events/all"
        );
    }

    #[tokio::test]
    async fn test_ledger_source() {
        let ledger = Arc::new(EventLedger::new());
        ledger.append(Event::attack(AttackEvent::result("Kick", true)));
        ledger.append(Event::dash(DashEvent::default()));

        let source = LedgerSnapshotSource::new(Arc::clone(&ledger));
        let events = source.fetch_events().await.unwrap();
        let stats = source.fetch_stats().await.unwrap();

        assert_eq!(events.len(), 2);
        assert!(events[0].is_dash());
        assert_eq!(stats.attack_count, 1);
        assert_eq!(stats.successful_hits, 1);
    }
}
