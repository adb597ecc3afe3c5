//! Attack summaries, produced on demand and never on the ingestion path.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use game_events::Event;

/// Returned when there is nothing to summarize; the summarizer is not called.
pub const NO_ATTACKS_SUMMARY: &str = "No attack events to summarize.";

/// The attack fields a summarizer gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackDigest {
    pub timestamp: String,
    pub attacker: String,
    pub defender: String,
    pub attack_type: String,
    pub hit: Option<bool>,
}

impl AttackDigest {
    /// Digest the attack events in a snapshot, keeping their order.
    pub fn from_events(events: &[Event]) -> Vec<Self> {
        events
            .iter()
            .filter_map(|event| {
                event.as_attack().map(|attack| AttackDigest {
                    timestamp: event.timestamp.to_rfc3339(),
                    attacker: attack.attacker.clone(),
                    defender: attack.defender.clone(),
                    attack_type: attack.attack_type.clone(),
                    hit: attack.hit(),
                })
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summarizer unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

/// Opaque `summarize(events) -> text` collaborator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, attacks: &[AttackDigest]) -> Result<String, SummaryError>;
}

/// Summarize the attacks in a snapshot.
pub async fn summarize_events(
    summarizer: &dyn Summarizer,
    events: &[Event],
) -> Result<String, SummaryError> {
    let attacks = AttackDigest::from_events(events);
    if attacks.is_empty() {
        return Ok(NO_ATTACKS_SUMMARY.to_string());
    }
    summarizer.summarize(&attacks).await
}

/// Local summarizer built from hit/miss tallies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TallySummarizer;

#[derive(Debug, Default)]
struct Tally {
    attacks: u32,
    hits: u32,
    misses: u32,
}

impl Tally {
    fn record(&mut self, hit: Option<bool>) {
        self.attacks += 1;
        match hit {
            Some(true) => self.hits += 1,
            Some(false) => self.misses += 1,
            None => {}
        }
    }
}

/// Entries sorted by attack count (descending), then name.
fn ranked<'a>(tallies: &'a BTreeMap<&'a str, Tally>) -> Vec<(&'a str, &'a Tally)> {
    let mut entries: Vec<_> = tallies.iter().map(|(name, t)| (*name, t)).collect();
    entries.sort_by(|a, b| b.1.attacks.cmp(&a.1.attacks).then_with(|| a.0.cmp(b.0)));
    entries
}

#[async_trait]
impl Summarizer for TallySummarizer {
    async fn summarize(&self, attacks: &[AttackDigest]) -> Result<String, SummaryError> {
        let mut total = Tally::default();
        let mut by_type: BTreeMap<&str, Tally> = BTreeMap::new();
        let mut by_attacker: BTreeMap<&str, Tally> = BTreeMap::new();

        for attack in attacks {
            total.record(attack.hit);
            by_type
                .entry(attack.attack_type.as_str())
                .or_default()
                .record(attack.hit);
            by_attacker
                .entry(attack.attacker.as_str())
                .or_default()
                .record(attack.hit);
        }

        let pending = total.attacks - total.hits - total.misses;
        let mut lines = vec![format!(
            "{} attacks: {} hits, {} misses, {} without outcome.",
            total.attacks, total.hits, total.misses, pending
        )];

        let types = ranked(&by_type);
        if let Some((name, tally)) = types.first() {
            lines.push(format!(
                "Most used attack: {} ({} attacks, {} hits).",
                name, tally.attacks, tally.hits
            ));
        }
        lines.push(format!(
            "By attack type: {}.",
            types
                .iter()
                .map(|(name, t)| format!("{} {}/{} hit", name, t.hits, t.attacks))
                .collect::<Vec<_>>()
                .join(", ")
        ));

        if let Some((name, tally)) = ranked(&by_attacker).first() {
            lines.push(format!(
                "Most active attacker: {} ({} attacks).",
                name, tally.attacks
            ));
        }

        Ok(lines.join("\n"))
    }
}
