//! Client Reconciler - keeps a consumer-side view in step with the ledger.
//!
//! Each poll:
//! 1. **Fetch** the full server snapshot
//! 2. **Merge** it into the local set by id (local entries win)
//! 3. **Order** newest-first and truncate to capacity
//! 4. **Recount** attacks, hits and dashes from the merged set
//! 5. **Fetch** the server-side stats for the user-formula success rate
//!
//! A failed fetch skips the tick; the next tick retries.

mod source;

pub use source::*;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use game_events::{AttackEvent, DashEvent, Event, EventId};

use crate::ledger::LEDGER_CAPACITY;

/// Attack labels used by the simulation controls.
pub const ATTACK_TYPES: [&str; 4] = ["Sword Slash", "Fireball", "Arrow Shot", "Axe Swing"];

/// Chance that a simulated attack lands.
pub const HIT_PROBABILITY: f64 = 0.7;

/// Default polling interval.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A bounded local mirror of the ledger plus derived counts.
#[derive(Debug, Clone)]
pub struct ClientView {
    capacity: usize,
    events: Vec<Event>,
    attack_count: usize,
    hit_count: usize,
    dash_count: usize,
    /// Server-authoritative; never recomputed locally.
    success_rate_by_user_formula: Option<i64>,
}

impl ClientView {
    pub fn new() -> Self {
        Self::with_capacity(LEDGER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Vec::new(),
            attack_count: 0,
            hit_count: 0,
            dash_count: 0,
            success_rate_by_user_formula: None,
        }
    }

    /// Newest-first events in the view.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn attack_count(&self) -> usize {
        self.attack_count
    }

    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    pub fn dash_count(&self) -> usize {
        self.dash_count
    }

    pub fn success_rate_by_user_formula(&self) -> Option<i64> {
        self.success_rate_by_user_formula
    }

    pub fn set_success_rate_by_user_formula(&mut self, rate: Option<i64>) {
        self.success_rate_by_user_formula = rate;
    }

    /// Add an event created on the client side.
    pub fn record_local(&mut self, event: Event) {
        self.events.insert(0, event);
        self.events.truncate(self.capacity);
        self.recount();
    }

    /// Union the server snapshot into the view, keyed by id.
    ///
    /// Local entries win on conflict. The result is ordered newest-first by
    /// timestamp (ties keep local entries ahead) and truncated to capacity.
    pub fn merge(&mut self, server_events: Vec<Event>) {
        let mut seen: HashSet<EventId> = self.events.iter().map(|e| e.id.clone()).collect();
        let mut merged = std::mem::take(&mut self.events);
        merged.extend(
            server_events
                .into_iter()
                .filter(|e| seen.insert(e.id.clone())),
        );

        merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        merged.truncate(self.capacity);
        self.events = merged;
        self.recount();
    }

    fn recount(&mut self) {
        self.attack_count = 0;
        self.hit_count = 0;
        self.dash_count = 0;
        for event in &self.events {
            if let Some(attack) = event.as_attack() {
                self.attack_count += 1;
                if attack.is_hit() {
                    self.hit_count += 1;
                }
            } else if event.is_dash() {
                self.dash_count += 1;
            }
        }
    }
}

impl Default for ClientView {
    fn default() -> Self {
        Self::new()
    }
}

/// A random attack as produced by the simulation controls.
pub fn simulate_attack<R: Rng>(rng: &mut R) -> Event {
    let attack_type = ATTACK_TYPES.choose(rng).copied().unwrap_or(ATTACK_TYPES[0]);
    let defender = format!("Enemy {}", rng.gen_range(1..=3));
    let hit = rng.gen_bool(HIT_PROBABILITY);
    Event::attack(AttackEvent::result(attack_type, hit).with_defender(defender))
}

/// A player dash as produced by the simulation controls.
pub fn simulate_dash() -> Event {
    Event::dash(DashEvent::default())
}

/// Periodically pulls snapshots from a source into a shared [`ClientView`].
pub struct Reconciler<S> {
    source: S,
    view: Arc<Mutex<ClientView>>,
    interval: Duration,
}

impl<S: SnapshotSource> Reconciler<S> {
    pub fn new(source: S, view: Arc<Mutex<ClientView>>) -> Self {
        Self {
            source,
            view,
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn view(&self) -> &Arc<Mutex<ClientView>> {
        &self.view
    }

    /// Run a single fetch-merge-recount cycle.
    ///
    /// A failed event fetch leaves the view untouched. A failed stats fetch
    /// keeps the previous success rate.
    pub async fn poll_once(&self) -> Result<(), FetchError> {
        let events = self.source.fetch_events().await?;
        self.view.lock().merge(events);

        match self.source.fetch_stats().await {
            Ok(stats) => self
                .view
                .lock()
                .set_success_rate_by_user_formula(stats.success_rate_by_user_formula),
            Err(e) => tracing::debug!(error = %e, "stats fetch failed, keeping previous rate"),
        }
        Ok(())
    }

    /// Poll until `cancel` fires. The first poll happens immediately.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::debug!(error = %e, "snapshot fetch failed, skipping tick");
                    }
                }
            }
        }
        tracing::debug!("reconciler stopped");
    }

    /// Spawn [`Reconciler::run`] onto the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()>
    where
        S: 'static,
    {
        tokio::spawn(self.run(cancel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use game_events::{EventBody, EventStats};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::ledger::EventLedger;

    fn at(n: i64, id: &str, body: EventBody) -> Event {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + ChronoDuration::seconds(n);
        Event::new(EventId::new(id), time, body)
    }

    fn hit(n: i64, id: &str) -> Event {
        at(n, id, EventBody::Attack(AttackEvent::result("Kick", true)))
    }

    fn miss(n: i64, id: &str) -> Event {
        at(n, id, EventBody::Attack(AttackEvent::result("Kick", false)))
    }

    fn dash(n: i64, id: &str) -> Event {
        at(n, id, EventBody::Dash(DashEvent::default()))
    }

    #[test]
    fn test_merge_orders_newest_first() {
        let mut view = ClientView::new();
        view.record_local(dash(5, "local"));
        view.merge(vec![hit(9, "s2"), miss(1, "s1")]);

        let ids: Vec<_> = view.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "local", "s1"]);
        assert_eq!(view.attack_count(), 2);
        assert_eq!(view.hit_count(), 1);
        assert_eq!(view.dash_count(), 1);
    }

    #[test]
    fn test_local_wins_on_conflict() {
        let mut view = ClientView::new();
        view.record_local(hit(3, "shared"));
        view.merge(vec![miss(3, "shared")]);

        assert_eq!(view.events().len(), 1);
        assert!(view.events()[0].as_attack().unwrap().is_hit());
        assert_eq!(view.hit_count(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let snapshot = vec![hit(4, "a"), dash(3, "b"), miss(2, "c")];
        let mut view = ClientView::new();

        view.merge(snapshot.clone());
        let first: Vec<_> = view.events().to_vec();
        let counts = (view.attack_count(), view.hit_count(), view.dash_count());

        view.merge(snapshot);
        assert_eq!(view.events(), first.as_slice());
        assert_eq!(
            (view.attack_count(), view.hit_count(), view.dash_count()),
            counts
        );
    }

    #[test]
    fn test_merge_truncates_to_capacity() {
        let mut view = ClientView::with_capacity(3);
        view.merge((0..10).map(|n| dash(n, &format!("d{n}"))).collect());

        let ids: Vec<_> = view.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["d9", "d8", "d7"]);
        assert_eq!(view.dash_count(), 3);

        // Merging the same snapshot again changes nothing
        view.merge((0..10).map(|n| dash(n, &format!("d{n}"))).collect());
        assert_eq!(view.events().len(), 3);
        assert_eq!(view.events()[2].id.as_str(), "d7");
    }

    #[test]
    fn test_merge_drops_duplicate_server_ids() {
        let mut view = ClientView::new();
        view.merge(vec![hit(2, "x"), miss(1, "x")]);
        assert_eq!(view.events().len(), 1);
        assert_eq!(view.hit_count(), 1);
    }

    #[test]
    fn test_simulated_events() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let event = simulate_attack(&mut rng);
            let attack = event.as_attack().unwrap();
            assert!(ATTACK_TYPES.contains(&attack.attack_type.as_str()));
            assert!(attack.outcome_known());
            assert!(["Enemy 1", "Enemy 2", "Enemy 3"].contains(&attack.defender.as_str()));
        }
        assert_eq!(simulate_dash().as_dash().unwrap().character, "Player");
    }

    #[tokio::test]
    async fn test_poll_once_merges_and_fetches_rate() {
        let ledger = Arc::new(EventLedger::new());
        for n in 0..7 {
            ledger.append(hit(n, &format!("h{n}")));
        }
        for n in 0..3 {
            ledger.append(miss(10 + n, &format!("m{n}")));
        }

        let view = Arc::new(Mutex::new(ClientView::new()));
        view.lock().record_local(dash(100, "local-dash"));
        let reconciler = Reconciler::new(LedgerSnapshotSource::new(ledger), Arc::clone(&view));

        reconciler.poll_once().await.unwrap();

        let view = view.lock();
        assert_eq!(view.events().len(), 11);
        assert_eq!(view.attack_count(), 10);
        assert_eq!(view.hit_count(), 7);
        assert_eq!(view.dash_count(), 1);
        assert_eq!(view.success_rate_by_user_formula(), Some(233));
    }

    struct FlakySource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for FlakySource {
        async fn fetch_events(&self) -> Result<Vec<Event>, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(vec![hit(1, "first")])
            } else {
                Err(FetchError::Unavailable("connection refused".into()))
            }
        }

        async fn fetch_stats(&self) -> Result<EventStats, FetchError> {
            Err(FetchError::Status(500))
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_view_untouched() {
        let view = Arc::new(Mutex::new(ClientView::new()));
        view.lock().set_success_rate_by_user_formula(Some(50));
        let reconciler = Reconciler::new(
            FlakySource {
                calls: AtomicUsize::new(0),
            },
            Arc::clone(&view),
        );

        reconciler.poll_once().await.unwrap();
        assert!(reconciler.poll_once().await.is_err());

        let view = view.lock();
        assert_eq!(view.events().len(), 1);
        // Stats failure kept the previous rate
        assert_eq!(view.success_rate_by_user_formula(), Some(50));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let ledger = Arc::new(EventLedger::new());
        ledger.append(dash(1, "d1"));

        let view = Arc::new(Mutex::new(ClientView::new()));
        let cancel = CancellationToken::new();
        let handle = Reconciler::new(LedgerSnapshotSource::new(Arc::clone(&ledger)), Arc::clone(&view))
            .with_interval(Duration::from_millis(10))
            .spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reconciler did not stop")
            .unwrap();

        assert_eq!(view.lock().dash_count(), 1);
        // Stopping the loop does not touch the ledger
        assert_eq!(ledger.len(), 1);
    }
}
