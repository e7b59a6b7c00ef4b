//! End-to-end lifecycle tests against the in-memory store.
//!
//! Every test builds its own [`Engine`] over a fresh [`MemoryStore`], a
//! [`ManualClock`] frozen at a fixed instant, a [`RecordingPublisher`], and
//! [`AtomicMetrics`], so time gates, events, and counters are all observable.
//!
//! Set `RUST_LOG=warfront_core=debug` to see the engine's tracing output.

#![allow(
    clippy::arithmetic_side_effects,
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use warfront_core::clock::{Clock, ManualClock};
use warfront_core::memory::MemoryStore;
use warfront_core::metrics::{AtomicMetrics, Counter};
use warfront_core::notify::RecordingPublisher;
use warfront_core::pagination::PageRequest;
use warfront_core::scoring::ScoreAggregator;
use warfront_core::error::reason;
use warfront_core::store::{
    BattleFilter, ScoreRecord, StoreError, WarFilter, WarfrontStore, next_revision,
};
use warfront_core::{BattlePlan, Engine, EngineError, ErrorKind, WarDeclaration};
use warfront_types::{
    Battle, BattleId, BattleStatus, BattleTally, BattleType, EventType, FactionId, Page,
    ScorePair, Territory, TerritoryId, War, WarId, WarPhase, WarStatus,
};

// =============================================================================
// Harness
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).unwrap()
}

struct Harness {
    engine: Engine,
    store: Arc<MemoryStore>,
    events: Arc<RecordingPublisher>,
    metrics: Arc<AtomicMetrics>,
    clock: Arc<ManualClock>,
}

fn harness() -> Harness {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let events = Arc::new(RecordingPublisher::new());
    let metrics = Arc::new(AtomicMetrics::new());
    let clock = Arc::new(ManualClock::new(epoch()));
    let engine = Engine::new(store.clone())
        .with_publisher(events.clone())
        .with_metrics(metrics.clone())
        .with_clock(clock.clone());
    Harness {
        engine,
        store,
        events,
        metrics,
        clock,
    }
}

impl Harness {
    async fn territory(&self, owner: Option<FactionId>) -> Territory {
        let territory = Territory {
            id: TerritoryId::new(),
            name: String::from("Ironvale Pass"),
            region: String::from("North"),
            owner_faction_id: owner,
            defense_rating: 40,
            siege_difficulty: 7,
            created_at: self.clock.now(),
            updated_at: self.clock.now(),
        };
        self.store.insert_territory(territory.clone()).await;
        territory
    }

    async fn ongoing_war(&self, declaration: WarDeclaration) -> War {
        let war = self.engine.wars().declare(declaration).await.unwrap();
        self.clock.advance(TimeDelta::hours(24));
        self.engine.wars().start(war.id).await.unwrap()
    }

    async fn active_battle(&self, war_id: WarId, battle_type: BattleType) -> Battle {
        let plan = BattlePlan::new(war_id, battle_type, self.clock.now());
        let battle = self.engine.battles().create(plan).await.unwrap();
        self.engine.battles().start(battle.id).await.unwrap()
    }

    fn page(&self, limit: i64, offset: i64) -> PageRequest {
        self.engine.page(Some(limit), Some(offset)).unwrap()
    }

    async fn war(&self, id: WarId) -> War {
        self.engine.wars().get(id).await.unwrap()
    }
}

fn kind<T: core::fmt::Debug>(result: Result<T, EngineError>) -> ErrorKind {
    result.expect_err("operation should fail").kind()
}

// =============================================================================
// Declare
// =============================================================================

#[tokio::test]
async fn declaring_against_yourself_fails_without_side_effects() {
    let h = harness();
    let faction = FactionId::new();

    let result = h
        .engine
        .wars()
        .declare(WarDeclaration::new(faction, faction))
        .await;

    assert_eq!(kind(result), ErrorKind::InvalidInput);
    let listed = h.engine.wars().list(WarFilter::default(), h.page(20, 0)).await.unwrap();
    assert_eq!(listed.total, 0);
    assert!(h.events.events().is_empty());
    assert_eq!(h.metrics.get(Counter::WarsDeclared), 0);
}

#[tokio::test]
async fn declaring_rejects_nil_factions_and_conflicting_allies() {
    let h = harness();
    let (a, b) = (FactionId::new(), FactionId::new());
    let wars = h.engine.wars();

    assert_eq!(kind(wars.declare(WarDeclaration::new(FactionId::nil(), b)).await), ErrorKind::InvalidInput);
    assert_eq!(kind(wars.declare(WarDeclaration::new(a, FactionId::nil())).await), ErrorKind::InvalidInput);
    assert_eq!(
        kind(wars.declare(WarDeclaration::new(a, b).with_allies([b])).await),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        kind(wars.declare(WarDeclaration::new(a, b).with_allies([FactionId::nil()])).await),
        ErrorKind::InvalidInput
    );
}

#[tokio::test]
async fn declaring_over_unknown_territory_is_not_found() {
    let h = harness();
    let declaration = WarDeclaration::new(FactionId::new(), FactionId::new())
        .over_territory(TerritoryId::new());

    let result = h.engine.wars().declare(declaration).await;

    assert_eq!(kind(result), ErrorKind::NotFound);
    assert_eq!(h.metrics.get(Counter::WarsDeclared), 0);
}

#[tokio::test]
async fn declared_war_waits_out_the_preparation_window() {
    let h = harness();
    let ally = FactionId::new();
    let territory = h.territory(None).await;
    let declaration = WarDeclaration::new(FactionId::new(), FactionId::new())
        .with_allies([ally])
        .over_territory(territory.id);

    let war = h.engine.wars().declare(declaration).await.unwrap();

    assert_eq!(war.status, WarStatus::Declared);
    assert_eq!(war.phase, WarPhase::Preparation);
    assert_eq!(war.scores(), ScorePair::default());
    assert_eq!(war.start_time, epoch() + TimeDelta::hours(24));
    assert!(war.ally_faction_ids.contains(&ally));
    assert_eq!(war.end_time, None);
    assert_eq!(h.war(war.id).await, war);
    assert_eq!(h.events.types(), vec![EventType::WarDeclared]);
    assert_eq!(h.metrics.get(Counter::WarsDeclared), 1);
}

// =============================================================================
// Start
// =============================================================================

#[tokio::test]
async fn war_starts_exactly_once_and_not_before_its_start_time() {
    let h = harness();
    let war = h
        .engine
        .wars()
        .declare(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await
        .unwrap();

    h.clock.advance(TimeDelta::hours(23));
    let early = h.engine.wars().start(war.id).await;
    assert!(matches!(early, Err(EngineError::TooEarly { .. })));
    assert_eq!(h.war(war.id).await.status, WarStatus::Declared);

    h.clock.advance(TimeDelta::hours(1));
    let started = h.engine.wars().start(war.id).await.unwrap();
    assert_eq!(started.status, WarStatus::Ongoing);
    assert_eq!(started.phase, WarPhase::Active);

    let again = h.engine.wars().start(war.id).await;
    assert_eq!(again.unwrap_err().to_string(), reason::WAR_ALREADY_STARTED);
    assert_eq!(h.events.of_type(EventType::WarStarted).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_succeed_exactly_once() {
    let h = harness();
    let war = h
        .engine
        .wars()
        .declare(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await
        .unwrap();
    h.clock.advance(TimeDelta::days(2));

    let war_id = war.id;
    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let engine = h.engine.clone();
            tokio::spawn(async move { engine.wars().start(war_id).await })
        })
        .collect();
    let results = futures::future::join_all(attempts).await;

    let successes = results.iter().filter(|r| r.as_ref().unwrap().is_ok()).count();
    assert_eq!(successes, 1);
    for result in results {
        if let Err(err) = result.unwrap() {
            assert_eq!(err.kind(), ErrorKind::InvalidState);
        }
    }
    assert_eq!(h.events.of_type(EventType::WarStarted).len(), 1);
}

// =============================================================================
// Complete
// =============================================================================

#[tokio::test]
async fn higher_attacker_score_wins_and_takes_the_territory() {
    let h = harness();
    let (attacker, defender) = (FactionId::new(), FactionId::new());
    let territory = h.territory(Some(defender)).await;
    let war = h
        .ongoing_war(WarDeclaration::new(attacker, defender).over_territory(territory.id))
        .await;
    let battle = h.active_battle(war.id, BattleType::Siege).await;
    h.engine.battles().update_score(battle.id, 150, 100).await.unwrap();

    let done = h.engine.wars().complete(war.id).await.unwrap();

    assert_eq!(done.status, WarStatus::Completed);
    assert_eq!(done.phase, WarPhase::Completed);
    assert_eq!(done.winner_faction_id, Some(attacker));
    assert_eq!(done.end_time, Some(h.clock.now()));
    let territory = h.engine.territories().get(territory.id).await.unwrap();
    assert_eq!(territory.owner_faction_id, Some(attacker));

    let completed = h.events.of_type(EventType::WarCompleted);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].details["territory_transferred"], serde_json::json!(true));
    assert_eq!(completed[0].details["attacker_score"], serde_json::json!(150));
    assert_eq!(h.metrics.get(Counter::WarsCompleted), 1);
}

#[tokio::test]
async fn higher_defender_score_wins() {
    let h = harness();
    let (attacker, defender) = (FactionId::new(), FactionId::new());
    let war = h.ongoing_war(WarDeclaration::new(attacker, defender)).await;
    let battle = h.active_battle(war.id, BattleType::Other).await;
    h.engine.battles().update_score(battle.id, 1, 2).await.unwrap();

    let done = h.engine.wars().complete(war.id).await.unwrap();

    assert_eq!(done.winner_faction_id, Some(defender));
}

#[tokio::test]
async fn tie_has_no_winner_and_keeps_the_territory_owner() {
    let h = harness();
    let (attacker, defender) = (FactionId::new(), FactionId::new());
    let territory = h.territory(Some(defender)).await;
    let war = h
        .ongoing_war(WarDeclaration::new(attacker, defender).over_territory(territory.id))
        .await;
    let battle = h.active_battle(war.id, BattleType::Territory).await;
    h.engine.battles().update_score(battle.id, 75, 75).await.unwrap();

    let done = h.engine.wars().complete(war.id).await.unwrap();

    assert_eq!(done.winner_faction_id, None);
    let territory = h.engine.territories().get(territory.id).await.unwrap();
    assert_eq!(territory.owner_faction_id, Some(defender));
    let completed = h.events.of_type(EventType::WarCompleted);
    assert_eq!(completed[0].details["territory_transferred"], serde_json::json!(false));
}

#[tokio::test]
async fn completing_twice_leaves_the_final_record_untouched() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;

    let first = h.engine.wars().complete(war.id).await.unwrap();
    h.clock.advance(TimeDelta::hours(1));
    let second = h.engine.wars().complete(war.id).await;

    assert_eq!(second.unwrap_err().to_string(), reason::WAR_CANNOT_BE_COMPLETED);
    assert_eq!(h.war(war.id).await, first);
    assert_eq!(h.metrics.get(Counter::WarsCompleted), 1);
}

#[tokio::test]
async fn declared_war_cannot_be_completed() {
    let h = harness();
    let war = h
        .engine
        .wars()
        .declare(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await
        .unwrap();

    assert_eq!(kind(h.engine.wars().complete(war.id).await), ErrorKind::InvalidState);
}

/// A write another caller commits while an operation is between its read
/// and its write.
enum Interleave {
    CompleteWar(WarId),
    RecordScore(BattleId, ScorePair),
}

/// Delegates to a [`MemoryStore`], optionally refusing territory ownership
/// writes and optionally committing one [`Interleave`] right after the next
/// war or battle read returns.
struct Interleaved {
    inner: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    broken_territories: bool,
    pending: Mutex<Option<Interleave>>,
}

impl Interleaved {
    fn new(inner: Arc<MemoryStore>, clock: Arc<ManualClock>) -> Self {
        Self {
            inner,
            clock,
            broken_territories: false,
            pending: Mutex::new(None),
        }
    }

    fn with_broken_territories(mut self) -> Self {
        self.broken_territories = true;
        self
    }

    fn after_next_read(&self, write: Interleave) {
        *self.pending.lock().unwrap() = Some(write);
    }

    async fn interleave(&self) {
        let pending = self.pending.lock().unwrap().take();
        let Some(write) = pending else {
            return;
        };
        let at = self.clock.now();
        match write {
            Interleave::CompleteWar(id) => {
                let war = self.inner.get_war(id).await.unwrap().unwrap();
                let mut done = war.clone();
                done.status = WarStatus::Completed;
                done.phase = WarPhase::Completed;
                done.end_time = Some(at);
                done.updated_at = next_revision(war.updated_at, at);
                self.inner
                    .update_war(&done, WarStatus::Ongoing, war.updated_at)
                    .await
                    .unwrap();
            }
            Interleave::RecordScore(id, scores) => {
                self.inner.record_battle_score(id, scores, at).await.unwrap();
            }
        }
    }
}

#[async_trait]
impl WarfrontStore for Interleaved {
    async fn create_war(&self, war: &War) -> Result<(), StoreError> {
        self.inner.create_war(war).await
    }
    async fn get_war(&self, id: WarId) -> Result<Option<War>, StoreError> {
        let snapshot = self.inner.get_war(id).await;
        self.interleave().await;
        snapshot
    }
    async fn list_wars(&self, filter: &WarFilter, page: PageRequest) -> Result<Page<War>, StoreError> {
        self.inner.list_wars(filter, page).await
    }
    async fn update_war(&self, war: &War, expected: WarStatus, read_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.update_war(war, expected, read_at).await
    }
    async fn create_battle(&self, battle: &Battle) -> Result<(), StoreError> {
        self.inner.create_battle(battle).await
    }
    async fn get_battle(&self, id: BattleId) -> Result<Option<Battle>, StoreError> {
        let snapshot = self.inner.get_battle(id).await;
        self.interleave().await;
        snapshot
    }
    async fn list_battles(&self, filter: &BattleFilter, page: PageRequest) -> Result<Page<Battle>, StoreError> {
        self.inner.list_battles(filter, page).await
    }
    async fn update_battle(
        &self,
        battle: &Battle,
        expected: BattleStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.update_battle(battle, expected, read_at).await
    }
    async fn record_battle_score(
        &self,
        id: BattleId,
        scores: ScorePair,
        at: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        self.inner.record_battle_score(id, scores, at).await
    }
    async fn battles_for_war(&self, war: WarId) -> Result<Vec<Battle>, StoreError> {
        self.inner.battles_for_war(war).await
    }
    async fn battle_tally(&self, war: WarId) -> Result<BattleTally, StoreError> {
        self.inner.battle_tally(war).await
    }
    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, StoreError> {
        self.inner.get_territory(id).await
    }
    async fn list_territories(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, StoreError> {
        self.inner.list_territories(owner, page).await
    }
    async fn update_territory_owner(
        &self,
        id: TerritoryId,
        owner: FactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.broken_territories {
            return Err(StoreError::Backend(String::from("territory table unavailable")));
        }
        self.inner.update_territory_owner(id, owner, at).await
    }
}

impl Harness {
    /// A second engine over the same tables, reading through `store`.
    fn engine_over(&self, store: Arc<Interleaved>) -> Engine {
        Engine::new(store)
            .with_publisher(self.events.clone())
            .with_metrics(self.metrics.clone())
            .with_clock(self.clock.clone())
    }

    fn interleaved(&self) -> Interleaved {
        Interleaved::new(self.store.clone(), self.clock.clone())
    }
}

#[tokio::test]
async fn failed_territory_transfer_does_not_fail_completion() {
    let h = harness();
    let broken = h.engine_over(Arc::new(h.interleaved().with_broken_territories()));
    let (attacker, defender) = (FactionId::new(), FactionId::new());
    let territory = h.territory(Some(defender)).await;
    let war = h
        .ongoing_war(WarDeclaration::new(attacker, defender).over_territory(territory.id))
        .await;
    let battle = h.active_battle(war.id, BattleType::Territory).await;
    h.engine.battles().update_score(battle.id, 9, 1).await.unwrap();

    let done = broken.wars().complete(war.id).await.unwrap();

    assert_eq!(done.status, WarStatus::Completed);
    assert_eq!(done.winner_faction_id, Some(attacker));
    let territory = h.engine.territories().get(territory.id).await.unwrap();
    assert_eq!(territory.owner_faction_id, Some(defender));
    let completed = h.events.of_type(EventType::WarCompleted);
    assert_eq!(completed[0].details["territory_transferred"], serde_json::json!(false));
}

#[tokio::test]
async fn score_landing_during_completion_is_counted_in_the_result() {
    let h = harness();
    let (attacker, defender) = (FactionId::new(), FactionId::new());
    let war = h.ongoing_war(WarDeclaration::new(attacker, defender)).await;
    let battle = h.active_battle(war.id, BattleType::Siege).await;
    let store = Arc::new(h.interleaved());
    let engine = h.engine_over(store.clone());

    // Completion reads a 0:0 war, then a 1:0 score commits before it writes.
    store.after_next_read(Interleave::RecordScore(battle.id, ScorePair::new(1, 0)));
    let done = engine.wars().complete(war.id).await.unwrap();

    assert_eq!(done.status, WarStatus::Completed);
    assert_eq!(done.scores(), ScorePair::new(1, 0));
    assert_eq!(done.winner_faction_id, Some(attacker));
    let stored = h.war(war.id).await;
    assert_eq!(stored.winner_faction_id, Some(attacker));
    assert_eq!(stored.updated_at, done.updated_at);
    assert_eq!(h.events.of_type(EventType::WarCompleted).len(), 1);
}

// =============================================================================
// Battles
// =============================================================================

#[tokio::test]
async fn war_completed_while_a_battle_is_planned_gets_no_battle() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let store = Arc::new(h.interleaved());
    let engine = h.engine_over(store.clone());

    // Creation sees the war ongoing, then the war completes before the insert.
    store.after_next_read(Interleave::CompleteWar(war.id));
    let plan = BattlePlan::new(war.id, BattleType::Siege, h.clock.now());
    let err = engine.battles().create(plan).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(err.to_string(), reason::WAR_NOT_ACTIVE);
    assert_eq!(h.war(war.id).await.status, WarStatus::Completed);
    let details = h.engine.wars().details(war.id).await.unwrap();
    assert!(details.battles.is_empty());
    assert!(h.events.of_type(EventType::BattleCreated).is_empty());
    assert_eq!(h.metrics.snapshot().total_battles(), 0);
}

#[tokio::test]
async fn score_landing_during_battle_completion_is_frozen_in() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let battle = h.active_battle(war.id, BattleType::Territory).await;
    let store = Arc::new(h.interleaved());
    let engine = h.engine_over(store.clone());

    store.after_next_read(Interleave::RecordScore(battle.id, ScorePair::new(3, 2)));
    let done = engine.battles().complete(battle.id).await.unwrap();

    assert_eq!(done.status, BattleStatus::Completed);
    assert_eq!(done.scores(), ScorePair::new(3, 2));
    assert_eq!(h.war(war.id).await.scores(), ScorePair::new(3, 2));
    let completed = h.events.of_type(EventType::BattleCompleted);
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].details["attacker_score"], serde_json::json!(3));
}

#[tokio::test]
async fn battles_need_an_ongoing_war() {
    let h = harness();
    let declared = h
        .engine
        .wars()
        .declare(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await
        .unwrap();
    let completed = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    h.engine.wars().complete(completed.id).await.unwrap();
    let mut cancelled = h.war(declared.id).await;
    cancelled.id = WarId::new();
    cancelled.status = WarStatus::Cancelled;
    cancelled.end_time = Some(h.clock.now());
    h.store.create_war(&cancelled).await.unwrap();

    for war_id in [declared.id, completed.id, cancelled.id] {
        let plan = BattlePlan::new(war_id, BattleType::Siege, h.clock.now());
        let result = h.engine.battles().create(plan).await;
        assert_eq!(result.unwrap_err().to_string(), reason::WAR_NOT_ACTIVE);
    }

    let all = h
        .engine
        .battles()
        .list(BattleFilter::default(), h.page(20, 0))
        .await
        .unwrap();
    assert_eq!(all.total, 0);
    assert_eq!(h.metrics.snapshot().total_battles(), 0);
}

#[tokio::test]
async fn battle_for_unknown_war_or_territory_is_not_found() {
    let h = harness();
    let plan = BattlePlan::new(WarId::new(), BattleType::Other, h.clock.now());
    assert_eq!(kind(h.engine.battles().create(plan).await), ErrorKind::NotFound);

    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let plan = BattlePlan::new(war.id, BattleType::Territory, h.clock.now())
        .over_territory(TerritoryId::new());
    assert_eq!(kind(h.engine.battles().create(plan).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn battle_start_is_time_gated_and_single_shot() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let plan = BattlePlan::new(war.id, BattleType::Siege, h.clock.now() + TimeDelta::minutes(30));
    let battle = h.engine.battles().create(plan).await.unwrap();
    assert_eq!(battle.status, BattleStatus::Scheduled);
    assert_eq!(h.metrics.get(Counter::BattlesCreated(BattleType::Siege)), 1);

    assert!(matches!(
        h.engine.battles().start(battle.id).await,
        Err(EngineError::TooEarly { .. })
    ));
    h.clock.advance(TimeDelta::minutes(30));
    let started = h.engine.battles().start(battle.id).await.unwrap();
    assert_eq!(started.status, BattleStatus::Active);
    assert_eq!(
        h.engine.battles().start(battle.id).await.unwrap_err().to_string(),
        reason::BATTLE_NOT_SCHEDULED
    );
}

#[tokio::test]
async fn score_update_raises_war_totals_by_exactly_the_delta() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let other = h.active_battle(war.id, BattleType::Other).await;
    h.engine.battles().update_score(other.id, 3, 4).await.unwrap();
    let battle = h.active_battle(war.id, BattleType::Siege).await;
    let before = h.war(war.id).await.scores();

    h.engine.battles().update_score(battle.id, 10, 5).await.unwrap();

    let after = h.war(war.id).await.scores();
    assert_eq!(after, before.saturating_add(ScorePair::new(10, 5)));

    // Re-sending the same absolute scores must not double count.
    h.engine.battles().update_score(battle.id, 10, 5).await.unwrap();
    assert_eq!(h.war(war.id).await.scores(), after);

    let details = h.engine.wars().details(war.id).await.unwrap();
    assert_eq!(ScoreAggregator::sum(&details.battles), after);

    let updates = h.events.of_type(EventType::BattleScoreUpdated);
    let last = updates.last().unwrap();
    assert_eq!(last.details["war_attacker_score"], serde_json::json!(13));
    assert_eq!(last.details["war_defender_score"], serde_json::json!(9));
}

#[tokio::test]
async fn lowering_a_battle_score_is_rejected() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let battle = h.active_battle(war.id, BattleType::Siege).await;
    h.engine.battles().update_score(battle.id, 10, 5).await.unwrap();

    let result = h.engine.battles().update_score(battle.id, 8, 5).await;

    assert_eq!(kind(result), ErrorKind::InvalidInput);
    assert_eq!(h.war(war.id).await.scores(), ScorePair::new(10, 5));
}

#[tokio::test]
async fn scores_only_change_while_the_battle_is_active() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let plan = BattlePlan::new(war.id, BattleType::Siege, h.clock.now());
    let scheduled = h.engine.battles().create(plan).await.unwrap();
    assert_eq!(
        h.engine.battles().update_score(scheduled.id, 1, 1).await.unwrap_err().to_string(),
        reason::BATTLE_NOT_ACTIVE
    );
    assert_eq!(
        kind(h.engine.battles().complete(scheduled.id).await),
        ErrorKind::InvalidState
    );

    let active = h.active_battle(war.id, BattleType::Siege).await;
    h.engine.battles().update_score(active.id, 4, 4).await.unwrap();
    let done = h.engine.battles().complete(active.id).await.unwrap();
    assert_eq!(done.status, BattleStatus::Completed);
    assert_eq!(done.end_time, Some(h.clock.now()));
    assert_eq!(kind(h.engine.battles().update_score(active.id, 9, 9).await), ErrorKind::InvalidState);
    assert_eq!(h.war(war.id).await.scores(), ScorePair::new(4, 4));

    assert_eq!(kind(h.engine.battles().update_score(BattleId::new(), 1, 1).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn score_update_survives_a_missing_parent_war() {
    let h = harness();
    let orphan = Battle {
        id: BattleId::new(),
        war_id: WarId::new(),
        battle_type: BattleType::Other,
        territory_id: None,
        status: BattleStatus::Active,
        attacker_score: 0,
        defender_score: 0,
        start_time: h.clock.now(),
        end_time: None,
        created_at: h.clock.now(),
        updated_at: h.clock.now(),
    };
    h.store.insert_battle(orphan.clone()).await;

    let updated = h.engine.battles().update_score(orphan.id, 6, 2).await.unwrap();

    assert_eq!(updated.scores(), ScorePair::new(6, 2));
    let event = h.events.of_type(EventType::BattleScoreUpdated).pop().unwrap();
    assert_eq!(event.details["war_attacker_score"], serde_json::Value::Null);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_sibling_battles_lose_nothing() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let mut battles = Vec::new();
    for _ in 0..10 {
        battles.push(h.active_battle(war.id, BattleType::Siege).await);
    }

    let updates: Vec<_> = battles
        .iter()
        .zip(1_u32..)
        .map(|(battle, points)| {
            let engine = h.engine.clone();
            let id = battle.id;
            tokio::spawn(async move { engine.battles().update_score(id, points, 1).await })
        })
        .collect();
    for result in futures::future::join_all(updates).await {
        result.unwrap().unwrap();
    }

    assert_eq!(h.war(war.id).await.scores(), ScorePair::new(55, 10));
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn listing_pages_through_a_factions_wars() {
    let h = harness();
    let faction = FactionId::new();
    for _ in 0..5 {
        h.engine
            .wars()
            .declare(WarDeclaration::new(faction, FactionId::new()))
            .await
            .unwrap();
    }
    h.engine
        .wars()
        .declare(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await
        .unwrap();

    let filter = WarFilter {
        faction: Some(faction),
        status: None,
    };
    let first = h.engine.wars().list(filter, h.page(3, 0)).await.unwrap();
    let second = h.engine.wars().list(filter, h.page(3, 3)).await.unwrap();

    assert_eq!((first.items.len(), first.total), (3, 5));
    assert_eq!((second.items.len(), second.total), (2, 5));
    let mut seen: Vec<WarId> = first.items.iter().chain(&second.items).map(|w| w.id).collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn faction_filter_matches_either_side() {
    let h = harness();
    let faction = FactionId::new();
    h.ongoing_war(WarDeclaration::new(faction, FactionId::new())).await;
    h.ongoing_war(WarDeclaration::new(FactionId::new(), faction)).await;
    h.engine
        .wars()
        .declare(WarDeclaration::new(faction, FactionId::new()))
        .await
        .unwrap();

    let active = h
        .engine
        .wars()
        .active_for_faction(faction, h.page(20, 0))
        .await
        .unwrap();
    assert_eq!(active.total, 2);
    assert!(active.items.iter().all(|w| w.status == WarStatus::Ongoing && w.is_belligerent(faction)));

    let everything = h
        .engine
        .wars()
        .list(WarFilter { faction: Some(faction), status: None }, h.page(20, 0))
        .await
        .unwrap();
    assert_eq!(everything.total, 3);
}

#[tokio::test]
async fn statistics_count_battles_by_status() {
    let h = harness();
    let war = h
        .ongoing_war(WarDeclaration::new(FactionId::new(), FactionId::new()))
        .await;
    let plan = BattlePlan::new(war.id, BattleType::Siege, h.clock.now() + TimeDelta::days(1));
    h.engine.battles().create(plan).await.unwrap();
    let active = h.active_battle(war.id, BattleType::Territory).await;
    h.engine.battles().update_score(active.id, 7, 3).await.unwrap();
    let finished = h.active_battle(war.id, BattleType::Other).await;
    h.engine.battles().update_score(finished.id, 1, 2).await.unwrap();
    h.engine.battles().complete(finished.id).await.unwrap();

    let stats = h.engine.wars().statistics(war.id).await.unwrap();

    assert_eq!(stats.total_battles, 3);
    assert_eq!(stats.battles, BattleTally { scheduled: 1, active: 1, completed: 1 });
    assert_eq!(stats.scores, ScorePair::new(8, 5));
    assert_eq!(stats.status, WarStatus::Ongoing);

    let details = h.engine.wars().details(war.id).await.unwrap();
    assert_eq!(details.battles.len(), 3);
    let completed = h
        .engine
        .battles()
        .list(
            BattleFilter { war: Some(war.id), status: Some(BattleStatus::Completed) },
            h.page(20, 0),
        )
        .await
        .unwrap();
    assert_eq!(completed.items.len(), 1);
    assert_eq!(completed.items[0].id, finished.id);
}

#[tokio::test]
async fn nil_and_unknown_identifiers_are_distinguished() {
    let h = harness();
    let wars = h.engine.wars();
    let battles = h.engine.battles();
    let territories = h.engine.territories();

    assert_eq!(wars.get(WarId::nil()).await.unwrap_err().to_string(), "invalid war ID");
    assert_eq!(kind(wars.start(WarId::nil()).await), ErrorKind::InvalidInput);
    assert_eq!(kind(wars.complete(WarId::nil()).await), ErrorKind::InvalidInput);
    assert_eq!(kind(wars.details(WarId::nil()).await), ErrorKind::InvalidInput);
    assert_eq!(kind(wars.statistics(WarId::nil()).await), ErrorKind::InvalidInput);
    assert_eq!(kind(wars.get(WarId::new()).await), ErrorKind::NotFound);
    assert_eq!(kind(wars.statistics(WarId::new()).await), ErrorKind::NotFound);

    assert_eq!(battles.get(BattleId::nil()).await.unwrap_err().to_string(), "invalid battle ID");
    assert_eq!(kind(battles.get(BattleId::new()).await), ErrorKind::NotFound);

    assert_eq!(
        territories.get(TerritoryId::nil()).await.unwrap_err().to_string(),
        "invalid territory ID"
    );
    assert_eq!(kind(territories.get(TerritoryId::new()).await), ErrorKind::NotFound);
}

#[tokio::test]
async fn territories_list_by_owner() {
    let h = harness();
    let owner = FactionId::new();
    h.territory(Some(owner)).await;
    h.territory(Some(owner)).await;
    h.territory(None).await;

    let owned = h.engine.territories().list(Some(owner), h.page(20, 0)).await.unwrap();
    let all = h.engine.territories().list(None, h.page(1, 0)).await.unwrap();

    assert_eq!(owned.total, 2);
    assert_eq!((all.items.len(), all.total), (1, 3));
}

#[tokio::test]
async fn ownership_transfer_is_idempotent() {
    let h = harness();
    let territory = h.territory(None).await;
    let owner = FactionId::new();

    h.engine.territories().transfer_ownership(territory.id, owner).await.unwrap();
    h.engine.territories().transfer_ownership(territory.id, owner).await.unwrap();

    let stored = h.engine.territories().get(territory.id).await.unwrap();
    assert_eq!(stored.owner_faction_id, Some(owner));
    assert_eq!(
        kind(h.engine.territories().transfer_ownership(TerritoryId::new(), owner).await),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn out_of_range_windows_are_invalid_input() {
    let h = harness();
    assert_eq!(kind(h.engine.page(Some(0), None)), ErrorKind::InvalidInput);
    assert_eq!(kind(h.engine.page(Some(101), None)), ErrorKind::InvalidInput);
    assert_eq!(kind(h.engine.page(None, Some(-1))), ErrorKind::InvalidInput);
}

// =============================================================================
// End to end
// =============================================================================

#[tokio::test]
async fn war_over_territory_end_to_end() {
    let h = harness();
    let (a, b) = (FactionId::new(), FactionId::new());
    let territory = h.territory(Some(b)).await;

    let war = h
        .engine
        .wars()
        .declare(WarDeclaration::new(a, b).over_territory(territory.id))
        .await
        .unwrap();
    h.clock.advance(TimeDelta::hours(24));
    h.engine.wars().start(war.id).await.unwrap();
    let plan = BattlePlan::new(war.id, BattleType::Territory, h.clock.now())
        .over_territory(territory.id);
    let battle = h.engine.battles().create(plan).await.unwrap();
    h.engine.battles().start(battle.id).await.unwrap();
    h.engine.battles().update_score(battle.id, 20, 5).await.unwrap();
    h.engine.battles().complete(battle.id).await.unwrap();
    let done = h.engine.wars().complete(war.id).await.unwrap();

    assert_eq!(done.scores(), ScorePair::new(20, 5));
    assert_eq!(done.winner_faction_id, Some(a));
    let territory = h.engine.territories().get(territory.id).await.unwrap();
    assert_eq!(territory.owner_faction_id, Some(a));

    assert_eq!(
        h.events.types(),
        vec![
            EventType::WarDeclared,
            EventType::WarStarted,
            EventType::BattleCreated,
            EventType::BattleStarted,
            EventType::BattleScoreUpdated,
            EventType::BattleCompleted,
            EventType::WarCompleted,
        ]
    );
    let battle_events = h
        .events
        .events()
        .into_iter()
        .filter(|e| e.battle_id.is_some())
        .count();
    assert_eq!(battle_events, 4);

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.wars_declared, 1);
    assert_eq!(snapshot.wars_completed, 1);
    assert_eq!(snapshot.battles_of(BattleType::Territory), 1);
}
