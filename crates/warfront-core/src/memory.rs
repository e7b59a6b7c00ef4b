//! In-process [`WarfrontStore`] for embedding and tests.
//!
//! All tables sit behind one [`RwLock`]. Writers take the lock exclusively,
//! so compare-and-set transitions and score aggregation are serialized the
//! same way row locks serialize them in `PostgreSQL`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use warfront_types::{
    Battle, BattleId, BattleStatus, BattleTally, FactionId, Page, ScorePair, Territory,
    TerritoryId, War, WarId, WarStatus,
};

use crate::error::reason;
use crate::pagination::PageRequest;
use crate::store::{
    BattleFilter, ScoreRecord, StoreError, WarAggregation, WarFilter, WarfrontStore,
    next_revision,
};

#[derive(Debug, Default)]
struct Tables {
    wars: BTreeMap<WarId, War>,
    battles: BTreeMap<BattleId, Battle>,
    territories: BTreeMap<TerritoryId, Territory>,
}

impl Tables {
    fn war_totals(&self, war: WarId) -> ScorePair {
        self.battles
            .values()
            .filter(|b| b.war_id == war)
            .fold(ScorePair::default(), |acc, b| acc.saturating_add(b.scores()))
    }
}

/// A [`WarfrontStore`] backed by ordered maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a territory. Territories are provisioned out of band.
    pub async fn insert_territory(&self, territory: Territory) {
        self.tables
            .write()
            .await
            .territories
            .insert(territory.id, territory);
    }

    /// Load a battle as-is, skipping the parent-war check of
    /// [`WarfrontStore::create_battle`]. For restoring snapshots.
    pub async fn insert_battle(&self, battle: Battle) {
        self.tables.write().await.battles.insert(battle.id, battle);
    }
}

/// Sort newest first and cut the requested window out of the matches.
fn paginate<T: Clone>(
    mut matches: Vec<&T>,
    key: impl Fn(&T) -> (DateTime<Utc>, uuid::Uuid),
    page: PageRequest,
) -> Page<T> {
    matches.sort_by(|a, b| key(b).cmp(&key(a)));
    let total = u64::try_from(matches.len()).unwrap_or(u64::MAX);
    Page::new(page.slice(matches.into_iter().cloned()), total)
}

#[async_trait]
impl WarfrontStore for MemoryStore {
    async fn create_war(&self, war: &War) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.wars.contains_key(&war.id) {
            return Err(StoreError::Conflict(format!("war {} already exists", war.id)));
        }
        tables.wars.insert(war.id, war.clone());
        Ok(())
    }

    async fn get_war(&self, id: WarId) -> Result<Option<War>, StoreError> {
        Ok(self.tables.read().await.wars.get(&id).cloned())
    }

    async fn list_wars(
        &self,
        filter: &WarFilter,
        page: PageRequest,
    ) -> Result<Page<War>, StoreError> {
        let tables = self.tables.read().await;
        let matches = tables.wars.values().filter(|w| filter.matches(w)).collect();
        Ok(paginate(matches, |w| (w.created_at, w.id.into_inner()), page))
    }

    async fn update_war(
        &self,
        war: &War,
        expected: WarStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.wars.get_mut(&war.id) {
            Some(stored) if stored.status == expected && stored.updated_at == read_at => {
                *stored = war.clone();
                Ok(())
            }
            Some(stored) if stored.status == expected => Err(StoreError::Conflict(format!(
                "war {} was modified concurrently",
                war.id
            ))),
            Some(stored) => Err(StoreError::Conflict(format!(
                "war {} is {}, expected {expected}",
                war.id, stored.status
            ))),
            None => Err(StoreError::Conflict(format!("war {} no longer exists", war.id))),
        }
    }

    async fn create_battle(&self, battle: &Battle) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.battles.contains_key(&battle.id) {
            return Err(StoreError::Conflict(format!(
                "battle {} already exists",
                battle.id
            )));
        }
        let parent = tables.wars.get(&battle.war_id).map(|w| w.status);
        if parent != Some(WarStatus::Ongoing) {
            return Err(StoreError::Conflict(String::from(reason::WAR_NOT_ACTIVE)));
        }
        tables.battles.insert(battle.id, battle.clone());
        Ok(())
    }

    async fn get_battle(&self, id: BattleId) -> Result<Option<Battle>, StoreError> {
        Ok(self.tables.read().await.battles.get(&id).cloned())
    }

    async fn list_battles(
        &self,
        filter: &BattleFilter,
        page: PageRequest,
    ) -> Result<Page<Battle>, StoreError> {
        let tables = self.tables.read().await;
        let matches = tables
            .battles
            .values()
            .filter(|b| filter.matches(b))
            .collect();
        Ok(paginate(matches, |b| (b.created_at, b.id.into_inner()), page))
    }

    async fn update_battle(
        &self,
        battle: &Battle,
        expected: BattleStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.battles.get_mut(&battle.id) {
            Some(stored) if stored.status == expected && stored.updated_at == read_at => {
                *stored = battle.clone();
                Ok(())
            }
            Some(stored) if stored.status == expected => Err(StoreError::Conflict(format!(
                "battle {} was modified concurrently",
                battle.id
            ))),
            Some(stored) => Err(StoreError::Conflict(format!(
                "battle {} is {}, expected {expected}",
                battle.id, stored.status
            ))),
            None => Err(StoreError::Conflict(format!(
                "battle {} no longer exists",
                battle.id
            ))),
        }
    }

    async fn record_battle_score(
        &self,
        id: BattleId,
        scores: ScorePair,
        at: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(battle) = tables.battles.get_mut(&id) else {
            return Ok(None);
        };
        if battle.status != BattleStatus::Active {
            return Err(StoreError::Conflict(String::from(reason::BATTLE_NOT_ACTIVE)));
        }
        if !scores.dominates(battle.scores()) {
            return Err(StoreError::Conflict(String::from(
                reason::SCORES_CANNOT_DECREASE,
            )));
        }
        battle.attacker_score = scores.attacker;
        battle.defender_score = scores.defender;
        battle.updated_at = next_revision(battle.updated_at, at);
        let battle = battle.clone();

        let totals = tables.war_totals(battle.war_id);
        let war = match tables.wars.get_mut(&battle.war_id) {
            None => WarAggregation::WarMissing,
            Some(war) if war.status != WarStatus::Ongoing => WarAggregation::WarClosed(war.status),
            Some(war) => {
                war.attacker_score = totals.attacker;
                war.defender_score = totals.defender;
                war.updated_at = next_revision(war.updated_at, at);
                WarAggregation::Updated(totals)
            }
        };
        Ok(Some(ScoreRecord { battle, war }))
    }

    async fn battles_for_war(&self, war: WarId) -> Result<Vec<Battle>, StoreError> {
        let tables = self.tables.read().await;
        let mut battles: Vec<Battle> = tables
            .battles
            .values()
            .filter(|b| b.war_id == war)
            .cloned()
            .collect();
        battles.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(battles)
    }

    async fn battle_tally(&self, war: WarId) -> Result<BattleTally, StoreError> {
        let tables = self.tables.read().await;
        let mut tally = BattleTally::default();
        for battle in tables.battles.values().filter(|b| b.war_id == war) {
            tally.record(battle.status);
        }
        Ok(tally)
    }

    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, StoreError> {
        Ok(self.tables.read().await.territories.get(&id).cloned())
    }

    async fn list_territories(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, StoreError> {
        let tables = self.tables.read().await;
        let matches = tables
            .territories
            .values()
            .filter(|t| owner.is_none_or(|o| t.owner_faction_id == Some(o)))
            .collect();
        Ok(paginate(matches, |t| (t.created_at, t.id.into_inner()), page))
    }

    async fn update_territory_owner(
        &self,
        id: TerritoryId,
        owner: FactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(territory) = tables.territories.get_mut(&id) else {
            return Ok(false);
        };
        territory.owner_faction_id = Some(owner);
        territory.updated_at = next_revision(territory.updated_at, at);
        Ok(true)
    }
}
