//! [`WarfrontStore`] implementation over the `PostgreSQL` table stores.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use warfront_core::pagination::PageRequest;
use warfront_core::store::{
    BattleFilter, ScoreRecord, StoreError, WarFilter, WarfrontStore,
};
use warfront_types::{
    Battle, BattleId, BattleStatus, BattleTally, FactionId, Page, ScorePair, Territory,
    TerritoryId, War, WarId, WarStatus,
};

use crate::battle_store::BattleStore;
use crate::postgres::PostgresPool;
use crate::territory_store::TerritoryStore;
use crate::war_store::WarStore;

/// The engine's persistence port backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PostgresPool,
}

impl PgStore {
    /// Wrap a connected pool. Migrations are not run here.
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &PostgresPool {
        &self.pool
    }

    const fn wars(&self) -> WarStore<'_> {
        WarStore::new(self.pool.pool())
    }

    const fn battles(&self) -> BattleStore<'_> {
        BattleStore::new(self.pool.pool())
    }

    /// Territory table access, including seeding.
    pub const fn territories(&self) -> TerritoryStore<'_> {
        TerritoryStore::new(self.pool.pool())
    }
}

#[async_trait]
impl WarfrontStore for PgStore {
    async fn create_war(&self, war: &War) -> Result<(), StoreError> {
        Ok(self.wars().insert(war).await?)
    }

    async fn get_war(&self, id: WarId) -> Result<Option<War>, StoreError> {
        Ok(self.wars().get(id.into_inner()).await?)
    }

    async fn list_wars(
        &self,
        filter: &WarFilter,
        page: PageRequest,
    ) -> Result<Page<War>, StoreError> {
        Ok(self.wars().list(filter, page).await?)
    }

    async fn update_war(
        &self,
        war: &War,
        expected: WarStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(self.wars().update_if(war, expected, read_at).await?)
    }

    async fn create_battle(&self, battle: &Battle) -> Result<(), StoreError> {
        Ok(self.battles().insert(battle).await?)
    }

    async fn get_battle(&self, id: BattleId) -> Result<Option<Battle>, StoreError> {
        Ok(self.battles().get(id.into_inner()).await?)
    }

    async fn list_battles(
        &self,
        filter: &BattleFilter,
        page: PageRequest,
    ) -> Result<Page<Battle>, StoreError> {
        Ok(self.battles().list(filter, page).await?)
    }

    async fn update_battle(
        &self,
        battle: &Battle,
        expected: BattleStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Ok(self.battles().update_if(battle, expected, read_at).await?)
    }

    async fn record_battle_score(
        &self,
        id: BattleId,
        scores: ScorePair,
        at: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>, StoreError> {
        Ok(self
            .battles()
            .record_score(id.into_inner(), scores, at)
            .await?)
    }

    async fn battles_for_war(&self, war: WarId) -> Result<Vec<Battle>, StoreError> {
        Ok(self.battles().for_war(war.into_inner()).await?)
    }

    async fn battle_tally(&self, war: WarId) -> Result<BattleTally, StoreError> {
        Ok(self.battles().tally(war.into_inner()).await?)
    }

    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, StoreError> {
        Ok(self.territories().get(id.into_inner()).await?)
    }

    async fn list_territories(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, StoreError> {
        Ok(self.territories().list(owner, page).await?)
    }

    async fn update_territory_owner(
        &self,
        id: TerritoryId,
        owner: FactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.territories().set_owner(id.into_inner(), owner, at).await?)
    }
}
