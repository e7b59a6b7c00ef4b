//! Persistence port for wars, battles, and territories.
//!
//! The lifecycle managers never talk to a database directly. They go
//! through [`WarfrontStore`], which `warfront-db` implements on top of
//! `PostgreSQL` and [`MemoryStore`](crate::memory::MemoryStore) implements
//! in process.
//!
//! # Contract
//!
//! - Absence is `Ok(None)`, never an error.
//! - `update_war` and `update_battle` are compare-and-set on the prior
//!   status and the prior `updated_at`. If either differs (or the row is
//!   gone) they fail with [`StoreError::Conflict`] and write nothing, so a
//!   transition never overwrites a score recorded after it was read.
//! - `create_battle` re-checks that the parent war is `ongoing` in the same
//!   atomic unit as the insert, and fails with [`StoreError::Conflict`]
//!   otherwise.
//! - `record_battle_score` is one atomic unit: the parent war is locked,
//!   the battle's scores are replaced, and the war's totals are recomputed
//!   as the sum over all of its battles.
//! - Listings are ordered newest first (`created_at` descending, then id
//!   descending) and carry the unwindowed match count.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use warfront_types::{
    Battle, BattleId, BattleStatus, BattleTally, FactionId, Page, ScorePair, Territory,
    TerritoryId, War, WarId, WarStatus,
};

use crate::pagination::PageRequest;

/// Compare-and-set attempts a transition makes while only the revision of
/// its record moves under it.
pub const TRANSITION_ATTEMPTS: usize = 5;

/// The `updated_at` to write over a record last modified at `previous`.
///
/// Strictly later than `previous` even when the clock has not moved, so the
/// timestamp doubles as a revision for compare-and-set. Microsecond steps
/// match `PostgreSQL` `TIMESTAMPTZ` precision.
pub fn next_revision(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous
        .checked_add_signed(TimeDelta::microseconds(1))
        .unwrap_or(previous);
    now.max(floor)
}

/// Errors surfaced by a store implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing system failed (connection, query, decoding).
    #[error("store backend error: {0}")]
    Backend(String),

    /// A conditional write found the record in an unexpected state.
    #[error("{0}")]
    Conflict(String),

    /// The record kept changing for [`TRANSITION_ATTEMPTS`] compare-and-set
    /// rounds. Safe to retry.
    #[error("contended: {0}")]
    Contended(String),
}

/// Filter for war listings. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarFilter {
    /// Match wars where this faction is the attacker or the defender.
    pub faction: Option<FactionId>,
    /// Match wars in this status.
    pub status: Option<WarStatus>,
}

impl WarFilter {
    /// Whether `war` passes the filter.
    pub fn matches(&self, war: &War) -> bool {
        self.faction.is_none_or(|f| war.is_belligerent(f))
            && self.status.is_none_or(|s| war.status == s)
    }
}

/// Filter for battle listings. Empty filter matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattleFilter {
    /// Match battles of this war.
    pub war: Option<WarId>,
    /// Match battles in this status.
    pub status: Option<BattleStatus>,
}

impl BattleFilter {
    /// Whether `battle` passes the filter.
    pub fn matches(&self, battle: &Battle) -> bool {
        self.war.is_none_or(|w| battle.war_id == w)
            && self.status.is_none_or(|s| battle.status == s)
    }
}

/// What happened to the parent war while recording a battle score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarAggregation {
    /// The war's totals were recomputed to these values.
    Updated(ScorePair),
    /// The parent war no longer resolves. Totals were not touched.
    WarMissing,
    /// The parent war is not ongoing, so its totals are frozen.
    WarClosed(WarStatus),
}

/// Outcome of [`WarfrontStore::record_battle_score`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreRecord {
    /// The battle after the update.
    pub battle: Battle,
    /// Effect on the parent war.
    pub war: WarAggregation,
}

/// Storage port used by the lifecycle managers.
#[async_trait]
pub trait WarfrontStore: Send + Sync {
    /// Insert a new war.
    async fn create_war(&self, war: &War) -> Result<(), StoreError>;

    /// Fetch a war by id.
    async fn get_war(&self, id: WarId) -> Result<Option<War>, StoreError>;

    /// List wars matching `filter`, newest first.
    async fn list_wars(&self, filter: &WarFilter, page: PageRequest)
    -> Result<Page<War>, StoreError>;

    /// Overwrite a war, provided its stored status is still `expected` and
    /// it has not been modified since `read_at`.
    async fn update_war(
        &self,
        war: &War,
        expected: WarStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert a new battle, provided its war exists and is `ongoing`.
    async fn create_battle(&self, battle: &Battle) -> Result<(), StoreError>;

    /// Fetch a battle by id.
    async fn get_battle(&self, id: BattleId) -> Result<Option<Battle>, StoreError>;

    /// List battles matching `filter`, newest first.
    async fn list_battles(
        &self,
        filter: &BattleFilter,
        page: PageRequest,
    ) -> Result<Page<Battle>, StoreError>;

    /// Overwrite a battle, provided its stored status is still `expected` and
    /// it has not been modified since `read_at`.
    async fn update_battle(
        &self,
        battle: &Battle,
        expected: BattleStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Replace an active battle's scores and re-aggregate its war.
    ///
    /// Fails with [`StoreError::Conflict`] if the battle is not active or
    /// either score would decrease. Returns `Ok(None)` if the battle does
    /// not exist.
    async fn record_battle_score(
        &self,
        id: BattleId,
        scores: ScorePair,
        at: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>, StoreError>;

    /// Every battle of a war, newest first.
    async fn battles_for_war(&self, war: WarId) -> Result<Vec<Battle>, StoreError>;

    /// Battle counts of a war, by status.
    async fn battle_tally(&self, war: WarId) -> Result<BattleTally, StoreError>;

    /// Fetch a territory by id.
    async fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, StoreError>;

    /// List territories, optionally only those held by `owner`, newest first.
    async fn list_territories(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, StoreError>;

    /// Set a territory's owner. Returns `false` if the territory is missing.
    async fn update_territory_owner(
        &self,
        id: TerritoryId,
        owner: FactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn revision_always_moves_forward() {
        let now = Utc::now();
        assert_eq!(next_revision(now, now), now + TimeDelta::microseconds(1));
        let later = now + TimeDelta::seconds(3);
        assert_eq!(next_revision(now, later), later);
    }
}
