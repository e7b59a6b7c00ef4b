//! Core entity structs: wars, battles, territories, and read models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{BattleStatus, BattleType, WarPhase, WarStatus};
use crate::ids::{BattleId, FactionId, TerritoryId, WarId};

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Attacker and defender score, as one value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ScorePair {
    /// Points credited to the attacking side.
    pub attacker: u32,
    /// Points credited to the defending side.
    pub defender: u32,
}

impl ScorePair {
    /// Construct a score pair.
    pub const fn new(attacker: u32, defender: u32) -> Self {
        Self { attacker, defender }
    }

    /// Component-wise saturating sum.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            attacker: self.attacker.saturating_add(other.attacker),
            defender: self.defender.saturating_add(other.defender),
        }
    }

    /// Whether neither side is lower than in `previous`.
    pub const fn dominates(self, previous: Self) -> bool {
        self.attacker >= previous.attacker && self.defender >= previous.defender
    }
}

// ---------------------------------------------------------------------------
// War
// ---------------------------------------------------------------------------

/// A declared conflict between two factions, optionally over a territory.
///
/// Invariants (enforced by the lifecycle manager and by table constraints):
/// - `attacker_faction_id != defender_faction_id`
/// - `winner_faction_id`, when set, is the attacker or the defender
/// - `end_time` is set iff `status` is terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct War {
    /// War identifier.
    pub id: WarId,
    /// The faction that declared the war.
    pub attacker_faction_id: FactionId,
    /// The faction the war was declared on.
    pub defender_faction_id: FactionId,
    /// Allied factions. Order carries no meaning.
    pub ally_faction_ids: BTreeSet<FactionId>,
    /// Lifecycle status.
    pub status: WarStatus,
    /// Progress marker within the status.
    pub phase: WarPhase,
    /// Territory at stake, if any.
    pub territory_id: Option<TerritoryId>,
    /// Running attacker total (sum over battles).
    pub attacker_score: u32,
    /// Running defender total (sum over battles).
    pub defender_score: u32,
    /// Winner, set at completion. `None` on a tie or before completion.
    pub winner_faction_id: Option<FactionId>,
    /// Earliest moment the war may be started.
    pub start_time: DateTime<Utc>,
    /// When the war reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl War {
    /// Whether `faction` is the attacker or the defender.
    pub fn is_belligerent(&self, faction: FactionId) -> bool {
        self.attacker_faction_id == faction || self.defender_faction_id == faction
    }

    /// Current totals as a [`ScorePair`].
    pub const fn scores(&self) -> ScorePair {
        ScorePair::new(self.attacker_score, self.defender_score)
    }

    /// Decide the winner by score comparison. Equal scores are a tie.
    pub fn decide_winner(&self) -> Option<FactionId> {
        match self.attacker_score.cmp(&self.defender_score) {
            core::cmp::Ordering::Greater => Some(self.attacker_faction_id),
            core::cmp::Ordering::Less => Some(self.defender_faction_id),
            core::cmp::Ordering::Equal => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Battle
// ---------------------------------------------------------------------------

/// A bounded sub-contest inside a war. Owned by exactly one war.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Battle {
    /// Battle identifier.
    pub id: BattleId,
    /// Parent war. Never reassigned.
    pub war_id: WarId,
    /// Kind of engagement.
    pub battle_type: BattleType,
    /// Territory fought over, if any.
    pub territory_id: Option<TerritoryId>,
    /// Lifecycle status.
    pub status: BattleStatus,
    /// Current attacker score (absolute).
    pub attacker_score: u32,
    /// Current defender score (absolute).
    pub defender_score: u32,
    /// Earliest moment the battle may be started.
    pub start_time: DateTime<Utc>,
    /// When the battle completed.
    pub end_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Battle {
    /// Current scores as a [`ScorePair`].
    pub const fn scores(&self) -> ScorePair {
        ScorePair::new(self.attacker_score, self.defender_score)
    }
}

// ---------------------------------------------------------------------------
// Territory
// ---------------------------------------------------------------------------

/// A contestable location with an optional owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Territory {
    /// Territory identifier.
    pub id: TerritoryId,
    /// Display name.
    pub name: String,
    /// Region the territory belongs to.
    pub region: String,
    /// Current owner. `None` means neutral.
    pub owner_faction_id: Option<FactionId>,
    /// How hard the territory is to hold.
    pub defense_rating: u32,
    /// How hard the territory is to besiege.
    pub siege_difficulty: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// One window of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records inside the requested window.
    pub items: Vec<T>,
    /// Number of records matching the filter, ignoring the window.
    pub total: u64,
}

impl<T> Page<T> {
    /// Build a page from its items and the unwindowed total.
    pub const fn new(items: Vec<T>, total: u64) -> Self {
        Self { items, total }
    }
}

/// Battle counts for a single war, by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BattleTally {
    /// Battles still waiting to start.
    pub scheduled: u64,
    /// Battles in progress.
    pub active: u64,
    /// Finished battles.
    pub completed: u64,
}

impl BattleTally {
    /// Total number of battles.
    pub const fn total(&self) -> u64 {
        self.scheduled
            .saturating_add(self.active)
            .saturating_add(self.completed)
    }

    /// Count one more battle with the given status.
    pub const fn record(&mut self, status: BattleStatus) {
        match status {
            BattleStatus::Scheduled => self.scheduled = self.scheduled.saturating_add(1),
            BattleStatus::Active => self.active = self.active.saturating_add(1),
            BattleStatus::Completed => self.completed = self.completed.saturating_add(1),
        }
    }
}

/// Aggregated view of a war's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WarStatistics {
    /// The war described.
    pub war_id: WarId,
    /// War status at the time of the query.
    pub status: WarStatus,
    /// Number of battles ever created under the war.
    pub total_battles: u64,
    /// Battles by status.
    pub battles: BattleTally,
    /// The war's authoritative totals.
    pub scores: ScorePair,
}

/// A war together with every battle fought under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WarDetails {
    /// The war record.
    pub war: War,
    /// Its battles, newest first.
    pub battles: Vec<Battle>,
}
