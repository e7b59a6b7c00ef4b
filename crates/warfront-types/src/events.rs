//! Domain events published after every successful lifecycle transition.
//!
//! An [`Event`] is an envelope: a type tag, the war (and battle) it concerns,
//! a timestamp, and a type-specific `details` payload built from one of the
//! `*Details` structs below. Consumers dispatch on [`EventType::as_str`],
//! which is also the suffix of the NATS subject the event is published on.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::BattleType;
use crate::ids::{BattleId, EventId, FactionId, TerritoryId, WarId};

/// The kind of a domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventType {
    /// A war was declared.
    #[serde(rename = "war.declared")]
    WarDeclared,
    /// A war left its preparation window.
    #[serde(rename = "war.started")]
    WarStarted,
    /// A war was finalized.
    #[serde(rename = "war.completed")]
    WarCompleted,
    /// A battle was scheduled inside an ongoing war.
    #[serde(rename = "battle.created")]
    BattleCreated,
    /// A battle started.
    #[serde(rename = "battle.started")]
    BattleStarted,
    /// A battle reported new scores.
    #[serde(rename = "battle.score_updated")]
    BattleScoreUpdated,
    /// A battle finished.
    #[serde(rename = "battle.completed")]
    BattleCompleted,
}

impl EventType {
    /// Dotted event name, e.g. `war.declared`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WarDeclared => "war.declared",
            Self::WarStarted => "war.started",
            Self::WarCompleted => "war.completed",
            Self::BattleCreated => "battle.created",
            Self::BattleStarted => "battle.started",
            Self::BattleScoreUpdated => "battle.score_updated",
            Self::BattleCompleted => "battle.completed",
        }
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A published domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique event ID.
    pub id: EventId,
    /// What happened.
    pub event_type: EventType,
    /// The war concerned.
    pub war_id: WarId,
    /// The battle concerned, for `battle.*` events.
    pub battle_id: Option<BattleId>,
    /// Type-specific payload (one of the `*Details` structs).
    pub details: serde_json::Value,
    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    /// Build an event, serializing `details` into the payload.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `details` cannot be serialized.
    pub fn new<D: Serialize>(
        event_type: EventType,
        war_id: WarId,
        battle_id: Option<BattleId>,
        details: &D,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: EventId::new(),
            event_type,
            war_id,
            battle_id,
            details: serde_json::to_value(details)?,
            occurred_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Details payloads
// ---------------------------------------------------------------------------

/// Payload of `war.declared`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WarDeclaredDetails {
    /// Declaring faction.
    pub attacker_faction_id: FactionId,
    /// Target faction.
    pub defender_faction_id: FactionId,
    /// Allies named in the declaration.
    pub ally_faction_ids: BTreeSet<FactionId>,
    /// Territory at stake.
    pub territory_id: Option<TerritoryId>,
    /// End of the preparation window.
    pub start_time: DateTime<Utc>,
}

/// Payload of `war.started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WarStartedDetails {
    /// Declaring faction.
    pub attacker_faction_id: FactionId,
    /// Target faction.
    pub defender_faction_id: FactionId,
}

/// Payload of `war.completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WarCompletedDetails {
    /// Final attacker total.
    pub attacker_score: u32,
    /// Final defender total.
    pub defender_score: u32,
    /// Winner, `None` on a tie.
    pub winner_faction_id: Option<FactionId>,
    /// Territory at stake.
    pub territory_id: Option<TerritoryId>,
    /// Whether territory ownership was moved to the winner.
    pub territory_transferred: bool,
}

/// Payload of `battle.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BattleCreatedDetails {
    /// Kind of engagement.
    pub battle_type: BattleType,
    /// Territory fought over.
    pub territory_id: Option<TerritoryId>,
    /// Scheduled start.
    pub start_time: DateTime<Utc>,
}

/// Payload of `battle.started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BattleStartedDetails {
    /// Kind of engagement.
    pub battle_type: BattleType,
}

/// Payload of `battle.score_updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BattleScoreUpdatedDetails {
    /// New battle attacker score.
    pub attacker_score: u32,
    /// New battle defender score.
    pub defender_score: u32,
    /// War attacker total after aggregation, if the war was found.
    pub war_attacker_score: Option<u32>,
    /// War defender total after aggregation, if the war was found.
    pub war_defender_score: Option<u32>,
}

/// Payload of `battle.completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BattleCompletedDetails {
    /// Final attacker score.
    pub attacker_score: u32,
    /// Final defender score.
    pub defender_score: u32,
}
