//! Shared type definitions for the Warfront engine.
//!
//! Every crate in the workspace speaks in these types: the lifecycle
//! managers in `warfront-core`, the `PostgreSQL` adapter in `warfront-db`,
//! and the event publisher in `warfront-nats`. Types flow downstream to
//! `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for wars, battles, territories, factions
//! - [`enums`] -- Status, phase, and battle-type enumerations
//! - [`structs`] -- Entity records and read models
//! - [`events`] -- Domain event envelope and per-type payloads

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BattleStatus, BattleType, UnknownVariant, WarPhase, WarStatus};
pub use events::{
    BattleCompletedDetails, BattleCreatedDetails, BattleScoreUpdatedDetails,
    BattleStartedDetails, Event, EventType, WarCompletedDetails, WarDeclaredDetails,
    WarStartedDetails,
};
pub use ids::{BattleId, EventId, FactionId, TerritoryId, WarId};
pub use structs::{
    Battle, BattleTally, Page, ScorePair, Territory, War, WarDetails, WarStatistics,
};
