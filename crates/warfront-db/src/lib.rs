//! `PostgreSQL` persistence for the Warfront engine.
//!
//! [`PgStore`] implements the engine's `WarfrontStore` port on top of three
//! table stores. Status transitions are compare-and-set updates keyed on
//! `(status, updated_at)`; score recording runs in one transaction that
//! locks the parent war row before touching the battle.
//!
//! ```text
//! Engine
//!     |
//!     +-- WarfrontStore --> PgStore
//!                            |-- WarStore        (wars)
//!                            |-- BattleStore     (battles, score aggregation)
//!                            +-- TerritoryStore  (territories)
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool, configuration and migrations
//! - [`war_store`] -- `wars` table
//! - [`battle_store`] -- `battles` table and transactional score recording
//! - [`territory_store`] -- `territories` table
//! - [`pg_store`] -- The `WarfrontStore` implementation
//! - [`error`] -- Shared error types

pub mod battle_store;
pub mod error;
pub mod pg_store;
pub mod postgres;
pub mod territory_store;
pub mod war_store;

pub use battle_store::{BattleRow, BattleStore};
pub use error::DbError;
pub use pg_store::PgStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use territory_store::{TerritoryRow, TerritoryStore};
pub use war_store::{WarRow, WarStore};
