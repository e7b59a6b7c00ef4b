//! War and battle lifecycle engine.
//!
//! Wars are declared between two factions, wait out a preparation window,
//! are fought as a series of scored battles, and end with a winner decided
//! by score comparison. A territory at stake changes hands when the war
//! completes with a winner.
//!
//! # Modules
//!
//! - [`engine`] -- [`Engine`] facade wiring the collaborators together.
//! - [`war`] -- War lifecycle manager.
//! - [`battle`] -- Battle lifecycle manager.
//! - [`scoring`] -- Transactional aggregation of battle scores into war totals.
//! - [`territory`] -- Territory directory and ownership transfer.
//! - [`store`] -- [`WarfrontStore`] persistence port.
//! - [`memory`] -- In-process [`WarfrontStore`].
//! - [`notify`] -- [`EventPublisher`] port and in-process publishers.
//! - [`metrics`] -- [`MetricsSink`] port and atomic counters.
//! - [`clock`] -- Clock abstraction for time gates.
//! - [`config`] -- YAML configuration.
//! - [`error`] -- [`EngineError`] and stable error kinds.
//! - [`pagination`] -- Validated listing windows.
//!
//! [`Engine`]: engine::Engine
//! [`WarfrontStore`]: store::WarfrontStore
//! [`EventPublisher`]: notify::EventPublisher
//! [`MetricsSink`]: metrics::MetricsSink
//! [`EngineError`]: error::EngineError

pub mod battle;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod notify;
pub mod pagination;
pub mod scoring;
pub mod store;
pub mod territory;
pub mod war;

pub use battle::{BattleLifecycle, BattlePlan};
pub use engine::Engine;
pub use error::{EngineError, ErrorKind};
pub use war::{WarDeclaration, WarLifecycle};
