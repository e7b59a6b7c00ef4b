//! Counter port for observability backends.
//!
//! The engine only increments counters. Export (Prometheus, `StatsD`, ...)
//! is the embedding application's concern; [`AtomicMetrics`] keeps the
//! counts in process for tests and simple deployments.

use std::sync::atomic::{AtomicU64, Ordering};

use warfront_types::BattleType;

/// A counter the engine increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// A war was declared.
    WarsDeclared,
    /// A war was completed.
    WarsCompleted,
    /// A battle was created, tagged by its type.
    BattlesCreated(BattleType),
}

impl Counter {
    /// Metric name, without tags.
    pub const fn name(self) -> &'static str {
        match self {
            Self::WarsDeclared => "wars_declared",
            Self::WarsCompleted => "wars_completed",
            Self::BattlesCreated(_) => "battles_created",
        }
    }
}

/// Receives counter increments.
pub trait MetricsSink: Send + Sync {
    /// Add one to `counter`.
    fn increment(&self, counter: Counter);
}

/// Discards every increment.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn increment(&self, _counter: Counter) {}
}

const BATTLE_TYPES: usize = BattleType::ALL.len();

fn battle_slot(kind: BattleType) -> Option<usize> {
    BattleType::ALL.iter().position(|k| *k == kind)
}

/// Thread-safe in-process counters.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    wars_declared: AtomicU64,
    wars_completed: AtomicU64,
    battles_created: [AtomicU64; BATTLE_TYPES],
}

/// Point-in-time copy of [`AtomicMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Wars declared.
    pub wars_declared: u64,
    /// Wars completed.
    pub wars_completed: u64,
    /// Battles created, in [`BattleType::ALL`] order.
    pub battles_created: [u64; BATTLE_TYPES],
}

impl MetricsSnapshot {
    /// Battles created of one type.
    pub fn battles_of(&self, kind: BattleType) -> u64 {
        battle_slot(kind)
            .and_then(|i| self.battles_created.get(i))
            .copied()
            .unwrap_or(0)
    }

    /// Battles created of any type.
    pub fn total_battles(&self) -> u64 {
        self.battles_created
            .iter()
            .fold(0, |acc, n| acc.saturating_add(*n))
    }
}

impl AtomicMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, counter: Counter) -> Option<&AtomicU64> {
        match counter {
            Counter::WarsDeclared => Some(&self.wars_declared),
            Counter::WarsCompleted => Some(&self.wars_completed),
            Counter::BattlesCreated(kind) => {
                battle_slot(kind).and_then(|i| self.battles_created.get(i))
            }
        }
    }

    /// Current value of one counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter)
            .map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            wars_declared: self.wars_declared.load(Ordering::Relaxed),
            wars_completed: self.wars_completed.load(Ordering::Relaxed),
            battles_created: BattleType::ALL.map(|kind| self.get(Counter::BattlesCreated(kind))),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn increment(&self, counter: Counter) {
        if let Some(slot) = self.slot(counter) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }
}
