//! The engine facade: collaborators wired together, managers handed out.
//!
//! An [`Engine`] owns the store, the event publisher, the metrics sink,
//! the clock, and the configuration. The lifecycle managers are cheap
//! borrowed views over it:
//!
//! ```text
//! engine.wars()        -> WarLifecycle        declare / start / complete / reads
//! engine.battles()     -> BattleLifecycle     create / start / update_score / complete / reads
//! engine.territories() -> TerritoryDirectory  get / list / transfer_ownership
//! engine.scores()      -> ScoreAggregator     transactional war totals
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use warfront_types::{BattleId, Event, EventType, WarId};

use crate::battle::BattleLifecycle;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::{Counter, MetricsSink, NoopMetrics};
use crate::notify::{EventPublisher, LogPublisher};
use crate::pagination::PageRequest;
use crate::scoring::ScoreAggregator;
use crate::store::WarfrontStore;
use crate::territory::TerritoryDirectory;
use crate::war::WarLifecycle;

/// Shared state behind every lifecycle operation.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn WarfrontStore>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<dyn MetricsSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine over `store` with default collaborators: events go
    /// to the log, counters are discarded, time comes from the system clock.
    pub fn new(store: Arc<dyn WarfrontStore>) -> Self {
        Self {
            store,
            publisher: Arc::new(LogPublisher),
            metrics: Arc::new(NoopMetrics),
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    /// Replace the event publisher.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Replace the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// War lifecycle operations.
    pub const fn wars(&self) -> WarLifecycle<'_> {
        WarLifecycle::new(self)
    }

    /// Battle lifecycle operations.
    pub const fn battles(&self) -> BattleLifecycle<'_> {
        BattleLifecycle::new(self)
    }

    /// Territory reads and ownership transfer.
    pub const fn territories(&self) -> TerritoryDirectory<'_> {
        TerritoryDirectory::new(self)
    }

    /// War score aggregation.
    pub const fn scores(&self) -> ScoreAggregator<'_> {
        ScoreAggregator::new(self)
    }

    /// The active configuration.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a listing window from raw request parameters.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the window is out of bounds.
    pub fn page(&self, limit: Option<i64>, offset: Option<i64>) -> Result<PageRequest, EngineError> {
        PageRequest::from_params(limit, offset, &self.config.pagination)
    }

    pub(crate) fn store(&self) -> &dyn WarfrontStore {
        self.store.as_ref()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn count(&self, counter: Counter) {
        self.metrics.increment(counter);
    }

    /// Publish a domain event. Encoding failures are logged and dropped.
    pub(crate) fn emit<D: Serialize>(
        &self,
        event_type: EventType,
        war_id: WarId,
        battle_id: Option<BattleId>,
        details: &D,
        at: DateTime<Utc>,
    ) {
        match Event::new(event_type, war_id, battle_id, details, at) {
            Ok(event) => self.publisher.publish(&event),
            Err(err) => {
                tracing::warn!(
                    event_type = %event_type,
                    war_id = %war_id,
                    error = %err,
                    "failed to encode event details, event dropped"
                );
            }
        }
    }
}
