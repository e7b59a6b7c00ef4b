//! Battle lifecycle manager.
//!
//! A battle lives inside an ongoing war and moves
//! `scheduled -> active -> completed`. Scores can only change while it is
//! active; each change is pushed up to the war through the
//! [`ScoreAggregator`](crate::scoring::ScoreAggregator).

use chrono::{DateTime, Utc};
use warfront_types::{
    Battle, BattleCompletedDetails, BattleCreatedDetails, BattleId, BattleScoreUpdatedDetails,
    BattleStartedDetails, BattleStatus, BattleType, EventType, Page, ScorePair, TerritoryId,
    WarId, WarStatus,
};

use crate::engine::Engine;
use crate::error::{EngineError, reason};
use crate::metrics::Counter;
use crate::pagination::PageRequest;
use crate::scoring::ScoreAggregator;
use crate::store::{
    BattleFilter, StoreError, TRANSITION_ATTEMPTS, WarAggregation, next_revision,
};
use crate::war::require_war_id;

/// Input to [`BattleLifecycle::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattlePlan {
    /// The war the battle belongs to.
    pub war_id: WarId,
    /// Kind of engagement.
    pub battle_type: BattleType,
    /// Territory fought over.
    pub territory: Option<TerritoryId>,
    /// Earliest moment the battle may be started.
    pub start_time: DateTime<Utc>,
}

impl BattlePlan {
    /// A battle with no territory.
    pub const fn new(war_id: WarId, battle_type: BattleType, start_time: DateTime<Utc>) -> Self {
        Self {
            war_id,
            battle_type,
            territory: None,
            start_time,
        }
    }

    /// Fight over `territory`.
    #[must_use]
    pub const fn over_territory(mut self, territory: TerritoryId) -> Self {
        self.territory = Some(territory);
        self
    }
}

fn require_battle_id(id: BattleId) -> Result<(), EngineError> {
    if id.is_nil() {
        return Err(EngineError::invalid_input("invalid battle ID"));
    }
    Ok(())
}

/// Creates, starts, scores, completes, and reads battles.
#[derive(Debug, Clone, Copy)]
pub struct BattleLifecycle<'a> {
    engine: &'a Engine,
}

impl<'a> BattleLifecycle<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Schedule a battle inside an ongoing war.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] if the war or the territory does not
    /// resolve, [`EngineError::InvalidState`] unless the war is ongoing
    /// when the battle is written.
    pub async fn create(&self, plan: BattlePlan) -> Result<Battle, EngineError> {
        require_war_id(plan.war_id)?;
        let war = self
            .engine
            .store()
            .get_war(plan.war_id)
            .await?
            .ok_or_else(|| EngineError::not_found("war", plan.war_id))?;
        if war.status != WarStatus::Ongoing {
            return Err(EngineError::invalid_state(reason::WAR_NOT_ACTIVE));
        }
        if let Some(territory) = plan.territory {
            self.engine.territories().get(territory).await?;
        }

        let now = self.engine.now();
        let battle = Battle {
            id: BattleId::new(),
            war_id: plan.war_id,
            battle_type: plan.battle_type,
            territory_id: plan.territory,
            status: BattleStatus::Scheduled,
            attacker_score: 0,
            defender_score: 0,
            start_time: plan.start_time,
            end_time: None,
            created_at: now,
            updated_at: now,
        };
        self.engine.store().create_battle(&battle).await?;

        tracing::info!(
            battle_id = %battle.id,
            war_id = %battle.war_id,
            battle_type = %battle.battle_type,
            start_time = %battle.start_time,
            "battle created"
        );
        let details = BattleCreatedDetails {
            battle_type: battle.battle_type,
            territory_id: battle.territory_id,
            start_time: battle.start_time,
        };
        self.engine
            .emit(EventType::BattleCreated, battle.war_id, Some(battle.id), &details, now);
        self.engine.count(Counter::BattlesCreated(battle.battle_type));
        Ok(battle)
    }

    /// Start a scheduled battle.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`], [`EngineError::InvalidState`] unless the
    /// battle is scheduled, [`EngineError::TooEarly`] before its start time.
    pub async fn start(&self, id: BattleId) -> Result<Battle, EngineError> {
        let battle = self.get(id).await?;
        if battle.status != BattleStatus::Scheduled {
            return Err(EngineError::invalid_state(reason::BATTLE_NOT_SCHEDULED));
        }
        let now = self.engine.now();
        if now < battle.start_time {
            return Err(EngineError::TooEarly {
                scheduled: battle.start_time,
                now,
            });
        }

        let mut started = battle.clone();
        started.status = BattleStatus::Active;
        started.updated_at = next_revision(battle.updated_at, now);
        self.engine
            .store()
            .update_battle(&started, BattleStatus::Scheduled, battle.updated_at)
            .await?;

        tracing::info!(battle_id = %id, war_id = %started.war_id, "battle started");
        let details = BattleStartedDetails {
            battle_type: started.battle_type,
        };
        self.engine
            .emit(EventType::BattleStarted, started.war_id, Some(id), &details, now);
        Ok(started)
    }

    /// Replace an active battle's scores with new absolute values.
    ///
    /// The parent war's totals are recomputed in the same store operation.
    /// A missing parent war is logged and does not fail the update.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`], [`EngineError::InvalidState`] unless the
    /// battle is active, [`EngineError::InvalidInput`] if either score would
    /// decrease.
    pub async fn update_score(
        &self,
        id: BattleId,
        attacker_score: u32,
        defender_score: u32,
    ) -> Result<Battle, EngineError> {
        let battle = self.get(id).await?;
        if battle.status != BattleStatus::Active {
            return Err(EngineError::invalid_state(reason::BATTLE_NOT_ACTIVE));
        }
        let next = ScorePair::new(attacker_score, defender_score);
        ScoreAggregator::validate(battle.scores(), next)?;

        let record = self.engine.scores().record(id, next).await?;
        let totals = match record.war {
            WarAggregation::Updated(totals) => Some(totals),
            WarAggregation::WarMissing | WarAggregation::WarClosed(_) => None,
        };

        tracing::info!(
            battle_id = %id,
            war_id = %record.battle.war_id,
            attacker_score,
            defender_score,
            "battle score updated"
        );
        let details = BattleScoreUpdatedDetails {
            attacker_score,
            defender_score,
            war_attacker_score: totals.map(|t| t.attacker),
            war_defender_score: totals.map(|t| t.defender),
        };
        self.engine.emit(
            EventType::BattleScoreUpdated,
            record.battle.war_id,
            Some(id),
            &details,
            record.battle.updated_at,
        );
        Ok(record.battle)
    }

    /// Finish an active battle, freezing its scores.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`], [`EngineError::InvalidState`] unless the
    /// battle is active (or another caller completed it first).
    pub async fn complete(&self, id: BattleId) -> Result<Battle, EngineError> {
        let mut attempts = 0_usize;
        let (done, now) = loop {
            let battle = self.get(id).await?;
            if battle.status != BattleStatus::Active {
                return Err(EngineError::invalid_state(reason::BATTLE_NOT_ACTIVE));
            }
            let now = self.engine.now();

            let mut done = battle.clone();
            done.status = BattleStatus::Completed;
            done.end_time = Some(now);
            done.updated_at = next_revision(battle.updated_at, now);
            match self
                .engine
                .store()
                .update_battle(&done, BattleStatus::Active, battle.updated_at)
                .await
            {
                Ok(()) => break (done, now),
                // A score landed after the read; freeze the newer scores instead.
                Err(StoreError::Conflict(conflict)) => {
                    attempts = attempts.saturating_add(1);
                    if attempts >= TRANSITION_ATTEMPTS {
                        return Err(StoreError::Contended(conflict).into());
                    }
                    tracing::debug!(
                        battle_id = %id,
                        attempts,
                        %conflict,
                        "battle changed before completion, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        tracing::info!(
            battle_id = %id,
            war_id = %done.war_id,
            attacker_score = done.attacker_score,
            defender_score = done.defender_score,
            "battle completed"
        );
        let details = BattleCompletedDetails {
            attacker_score: done.attacker_score,
            defender_score: done.defender_score,
        };
        self.engine
            .emit(EventType::BattleCompleted, done.war_id, Some(id), &details, now);
        Ok(done)
    }

    /// Fetch a battle.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a nil id, [`EngineError::NotFound`].
    pub async fn get(&self, id: BattleId) -> Result<Battle, EngineError> {
        require_battle_id(id)?;
        tracing::debug!(battle_id = %id, "get battle");
        self.engine
            .store()
            .get_battle(id)
            .await?
            .ok_or_else(|| EngineError::not_found("battle", id))
    }

    /// List battles, newest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::Infrastructure`] on store failure.
    pub async fn list(
        &self,
        filter: BattleFilter,
        page: PageRequest,
    ) -> Result<Page<Battle>, EngineError> {
        Ok(self.engine.store().list_battles(&filter, page).await?)
    }
}
