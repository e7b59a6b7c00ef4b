//! War lifecycle manager.
//!
//! ```text
//! declare ──> declared/preparation ──start──> ongoing/active ──complete──> completed/completed
//!                                    (not before start_time)          (winner by score, territory moves)
//! ```
//!
//! Every transition validates before writing, writes with compare-and-set
//! on the prior status, and only then runs secondary effects (territory
//! transfer, event, counter). Secondary effects are logged on failure and
//! never undo or fail the transition.

use std::collections::BTreeSet;

use warfront_types::{
    EventType, FactionId, Page, TerritoryId, War, WarCompletedDetails, WarDeclaredDetails,
    WarDetails, WarId, WarPhase, WarStartedDetails, WarStatistics, WarStatus,
};

use crate::engine::Engine;
use crate::error::{EngineError, reason};
use crate::metrics::Counter;
use crate::pagination::PageRequest;
use crate::store::{StoreError, TRANSITION_ATTEMPTS, WarFilter, next_revision};

/// Input to [`WarLifecycle::declare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarDeclaration {
    /// The declaring faction.
    pub attacker: FactionId,
    /// The faction war is declared on.
    pub defender: FactionId,
    /// Allied factions. Must not include either belligerent.
    pub allies: BTreeSet<FactionId>,
    /// Territory at stake.
    pub territory: Option<TerritoryId>,
}

impl WarDeclaration {
    /// A declaration with no allies and no territory.
    pub const fn new(attacker: FactionId, defender: FactionId) -> Self {
        Self {
            attacker,
            defender,
            allies: BTreeSet::new(),
            territory: None,
        }
    }

    /// Add allies.
    #[must_use]
    pub fn with_allies(mut self, allies: impl IntoIterator<Item = FactionId>) -> Self {
        self.allies.extend(allies);
        self
    }

    /// Put a territory at stake.
    #[must_use]
    pub const fn over_territory(mut self, territory: TerritoryId) -> Self {
        self.territory = Some(territory);
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.attacker.is_nil() {
            return Err(EngineError::invalid_input("invalid attacker faction ID"));
        }
        if self.defender.is_nil() {
            return Err(EngineError::invalid_input("invalid defender faction ID"));
        }
        if self.attacker == self.defender {
            return Err(EngineError::invalid_input(
                "attacker and defender cannot be the same faction",
            ));
        }
        for ally in &self.allies {
            if ally.is_nil() {
                return Err(EngineError::invalid_input("invalid ally faction ID"));
            }
            if *ally == self.attacker || *ally == self.defender {
                return Err(EngineError::invalid_input(format!(
                    "faction {ally} cannot be both a belligerent and an ally"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn require_war_id(id: WarId) -> Result<(), EngineError> {
    if id.is_nil() {
        return Err(EngineError::invalid_input("invalid war ID"));
    }
    Ok(())
}

/// Declares, starts, completes, and reads wars.
#[derive(Debug, Clone, Copy)]
pub struct WarLifecycle<'a> {
    engine: &'a Engine,
}

impl<'a> WarLifecycle<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Declare a war. It may be started once the preparation window ends.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for nil or duplicate factions,
    /// [`EngineError::NotFound`] if the territory does not exist,
    /// [`EngineError::Infrastructure`] on store failure.
    pub async fn declare(&self, declaration: WarDeclaration) -> Result<War, EngineError> {
        declaration.validate()?;
        if let Some(territory) = declaration.territory {
            self.engine.territories().get(territory).await?;
        }

        let now = self.engine.now();
        let window = self.engine.config().war.preparation_window();
        let start_time = now
            .checked_add_signed(window)
            .ok_or_else(|| EngineError::invalid_input("preparation window out of range"))?;

        let war = War {
            id: WarId::new(),
            attacker_faction_id: declaration.attacker,
            defender_faction_id: declaration.defender,
            ally_faction_ids: declaration.allies,
            status: WarStatus::Declared,
            phase: WarPhase::Preparation,
            territory_id: declaration.territory,
            attacker_score: 0,
            defender_score: 0,
            winner_faction_id: None,
            start_time,
            end_time: None,
            created_at: now,
            updated_at: now,
        };
        self.engine.store().create_war(&war).await?;

        tracing::info!(
            war_id = %war.id,
            attacker_faction_id = %war.attacker_faction_id,
            defender_faction_id = %war.defender_faction_id,
            allies = war.ally_faction_ids.len(),
            start_time = %war.start_time,
            "war declared"
        );
        let details = WarDeclaredDetails {
            attacker_faction_id: war.attacker_faction_id,
            defender_faction_id: war.defender_faction_id,
            ally_faction_ids: war.ally_faction_ids.clone(),
            territory_id: war.territory_id,
            start_time: war.start_time,
        };
        self.engine.emit(EventType::WarDeclared, war.id, None, &details, now);
        self.engine.count(Counter::WarsDeclared);
        Ok(war)
    }

    /// Move a declared war into active fighting.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`], [`EngineError::InvalidState`] unless the
    /// war is declared, [`EngineError::TooEarly`] before its start time.
    pub async fn start(&self, id: WarId) -> Result<War, EngineError> {
        let war = self.get(id).await?;
        if war.status != WarStatus::Declared {
            return Err(EngineError::invalid_state(reason::WAR_ALREADY_STARTED));
        }
        let now = self.engine.now();
        if now < war.start_time {
            return Err(EngineError::TooEarly {
                scheduled: war.start_time,
                now,
            });
        }

        let mut started = war.clone();
        started.status = WarStatus::Ongoing;
        started.phase = WarPhase::Active;
        started.updated_at = next_revision(war.updated_at, now);
        self.engine
            .store()
            .update_war(&started, WarStatus::Declared, war.updated_at)
            .await?;

        tracing::info!(war_id = %id, "war started");
        let details = WarStartedDetails {
            attacker_faction_id: started.attacker_faction_id,
            defender_faction_id: started.defender_faction_id,
        };
        self.engine.emit(EventType::WarStarted, id, None, &details, now);
        Ok(started)
    }

    /// Finalize an ongoing war: decide the winner and move the territory.
    ///
    /// The territory transfer is best effort. Its failure is logged and the
    /// completion still succeeds.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`], [`EngineError::InvalidState`] unless the
    /// war is ongoing (or another caller completed it first),
    /// [`EngineError::Infrastructure`] if score updates keep landing between
    /// the read and the write.
    pub async fn complete(&self, id: WarId) -> Result<War, EngineError> {
        let done = self.finalize(id).await?;
        let now = done.end_time.unwrap_or(done.updated_at);

        tracing::info!(
            war_id = %id,
            attacker_score = done.attacker_score,
            defender_score = done.defender_score,
            winner_faction_id = ?done.winner_faction_id.map(|w| w.to_string()),
            "war completed"
        );

        let territory_transferred = match (done.territory_id, done.winner_faction_id) {
            (Some(territory), Some(winner)) => {
                match self.engine.territories().transfer_ownership(territory, winner).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(
                            war_id = %id,
                            territory_id = %territory,
                            error = %err,
                            "territory transfer failed after war completion"
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        let details = WarCompletedDetails {
            attacker_score: done.attacker_score,
            defender_score: done.defender_score,
            winner_faction_id: done.winner_faction_id,
            territory_id: done.territory_id,
            territory_transferred,
        };
        self.engine.emit(EventType::WarCompleted, id, None, &details, now);
        self.engine.count(Counter::WarsCompleted);
        Ok(done)
    }

    /// Write the completed record, deciding the winner from the scores it
    /// replaces. A score update that lands between the read and the write
    /// only moves the revision, so the war is re-read and decided again.
    async fn finalize(&self, id: WarId) -> Result<War, EngineError> {
        let mut attempts = 0_usize;
        loop {
            let war = self.get(id).await?;
            if war.status != WarStatus::Ongoing {
                return Err(EngineError::invalid_state(reason::WAR_CANNOT_BE_COMPLETED));
            }
            let now = self.engine.now();

            let mut done = war.clone();
            done.status = WarStatus::Completed;
            done.phase = WarPhase::Completed;
            done.winner_faction_id = war.decide_winner();
            done.end_time = Some(now);
            done.updated_at = next_revision(war.updated_at, now);
            match self
                .engine
                .store()
                .update_war(&done, WarStatus::Ongoing, war.updated_at)
                .await
            {
                Ok(()) => return Ok(done),
                Err(StoreError::Conflict(conflict)) => {
                    attempts = attempts.saturating_add(1);
                    if attempts >= TRANSITION_ATTEMPTS {
                        return Err(StoreError::Contended(conflict).into());
                    }
                    tracing::debug!(
                        war_id = %id,
                        attempts,
                        %conflict,
                        "war changed before completion, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Fetch a war.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a nil id, [`EngineError::NotFound`].
    pub async fn get(&self, id: WarId) -> Result<War, EngineError> {
        require_war_id(id)?;
        tracing::debug!(war_id = %id, "get war");
        self.engine
            .store()
            .get_war(id)
            .await?
            .ok_or_else(|| EngineError::not_found("war", id))
    }

    /// List wars, newest first. A faction filter matches either side.
    ///
    /// # Errors
    ///
    /// [`EngineError::Infrastructure`] on store failure.
    pub async fn list(&self, filter: WarFilter, page: PageRequest) -> Result<Page<War>, EngineError> {
        Ok(self.engine.store().list_wars(&filter, page).await?)
    }

    /// A war together with all of its battles, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`WarLifecycle::get`].
    pub async fn details(&self, id: WarId) -> Result<WarDetails, EngineError> {
        let war = self.get(id).await?;
        let battles = self.engine.store().battles_for_war(id).await?;
        Ok(WarDetails { war, battles })
    }

    /// Ongoing wars in which `faction` is the attacker or the defender.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a nil faction id.
    pub async fn active_for_faction(
        &self,
        faction: FactionId,
        page: PageRequest,
    ) -> Result<Page<War>, EngineError> {
        if faction.is_nil() {
            return Err(EngineError::invalid_input("invalid faction ID"));
        }
        let filter = WarFilter {
            faction: Some(faction),
            status: Some(WarStatus::Ongoing),
        };
        self.list(filter, page).await
    }

    /// Battle counts and score totals of a war.
    ///
    /// # Errors
    ///
    /// Same as [`WarLifecycle::get`].
    pub async fn statistics(&self, id: WarId) -> Result<WarStatistics, EngineError> {
        let war = self.get(id).await?;
        let battles = self.engine.store().battle_tally(id).await?;
        Ok(WarStatistics {
            war_id: war.id,
            status: war.status,
            total_battles: battles.total(),
            battles,
            scores: war.scores(),
        })
    }
}
