//! War score aggregation.
//!
//! A war's totals are the sum of the current scores of its battles. The
//! sum is recomputed by the store in the same atomic unit that writes the
//! battle's new score, with the war locked first, so concurrent updates to
//! sibling battles can neither lose nor double count points.
//!
//! Battle scores only move up. An update that would lower either side is
//! rejected, which keeps war totals non-decreasing while the war is active
//! and makes the war delta of any update exactly `new - previous`.

use warfront_types::{Battle, BattleId, ScorePair};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::store::{ScoreRecord, WarAggregation};

/// Records battle scores and keeps war totals consistent with them.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator<'a> {
    engine: &'a Engine,
}

impl<'a> ScoreAggregator<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Check that `next` does not lower either side of `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if either score would decrease.
    pub fn validate(previous: ScorePair, next: ScorePair) -> Result<(), EngineError> {
        if next.dominates(previous) {
            Ok(())
        } else {
            Err(EngineError::invalid_input(format!(
                "battle scores cannot decrease (currently {}/{}, got {}/{})",
                previous.attacker, previous.defender, next.attacker, next.defender
            )))
        }
    }

    /// Convert signed transport values into a score pair.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for a negative or oversized score.
    pub fn from_signed(attacker: i64, defender: i64) -> Result<ScorePair, EngineError> {
        let side = |raw: i64| match u32::try_from(raw) {
            Ok(score) => Ok(score),
            Err(_) if raw < 0 => Err(EngineError::invalid_input("scores must be non-negative")),
            Err(e) => Err(EngineError::invalid_input(format!("score out of range: {e}"))),
        };
        Ok(ScorePair::new(side(attacker)?, side(defender)?))
    }

    /// Sum of the current scores of `battles`.
    pub fn sum<'b>(battles: impl IntoIterator<Item = &'b Battle>) -> ScorePair {
        battles
            .into_iter()
            .fold(ScorePair::default(), |acc, b| acc.saturating_add(b.scores()))
    }

    /// Write a battle's new absolute scores and re-aggregate its war.
    ///
    /// A missing or closed parent war does not fail the update; the battle
    /// is written and the skipped aggregation is logged.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] if the battle does not exist,
    /// [`EngineError::InvalidState`] if it stopped being active or was
    /// raised concurrently past `next`, and [`EngineError::Infrastructure`]
    /// on store failure.
    pub async fn record(&self, battle_id: BattleId, next: ScorePair) -> Result<ScoreRecord, EngineError> {
        let now = self.engine.now();
        let record = self
            .engine
            .store()
            .record_battle_score(battle_id, next, now)
            .await?
            .ok_or_else(|| EngineError::not_found("battle", battle_id))?;

        match record.war {
            WarAggregation::Updated(totals) => {
                tracing::debug!(
                    battle_id = %battle_id,
                    war_id = %record.battle.war_id,
                    attacker_total = totals.attacker,
                    defender_total = totals.defender,
                    "war totals recomputed"
                );
            }
            WarAggregation::WarMissing => {
                tracing::warn!(
                    battle_id = %battle_id,
                    war_id = %record.battle.war_id,
                    "parent war not found, score aggregation skipped"
                );
            }
            WarAggregation::WarClosed(status) => {
                tracing::warn!(
                    battle_id = %battle_id,
                    war_id = %record.battle.war_id,
                    war_status = %status,
                    "parent war is not ongoing, totals left unchanged"
                );
            }
        }
        Ok(record)
    }
}
