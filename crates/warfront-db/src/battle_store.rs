//! Persistence for the `battles` table, including transactional score
//! aggregation into the parent war.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use warfront_core::error::reason;
use warfront_core::pagination::PageRequest;
use warfront_core::store::{BattleFilter, ScoreRecord, WarAggregation};
use warfront_types::{Battle, BattleStatus, BattleTally, Page, ScorePair, UnknownVariant, WarStatus};

use crate::error::DbError;
use crate::war_store::{score, total, window};

/// Operations on the `battles` table.
pub struct BattleStore<'a> {
    pool: &'a PgPool,
}

impl<'a> BattleStore<'a> {
    /// Create a battle store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new battle under an ongoing war.
    ///
    /// The war row is held `FOR SHARE` until commit, so a concurrent
    /// completion either lands first (and the insert is refused) or waits
    /// for the battle to exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if the war is missing or not ongoing,
    /// or [`DbError::Postgres`] if a statement fails.
    pub async fn insert(&self, battle: &Battle) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let parent: Option<(String,)> =
            sqlx::query_as(r"SELECT status FROM wars WHERE id = $1 FOR SHARE")
                .bind(battle.war_id.into_inner())
                .fetch_optional(&mut *tx)
                .await?;
        if !matches!(&parent, Some((status,)) if status == WarStatus::Ongoing.as_str()) {
            return Err(DbError::Conflict(String::from(reason::WAR_NOT_ACTIVE)));
        }

        sqlx::query(
            r"INSERT INTO battles (id, war_id, battle_type, territory_id, status,
                                   attacker_score, defender_score, start_time, end_time,
                                   created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(battle.id.into_inner())
        .bind(battle.war_id.into_inner())
        .bind(battle.battle_type.as_str())
        .bind(battle.territory_id.map(Uuid::from))
        .bind(battle.status.as_str())
        .bind(i64::from(battle.attacker_score))
        .bind(i64::from(battle.defender_score))
        .bind(battle.start_time)
        .bind(battle.end_time)
        .bind(battle.created_at)
        .bind(battle.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(battle_id = %battle.id, war_id = %battle.war_id, "Inserted battle");
        Ok(())
    }

    /// Fetch a battle by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<Battle>, DbError> {
        let row = sqlx::query_as::<_, BattleRow>(
            r"SELECT id, war_id, battle_type, territory_id, status, attacker_score,
                     defender_score, start_time, end_time, created_at, updated_at
              FROM battles
              WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Battle::try_from).transpose()
    }

    /// List battles matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a query fails.
    pub async fn list(
        &self,
        filter: &BattleFilter,
        page: PageRequest,
    ) -> Result<Page<Battle>, DbError> {
        let war = filter.war.map(Uuid::from);
        let status = filter.status.map(BattleStatus::as_str);
        let (limit, offset) = window(page);

        let rows = sqlx::query_as::<_, BattleRow>(
            r"SELECT id, war_id, battle_type, territory_id, status, attacker_score,
                     defender_score, start_time, end_time, created_at, updated_at
              FROM battles
              WHERE ($1::uuid IS NULL OR war_id = $1)
                AND ($2::text IS NULL OR status = $2)
              ORDER BY created_at DESC, id DESC
              LIMIT $3 OFFSET $4",
        )
        .bind(war)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (count,): (i64,) = sqlx::query_as(
            r"SELECT COUNT(*)
              FROM battles
              WHERE ($1::uuid IS NULL OR war_id = $1)
                AND ($2::text IS NULL OR status = $2)",
        )
        .bind(war)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Battle::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total(count)))
    }

    /// Every battle of one war, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn for_war(&self, war_id: Uuid) -> Result<Vec<Battle>, DbError> {
        let rows = sqlx::query_as::<_, BattleRow>(
            r"SELECT id, war_id, battle_type, territory_id, status, attacker_score,
                     defender_score, start_time, end_time, created_at, updated_at
              FROM battles
              WHERE war_id = $1
              ORDER BY created_at DESC, id DESC",
        )
        .bind(war_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Battle::try_from).collect()
    }

    /// Battle counts of one war, grouped by status.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] for an unknown status.
    pub async fn tally(&self, war_id: Uuid) -> Result<BattleTally, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r"SELECT status, COUNT(*) FROM battles WHERE war_id = $1 GROUP BY status",
        )
        .bind(war_id)
        .fetch_all(self.pool)
        .await?;

        let mut tally = BattleTally::default();
        for (status, count) in rows {
            let count = total(count);
            match status
                .parse::<BattleStatus>()
                .map_err(|e| DbError::InvalidRow(e.to_string()))?
            {
                BattleStatus::Scheduled => tally.scheduled = count,
                BattleStatus::Active => tally.active = count,
                BattleStatus::Completed => tally.completed = count,
            }
        }
        Ok(tally)
    }

    /// Overwrite the mutable columns of a battle if it is still in
    /// `expected` status and unmodified since `read_at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if no row matched.
    pub async fn update_if(
        &self,
        battle: &Battle,
        expected: BattleStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE battles
              SET status = $4, attacker_score = $5, defender_score = $6,
                  start_time = $7, end_time = $8, updated_at = $9
              WHERE id = $1 AND status = $2 AND updated_at = $3",
        )
        .bind(battle.id.into_inner())
        .bind(expected.as_str())
        .bind(read_at)
        .bind(battle.status.as_str())
        .bind(i64::from(battle.attacker_score))
        .bind(i64::from(battle.defender_score))
        .bind(battle.start_time)
        .bind(battle.end_time)
        .bind(battle.updated_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<(String,)> =
                sqlx::query_as(r"SELECT status FROM battles WHERE id = $1")
                    .bind(battle.id.into_inner())
                    .fetch_optional(self.pool)
                    .await?;
            let reason = match current {
                None => format!("battle {} no longer exists", battle.id),
                Some((status,)) if status == expected.as_str() => {
                    format!("battle {} was modified concurrently", battle.id)
                }
                Some((status,)) => {
                    format!("battle {} is {status}, expected {expected}", battle.id)
                }
            };
            return Err(DbError::Conflict(reason));
        }

        tracing::debug!(battle_id = %battle.id, status = %battle.status, "Updated battle");
        Ok(())
    }

    /// Set an active battle's scores and recompute the parent war's totals
    /// from the sum of its battles, in one transaction.
    ///
    /// The war row is locked first, so concurrent updates to sibling
    /// battles serialize on it. Totals saturate at `u32::MAX`. A war that
    /// is no longer ongoing keeps its totals.
    ///
    /// Returns `None` if the battle does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if the battle is not active or the new
    /// scores are lower than the stored ones, or [`DbError::Postgres`] if a
    /// statement fails (the transaction is rolled back).
    pub async fn record_score(
        &self,
        id: Uuid,
        scores: ScorePair,
        at: DateTime<Utc>,
    ) -> Result<Option<ScoreRecord>, DbError> {
        let mut tx = self.pool.begin().await?;

        let parent: Option<(Uuid,)> = sqlx::query_as(r"SELECT war_id FROM battles WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some((war_id,)) = parent else {
            return Ok(None);
        };

        let war_status: Option<(String,)> =
            sqlx::query_as(r"SELECT status FROM wars WHERE id = $1 FOR UPDATE")
                .bind(war_id)
                .fetch_optional(&mut *tx)
                .await?;

        let updated = sqlx::query_as::<_, BattleRow>(
            r"UPDATE battles
              SET attacker_score = $2, defender_score = $3,
                  updated_at = GREATEST($4, updated_at + INTERVAL '1 microsecond')
              WHERE id = $1 AND status = 'active'
                AND attacker_score <= $2 AND defender_score <= $3
              RETURNING id, war_id, battle_type, territory_id, status, attacker_score,
                        defender_score, start_time, end_time, created_at, updated_at",
        )
        .bind(id)
        .bind(i64::from(scores.attacker))
        .bind(i64::from(scores.defender))
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            let current: Option<(String,)> =
                sqlx::query_as(r"SELECT status FROM battles WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return match current {
                None => Ok(None),
                Some((status,)) if status != BattleStatus::Active.as_str() => {
                    Err(DbError::Conflict(String::from(reason::BATTLE_NOT_ACTIVE)))
                }
                Some(_) => Err(DbError::Conflict(String::from(
                    reason::SCORES_CANNOT_DECREASE,
                ))),
            };
        };
        let battle = Battle::try_from(row)?;

        let war = match war_status {
            None => WarAggregation::WarMissing,
            Some((status,)) => {
                let status = status
                    .parse::<WarStatus>()
                    .map_err(|e: UnknownVariant| DbError::InvalidRow(e.to_string()))?;
                if status == WarStatus::Ongoing {
                    WarAggregation::Updated(recompute_war_totals(&mut *tx, war_id, at).await?)
                } else {
                    WarAggregation::WarClosed(status)
                }
            }
        };

        tx.commit().await?;
        Ok(Some(ScoreRecord { battle, war }))
    }
}

/// Set a war's totals to the saturated sums of its battles' scores.
async fn recompute_war_totals(
    conn: &mut PgConnection,
    war_id: Uuid,
    at: DateTime<Utc>,
) -> Result<ScorePair, DbError> {
    let (attacker, defender): (i64, i64) = sqlx::query_as(
        r"UPDATE wars
          SET attacker_score = LEAST(sums.attacker, 4294967295),
              defender_score = LEAST(sums.defender, 4294967295),
              updated_at = GREATEST($2, wars.updated_at + INTERVAL '1 microsecond')
          FROM (SELECT COALESCE(SUM(attacker_score), 0) AS attacker,
                       COALESCE(SUM(defender_score), 0) AS defender
                FROM battles
                WHERE war_id = $1) AS sums
          WHERE wars.id = $1
          RETURNING wars.attacker_score, wars.defender_score",
    )
    .bind(war_id)
    .bind(at)
    .fetch_one(conn)
    .await?;

    Ok(ScorePair::new(
        score("attacker_score", attacker)?,
        score("defender_score", defender)?,
    ))
}

/// A row from the `battles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BattleRow {
    /// Battle UUID.
    pub id: Uuid,
    /// Parent war.
    pub war_id: Uuid,
    /// Battle type wire string.
    pub battle_type: String,
    /// Territory fought over.
    pub territory_id: Option<Uuid>,
    /// Status wire string.
    pub status: String,
    /// Attacker score.
    pub attacker_score: i64,
    /// Defender score.
    pub defender_score: i64,
    /// Scheduled or actual start.
    pub start_time: DateTime<Utc>,
    /// Completion timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BattleRow> for Battle {
    type Error = DbError;

    fn try_from(row: BattleRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            war_id: row.war_id.into(),
            battle_type: row
                .battle_type
                .parse()
                .map_err(|e: UnknownVariant| DbError::InvalidRow(e.to_string()))?,
            territory_id: row.territory_id.map(Into::into),
            status: row
                .status
                .parse()
                .map_err(|e: UnknownVariant| DbError::InvalidRow(e.to_string()))?,
            attacker_score: score("attacker_score", row.attacker_score)?,
            defender_score: score("defender_score", row.defender_score)?,
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
