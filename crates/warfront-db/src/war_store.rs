//! Persistence for the `wars` table.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use warfront_core::pagination::PageRequest;
use warfront_core::store::WarFilter;
use warfront_types::{FactionId, Page, War, WarStatus};

use crate::error::DbError;

/// `LIMIT`/`OFFSET` bind values for a window.
pub(crate) fn window(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

/// Convert a `COUNT(*)` result into a page total.
pub(crate) fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Convert a `BIGINT` score column back into a domain score.
pub(crate) fn score(column: &str, value: i64) -> Result<u32, DbError> {
    u32::try_from(value)
        .map_err(|e| DbError::InvalidRow(format!("{column} out of range: {value} ({e})")))
}

/// Operations on the `wars` table.
pub struct WarStore<'a> {
    pool: &'a PgPool,
}

impl<'a> WarStore<'a> {
    /// Create a war store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new war.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails (including a
    /// violated table constraint).
    pub async fn insert(&self, war: &War) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO wars (id, attacker_faction_id, defender_faction_id, ally_faction_ids,
                                status, phase, territory_id, attacker_score, defender_score,
                                winner_faction_id, start_time, end_time, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(war.id.into_inner())
        .bind(war.attacker_faction_id.into_inner())
        .bind(war.defender_faction_id.into_inner())
        .bind(ally_ids(&war.ally_faction_ids))
        .bind(war.status.as_str())
        .bind(war.phase.as_str())
        .bind(war.territory_id.map(Uuid::from))
        .bind(i64::from(war.attacker_score))
        .bind(i64::from(war.defender_score))
        .bind(war.winner_faction_id.map(Uuid::from))
        .bind(war.start_time)
        .bind(war.end_time)
        .bind(war.created_at)
        .bind(war.updated_at)
        .execute(self.pool)
        .await?;

        tracing::debug!(war_id = %war.id, "Inserted war");
        Ok(())
    }

    /// Fetch a war by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails, or
    /// [`DbError::InvalidRow`] if the row does not decode.
    pub async fn get(&self, id: Uuid) -> Result<Option<War>, DbError> {
        let row = sqlx::query_as::<_, WarRow>(
            r"SELECT id, attacker_faction_id, defender_faction_id, ally_faction_ids, status, phase,
                     territory_id, attacker_score, defender_score, winner_faction_id,
                     start_time, end_time, created_at, updated_at
              FROM wars
              WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(War::try_from).transpose()
    }

    /// List wars matching `filter`, newest first, with the unwindowed total.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a query fails.
    pub async fn list(&self, filter: &WarFilter, page: PageRequest) -> Result<Page<War>, DbError> {
        let faction = filter.faction.map(Uuid::from);
        let status = filter.status.map(WarStatus::as_str);
        let (limit, offset) = window(page);

        let rows = sqlx::query_as::<_, WarRow>(
            r"SELECT id, attacker_faction_id, defender_faction_id, ally_faction_ids, status, phase,
                     territory_id, attacker_score, defender_score, winner_faction_id,
                     start_time, end_time, created_at, updated_at
              FROM wars
              WHERE ($1::uuid IS NULL OR attacker_faction_id = $1 OR defender_faction_id = $1)
                AND ($2::text IS NULL OR status = $2)
              ORDER BY created_at DESC, id DESC
              LIMIT $3 OFFSET $4",
        )
        .bind(faction)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (count,): (i64,) = sqlx::query_as(
            r"SELECT COUNT(*)
              FROM wars
              WHERE ($1::uuid IS NULL OR attacker_faction_id = $1 OR defender_faction_id = $1)
                AND ($2::text IS NULL OR status = $2)",
        )
        .bind(faction)
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(War::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total(count)))
    }

    /// Overwrite the mutable columns of a war if it is still in `expected`
    /// status and unmodified since `read_at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if no row matched, or
    /// [`DbError::Postgres`] if the update fails.
    pub async fn update_if(
        &self,
        war: &War,
        expected: WarStatus,
        read_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            r"UPDATE wars
              SET status = $4, phase = $5, attacker_score = $6, defender_score = $7,
                  winner_faction_id = $8, start_time = $9, end_time = $10, updated_at = $11
              WHERE id = $1 AND status = $2 AND updated_at = $3",
        )
        .bind(war.id.into_inner())
        .bind(expected.as_str())
        .bind(read_at)
        .bind(war.status.as_str())
        .bind(war.phase.as_str())
        .bind(i64::from(war.attacker_score))
        .bind(i64::from(war.defender_score))
        .bind(war.winner_faction_id.map(Uuid::from))
        .bind(war.start_time)
        .bind(war.end_time)
        .bind(war.updated_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<(String,)> = sqlx::query_as(r"SELECT status FROM wars WHERE id = $1")
                .bind(war.id.into_inner())
                .fetch_optional(self.pool)
                .await?;
            let reason = match current {
                None => format!("war {} no longer exists", war.id),
                Some((status,)) if status == expected.as_str() => {
                    format!("war {} was modified concurrently", war.id)
                }
                Some((status,)) => format!("war {} is {status}, expected {expected}", war.id),
            };
            return Err(DbError::Conflict(reason));
        }

        tracing::debug!(war_id = %war.id, status = %war.status, "Updated war");
        Ok(())
    }
}

fn ally_ids(allies: &BTreeSet<FactionId>) -> Vec<Uuid> {
    allies.iter().copied().map(Uuid::from).collect()
}

/// A row from the `wars` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WarRow {
    /// War UUID.
    pub id: Uuid,
    /// Declaring faction.
    pub attacker_faction_id: Uuid,
    /// Target faction.
    pub defender_faction_id: Uuid,
    /// Allied factions.
    pub ally_faction_ids: Vec<Uuid>,
    /// Lifecycle status wire string.
    pub status: String,
    /// Phase wire string.
    pub phase: String,
    /// Territory at stake.
    pub territory_id: Option<Uuid>,
    /// Attacker total.
    pub attacker_score: i64,
    /// Defender total.
    pub defender_score: i64,
    /// Winner, if decided.
    pub winner_faction_id: Option<Uuid>,
    /// Earliest start.
    pub start_time: DateTime<Utc>,
    /// Terminal timestamp.
    pub end_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WarRow> for War {
    type Error = DbError;

    fn try_from(row: WarRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            attacker_faction_id: row.attacker_faction_id.into(),
            defender_faction_id: row.defender_faction_id.into(),
            ally_faction_ids: row.ally_faction_ids.into_iter().map(FactionId::from).collect(),
            status: row
                .status
                .parse()
                .map_err(|e: warfront_types::UnknownVariant| DbError::InvalidRow(e.to_string()))?,
            phase: row
                .phase
                .parse()
                .map_err(|e: warfront_types::UnknownVariant| DbError::InvalidRow(e.to_string()))?,
            territory_id: row.territory_id.map(Into::into),
            attacker_score: score("attacker_score", row.attacker_score)?,
            defender_score: score("defender_score", row.defender_score)?,
            winner_faction_id: row.winner_faction_id.map(Into::into),
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use warfront_types::WarPhase;

    use super::*;

    fn row() -> WarRow {
        let now = Utc::now();
        WarRow {
            id: Uuid::now_v7(),
            attacker_faction_id: Uuid::now_v7(),
            defender_faction_id: Uuid::now_v7(),
            ally_faction_ids: vec![Uuid::now_v7()],
            status: String::from("ongoing"),
            phase: String::from("active"),
            territory_id: None,
            attacker_score: 150,
            defender_score: 100,
            winner_faction_id: None,
            start_time: now,
            end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_maps_to_war() {
        let war = War::try_from(row());
        assert!(war.is_ok());
        let war = war.ok();
        assert_eq!(war.as_ref().map(|w| w.status), Some(WarStatus::Ongoing));
        assert_eq!(war.as_ref().map(|w| w.phase), Some(WarPhase::Active));
        assert_eq!(war.as_ref().map(|w| w.ally_faction_ids.len()), Some(1));
        assert_eq!(war.map(|w| w.attacker_score), Some(150));
    }

    #[test]
    fn unknown_status_is_an_invalid_row() {
        let mut bad = row();
        bad.status = String::from("pending");
        assert!(matches!(War::try_from(bad), Err(DbError::InvalidRow(_))));
    }

    #[test]
    fn negative_score_is_an_invalid_row() {
        let mut bad = row();
        bad.defender_score = -1;
        assert!(matches!(War::try_from(bad), Err(DbError::InvalidRow(_))));
    }
}
