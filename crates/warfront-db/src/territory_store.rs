//! Persistence for the `territories` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use warfront_core::pagination::PageRequest;
use warfront_types::{FactionId, Page, Territory};

use crate::error::DbError;
use crate::war_store::{score, total, window};

/// Operations on the `territories` table.
pub struct TerritoryStore<'a> {
    pool: &'a PgPool,
}

impl<'a> TerritoryStore<'a> {
    /// Create a territory store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a territory. Used by provisioning and tests; the engine
    /// itself never creates territories.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, territory: &Territory) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO territories (id, name, region, owner_faction_id, defense_rating,
                                       siege_difficulty, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(territory.id.into_inner())
        .bind(&territory.name)
        .bind(&territory.region)
        .bind(territory.owner_faction_id.map(Uuid::from))
        .bind(i64::from(territory.defense_rating))
        .bind(i64::from(territory.siege_difficulty))
        .bind(territory.created_at)
        .bind(territory.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a territory by id.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(&self, id: Uuid) -> Result<Option<Territory>, DbError> {
        let row = sqlx::query_as::<_, TerritoryRow>(
            r"SELECT id, name, region, owner_faction_id, defense_rating, siege_difficulty,
                     created_at, updated_at
              FROM territories
              WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Territory::try_from).transpose()
    }

    /// List territories, optionally restricted to one owner, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if a query fails.
    pub async fn list(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, DbError> {
        let owner = owner.map(Uuid::from);
        let (limit, offset) = window(page);

        let rows = sqlx::query_as::<_, TerritoryRow>(
            r"SELECT id, name, region, owner_faction_id, defense_rating, siege_difficulty,
                     created_at, updated_at
              FROM territories
              WHERE ($1::uuid IS NULL OR owner_faction_id = $1)
              ORDER BY created_at DESC, id DESC
              LIMIT $2 OFFSET $3",
        )
        .bind(owner)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let (count,): (i64,) = sqlx::query_as(
            r"SELECT COUNT(*) FROM territories WHERE ($1::uuid IS NULL OR owner_faction_id = $1)",
        )
        .bind(owner)
        .fetch_one(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Territory::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total(count)))
    }

    /// Set the owner of a territory. Returns `false` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn set_owner(
        &self,
        id: Uuid,
        owner: FactionId,
        at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"UPDATE territories
              SET owner_faction_id = $2,
                  updated_at = GREATEST($3, updated_at + INTERVAL '1 microsecond')
              WHERE id = $1",
        )
        .bind(id)
        .bind(owner.into_inner())
        .bind(at)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// A row from the `territories` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TerritoryRow {
    /// Territory UUID.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Region name.
    pub region: String,
    /// Current owner, `NULL` when neutral.
    pub owner_faction_id: Option<Uuid>,
    /// Defense rating.
    pub defense_rating: i64,
    /// Siege difficulty.
    pub siege_difficulty: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TerritoryRow> for Territory {
    type Error = DbError;

    fn try_from(row: TerritoryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            name: row.name,
            region: row.region,
            owner_faction_id: row.owner_faction_id.map(Into::into),
            defense_rating: score("defense_rating", row.defense_rating)?,
            siege_difficulty: score("siege_difficulty", row.siege_difficulty)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
