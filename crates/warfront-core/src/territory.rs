//! Territory reads and ownership transfer.
//!
//! Territories are provisioned outside the engine. The only write the
//! engine performs is moving ownership to a war's winner.

use warfront_types::{FactionId, Page, Territory, TerritoryId};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::pagination::PageRequest;

/// Read/write access to territory records.
#[derive(Debug, Clone, Copy)]
pub struct TerritoryDirectory<'a> {
    engine: &'a Engine,
}

pub(crate) fn require_territory_id(id: TerritoryId) -> Result<(), EngineError> {
    if id.is_nil() {
        return Err(EngineError::invalid_input("invalid territory ID"));
    }
    Ok(())
}

impl<'a> TerritoryDirectory<'a> {
    pub(crate) const fn new(engine: &'a Engine) -> Self {
        Self { engine }
    }

    /// Fetch a territory.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a nil id, [`EngineError::NotFound`]
    /// if it does not exist, [`EngineError::Infrastructure`] on store failure.
    pub async fn get(&self, id: TerritoryId) -> Result<Territory, EngineError> {
        require_territory_id(id)?;
        tracing::debug!(territory_id = %id, "get territory");
        self.engine
            .store()
            .get_territory(id)
            .await?
            .ok_or_else(|| EngineError::not_found("territory", id))
    }

    /// List territories, optionally only those held by `owner`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Infrastructure`] on store failure.
    pub async fn list(
        &self,
        owner: Option<FactionId>,
        page: PageRequest,
    ) -> Result<Page<Territory>, EngineError> {
        Ok(self.engine.store().list_territories(owner, page).await?)
    }

    /// Give `territory` to `owner`. Repeating the call is harmless.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidInput`] for a nil id, [`EngineError::NotFound`]
    /// if the territory does not exist, [`EngineError::Infrastructure`] on
    /// store failure.
    pub async fn transfer_ownership(
        &self,
        territory: TerritoryId,
        owner: FactionId,
    ) -> Result<(), EngineError> {
        require_territory_id(territory)?;
        if owner.is_nil() {
            return Err(EngineError::invalid_input("invalid faction ID"));
        }
        let now = self.engine.now();
        let found = self
            .engine
            .store()
            .update_territory_owner(territory, owner, now)
            .await?;
        if !found {
            return Err(EngineError::not_found("territory", territory));
        }
        tracing::info!(territory_id = %territory, owner_faction_id = %owner, "territory ownership transferred");
        Ok(())
    }
}
