//! Listing windows.

use crate::config::PaginationConfig;
use crate::error::EngineError;

/// A validated `limit`/`offset` window for a `list_*` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    limit: u32,
    offset: u64,
}

impl PageRequest {
    /// Validate an explicit window against the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] with `"invalid limit"` for a
    /// zero limit and `"limit too large"` above `max_limit`.
    pub fn new(limit: u32, offset: u64, config: &PaginationConfig) -> Result<Self, EngineError> {
        if limit == 0 {
            return Err(EngineError::invalid_input("invalid limit"));
        }
        if limit > config.max_limit {
            return Err(EngineError::invalid_input("limit too large"));
        }
        Ok(Self { limit, offset })
    }

    /// Build a window from raw, possibly absent or signed, request parameters.
    ///
    /// A missing limit falls back to `default_limit`; a missing offset is 0.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] for a non-positive limit, a
    /// negative offset, or a limit above `max_limit`.
    pub fn from_params(
        limit: Option<i64>,
        offset: Option<i64>,
        config: &PaginationConfig,
    ) -> Result<Self, EngineError> {
        let limit = match limit {
            None => config.default_limit,
            Some(raw) if raw <= 0 => return Err(EngineError::invalid_input("invalid limit")),
            Some(raw) => u32::try_from(raw).unwrap_or(u32::MAX),
        };
        let offset = match offset {
            None => 0,
            Some(raw) if raw < 0 => return Err(EngineError::invalid_input("invalid offset")),
            Some(raw) => raw.unsigned_abs(),
        };
        Self::new(limit, offset, config)
    }

    /// The first page with the configured default size.
    pub const fn first(config: &PaginationConfig) -> Self {
        Self {
            limit: config.default_limit,
            offset: 0,
        }
    }

    /// Maximum number of records in the window.
    pub const fn limit(self) -> u32 {
        self.limit
    }

    /// Number of matching records skipped before the window.
    pub const fn offset(self) -> u64 {
        self.offset
    }

    /// The next window of the same size.
    #[must_use]
    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(u64::from(self.limit)),
        }
    }

    /// Apply the window to an already filtered and ordered sequence.
    pub fn slice<T>(self, items: impl Iterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.skip(skip).take(take).collect()
    }
}
