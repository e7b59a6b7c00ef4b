//! Error model for the lifecycle managers.
//!
//! Every operation returns [`EngineError`]. Transport layers map errors by
//! [`EngineError::kind`] rather than by matching on messages; callers that
//! need the exact rule compare against the constants in [`reason`].

use chrono::{DateTime, Utc};

use crate::store::StoreError;

/// Errors returned by lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request is malformed (nil identifier, same faction twice, ...).
    #[error("{0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The identifier that did not resolve.
        id: String,
    },

    /// The record exists but is not in a state that allows the operation.
    #[error("{0}")]
    InvalidState(String),

    /// A time-gated transition was attempted before its scheduled start.
    #[error("too early: scheduled for {scheduled}, now {now}")]
    TooEarly {
        /// The earliest allowed moment.
        scheduled: DateTime<Utc>,
        /// The moment of the attempt.
        now: DateTime<Utc>,
    },

    /// The store failed. Always propagated to the caller.
    #[error("infrastructure failure: {0}")]
    Infrastructure(StoreError),
}

impl EngineError {
    /// Shorthand for [`EngineError::InvalidInput`].
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// Shorthand for [`EngineError::InvalidState`].
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }

    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The stable category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::TooEarly { .. } => ErrorKind::TooEarly,
            Self::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            // A lost compare-and-set means another caller moved the record first.
            StoreError::Conflict(reason) => Self::InvalidState(reason),
            other @ (StoreError::Backend(_) | StoreError::Contended(_)) => {
                Self::Infrastructure(other)
            }
        }
    }
}

/// Fixed `InvalidState` reasons, stable across releases.
pub mod reason {
    /// Start of a war that is not `declared`.
    pub const WAR_ALREADY_STARTED: &str = "war is already started";
    /// Completion of a war that is not `ongoing`.
    pub const WAR_CANNOT_BE_COMPLETED: &str = "war cannot be completed";
    /// A battle was planned under a war that is not `ongoing`.
    pub const WAR_NOT_ACTIVE: &str = "war is not active";
    /// Start of a battle that is not `scheduled`.
    pub const BATTLE_NOT_SCHEDULED: &str = "battle is not scheduled";
    /// Score change or completion of a battle that is not `active`.
    pub const BATTLE_NOT_ACTIVE: &str = "battle is not active";
    /// A score update that would lower either side.
    pub const SCORES_CANNOT_DECREASE: &str = "battle scores cannot decrease";
}

/// Error categories, stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`EngineError::InvalidInput`].
    InvalidInput,
    /// See [`EngineError::NotFound`].
    NotFound,
    /// See [`EngineError::InvalidState`].
    InvalidState,
    /// See [`EngineError::TooEarly`].
    TooEarly,
    /// See [`EngineError::Infrastructure`].
    Infrastructure,
}

impl ErrorKind {
    /// Machine-readable code for transport mapping.
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::InvalidState => "invalid_state",
            Self::TooEarly => "too_early",
            Self::Infrastructure => "infrastructure",
        }
    }
}
