//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Wars, battles, territories, and factions each get a distinct ID type so
//! a battle ID can never be passed where a war ID is expected. IDs are
//! generated as UUID v7 (time-ordered) for index locality in `PostgreSQL`.
//!
//! Factions are owned by another service; [`FactionId`] is an opaque
//! reference and this crate never generates one outside of tests.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The nil identifier (all zero bits). Never a valid reference.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Whether this is the nil identifier.
            pub const fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a declared war.
    WarId
}

define_id! {
    /// Unique identifier for a battle fought inside a war.
    BattleId
}

define_id! {
    /// Unique identifier for a contestable territory.
    TerritoryId
}

define_id! {
    /// Opaque identifier of a faction (attacker, defender, or ally).
    FactionId
}

define_id! {
    /// Unique identifier for a published domain event.
    EventId
}
