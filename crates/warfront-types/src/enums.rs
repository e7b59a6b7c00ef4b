//! Enumeration types for wars and battles.
//!
//! Every enum has a stable lowercase wire form (used in JSON, in event
//! payloads, and in the `PostgreSQL` `TEXT` columns) exposed through
//! `as_str` and parsed back through [`FromStr`](core::str::FromStr).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A string did not match any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    /// Name of the enum that failed to parse.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Implements `as_str`, `Display`, and `FromStr` from a variant/string table.
macro_rules! wire_strings {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Stable wire representation of this variant.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl core::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_owned(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// War
// ---------------------------------------------------------------------------

/// Lifecycle status of a war.
///
/// ```text
/// declared --start--> ongoing --complete--> completed
///     \
///      +--> cancelled (reserved, no operation reaches it yet)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WarStatus {
    /// Declared and in its preparation window.
    Declared,
    /// Started; battles may be created and scored.
    Ongoing,
    /// Finalized with a winner or a tie.
    Completed,
    /// Called off before starting.
    Cancelled,
}

wire_strings!(WarStatus {
    Declared => "declared",
    Ongoing => "ongoing",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl WarStatus {
    /// Whether the war has reached a terminal state (an end time is set).
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Finer-grained progress marker tracked alongside [`WarStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WarPhase {
    /// Between declaration and start.
    Preparation,
    /// Fighting is underway.
    Active,
    /// Wind-down before completion. Reserved.
    Ending,
    /// The war is over.
    Completed,
}

wire_strings!(WarPhase {
    Preparation => "preparation",
    Active => "active",
    Ending => "ending",
    Completed => "completed",
});

// ---------------------------------------------------------------------------
// Battle
// ---------------------------------------------------------------------------

/// Lifecycle status of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BattleStatus {
    /// Created, waiting for its start time.
    Scheduled,
    /// In progress; scores may change.
    Active,
    /// Finished; scores are frozen.
    Completed,
}

wire_strings!(BattleStatus {
    Scheduled => "scheduled",
    Active => "active",
    Completed => "completed",
});

/// What kind of engagement a battle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum BattleType {
    /// Territory capture.
    Territory,
    /// Siege of a fortified position.
    Siege,
    /// Anything else.
    Other,
}

wire_strings!(BattleType {
    Territory => "territory",
    Siege => "siege",
    Other => "other",
});

impl BattleType {
    /// All battle types, in declaration order.
    pub const ALL: [Self; 3] = [Self::Territory, Self::Siege, Self::Other];
}
