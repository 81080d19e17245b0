//! Engine errors.
//!
//! Four families, each handled differently by the scheduler:
//!
//! | Family        | Variants                                         | Handling                      |
//! |---------------|--------------------------------------------------|-------------------------------|
//! | transient     | `Persistence`, `LeaseLost`                       | log, drop tick, retry next    |
//! | timeout       | `DispatchTimeout`                                | abandon, force-release lock   |
//! | configuration | `UnknownMineType`, `UnknownEncounterKind`, `InvalidConfig`, `InvalidDocument` | skip channel tick |
//! | domain        | `ItemNotOwned`, `PlayerNotInMine`, `TileOccupied`, `OutOfBounds` | surface to caller |

use std::time::Duration;

use crate::core::{ChannelId, PlayerId, Position};

/// Errors raised by collaborator implementations (persistence, health,
/// equipment, activity).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable or the request failed in flight.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No instance document for the channel.
    #[error("no instance stored for {0}")]
    InstanceNotFound(ChannelId),

    /// The player does not hold the item.
    #[error("{player} does not own item {item}")]
    ItemNotOwned {
        /// Acting player.
        player: PlayerId,
        /// Item key.
        item: String,
    },
}

/// Crate-wide error type.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Transient persistence failure. The stored document stays the source
    /// of truth; the tick is retried on the next cycle.
    #[error("persistence failure: {0}")]
    Persistence(StoreError),

    /// The channel lock expired or was taken over before the tick could be
    /// saved.
    #[error("lost the lock on {0}")]
    LeaseLost(ChannelId),

    /// Dispatch exceeded its mine type's time budget.
    #[error("dispatch for {channel} timed out after {after:?}")]
    DispatchTimeout {
        /// Channel being dispatched.
        channel: ChannelId,
        /// Budget that elapsed.
        after: Duration,
    },

    /// No script registered for the mine type.
    #[error("unknown mine type `{0}`")]
    UnknownMineType(String),

    /// Encounter name not recognised.
    #[error("unknown encounter kind `{0}`")]
    UnknownEncounterKind(String),

    /// Stored instance document could not be decoded or encoded. Retrying
    /// will not help until the document is repaired.
    #[error("invalid instance document: {0}")]
    InvalidDocument(String),

    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Acting on an item the player does not hold.
    #[error("{player} does not own item {item}")]
    ItemNotOwned {
        /// Acting player.
        player: PlayerId,
        /// Item key.
        item: String,
    },

    /// Player has no position in this instance.
    #[error("{player} is not in the mine on {channel}")]
    PlayerNotInMine {
        /// Player.
        player: PlayerId,
        /// Channel.
        channel: ChannelId,
    },

    /// Tile already carries an encounter.
    #[error("tile {0} already has an encounter")]
    TileOccupied(Position),

    /// Position outside the grid.
    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ItemNotOwned { player, item } => EngineError::ItemNotOwned { player, item },
            StoreError::Serialization(msg) => EngineError::InvalidDocument(msg),
            other => EngineError::Persistence(other),
        }
    }
}

impl EngineError {
    /// Whether the failure should simply be retried on the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Persistence(_) | EngineError::LeaseLost(_) | EngineError::DispatchTimeout { .. }
        )
    }

    /// Whether the failure comes from missing or malformed configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            EngineError::UnknownMineType(_)
                | EngineError::UnknownEncounterKind(_)
                | EngineError::InvalidConfig(_)
                | EngineError::InvalidDocument(_)
        )
    }
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;
