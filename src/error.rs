//! Error taxonomy for the engine.
//!
//! Every failing engine operation is atomic: when one of these is returned the
//! world is exactly as it was before the call.

use std::fmt;

use crate::session::GameHandle;
use crate::world::{FactionId, Pos, TerrainKind};

/// Why a king's move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// The faction has already been eliminated.
    FactionEliminated,
    /// Only human factions accept queued moves from the host.
    NotControllable,
    /// The source cell is not held by the moving faction.
    NotOwner {
        /// Current owner of the source cell.
        owner: Option<FactionId>,
    },
    /// The source cell has no population to move.
    EmptySource,
    /// The target is not one king's step away from the source.
    NotAdjacent,
    /// Mountains can never be entered.
    Mountain,
    /// Void cells lie outside the map shape.
    Void,
    /// The target cannot take any more population.
    TargetFull,
}

impl fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveRejection::FactionEliminated => write!(f, "faction is eliminated"),
            MoveRejection::NotControllable => write!(f, "faction does not accept host moves"),
            MoveRejection::NotOwner { owner: Some(owner) } => {
                write!(f, "source cell is held by {}", owner)
            }
            MoveRejection::NotOwner { owner: None } => write!(f, "source cell is unclaimed"),
            MoveRejection::EmptySource => write!(f, "source cell has no population"),
            MoveRejection::NotAdjacent => write!(f, "target is not adjacent to source"),
            MoveRejection::Mountain => write!(f, "target is a mountain"),
            MoveRejection::Void => write!(f, "target is outside the map"),
            MoveRejection::TargetFull => write!(f, "target cell is full"),
        }
    }
}

/// Why a settlement upgrade or degrade was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildRejection {
    /// The faction has already been eliminated.
    FactionEliminated,
    /// Only human factions accept queued builds from the host.
    NotControllable,
    /// The cell is not held by the building faction.
    NotOwner,
    /// This terrain has no further upgrade.
    NotUpgradable(TerrainKind),
    /// A fortress is already the top settlement tier.
    UpgradeTopLevelBuilding,
    /// A plain has nothing left to degrade.
    DegradePlain,
    /// This terrain is not a settlement and cannot be degraded.
    NotDegradable(TerrainKind),
    /// Not enough gold for the upgrade.
    InsufficientGold {
        /// Price of the upgrade.
        required: u64,
        /// Gold the faction holds.
        owning: u64,
    },
}

impl fmt::Display for BuildRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildRejection::FactionEliminated => write!(f, "faction is eliminated"),
            BuildRejection::NotControllable => write!(f, "faction does not accept host builds"),
            BuildRejection::NotOwner => write!(f, "cell is not owned by the faction"),
            BuildRejection::NotUpgradable(kind) => write!(f, "{:?} cannot be upgraded", kind),
            BuildRejection::UpgradeTopLevelBuilding => {
                write!(f, "fortress is the top-level building")
            }
            BuildRejection::DegradePlain => write!(f, "plain cannot be degraded"),
            BuildRejection::NotDegradable(kind) => write!(f, "{:?} cannot be degraded", kind),
            BuildRejection::InsufficientGold { required, owning } => {
                write!(f, "gold not enough: required {}, faction owns {}", required, owning)
            }
        }
    }
}

/// Errors returned by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The game configuration is unusable; no world was built.
    Configuration(String),
    /// Coordinate outside the grid.
    OutOfBounds(Pos),
    /// A king's move was refused.
    InvalidMove(MoveRejection),
    /// A settlement upgrade or degrade was refused.
    InvalidBuild(BuildRejection),
    /// No faction with this id exists.
    UnknownFaction(FactionId),
    /// The game has already ended.
    GameOver,
    /// The session handle was released or never issued.
    StaleHandle(GameHandle),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            EngineError::OutOfBounds(pos) => {
                write!(f, "location {} out of width and height bounds", pos)
            }
            EngineError::InvalidMove(reason) => write!(f, "Invalid move: {}", reason),
            EngineError::InvalidBuild(reason) => write!(f, "Invalid build: {}", reason),
            EngineError::UnknownFaction(id) => write!(f, "Unknown faction: {}", id),
            EngineError::GameOver => write!(f, "The game is over"),
            EngineError::StaleHandle(handle) => write!(f, "Stale game handle: {}", handle),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<MoveRejection> for EngineError {
    fn from(reason: MoveRejection) -> Self {
        EngineError::InvalidMove(reason)
    }
}

impl From<BuildRejection> for EngineError {
    fn from(reason: BuildRejection) -> Self {
        EngineError::InvalidBuild(reason)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
