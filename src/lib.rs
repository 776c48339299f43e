//! Deterministic territorial-conquest engine.
//!
//! A [`World`] owns a grid of cells, a registry of factions and a seeded
//! random stream. Hosts queue king's moves and settlement builds, then call
//! [`World::simulate`] to advance one tick.

pub mod cli;
pub mod config;
pub mod error;
pub mod persistence;
pub mod session;
pub mod simulation;
pub mod world;

pub use config::{FactionSpec, GameConfig, MoveRule, RunConfig};
pub use error::{BuildRejection, EngineError, EngineResult, MoveRejection};
pub use session::{GameHandle, GameRegistry};
pub use simulation::movement::{KingsMove, MoveOutcome, Resolution};
pub use simulation::TickReport;
pub use world::{Cell, FactionId, GameStatus, Pos, TerrainKind, World};
