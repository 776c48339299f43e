//! Registry of live games owned by one host.
//!
//! Handles carry a generation counter so that a handle to a released game
//! never reaches a game created later in the same slot.

use std::fmt;

use tracing::debug;

use crate::config::GameConfig;
use crate::error::{EngineError, EngineResult};
use crate::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for GameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game #{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    world: Option<World>,
}

/// Independent games addressed by [`GameHandle`]. Games share no state.
#[derive(Debug, Default)]
pub struct GameRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a game from `config` and register it.
    pub fn create(&mut self, config: GameConfig) -> EngineResult<GameHandle> {
        let world = World::new(config)?;
        Ok(self.insert(world))
    }

    /// Register an existing world, e.g. one restored from a snapshot.
    pub fn insert(&mut self, world: World) -> GameHandle {
        let seed = world.seed();
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.world = Some(world);
                GameHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    world: Some(world),
                });
                GameHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.live += 1;
        debug!(%handle, seed, "Game registered");
        handle
    }

    fn slot(&self, handle: GameHandle) -> Option<&Slot> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
    }

    pub fn get(&self, handle: GameHandle) -> EngineResult<&World> {
        self.slot(handle)
            .and_then(|s| s.world.as_ref())
            .ok_or(EngineError::StaleHandle(handle))
    }

    pub fn get_mut(&mut self, handle: GameHandle) -> EngineResult<&mut World> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.world.as_mut())
            .ok_or(EngineError::StaleHandle(handle))
    }

    /// Remove a game and hand it back. The handle is invalid afterwards.
    pub fn release(&mut self, handle: GameHandle) -> EngineResult<World> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .ok_or(EngineError::StaleHandle(handle))?;
        let world = slot.world.take().ok_or(EngineError::StaleHandle(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        debug!(%handle, "Game released");
        Ok(world)
    }

    pub fn handles(&self) -> impl Iterator<Item = GameHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.world.as_ref().map(|_| GameHandle {
                index: i as u32,
                generation: s.generation,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
