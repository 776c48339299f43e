use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::world::{FactionId, Grid, Registry, World};

/// Per-faction aggregates at the end of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionStatistics {
    pub id: FactionId,
    pub active: bool,
    pub cells: u32,
    pub population: u32,
    pub gold: u64,
}

/// Per-tick aggregate metrics for logging and introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStatistics {
    pub tick: u64,
    pub factions: Vec<FactionStatistics>,
    pub total_population: u64,
    pub owned_cells: u32,
    pub contested_cells: u32,
    pub commits: u32,
    pub rejections: u32,
}

/// Compute statistics for the current world state after a tick.
pub fn compute_statistics(world: &World, commits: u32, rejections: u32) -> TickStatistics {
    let grid = world.grid();
    let factions = world
        .factions()
        .iter()
        .map(|f| FactionStatistics {
            id: f.id,
            active: f.is_active(),
            cells: grid.count_owned(f.id),
            population: grid.population_of(f.id),
            gold: f.gold,
        })
        .collect();

    TickStatistics {
        tick: world.tick(),
        factions,
        total_population: grid.total_population(),
        owned_cells: grid.cells().iter().filter(|c| c.owner.is_some()).count() as u32,
        contested_cells: grid.cells().iter().filter(|c| c.contested).count() as u32,
        commits,
        rejections,
    }
}

/// One timeline sample: population per faction, in id order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineMark {
    pub tick: u64,
    pub population: Vec<u32>,
}

/// Bounded history of faction populations, sampled every `interval` ticks.
/// Once full, the oldest mark is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    interval: u64,
    marks: VecDeque<TimelineMark>,
}

impl Timeline {
    pub const MAX_MARKS: usize = 72;

    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            marks: VecDeque::with_capacity(Self::MAX_MARKS),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_due(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    pub fn record(&mut self, tick: u64, grid: &Grid, factions: &Registry) {
        if self.marks.len() == Self::MAX_MARKS {
            self.marks.pop_front();
        }
        self.marks.push_back(TimelineMark {
            tick,
            population: factions.ids().map(|id| grid.population_of(id)).collect(),
        });
    }

    pub fn marks(&self) -> impl Iterator<Item = &TimelineMark> {
        self.marks.iter()
    }

    pub fn latest(&self) -> Option<&TimelineMark> {
        self.marks.back()
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
