use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};
use crate::world::cell::{Cell, Pos, TerrainKind, KING_DIRS};
use crate::world::FactionId;

/// Largest supported grid.
pub const MAX_WIDTH: u16 = 40;
pub const MAX_HEIGHT: u16 = 29;

/// Fixed-size rectangular grid of cells, stored row-major.
///
/// Reads are public; every write goes through crate-private accessors used by
/// world generation, the tick engine, the movement rule and the build rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Grid {
    /// Create a grid of plain, unclaimed cells.
    ///
    /// Returns `None` if either dimension is zero.
    pub fn new(width: u16, height: u16) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let mut cells = Vec::with_capacity(usize::from(width) * usize::from(height));
        for y in 0..height {
            for x in 0..width {
                cells.push(Cell::new(Pos::new(x, y), TerrainKind::Plain));
            }
        }

        Some(Self {
            width,
            height,
            cells,
        })
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub const fn height(&self) -> u16 {
        self.height
    }

    pub const fn in_bounds(&self, pos: Pos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Row-major index of `pos`.
    pub(crate) fn index(&self, pos: Pos) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(usize::from(pos.y) * usize::from(self.width) + usize::from(pos.x))
        } else {
            None
        }
    }

    /// The cell at `pos`.
    pub fn at(&self, pos: Pos) -> EngineResult<&Cell> {
        self.index(pos)
            .map(|idx| &self.cells[idx])
            .ok_or(EngineError::OutOfBounds(pos))
    }

    pub(crate) fn at_mut(&mut self, pos: Pos) -> EngineResult<&mut Cell> {
        match self.index(pos) {
            Some(idx) => Ok(&mut self.cells[idx]),
            None => Err(EngineError::OutOfBounds(pos)),
        }
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// In-bounds, non-mountain cells one king's step from `pos`.
    ///
    /// A mountain has no neighbors, and mountains never appear as neighbors,
    /// which keeps the relation symmetric.
    pub fn neighbors(&self, pos: Pos) -> EngineResult<Vec<Pos>> {
        let cell = self.at(pos)?;
        if !cell.terrain.is_passable() {
            return Ok(Vec::new());
        }
        Ok(self.passable_steps(pos).collect())
    }

    /// Same as [`Grid::neighbors`] for a position already known to be in bounds
    /// and passable.
    pub(crate) fn passable_steps(&self, pos: Pos) -> impl Iterator<Item = Pos> + '_ {
        KING_DIRS.iter().filter_map(move |&(dx, dy)| {
            let next = pos.offset(dx, dy)?;
            let cell = self.at(next).ok()?;
            cell.terrain.is_passable().then_some(next)
        })
    }

    /// Whether `to` is in the neighbor set of `from`.
    pub fn is_adjacent(&self, from: Pos, to: Pos) -> bool {
        if !from.is_king_step(to) {
            return false;
        }
        match (self.at(from), self.at(to)) {
            (Ok(a), Ok(b)) => a.terrain.is_passable() && b.terrain.is_passable(),
            _ => false,
        }
    }

    /// Iterate over the cells held by a faction.
    pub fn cells_owned_by(&self, faction: FactionId) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(move |c| c.owner == Some(faction))
    }

    pub fn count_owned(&self, faction: FactionId) -> u32 {
        self.cells_owned_by(faction).count() as u32
    }

    pub fn count_owned_of(&self, faction: FactionId, terrain: TerrainKind) -> u32 {
        self.cells_owned_by(faction)
            .filter(|c| c.terrain == terrain)
            .count() as u32
    }

    /// Population summed over a faction's cells.
    pub fn population_of(&self, faction: FactionId) -> u32 {
        self.cells_owned_by(faction).map(|c| c.population).sum()
    }

    /// Population summed over the whole grid.
    pub fn total_population(&self) -> u64 {
        self.cells.iter().map(|c| u64::from(c.population)).sum()
    }

    /// King's-step distance from `start` to every cell over passable cells,
    /// row-major. `None` marks cells that cannot be reached.
    pub fn distances_from(&self, start: Pos) -> Vec<Option<u32>> {
        let mut dist = vec![None; self.cells.len()];
        let Some(start_idx) = self.index(start) else {
            return dist;
        };
        if !self.cells[start_idx].terrain.is_passable() {
            return dist;
        }

        let mut queue = VecDeque::new();
        dist[start_idx] = Some(0);
        queue.push_back((start, 0u32));

        while let Some((pos, d)) = queue.pop_front() {
            for next in self.passable_steps(pos) {
                if let Some(idx) = self.index(next) {
                    if dist[idx].is_none() {
                        dist[idx] = Some(d + 1);
                        queue.push_back((next, d + 1));
                    }
                }
            }
        }
        dist
    }

    /// Whether every position in `points` can reach every other by king's
    /// steps over passable cells.
    pub fn is_connected(&self, points: &[Pos]) -> bool {
        let Some(&start) = points.first() else {
            return true;
        };
        let dist = self.distances_from(start);
        points
            .iter()
            .all(|&p| self.index(p).is_some_and(|idx| dist[idx].is_some()))
    }

    /// Render terrain as layout rows, capitals shown as `C`.
    pub fn layout_rows(&self) -> Vec<String> {
        self.cells
            .chunks(usize::from(self.width))
            .map(|row| row.iter().map(|c| c.terrain.layout_char()).collect())
            .collect()
    }
}
