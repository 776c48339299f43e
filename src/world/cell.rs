use serde::{Deserialize, Serialize};
use std::fmt;

use crate::world::FactionId;

/// No cell ever holds more population than this.
pub const MAX_POPULATION: u32 = 499;

/// The eight king's-move offsets, in a fixed order.
pub const KING_DIRS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// === Position ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

impl Pos {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Offset this position, returning `None` when it would leave the
    /// non-negative quadrant. Upper bounds are the grid's business.
    pub fn offset(self, dx: i32, dy: i32) -> Option<Pos> {
        let x = i32::from(self.x) + dx;
        let y = i32::from(self.y) + dy;
        if x < 0 || y < 0 || x > i32::from(u16::MAX) || y > i32::from(u16::MAX) {
            return None;
        }
        Some(Pos::new(x as u16, y as u16))
    }

    /// Chebyshev distance: the number of king's steps between two cells
    /// on an empty board.
    pub fn king_distance(self, other: Pos) -> u32 {
        let dx = (i32::from(self.x) - i32::from(other.x)).unsigned_abs();
        let dy = (i32::from(self.y) - i32::from(other.y)).unsigned_abs();
        dx.max(dy)
    }

    /// Whether `other` is exactly one king's step away.
    pub fn is_king_step(self, other: Pos) -> bool {
        self.king_distance(other) == 1
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<[u16; 2]> for Pos {
    fn from([x, y]: [u16; 2]) -> Self {
        Pos::new(x, y)
    }
}

// === Terrain ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    /// Open land. Holds population but does not grow it.
    Plain,
    /// Natural barrier, permanently impassable.
    Mountain,
    /// Source of gold.
    Mine,
    Village,
    Town,
    /// The top settlement level.
    Fortress,
    /// A faction's seat. Losing it eliminates the founder.
    Capital,
    /// Outside the map's shape. Never entered, never owned.
    Void,
}

impl TerrainKind {
    pub const fn is_passable(self) -> bool {
        !matches!(self, TerrainKind::Mountain | TerrainKind::Void)
    }

    /// Population added per tick on an owned cell.
    pub const fn growth(self) -> u32 {
        match self {
            TerrainKind::Village => 1,
            TerrainKind::Town | TerrainKind::Capital => 2,
            TerrainKind::Fortress => 3,
            _ => 0,
        }
    }

    /// Growth stops once a cell reaches this population. Moves may still
    /// push a cell past it, up to [`MAX_POPULATION`].
    pub const fn growth_cap(self) -> u32 {
        match self {
            TerrainKind::Village => 100,
            TerrainKind::Town => 200,
            TerrainKind::Capital => 300,
            TerrainKind::Fortress => 400,
            _ => 0,
        }
    }

    /// The next settlement level and its price, if any.
    pub const fn upgrade(self) -> Option<(TerrainKind, u64)> {
        match self {
            TerrainKind::Plain => Some((TerrainKind::Village, PRICE_VILLAGE)),
            TerrainKind::Village => Some((TerrainKind::Town, PRICE_TOWN)),
            TerrainKind::Town => Some((TerrainKind::Fortress, PRICE_FORTRESS)),
            _ => None,
        }
    }

    /// The settlement level below this one. Tearing down is free.
    pub const fn degrade(self) -> Option<TerrainKind> {
        match self {
            TerrainKind::Fortress => Some(TerrainKind::Town),
            TerrainKind::Town => Some(TerrainKind::Village),
            TerrainKind::Village => Some(TerrainKind::Plain),
            _ => None,
        }
    }

    /// Parse one character of an explicit map layout.
    pub fn from_layout_char(c: char) -> Option<TerrainKind> {
        match c {
            '.' => Some(TerrainKind::Plain),
            '#' => Some(TerrainKind::Mountain),
            '$' => Some(TerrainKind::Mine),
            'v' => Some(TerrainKind::Village),
            't' => Some(TerrainKind::Town),
            'f' => Some(TerrainKind::Fortress),
            ' ' => Some(TerrainKind::Void),
            _ => None,
        }
    }

    pub const fn layout_char(self) -> char {
        match self {
            TerrainKind::Plain => '.',
            TerrainKind::Mountain => '#',
            TerrainKind::Mine => '$',
            TerrainKind::Village => 'v',
            TerrainKind::Town => 't',
            TerrainKind::Fortress => 'f',
            TerrainKind::Capital => 'C',
            TerrainKind::Void => ' ',
        }
    }
}

pub const PRICE_VILLAGE: u64 = 160;
pub const PRICE_TOWN: u64 = 240;
pub const PRICE_FORTRESS: u64 = 320;

// === Cell ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub pos: Pos,
    pub terrain: TerrainKind,
    /// `None` means unclaimed.
    pub owner: Option<FactionId>,
    pub population: u32,
    /// Set when a move into this cell was resolved as combat this tick.
    pub contested: bool,
}

impl Cell {
    pub fn new(pos: Pos, terrain: TerrainKind) -> Self {
        Self {
            pos,
            terrain,
            owner: None,
            population: 0,
            contested: false,
        }
    }

    pub fn is_owned_by(&self, faction: FactionId) -> bool {
        self.owner == Some(faction)
    }
}
