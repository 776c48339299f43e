use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{EngineError, EngineResult};
use crate::world::cell::Pos;

/// Most factions a single game supports, the neutral faction included.
pub const MAX_FACTIONS: usize = 8;

/// 1-based faction identifier, assigned in config order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u8);

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faction {}", self.0)
    }
}

/// Behavior of an AI king.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Never moves and never builds.
    Passive,
    /// Picks the single best move around its whole border each tick.
    Opportunist,
    /// Pushes toward one target at a time and re-targets when it is taken.
    OneGreedy,
    /// Attacks rivals whenever the odds are even slightly favorable.
    AggrGreedy,
    /// Like `OneGreedy`, but keeps its target across setbacks.
    PersistentGreedy,
    /// Values capitals and towns above everything else.
    Noble,
    /// Values mines, hoards gold and never attacks a stronger cell.
    Midas,
}

impl Strategy {
    pub const ALL: [Strategy; 7] = [
        Strategy::Passive,
        Strategy::Opportunist,
        Strategy::OneGreedy,
        Strategy::AggrGreedy,
        Strategy::PersistentGreedy,
        Strategy::Noble,
        Strategy::Midas,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easiest,
    Easy,
    #[default]
    Normal,
    Hard,
    Hardest,
}

impl Difficulty {
    /// Amplitude of the random jitter added to every candidate score.
    pub const fn jitter(self) -> u32 {
        match self {
            Difficulty::Easiest => 3,
            Difficulty::Easy => 1,
            _ => 0,
        }
    }

    /// Score bonus for a candidate move that is predicted to capture.
    pub const fn capture_bonus(self) -> i64 {
        match self {
            Difficulty::Hard => 2,
            Difficulty::Hardest => 4,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiProfile {
    pub strategy: Strategy,
    pub difficulty: Difficulty,
}

/// Who controls a faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactionKind {
    /// Moves are queued by the host.
    Human,
    /// Moves are chosen by the engine each tick.
    Ai(AiProfile),
    /// Never acts. Its cells are absorbed by whoever moves in.
    Neutral,
}

impl FactionKind {
    pub const fn is_neutral(self) -> bool {
        matches!(self, FactionKind::Neutral)
    }

    pub const fn is_human(self) -> bool {
        matches!(self, FactionKind::Human)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactionStatus {
    Active,
    Eliminated { at_tick: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub kind: FactionKind,
    pub gold: u64,
    /// The cell this faction was founded on.
    pub capital: Pos,
    pub status: FactionStatus,
    /// Cell an AI king is currently working toward.
    pub target: Option<Pos>,
}

impl Faction {
    pub fn new(id: FactionId, kind: FactionKind, capital: Pos) -> Self {
        Self {
            id,
            kind,
            gold: 0,
            capital,
            status: FactionStatus::Active,
            target: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == FactionStatus::Active
    }

    /// Active and not neutral: still in the running for the win.
    pub fn is_contender(&self) -> bool {
        self.is_active() && !self.kind.is_neutral()
    }
}

/// All factions of a game, indexed by id. Factions are never removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registry {
    factions: Vec<Faction>,
}

impl Registry {
    /// Build a registry from `(kind, capital)` pairs, assigning ids 1, 2, ...
    pub fn from_founders(founders: impl IntoIterator<Item = (FactionKind, Pos)>) -> Self {
        let factions = founders
            .into_iter()
            .enumerate()
            .map(|(i, (kind, capital))| Faction::new(FactionId(i as u8 + 1), kind, capital))
            .collect();
        Self { factions }
    }

    fn index(&self, id: FactionId) -> Option<usize> {
        let idx = usize::from(id.0).checked_sub(1)?;
        (idx < self.factions.len()).then_some(idx)
    }

    pub fn get(&self, id: FactionId) -> EngineResult<&Faction> {
        self.index(id)
            .map(|idx| &self.factions[idx])
            .ok_or(EngineError::UnknownFaction(id))
    }

    pub(crate) fn get_mut(&mut self, id: FactionId) -> EngineResult<&mut Faction> {
        match self.index(id) {
            Some(idx) => Ok(&mut self.factions[idx]),
            None => Err(EngineError::UnknownFaction(id)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Faction> {
        self.factions.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Faction> {
        self.factions.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.factions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FactionId> + '_ {
        self.factions.iter().map(|f| f.id)
    }

    pub fn gold(&self, id: FactionId) -> EngineResult<u64> {
        Ok(self.get(id)?.gold)
    }

    /// Adjust a faction's gold, saturating at zero and at `u64::MAX`.
    pub(crate) fn add_gold(&mut self, id: FactionId, delta: i64) -> EngineResult<u64> {
        let faction = self.get_mut(id)?;
        faction.gold = if delta >= 0 {
            faction.gold.saturating_add(delta.unsigned_abs())
        } else {
            faction.gold.saturating_sub(delta.unsigned_abs())
        };
        Ok(faction.gold)
    }

    /// Ids of factions still in the running, in id order.
    pub fn contenders(&self) -> Vec<FactionId> {
        self.factions
            .iter()
            .filter(|f| f.is_contender())
            .map(|f| f.id)
            .collect()
    }
}
