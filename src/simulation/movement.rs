//! The king's move: shifting population from an owned cell into one of its
//! eight neighbors, claiming, reinforcing or attacking it.
//!
//! [`probe`] validates and predicts a single move without touching the world
//! or its random stream. [`commit`] carries out every queued move of a tick
//! at once, so the order in which they are listed never changes the result.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineResult, MoveRejection};
use crate::simulation::{CommittedMove, RejectedMove};
use crate::world::{FactionId, Pos, TerrainKind, World, MAX_POPULATION};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KingsMove {
    pub faction: FactionId,
    pub from: Pos,
    pub to: Pos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Took an unclaimed or neutral cell.
    Claimed,
    /// Moved into a cell the faction already held.
    Reinforced,
    /// Beat the defender and took the cell.
    Captured,
    /// Lost the fight; the cell went to, or stayed with, another faction.
    Repelled,
    /// Equal strengths; the tied sides are wiped out. `attacker_won` is
    /// `None` in a prediction and tells whether the mover got the cell once
    /// committed.
    Tie { attacker_won: Option<bool> },
}

impl Resolution {
    pub fn is_combat(self) -> bool {
        matches!(
            self,
            Resolution::Captured | Resolution::Repelled | Resolution::Tie { .. }
        )
    }

    /// Whether the mover holds the target afterwards.
    pub fn mover_holds_target(self) -> bool {
        match self {
            Resolution::Claimed | Resolution::Reinforced | Resolution::Captured => true,
            Resolution::Repelled => false,
            Resolution::Tie { attacker_won } => attacker_won.unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub resolution: Resolution,
    /// Units that left the source cell.
    pub moved: u32,
    /// Owner of the target before the move.
    pub previous_owner: Option<FactionId>,
    /// Population of the target after the move.
    pub target_population: u32,
    /// Units lost at the target, all sides together. Every move into the
    /// same cell reports the same figure.
    pub destroyed: u32,
}

/// Validate a move and predict its outcome.
///
/// Checks run in a fixed order and the first failure is reported: faction
/// known and active, both cells in bounds, source owned, source populated,
/// target adjacent, target passable, target not full.
pub fn probe(world: &World, order: KingsMove) -> EngineResult<MoveOutcome> {
    let KingsMove { faction, from, to } = order;

    if !world.factions.get(faction)?.is_active() {
        return Err(MoveRejection::FactionEliminated.into());
    }

    let source = world.grid.at(from)?;
    let target = world.grid.at(to)?;

    if source.owner != Some(faction) {
        return Err(MoveRejection::NotOwner {
            owner: source.owner,
        }
        .into());
    }
    if source.population == 0 {
        return Err(MoveRejection::EmptySource.into());
    }
    if !from.is_king_step(to) {
        return Err(MoveRejection::NotAdjacent.into());
    }
    match target.terrain {
        TerrainKind::Mountain => return Err(MoveRejection::Mountain.into()),
        TerrainKind::Void => return Err(MoveRejection::Void.into()),
        _ => {}
    }

    let amount = world.config.rules.move_rule.amount(source.population);
    let absorbs = match target.owner {
        None => true,
        Some(owner) if owner == faction => true,
        Some(owner) => world.factions.get(owner)?.kind.is_neutral(),
    };

    if absorbs {
        let room = MAX_POPULATION.saturating_sub(target.population);
        let moved = amount.min(room);
        if moved == 0 {
            return Err(MoveRejection::TargetFull.into());
        }
        let resolution = if target.owner == Some(faction) {
            Resolution::Reinforced
        } else {
            Resolution::Claimed
        };
        return Ok(MoveOutcome {
            resolution,
            moved,
            previous_owner: target.owner,
            target_population: target.population + moved,
            destroyed: 0,
        });
    }

    let defense = target.population;
    let (resolution, target_population, destroyed) = if amount > defense {
        (Resolution::Captured, amount - defense, 2 * defense)
    } else if amount < defense {
        (Resolution::Repelled, defense - amount, 2 * amount)
    } else {
        (Resolution::Tie { attacker_won: None }, 0, 2 * amount)
    };

    Ok(MoveOutcome {
        resolution,
        moved: amount,
        previous_owner: target.owner,
        target_population,
        destroyed,
    })
}

/// Moves that survived validation and moves that did not, after one commit.
#[derive(Debug, Default)]
pub(crate) struct CommitReport {
    /// In faction-id order.
    pub committed: Vec<CommittedMove>,
    pub rejected: Vec<RejectedMove>,
    /// Units lost in combat over all contested cells.
    pub combat_losses: u64,
}

/// Commit a batch of moves, at most one per faction, as one simultaneous step.
///
/// Every order is validated and sized against the state at the start of the
/// commit. All departures leave their sources first; arrivals are then
/// settled per target cell. The only draw is the tie-break between sides of
/// exactly equal strength.
pub(crate) fn commit(world: &mut World, orders: Vec<KingsMove>) -> EngineResult<CommitReport> {
    let mut report = CommitReport::default();

    let mut accepted = Vec::with_capacity(orders.len());
    for order in orders {
        match probe(world, order) {
            Ok(outcome) => accepted.push((order, outcome.moved)),
            Err(reason) => report.rejected.push(RejectedMove { order, reason }),
        }
    }

    for (order, moved) in &accepted {
        let source = world.grid.at_mut(order.from)?;
        source.population = source.population.saturating_sub(*moved);
    }

    let mut by_target: BTreeMap<Pos, Vec<(KingsMove, u32)>> = BTreeMap::new();
    for (order, moved) in accepted {
        by_target.entry(order.to).or_default().push((order, moved));
    }

    for (to, arrivals) in by_target {
        let (outcomes, losses) = settle(world, to, &arrivals)?;
        report.combat_losses += u64::from(losses);
        report.committed.extend(outcomes);
    }
    report.committed.sort_by_key(|c| c.order.faction);

    Ok(report)
}

/// Resolve every arrival at one cell.
///
/// Each arriving faction is a side with the units it moved; a contender
/// holding the cell is a side with the population left there plus its own
/// arrival. Unclaimed and neutral population is not a side and joins
/// whoever ends up with the cell. With a single side the cell is claimed or
/// reinforced. Otherwise the strongest side takes the cell with its lead
/// over the runner-up; equal leaders leave it empty and the random stream
/// picks the owner among them.
///
/// Returns the outcome of each arrival and the units lost at this cell.
fn settle(
    world: &mut World,
    to: Pos,
    arrivals: &[(KingsMove, u32)],
) -> EngineResult<(Vec<CommittedMove>, u32)> {
    let cell = world.grid.at(to)?;
    let previous_owner = cell.owner;
    let base = cell.population;
    let holder = match cell.owner {
        Some(owner) if !world.factions.get(owner)?.kind.is_neutral() => Some(owner),
        _ => None,
    };
    let pool = if holder.is_some() { 0 } else { base };

    // Attackers in faction-id order, then the holder.
    let mut sides: Vec<(FactionId, u32)> = Vec::with_capacity(arrivals.len() + 1);
    let mut held = base - pool;
    for &(order, moved) in arrivals {
        if Some(order.faction) == holder {
            held += moved;
        } else {
            sides.push((order.faction, moved));
        }
    }
    if let Some(holder) = holder {
        sides.push((holder, held));
    }

    let combat = sides.len() > 1;
    let top = sides.iter().map(|&(_, strength)| strength).max().unwrap_or(0);
    let leaders: Vec<FactionId> = sides
        .iter()
        .filter(|&&(_, strength)| strength == top)
        .map(|&(id, _)| id)
        .collect();
    let tied = leaders.len() > 1;

    let (winner, remaining) = if tied {
        let pick = world.rng.pick_index(leaders.len()).unwrap_or(0);
        (leaders[pick], 0)
    } else {
        let runner_up = sides
            .iter()
            .filter(|&&(id, _)| id != leaders[0])
            .map(|&(_, strength)| strength)
            .max()
            .unwrap_or(0);
        (leaders[0], top - runner_up)
    };

    let total: u32 = sides.iter().map(|&(_, strength)| strength).sum::<u32>() + pool;
    let population = (remaining + pool).min(MAX_POPULATION);
    let losses = total - population;

    let target = world.grid.at_mut(to)?;
    target.owner = Some(winner);
    target.population = population;
    if combat {
        target.contested = true;
    }

    let outcomes = arrivals
        .iter()
        .map(|&(order, moved)| {
            let mover = order.faction;
            let resolution = if !combat {
                if previous_owner == Some(mover) {
                    Resolution::Reinforced
                } else {
                    Resolution::Claimed
                }
            } else if tied && leaders.contains(&mover) {
                Resolution::Tie {
                    attacker_won: Some(winner == mover),
                }
            } else if winner == mover {
                if holder == Some(mover) {
                    Resolution::Reinforced
                } else {
                    Resolution::Captured
                }
            } else {
                Resolution::Repelled
            };
            CommittedMove {
                order,
                outcome: MoveOutcome {
                    resolution,
                    moved,
                    previous_owner,
                    target_population: population,
                    destroyed: losses,
                },
            }
        })
        .collect();

    Ok((outcomes, losses))
}
