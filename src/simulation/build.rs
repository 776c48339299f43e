use serde::{Deserialize, Serialize};

use crate::error::{BuildRejection, EngineResult};
use crate::world::{FactionId, Pos, TerrainKind, World};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildAction {
    /// Raise the settlement one tier for gold.
    Upgrade,
    /// Tear the settlement down one tier, for free.
    Degrade,
}

/// A queued build order. A faction holds at most one per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOrder {
    pub pos: Pos,
    pub action: BuildAction,
}

impl BuildOrder {
    pub fn upgrade(pos: Pos) -> Self {
        Self {
            pos,
            action: BuildAction::Upgrade,
        }
    }

    pub fn degrade(pos: Pos) -> Self {
        Self {
            pos,
            action: BuildAction::Degrade,
        }
    }
}

/// A committed upgrade or degrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub faction: FactionId,
    pub pos: Pos,
    pub from: TerrainKind,
    pub to: TerrainKind,
    /// Zero for a degrade.
    pub price: u64,
}

/// Check that `faction` may carry out `order` right now.
/// Returns the resulting terrain and its price.
pub fn check(
    world: &World,
    faction: FactionId,
    order: BuildOrder,
) -> EngineResult<(TerrainKind, u64)> {
    let f = world.factions.get(faction)?;
    if !f.is_active() {
        return Err(BuildRejection::FactionEliminated.into());
    }

    let cell = world.grid.at(order.pos)?;
    if cell.owner != Some(faction) {
        return Err(BuildRejection::NotOwner.into());
    }

    match order.action {
        BuildAction::Upgrade => {
            let (next, price) = match (cell.terrain, cell.terrain.upgrade()) {
                (_, Some(step)) => step,
                (TerrainKind::Fortress, None) => {
                    return Err(BuildRejection::UpgradeTopLevelBuilding.into());
                }
                (kind, None) => return Err(BuildRejection::NotUpgradable(kind).into()),
            };
            if f.gold < price {
                return Err(BuildRejection::InsufficientGold {
                    required: price,
                    owning: f.gold,
                }
                .into());
            }
            Ok((next, price))
        }
        BuildAction::Degrade => match (cell.terrain, cell.terrain.degrade()) {
            (_, Some(lower)) => Ok((lower, 0)),
            (TerrainKind::Plain, None) => Err(BuildRejection::DegradePlain.into()),
            (kind, None) => Err(BuildRejection::NotDegradable(kind).into()),
        },
    }
}

/// Change the cell's terrain and charge the faction. Population is kept even
/// above a lowered growth cap. On error nothing has changed.
pub(crate) fn apply(
    world: &mut World,
    faction: FactionId,
    order: BuildOrder,
) -> EngineResult<BuildOutcome> {
    let (next, price) = check(world, faction, order)?;

    let cell = world.grid.at_mut(order.pos)?;
    let from = cell.terrain;
    cell.terrain = next;
    if price > 0 {
        world.factions.add_gold(faction, -(price as i64))?;
    }

    Ok(BuildOutcome {
        faction,
        pos: order.pos,
        from,
        to: next,
        price,
    })
}
