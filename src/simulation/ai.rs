//! AI kings.
//!
//! Each tick an AI faction scores its surroundings, probes every move out of
//! its cells and commits to the best one. Scores are in sixteenths so that
//! distance decay can halve values without floating point.

use std::collections::VecDeque;

use crate::simulation::build::{self, BuildOrder};
use crate::simulation::movement::{self, KingsMove, MoveOutcome, Resolution};
use crate::world::{
    AiProfile, FactionId, FactionKind, Grid, Pos, Strategy, TerrainKind, World, MAX_POPULATION,
};

const SCALE: i64 = 16;

/// Terrain values spread this many king's steps, halving at each step.
const SPREAD_RADIUS: i32 = 4;

/// Per-strategy weights.
#[derive(Debug, Clone, Copy)]
struct Params {
    land: i64,
    village: i64,
    town: i64,
    fortress: i64,
    capital: i64,
    mine: i64,
    /// Cells at or below this population never send units out.
    garrison: u32,
    /// Attacking strength needed, as a percentage of the defense.
    attack_ratio_pct: u64,
    /// Extra value on cells of rivals smaller than this faction.
    weak_bias: i64,
    /// Weight of closing in on the target cell. Zero means no target.
    focus: i64,
    /// Keep the target even when it has grown out of reach.
    persistent: bool,
    /// Only engage when the probe predicts an outright capture.
    cautious: bool,
    builds: bool,
}

const BASE: Params = Params {
    land: 1,
    village: 4,
    town: 8,
    fortress: 16,
    capital: 16,
    mine: 4,
    garrison: 1,
    attack_ratio_pct: 100,
    weak_bias: 1,
    focus: 0,
    persistent: false,
    cautious: false,
    builds: true,
};

fn params(strategy: Strategy) -> Option<Params> {
    let p = match strategy {
        Strategy::Passive => return None,
        Strategy::Opportunist => Params {
            garrison: 2,
            attack_ratio_pct: 150,
            weak_bias: 2,
            cautious: true,
            ..BASE
        },
        Strategy::OneGreedy => Params {
            attack_ratio_pct: 120,
            focus: 3,
            ..BASE
        },
        Strategy::AggrGreedy => Params {
            garrison: 0,
            weak_bias: 3,
            ..BASE
        },
        Strategy::PersistentGreedy => Params {
            land: 2,
            attack_ratio_pct: 110,
            focus: 4,
            persistent: true,
            ..BASE
        },
        Strategy::Noble => Params {
            village: 2,
            capital: 32,
            fortress: 32,
            garrison: 2,
            attack_ratio_pct: 130,
            weak_bias: 2,
            focus: 2,
            ..BASE
        },
        Strategy::Midas => Params {
            mine: 8,
            weak_bias: 0,
            cautious: true,
            builds: false,
            ..BASE
        },
    };
    Some(p)
}

/// What one AI faction wants to do this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decision {
    pub order: Option<KingsMove>,
    pub build: Option<Pos>,
}

/// Decision phase: every active AI faction, in id order, picks at most one
/// move and one build and queues them for the commit phase.
pub(crate) fn decide_all(world: &mut World) {
    let deciders: Vec<(FactionId, AiProfile)> = world
        .factions
        .iter()
        .filter(|f| f.is_active())
        .filter_map(|f| match f.kind {
            FactionKind::Ai(profile) => Some((f.id, profile)),
            _ => None,
        })
        .collect();

    for (id, profile) in deciders {
        let decision = decide(world, id, profile);
        if let Some(order) = decision.order {
            world.pending.moves.insert(id, order);
        }
        if let Some(pos) = decision.build {
            world.pending.builds.insert(id, BuildOrder::upgrade(pos));
        }
    }
}

/// Choose a move and a build for one AI faction.
///
/// Reads the world, then draws from its random stream for jitter and for
/// breaking ties between equally good candidates.
pub(crate) fn decide(world: &mut World, faction: FactionId, profile: AiProfile) -> Decision {
    let Some(params) = params(profile.strategy) else {
        return Decision::default();
    };

    let field = value_field(world, faction, &params);

    let target = if params.focus > 0 {
        let target = choose_target(world, faction, &params, &field);
        if let Ok(f) = world.factions.get_mut(faction) {
            f.target = target;
        }
        target
    } else {
        None
    };

    let candidates = candidate_moves(world, faction, &params, profile, &field, target);
    let order = pick_best(world, candidates, profile.difficulty.jitter());
    let build = if params.builds {
        choose_build(world, faction)
    } else {
        None
    };

    Decision { order, build }
}

fn index(grid: &Grid, pos: Pos) -> usize {
    usize::from(pos.y) * usize::from(grid.width()) + usize::from(pos.x)
}

/// Attractiveness of every cell for `faction`, with settlement and mine
/// values spread to nearby cells.
fn value_field(world: &World, faction: FactionId, params: &Params) -> Vec<i64> {
    let grid = &world.grid;
    let own_population = grid.population_of(faction);
    let weaker: Vec<bool> = world
        .factions
        .iter()
        .map(|f| f.is_contender() && grid.population_of(f.id) < own_population)
        .collect();
    let mut field = vec![0i64; grid.cells().len()];

    for cell in grid.cells() {
        if !cell.terrain.is_passable() || cell.owner == Some(faction) {
            continue;
        }
        field[index(grid, cell.pos)] += params.land * SCALE;

        let mut value = match cell.terrain {
            TerrainKind::Mine => params.mine,
            TerrainKind::Village => params.village,
            TerrainKind::Town => params.town,
            TerrainKind::Fortress => params.fortress,
            TerrainKind::Capital => params.capital,
            TerrainKind::Plain | TerrainKind::Mountain | TerrainKind::Void => 0,
        };
        let weaker_rival = cell
            .owner
            .and_then(|owner| weaker.get(usize::from(owner.0).checked_sub(1)?))
            .copied()
            .unwrap_or(false);
        if weaker_rival {
            value += params.weak_bias;
        }
        if value == 0 {
            continue;
        }

        for dy in -SPREAD_RADIUS..=SPREAD_RADIUS {
            for dx in -SPREAD_RADIUS..=SPREAD_RADIUS {
                let Some(pos) = cell.pos.offset(dx, dy) else {
                    continue;
                };
                if !grid.in_bounds(pos) {
                    continue;
                }
                let distance = dx.abs().max(dy.abs());
                field[index(grid, pos)] += (value * SCALE) >> distance;
            }
        }
    }

    field
}

/// King's-step distance from the nearest cell the faction holds, over
/// passable cells. `u32::MAX` where unreachable.
fn distances_from_territory(grid: &Grid, faction: FactionId) -> Vec<u32> {
    let mut dist = vec![u32::MAX; grid.cells().len()];
    let mut queue = VecDeque::new();
    for cell in grid.cells_owned_by(faction) {
        dist[index(grid, cell.pos)] = 0;
        queue.push_back(cell.pos);
    }
    while let Some(pos) = queue.pop_front() {
        let next_dist = dist[index(grid, pos)] + 1;
        for next in grid.passable_steps(pos) {
            let idx = index(grid, next);
            if dist[idx] == u32::MAX {
                dist[idx] = next_dist;
                queue.push_back(next);
            }
        }
    }
    dist
}

/// Keep or replace the faction's target cell.
fn choose_target(
    world: &mut World,
    faction: FactionId,
    params: &Params,
    field: &[i64],
) -> Option<Pos> {
    let grid = &world.grid;
    let strongest = grid
        .cells_owned_by(faction)
        .map(|c| c.population)
        .max()
        .unwrap_or(0);

    let current = world.factions.get(faction).ok().and_then(|f| f.target);
    if let Some(target) = current {
        let still_wanted = grid.at(target).is_ok_and(|c| {
            c.owner != Some(faction) && (params.persistent || c.population <= strongest)
        });
        if still_wanted {
            return Some(target);
        }
    }

    let dist = distances_from_territory(grid, faction);
    let mut best = 0i64;
    let mut best_cells = Vec::new();
    for cell in grid.cells() {
        let idx = index(grid, cell.pos);
        if cell.owner == Some(faction) || dist[idx] == u32::MAX || dist[idx] == 0 {
            continue;
        }
        let score = field[idx] * 8 / (1 + i64::from(dist[idx]));
        if score > best {
            best = score;
            best_cells.clear();
            best_cells.push(cell.pos);
        } else if score == best && score > 0 {
            best_cells.push(cell.pos);
        }
    }

    let choice = world.rng.pick_index(best_cells.len())?;
    Some(best_cells[choice])
}

/// Every legal move out of the faction's cells with its base score.
fn candidate_moves(
    world: &World,
    faction: FactionId,
    params: &Params,
    profile: AiProfile,
    field: &[i64],
    target: Option<Pos>,
) -> Vec<(KingsMove, i64)> {
    let grid = &world.grid;
    let mut candidates = Vec::new();

    for source in grid.cells_owned_by(faction) {
        if source.population <= params.garrison {
            continue;
        }
        for to in grid.passable_steps(source.pos) {
            let order = KingsMove {
                faction,
                from: source.pos,
                to,
            };
            let Ok(outcome) = movement::probe(world, order) else {
                continue;
            };
            let value = field[index(grid, to)];
            if let Some(score) = score_move(&order, &outcome, params, profile, value, target) {
                candidates.push((order, score));
            }
        }
    }

    candidates
}

fn score_move(
    order: &KingsMove,
    outcome: &MoveOutcome,
    params: &Params,
    profile: AiProfile,
    value: i64,
    target: Option<Pos>,
) -> Option<i64> {
    let mut score = match outcome.resolution {
        Resolution::Claimed => value + SCALE,
        Resolution::Reinforced => {
            if params.focus == 0 || target.is_none() {
                return None;
            }
            0
        }
        Resolution::Captured => {
            let defense = u64::from(outcome.destroyed / 2);
            if u64::from(outcome.moved) * 100 < defense * params.attack_ratio_pct {
                return None;
            }
            value + 2 * SCALE + profile.difficulty.capture_bonus() * SCALE
        }
        Resolution::Repelled => return None,
        Resolution::Tie { .. } => {
            if params.cautious {
                return None;
            }
            value - SCALE
        }
    };

    if let Some(target) = target {
        let gain = i64::from(order.from.king_distance(target))
            - i64::from(order.to.king_distance(target));
        if outcome.resolution == Resolution::Reinforced && gain <= 0 {
            return None;
        }
        score += gain * params.focus * SCALE;
    }

    Some(score)
}

/// Add difficulty jitter, then take the highest positive score. Equal best
/// scores are settled by the random stream.
fn pick_best(world: &mut World, candidates: Vec<(KingsMove, i64)>, jitter: u32) -> Option<KingsMove> {
    let mut best = 0i64;
    let mut best_orders = Vec::new();
    for (order, score) in candidates {
        let score = score + world.rng.jitter(jitter) * SCALE;
        if score > best {
            best = score;
            best_orders.clear();
            best_orders.push(order);
        } else if score == best && score > 0 {
            best_orders.push(order);
        }
    }

    let choice = world.rng.pick_index(best_orders.len())?;
    Some(best_orders[choice])
}

/// The settlement to upgrade, if the faction can afford one.
///
/// Only interior cells qualify: every passable neighbor already belongs to
/// the faction. Preference goes to villages, then towns, then to cells with
/// the most room left to grow.
fn choose_build(world: &World, faction: FactionId) -> Option<Pos> {
    let grid = &world.grid;
    let mut best = 0i64;
    let mut best_pos = None;

    for cell in grid.cells_owned_by(faction) {
        let base = match cell.terrain {
            TerrainKind::Plain => 1,
            TerrainKind::Village => 8,
            TerrainKind::Town => 4,
            _ => continue,
        };
        let interior = grid
            .passable_steps(cell.pos)
            .all(|p| grid.at(p).is_ok_and(|c| c.owner == Some(faction)));
        if !interior {
            continue;
        }
        let weight = base * i64::from(MAX_POPULATION.saturating_sub(cell.population));
        if weight > best {
            best = weight;
            best_pos = Some(cell.pos);
        }
    }

    let pos = best_pos?;
    build::check(world, faction, BuildOrder::upgrade(pos))
        .ok()
        .map(|_| pos)
}
