use std::collections::HashSet;

use noise::{NoiseFn, Perlin};
use tracing::{debug, warn};

use crate::config::{GameConfig, KindName, MapShape};
use crate::error::{EngineError, EngineResult};
use crate::world::cell::{Pos, TerrainKind, KING_DIRS};
use crate::world::faction::{FactionId, FactionKind};
use crate::world::grid::{Grid, MAX_HEIGHT, MAX_WIDTH};
use crate::world::rng::GameRng;

/// Procedural maps are regenerated until every capital can reach every other
/// and, when `terrain.inequality` is set, the starts are fair enough.
const MAX_ATTEMPTS: u32 = 16;

/// Largest accepted gap between the best and worst start score, as a
/// percentage of the best, per `terrain.inequality` level.
const INEQUALITY_SPREAD: [u32; 5] = [10, 25, 50, 75, 100];

/// How far starting spots sit from the map edge.
const START_INSET: u16 = 2;

const ELEVATION_SCALE: f64 = 0.15;

/// Terrain plus the capital of each faction, in faction order.
#[derive(Debug)]
pub struct GeneratedMap {
    pub grid: Grid,
    pub capitals: Vec<Pos>,
}

/// Build the starting map for a validated config.
///
/// An explicit layout is used as-is. Otherwise terrain is drawn from the
/// game's random stream.
pub fn generate(config: &GameConfig, rng: &mut GameRng) -> EngineResult<GeneratedMap> {
    match config.layout_terrain() {
        Some(rows) => from_layout(config, &rows, rng),
        None => procedural(config, rng),
    }
}

fn empty_grid(config: &GameConfig) -> EngineResult<Grid> {
    Grid::new(config.width, config.height).ok_or_else(|| {
        EngineError::Configuration(format!(
            "grid dimensions {}x{} are empty",
            config.width, config.height
        ))
    })
}

fn from_layout(
    config: &GameConfig,
    rows: &[Vec<TerrainKind>],
    rng: &mut GameRng,
) -> EngineResult<GeneratedMap> {
    let mut grid = empty_grid(config)?;
    for (y, row) in rows.iter().enumerate() {
        for (x, &terrain) in row.iter().enumerate() {
            grid.at_mut(Pos::new(x as u16, y as u16))?.terrain = terrain;
        }
    }
    carve_shape(&mut grid, config.terrain.shape);

    let capitals = choose_starts(&grid, config, rng)?;
    found_capitals(&mut grid, &capitals, config, None)?;

    if !grid.is_connected(&capitals) {
        warn!(
            capitals = ?capitals,
            "Explicit layout leaves some capitals unreachable from each other"
        );
    }

    finish(GeneratedMap { grid, capitals }, config)
}

fn procedural(config: &GameConfig, rng: &mut GameRng) -> EngineResult<GeneratedMap> {
    let mut fairest: Option<(u32, GeneratedMap)> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        let mut grid = empty_grid(config)?;
        carve_shape(&mut grid, config.terrain.shape);
        generate_elevation_terrain(&mut grid, rng, config.terrain.mountain_ratio);
        scatter(&mut grid, rng, config.terrain.mine_ratio, |_| TerrainKind::Mine);
        scatter(&mut grid, rng, config.terrain.settlement_ratio, |rng| {
            if rng.next_uniform(3) == 0 {
                TerrainKind::Town
            } else {
                TerrainKind::Village
            }
        });

        let capitals = choose_starts(&grid, config, rng)?;
        found_capitals(&mut grid, &capitals, config, Some(rng))?;

        if !grid.is_connected(&capitals) {
            debug!(attempt, "Generated map is disconnected, retrying");
            continue;
        }

        let map = GeneratedMap { grid, capitals };
        let Some(level) = config.terrain.inequality else {
            debug!(attempt, "Generated connected map");
            return finish(map, config);
        };
        let spread = start_spread(&map, config);
        let allowed = INEQUALITY_SPREAD.get(usize::from(level)).copied().unwrap_or(100);
        if spread <= allowed {
            debug!(attempt, spread, "Generated connected map with fair starts");
            return finish(map, config);
        }
        debug!(attempt, spread, "Generated map is too uneven, retrying");
        if fairest.as_ref().is_none_or(|(best, _)| spread < *best) {
            fairest = Some((spread, map));
        }
    }

    match fairest {
        Some((spread, map)) => {
            warn!(
                spread,
                attempts = MAX_ATTEMPTS,
                "No map met terrain.inequality; using the fairest one"
            );
            finish(map, config)
        }
        None => Err(EngineError::Configuration(format!(
            "no connected map after {} attempts; lower terrain.mountain_ratio",
            MAX_ATTEMPTS
        ))),
    }
}

fn finish(mut map: GeneratedMap, config: &GameConfig) -> EngineResult<GeneratedMap> {
    apply_conditions(&mut map, config)?;
    Ok(map)
}

/// Turn every cell outside `shape` into void.
fn carve_shape(grid: &mut Grid, shape: MapShape) {
    let (width, height) = (grid.width(), grid.height());
    for cell in grid.cells_mut() {
        if !shape.contains(width, height, cell.pos) {
            cell.terrain = TerrainKind::Void;
        }
    }
}

/// Raise the highest cells of a Perlin elevation field into mountains.
fn generate_elevation_terrain(grid: &mut Grid, rng: &mut GameRng, mountain_ratio: f32) {
    let perlin = Perlin::new(rng.next_uniform(u32::MAX));
    let elevation: Vec<(usize, f64)> = grid
        .cells()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.terrain != TerrainKind::Void)
        .map(|(i, c)| {
            let height = perlin.get([
                f64::from(c.pos.x) * ELEVATION_SCALE,
                f64::from(c.pos.y) * ELEVATION_SCALE,
            ]);
            (i, height)
        })
        .collect();

    let mut ranked = elevation.clone();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mountain_count = (elevation.len() as f32 * mountain_ratio).round() as usize;
    let cells = grid.cells_mut();
    for &(idx, _) in &ranked[..mountain_count.min(ranked.len())] {
        cells[idx].terrain = TerrainKind::Mountain;
    }
}

/// Turn a share of the remaining plain cells into `pick(rng)`.
fn scatter(
    grid: &mut Grid,
    rng: &mut GameRng,
    ratio: f32,
    mut pick: impl FnMut(&mut GameRng) -> TerrainKind,
) {
    let land = grid
        .cells()
        .iter()
        .filter(|c| c.terrain != TerrainKind::Void)
        .count();
    let count = (land as f32 * ratio).round() as usize;
    for _ in 0..count {
        let plains: Vec<usize> = grid
            .cells()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.terrain == TerrainKind::Plain)
            .map(|(i, _)| i)
            .collect();
        let Some(choice) = rng.pick_index(plains.len()) else {
            return;
        };
        let terrain = pick(rng);
        grid.cells_mut()[plains[choice]].terrain = terrain;
    }
}

/// Fixed candidate spots: inset corners first, then edge midpoints. Spots
/// outside `shape` are walked toward the center until they are inside.
fn start_candidates(width: u16, height: u16, shape: MapShape) -> Vec<Pos> {
    let dx = START_INSET.min((width - 1) / 2);
    let dy = START_INSET.min((height - 1) / 2);
    let (x0, x1, xm) = (dx, width - 1 - dx, width / 2);
    let (y0, y1, ym) = (dy, height - 1 - dy, height / 2);

    let mut seen = HashSet::new();
    [
        (x0, y0),
        (x1, y1),
        (x1, y0),
        (x0, y1),
        (xm, y0),
        (xm, y1),
        (x0, ym),
        (x1, ym),
    ]
    .into_iter()
    .filter_map(|(x, y)| pull_inside(Pos::new(x, y), width, height, shape))
    .filter(|p| seen.insert(*p))
    .collect()
}

fn pull_inside(mut pos: Pos, width: u16, height: u16, shape: MapShape) -> Option<Pos> {
    let center = (i32::from(width / 2), i32::from(height / 2));
    for _ in 0..=width.max(height) {
        if shape.contains(width, height, pos) {
            return Some(pos);
        }
        let dx = (center.0 - i32::from(pos.x)).signum();
        let dy = (center.1 - i32::from(pos.y)).signum();
        pos = pos.offset(dx, dy)?;
    }
    None
}

/// Starting cell for each faction, in faction order.
///
/// Explicit starts are kept. The rest take candidate spots in an order
/// rotated by a random offset, then random free cells.
fn choose_starts(grid: &Grid, config: &GameConfig, rng: &mut GameRng) -> EngineResult<Vec<Pos>> {
    let mut taken: HashSet<Pos> = config.factions.iter().filter_map(|f| f.start_pos()).collect();

    let candidates = start_candidates(grid.width(), grid.height(), config.terrain.shape);
    let offset = rng.next_uniform(candidates.len() as u32) as usize;
    let mut rotated = candidates
        .iter()
        .cycle()
        .skip(offset)
        .take(candidates.len())
        .copied();

    let mut starts = Vec::with_capacity(config.factions.len());
    for spec in &config.factions {
        if let Some(pos) = spec.start_pos() {
            starts.push(pos);
            continue;
        }

        let free = |p: &Pos, taken: &HashSet<Pos>| {
            !taken.contains(p) && grid.at(*p).is_ok_and(|c| c.terrain.is_passable())
        };
        let pos = match rotated.find(|p| free(p, &taken)) {
            Some(pos) => pos,
            None => {
                let open: Vec<Pos> = grid
                    .cells()
                    .iter()
                    .map(|c| c.pos)
                    .filter(|p| free(p, &taken))
                    .collect();
                let idx = rng.pick_index(open.len()).ok_or_else(|| {
                    EngineError::Configuration(format!(
                        "no free cell left for {} factions on a {}x{} grid",
                        config.factions.len(),
                        grid.width(),
                        grid.height()
                    ))
                })?;
                open[idx]
            }
        };
        taken.insert(pos);
        starts.push(pos);
    }

    Ok(starts)
}

/// Claim each starting cell for its faction. Contenders get a capital,
/// the neutral faction a town.
///
/// With `rng`, each contender also gets a mine one step from its capital,
/// and the cell opposite the mine is cleared of mountains.
fn found_capitals(
    grid: &mut Grid,
    capitals: &[Pos],
    config: &GameConfig,
    mut rng: Option<&mut GameRng>,
) -> EngineResult<()> {
    let kinds = config.faction_kinds();
    for (i, (&pos, kind)) in capitals.iter().zip(&kinds).enumerate() {
        let cell = grid.at_mut(pos)?;
        cell.terrain = if kind.is_neutral() {
            TerrainKind::Town
        } else {
            TerrainKind::Capital
        };
        cell.owner = Some(FactionId(i as u8 + 1));
        cell.population = config.start_population;

        if *kind == FactionKind::Neutral {
            continue;
        }
        let Some(rng) = rng.as_deref_mut() else {
            continue;
        };

        let (dx, dy) = KING_DIRS[rng.next_uniform(KING_DIRS.len() as u32) as usize];
        if let Some(mine) = pos.offset(dx, dy).filter(|p| !capitals.contains(p)) {
            if let Ok(cell) = grid.at_mut(mine) {
                if cell.terrain != TerrainKind::Void {
                    cell.terrain = TerrainKind::Mine;
                }
            }
        }
        if let Some(clear) = pos.offset(-dx, -dy).filter(|p| !capitals.contains(p)) {
            if let Ok(cell) = grid.at_mut(clear) {
                if cell.terrain == TerrainKind::Mountain {
                    cell.terrain = TerrainKind::Plain;
                }
            }
        }
    }
    Ok(())
}

/// Which start a cell is closest to, by king steps over passable terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    Unreached,
    Contested { distance: u32 },
    Start { index: usize, distance: u32 },
}

/// Score each start by the mines it alone is closest to.
///
/// A mine counts for a start when every reachable passable neighbor of the
/// mine is nearer to that start than to any other. Near mines score far more
/// than distant ones.
pub fn evaluate_starts(grid: &Grid, starts: &[Pos]) -> Vec<u32> {
    let distances: Vec<Vec<Option<u32>>> =
        starts.iter().map(|&s| grid.distances_from(s)).collect();
    let reach: Vec<Reach> = (0..grid.cells().len())
        .map(|idx| {
            let mut best = Reach::Unreached;
            for (index, dist) in distances.iter().enumerate() {
                let Some(distance) = dist[idx] else {
                    continue;
                };
                best = match best {
                    Reach::Unreached => Reach::Start { index, distance },
                    Reach::Start { distance: d, .. } | Reach::Contested { distance: d }
                        if distance < d =>
                    {
                        Reach::Start { index, distance }
                    }
                    Reach::Start { distance: d, .. } if distance == d => {
                        Reach::Contested { distance }
                    }
                    other => other,
                };
            }
            best
        })
        .collect();

    let area = f64::from(MAX_WIDTH) * f64::from(MAX_HEIGHT);
    let mut scores = vec![0u32; starts.len()];
    for mine in grid.cells().iter().filter(|c| c.terrain == TerrainKind::Mine) {
        let mut owner = None;
        let mut contested = false;
        let (mut nearest, mut farthest) = (u32::MAX, 0);
        for next in grid.passable_steps(mine.pos) {
            let Some(idx) = grid.index(next) else {
                continue;
            };
            match reach[idx] {
                Reach::Unreached => {}
                Reach::Contested { .. } => contested = true,
                Reach::Start { index, distance } => {
                    if owner.is_some_and(|o| o != index) {
                        contested = true;
                    }
                    owner = Some(index);
                    nearest = nearest.min(distance);
                    farthest = farthest.max(distance);
                }
            }
        }
        let Some(index) = owner.filter(|_| !contested) else {
            continue;
        };
        let closeness = (-10.0 * f64::from(farthest) * f64::from(nearest) / area).exp();
        scores[index] += (100.0 * f64::from(MAX_WIDTH + MAX_HEIGHT) * closeness) as u32;
    }
    scores
}

fn contender_slots(config: &GameConfig) -> Vec<usize> {
    config
        .factions
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind != KindName::Neutral)
        .map(|(i, _)| i)
        .collect()
}

/// Contender start scores, paired with the faction slot each belongs to.
fn contender_scores(map: &GeneratedMap, config: &GameConfig) -> Vec<(usize, u32)> {
    let slots = contender_slots(config);
    let starts: Vec<Pos> = slots.iter().map(|&i| map.capitals[i]).collect();
    slots.into_iter().zip(evaluate_starts(&map.grid, &starts)).collect()
}

/// Gap between the best and worst contender start, in percent of the best.
fn start_spread(map: &GeneratedMap, config: &GameConfig) -> u32 {
    let scores = contender_scores(map, config);
    let best = scores.iter().map(|&(_, s)| s).max().unwrap_or(0);
    let worst = scores.iter().map(|&(_, s)| s).min().unwrap_or(0);
    if best == 0 {
        return 0;
    }
    (u64::from(best - worst) * 100 / u64::from(best)) as u32
}

/// Hand the first human without an explicit start the contender start
/// ranked `terrain.conditions` by score, swapping with its holder.
fn apply_conditions(map: &mut GeneratedMap, config: &GameConfig) -> EngineResult<()> {
    let Some(rank) = config.terrain.conditions else {
        return Ok(());
    };
    let Some(human) = config
        .factions
        .iter()
        .position(|f| f.kind == KindName::Human && f.start_pos().is_none())
    else {
        return Ok(());
    };

    let mut ranked = contender_scores(map, config);
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let Some(&(other, score)) = ranked.get(usize::from(rank).saturating_sub(1)) else {
        return Ok(());
    };
    if other == human {
        return Ok(());
    }
    if config.factions[other].start_pos().is_some() {
        debug!(rank, "Start of the requested rank is fixed by config, leaving starts as drawn");
        return Ok(());
    }

    map.capitals.swap(human, other);
    for slot in [human, other] {
        map.grid.at_mut(map.capitals[slot])?.owner = Some(FactionId(slot as u8 + 1));
    }
    debug!(rank, score, faction = human + 1, "Start reassigned by conditions");
    Ok(())
}
