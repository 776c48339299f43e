use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::config::{GameConfig, RunConfig};
use crate::persistence;
use crate::world::{FactionKind, FactionStatus, GameStatus, Pos, World};

/// Construct a new game from a game config and write its first snapshot.
pub fn new_game(game_config: &GameConfig, snapshot_dir: &Path) -> Result<PathBuf, String> {
    let world = World::new(game_config.clone()).map_err(|e| e.to_string())?;
    print_world_summary(&world);

    let path = persistence::save_snapshot(&world, snapshot_dir)
        .map_err(|e| format!("Cannot save snapshot: {}", e))?;
    println!("\nGame saved to {}", path.display());
    Ok(path)
}

/// Load the game to continue: an explicit snapshot file, or the latest valid
/// one in the configured directory, optionally restricted to one seed.
fn load_game(config: &RunConfig, snapshot: Option<&str>, seed: Option<u64>) -> Result<World, String> {
    match snapshot {
        Some(path) => {
            eprintln!("Loading game from {}", path);
            persistence::load_snapshot(Path::new(path))
                .map_err(|e| format!("Failed to load snapshot: {}", e))
        }
        None => {
            eprintln!("Loading latest snapshot from {}", config.snapshot_directory);
            persistence::load_latest_valid_snapshot(Path::new(&config.snapshot_directory), seed)
                .map_err(|e| format!("Failed to load snapshot: {}", e))
        }
    }
}

fn save_and_prune(world: &World, config: &RunConfig) {
    let snapshot_dir = Path::new(&config.snapshot_directory);
    match persistence::save_snapshot(world, snapshot_dir) {
        Ok(path) => {
            eprintln!("Snapshot saved: {}", path.display());
            let keep = config.max_snapshots as usize;
            if let Err(e) = persistence::prune_snapshots(snapshot_dir, world.seed(), keep) {
                eprintln!("Warning: snapshot pruning failed: {}", e);
            }
        }
        Err(e) => eprintln!("Warning: snapshot save failed: {}", e),
    }
}

/// Run a game at the configured tick rate until it ends, `stop_after` ticks
/// have passed, or Ctrl-C is pressed. Human factions stay idle.
pub async fn run_game(
    config: &RunConfig,
    snapshot: Option<&str>,
    seed: Option<u64>,
    stop_after: Option<u64>,
) -> Result<(), String> {
    let mut world = load_game(config, snapshot, seed)?;
    eprintln!(
        "Game loaded: seed {}, {}x{}, tick {}, {} factions",
        world.seed(),
        world.width(),
        world.height(),
        world.tick(),
        world.factions().len()
    );
    if world.is_over() {
        print_world_summary(&world);
        return Err(format!("Game is already over: {}", describe_status(world.status())));
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let tick_interval = Duration::from_secs_f32(1.0 / config.tick_rate_hz);
    let start_tick = world.tick();
    let mut ticks_since_snapshot: u32 = 0;

    eprintln!(
        "Game running (tick rate: {}Hz, snapshot every {} ticks)",
        config.tick_rate_hz, config.snapshot_interval
    );

    loop {
        let tick_start = Instant::now();

        let report = world.simulate().map_err(|e| e.to_string())?;
        for id in &report.eliminated {
            eprintln!("Tick {}: {} eliminated", report.tick, id);
        }

        ticks_since_snapshot += 1;
        if ticks_since_snapshot >= config.snapshot_interval {
            save_and_prune(&world, config);
            ticks_since_snapshot = 0;
        }

        if report.tick % 100 == 0 {
            let leader = report
                .statistics
                .factions
                .iter()
                .filter(|f| f.active)
                .max_by_key(|f| f.population);
            eprintln!(
                "Tick {} | Population: {} | Contested: {} | Leader: {}",
                report.tick,
                report.statistics.total_population,
                report.statistics.contested_cells,
                leader.map_or_else(|| "none".to_string(), |f| f.id.to_string()),
            );
        }

        if report.status.is_over() {
            eprintln!("Game over at tick {}: {}", report.tick, describe_status(report.status));
            break;
        }
        if stop_after.is_some_and(|n| world.tick() - start_tick >= n) {
            eprintln!("Stopping after {} ticks", world.tick() - start_tick);
            break;
        }

        let elapsed = tick_start.elapsed();
        if elapsed < tick_interval {
            tokio::select! {
                _ = tokio::time::sleep(tick_interval - elapsed) => {}
                _ = &mut shutdown => {
                    eprintln!("\nShutdown signal received");
                    break;
                }
            }
        } else {
            // Overran the interval: still let a pending Ctrl-C through.
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    eprintln!("\nShutdown signal received");
                    break;
                }
                _ = tokio::task::yield_now() => {}
            }
        }
    }

    eprintln!("Saving final snapshot...");
    save_and_prune(&world, config);
    print_world_summary(&world);
    Ok(())
}

/// Outcome of one game in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub seed: u64,
    pub ticks: u64,
    pub status: GameStatus,
    /// Population per faction at the end, in id order.
    pub population: Vec<u32>,
}

/// Play one independent game per seed, in parallel, until each ends or
/// reaches `tick_cap`. Results come back in seed order.
pub fn batch(game_config: &GameConfig, seeds: &[u64], tick_cap: u64) -> Result<Vec<BatchResult>, String> {
    seeds
        .par_iter()
        .map(|&seed| {
            let config = GameConfig {
                seed: Some(seed),
                ..game_config.clone()
            };
            let mut world = World::new(config).map_err(|e| format!("seed {}: {}", seed, e))?;
            while !world.is_over() && world.tick() < tick_cap {
                world.simulate().map_err(|e| format!("seed {}: {}", seed, e))?;
            }
            Ok(BatchResult {
                seed,
                ticks: world.tick(),
                status: world.status(),
                population: world
                    .factions()
                    .ids()
                    .map(|id| world.grid().population_of(id))
                    .collect(),
            })
        })
        .collect()
}

pub fn print_batch(results: &[BatchResult]) {
    println!("{:>20} {:>8} {:<24} Population", "Seed", "Ticks", "Result");
    println!("{}", "-".repeat(72));
    for r in results {
        let population: Vec<String> = r.population.iter().map(|p| p.to_string()).collect();
        println!(
            "{:>20} {:>8} {:<24} {}",
            r.seed,
            r.ticks,
            describe_status(r.status),
            population.join(" / ")
        );
    }

    let decided = results
        .iter()
        .filter(|r| matches!(r.status, GameStatus::Won(_)))
        .count();
    println!("\n{} game(s), {} decided", results.len(), decided);
}

/// Parse a cell position written as `x,y`.
pub fn parse_pos(s: &str) -> Result<Pos, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("Expected a cell as x,y, got '{}'", s))?;
    let x = x
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("Bad x coordinate '{}': {}", x, e))?;
    let y = y
        .trim()
        .parse::<u16>()
        .map_err(|e| format!("Bad y coordinate '{}': {}", y, e))?;
    Ok(Pos::new(x, y))
}

/// Inspect a cell, the render view, or the game summary of a snapshot.
pub fn inspect(
    config: &RunConfig,
    snapshot: Option<&str>,
    seed: Option<u64>,
    cell: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let world = load_game(config, snapshot, seed)?;

    if let Some(cell) = cell {
        inspect_cell(&world, parse_pos(cell)?)
    } else if json {
        let view = world.render_view();
        let out = serde_json::to_string_pretty(&view)
            .map_err(|e| format!("Cannot encode view: {}", e))?;
        println!("{}", out);
        Ok(())
    } else {
        print_world_summary(&world);
        Ok(())
    }
}

fn inspect_cell(world: &World, pos: Pos) -> Result<(), String> {
    let cell = world.cell(pos).map_err(|e| e.to_string())?;

    println!("=== Cell {} ===", cell.pos);
    println!("Terrain: {:?}", cell.terrain);
    match cell.owner {
        Some(owner) => println!("Owner: {}", owner),
        None => println!("Owner: (unclaimed)"),
    }
    println!("Population: {}", cell.population);
    println!("Contested last tick: {}", cell.contested);
    if let Some((next, price)) = cell.terrain.upgrade() {
        println!("Upgrade: {:?} for {} gold", next, price);
    }
    if let Some(lower) = cell.terrain.degrade() {
        println!("Degrade: {:?}", lower);
    }

    let neighbors = world.neighbors(pos).map_err(|e| e.to_string())?;
    let listed: Vec<String> = neighbors.iter().map(|p| p.to_string()).collect();
    println!("Reachable neighbors: {}", listed.join(" "));
    Ok(())
}

fn describe_status(status: GameStatus) -> String {
    match status {
        GameStatus::Running => "running".to_string(),
        GameStatus::Won(id) => format!("won by {}", id),
        GameStatus::Draw => "draw".to_string(),
        GameStatus::TickLimit => "tick limit".to_string(),
    }
}

fn describe_kind(kind: FactionKind) -> String {
    match kind {
        FactionKind::Human => "human".to_string(),
        FactionKind::Ai(profile) => format!("ai {:?} ({:?})", profile.strategy, profile.difficulty),
        FactionKind::Neutral => "neutral".to_string(),
    }
}

pub fn print_world_summary(world: &World) {
    println!("=== Game: seed {} ===", world.seed());
    println!("Size: {}x{}", world.width(), world.height());
    println!("Tick: {}", world.tick());
    println!("Status: {}", describe_status(world.status()));
    let stats = world.statistics();
    println!(
        "Cells owned: {} | Contested last tick: {} | Population: {}",
        stats.owned_cells, stats.contested_cells, stats.total_population
    );
    println!();

    for row in world.grid().layout_rows() {
        println!("  {}", row);
    }
    println!();

    println!("--- Factions ---");
    let grid = world.grid();
    for f in world.factions().iter() {
        let status = match f.status {
            FactionStatus::Active => "active".to_string(),
            FactionStatus::Eliminated { at_tick } => format!("eliminated at tick {}", at_tick),
        };
        println!(
            "  {} [{}] capital {} | cells {} | population {} | gold {} | {}",
            f.id,
            describe_kind(f.kind),
            f.capital,
            grid.count_owned(f.id),
            grid.population_of(f.id),
            f.gold,
            status
        );
    }
}
