use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use landgrab::cli::commands;
use landgrab::config::{GameConfig, RunConfig};
use landgrab::persistence;

#[derive(Parser)]
#[command(name = "landgrab")]
#[command(about = "A deterministic territorial-conquest engine with king's-move expansion and AI kings")]
#[command(version)]
struct Cli {
    /// Path to the run configuration file. Defaults apply when it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new game and save its first snapshot
    New {
        /// Path to the game config file
        #[arg(short, long, default_value = "game.toml")]
        game: String,

        /// Override the seed from the game config
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output snapshot directory (defaults to the run config's)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Continue a game from a snapshot at the configured tick rate
    Run {
        /// Path to a specific snapshot to load
        #[arg(short, long)]
        snapshot: Option<String>,

        /// Continue the latest game with this seed
        #[arg(long)]
        seed: Option<u64>,

        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,
    },

    /// Play many seeds of one game config in parallel and print the results
    Batch {
        /// Path to the game config file
        #[arg(short, long, default_value = "game.toml")]
        game: String,

        /// Number of games
        #[arg(short = 'n', long, default_value_t = 16)]
        games: u64,

        /// Seed of the first game; the rest follow consecutively
        #[arg(long, default_value_t = 1)]
        first_seed: u64,

        /// Tick cap for every game
        #[arg(long, default_value_t = 5000)]
        max_ticks: u64,
    },

    /// Inspect a cell or the game state in a snapshot
    Inspect {
        /// Path to a specific snapshot (defaults to the latest valid one)
        #[arg(short, long)]
        snapshot: Option<String>,

        /// Only consider snapshots of the game with this seed
        #[arg(long)]
        seed: Option<u64>,

        /// Cell to inspect, as x,y
        #[arg(long)]
        cell: Option<String>,

        /// Print the render view as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage game snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory (defaults to the run config's)
        #[arg(short, long)]
        dir: Option<String>,

        /// Only list snapshots of the game with this seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Restore and display a game from a snapshot file
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

fn load_run_config(path: &str) -> RunConfig {
    let path = Path::new(path);
    if !path.exists() {
        return RunConfig::default();
    }
    match RunConfig::from_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_game_config(path: &str) -> GameConfig {
    match GameConfig::from_file(Path::new(path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading game config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_logging(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_run_config(&cli.config);
    init_logging(&config.log_level, cli.log_json);

    match cli.command {
        Commands::New { game, seed, output } => {
            let mut game_config = load_game_config(&game);
            if seed.is_some() {
                game_config.seed = seed;
            }
            let output = output.unwrap_or_else(|| config.snapshot_directory.clone());
            println!("Creating game from {}...", game);
            if let Err(e) = commands::new_game(&game_config, Path::new(&output)) {
                eprintln!("Error creating game: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Run {
            snapshot,
            seed,
            ticks,
        } => {
            if let Err(e) = commands::run_game(&config, snapshot.as_deref(), seed, ticks).await {
                eprintln!("Run error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Batch {
            game,
            games,
            first_seed,
            max_ticks,
        } => {
            let game_config = load_game_config(&game);
            let seeds: Vec<u64> = (0..games).map(|i| first_seed.wrapping_add(i)).collect();
            match commands::batch(&game_config, &seeds, max_ticks) {
                Ok(results) => commands::print_batch(&results),
                Err(e) => {
                    eprintln!("Batch error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Inspect {
            snapshot,
            seed,
            cell,
            json,
        } => {
            if let Err(e) =
                commands::inspect(&config, snapshot.as_deref(), seed, cell.as_deref(), json)
            {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir, seed } => {
                let dir = dir.unwrap_or_else(|| config.snapshot_directory.clone());
                let snapshot_dir = Path::new(&dir);
                match persistence::list_snapshots(snapshot_dir, seed) {
                    Ok(snapshots) => {
                        if snapshots.is_empty() {
                            println!("No snapshots found in {}", snapshot_dir.display());
                        } else {
                            println!(
                                "{:<48} {:>20} {:>8} {:>12}",
                                "File", "Seed", "Tick", "Size"
                            );
                            println!("{}", "-".repeat(91));
                            for s in &snapshots {
                                let name = s
                                    .path
                                    .file_name()
                                    .and_then(|n| n.to_str())
                                    .unwrap_or("?");
                                let size_kb = s.file_size / 1024;
                                println!(
                                    "{:<48} {:>20} {:>8} {:>9} KB",
                                    name, s.seed, s.tick, size_kb
                                );
                            }
                            println!(
                                "\n{} snapshot(s) in {}",
                                snapshots.len(),
                                snapshot_dir.display()
                            );
                        }
                    }
                    Err(e) => {
                        eprintln!("Error listing snapshots: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            SnapshotAction::Restore { file } => {
                let path = Path::new(&file);
                match persistence::load_snapshot(path) {
                    Ok(world) => {
                        println!("Restored game from {}", path.display());
                        commands::print_world_summary(&world);
                    }
                    Err(e) => {
                        eprintln!("Error restoring snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}
