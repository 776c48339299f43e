use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::world::World;

/// Metadata about a snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub seed: u64,
    pub tick: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

/// Errors that can occur during snapshot operations.
#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Serialize(String),
    Deserialize(String),
    /// Decoded, but the world inside fails its invariant checks.
    Corrupt { path: PathBuf, reason: String },
    NoValidSnapshots,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "I/O error: {}", e),
            SnapshotError::Serialize(e) => write!(f, "Serialization error: {}", e),
            SnapshotError::Deserialize(e) => write!(f, "Deserialization error: {}", e),
            SnapshotError::Corrupt { path, reason } => {
                write!(f, "Corrupt snapshot {}: {}", path.display(), reason)
            }
            SnapshotError::NoValidSnapshots => {
                write!(
                    f,
                    "No valid snapshots found. Start a new game with: landgrab new"
                )
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

fn snapshot_filename(seed: u64, tick: u64, timestamp: u64) -> String {
    format!("game-{}-tick{}-{}.bin", seed, tick, timestamp)
}

/// Split `game-{seed}-tick{N}-{timestamp}.bin` into its three numbers.
fn parse_snapshot_filename(filename: &str) -> Option<(u64, u64, u64)> {
    let body = filename.strip_prefix("game-")?.strip_suffix(".bin")?;
    let (seed, rest) = body.split_once("-tick")?;
    let (tick, timestamp) = rest.split_once('-')?;
    Some((seed.parse().ok()?, tick.parse().ok()?, timestamp.parse().ok()?))
}

fn unix_timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Encode a whole world, random stream and pending orders included.
pub fn encode_world(world: &World) -> Result<Vec<u8>, SnapshotError> {
    bincode::serialize(world).map_err(|e| SnapshotError::Serialize(e.to_string()))
}

/// Decode a world. Does not check invariants; see [`load_snapshot`].
pub fn decode_world(data: &[u8]) -> Result<World, SnapshotError> {
    bincode::deserialize(data).map_err(|e| SnapshotError::Deserialize(e.to_string()))
}

/// Write a snapshot of `world` into `snapshot_dir`, creating it if needed.
///
/// The bytes go to a hidden temp file that is renamed into place, so a
/// crash mid-write never leaves a half-written game behind.
pub fn save_snapshot(world: &World, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let encoded = encode_world(world)?;
    let filename = snapshot_filename(world.seed(), world.tick(), unix_timestamp_now());
    let target = snapshot_dir.join(&filename);
    let staging = snapshot_dir.join(format!(".{}.tmp", filename));

    let written = fs::write(&staging, &encoded).and_then(|()| fs::rename(&staging, &target));
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(SnapshotError::Io(e));
    }

    debug!(
        path = %target.display(),
        seed = world.seed(),
        tick = world.tick(),
        bytes = encoded.len(),
        "Snapshot saved"
    );
    Ok(target)
}

/// Load a world from a snapshot file.
///
/// The decoded world must pass [`World::check_invariants`].
pub fn load_snapshot(path: &Path) -> Result<World, SnapshotError> {
    let world = decode_world(&fs::read(path)?)?;
    world
        .check_invariants()
        .map_err(|reason| SnapshotError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })?;
    Ok(world)
}

fn snapshot_entry(entry: fs::DirEntry) -> Option<SnapshotMetadata> {
    let path = entry.path();
    if !path.is_file() {
        return None;
    }
    // Hidden names are in-flight temp files.
    let filename = path.file_name()?.to_str()?;
    if filename.starts_with('.') {
        return None;
    }
    let (seed, tick, timestamp) = parse_snapshot_filename(filename)?;
    Some(SnapshotMetadata {
        seed,
        tick,
        timestamp,
        file_size: entry.metadata().map(|m| m.len()).unwrap_or(0),
        path,
    })
}

/// Snapshots in `snapshot_dir`, newest first. With `seed`, only that game's.
///
/// Several games may share one directory; the seed in each filename tells
/// them apart. A missing directory holds no snapshots.
pub fn list_snapshots(
    snapshot_dir: &Path,
    seed: Option<u64>,
) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        if let Some(meta) = snapshot_entry(entry?) {
            if seed.is_none_or(|s| s == meta.seed) {
                snapshots.push(meta);
            }
        }
    }

    // Within one second the later tick is the newer save.
    snapshots.sort_by(|a, b| (b.timestamp, b.tick).cmp(&(a.timestamp, a.tick)));
    Ok(snapshots)
}

/// Delete all but the `keep` newest snapshots of game `seed`. Other games'
/// snapshots in the same directory are left alone.
///
/// Returns the deleted paths.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    seed: u64,
    keep: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let stale: Vec<PathBuf> = list_snapshots(snapshot_dir, Some(seed))?
        .into_iter()
        .skip(keep)
        .map(|s| s.path)
        .collect();
    for path in &stale {
        fs::remove_file(path)?;
    }
    if !stale.is_empty() {
        debug!(seed, deleted = stale.len(), "Old snapshots pruned");
    }
    Ok(stale)
}

/// Load the newest snapshot that decodes and passes its invariant checks,
/// skipping past corrupt ones. With `seed`, only that game is considered.
pub fn load_latest_valid_snapshot(
    snapshot_dir: &Path,
    seed: Option<u64>,
) -> Result<World, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir, seed)? {
        match load_snapshot(&snapshot.path) {
            Ok(world) => return Ok(world),
            Err(e) => warn!(
                path = %snapshot.path.display(),
                error = %e,
                "Skipping unreadable snapshot"
            ),
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactionSpec, GameConfig};
    use crate::world::{FactionId, Strategy};
    use tempfile::TempDir;

    fn make_test_world(seed: u64) -> World {
        let config = GameConfig {
            width: 12,
            height: 10,
            seed: Some(seed),
            factions: vec![
                FactionSpec::human(),
                FactionSpec::ai(Strategy::AggrGreedy),
                FactionSpec::ai(Strategy::Noble),
            ],
            ..GameConfig::default()
        };
        let mut world = World::new(config).unwrap();
        for _ in 0..5 {
            world.simulate().unwrap();
        }
        world
    }

    fn write_fake(dir: &Path, seed: u64, tick: u64, ts: u64, data: &[u8]) {
        fs::write(dir.join(snapshot_filename(seed, tick, ts)), data).unwrap();
    }

    #[test]
    fn save_and_load_round_trip_identical() {
        let dir = TempDir::new().unwrap();
        let world = make_test_world(42);

        let path = save_snapshot(&world, dir.path()).unwrap();
        let restored = load_snapshot(&path).unwrap();

        assert_eq!(world, restored);
        assert_eq!(world.rng_draws(), restored.rng_draws());
    }

    #[test]
    fn restored_world_continues_identically() {
        let dir = TempDir::new().unwrap();
        let mut world = make_test_world(7);
        let path = save_snapshot(&world, dir.path()).unwrap();
        let mut restored = load_snapshot(&path).unwrap();

        for _ in 0..10 {
            let a = world.simulate();
            let b = restored.simulate();
            assert_eq!(a.map(|r| r.committed), b.map(|r| r.committed));
            assert_eq!(encode_world(&world).unwrap(), encode_world(&restored).unwrap());
        }
    }

    #[test]
    fn snapshot_filename_parse_round_trip() {
        let filename = snapshot_filename(42, 500, 1708300000);
        assert_eq!(filename, "game-42-tick500-1708300000.bin");

        let (seed, tick, ts) = parse_snapshot_filename(&filename).unwrap();
        assert_eq!(seed, 42);
        assert_eq!(tick, 500);
        assert_eq!(ts, 1708300000);
    }

    #[test]
    fn parse_invalid_filename_returns_none() {
        assert!(parse_snapshot_filename("random.bin").is_none());
        assert!(parse_snapshot_filename("game-1-tick.bin").is_none());
        assert!(parse_snapshot_filename("game-x-tick1-123.bin").is_none());
        assert!(parse_snapshot_filename("game-1-tickabc-123.bin").is_none());
        assert!(parse_snapshot_filename("game-1-tick100-abc.bin").is_none());
        assert!(parse_snapshot_filename("world-tick10-1000.bin").is_none());
    }

    #[test]
    fn list_snapshots_returns_sorted_newest_first() {
        let dir = TempDir::new().unwrap();
        let data = encode_world(&make_test_world(1)).unwrap();

        write_fake(dir.path(), 1, 10, 1000, &data);
        write_fake(dir.path(), 1, 20, 2000, &data);
        write_fake(dir.path(), 1, 30, 3000, &data);

        let snapshots = list_snapshots(dir.path(), None).unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].tick, 30);
        assert_eq!(snapshots[1].tick, 20);
        assert_eq!(snapshots[2].tick, 10);
        assert!(snapshots.iter().all(|s| s.seed == 1));
    }

    #[test]
    fn list_snapshots_skips_non_snapshot_files() {
        let dir = TempDir::new().unwrap();
        write_fake(dir.path(), 1, 10, 1000, b"x");
        fs::write(dir.path().join("notes.txt"), "not a snapshot").unwrap();
        fs::write(dir.path().join(".game-1-tick99-9999.bin.tmp"), "temp file").unwrap();

        let snapshots = list_snapshots(dir.path(), None).unwrap();
        assert_eq!(snapshots.len(), 1);
    }

    #[test]
    fn list_snapshots_nonexistent_dir() {
        let dir = TempDir::new().unwrap();
        let snapshots = list_snapshots(&dir.path().join("missing"), None).unwrap();
        assert!(snapshots.is_empty());
    }

    #[test]
    fn prune_keeps_max_snapshots() {
        let dir = TempDir::new().unwrap();
        for i in 0..6u64 {
            write_fake(dir.path(), 3, i * 10, 1000 + i, b"x");
        }

        let deleted = prune_snapshots(dir.path(), 3, 3).unwrap();
        assert_eq!(deleted.len(), 3);

        let remaining = list_snapshots(dir.path(), None).unwrap();
        let stamps: Vec<u64> = remaining.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![1005, 1004, 1003]);
    }

    #[test]
    fn prune_noop_when_under_limit() {
        let dir = TempDir::new().unwrap();
        write_fake(dir.path(), 3, 10, 1000, b"x");
        write_fake(dir.path(), 3, 20, 2000, b"x");

        assert!(prune_snapshots(dir.path(), 3, 5).unwrap().is_empty());
        assert_eq!(list_snapshots(dir.path(), None).unwrap().len(), 2);
    }

    #[test]
    fn load_garbage_and_truncated_snapshots_fail() {
        let dir = TempDir::new().unwrap();
        let data = encode_world(&make_test_world(5)).unwrap();

        let garbage = dir.path().join(snapshot_filename(5, 0, 1000));
        fs::write(&garbage, b"this is not valid bincode data").unwrap();
        assert!(load_snapshot(&garbage).is_err());

        let truncated = dir.path().join(snapshot_filename(5, 0, 1001));
        fs::write(&truncated, &data[..data.len() / 2]).unwrap();
        assert!(matches!(
            load_snapshot(&truncated).unwrap_err(),
            SnapshotError::Deserialize(_)
        ));
    }

    #[test]
    fn world_breaking_invariants_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let mut world = make_test_world(9);
        let orphan = world
            .cells()
            .iter()
            .find(|c| c.owner.is_none() && c.terrain.is_passable())
            .map(|c| c.pos)
            .unwrap();
        world.grid.at_mut(orphan).unwrap().population = 4;

        let path = save_snapshot(&world, dir.path()).unwrap();
        match load_snapshot(&path).unwrap_err() {
            SnapshotError::Corrupt { reason, .. } => assert!(reason.contains("unclaimed")),
            other => panic!("expected corrupt snapshot, got {}", other),
        }
    }

    #[test]
    fn load_latest_valid_falls_back_on_corrupt() {
        let dir = TempDir::new().unwrap();
        let world = make_test_world(11);
        let valid = encode_world(&world).unwrap();

        write_fake(dir.path(), 11, 5, 1000, &valid);
        write_fake(dir.path(), 11, 20, 2000, b"corrupt data here");

        let restored = load_latest_valid_snapshot(dir.path(), None).unwrap();
        assert_eq!(restored, world);
    }

    #[test]
    fn load_latest_valid_all_corrupt_returns_error() {
        let dir = TempDir::new().unwrap();
        write_fake(dir.path(), 1, 10, 1000, b"corrupt1");
        write_fake(dir.path(), 1, 20, 2000, b"corrupt2");

        assert!(matches!(
            load_latest_valid_snapshot(dir.path(), None).unwrap_err(),
            SnapshotError::NoValidSnapshots
        ));
    }

    #[test]
    fn atomic_write_no_temp_files_remain() {
        let dir = TempDir::new().unwrap();
        save_snapshot(&make_test_world(2), dir.path()).unwrap();

        let temp_files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().is_some_and(|n| n.starts_with('.')))
            .collect();
        assert!(temp_files.is_empty());
    }

    #[test]
    fn save_creates_directory_if_missing() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep").join("nested").join("snapshots");
        let path = save_snapshot(&make_test_world(2), &nested).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn pending_orders_survive_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut world = make_test_world(13);
        let capital = world.faction(FactionId(1)).unwrap().capital;
        let next = world
            .neighbors(capital)
            .unwrap()
            .into_iter()
            .find(|&p| world.probe(FactionId(1), capital, p).is_ok());
        if let Some(to) = next {
            if !world.is_over() {
                world.kings_move(FactionId(1), capital, to).unwrap();
            }
        }

        let path = save_snapshot(&world, dir.path()).unwrap();
        let restored = load_snapshot(&path).unwrap();
        assert_eq!(
            restored.pending_move(FactionId(1)),
            world.pending_move(FactionId(1))
        );
    }

    #[test]
    fn games_sharing_a_directory_stay_apart() {
        let dir = TempDir::new().unwrap();
        let older = make_test_world(4);
        write_fake(dir.path(), 4, 5, 1000, &encode_world(&older).unwrap());
        write_fake(dir.path(), 8, 5, 2000, &encode_world(&make_test_world(8)).unwrap());
        for i in 0..3u64 {
            write_fake(dir.path(), 8, 10 + i, 3000 + i, b"x");
        }

        let mine = list_snapshots(dir.path(), Some(4)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(list_snapshots(dir.path(), None).unwrap().len(), 5);

        // Pruning game 8 down to one never touches game 4.
        let deleted = prune_snapshots(dir.path(), 8, 1).unwrap();
        assert_eq!(deleted.len(), 3);
        assert_eq!(list_snapshots(dir.path(), Some(4)).unwrap().len(), 1);

        // Game 4's only snapshot is the oldest file in the directory.
        assert_eq!(load_latest_valid_snapshot(dir.path(), Some(4)).unwrap(), older);
        assert!(matches!(
            load_latest_valid_snapshot(dir.path(), Some(99)).unwrap_err(),
            SnapshotError::NoValidSnapshots
        ));
    }
}
