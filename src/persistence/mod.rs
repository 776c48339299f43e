pub mod snapshot;

pub use snapshot::{
    decode_world, encode_world, list_snapshots, load_latest_valid_snapshot, load_snapshot,
    prune_snapshots, save_snapshot, SnapshotError, SnapshotMetadata,
};
