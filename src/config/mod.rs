pub mod game;
pub mod run;

pub use game::{FactionSpec, GameConfig, KindName, MapShape, MoveRule, MoveRuleKind, NetworkRole, RuleConfig, TerrainConfig};
pub use run::RunConfig;
