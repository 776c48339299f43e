pub mod cell;
pub mod faction;
pub mod generation;
pub mod grid;
pub mod rng;
pub mod view;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::GameConfig;
use crate::error::{BuildRejection, EngineError, EngineResult, MoveRejection};
use crate::simulation::build::{self, BuildOrder};
use crate::simulation::movement::{self, KingsMove, MoveOutcome};
use crate::simulation::statistics::{compute_statistics, Timeline, TickStatistics};
use crate::simulation::{self, PendingOrders, TickReport};

pub use cell::{Cell, Pos, TerrainKind, MAX_POPULATION};
pub use faction::{
    AiProfile, Difficulty, Faction, FactionId, FactionKind, FactionStatus, Registry, Strategy,
};
pub use grid::Grid;
pub use rng::GameRng;
pub use view::RenderView;

/// How a game stands after the latest tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Running,
    /// Only this faction is left in the running.
    Won(FactionId),
    /// Every contender was eliminated in the same tick.
    Draw,
    /// `max_ticks` was reached with several contenders left.
    TickLimit,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::Running
    }
}

/// A complete game: grid, factions, random stream and pending orders.
///
/// Everything that influences future ticks lives here and is serialized with
/// it, so a restored world continues exactly where the saved one left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Construction config with the seed resolved.
    pub(crate) config: GameConfig,
    pub(crate) seed: u64,
    pub(crate) tick: u64,
    pub(crate) grid: Grid,
    pub(crate) factions: Registry,
    pub(crate) rng: GameRng,
    pub(crate) pending: PendingOrders,
    pub(crate) status: GameStatus,
    pub(crate) timeline: Timeline,
}

impl World {
    /// Build a new game from a config.
    ///
    /// Fails with [`EngineError::Configuration`] if the config does not
    /// validate or no playable map could be generated from it.
    pub fn new(config: GameConfig) -> EngineResult<Self> {
        config.validate().map_err(EngineError::Configuration)?;

        let seed = config.seed.unwrap_or_else(GameRng::entropy_seed);
        let config = GameConfig {
            seed: Some(seed),
            ..config
        };
        let mut rng = GameRng::new(seed);

        let map = generation::generate(&config, &mut rng)?;
        let factions = Registry::from_founders(config.faction_kinds().into_iter().zip(map.capitals));
        let mut timeline = Timeline::new(config.rules.timeline_interval);
        timeline.record(0, &map.grid, &factions);

        info!(
            seed,
            width = config.width,
            height = config.height,
            factions = factions.len(),
            "World created"
        );

        Ok(Self {
            config,
            seed,
            tick: 0,
            grid: map.grid,
            factions,
            rng,
            pending: PendingOrders::default(),
            status: GameStatus::Running,
            timeline,
        })
    }

    // --- Read-only accessors ---

    /// The seed every random choice of this game derives from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn width(&self) -> u16 {
        self.grid.width()
    }

    pub fn height(&self) -> u16 {
        self.grid.height()
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn cell(&self, pos: Pos) -> EngineResult<&Cell> {
        self.grid.at(pos)
    }

    pub fn cells(&self) -> &[Cell] {
        self.grid.cells()
    }

    pub fn neighbors(&self, pos: Pos) -> EngineResult<Vec<Pos>> {
        self.grid.neighbors(pos)
    }

    pub fn factions(&self) -> &Registry {
        &self.factions
    }

    pub fn faction(&self, id: FactionId) -> EngineResult<&Faction> {
        self.factions.get(id)
    }

    pub fn gold(&self, id: FactionId) -> EngineResult<u64> {
        self.factions.gold(id)
    }

    /// Population summed over every cell the faction holds.
    pub fn population_total(&self, id: FactionId) -> EngineResult<u32> {
        self.factions.get(id)?;
        Ok(self.grid.population_of(id))
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn is_over(&self) -> bool {
        self.status.is_over()
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Draws taken from the game's random stream so far.
    pub fn rng_draws(&self) -> u64 {
        self.rng.draws()
    }

    pub fn pending_move(&self, id: FactionId) -> Option<&KingsMove> {
        self.pending.moves.get(&id)
    }

    pub fn pending_build(&self, id: FactionId) -> Option<BuildOrder> {
        self.pending.builds.get(&id).copied()
    }

    // --- Orders ---

    /// Predict a king's move without changing anything.
    pub fn probe(&self, faction: FactionId, from: Pos, to: Pos) -> EngineResult<MoveOutcome> {
        movement::probe(self, KingsMove { faction, from, to })
    }

    /// Queue a king's move for a human faction. It is committed during the
    /// next tick; a second request before then replaces the first.
    ///
    /// The move is checked against the current state and refused at once if
    /// illegal. Returns the predicted outcome.
    pub fn kings_move(&mut self, faction: FactionId, from: Pos, to: Pos) -> EngineResult<MoveOutcome> {
        if self.is_over() {
            return Err(EngineError::GameOver);
        }
        let f = self.factions.get(faction)?;
        if !f.is_active() {
            return Err(MoveRejection::FactionEliminated.into());
        }
        if !f.kind.is_human() {
            return Err(MoveRejection::NotControllable.into());
        }

        let order = KingsMove { faction, from, to };
        let outcome = movement::probe(self, order)?;
        self.pending.moves.insert(faction, order);
        Ok(outcome)
    }

    /// Drop a queued move. Returns it if there was one.
    pub fn cancel_move(&mut self, faction: FactionId) -> Option<KingsMove> {
        self.pending.moves.remove(&faction)
    }

    /// Queue a settlement upgrade for a human faction, committed during the
    /// next tick ahead of all moves.
    pub fn build(&mut self, faction: FactionId, pos: Pos) -> EngineResult<()> {
        self.queue_build(faction, BuildOrder::upgrade(pos))
    }

    /// Queue tearing a settlement down one tier. It takes the faction's build
    /// slot for the tick and costs nothing.
    pub fn degrade(&mut self, faction: FactionId, pos: Pos) -> EngineResult<()> {
        self.queue_build(faction, BuildOrder::degrade(pos))
    }

    fn queue_build(&mut self, faction: FactionId, order: BuildOrder) -> EngineResult<()> {
        if self.is_over() {
            return Err(EngineError::GameOver);
        }
        let f = self.factions.get(faction)?;
        if !f.is_active() {
            return Err(BuildRejection::FactionEliminated.into());
        }
        if !f.kind.is_human() {
            return Err(BuildRejection::NotControllable.into());
        }

        build::check(self, faction, order)?;
        self.pending.builds.insert(faction, order);
        Ok(())
    }

    pub fn cancel_build(&mut self, faction: FactionId) -> Option<BuildOrder> {
        self.pending.builds.remove(&faction)
    }

    /// Advance the game by one tick.
    pub fn simulate(&mut self) -> EngineResult<TickReport> {
        simulation::execute_tick(self)
    }

    // --- Views ---

    pub fn render_view(&self) -> RenderView {
        RenderView::from_world(self)
    }

    /// Aggregates for the current state.
    pub fn statistics(&self) -> TickStatistics {
        compute_statistics(self, 0, 0)
    }

    /// Check structural invariants. Used when loading snapshots.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        let expected = usize::from(self.grid.width()) * usize::from(self.grid.height());
        if self.grid.cells().len() != expected {
            errors.push(format!(
                "grid holds {} cells, expected {}",
                self.grid.cells().len(),
                expected
            ));
        }
        if self.config.seed != Some(self.seed) || self.rng.seed() != self.seed {
            errors.push(format!("seed mismatch: world seed is {}", self.seed));
        }

        for (i, cell) in self.grid.cells().iter().enumerate() {
            let w = usize::from(self.grid.width().max(1));
            let at = Pos::new((i % w) as u16, (i / w) as u16);
            if cell.pos != at {
                errors.push(format!("cell {} is stored at {}", cell.pos, at));
            }
            if cell.population > MAX_POPULATION {
                errors.push(format!(
                    "cell {} holds {} population, above {}",
                    cell.pos, cell.population, MAX_POPULATION
                ));
            }
            match cell.owner {
                None if cell.population > 0 => {
                    errors.push(format!("unclaimed cell {} holds population", cell.pos));
                }
                Some(owner) => {
                    if !cell.terrain.is_passable() {
                        errors.push(format!("impassable cell {} is owned by {}", cell.pos, owner));
                    }
                    match self.factions.get(owner) {
                        Ok(f) if !f.is_active() => {
                            errors.push(format!(
                                "cell {} is held by eliminated {}",
                                cell.pos, owner
                            ));
                        }
                        Ok(_) => {}
                        Err(_) => {
                            errors.push(format!("cell {} is held by unknown {}", cell.pos, owner));
                        }
                    }
                }
                None => {}
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactionSpec, MoveRule};

    fn open_config() -> GameConfig {
        let mut config = GameConfig::default();
        config.width = 10;
        config.height = 10;
        config.seed = Some(42);
        config.start_population = 5;
        config.terrain.layout = Some(vec![".".repeat(10); 10]);
        config.rules.move_rule = MoveRule::fixed(2);
        config.factions = vec![FactionSpec::human().at(0, 0), FactionSpec::human().at(9, 9)];
        config
    }

    #[test]
    fn new_world_places_capitals() {
        let world = World::new(open_config()).unwrap();
        assert_eq!(world.width(), 10);
        assert_eq!(world.height(), 10);
        assert_eq!(world.seed(), 42);
        assert_eq!(world.tick(), 0);

        let capital = world.cell(Pos::new(0, 0)).unwrap();
        assert_eq!(capital.terrain, TerrainKind::Capital);
        assert_eq!(capital.owner, Some(FactionId(1)));
        assert_eq!(capital.population, 5);
        assert_eq!(world.population_total(FactionId(2)).unwrap(), 5);
        assert!(world.check_invariants().is_ok());
    }

    #[test]
    fn missing_seed_is_resolved_once() {
        let mut config = open_config();
        config.seed = None;
        let world = World::new(config).unwrap();
        assert_eq!(world.config().seed, Some(world.seed()));
    }

    #[test]
    fn invalid_config_is_a_configuration_error() {
        let mut config = open_config();
        config.width = 0;
        assert!(matches!(
            World::new(config).unwrap_err(),
            EngineError::Configuration(_)
        ));
    }

    #[test]
    fn queued_move_replaces_previous() {
        let mut world = World::new(open_config()).unwrap();
        let f = FactionId(1);
        world.kings_move(f, Pos::new(0, 0), Pos::new(1, 0)).unwrap();
        world.kings_move(f, Pos::new(0, 0), Pos::new(1, 1)).unwrap();
        assert_eq!(world.pending_move(f).unwrap().to, Pos::new(1, 1));
        assert!(world.cancel_move(f).is_some());
        assert!(world.pending_move(f).is_none());
    }

    #[test]
    fn ai_factions_cannot_queue_moves() {
        let mut config = open_config();
        config.factions[1] = FactionSpec::ai(Strategy::Passive).at(9, 9);
        let mut world = World::new(config).unwrap();
        assert_eq!(
            world
                .kings_move(FactionId(2), Pos::new(9, 9), Pos::new(8, 8))
                .unwrap_err(),
            EngineError::InvalidMove(MoveRejection::NotControllable)
        );
    }

    #[test]
    fn illegal_move_leaves_world_untouched() {
        let mut world = World::new(open_config()).unwrap();
        let before = world.clone();
        let err = world
            .kings_move(FactionId(1), Pos::new(0, 0), Pos::new(2, 2))
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidMove(MoveRejection::NotAdjacent));
        assert_eq!(world, before);

        let err = world
            .kings_move(FactionId(1), Pos::new(0, 0), Pos::new(10, 0))
            .unwrap_err();
        assert_eq!(err, EngineError::OutOfBounds(Pos::new(10, 0)));
        assert_eq!(world, before);
    }

    #[test]
    fn build_requires_gold() {
        let mut world = World::new(open_config()).unwrap();
        world.grid.at_mut(Pos::new(1, 0)).unwrap().owner = Some(FactionId(1));
        let err = world.build(FactionId(1), Pos::new(1, 0)).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidBuild(BuildRejection::InsufficientGold {
                required: 160,
                owning: 0
            })
        );

        world.factions.add_gold(FactionId(1), 200).unwrap();
        world.build(FactionId(1), Pos::new(1, 0)).unwrap();
        assert_eq!(
            world.pending_build(FactionId(1)),
            Some(BuildOrder::upgrade(Pos::new(1, 0)))
        );
    }

    #[test]
    fn invariant_check_catches_orphan_population() {
        let mut world = World::new(open_config()).unwrap();
        world.grid.at_mut(Pos::new(4, 4)).unwrap().population = 3;
        let err = world.check_invariants().unwrap_err();
        assert!(err.contains("unclaimed cell (4, 4)"), "{}", err);
    }

    #[test]
    fn statistics_describe_the_current_state() {
        let mut world = World::new(open_config()).unwrap();
        world.kings_move(FactionId(1), Pos::new(0, 0), Pos::new(1, 0)).unwrap();
        world.simulate().unwrap();

        let stats = world.statistics();
        assert_eq!(stats.tick, 1);
        assert_eq!(stats.owned_cells, 3);
        assert_eq!(stats.total_population, 14);
        assert_eq!(stats.factions[0].cells, 2);
        assert_eq!(stats.commits, 0);
    }
}
