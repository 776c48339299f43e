pub mod ai;
pub mod build;
pub mod income;
pub mod movement;
pub mod statistics;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::simulation::build::{BuildOrder, BuildOutcome};
use crate::simulation::movement::{KingsMove, MoveOutcome};
use crate::simulation::statistics::TickStatistics;
use crate::world::{FactionId, FactionStatus, GameStatus, World};

/// Orders waiting for the next commit phase: at most one move and one build
/// per faction. Keyed maps keep iteration in faction-id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOrders {
    pub(crate) moves: BTreeMap<FactionId, KingsMove>,
    pub(crate) builds: BTreeMap<FactionId, BuildOrder>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMove {
    pub order: KingsMove,
    pub outcome: MoveOutcome,
}

/// An order that was valid when queued but not by the time it was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedMove {
    pub order: KingsMove,
    pub reason: EngineError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedBuild {
    pub faction: FactionId,
    pub order: BuildOrder,
    pub reason: EngineError,
}

/// Result of executing a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number just completed.
    pub tick: u64,
    /// Committed moves in faction-id order.
    pub committed: Vec<CommittedMove>,
    pub rejected: Vec<RejectedMove>,
    pub builds: Vec<BuildOutcome>,
    pub rejected_builds: Vec<RejectedBuild>,
    pub eliminated: Vec<FactionId>,
    /// Population added by growth in the income phase.
    pub grown_population: u64,
    /// Units lost in combat over all contested cells.
    pub combat_losses: u64,
    /// Population removed with eliminated factions.
    pub disbanded_population: u64,
    pub status: GameStatus,
    pub statistics: TickStatistics,
}

/// Execute a single tick on the world.
///
/// Phases run in a fixed order: income, AI decisions, commit (builds in
/// faction order, then all moves at once), elimination. The tick counter
/// then advances, the timeline is sampled when due, and the game status is
/// updated.
pub fn execute_tick(world: &mut World) -> EngineResult<TickReport> {
    if world.status.is_over() {
        return Err(EngineError::GameOver);
    }
    let tick = world.tick + 1;

    // Phase 1: Income
    let grown_population = income::apply_income(world);

    // Phase 2: AI decisions
    ai::decide_all(world);

    // Phase 3: Commit
    let orders = std::mem::take(&mut world.pending);

    let mut builds = Vec::new();
    let mut rejected_builds = Vec::new();
    for (faction, order) in orders.builds {
        match build::apply(world, faction, order) {
            Ok(outcome) => builds.push(outcome),
            Err(reason) => {
                debug!(
                    tick,
                    %faction,
                    pos = %order.pos,
                    action = ?order.action,
                    %reason,
                    "Build rejected at commit"
                );
                rejected_builds.push(RejectedBuild {
                    faction,
                    order,
                    reason,
                });
            }
        }
    }

    let moves: Vec<KingsMove> = orders.moves.into_values().collect();
    let movement::CommitReport {
        committed,
        rejected,
        combat_losses,
    } = movement::commit(world, moves)?;
    for RejectedMove { order, reason } in &rejected {
        debug!(
            tick,
            faction = %order.faction,
            from = %order.from,
            to = %order.to,
            %reason,
            "Move rejected at commit"
        );
    }

    // Phase 4: Elimination
    let (eliminated, disbanded_population) = check_eliminations(world, tick);

    world.tick = tick;

    if world.timeline.is_due(tick) {
        world.timeline.record(tick, &world.grid, &world.factions);
    }

    world.status = evaluate_status(world);
    match world.status {
        GameStatus::Running => {}
        GameStatus::Won(winner) => info!(tick, %winner, "Game won"),
        GameStatus::Draw => info!(tick, "Game ended in a draw"),
        GameStatus::TickLimit => info!(tick, "Game reached its tick limit"),
    }

    let statistics = statistics::compute_statistics(
        world,
        committed.len() as u32,
        (rejected.len() + rejected_builds.len()) as u32,
    );
    debug!(
        tick,
        commits = statistics.commits,
        rejections = statistics.rejections,
        contested = statistics.contested_cells,
        population = statistics.total_population,
        "Tick complete"
    );

    Ok(TickReport {
        tick,
        committed,
        rejected,
        builds,
        rejected_builds,
        eliminated,
        grown_population,
        combat_losses,
        disbanded_population,
        status: world.status,
        statistics,
    })
}

/// Eliminate every contender that holds no cells or has lost its capital,
/// then disband whatever it still holds.
///
/// Returns the eliminated factions and the population removed with them.
fn check_eliminations(world: &mut World, tick: u64) -> (Vec<FactionId>, u64) {
    let grid = &world.grid;
    let fallen: Vec<FactionId> = world
        .factions
        .iter()
        .filter(|f| f.is_contender())
        .filter(|f| {
            let holds_capital = grid.at(f.capital).is_ok_and(|c| c.owner == Some(f.id));
            grid.count_owned(f.id) == 0 || !holds_capital
        })
        .map(|f| f.id)
        .collect();

    let mut disbanded = 0u64;
    for &id in &fallen {
        if let Ok(faction) = world.factions.get_mut(id) {
            faction.status = FactionStatus::Eliminated { at_tick: tick };
            faction.target = None;
        }
        let mut cells = 0u32;
        for cell in world.grid.cells_mut() {
            if cell.owner == Some(id) {
                disbanded += u64::from(cell.population);
                cell.owner = None;
                cell.population = 0;
                cells += 1;
            }
        }
        info!(tick, faction = %id, disbanded_cells = cells, "Faction eliminated");
    }

    (fallen, disbanded)
}

fn evaluate_status(world: &World) -> GameStatus {
    let contenders = world.factions.contenders();
    match contenders.as_slice() {
        [] => GameStatus::Draw,
        [winner] => GameStatus::Won(*winner),
        _ => match world.config.max_ticks {
            Some(max) if world.tick >= max => GameStatus::TickLimit,
            _ => GameStatus::Running,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactionSpec, GameConfig, MoveRule};
    use crate::error::MoveRejection;
    use crate::world::{Pos, Strategy, TerrainKind};

    fn duel() -> World {
        let mut config = GameConfig::default();
        config.width = 6;
        config.height = 4;
        config.seed = Some(42);
        config.start_population = 5;
        config.terrain.layout = Some(vec!["......".to_string(); 4]);
        config.rules.move_rule = MoveRule::fixed(2);
        config.factions = vec![FactionSpec::human().at(0, 0), FactionSpec::human().at(5, 3)];
        World::new(config).unwrap()
    }

    #[test]
    fn empty_tick_advances_counter_and_pays_income() {
        let mut world = duel();
        let report = world.simulate().unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(world.tick(), 1);
        assert!(report.committed.is_empty());
        assert_eq!(report.grown_population, 4);
        assert_eq!(world.gold(FactionId(1)).unwrap(), 1);
        assert_eq!(report.status, GameStatus::Running);
    }

    #[test]
    fn queued_move_commits_on_next_tick() {
        let mut world = duel();
        world
            .kings_move(FactionId(1), Pos::new(0, 0), Pos::new(1, 0))
            .unwrap();
        assert_eq!(world.cell(Pos::new(1, 0)).unwrap().owner, None);

        let report = world.simulate().unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(world.cell(Pos::new(1, 0)).unwrap().population, 2);
        assert_eq!(world.cell(Pos::new(0, 0)).unwrap().population, 5);
        assert!(world.pending_move(FactionId(1)).is_none());
    }

    #[test]
    fn invalidated_order_is_rejected_at_commit() {
        let mut world = duel();
        world
            .kings_move(FactionId(1), Pos::new(0, 0), Pos::new(1, 0))
            .unwrap();
        // The source changes hands before the commit.
        world.grid.at_mut(Pos::new(0, 0)).unwrap().owner = Some(FactionId(2));

        let report = world.simulate().unwrap();
        assert!(report.committed.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(
            report.rejected[0].reason,
            EngineError::InvalidMove(MoveRejection::NotOwner {
                owner: Some(FactionId(2))
            })
        );
    }

    #[test]
    fn capturing_the_capital_wins_the_duel() {
        let mut world = duel();
        {
            let staging = world.grid.at_mut(Pos::new(4, 2)).unwrap();
            staging.owner = Some(FactionId(1));
            staging.population = 40;
        }
        world.grid.at_mut(Pos::new(5, 3)).unwrap().population = 1;
        world.config.rules.move_rule = MoveRule::fraction(1, 2);
        world
            .kings_move(FactionId(1), Pos::new(4, 2), Pos::new(5, 3))
            .unwrap();

        let report = world.simulate().unwrap();
        assert_eq!(report.eliminated, vec![FactionId(2)]);
        assert_eq!(report.status, GameStatus::Won(FactionId(1)));
        assert_eq!(
            world.faction(FactionId(2)).unwrap().status,
            FactionStatus::Eliminated { at_tick: 1 }
        );
        let capital = world.cell(Pos::new(5, 3)).unwrap();
        assert_eq!(capital.owner, Some(FactionId(1)));
        assert_eq!(capital.terrain, TerrainKind::Capital);

        assert_eq!(world.simulate().unwrap_err(), EngineError::GameOver);
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn eliminated_faction_is_disbanded() {
        let mut world = duel();
        {
            let outpost = world.grid.at_mut(Pos::new(3, 3)).unwrap();
            outpost.owner = Some(FactionId(2));
            outpost.population = 9;
        }
        world.grid.at_mut(Pos::new(5, 3)).unwrap().owner = Some(FactionId(1));

        let report = world.simulate().unwrap();
        assert_eq!(report.eliminated, vec![FactionId(2)]);
        // The lost capital already changed hands; only the outpost is disbanded.
        assert_eq!(report.disbanded_population, 9);
        assert_eq!(world.cell(Pos::new(3, 3)).unwrap().owner, None);
        assert_eq!(world.cell(Pos::new(3, 3)).unwrap().population, 0);
        assert!(world.check_invariants().is_ok());
    }

    #[test]
    fn tick_limit_ends_the_game() {
        let mut world = duel();
        world.config.max_ticks = Some(3);
        for _ in 0..2 {
            assert_eq!(world.simulate().unwrap().status, GameStatus::Running);
        }
        assert_eq!(world.simulate().unwrap().status, GameStatus::TickLimit);
        assert!(world.is_over());
        assert_eq!(world.simulate().unwrap_err(), EngineError::GameOver);
    }

    #[test]
    fn committed_build_is_paid_after_income() {
        let mut world = duel();
        world.grid.at_mut(Pos::new(1, 0)).unwrap().owner = Some(FactionId(1));
        world.factions.add_gold(FactionId(1), 159).unwrap();
        // Affordable only after this tick's income.
        assert!(world.build(FactionId(1), Pos::new(1, 0)).is_err());
        world.factions.add_gold(FactionId(1), 1).unwrap();
        world.build(FactionId(1), Pos::new(1, 0)).unwrap();

        let report = world.simulate().unwrap();
        assert_eq!(report.builds.len(), 1);
        assert_eq!(world.cell(Pos::new(1, 0)).unwrap().terrain, TerrainKind::Village);
        assert_eq!(world.gold(FactionId(1)).unwrap(), 1);
    }

    #[test]
    fn queued_degrade_replaces_the_upgrade() {
        let mut world = duel();
        let pos = Pos::new(1, 0);
        world.grid.at_mut(pos).unwrap().owner = Some(FactionId(1));
        world.grid.at_mut(pos).unwrap().terrain = TerrainKind::Village;
        world.factions.add_gold(FactionId(1), 500).unwrap();

        world.build(FactionId(1), pos).unwrap();
        world.degrade(FactionId(1), pos).unwrap();
        assert_eq!(world.pending_build(FactionId(1)), Some(BuildOrder::degrade(pos)));

        let report = world.simulate().unwrap();
        assert_eq!(report.builds.len(), 1);
        assert_eq!(report.builds[0].price, 0);
        assert_eq!(world.cell(pos).unwrap().terrain, TerrainKind::Plain);

        // A degrade queued on a plain is refused up front.
        assert_eq!(
            world.degrade(FactionId(1), pos).unwrap_err(),
            EngineError::InvalidBuild(crate::error::BuildRejection::DegradePlain)
        );
    }

    #[test]
    fn ai_factions_act_every_tick() {
        let mut config = duel().config;
        config.factions[1] = FactionSpec::ai(Strategy::AggrGreedy).at(5, 3);
        let mut world = World::new(config).unwrap();
        let report = world.simulate().unwrap();
        assert_eq!(report.committed.len(), 1);
        assert_eq!(report.committed[0].order.faction, FactionId(2));
    }

    #[test]
    fn timeline_sampled_on_interval() {
        let mut world = duel();
        world.timeline = statistics::Timeline::new(2);
        world.simulate().unwrap();
        assert!(world.timeline().is_empty());
        world.simulate().unwrap();
        assert_eq!(world.timeline().latest().unwrap().tick, 2);
    }
}
