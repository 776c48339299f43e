use landgrab::config::{FactionSpec, GameConfig, MapShape, MoveRule};
use landgrab::world::{FactionStatus, Strategy};
use landgrab::{EngineError, FactionId, GameStatus, MoveRejection, Pos, Resolution, TerrainKind, World};

fn open_field(width: u16, height: u16, rule: MoveRule, starts: [(u16, u16); 2]) -> GameConfig {
    GameConfig {
        width,
        height,
        seed: Some(42),
        start_population: 5,
        factions: vec![
            FactionSpec::human().at(starts[0].0, starts[0].1),
            FactionSpec::human().at(starts[1].0, starts[1].1),
        ],
        terrain: landgrab::config::TerrainConfig {
            layout: Some(vec![".".repeat(usize::from(width)); usize::from(height)]),
            ..Default::default()
        },
        rules: landgrab::config::RuleConfig {
            move_rule: rule,
            ..Default::default()
        },
        ..GameConfig::default()
    }
}

#[test]
fn first_move_from_the_corner() {
    let mut world = World::new(open_field(10, 10, MoveRule::fixed(2), [(0, 0), (9, 9)])).unwrap();
    let f1 = FactionId(1);

    let predicted = world.kings_move(f1, Pos::new(0, 0), Pos::new(1, 1)).unwrap();
    assert_eq!(predicted.resolution, Resolution::Claimed);
    assert_eq!(predicted.moved, 2);

    let report = world.simulate().unwrap();
    assert_eq!(report.tick, 1);
    assert_eq!(world.tick(), 1);

    // Capital grew 5 -> 7 before the commit, then sent 2.
    let capital = world.cell(Pos::new(0, 0)).unwrap();
    assert_eq!(capital.population, 5);
    let claimed = world.cell(Pos::new(1, 1)).unwrap();
    assert_eq!(claimed.owner, Some(f1));
    assert_eq!(claimed.population, 2);
    assert_eq!(world.gold(f1).unwrap(), 1);
    assert_eq!(world.status(), GameStatus::Running);
}

#[test]
fn rejected_moves_do_not_queue() {
    let mut world = World::new(open_field(10, 10, MoveRule::fixed(2), [(0, 0), (9, 9)])).unwrap();
    assert_eq!(
        world
            .kings_move(FactionId(1), Pos::new(9, 9), Pos::new(8, 8))
            .unwrap_err(),
        EngineError::InvalidMove(MoveRejection::NotOwner {
            owner: Some(FactionId(2))
        })
    );
    assert_eq!(
        world
            .kings_move(FactionId(7), Pos::new(0, 0), Pos::new(1, 1))
            .unwrap_err(),
        EngineError::UnknownFaction(FactionId(7))
    );
    assert!(world.pending_move(FactionId(1)).is_none());
}

#[test]
fn capturing_the_capital_ends_the_game() {
    let mut world = World::new(open_field(4, 1, MoveRule::fraction(1, 1), [(0, 0), (2, 0)])).unwrap();
    let (f1, f2) = (FactionId(1), FactionId(2));

    // Both kings empty their capitals.
    world.kings_move(f1, Pos::new(0, 0), Pos::new(1, 0)).unwrap();
    world.kings_move(f2, Pos::new(2, 0), Pos::new(3, 0)).unwrap();
    world.simulate().unwrap();
    assert_eq!(world.cell(Pos::new(1, 0)).unwrap().population, 7);
    assert_eq!(world.cell(Pos::new(2, 0)).unwrap().population, 0);

    // The undefended capital regrows to 2 and falls.
    world.kings_move(f1, Pos::new(1, 0), Pos::new(2, 0)).unwrap();
    let report = world.simulate().unwrap();

    assert_eq!(report.committed.len(), 1);
    assert_eq!(report.committed[0].outcome.resolution, Resolution::Captured);
    assert_eq!(report.eliminated, vec![f2]);
    assert_eq!(report.status, GameStatus::Won(f1));
    assert_eq!(report.disbanded_population, 7);

    let capital = world.cell(Pos::new(2, 0)).unwrap();
    assert_eq!(capital.owner, Some(f1));
    assert_eq!(capital.terrain, TerrainKind::Capital);
    assert_eq!(capital.population, 5);
    assert_eq!(world.cell(Pos::new(3, 0)).unwrap().owner, None);
    assert_eq!(
        world.faction(f2).unwrap().status,
        FactionStatus::Eliminated { at_tick: 2 }
    );

    assert_eq!(world.simulate().unwrap_err(), EngineError::GameOver);
    assert_eq!(
        world.kings_move(f1, Pos::new(2, 0), Pos::new(3, 0)).unwrap_err(),
        EngineError::GameOver
    );
}

#[test]
fn evacuation_and_attack_resolve_the_same_for_every_seed() {
    let mut outcomes = Vec::new();
    for seed in 0..40 {
        let mut config = open_field(5, 1, MoveRule::fraction(1, 1), [(1, 0), (3, 0)]);
        config.seed = Some(seed);
        let mut world = World::new(config).unwrap();
        let (f1, f2) = (FactionId(1), FactionId(2));

        world.kings_move(f2, Pos::new(3, 0), Pos::new(2, 0)).unwrap();
        world.simulate().unwrap();

        // Same tick: the first king leaves its capital as the second walks in.
        world.kings_move(f1, Pos::new(1, 0), Pos::new(0, 0)).unwrap();
        world.kings_move(f2, Pos::new(2, 0), Pos::new(1, 0)).unwrap();
        let report = world.simulate().unwrap();

        assert_eq!(report.status, GameStatus::Won(f2), "seed {seed}");
        assert_eq!(report.committed[1].outcome.resolution, Resolution::Captured);
        let capital = world.cell(Pos::new(1, 0)).unwrap();
        assert_eq!(capital.owner, Some(f2));
        assert_eq!(capital.population, 7);

        outcomes.push(
            world
                .cells()
                .iter()
                .map(|c| (c.owner, c.population))
                .collect::<Vec<_>>(),
        );
    }
    assert!(outcomes.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn ai_duel_runs_to_a_result() {
    let config = GameConfig {
        width: 12,
        height: 10,
        seed: Some(2024),
        max_ticks: Some(3000),
        factions: vec![
            FactionSpec::ai(Strategy::AggrGreedy),
            FactionSpec::ai(Strategy::Passive),
        ],
        ..GameConfig::default()
    };
    let mut world = World::new(config).unwrap();
    while !world.is_over() {
        world.simulate().unwrap();
        assert!(world.check_invariants().is_ok());
    }
    assert!(world.tick() <= 3000);
    assert_ne!(world.status(), GameStatus::Running);
}

#[test]
fn rhombus_games_stay_inside_the_shape() {
    let config = GameConfig {
        width: 15,
        height: 15,
        seed: Some(5),
        max_ticks: Some(300),
        factions: vec![
            FactionSpec::ai(Strategy::AggrGreedy),
            FactionSpec::ai(Strategy::Noble),
        ],
        terrain: landgrab::config::TerrainConfig {
            shape: MapShape::Rhombus,
            inequality: Some(2),
            ..Default::default()
        },
        ..GameConfig::default()
    };
    let mut world = World::new(config).unwrap();
    while !world.is_over() {
        world.simulate().unwrap();
        for cell in world.cells() {
            if !MapShape::Rhombus.contains(15, 15, cell.pos) {
                assert_eq!(cell.terrain, TerrainKind::Void);
                assert_eq!(cell.owner, None);
            }
        }
    }
    assert!(world.check_invariants().is_ok());
}
