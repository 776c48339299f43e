use crate::world::{FactionId, TerrainKind, World};

/// Income phase: clear last tick's contested flags, grow population on
/// cells held by contenders, pay each contender its mines and capital.
/// Neutral holdings stay as they are.
///
/// Returns the population added by growth.
pub(crate) fn apply_income(world: &mut World) -> u64 {
    let growers: Vec<FactionId> = world
        .factions
        .iter()
        .filter(|f| f.is_contender())
        .map(|f| f.id)
        .collect();
    let mut grown = 0u64;

    for cell in world.grid.cells_mut() {
        cell.contested = false;
        if !cell.owner.is_some_and(|owner| growers.contains(&owner)) {
            continue;
        }
        let cap = cell.terrain.growth_cap();
        if cell.population < cap {
            let next = (cell.population + cell.terrain.growth()).min(cap);
            grown += u64::from(next - cell.population);
            cell.population = next;
        }
    }

    let rules = &world.config.rules;
    let payroll: Vec<_> = world
        .factions
        .iter()
        .filter(|f| f.is_contender())
        .map(|f| {
            let mines = u64::from(world.grid.count_owned_of(f.id, TerrainKind::Mine));
            let holds_capital = world
                .grid
                .at(f.capital)
                .is_ok_and(|c| c.owner == Some(f.id));
            let income = rules.gold_per_mine * mines
                + if holds_capital { rules.capital_income } else { 0 };
            (f.id, income)
        })
        .collect();

    for (id, income) in payroll {
        if let Some(faction) = world.factions.iter_mut().find(|f| f.id == id) {
            faction.gold = faction.gold.saturating_add(income);
        }
    }

    grown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FactionSpec, GameConfig};
    use crate::world::{FactionId, Pos};

    fn world() -> World {
        let mut config = GameConfig::default();
        config.width = 5;
        config.height = 5;
        config.seed = Some(1);
        config.start_population = 10;
        config.terrain.layout = Some(vec![
            ".$...".to_string(),
            ".....".to_string(),
            "..v..".to_string(),
            ".....".to_string(),
            "....t".to_string(),
        ]);
        config.factions = vec![FactionSpec::human().at(0, 0), FactionSpec::human().at(4, 0)];
        World::new(config).unwrap()
    }

    #[test]
    fn capitals_grow_and_pay() {
        let mut w = world();
        let grown = apply_income(&mut w);
        assert_eq!(grown, 4);
        assert_eq!(w.cell(Pos::new(0, 0)).unwrap().population, 12);
        assert_eq!(w.gold(FactionId(1)).unwrap(), 1);
        assert_eq!(w.gold(FactionId(2)).unwrap(), 1);
    }

    #[test]
    fn mines_pay_their_owner() {
        let mut w = world();
        w.grid.at_mut(Pos::new(1, 0)).unwrap().owner = Some(FactionId(1));
        apply_income(&mut w);
        assert_eq!(w.gold(FactionId(1)).unwrap(), 4 + 1);
    }

    #[test]
    fn lost_capital_pays_nothing() {
        let mut w = world();
        w.grid.at_mut(Pos::new(0, 0)).unwrap().owner = Some(FactionId(2));
        apply_income(&mut w);
        assert_eq!(w.gold(FactionId(1)).unwrap(), 0);
    }

    #[test]
    fn growth_stops_at_cap_and_skips_unowned() {
        let mut w = world();
        {
            let village = w.grid.at_mut(Pos::new(2, 2)).unwrap();
            village.owner = Some(FactionId(1));
            village.population = 100;
        }
        {
            let plain = w.grid.at_mut(Pos::new(1, 1)).unwrap();
            plain.owner = Some(FactionId(1));
            plain.population = 3;
        }
        w.grid.at_mut(Pos::new(0, 0)).unwrap().population = 299;

        apply_income(&mut w);
        assert_eq!(w.cell(Pos::new(2, 2)).unwrap().population, 100);
        assert_eq!(w.cell(Pos::new(1, 1)).unwrap().population, 3);
        assert_eq!(w.cell(Pos::new(0, 0)).unwrap().population, 300);
        assert_eq!(w.cell(Pos::new(4, 4)).unwrap().population, 0);
    }

    #[test]
    fn contested_flags_are_cleared() {
        let mut w = world();
        w.grid.at_mut(Pos::new(3, 3)).unwrap().contested = true;
        apply_income(&mut w);
        assert!(!w.cell(Pos::new(3, 3)).unwrap().contested);
    }

    #[test]
    fn neutral_holdings_neither_grow_nor_pay() {
        let mut config = world().config;
        config.factions.push(FactionSpec::neutral().at(4, 4));
        let mut w = World::new(config).unwrap();
        w.grid.at_mut(Pos::new(1, 0)).unwrap().owner = Some(FactionId(3));

        let grown = apply_income(&mut w);
        assert_eq!(grown, 4);
        assert_eq!(w.cell(Pos::new(4, 4)).unwrap().population, 10);
        assert_eq!(w.gold(FactionId(3)).unwrap(), 0);
    }
}
