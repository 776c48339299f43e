use serde::Serialize;

use crate::world::{Cell, FactionKind, FactionStatus, GameStatus, World};

/// Everything a renderer needs to draw one frame, as a serializable value.
#[derive(Debug, Clone, Serialize)]
pub struct RenderView {
    pub tick: u64,
    pub seed: u64,
    pub width: u16,
    pub height: u16,
    pub status: GameStatus,
    /// Terrain rows, capitals shown as `C`.
    pub rows: Vec<String>,
    pub cells: Vec<Cell>,
    pub factions: Vec<FactionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactionView {
    pub id: u8,
    pub kind: FactionKind,
    pub gold: u64,
    pub cells: u32,
    pub population: u32,
    pub eliminated_at: Option<u64>,
}

impl RenderView {
    pub fn from_world(world: &World) -> Self {
        let grid = world.grid();
        let factions = world
            .factions()
            .iter()
            .map(|f| FactionView {
                id: f.id.0,
                kind: f.kind,
                gold: f.gold,
                cells: grid.count_owned(f.id),
                population: grid.population_of(f.id),
                eliminated_at: match f.status {
                    FactionStatus::Active => None,
                    FactionStatus::Eliminated { at_tick } => Some(at_tick),
                },
            })
            .collect();

        Self {
            tick: world.tick(),
            seed: world.seed(),
            width: world.width(),
            height: world.height(),
            status: world.status(),
            rows: grid.layout_rows(),
            cells: grid.cells().to_vec(),
            factions,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::GameConfig;
    use crate::world::World;

    #[test]
    fn view_serializes_to_json() {
        let mut config = GameConfig::default();
        config.seed = Some(5);
        config.width = 8;
        config.height = 6;
        let world = World::new(config).unwrap();

        let view = world.render_view();
        assert_eq!(view.cells.len(), 48);
        assert_eq!(view.rows.len(), 6);
        assert_eq!(view.factions.len(), 2);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["seed"], 5);
        assert_eq!(json["status"], "Running");
        assert_eq!(json["factions"][0]["kind"], "Human");
    }
}
