use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::world::cell::{Pos, TerrainKind, MAX_POPULATION};
use crate::world::faction::{AiProfile, Difficulty, FactionKind, Strategy, MAX_FACTIONS};
use crate::world::grid::{MAX_HEIGHT, MAX_WIDTH};

/// Loosest accepted `terrain.inequality` level.
pub const MAX_INEQUALITY: u8 = 4;

/// Strategies handed out, in turn, to AI factions that do not name one.
const DEFAULT_STRATEGIES: [Strategy; 6] = [
    Strategy::Opportunist,
    Strategy::OneGreedy,
    Strategy::AggrGreedy,
    Strategy::Noble,
    Strategy::PersistentGreedy,
    Strategy::Midas,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkRole {
    #[default]
    Standalone,
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindName {
    Human,
    Ai,
    Neutral,
}

/// One faction entry of a game config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionSpec {
    pub kind: KindName,
    /// Only meaningful for `kind = "ai"`.
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Explicit starting cell. Picked by world generation when absent.
    #[serde(default)]
    pub start: Option<[u16; 2]>,
}

impl FactionSpec {
    pub fn human() -> Self {
        Self {
            kind: KindName::Human,
            strategy: None,
            difficulty: Difficulty::Normal,
            start: None,
        }
    }

    pub fn ai(strategy: Strategy) -> Self {
        Self {
            kind: KindName::Ai,
            strategy: Some(strategy),
            difficulty: Difficulty::Normal,
            start: None,
        }
    }

    pub fn neutral() -> Self {
        Self {
            kind: KindName::Neutral,
            strategy: None,
            difficulty: Difficulty::Normal,
            start: None,
        }
    }

    pub fn at(mut self, x: u16, y: u16) -> Self {
        self.start = Some([x, y]);
        self
    }

    pub fn start_pos(&self) -> Option<Pos> {
        self.start.map(Pos::from)
    }
}

/// Outline of the playable area inside the `width` x `height` rectangle.
/// Cells outside it are void.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapShape {
    #[default]
    Rect,
    /// A diamond touching the middle of each edge.
    Rhombus,
    /// The rectangle with its top-left and bottom-right corners cut off
    /// diagonally, half the height deep.
    Hex,
}

impl MapShape {
    pub fn contains(self, width: u16, height: u16, pos: Pos) -> bool {
        if pos.x >= width || pos.y >= height {
            return false;
        }
        let (w, h) = (i64::from(width) - 1, i64::from(height) - 1);
        let (x, y) = (i64::from(pos.x), i64::from(pos.y));
        match self {
            MapShape::Rect => true,
            // |dx|/rx + |dy|/ry <= 1 around the center, widened by half a cell.
            MapShape::Rhombus => (2 * x - w).abs() * h + (2 * y - h).abs() * w <= w * h + w.max(h),
            MapShape::Hex => {
                let cut = i64::from(height) / 2;
                x + y >= cut && x + y <= w + h - cut
            }
        }
    }
}

/// Terrain generation parameters, or an explicit layout that replaces them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainConfig {
    #[serde(default = "default_mountain_ratio")]
    pub mountain_ratio: f32,
    #[serde(default = "default_mine_ratio")]
    pub mine_ratio: f32,
    #[serde(default = "default_settlement_ratio")]
    pub settlement_ratio: f32,
    /// Rows of `.` plain, `#` mountain, `$` mine, `v` village, `t` town,
    /// `f` fortress and ` ` void.
    #[serde(default)]
    pub layout: Option<Vec<String>>,
    #[serde(default)]
    pub shape: MapShape,
    /// How uneven mine access between starting spots may be, from 0 (near
    /// equal) to 4 (loose). Procedural maps are redrawn until they comply.
    #[serde(default)]
    pub inequality: Option<u8>,
    /// Rank of the first human faction's start by mine access, 1 being the
    /// best. Only generated starts are reassigned.
    #[serde(default)]
    pub conditions: Option<u8>,
}

fn default_mountain_ratio() -> f32 {
    0.12
}
fn default_mine_ratio() -> f32 {
    0.04
}
fn default_settlement_ratio() -> f32 {
    0.05
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            mountain_ratio: default_mountain_ratio(),
            mine_ratio: default_mine_ratio(),
            settlement_ratio: default_settlement_ratio(),
            layout: None,
            shape: MapShape::Rect,
            inequality: None,
            conditions: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveRuleKind {
    /// Move a fixed number of units.
    Fixed,
    /// Move a fraction of the source population.
    Fraction,
}

/// How many units a king's move carries out of its source cell.
///
/// Flat struct rather than a data-carrying enum so it reads naturally from
/// TOML and round-trips through bincode. `amount` is used by `fixed`,
/// `numerator`/`denominator` by `fraction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRule {
    pub kind: MoveRuleKind,
    #[serde(default = "default_fixed_amount")]
    pub amount: u32,
    #[serde(default = "default_numerator")]
    pub numerator: u32,
    #[serde(default = "default_denominator")]
    pub denominator: u32,
}

fn default_fixed_amount() -> u32 {
    1
}
fn default_numerator() -> u32 {
    1
}
fn default_denominator() -> u32 {
    2
}

impl MoveRule {
    pub const fn fixed(amount: u32) -> Self {
        Self {
            kind: MoveRuleKind::Fixed,
            amount,
            numerator: 1,
            denominator: 2,
        }
    }

    pub const fn fraction(numerator: u32, denominator: u32) -> Self {
        Self {
            kind: MoveRuleKind::Fraction,
            amount: 1,
            numerator,
            denominator,
        }
    }

    /// Units leaving a source cell holding `population`. Never more than
    /// `population`, and at least 1 whenever `population` is non-zero.
    pub fn amount(&self, population: u32) -> u32 {
        if population == 0 {
            return 0;
        }
        match self.kind {
            MoveRuleKind::Fixed => self.amount.clamp(1, population),
            MoveRuleKind::Fraction => {
                let denominator = u64::from(self.denominator.max(1));
                let share = u64::from(population) * u64::from(self.numerator) / denominator;
                (share as u32).clamp(1, population)
            }
        }
    }

    fn validate(&self, errors: &mut Vec<String>) {
        match self.kind {
            MoveRuleKind::Fixed => {
                if self.amount == 0 {
                    errors.push(
                        "rules.move_rule.amount must be >= 1 for kind = \"fixed\". Example: amount = 2"
                            .to_string(),
                    );
                }
            }
            MoveRuleKind::Fraction => {
                if self.denominator == 0 || self.numerator == 0 || self.numerator > self.denominator
                {
                    errors.push(format!(
                        "rules.move_rule must satisfy 1 <= numerator <= denominator, got {}/{}. Example: numerator = 1, denominator = 2",
                        self.numerator, self.denominator
                    ));
                }
            }
        }
    }
}

impl Default for MoveRule {
    fn default() -> Self {
        MoveRule::fraction(1, 2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub move_rule: MoveRule,
    #[serde(default = "default_gold_per_mine")]
    pub gold_per_mine: u64,
    #[serde(default = "default_capital_income")]
    pub capital_income: u64,
    /// Ticks between two population timeline marks.
    #[serde(default = "default_timeline_interval")]
    pub timeline_interval: u64,
}

fn default_gold_per_mine() -> u64 {
    4
}
fn default_capital_income() -> u64 {
    1
}
fn default_timeline_interval() -> u64 {
    10
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            move_rule: MoveRule::default(),
            gold_per_mine: default_gold_per_mine(),
            capital_income: default_capital_income(),
            timeline_interval: default_timeline_interval(),
        }
    }
}

/// Everything needed to construct a game. Stored inside the world with the
/// seed resolved, so a snapshot carries its own rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
    /// Drawn from OS entropy at construction when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub max_ticks: Option<u64>,
    #[serde(default = "default_start_population")]
    pub start_population: u32,
    /// Carried for hosts that run networked games; the engine ignores it.
    #[serde(default)]
    pub network_role: NetworkRole,
    #[serde(default)]
    pub clients: u8,
    #[serde(default = "default_factions")]
    pub factions: Vec<FactionSpec>,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub rules: RuleConfig,
}

fn default_width() -> u16 {
    21
}
fn default_height() -> u16 {
    21
}
fn default_start_population() -> u32 {
    10
}
fn default_factions() -> Vec<FactionSpec> {
    vec![FactionSpec::human(), FactionSpec::ai(Strategy::Opportunist)]
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            seed: None,
            max_ticks: None,
            start_population: default_start_population(),
            network_role: NetworkRole::Standalone,
            clients: 0,
            factions: default_factions(),
            terrain: TerrainConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: GameConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config
            .validate()
            .map_err(|e| format!("{}:\n{}", source_path.display(), e))?;
        Ok(config)
    }

    /// The kind each faction resolves to, in id order.
    pub fn faction_kinds(&self) -> Vec<FactionKind> {
        let mut ai_seen = 0;
        self.factions
            .iter()
            .map(|spec| match spec.kind {
                KindName::Human => FactionKind::Human,
                KindName::Neutral => FactionKind::Neutral,
                KindName::Ai => {
                    let strategy = spec
                        .strategy
                        .unwrap_or(DEFAULT_STRATEGIES[ai_seen % DEFAULT_STRATEGIES.len()]);
                    ai_seen += 1;
                    FactionKind::Ai(AiProfile {
                        strategy,
                        difficulty: spec.difficulty,
                    })
                }
            })
            .collect()
    }

    /// Parse the explicit layout into terrain rows. Assumes `validate` passed.
    pub fn layout_terrain(&self) -> Option<Vec<Vec<TerrainKind>>> {
        let rows = self.terrain.layout.as_ref()?;
        rows.iter()
            .map(|row| {
                row.chars()
                    .map(TerrainKind::from_layout_char)
                    .collect::<Option<Vec<_>>>()
            })
            .collect()
    }

    /// Check every field and report all violations at once.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !(1..=MAX_WIDTH).contains(&self.width) {
            errors.push(format!(
                "width must be 1-{}, got {}. Example: width = 21",
                MAX_WIDTH, self.width
            ));
        }
        if !(1..=MAX_HEIGHT).contains(&self.height) {
            errors.push(format!(
                "height must be 1-{}, got {}. Example: height = 21",
                MAX_HEIGHT, self.height
            ));
        }

        if !(2..=MAX_FACTIONS).contains(&self.factions.len()) {
            errors.push(format!(
                "factions must list 2-{} entries, got {}",
                MAX_FACTIONS,
                self.factions.len()
            ));
        }
        let contenders = self
            .factions
            .iter()
            .filter(|f| f.kind != KindName::Neutral)
            .count();
        if contenders < 2 {
            errors.push(format!(
                "at least 2 factions must be human or ai, got {}",
                contenders
            ));
        }

        if self.start_population == 0 || self.start_population > MAX_POPULATION {
            errors.push(format!(
                "start_population must be 1-{}, got {}. Example: start_population = 10",
                MAX_POPULATION, self.start_population
            ));
        }

        if self.max_ticks == Some(0) {
            errors.push("max_ticks must be > 0 when set. Example: max_ticks = 5000".to_string());
        }

        if self.network_role == NetworkRole::Server && self.clients == 0 {
            errors.push(
                "clients must be > 0 when network_role = \"server\". Example: clients = 1"
                    .to_string(),
            );
        }

        let layout = self.validate_layout(&mut errors);
        self.validate_factions(layout.as_deref(), &mut errors);

        self.validate_fairness(contenders, &mut errors);

        for (name, ratio) in [
            ("terrain.mountain_ratio", self.terrain.mountain_ratio),
            ("terrain.mine_ratio", self.terrain.mine_ratio),
            ("terrain.settlement_ratio", self.terrain.settlement_ratio),
        ] {
            if !(0.0..=0.5).contains(&ratio) {
                errors.push(format!("{} must be 0.0-0.5, got {}", name, ratio));
            }
        }

        self.rules.move_rule.validate(&mut errors);
        if self.rules.timeline_interval == 0 {
            errors.push(
                "rules.timeline_interval must be > 0. Example: timeline_interval = 10".to_string(),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }

    fn validate_layout(&self, errors: &mut Vec<String>) -> Option<Vec<Vec<TerrainKind>>> {
        let rows = self.terrain.layout.as_ref()?;
        let mut ok = true;

        if rows.len() != usize::from(self.height) {
            errors.push(format!(
                "terrain.layout has {} rows but height is {}",
                rows.len(),
                self.height
            ));
            ok = false;
        }
        for (y, row) in rows.iter().enumerate() {
            let len = row.chars().count();
            if len != usize::from(self.width) {
                errors.push(format!(
                    "terrain.layout row {} has {} columns but width is {}",
                    y, len, self.width
                ));
                ok = false;
            }
            if let Some(bad) = row.chars().find(|&c| TerrainKind::from_layout_char(c).is_none()) {
                errors.push(format!(
                    "terrain.layout row {} contains '{}'; expected one of . # $ v t f or space",
                    y, bad
                ));
                ok = false;
            }
        }

        if ok { self.layout_terrain() } else { None }
    }

    fn validate_factions(&self, layout: Option<&[Vec<TerrainKind>]>, errors: &mut Vec<String>) {
        let mut taken = HashSet::new();
        for (i, spec) in self.factions.iter().enumerate() {
            if spec.strategy.is_some() && spec.kind != KindName::Ai {
                errors.push(format!(
                    "factions[{}].strategy only applies to kind = \"ai\"",
                    i
                ));
            }

            let Some(pos) = spec.start_pos() else {
                continue;
            };
            if pos.x >= self.width || pos.y >= self.height {
                errors.push(format!(
                    "factions[{}].start {} is outside the {}x{} grid",
                    i, pos, self.width, self.height
                ));
                continue;
            }
            if !taken.insert(pos) {
                errors.push(format!(
                    "factions[{}].start {} collides with another faction",
                    i, pos
                ));
            }
            if !self.terrain.shape.contains(self.width, self.height, pos) {
                errors.push(format!(
                    "factions[{}].start {} lies outside the {:?} map shape",
                    i, pos, self.terrain.shape
                ));
                continue;
            }
            let blocked = layout
                .and_then(|rows| rows.get(usize::from(pos.y)))
                .and_then(|row| row.get(usize::from(pos.x)))
                .filter(|t| !t.is_passable());
            if let Some(terrain) = blocked {
                let what = match terrain {
                    TerrainKind::Mountain => "a mountain",
                    _ => "void",
                };
                errors.push(format!("factions[{}].start {} is {}", i, pos, what));
            }
        }
    }

    fn validate_fairness(&self, contenders: usize, errors: &mut Vec<String>) {
        if self.terrain.shape == MapShape::Hex && self.width < self.height {
            errors.push(format!(
                "terrain.shape = \"hex\" needs width >= height, got {}x{}",
                self.width, self.height
            ));
        }
        if let Some(level) = self.terrain.inequality {
            if level > MAX_INEQUALITY {
                errors.push(format!(
                    "terrain.inequality must be 0-{}, got {}. Example: inequality = 2",
                    MAX_INEQUALITY, level
                ));
            }
        }
        if let Some(rank) = self.terrain.conditions {
            if rank == 0 || usize::from(rank) > contenders.max(1) {
                errors.push(format!(
                    "terrain.conditions must be 1-{}, got {}. Example: conditions = 1",
                    contenders.max(1),
                    rank
                ));
            }
            if !self.factions.iter().any(|f| f.kind == KindName::Human) {
                errors.push("terrain.conditions needs a human faction".to_string());
            }
        }
    }
}
