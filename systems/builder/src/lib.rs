#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! One-shot procedural level builder.
//!
//! The builder stamps the path described by a [`LevelDefinition`] into a
//! [`GridMap`], marks every non-path cell bordering the path as turret
//! eligible, and then decides a decoration for the remaining cells with
//! seeded weighted draws. The result is a [`LevelBlueprint`] the world turns
//! into entities through `Command::ConstructLevel`.

use std::ops::RangeInclusive;

use log::info;
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng, SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use tower_defense_core::{
    prefab_names, CellCoord, Decoration, Direction, GridMap, LevelBlueprint, LevelDefinition,
    LevelError, PathSpec, Placement, PrefabCatalog, TileDimensions, TileKind, Tree, TurretKind,
};

/// Relative odds of the outcomes drawn for each non-path cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecorationWeights {
    /// Weight of leaving a turret-eligible cell empty.
    pub empty: f64,
    /// Weight of planting a tree on a turret-eligible cell.
    pub tree: f64,
    /// Weight of placing a turret on a turret-eligible cell.
    pub turret: f64,
    /// Probability of planting a tree on a cell away from the path.
    pub remote_tree: f64,
}

impl Default for DecorationWeights {
    fn default() -> Self {
        Self {
            empty: 0.195,
            tree: 0.35,
            turret: 0.455,
            remote_tree: 0.2,
        }
    }
}

/// Relative odds of each turret variant once a turret was drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TurretWeights {
    /// Weight of the cannon variant.
    pub cannon: f64,
    /// Weight of the laser variant.
    pub laser: f64,
}

impl TurretWeights {
    fn weight(&self, kind: TurretKind) -> f64 {
        match kind {
            TurretKind::Cannon => self.cannon,
            TurretKind::Laser => self.laser,
        }
    }
}

impl Default for TurretWeights {
    fn default() -> Self {
        Self {
            cannon: 2.0,
            laser: 1.0,
        }
    }
}

/// Configuration parameters required to construct the level builder.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    rng_seed: u64,
    decorations: DecorationWeights,
    turrets: TurretWeights,
    tree_height: RangeInclusive<f32>,
    tree_variation: RangeInclusive<f32>,
}

impl Config {
    /// Creates a configuration with default weights and the provided seed.
    #[must_use]
    pub fn new(rng_seed: u64) -> Self {
        Self {
            rng_seed,
            decorations: DecorationWeights::default(),
            turrets: TurretWeights::default(),
            tree_height: 0.8..=1.25,
            tree_variation: -0.15..=0.15,
        }
    }

    /// Replaces the decoration weights.
    #[must_use]
    pub fn with_decoration_weights(mut self, decorations: DecorationWeights) -> Self {
        self.decorations = decorations;
        self
    }

    /// Replaces the turret variant weights.
    #[must_use]
    pub fn with_turret_weights(mut self, turrets: TurretWeights) -> Self {
        self.turrets = turrets;
        self
    }

    /// Replaces the ranges tree parameters are drawn from.
    #[must_use]
    pub fn with_tree_ranges(
        mut self,
        height: RangeInclusive<f32>,
        variation: RangeInclusive<f32>,
    ) -> Self {
        self.tree_height = height;
        self.tree_variation = variation;
        self
    }
}

/// Seeded level builder. Consumed by [`LevelBuilder::build`].
#[derive(Debug)]
pub struct LevelBuilder {
    config: Config,
    rng: ChaCha8Rng,
}

impl LevelBuilder {
    /// Creates a builder whose draws are reproducible for the configured seed.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.rng_seed);
        Self { config, rng }
    }

    /// Builds the blueprint of `definition`.
    ///
    /// Any inconsistency in the definition aborts the build; no partial level
    /// is produced.
    pub fn build(mut self, definition: &LevelDefinition) -> Result<LevelBlueprint, LevelError> {
        let tiles = definition.tiles;
        validate_tiles(&tiles)?;
        let draws = Draws::new(&self.config, &definition.prefabs)?;

        let mut map = GridMap::new(definition.columns, definition.rows)?;
        stamp_path(&mut map, &definition.path)?;
        mark_turret_eligible(&mut map)?;

        let spawn = definition.spawn_cell()?;
        if !map.is_path(spawn) {
            return Err(LevelError::SpawnOffPath(spawn));
        }
        for name in [
            prefab_names::TILE,
            prefab_names::PATH,
            prefab_names::TREE,
            prefab_names::ENEMY,
        ] {
            let _ = definition.prefabs.require(name)?;
        }

        let placements = self.decorate(&map, &draws);
        let layout = definition.layout();
        let path_cells = map
            .cells()
            .filter(|(_, kind)| *kind == TileKind::Path)
            .count();
        let turrets = placements
            .iter()
            .filter(|placement| matches!(placement.decoration, Decoration::Turret(_)))
            .count();
        info!(
            "level layout decided: {path_cells} path cells, {} trees, {turrets} turrets",
            placements.len() - turrets
        );

        Ok(LevelBlueprint::new(
            layout,
            tiles,
            map,
            layout.cell_center(spawn, 0.0),
            placements,
            definition.prefabs.clone(),
        ))
    }

    fn decorate(&mut self, map: &GridMap, draws: &Draws) -> Vec<Placement> {
        let mut placements = Vec::new();
        for (cell, kind) in map.cells() {
            let decoration = match kind {
                TileKind::Path => None,
                TileKind::TurretEligible => match draws.eligible.sample(&mut self.rng) {
                    ELIGIBLE_TREE => Some(Decoration::Tree(self.draw_tree())),
                    ELIGIBLE_TURRET => draws.turrets.as_ref().map(|turrets| {
                        Decoration::Turret(draws.kinds[turrets.sample(&mut self.rng)])
                    }),
                    _ => None,
                },
                TileKind::Other => self
                    .rng
                    .gen_bool(self.config.decorations.remote_tree)
                    .then(|| Decoration::Tree(self.draw_tree())),
            };
            if let Some(decoration) = decoration {
                placements.push(Placement { cell, decoration });
            }
        }
        placements
    }

    fn draw_tree(&mut self) -> Tree {
        Tree {
            height: self.rng.gen_range(self.config.tree_height.clone()),
            variation: self.rng.gen_range(self.config.tree_variation.clone()),
        }
    }
}

const ELIGIBLE_TREE: usize = 1;
const ELIGIBLE_TURRET: usize = 2;

#[derive(Debug)]
struct Draws {
    eligible: WeightedIndex<f64>,
    /// Absent when turrets are never drawn.
    turrets: Option<WeightedIndex<f64>>,
    kinds: Vec<TurretKind>,
}

impl Draws {
    fn new(config: &Config, prefabs: &PrefabCatalog) -> Result<Self, LevelError> {
        let decorations = &config.decorations;
        let eligible = WeightedIndex::new([decorations.empty, decorations.tree, decorations.turret])
            .map_err(|_| LevelError::InvalidWeights("decoration weights must not all be zero"))?;
        if !(0.0..=1.0).contains(&decorations.remote_tree) {
            return Err(LevelError::InvalidWeights(
                "remote tree probability must lie in 0..=1",
            ));
        }
        if config.tree_height.is_empty() || config.tree_variation.is_empty() {
            return Err(LevelError::InvalidWeights("tree parameter ranges are empty"));
        }

        let kinds: Vec<TurretKind> = TurretKind::ALL
            .into_iter()
            .filter(|kind| config.turrets.weight(*kind) > 0.0)
            .collect();
        let turrets = if decorations.turret > 0.0 {
            for kind in &kinds {
                let _ = prefabs.require(kind.prefab_name())?;
            }
            let turrets = WeightedIndex::new(kinds.iter().map(|kind| config.turrets.weight(*kind)))
                .map_err(|_| LevelError::InvalidWeights("turret weights must not all be zero"))?;
            Some(turrets)
        } else {
            None
        };

        Ok(Self {
            eligible,
            turrets,
            kinds,
        })
    }
}

fn validate_tiles(tiles: &TileDimensions) -> Result<(), LevelError> {
    let valid = tiles.size.is_finite()
        && tiles.size > 0.0
        && tiles.spacing.is_finite()
        && tiles.spacing >= 0.0;
    if valid {
        Ok(())
    } else {
        Err(LevelError::InvalidTileMetrics {
            size: tiles.size,
            spacing: tiles.spacing,
        })
    }
}

/// Marks every cell the path description covers as [`TileKind::Path`].
///
/// Waypoint lists are filled segment by segment; each consecutive pair must
/// share exactly one coordinate.
pub fn stamp_path(map: &mut GridMap, path: &PathSpec) -> Result<(), LevelError> {
    match path {
        PathSpec::Cells(cells) => {
            if cells.is_empty() {
                return Err(LevelError::EmptyPath);
            }
            for cell in cells {
                map.set(*cell, TileKind::Path)?;
            }
        }
        PathSpec::Waypoints(waypoints) => {
            let Some(first) = waypoints.first() else {
                return Err(LevelError::EmptyPath);
            };
            map.set(*first, TileKind::Path)?;
            for pair in waypoints.windows(2) {
                fill_segment(map, pair[0], pair[1])?;
            }
        }
    }
    Ok(())
}

fn fill_segment(map: &mut GridMap, from: CellCoord, to: CellCoord) -> Result<(), LevelError> {
    let same_column = from.column() == to.column();
    let same_row = from.row() == to.row();
    if same_column == same_row {
        return Err(LevelError::MisalignedWaypoints { from, to });
    }

    let mut cursor = from;
    map.set(cursor, TileKind::Path)?;
    while cursor != to {
        cursor = CellCoord::new(
            step_toward(cursor.column(), to.column()),
            step_toward(cursor.row(), to.row()),
        );
        map.set(cursor, TileKind::Path)?;
    }
    Ok(())
}

fn step_toward(value: u32, target: u32) -> u32 {
    match value.cmp(&target) {
        std::cmp::Ordering::Less => value + 1,
        std::cmp::Ordering::Greater => value - 1,
        std::cmp::Ordering::Equal => value,
    }
}

/// Reclassifies non-path cells with a path cell among their four neighbours
/// as [`TileKind::TurretEligible`].
pub fn mark_turret_eligible(map: &mut GridMap) -> Result<(), LevelError> {
    let eligible: Vec<CellCoord> = map
        .cells()
        .filter(|(_, kind)| *kind != TileKind::Path)
        .map(|(cell, _)| cell)
        .filter(|cell| {
            Direction::ALL
                .into_iter()
                .filter_map(|direction| cell.offset(direction))
                .any(|neighbour| map.is_path(neighbour))
        })
        .collect();
    for cell in eligible {
        map.set(cell, TileKind::TurretEligible)?;
    }
    Ok(())
}

/// Builds a level on a `columns × rows` grid with the reference prefabs.
pub fn build_level(
    columns: u32,
    rows: u32,
    tile_size: f32,
    spacing: f32,
    path: PathSpec,
    rng_seed: u64,
) -> Result<LevelBlueprint, LevelError> {
    let tiles = TileDimensions {
        size: tile_size,
        spacing,
        ..TileDimensions::default()
    };
    let definition = LevelDefinition {
        columns,
        rows,
        tiles,
        path,
        spawn: None,
        prefabs: PrefabCatalog::reference(&tiles)?,
    };
    LevelBuilder::new(Config::new(rng_seed)).build(&definition)
}
