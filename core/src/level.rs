//! Level definitions consumed by the level builder and blueprints it produces.

use serde::Deserialize;
use thiserror::Error;

use crate::{
    components::{Tree, Vector3},
    grid::{GridLayout, GridMap},
    prefab::PrefabCatalog,
    CellCoord, TurretKind,
};

/// Side length of the reference level in tiles.
pub const REFERENCE_GRID_SIZE: u32 = 10;

/// Waypoints of the reference level, in path order.
pub const REFERENCE_WAYPOINTS: [(u32, u32); 12] = [
    (0, 1),
    (8, 1),
    (8, 3),
    (1, 3),
    (1, 8),
    (4, 8),
    (4, 5),
    (8, 5),
    (8, 7),
    (6, 7),
    (6, 9),
    (9, 9),
];

/// Construction-time failures. Any of them aborts level initialization.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LevelError {
    /// The grid has no cells.
    #[error("grid must have at least one cell (received {columns}x{rows})")]
    EmptyGrid {
        /// Requested column count.
        columns: u32,
        /// Requested row count.
        rows: u32,
    },
    /// A cell index fell outside `[0, columns) × [0, rows)`.
    #[error("cell ({}, {}) lies outside the {columns}x{rows} grid", .cell.column(), .cell.row())]
    CellOutOfBounds {
        /// Offending cell.
        cell: CellCoord,
        /// Grid column count.
        columns: u32,
        /// Grid row count.
        rows: u32,
    },
    /// Consecutive waypoints do not share exactly one coordinate.
    #[error(
        "waypoints ({}, {}) and ({}, {}) are not axis-aligned",
        .from.column(), .from.row(), .to.column(), .to.row()
    )]
    MisalignedWaypoints {
        /// Waypoint the segment starts at.
        from: CellCoord,
        /// Waypoint the segment ends at.
        to: CellCoord,
    },
    /// The path description contains no cells.
    #[error("level path is empty")]
    EmptyPath,
    /// The spawn cell is not part of the path.
    #[error("spawn cell ({}, {}) is not a path cell", .0.column(), .0.row())]
    SpawnOffPath(CellCoord),
    /// Tile metrics that cannot produce a usable layout.
    #[error("tile size must be positive and spacing non-negative (size {size}, spacing {spacing})")]
    InvalidTileMetrics {
        /// Requested tile size.
        size: f32,
        /// Requested spacing.
        spacing: f32,
    },
    /// Decoration weights that cannot drive a weighted draw.
    #[error("invalid decoration weights: {0}")]
    InvalidWeights(&'static str),
    /// A prefab referenced by name has not been registered.
    #[error("prefab `{0}` is not registered")]
    UnknownPrefab(String),
    /// A prefab name was registered twice.
    #[error("prefab `{0}` is registered more than once")]
    DuplicatePrefab(String),
}

/// Physical tile metrics in world units.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TileDimensions {
    /// Side length of a tile.
    pub size: f32,
    /// Gap between neighbouring tiles.
    pub spacing: f32,
    /// Height of non-path tiles.
    pub height: f32,
    /// Height of path tiles.
    pub path_height: f32,
}

impl Default for TileDimensions {
    fn default() -> Self {
        Self {
            size: 3.0,
            spacing: 0.0,
            height: 0.5,
            path_height: 0.1,
        }
    }
}

/// How the path cells of a level are described.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSpec {
    /// Explicit list of path cells.
    Cells(Vec<CellCoord>),
    /// Ordered waypoints joined by axis-aligned segments.
    Waypoints(Vec<CellCoord>),
}

impl PathSpec {
    /// Cell enemies spawn on when a definition does not name one: the last listed cell.
    #[must_use]
    pub fn default_spawn(&self) -> Option<CellCoord> {
        match self {
            Self::Cells(cells) | Self::Waypoints(cells) => cells.last().copied(),
        }
    }
}

/// Structured level data supplied by a [`LevelDefinitionProvider`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelDefinition {
    /// Number of grid columns.
    pub columns: u32,
    /// Number of grid rows.
    pub rows: u32,
    /// Tile metrics.
    #[serde(default)]
    pub tiles: TileDimensions,
    /// Path description.
    pub path: PathSpec,
    /// Cell enemies spawn on; defaults to the last path cell listed.
    #[serde(default)]
    pub spawn: Option<CellCoord>,
    /// Prefabs available to the level.
    pub prefabs: PrefabCatalog,
}

impl LevelDefinition {
    /// Layout mapping this level's grid into world space.
    #[must_use]
    pub const fn layout(&self) -> GridLayout {
        GridLayout::new(self.columns, self.rows, self.tiles.size, self.tiles.spacing)
    }

    /// Spawn cell, explicit or derived from the path.
    pub fn spawn_cell(&self) -> Result<CellCoord, LevelError> {
        self.spawn
            .or_else(|| self.path.default_spawn())
            .ok_or(LevelError::EmptyPath)
    }
}

/// Supplies the level data consumed once at initialization.
///
/// Implementations own any file formats; the simulation only sees the
/// already-structured definition.
pub trait LevelDefinitionProvider {
    /// Produces the level definition.
    fn level_definition(&self) -> Result<LevelDefinition, LevelError>;
}

/// Built-in 10×10 level with a single winding path.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceLevel;

impl LevelDefinitionProvider for ReferenceLevel {
    fn level_definition(&self) -> Result<LevelDefinition, LevelError> {
        let tiles = TileDimensions::default();
        Ok(LevelDefinition {
            columns: REFERENCE_GRID_SIZE,
            rows: REFERENCE_GRID_SIZE,
            tiles,
            path: PathSpec::Waypoints(
                REFERENCE_WAYPOINTS
                    .iter()
                    .map(|&(column, row)| CellCoord::new(column, row))
                    .collect(),
            ),
            spawn: None,
            prefabs: PrefabCatalog::reference(&tiles)?,
        })
    }
}

/// Decoration chosen for a non-path cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decoration {
    /// A tree with drawn parameters.
    Tree(Tree),
    /// A turret of the given variant.
    Turret(TurretKind),
}

/// Decoration assigned to one grid cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Cell hosting the decoration.
    pub cell: CellCoord,
    /// The decoration itself.
    pub decoration: Decoration,
}

/// Fully decided level, ready to be instantiated by the world.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelBlueprint {
    layout: GridLayout,
    tiles: TileDimensions,
    map: GridMap,
    spawn_point: Vector3,
    placements: Vec<Placement>,
    prefabs: PrefabCatalog,
}

impl LevelBlueprint {
    /// Assembles a blueprint from builder output.
    #[must_use]
    pub fn new(
        layout: GridLayout,
        tiles: TileDimensions,
        map: GridMap,
        spawn_point: Vector3,
        placements: Vec<Placement>,
        prefabs: PrefabCatalog,
    ) -> Self {
        Self {
            layout,
            tiles,
            map,
            spawn_point,
            placements,
            prefabs,
        }
    }

    /// Grid-to-world mapping.
    #[must_use]
    pub const fn layout(&self) -> &GridLayout {
        &self.layout
    }

    /// Tile metrics.
    #[must_use]
    pub const fn tiles(&self) -> &TileDimensions {
        &self.tiles
    }

    /// Tile classification grid.
    #[must_use]
    pub const fn map(&self) -> &GridMap {
        &self.map
    }

    /// World position enemies spawn at, on the ground plane.
    #[must_use]
    pub const fn spawn_point(&self) -> Vector3 {
        self.spawn_point
    }

    /// Decorations in row-major cell order.
    #[must_use]
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Prefabs instantiated for the level.
    #[must_use]
    pub const fn prefabs(&self) -> &PrefabCatalog {
        &self.prefabs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_level_spawns_on_last_waypoint() {
        let definition = ReferenceLevel
            .level_definition()
            .expect("reference level is valid");
        assert_eq!(definition.spawn_cell(), Ok(CellCoord::new(9, 9)));
        assert_eq!(definition.layout().columns(), REFERENCE_GRID_SIZE);
        assert!(!definition.prefabs.is_empty());
    }

    #[test]
    fn empty_path_has_no_spawn() {
        let definition = LevelDefinition {
            columns: 3,
            rows: 3,
            tiles: TileDimensions::default(),
            path: PathSpec::Cells(Vec::new()),
            spawn: None,
            prefabs: PrefabCatalog::new(),
        };
        assert_eq!(definition.spawn_cell(), Err(LevelError::EmptyPath));
    }
}
