#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the tower-defense simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Hosts submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! views, and respond exclusively with new command batches.
//!
//! Besides the message surface the crate owns the plain data the other crates
//! agree on: component values, the tile classification grid with its
//! world-space mapping, prefab templates, and level definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod components;
mod grid;
mod level;
mod prefab;

pub use components::{
    BoxExtents, Color, Component, Components, Enemy, GlobalPosition, Health, LocalPosition, Tile,
    Tree, Turret, TurretKind, Vector3,
};
pub use grid::{GridLayout, GridMap, TileKind};
pub use level::{
    Decoration, LevelBlueprint, LevelDefinition, LevelDefinitionProvider, LevelError, PathSpec,
    Placement, ReferenceLevel, TileDimensions, REFERENCE_GRID_SIZE, REFERENCE_WAYPOINTS,
};
pub use prefab::{names as prefab_names, Prefab, PrefabCatalog, PrefabDefinition, PrefabId};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Instantiates every entity described by a level blueprint.
    ConstructLevel {
        /// Blueprint produced by the level builder.
        blueprint: Box<LevelBlueprint>,
    },
    /// Creates a new enemy from the enemy prefab at the provided position.
    SpawnEnemy {
        /// Local position assigned to the enemy under the enemies group.
        position: Vector3,
    },
    /// Updates the heading and position of an enemy after a movement step.
    SteerEnemy {
        /// Enemy being moved.
        enemy: EntityId,
        /// Heading the enemy follows from now on.
        direction: Direction,
        /// New local position of the enemy.
        position: Vector3,
    },
    /// Removes an enemy that ran out of path.
    DespawnEnemy {
        /// Enemy that reached the end of the path.
        enemy: EntityId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a level blueprint was instantiated.
    LevelConstructed {
        /// Entity carrying the level singleton.
        level: EntityId,
        /// Number of tile entities created for the grid.
        tiles: u32,
        /// Number of trees planted.
        trees: u32,
        /// Number of turrets placed.
        turrets: u32,
    },
    /// Confirms that a tree decoration was planted on a cell.
    TreePlanted {
        /// Root entity of the tree.
        tree: EntityId,
        /// Cell hosting the tree.
        cell: CellCoord,
    },
    /// Confirms that a turret was placed on a cell.
    TurretPlaced {
        /// Root entity of the turret.
        turret: EntityId,
        /// Cell hosting the turret.
        cell: CellCoord,
        /// Variant of turret that was placed.
        kind: TurretKind,
    },
    /// Confirms that an enemy entered the simulation.
    EnemySpawned {
        /// Identifier assigned to the new enemy.
        enemy: EntityId,
    },
    /// Reports that an enemy completed the path and was removed.
    EnemyReachedEnd {
        /// Identifier the enemy carried before removal.
        enemy: EntityId,
    },
}

/// Generational handle referring to a slot in the world's entity storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a new entity identifier.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Dense storage index addressed by the identifier.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation distinguishing reuses of the same storage slot.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Neighbouring cell one step along `direction`, if it has non-negative indices.
    #[must_use]
    pub fn offset(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.vector();
        Some(Self {
            column: self.column.checked_add_signed(dx)?,
            row: self.row.checked_add_signed(dy)?,
        })
    }
}

const DIRECTION_VECTORS: [(i32, i32); 4] = [(-1, 0), (0, -1), (1, 0), (0, 1)];

/// Heading index into the fixed unit-vector table `[(-1,0), (0,-1), (1,0), (0,1)]`.
///
/// The first vector component steps along grid columns (world x), the second
/// along grid rows (world z). The index is always in `0..4`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Direction(u8);

impl Direction {
    /// Heading toward decreasing column indices.
    pub const WEST: Self = Self(0);
    /// Heading toward decreasing row indices.
    pub const NORTH: Self = Self(1);
    /// Heading toward increasing column indices.
    pub const EAST: Self = Self(2);
    /// Heading toward increasing row indices.
    pub const SOUTH: Self = Self(3);

    /// Every heading in table order.
    pub const ALL: [Self; 4] = [Self::WEST, Self::NORTH, Self::EAST, Self::SOUTH];

    /// Creates a heading from an arbitrary index, wrapping it into range.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        Self(index % 4)
    }

    /// Position of the heading within the unit-vector table.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Grid-space unit vector `(column delta, row delta)`.
    #[must_use]
    pub const fn vector(self) -> (i32, i32) {
        DIRECTION_VECTORS[self.0 as usize]
    }

    /// Heading pointing the opposite way.
    #[must_use]
    pub const fn backwards(self) -> Self {
        Self((self.0 + 2) % 4)
    }

    /// Next heading in table order.
    #[must_use]
    pub const fn next(self) -> Self {
        Self((self.0 + 1) % 4)
    }
}

impl TryFrom<u8> for Direction {
    type Error = InvalidDirection;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value < 4 {
            Ok(Self(value))
        } else {
            Err(InvalidDirection(value))
        }
    }
}

impl From<Direction> for u8 {
    fn from(direction: Direction) -> Self {
        direction.0
    }
}

/// Raised when a serialized heading index falls outside `0..4`.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("direction index {0} is outside 0..4")]
pub struct InvalidDirection(pub u8);
