//! Tile classification grid and its mapping into world space.

use serde::{Deserialize, Serialize};

use crate::{components::Vector3, level::LevelError, CellCoord};

/// Classification stored for every grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// Cell enemies may traverse.
    Path,
    /// Non-path cell adjacent to the path; may host a turret.
    TurretEligible,
    /// Any other cell.
    #[default]
    Other,
}

/// Dense `columns × rows` array of tile classifications.
///
/// Built once by the level builder and read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    columns: u32,
    rows: u32,
    tiles: Vec<TileKind>,
}

impl GridMap {
    /// Creates a grid with every cell classified as [`TileKind::Other`].
    pub fn new(columns: u32, rows: u32) -> Result<Self, LevelError> {
        if columns == 0 || rows == 0 {
            return Err(LevelError::EmptyGrid { columns, rows });
        }
        let capacity = usize::try_from(u64::from(columns) * u64::from(rows))
            .map_err(|_| LevelError::EmptyGrid { columns, rows })?;
        Ok(Self {
            columns,
            rows,
            tiles: vec![TileKind::Other; capacity],
        })
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether `cell` lies inside `[0, columns) × [0, rows)`.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Classification of an in-bounds cell.
    ///
    /// # Panics
    ///
    /// Panics when `cell` lies outside the grid; callers probing arbitrary
    /// cells use [`GridMap::checked`].
    #[must_use]
    pub fn get(&self, cell: CellCoord) -> TileKind {
        match self.checked(cell) {
            Some(kind) => kind,
            None => panic!(
                "cell ({}, {}) lies outside the {}x{} grid",
                cell.column(),
                cell.row(),
                self.columns,
                self.rows
            ),
        }
    }

    /// Classification of `cell`, or `None` when it lies outside the grid.
    #[must_use]
    pub fn checked(&self, cell: CellCoord) -> Option<TileKind> {
        self.index(cell).map(|index| self.tiles[index])
    }

    /// Reports whether `cell` is an in-bounds path cell.
    #[must_use]
    pub fn is_path(&self, cell: CellCoord) -> bool {
        self.checked(cell) == Some(TileKind::Path)
    }

    /// Reclassifies an in-bounds cell.
    pub fn set(&mut self, cell: CellCoord, kind: TileKind) -> Result<(), LevelError> {
        let index = self.index(cell).ok_or(LevelError::CellOutOfBounds {
            cell,
            columns: self.columns,
            rows: self.rows,
        })?;
        self.tiles[index] = kind;
        Ok(())
    }

    /// Iterates all cells in row-major order with their classification.
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, TileKind)> + '_ {
        let columns = self.columns;
        self.tiles.iter().enumerate().map(move |(index, kind)| {
            let index = index as u32;
            (CellCoord::new(index % columns, index / columns), *kind)
        })
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        Some(row * width + column)
    }
}

/// Affine mapping between grid coordinates and world space.
///
/// Columns map to world x and are centered on the origin; rows map to world z
/// starting half a tile before the origin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridLayout {
    columns: u32,
    rows: u32,
    tile_size: f32,
    spacing: f32,
}

impl GridLayout {
    /// Creates a layout for a grid with the provided tile metrics.
    #[must_use]
    pub const fn new(columns: u32, rows: u32, tile_size: f32, spacing: f32) -> Self {
        Self {
            columns,
            rows,
            tile_size,
            spacing,
        }
    }

    /// Number of columns covered by the layout.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows covered by the layout.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Side length of a tile in world units.
    #[must_use]
    pub const fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Gap between neighbouring tiles in world units.
    #[must_use]
    pub const fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Distance between the centers of neighbouring tiles.
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.tile_size + self.spacing
    }

    /// World coordinate of a (possibly fractional) tile index along one axis.
    #[must_use]
    pub fn to_world(&self, index: f32) -> f32 {
        index * self.pitch() - self.tile_size / 2.0
    }

    /// Inverse of [`GridLayout::to_world`].
    #[must_use]
    pub fn from_world(&self, coordinate: f32) -> f32 {
        (coordinate + self.tile_size / 2.0) / self.pitch()
    }

    /// World x of the center of column `column`.
    #[must_use]
    pub fn to_world_x(&self, column: f32) -> f32 {
        self.to_world(column + 0.5) - self.to_world(self.columns as f32 / 2.0)
    }

    /// World z of row `row`.
    #[must_use]
    pub fn to_world_z(&self, row: f32) -> f32 {
        self.to_world(row)
    }

    /// Fractional column index of world x coordinate `x`.
    #[must_use]
    pub fn from_world_x(&self, x: f32) -> f32 {
        self.from_world(x + self.to_world(self.columns as f32 / 2.0)) - 0.5
    }

    /// Fractional row index of world z coordinate `z`.
    #[must_use]
    pub fn from_world_z(&self, z: f32) -> f32 {
        self.from_world(z)
    }

    /// Fractional `(column, row)` of a world position; `y` is ignored.
    #[must_use]
    pub fn tile_coordinates(&self, position: Vector3) -> (f32, f32) {
        (self.from_world_x(position.x), self.from_world_z(position.z))
    }

    /// World position of a cell center at height `y`.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord, y: f32) -> Vector3 {
        Vector3::new(
            self.to_world_x(cell.column() as f32),
            y,
            self.to_world_z(cell.row() as f32),
        )
    }

    /// World position of the middle of the playfield.
    #[must_use]
    pub fn center(&self) -> Vector3 {
        Vector3::new(
            self.to_world_x(self.columns as f32 / 2.0),
            0.0,
            self.to_world_z(self.rows as f32 / 2.0),
        )
    }

    /// Edge length of the square that frames the playfield with a border.
    #[must_use]
    pub fn extent(&self) -> f32 {
        self.columns.max(self.rows) as f32 * self.pitch() + 2.0
    }
}
