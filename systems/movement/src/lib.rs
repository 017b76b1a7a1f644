#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic movement system that walks enemies along the baked path.
//!
//! Enemies carry a heading instead of a route. Whenever an enemy sits on a
//! tile center the system re-decides its heading by trying directions in a
//! fixed rotation that never reverses; when no forward continuation exists
//! the enemy has reached the end of the path and is despawned. Taking a
//! heading snaps the enemy onto the tile's center line across that heading,
//! and long ticks are walked in substeps so no tile center is stepped over.

use std::time::Duration;

use log::trace;
use tower_defense_core::{
    CellCoord, Command, Direction, EntityId, Event, GridLayout, GridMap, Vector3,
};
use tower_defense_world::{
    query::{EnemySnapshot, EnemyView},
    Level,
};

/// Distance from the nearest whole tile index, in tiles, that still counts as a center.
pub const CENTER_TOLERANCE: f32 = 0.1;

const CANDIDATE_ATTEMPTS: usize = 3;

/// Movement tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    speed: f32,
}

impl Config {
    /// Creates a configuration moving enemies at `speed` world units per second.
    #[must_use]
    pub const fn new(speed: f32) -> Self {
        Self { speed }
    }

    /// World units travelled per second.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }
}

/// Pure system that reacts to elapsed time and emits steering commands.
#[derive(Debug)]
pub struct Movement {
    speed: f32,
}

impl Movement {
    /// Creates the system.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self {
            speed: config.speed,
        }
    }

    /// Advances every enemy by the time carried in `events`.
    ///
    /// Emits one [`Command::SteerEnemy`] per moving enemy or one
    /// [`Command::DespawnEnemy`] per enemy that has no way forward. Each
    /// substep covers at most [`CENTER_TOLERANCE`] tiles.
    pub fn handle(
        &mut self,
        events: &[Event],
        enemies: &EnemyView,
        level: Option<&Level>,
        out: &mut Vec<Command>,
    ) {
        let Some(level) = level else {
            return;
        };
        let Some(dt) = elapsed(events) else {
            return;
        };
        let distance = self.speed * dt.as_secs_f32();
        let substeps = substeps(distance, level.layout().pitch());
        let step = distance / substeps as f32;

        for enemy in enemies.iter() {
            match walk(level, enemy, step, substeps) {
                Some(command) => out.push(command),
                None => out.push(Command::DespawnEnemy { enemy: enemy.id }),
            }
        }
    }
}

fn substeps(distance: f32, pitch: f32) -> u32 {
    let count = (distance / (CENTER_TOLERANCE * pitch)).ceil();
    if count.is_finite() && count > 1.0 {
        count as u32
    } else {
        1
    }
}

fn walk(level: &Level, enemy: &EnemySnapshot, step: f32, substeps: u32) -> Option<Command> {
    let mut direction = enemy.direction;
    let mut position = enemy.position;
    for _ in 0..substeps {
        (direction, position) = advance(level, enemy.id, direction, position, step)?;
    }
    Some(Command::SteerEnemy {
        enemy: enemy.id,
        direction,
        position,
    })
}

/// One substep; `None` once the enemy has no way forward.
fn advance(
    level: &Level,
    enemy: EntityId,
    mut direction: Direction,
    mut position: Vector3,
    step: f32,
) -> Option<(Direction, Vector3)> {
    if let Some((column, row)) = tile_center(level.layout(), position) {
        let next = find_next_direction(level.map(), column, row, direction);
        match next {
            Some(next) if next != direction => {
                trace!("enemy {enemy:?} turns {next:?} at ({column}, {row})");
            }
            Some(_) => {}
            None => trace!("enemy {enemy:?} has no way forward at ({column}, {row})"),
        }
        direction = next?;
        position = snap_across(level.layout(), position, direction, column, row);
    }

    let (dx, dz) = direction.vector();
    Some((
        direction,
        position + Vector3::new(dx as f32, 0.0, dz as f32) * step,
    ))
}

fn elapsed(events: &[Event]) -> Option<Duration> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::TimeAdvanced { dt } => Some(*dt),
            _ => None,
        })
        .reduce(|total, dt| total + dt)
}

/// Nearest whole tile indices of `position` when it lies within tolerance of them.
fn tile_center(layout: &GridLayout, position: Vector3) -> Option<(i64, i64)> {
    let (column, row) = layout.tile_coordinates(position);
    let (nearest_column, nearest_row) = (column.round(), row.round());
    let centered = (column - nearest_column).abs() < CENTER_TOLERANCE
        && (row - nearest_row).abs() < CENTER_TOLERANCE;
    centered.then_some((nearest_column as i64, nearest_row as i64))
}

/// Moves `position` onto the center line of `(column, row)` that runs along `direction`.
fn snap_across(
    layout: &GridLayout,
    position: Vector3,
    direction: Direction,
    column: i64,
    row: i64,
) -> Vector3 {
    let (dx, _) = direction.vector();
    if dx == 0 {
        Vector3 {
            x: layout.to_world_x(column as f32),
            ..position
        }
    } else {
        Vector3 {
            z: layout.to_world_z(row as f32),
            ..position
        }
    }
}

/// Chooses the heading an enemy centered on tile `(column, row)` leaves along.
///
/// Candidates are tried starting with `current` and rotating forward through
/// the direction table, skipping the reverse of `current`; the first whose
/// neighbouring tile is an in-bounds path cell wins. Returns `None` when none
/// of the three candidates continues the path, which marks the end of it.
#[must_use]
pub fn find_next_direction(
    map: &GridMap,
    column: i64,
    row: i64,
    current: Direction,
) -> Option<Direction> {
    let backwards = current.backwards();
    let mut candidate = current;
    for _ in 0..CANDIDATE_ATTEMPTS {
        let (dx, dy) = candidate.vector();
        if is_path(map, column + i64::from(dx), row + i64::from(dy)) {
            return Some(candidate);
        }
        candidate = candidate.next();
        if candidate == backwards {
            candidate = candidate.next();
        }
    }
    None
}

fn is_path(map: &GridMap, column: i64, row: i64) -> bool {
    match (u32::try_from(column), u32::try_from(row)) {
        (Ok(column), Ok(row)) => map.is_path(CellCoord::new(column, row)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_defense_core::TileKind;

    fn map_with_path(columns: u32, rows: u32, cells: &[(u32, u32)]) -> GridMap {
        let mut map = GridMap::new(columns, rows).expect("valid grid");
        for &(column, row) in cells {
            map.set(CellCoord::new(column, row), TileKind::Path)
                .expect("in bounds");
        }
        map
    }

    #[test]
    fn keeps_heading_while_the_path_continues() {
        let map = map_with_path(3, 1, &[(0, 0), (1, 0), (2, 0)]);
        assert_eq!(
            find_next_direction(&map, 2, 0, Direction::WEST),
            Some(Direction::WEST)
        );
    }

    #[test]
    fn rotates_to_the_only_forward_continuation() {
        let map = map_with_path(3, 3, &[(1, 2), (1, 1), (2, 1)]);
        assert_eq!(
            find_next_direction(&map, 1, 1, Direction::NORTH),
            Some(Direction::EAST)
        );

        let map = map_with_path(3, 3, &[(2, 1), (1, 1), (1, 0)]);
        assert_eq!(
            find_next_direction(&map, 1, 1, Direction::WEST),
            Some(Direction::NORTH)
        );
    }

    #[test]
    fn reverse_heading_is_never_chosen() {
        let map = map_with_path(3, 3, &[(0, 1), (1, 1)]);
        assert_eq!(find_next_direction(&map, 1, 1, Direction::EAST), None);
    }

    #[test]
    fn out_of_bounds_neighbours_are_not_path() {
        let map = map_with_path(2, 2, &[(0, 0), (0, 1)]);
        assert_eq!(find_next_direction(&map, 0, 0, Direction::WEST), Some(Direction::SOUTH));
        assert_eq!(find_next_direction(&map, 0, 1, Direction::SOUTH), None);
    }

    #[test]
    fn tiles_off_the_grid_may_step_back_on() {
        let map = map_with_path(2, 1, &[(0, 0)]);
        assert_eq!(
            find_next_direction(&map, -1, 0, Direction::EAST),
            Some(Direction::EAST)
        );
    }

    #[test]
    fn centers_are_measured_from_the_nearest_tile() {
        let layout = GridLayout::new(10, 10, 1.7, 0.1);
        let just_below = Vector3::new(
            layout.to_world_x(3.0),
            0.0,
            layout.to_world_z(1.0) - 1e-4,
        );
        assert_eq!(tile_center(&layout, just_below), Some((3, 1)));

        let between = Vector3::new(layout.to_world_x(3.5), 0.0, layout.to_world_z(1.0));
        assert_eq!(tile_center(&layout, between), None);
    }

    #[test]
    fn taking_a_heading_snaps_across_it() {
        let layout = GridLayout::new(10, 10, 3.0, 0.0);
        let drifted = Vector3::new(layout.to_world_x(4.05), 1.2, layout.to_world_z(6.04));

        let west = snap_across(&layout, drifted, Direction::WEST, 4, 6);
        assert_eq!(west.x, drifted.x);
        assert_eq!(west.z, layout.to_world_z(6.0));

        let north = snap_across(&layout, drifted, Direction::NORTH, 4, 6);
        assert_eq!(north.x, layout.to_world_x(4.0));
        assert_eq!(north.z, drifted.z);
        assert_eq!(north.y, 1.2);
    }

    #[test]
    fn long_steps_are_split_below_the_tolerance() {
        assert_eq!(substeps(0.2, 3.0), 1);
        assert_eq!(substeps(0.44, 3.0), 2);
        assert_eq!(substeps(1.0, 3.0), 4);
        assert_eq!(substeps(0.0, 3.0), 1);
        assert!(0.44 / substeps(0.44, 3.0) as f32 <= CENTER_TOLERANCE * 3.0);
    }

    #[test]
    fn elapsed_sums_every_tick() {
        let events = [
            Event::TimeAdvanced {
                dt: Duration::from_millis(20),
            },
            Event::TimeAdvanced {
                dt: Duration::from_millis(30),
            },
        ];
        assert_eq!(elapsed(&events), Some(Duration::from_millis(50)));
        assert_eq!(elapsed(&[]), None);
    }
}
