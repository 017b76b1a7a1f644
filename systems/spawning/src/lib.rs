#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-interval spawning system responsible for emitting enemy spawn commands.

use std::time::Duration;

use log::debug;
use tower_defense_core::{Command, Event, Vector3};

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    spawn_interval: Duration,
    vertical_offset: f32,
}

impl Config {
    /// Creates a new configuration using the provided cadence and spawn height.
    #[must_use]
    pub const fn new(spawn_interval: Duration, vertical_offset: f32) -> Self {
        Self {
            spawn_interval,
            vertical_offset,
        }
    }
}

/// Pure system that emits one spawn command per whole interval of elapsed time.
///
/// Elapsed time is accumulated and consumed interval by interval, so the
/// cadence does not depend on how simulated time is sliced into ticks and no
/// interval is ever dropped.
#[derive(Debug)]
pub struct Spawning {
    spawn_interval: Duration,
    vertical_offset: f32,
    accumulator: Duration,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            spawn_interval: config.spawn_interval,
            vertical_offset: config.vertical_offset,
            accumulator: Duration::ZERO,
        }
    }

    /// Consumes events and the level's spawn point to emit spawn commands.
    ///
    /// Nothing accumulates while no level provides a spawn point.
    pub fn handle(
        &mut self,
        events: &[Event],
        spawn_point: Option<Vector3>,
        out: &mut Vec<Command>,
    ) {
        let Some(spawn_point) = spawn_point else {
            return;
        };

        if self.spawn_interval.is_zero() {
            return;
        }

        let mut accumulated = Duration::ZERO;
        for event in events {
            if let Event::TimeAdvanced { dt } = event {
                accumulated = accumulated.saturating_add(*dt);
            }
        }

        if accumulated.is_zero() {
            return;
        }

        self.accumulator = self.accumulator.saturating_add(accumulated);
        let spawn_attempts = self.resolve_spawn_attempts();

        if spawn_attempts == 0 {
            return;
        }
        debug!("spawning {spawn_attempts} enemies at {spawn_point:?}");

        let position = spawn_point + Vector3::new(0.0, self.vertical_offset, 0.0);
        for _ in 0..spawn_attempts {
            out.push(Command::SpawnEnemy { position });
        }
    }

    fn resolve_spawn_attempts(&mut self) -> usize {
        if self.spawn_interval.is_zero() {
            return 0;
        }

        let mut attempts = 0;
        while self.accumulator >= self.spawn_interval {
            self.accumulator -= self.spawn_interval;
            attempts += 1;
        }
        attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_spawn_attempts_without_interval() {
        let mut spawning = Spawning::new(Config::new(Duration::ZERO, 0.0));
        spawning.accumulator = Duration::from_secs(10);
        assert_eq!(spawning.resolve_spawn_attempts(), 0);
    }

    #[test]
    fn keeps_the_remainder_after_consuming_intervals() {
        let mut spawning = Spawning::new(Config::new(Duration::from_millis(200), 0.0));
        spawning.accumulator = Duration::from_millis(450);
        assert_eq!(spawning.resolve_spawn_attempts(), 2);
        assert_eq!(spawning.accumulator, Duration::from_millis(50));
    }
}
