#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs the tower-defense simulation headlessly.

mod level_file;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info, LevelFilter};
use tower_defense_core::{Event, ReferenceLevel};
use tower_defense_rendering::{Color, Frame, RenderingBackend};
use tower_defense_system_bootstrap::{Simulation, SimulationConfig};

use crate::level_file::TomlLevelProvider;

const CLEAR_COLOR: Color = Color::new(0.3, 0.3, 0.3, 1.0);

/// Runs a tower-defense level without a window and reports what happened.
#[derive(Parser, Debug)]
#[command(name = "tower-defense", version, about)]
struct Args {
    /// TOML level file; the built-in level is used when omitted
    #[arg(long)]
    level: Option<PathBuf>,
    /// Seed for the level decoration draws
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 1_200)]
    ticks: u64,
    /// Simulated milliseconds per tick
    #[arg(long, default_value_t = 16)]
    dt_ms: u64,
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Entry point for the tower-defense command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = SimulationConfig {
        rng_seed: args.seed,
        ..SimulationConfig::default()
    };
    let mut simulation = match &args.level {
        Some(path) => Simulation::from_provider(&TomlLevelProvider::from_path(path)?, config)?,
        None => Simulation::from_provider(&ReferenceLevel, config)?,
    };

    let dt = Duration::from_millis(args.dt_ms);
    let mut tally = EventTally::default();
    for _ in 0..args.ticks {
        simulation.advance(dt);
        tally.record(&simulation.drain_events());
    }

    let frame = Frame::capture(simulation.world(), CLEAR_COLOR)?;
    let mut backend = SummaryBackend::default();
    backend.present(&frame)?;

    info!(
        "{} ticks of {} ms: {} trees, {} turrets, {} enemies spawned, {} reached the end, {} walking",
        simulation.tick_index(),
        args.dt_ms,
        tally.trees,
        tally.turrets,
        tally.spawned,
        tally.reached_end,
        simulation.enemy_count()
    );
    info!(
        "last frame: {} cubes framed on a {:.1} unit square",
        backend.cubes, backend.framed_size
    );
    Ok(())
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level.to_string()));
    let _ = builder.try_init();
}

/// Counts the events a run produced.
#[derive(Debug, Default)]
struct EventTally {
    trees: u32,
    turrets: u32,
    spawned: u32,
    reached_end: u32,
}

impl EventTally {
    fn record(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::LevelConstructed { trees, turrets, .. } => {
                    self.trees = *trees;
                    self.turrets = *turrets;
                }
                Event::EnemySpawned { .. } => self.spawned += 1,
                Event::EnemyReachedEnd { .. } => self.reached_end += 1,
                Event::TimeAdvanced { .. }
                | Event::TreePlanted { .. }
                | Event::TurretPlaced { .. } => {}
            }
        }
    }
}

/// Backend that only measures the frames it is handed.
#[derive(Debug, Default)]
struct SummaryBackend {
    cubes: usize,
    framed_size: f32,
}

impl RenderingBackend for SummaryBackend {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        debug!(
            "presenting {} draw commands around {:?}",
            frame.draw_commands.len(),
            frame.framing.center
        );
        self.cubes = frame.draw_commands.len();
        self.framed_size = frame.framing.size;
        Ok(())
    }
}
