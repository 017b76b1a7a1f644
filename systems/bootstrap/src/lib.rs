#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Host harness that boots a level and drives the tower-defense tick loop.
//!
//! A [`Simulation`] owns the world and every system. Each call to
//! [`Simulation::advance`] runs one tick in a fixed order: the clock advances,
//! spawning reacts, movement steers every enemy and finally absolute
//! positions are resolved for the whole entity forest.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use tower_defense_core::{Command, Event, LevelDefinition, LevelDefinitionProvider};
use tower_defense_system_builder::{Config as BuilderConfig, LevelBuilder};
use tower_defense_system_movement::{Config as MovementConfig, Movement};
use tower_defense_system_spawning::{Config as SpawningConfig, Spawning};
use tower_defense_world::{self as world, query, query::Renderable, Level, World};

/// Tunables for a simulation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Simulated time between enemy spawns.
    pub enemy_spawn_interval: Duration,
    /// Enemy speed in world units per second.
    pub enemy_speed: f32,
    /// Height above the spawn tile new enemies appear at.
    pub spawn_height: f32,
    /// Seed for the level builder's decoration draws.
    pub rng_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enemy_spawn_interval: Duration::from_millis(200),
            enemy_speed: 4.0,
            spawn_height: 1.2,
            rng_seed: 0,
        }
    }
}

/// A constructed level together with the systems that animate it.
#[derive(Debug)]
pub struct Simulation {
    world: World,
    spawning: Spawning,
    movement: Movement,
    events: Vec<Event>,
}

impl Simulation {
    /// Builds the level described by `definition` and constructs it in a fresh world.
    ///
    /// Any construction failure aborts initialization; no partially built
    /// level is ever returned.
    pub fn init(definition: &LevelDefinition, config: SimulationConfig) -> Result<Self> {
        let blueprint = LevelBuilder::new(BuilderConfig::new(config.rng_seed))
            .build(definition)
            .context("failed to build level")?;

        let mut world = World::new();
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::ConstructLevel {
                blueprint: Box::new(blueprint),
            },
            &mut events,
        );
        if query::level(&world).is_none() {
            bail!("level blueprint was rejected by the world");
        }
        world::resolve_global_positions(&mut world);
        info!(
            "simulation ready: {} entities, seed {:#x}",
            world.len(),
            config.rng_seed
        );

        Ok(Self {
            world,
            spawning: Spawning::new(SpawningConfig::new(
                config.enemy_spawn_interval,
                config.spawn_height,
            )),
            movement: Movement::new(MovementConfig::new(config.enemy_speed)),
            events,
        })
    }

    /// Loads a definition from `provider` and initializes the simulation with it.
    pub fn from_provider<P>(provider: &P, config: SimulationConfig) -> Result<Self>
    where
        P: LevelDefinitionProvider + ?Sized,
    {
        let definition = provider
            .level_definition()
            .context("failed to load level definition")?;
        Self::init(&definition, config)
    }

    /// Runs one tick covering `dt` of simulated time.
    pub fn advance(&mut self, dt: Duration) {
        let mut tick_events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut tick_events);

        let mut commands = Vec::new();
        self.spawning.handle(
            &tick_events,
            query::level(&self.world).map(Level::spawn_point),
            &mut commands,
        );
        self.apply_commands(&mut commands);

        self.movement.handle(
            &tick_events,
            &query::enemy_view(&self.world),
            query::level(&self.world),
            &mut commands,
        );
        self.apply_commands(&mut commands);

        world::resolve_global_positions(&mut self.world);
        self.events.extend(tick_events);
    }

    fn apply_commands(&mut self, commands: &mut Vec<Command>) {
        for command in commands.drain(..) {
            world::apply(&mut self.world, command, &mut self.events);
        }
    }

    /// Read-only access to the world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Number of ticks run so far.
    #[must_use]
    pub fn tick_index(&self) -> u64 {
        query::tick_index(&self.world)
    }

    /// Number of enemies currently walking the path.
    #[must_use]
    pub fn enemy_count(&self) -> usize {
        query::enemy_view(&self.world).len()
    }

    /// Everything drawable, with positions resolved as of the last tick.
    #[must_use]
    pub fn renderables(&self) -> Vec<Renderable> {
        query::renderables(&self.world)
    }

    /// Takes the events emitted since the previous call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let events = std::mem::take(&mut self.events);
        if !events.is_empty() {
            debug!("draining {} simulation events", events.len());
        }
        events
    }
}
