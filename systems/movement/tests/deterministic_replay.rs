use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use tower_defense_core::{
    Command, Direction, EntityId, Event, LevelDefinitionProvider, ReferenceLevel,
};
use tower_defense_system_builder::{Config as BuilderConfig, LevelBuilder};
use tower_defense_system_movement::{Config, Movement};
use tower_defense_world::{self as world, query, World};

const SEED: u64 = 0x5eed;
const TICKS: usize = 900;
const SPAWN_EVERY: usize = 60;

#[test]
fn deterministic_replay_produces_identical_outcomes() {
    let first = replay(SEED);
    let second = replay(SEED);

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(
        first.fingerprint(),
        second.fingerprint(),
        "fingerprint mismatch"
    );

    let reached = first
        .events
        .iter()
        .filter(|event| matches!(event, Event::EnemyReachedEnd { .. }))
        .count();
    assert!(reached > 0, "some enemies should finish within {TICKS} ticks");
    assert!(!first.enemies.is_empty(), "later enemies are still walking");
}

fn replay(seed: u64) -> ReplayOutcome {
    let definition = ReferenceLevel
        .level_definition()
        .expect("reference level is valid");
    let blueprint = LevelBuilder::new(BuilderConfig::new(seed))
        .build(&definition)
        .expect("reference level builds");

    let mut world = World::new();
    let mut movement = Movement::new(Config::new(4.0));
    let mut log = Vec::new();
    world::apply(
        &mut world,
        Command::ConstructLevel {
            blueprint: Box::new(blueprint),
        },
        &mut log,
    );
    let spawn_point = query::level(&world)
        .map(|level| level.spawn_point())
        .expect("level constructed");

    for tick in 0..TICKS {
        if tick % SPAWN_EVERY == 0 {
            world::apply(
                &mut world,
                Command::SpawnEnemy {
                    position: spawn_point,
                },
                &mut log,
            );
        }

        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(50),
            },
            &mut events,
        );
        let mut commands = Vec::new();
        movement.handle(
            &events,
            &query::enemy_view(&world),
            query::level(&world),
            &mut commands,
        );
        log.extend(events);
        for command in commands {
            world::apply(&mut world, command, &mut log);
        }
    }

    let enemies = query::enemy_view(&world)
        .into_vec()
        .into_iter()
        .map(|snapshot| EnemyState {
            id: snapshot.id,
            direction: snapshot.direction,
            position_bits: [
                snapshot.position.x.to_bits(),
                snapshot.position.y.to_bits(),
                snapshot.position.z.to_bits(),
            ],
        })
        .collect();

    ReplayOutcome {
        enemies,
        events: log,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    enemies: Vec<EnemyState>,
    events: Vec<Event>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EnemyState {
    id: EntityId,
    direction: Direction,
    position_bits: [u32; 3],
}
