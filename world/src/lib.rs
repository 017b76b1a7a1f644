#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the tower-defense simulation.
//!
//! The world owns every entity: a dense, generational slot array where each
//! live slot carries a [`Components`] bag, an optional parent, the list of its
//! children and the prefab it was instantiated from. Parent edges are checked
//! for cycles when they are created, so the hierarchy is always a forest.
//! Systems never touch the storage directly; they read through [`query`] and
//! submit [`Command`] values to [`apply`].

use log::{debug, info, warn};
use thiserror::Error;
use tower_defense_core::{
    prefab_names, BoxExtents, Color, Command, Component, Components, Decoration, Direction, Enemy,
    EntityId, Event, GridLayout, GridMap, LevelBlueprint, LocalPosition, PrefabCatalog, PrefabId,
    Tile, Tree, TurretKind, Vector3,
};

mod transform;

pub use transform::resolve_global_positions;

const GROUND_COLOR: Color = Color::new(0.11, 0.15, 0.1);
const GROUND_DEPTH: f32 = 5.0;

/// Failures raised by hierarchy and prefab operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// The entity was never created or has been despawned.
    #[error("entity {0:?} does not exist")]
    MissingEntity(EntityId),
    /// An entity cannot be its own parent.
    #[error("entity {0:?} cannot be parented to itself")]
    SelfParent(EntityId),
    /// The requested parent is a descendant of the child.
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    HierarchyCycle {
        /// Entity being re-parented.
        child: EntityId,
        /// Requested parent.
        parent: EntityId,
    },
    /// The prefab is not part of the catalog used for instantiation.
    #[error("prefab {0:?} is not registered")]
    UnknownPrefab(PrefabId),
    /// The level catalog lacks a prefab the world instantiates by name.
    #[error("level prefabs lack `{0}`")]
    MissingPrefab(&'static str),
    /// The operation needs a constructed level.
    #[error("no level has been constructed")]
    NoLevel,
    /// A level has already been constructed.
    #[error("a level has already been constructed")]
    LevelAlreadyConstructed,
}

#[derive(Debug, Default)]
struct EntityData {
    components: Components,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    is_a: Vec<PrefabId>,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    data: Option<EntityData>,
}

/// Level singleton attached to the level entity.
#[derive(Debug)]
pub struct Level {
    entity: EntityId,
    blueprint: LevelBlueprint,
}

impl Level {
    /// Entity the level's trees and tiles hang from.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Grid-to-world mapping.
    #[must_use]
    pub const fn layout(&self) -> &GridLayout {
        self.blueprint.layout()
    }

    /// Tile classification grid.
    #[must_use]
    pub const fn map(&self) -> &GridMap {
        self.blueprint.map()
    }

    /// World position enemies spawn at, on the ground plane.
    #[must_use]
    pub const fn spawn_point(&self) -> Vector3 {
        self.blueprint.spawn_point()
    }

    /// Prefabs the level was built with.
    #[must_use]
    pub const fn prefabs(&self) -> &PrefabCatalog {
        self.blueprint.prefabs()
    }
}

/// Represents the authoritative simulation state.
#[derive(Debug, Default)]
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    level: Option<Level>,
    enemies: Option<EntityId>,
    turrets: Option<EntityId>,
    tick_index: u64,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a root entity carrying `components`.
    pub fn spawn(&mut self, components: Components) -> EntityId {
        let data = EntityData {
            components,
            ..EntityData::default()
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.data = Some(data);
            return EntityId::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            data: Some(data),
        });
        EntityId::new(index, 0)
    }

    /// Removes an entity. Its children stay alive and become roots.
    ///
    /// Returns `false` when the entity did not exist.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let Some(slot) = self.live_slot_mut(entity) else {
            return false;
        };
        let Some(data) = slot.data.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index());

        if let Some(parent) = data.parent.and_then(|parent| self.data_mut(parent)) {
            parent.children.retain(|child| *child != entity);
        }
        for child in data.children {
            if let Some(child) = self.data_mut(child) {
                child.parent = None;
            }
        }
        true
    }

    /// Reports whether the identifier refers to a live entity.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.data(entity).is_some()
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Reports whether no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entities in storage order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.data
                .as_ref()
                .map(|_| EntityId::new(index as u32, slot.generation))
        })
    }

    /// Live entities without a parent, in storage order.
    pub fn roots(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities().filter(|entity| self.parent(*entity).is_none())
    }

    /// Component bag of an entity.
    #[must_use]
    pub fn components(&self, entity: EntityId) -> Option<&Components> {
        self.data(entity).map(|data| &data.components)
    }

    /// Borrows a component of an entity.
    #[must_use]
    pub fn get<C: Component>(&self, entity: EntityId) -> Option<&C> {
        self.data(entity).and_then(|data| data.components.get::<C>())
    }

    /// Mutably borrows a component of an entity.
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        self.data_mut(entity)
            .and_then(|data| data.components.get_mut::<C>())
    }

    /// Stores a component on an entity, returning the previous value.
    pub fn insert<C: Component>(
        &mut self,
        entity: EntityId,
        value: C,
    ) -> Result<Option<C>, WorldError> {
        let data = self
            .data_mut(entity)
            .ok_or(WorldError::MissingEntity(entity))?;
        Ok(data.components.insert(value))
    }

    /// Removes a component from an entity.
    pub fn remove<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        self.data_mut(entity)
            .and_then(|data| data.components.remove::<C>())
    }

    /// Parent of an entity.
    #[must_use]
    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        self.data(entity).and_then(|data| data.parent)
    }

    /// Children of an entity in insertion order.
    #[must_use]
    pub fn children(&self, entity: EntityId) -> &[EntityId] {
        self.data(entity)
            .map(|data| data.children.as_slice())
            .unwrap_or(&[])
    }

    /// Prefabs the entity was instantiated from.
    #[must_use]
    pub fn is_a(&self, entity: EntityId) -> &[PrefabId] {
        self.data(entity)
            .map(|data| data.is_a.as_slice())
            .unwrap_or(&[])
    }

    /// Moves `child` under `parent`, or makes it a root when `parent` is `None`.
    ///
    /// Rejects edges that would make the hierarchy cyclic.
    pub fn set_parent(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<(), WorldError> {
        if !self.contains(child) {
            return Err(WorldError::MissingEntity(child));
        }
        if let Some(parent) = parent {
            if !self.contains(parent) {
                return Err(WorldError::MissingEntity(parent));
            }
            if parent == child {
                return Err(WorldError::SelfParent(child));
            }
            let mut ancestor = Some(parent);
            while let Some(current) = ancestor {
                if current == child {
                    return Err(WorldError::HierarchyCycle { child, parent });
                }
                ancestor = self.parent(current);
            }
        }

        if let Some(previous) = self.parent(child).and_then(|old| self.data_mut(old)) {
            previous.children.retain(|existing| *existing != child);
        }
        if let Some(parent) = parent.and_then(|parent| self.data_mut(parent)) {
            parent.children.push(child);
        }
        if let Some(data) = self.data_mut(child) {
            data.parent = parent;
        }
        Ok(())
    }

    /// Creates an entity from a prefab, then recursively its child prefabs.
    ///
    /// The new entity receives the prefab's flattened component values and an
    /// is-a edge to the prefab; later changes to the catalog do not affect it.
    pub fn instantiate(
        &mut self,
        prefabs: &PrefabCatalog,
        prefab: PrefabId,
        parent: Option<EntityId>,
    ) -> Result<EntityId, WorldError> {
        if prefabs.get(prefab).is_none() {
            return Err(WorldError::UnknownPrefab(prefab));
        }
        let entity = self.spawn(prefabs.compose(prefab));
        if let Some(data) = self.data_mut(entity) {
            data.is_a.push(prefab);
        }
        if let Err(error) = self.set_parent(entity, parent) {
            let _ = self.despawn(entity);
            return Err(error);
        }
        for child in prefabs.children(prefab) {
            let _ = self.instantiate(prefabs, child, Some(entity))?;
        }
        Ok(entity)
    }

    /// Instantiates every entity a blueprint describes and stores the level singleton.
    pub fn construct_level(
        &mut self,
        blueprint: LevelBlueprint,
        out_events: &mut Vec<Event>,
    ) -> Result<EntityId, WorldError> {
        if self.level.is_some() {
            return Err(WorldError::LevelAlreadyConstructed);
        }

        let prefabs = blueprint.prefabs();
        let layout = *blueprint.layout();
        let tiles = *blueprint.tiles();
        let require = |name: &'static str| {
            prefabs
                .lookup(name)
                .ok_or(WorldError::MissingPrefab(name))
        };
        let tile_prefab = require(prefab_names::TILE)?;
        let path_prefab = require(prefab_names::PATH)?;
        let tree_prefab = require(prefab_names::TREE)?;
        let mut turret_prefabs = Vec::with_capacity(TurretKind::ALL.len());
        for kind in TurretKind::ALL {
            let placed = blueprint
                .placements()
                .iter()
                .any(|placement| placement.decoration == Decoration::Turret(kind));
            if placed {
                turret_prefabs.push((kind, require(kind.prefab_name())?));
            }
        }

        let level = self.spawn(Components::default());
        let enemies = self.spawn(Components::default());
        let turrets = self.spawn(Components::default());
        let _ = self.spawn(ground(&layout));

        let mut tile_count = 0;
        for (cell, kind) in blueprint.map().cells() {
            let prefab = if blueprint.map().is_path(cell) {
                path_prefab
            } else {
                tile_prefab
            };
            let tile = self.instantiate(prefabs, prefab, Some(level))?;
            let _ = self.insert(tile, LocalPosition(layout.cell_center(cell, 0.0)))?;
            let _ = self.insert(tile, Tile(kind))?;
            tile_count += 1;
        }

        let mut tree_count = 0;
        let mut turret_count = 0;
        for placement in blueprint.placements() {
            let position = LocalPosition(layout.cell_center(placement.cell, tiles.height / 2.0));
            match placement.decoration {
                Decoration::Tree(params) => {
                    let tree = self.instantiate(prefabs, tree_prefab, Some(level))?;
                    let _ = self.insert(tree, position)?;
                    self.shape_tree(tree, params, prefabs)?;
                    tree_count += 1;
                    out_events.push(Event::TreePlanted {
                        tree,
                        cell: placement.cell,
                    });
                }
                Decoration::Turret(kind) => {
                    let prefab = turret_prefabs
                        .iter()
                        .find(|(placed, _)| *placed == kind)
                        .map(|(_, prefab)| *prefab)
                        .ok_or(WorldError::MissingPrefab(kind.prefab_name()))?;
                    let turret = self.instantiate(prefabs, prefab, Some(turrets))?;
                    let _ = self.insert(turret, position)?;
                    turret_count += 1;
                    out_events.push(Event::TurretPlaced {
                        turret,
                        cell: placement.cell,
                        kind,
                    });
                }
            }
        }

        info!(
            "constructed {}x{} level: {tile_count} tiles, {tree_count} trees, {turret_count} turrets",
            layout.columns(),
            layout.rows()
        );
        out_events.push(Event::LevelConstructed {
            level,
            tiles: tile_count,
            trees: tree_count,
            turrets: turret_count,
        });

        self.enemies = Some(enemies);
        self.turrets = Some(turrets);
        self.level = Some(Level {
            entity: level,
            blueprint,
        });
        Ok(level)
    }

    fn shape_tree(
        &mut self,
        tree: EntityId,
        params: Tree,
        prefabs: &PrefabCatalog,
    ) -> Result<(), WorldError> {
        let _ = self.insert(tree, params)?;
        let trunk = prefabs.lookup(prefab_names::TREE_TRUNK);
        let canopy = prefabs.lookup(prefab_names::TREE_CANOPY);

        for part in self.children(tree).to_vec() {
            if let Some(LocalPosition(position)) = self.get_mut::<LocalPosition>(part) {
                position.y *= params.height;
            }
            let prefab = self.is_a(part).first().copied();
            if prefab.is_some() && prefab == trunk {
                if let Some(BoxExtents(extents)) = self.get_mut::<BoxExtents>(part) {
                    extents.y *= params.height;
                }
            }
            if prefab.is_some() && prefab == canopy {
                if let Some(color) = self.get_mut::<Color>(part) {
                    *color = color.scaled(1.0 + params.variation);
                }
            }
        }
        Ok(())
    }

    fn spawn_enemy(&mut self, position: Vector3) -> Result<EntityId, WorldError> {
        let (Some(level), Some(group)) = (self.level.take(), self.enemies) else {
            return Err(WorldError::NoLevel);
        };
        let spawned = self.spawn_enemy_from(level.prefabs(), group, position);
        self.level = Some(level);
        spawned
    }

    fn spawn_enemy_from(
        &mut self,
        prefabs: &PrefabCatalog,
        group: EntityId,
        position: Vector3,
    ) -> Result<EntityId, WorldError> {
        let prefab = prefabs
            .lookup(prefab_names::ENEMY)
            .ok_or(WorldError::MissingPrefab(prefab_names::ENEMY))?;
        let enemy = self.instantiate(prefabs, prefab, Some(group))?;
        let _ = self.insert(enemy, LocalPosition(position))?;
        let _ = self.insert(enemy, Direction::WEST)?;
        Ok(enemy)
    }

    fn data(&self, entity: EntityId) -> Option<&EntityData> {
        self.slots
            .get(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation())
            .and_then(|slot| slot.data.as_ref())
    }

    fn data_mut(&mut self, entity: EntityId) -> Option<&mut EntityData> {
        self.live_slot_mut(entity)
            .and_then(|slot| slot.data.as_mut())
    }

    fn live_slot_mut(&mut self, entity: EntityId) -> Option<&mut Slot> {
        self.slots
            .get_mut(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation() && slot.data.is_some())
    }
}

fn ground(layout: &GridLayout) -> Components {
    let rows = layout.rows() as f32;
    let columns = layout.columns() as f32;
    Components::default()
        .with(LocalPosition(Vector3::new(
            0.0,
            -GROUND_DEPTH / 2.0,
            layout.to_world_z(rows / 2.0 - 0.5),
        )))
        .with(BoxExtents(Vector3::new(
            layout.to_world_x(columns + 0.5) * 2.0,
            GROUND_DEPTH,
            layout.to_world_z(rows + 2.0),
        )))
        .with(GROUND_COLOR)
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::ConstructLevel { blueprint } => {
            if let Err(error) = world.construct_level(*blueprint, out_events) {
                warn!("level construction rejected: {error}");
            }
        }
        Command::SpawnEnemy { position } => match world.spawn_enemy(position) {
            Ok(enemy) => {
                debug!("enemy {enemy:?} spawned at {position:?}");
                out_events.push(Event::EnemySpawned { enemy });
            }
            Err(error) => warn!("enemy spawn ignored: {error}"),
        },
        Command::SteerEnemy {
            enemy,
            direction,
            position,
        } => {
            if world.get::<Enemy>(enemy).is_none() {
                warn!("steering ignored for missing enemy {enemy:?}");
                return;
            }
            let _ = world.insert(enemy, direction);
            let _ = world.insert(enemy, LocalPosition(position));
        }
        Command::DespawnEnemy { enemy } => {
            if world.get::<Enemy>(enemy).is_some() && world.despawn(enemy) {
                debug!("enemy {enemy:?} reached the end of the path");
                out_events.push(Event::EnemyReachedEnd { enemy });
            } else {
                warn!("despawn ignored for missing enemy {enemy:?}");
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{Level, World};
    use tower_defense_core::{
        BoxExtents, Color, Direction, Enemy, EntityId, GlobalPosition, LocalPosition, Vector3,
    };

    /// Level singleton, once a level has been constructed.
    #[must_use]
    pub fn level(world: &World) -> Option<&Level> {
        world.level.as_ref()
    }

    /// Grouping entity enemies are parented under.
    #[must_use]
    pub fn enemies_group(world: &World) -> Option<EntityId> {
        world.enemies
    }

    /// Grouping entity turrets are parented under.
    #[must_use]
    pub fn turrets_group(world: &World) -> Option<EntityId> {
        world.turrets
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Captures a read-only view of every live enemy.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let mut snapshots: Vec<EnemySnapshot> = world
            .entities()
            .filter(|entity| world.get::<Enemy>(*entity).is_some())
            .map(|id| EnemySnapshot {
                id,
                position: world
                    .get::<LocalPosition>(id)
                    .map_or(Vector3::ZERO, |local| local.0),
                direction: world.get::<Direction>(id).copied().unwrap_or_default(),
            })
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.id);
        EnemyView { snapshots }
    }

    /// Every entity that can be drawn, ordered by identifier.
    #[must_use]
    pub fn renderables(world: &World) -> Vec<Renderable> {
        let mut renderables: Vec<Renderable> = world
            .entities()
            .filter_map(|entity| {
                Some(Renderable {
                    entity,
                    position: world.get::<GlobalPosition>(entity)?.0,
                    extents: world.get::<BoxExtents>(entity)?.0,
                    color: *world.get::<Color>(entity)?,
                })
            })
            .collect();
        renderables.sort_by_key(|renderable| renderable.entity);
        renderables
    }

    /// Read-only snapshot describing all enemies.
    #[derive(Clone, Debug, Default)]
    pub struct EnemyView {
        snapshots: Vec<EnemySnapshot>,
    }

    impl EnemyView {
        /// Iterator over the captured snapshots in identifier order.
        pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
            self.snapshots.iter()
        }

        /// Number of enemies captured.
        #[must_use]
        pub fn len(&self) -> usize {
            self.snapshots.len()
        }

        /// Reports whether no enemy was captured.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.snapshots.is_empty()
        }

        /// Consumes the view, yielding the underlying snapshots.
        pub fn into_vec(self) -> Vec<EnemySnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single enemy.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct EnemySnapshot {
        /// Identifier of the enemy.
        pub id: EntityId,
        /// Local position under the enemies group.
        pub position: Vector3,
        /// Current heading.
        pub direction: Direction,
    }

    /// Data needed to draw one entity.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct Renderable {
        /// Entity being drawn.
        pub entity: EntityId,
        /// Resolved absolute position.
        pub position: Vector3,
        /// Cube extents.
        pub extents: Vector3,
        /// Cube color.
        pub color: Color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_defense_core::{GlobalPosition, Health};

    fn at(x: f32, y: f32, z: f32) -> Components {
        Components::default().with(LocalPosition(Vector3::new(x, y, z)))
    }

    #[test]
    fn stale_identifiers_do_not_alias_reused_slots() {
        let mut world = World::new();
        let first = world.spawn(Components::default());
        assert!(world.despawn(first));
        let second = world.spawn(Components::default());

        assert_eq!(first.index(), second.index());
        assert_ne!(first, second);
        assert!(!world.contains(first));
        assert!(world.contains(second));
        assert!(!world.despawn(first));
    }

    #[test]
    fn typed_components_round_trip() {
        let mut world = World::new();
        let entity = world.spawn(Components::default());
        assert_eq!(world.insert(entity, Health(2)), Ok(None));
        assert_eq!(world.get::<Health>(entity), Some(&Health(2)));
        assert_eq!(world.remove::<Health>(entity), Some(Health(2)));
        assert_eq!(world.get::<Health>(entity), None);
    }

    #[test]
    fn insert_on_missing_entity_fails() {
        let mut world = World::new();
        let entity = world.spawn(Components::default());
        let _ = world.despawn(entity);
        assert_eq!(
            world.insert(entity, Health(1)),
            Err(WorldError::MissingEntity(entity))
        );
    }

    #[test]
    fn parent_cycles_are_rejected() {
        let mut world = World::new();
        let a = world.spawn(Components::default());
        let b = world.spawn(Components::default());
        let c = world.spawn(Components::default());
        world.set_parent(b, Some(a)).expect("a -> b");
        world.set_parent(c, Some(b)).expect("b -> c");

        assert_eq!(
            world.set_parent(a, Some(c)),
            Err(WorldError::HierarchyCycle {
                child: a,
                parent: c
            })
        );
        assert_eq!(world.set_parent(a, Some(a)), Err(WorldError::SelfParent(a)));
        assert_eq!(world.parent(a), None);
        assert_eq!(world.children(c), &[] as &[EntityId]);
    }

    #[test]
    fn reparenting_moves_child_between_lists() {
        let mut world = World::new();
        let first = world.spawn(Components::default());
        let second = world.spawn(Components::default());
        let child = world.spawn(Components::default());

        world.set_parent(child, Some(first)).expect("valid edge");
        world.set_parent(child, Some(second)).expect("valid edge");

        assert!(world.children(first).is_empty());
        assert_eq!(world.children(second), &[child]);
        assert_eq!(world.parent(child), Some(second));
    }

    #[test]
    fn despawning_a_parent_leaves_children_as_roots() {
        let mut world = World::new();
        let parent = world.spawn(at(1.0, 0.0, 0.0));
        let child = world.spawn(at(0.0, 1.0, 0.0));
        world.set_parent(child, Some(parent)).expect("valid edge");

        assert!(world.despawn(parent));

        assert!(world.contains(child));
        assert_eq!(world.parent(child), None);
        assert!(world.roots().any(|root| root == child));
        resolve_global_positions(&mut world);
        assert_eq!(
            world.get::<GlobalPosition>(child),
            Some(&GlobalPosition(Vector3::new(0.0, 1.0, 0.0)))
        );
    }

    #[test]
    fn despawning_a_child_detaches_it() {
        let mut world = World::new();
        let parent = world.spawn(Components::default());
        let child = world.spawn(Components::default());
        world.set_parent(child, Some(parent)).expect("valid edge");

        assert!(world.despawn(child));
        assert!(world.children(parent).is_empty());
        assert_eq!(world.len(), 1);
    }
}
