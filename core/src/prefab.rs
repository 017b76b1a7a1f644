//! Prefab templates and their flattening into concrete component sets.
//!
//! A prefab names an optional base prefab (its is-a edge), a set of component
//! values layered over the base's values, and child prefabs instantiated
//! beneath every instance. Bases and children must be registered before the
//! prefab that references them, so the is-a graph is acyclic by construction.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    components::{BoxExtents, Color, Components, Enemy, Health, LocalPosition, Tree, Turret},
    level::{LevelError, TileDimensions},
    TurretKind, Vector3,
};

/// Names of the prefabs the world and level builder instantiate.
pub mod names {
    /// Dark metal material.
    pub const METAL: &str = "Metal";
    /// Cannon head material.
    pub const CANNON_HEAD: &str = "CannonHead";
    /// Path-following enemy.
    pub const ENEMY: &str = "Enemy";
    /// Grid tile that is not part of the path.
    pub const TILE: &str = "Tile";
    /// Grid tile on the path.
    pub const PATH: &str = "Path";
    /// Tree decoration root.
    pub const TREE: &str = "Tree";
    /// Trunk child of a tree.
    pub const TREE_TRUNK: &str = "Tree.Trunk";
    /// Canopy child of a tree.
    pub const TREE_CANOPY: &str = "Tree.Canopy";
    /// Base slot shared by every turret.
    pub const TURRET_BASE: &str = "Turret.Base";
    /// Lower base piece.
    pub const TURRET_BASE_LOWER: &str = "Turret.Base.Lower";
    /// Upper base piece.
    pub const TURRET_BASE_UPPER: &str = "Turret.Base.Upper";
    /// Abstract turret every variant inherits from.
    pub const TURRET: &str = "Turret";
    /// Cannon variant.
    pub const CANNON: &str = "Cannon";
    /// Head of the cannon variant.
    pub const CANNON_TURRET_HEAD: &str = "Cannon.Head";
    /// Laser variant.
    pub const LASER: &str = "Laser";
    /// Head of the laser variant.
    pub const LASER_TURRET_HEAD: &str = "Laser.Head";
}

/// Index of a registered prefab inside its catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrefabId(u32);

impl PrefabId {
    /// Creates a new prefab identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Declarative prefab description referring to other prefabs by name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefabDefinition {
    /// Unique prefab name.
    pub name: String,
    /// Base prefab whose values are inherited.
    #[serde(default)]
    pub is_a: Option<String>,
    /// Values layered over the inherited ones.
    #[serde(default)]
    pub components: Components,
    /// Prefabs instantiated as children of every instance.
    #[serde(default)]
    pub children: Vec<String>,
}

impl PrefabDefinition {
    /// Starts a definition with no base, values or children.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the base prefab.
    #[must_use]
    pub fn is_a(mut self, base: impl Into<String>) -> Self {
        self.is_a = Some(base.into());
        self
    }

    /// Adds or replaces a component value.
    #[must_use]
    pub fn with<C: crate::Component>(mut self, value: C) -> Self {
        self.components = self.components.with(value);
        self
    }

    /// Appends a child prefab.
    #[must_use]
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.children.push(name.into());
        self
    }
}

/// Registered prefab with its edges resolved to identifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct Prefab {
    name: String,
    base: Option<PrefabId>,
    components: Components,
    children: Vec<PrefabId>,
}

impl Prefab {
    /// Name the prefab was registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct is-a edge.
    #[must_use]
    pub const fn base(&self) -> Option<PrefabId> {
        self.base
    }

    /// Values declared on the prefab itself, without inherited ones.
    #[must_use]
    pub const fn own_components(&self) -> &Components {
        &self.components
    }

    /// Children declared on the prefab itself.
    #[must_use]
    pub fn own_children(&self) -> &[PrefabId] {
        &self.children
    }
}

/// Ordered collection of prefabs addressable by id and name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "Vec<PrefabDefinition>")]
pub struct PrefabCatalog {
    prefabs: Vec<Prefab>,
    by_name: HashMap<String, PrefabId>,
}

impl PrefabCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a prefab whose base and children are already registered.
    pub fn register(&mut self, definition: PrefabDefinition) -> Result<PrefabId, LevelError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(LevelError::DuplicatePrefab(definition.name));
        }
        let base = definition
            .is_a
            .as_deref()
            .map(|name| self.require(name))
            .transpose()?;
        let children = definition
            .children
            .iter()
            .map(|name| self.require(name))
            .collect::<Result<Vec<_>, _>>()?;

        let id = PrefabId::new(self.prefabs.len() as u32);
        let _ = self.by_name.insert(definition.name.clone(), id);
        self.prefabs.push(Prefab {
            name: definition.name,
            base,
            components: definition.components,
            children,
        });
        Ok(id)
    }

    /// Identifier registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<PrefabId> {
        self.by_name.get(name).copied()
    }

    /// Identifier registered under `name`, or an error naming the missing prefab.
    pub fn require(&self, name: &str) -> Result<PrefabId, LevelError> {
        self.lookup(name)
            .ok_or_else(|| LevelError::UnknownPrefab(name.to_owned()))
    }

    /// Prefab registered under `id`.
    #[must_use]
    pub fn get(&self, id: PrefabId) -> Option<&Prefab> {
        self.prefabs.get(id.get() as usize)
    }

    /// Number of registered prefabs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    /// Reports whether no prefab is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    /// Is-a chain of `id`, starting at its most distant base and ending with `id`.
    #[must_use]
    pub fn lineage(&self, id: PrefabId) -> Vec<PrefabId> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id).map(|_| id);
        while let Some(current) = cursor {
            chain.push(current);
            cursor = self.get(current).and_then(Prefab::base);
        }
        chain.reverse();
        chain
    }

    /// Flattened component values of `id`: each base's values overlaid by its descendants.
    #[must_use]
    pub fn compose(&self, id: PrefabId) -> Components {
        let mut components = Components::default();
        for prefab in self.lineage(id).into_iter().filter_map(|link| self.get(link)) {
            components.overlay(&prefab.components);
        }
        components
    }

    /// Children instantiated beneath an instance of `id`, inherited ones first.
    #[must_use]
    pub fn children(&self, id: PrefabId) -> Vec<PrefabId> {
        self.lineage(id)
            .into_iter()
            .filter_map(|link| self.get(link))
            .flat_map(|prefab| prefab.children.iter().copied())
            .collect()
    }

    /// Prefabs of the reference level, sized for the provided tile metrics.
    pub fn reference(tiles: &TileDimensions) -> Result<Self, LevelError> {
        let path_width = tiles.size + tiles.spacing;
        let definitions = vec![
            PrefabDefinition::new(names::METAL).with(Color::new(0.1, 0.1, 0.1)),
            PrefabDefinition::new(names::CANNON_HEAD).with(Color::new(0.35, 0.4, 0.3)),
            PrefabDefinition::new(names::ENEMY)
                .is_a(names::METAL)
                .with(Enemy {})
                .with(Health(1))
                .with(Color::new(0.05, 0.05, 0.05))
                .with(BoxExtents(Vector3::new(0.7, 0.7, 0.7))),
            PrefabDefinition::new(names::TILE)
                .with(Color::new(0.2, 0.34, 0.15))
                .with(BoxExtents(Vector3::new(tiles.size, tiles.height, tiles.size))),
            PrefabDefinition::new(names::PATH)
                .with(Color::new(0.2, 0.2, 0.2))
                .with(BoxExtents(Vector3::new(
                    path_width,
                    tiles.path_height,
                    path_width,
                ))),
            PrefabDefinition::new(names::TREE_TRUNK)
                .with(part_at(0.75))
                .with(Color::new(0.25, 0.2, 0.1))
                .with(BoxExtents(Vector3::new(0.5, 1.5, 0.5))),
            PrefabDefinition::new(names::TREE_CANOPY)
                .with(part_at(2.0))
                .with(Color::new(0.2, 0.3, 0.15))
                .with(BoxExtents(Vector3::new(1.5, 1.8, 1.5))),
            PrefabDefinition::new(names::TREE)
                .with(Tree {
                    height: 1.0,
                    variation: 0.0,
                })
                .child(names::TREE_TRUNK)
                .child(names::TREE_CANOPY),
            PrefabDefinition::new(names::TURRET_BASE_LOWER)
                .is_a(names::METAL)
                .with(part_at(0.1))
                .with(BoxExtents(Vector3::new(0.6, 0.2, 0.6))),
            PrefabDefinition::new(names::TURRET_BASE_UPPER)
                .is_a(names::METAL)
                .with(part_at(0.3))
                .with(BoxExtents(Vector3::new(0.4, 0.6, 0.4))),
            PrefabDefinition::new(names::TURRET_BASE)
                .with(part_at(0.0))
                .child(names::TURRET_BASE_LOWER)
                .child(names::TURRET_BASE_UPPER),
            PrefabDefinition::new(names::TURRET).child(names::TURRET_BASE),
            PrefabDefinition::new(names::CANNON_TURRET_HEAD)
                .is_a(names::CANNON_HEAD)
                .with(part_at(0.8))
                .with(BoxExtents(Vector3::new(0.8, 0.4, 0.8))),
            PrefabDefinition::new(names::CANNON)
                .is_a(names::TURRET)
                .with(Turret {
                    kind: TurretKind::Cannon,
                    fire_interval: 0.12,
                })
                .child(names::CANNON_TURRET_HEAD),
            PrefabDefinition::new(names::LASER_TURRET_HEAD)
                .is_a(names::METAL)
                .with(part_at(0.85))
                .with(Color::new(0.45, 0.12, 0.1))
                .with(BoxExtents(Vector3::new(0.35, 0.35, 0.9))),
            PrefabDefinition::new(names::LASER)
                .is_a(names::TURRET)
                .with(Turret {
                    kind: TurretKind::Laser,
                    fire_interval: 0.5,
                })
                .child(names::LASER_TURRET_HEAD),
        ];
        Self::try_from(definitions)
    }
}

fn part_at(height: f32) -> LocalPosition {
    LocalPosition(Vector3::new(0.0, height, 0.0))
}

impl TryFrom<Vec<PrefabDefinition>> for PrefabCatalog {
    type Error = LevelError;

    fn try_from(definitions: Vec<PrefabDefinition>) -> Result<Self, Self::Error> {
        let mut catalog = Self::new();
        for definition in definitions {
            let _ = catalog.register(definition)?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> PrefabCatalog {
        PrefabCatalog::reference(&TileDimensions::default()).expect("reference prefabs register")
    }

    #[test]
    fn enemy_overrides_inherited_metal_color() {
        let catalog = reference();
        let enemy = catalog.require(names::ENEMY).expect("enemy registered");
        let composed = catalog.compose(enemy);

        assert_eq!(composed.get::<Color>(), Some(&Color::new(0.05, 0.05, 0.05)));
        assert!(composed.get::<Enemy>().is_some());
        assert_eq!(
            composed.get::<BoxExtents>(),
            Some(&BoxExtents(Vector3::new(0.7, 0.7, 0.7)))
        );
    }

    #[test]
    fn base_pieces_inherit_metal_color() {
        let catalog = reference();
        let lower = catalog
            .require(names::TURRET_BASE_LOWER)
            .expect("registered");
        assert_eq!(
            catalog.compose(lower).get::<Color>(),
            Some(&Color::new(0.1, 0.1, 0.1))
        );
    }

    #[test]
    fn variants_inherit_turret_children_before_their_own() {
        let catalog = reference();
        let cannon = catalog.require(names::CANNON).expect("registered");
        let children: Vec<_> = catalog
            .children(cannon)
            .into_iter()
            .filter_map(|child| catalog.get(child))
            .map(Prefab::name)
            .collect();

        assert_eq!(
            children,
            vec![names::TURRET_BASE, names::CANNON_TURRET_HEAD]
        );
    }

    #[test]
    fn lineage_runs_from_root_base_to_prefab() {
        let catalog = reference();
        let head = catalog
            .require(names::CANNON_TURRET_HEAD)
            .expect("registered");
        let lineage: Vec<_> = catalog
            .lineage(head)
            .into_iter()
            .filter_map(|id| catalog.get(id))
            .map(Prefab::name)
            .collect();
        assert_eq!(lineage, vec![names::CANNON_HEAD, names::CANNON_TURRET_HEAD]);
    }

    #[test]
    fn unknown_base_is_rejected() {
        let mut catalog = PrefabCatalog::new();
        let error = catalog
            .register(PrefabDefinition::new("Orphan").is_a("Missing"))
            .expect_err("base must be registered first");
        assert_eq!(error, LevelError::UnknownPrefab("Missing".to_owned()));
        assert!(catalog.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut catalog = PrefabCatalog::new();
        let _ = catalog
            .register(PrefabDefinition::new("Rock"))
            .expect("first registration");
        assert_eq!(
            catalog.register(PrefabDefinition::new("Rock")),
            Err(LevelError::DuplicatePrefab("Rock".to_owned()))
        );
    }
}
