//! Component values attached to entities and the bag that groups them.

use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Serialize};

use crate::{grid::TileKind, Direction};

/// Three-dimensional vector in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// Horizontal axis aligned with grid columns.
    pub x: f32,
    /// Vertical axis.
    pub y: f32,
    /// Horizontal axis aligned with grid rows.
    pub z: f32,
}

impl Vector3 {
    /// The origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul<f32> for Vector3 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Position relative to the parent entity, or to the origin for roots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalPosition(pub Vector3);

/// Absolute position derived by the transform resolver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalPosition(pub Vector3);

/// Axis-aligned extents of the cube drawn for an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxExtents(pub Vector3);

/// Linear RGB color with channels in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub red: f32,
    /// Green channel.
    pub green: f32,
    /// Blue channel.
    pub blue: f32,
}

impl Color {
    /// Creates a new color.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Self { red, green, blue }
    }

    /// Scales every channel by `factor`, clamping to the valid range.
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        Self::new(
            (self.red * factor).clamp(0.0, 1.0),
            (self.green * factor).clamp(0.0, 1.0),
            (self.blue * factor).clamp(0.0, 1.0),
        )
    }
}

/// Marks an entity as a path-following enemy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {}

/// Remaining hit points. Nothing deals damage yet; the value is carried as data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health(pub u32);

/// Per-instance parameters of a planted tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Multiplier applied to the trunk height and canopy elevation.
    pub height: f32,
    /// Brightness offset applied to the canopy color.
    pub variation: f32,
}

/// Turret variants the level builder can place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TurretKind {
    /// Single-barrel projectile turret.
    Cannon,
    /// Beam turret with a slimmer head.
    Laser,
}

impl TurretKind {
    /// Every turret variant in a stable order.
    pub const ALL: [Self; 2] = [Self::Cannon, Self::Laser];

    /// Name of the prefab instantiated for the variant.
    #[must_use]
    pub const fn prefab_name(self) -> &'static str {
        match self {
            Self::Cannon => crate::prefab::names::CANNON,
            Self::Laser => crate::prefab::names::LASER,
        }
    }
}

/// Inert turret state; no targeting or firing consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turret {
    /// Variant of the turret.
    pub kind: TurretKind,
    /// Seconds between shots.
    pub fire_interval: f32,
}

/// Classification of the grid cell a tile entity stands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile(pub TileKind);

/// Typed access to one optional slot of a [`Components`] bag.
pub trait Component: Clone + Sized {
    /// Borrows the value stored in `components`, if any.
    fn slot(components: &Components) -> Option<&Self>;

    /// Mutably borrows the slot holding the value.
    fn slot_mut(components: &mut Components) -> &mut Option<Self>;
}

/// Set of optional component values owned by one entity or prefab.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Components {
    /// Position relative to the parent.
    pub local_position: Option<LocalPosition>,
    /// Resolved absolute position.
    pub global_position: Option<GlobalPosition>,
    /// Drawn cube extents.
    pub extents: Option<BoxExtents>,
    /// Drawn color.
    pub color: Option<Color>,
    /// Heading of a moving entity.
    pub direction: Option<Direction>,
    /// Enemy marker.
    pub enemy: Option<Enemy>,
    /// Hit points.
    pub health: Option<Health>,
    /// Tree parameters.
    pub tree: Option<Tree>,
    /// Turret state.
    pub turret: Option<Turret>,
    /// Tile classification.
    pub tile: Option<Tile>,
}

macro_rules! component_slots {
    ($($component:ty => $field:ident),+ $(,)?) => {
        $(
            impl Component for $component {
                fn slot(components: &Components) -> Option<&Self> {
                    components.$field.as_ref()
                }

                fn slot_mut(components: &mut Components) -> &mut Option<Self> {
                    &mut components.$field
                }
            }
        )+

        impl Components {
            /// Replaces every slot of `self` that `overrides` has a value for.
            pub fn overlay(&mut self, overrides: &Components) {
                $(
                    if let Some(value) = &overrides.$field {
                        self.$field = Some(value.clone());
                    }
                )+
            }
        }
    };
}

component_slots! {
    LocalPosition => local_position,
    GlobalPosition => global_position,
    BoxExtents => extents,
    Color => color,
    Direction => direction,
    Enemy => enemy,
    Health => health,
    Tree => tree,
    Turret => turret,
    Tile => tile,
}

impl Components {
    /// Returns the bag with `value` stored in its slot.
    #[must_use]
    pub fn with<C: Component>(mut self, value: C) -> Self {
        *C::slot_mut(&mut self) = Some(value);
        self
    }

    /// Borrows a component value.
    #[must_use]
    pub fn get<C: Component>(&self) -> Option<&C> {
        C::slot(self)
    }

    /// Mutably borrows a component value.
    pub fn get_mut<C: Component>(&mut self) -> Option<&mut C> {
        C::slot_mut(self).as_mut()
    }

    /// Stores a component value, returning the previous one.
    pub fn insert<C: Component>(&mut self, value: C) -> Option<C> {
        C::slot_mut(self).replace(value)
    }

    /// Clears a component slot, returning its value.
    pub fn remove<C: Component>(&mut self) -> Option<C> {
        C::slot_mut(self).take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_only_replaces_present_slots() {
        let mut base = Components::default()
            .with(Color::new(0.1, 0.1, 0.1))
            .with(BoxExtents(Vector3::new(1.0, 1.0, 1.0)));
        let overrides = Components::default().with(Color::new(0.05, 0.05, 0.05));

        base.overlay(&overrides);

        assert_eq!(base.get::<Color>(), Some(&Color::new(0.05, 0.05, 0.05)));
        assert_eq!(
            base.get::<BoxExtents>(),
            Some(&BoxExtents(Vector3::new(1.0, 1.0, 1.0)))
        );
    }

    #[test]
    fn typed_access_round_trips_through_slots() {
        let mut components = Components::default();
        assert!(components.insert(Health(3)).is_none());
        assert_eq!(components.insert(Health(5)), Some(Health(3)));
        if let Some(health) = components.get_mut::<Health>() {
            health.0 -= 1;
        }
        assert_eq!(components.remove::<Health>(), Some(Health(4)));
        assert!(components.get::<Health>().is_none());
    }
}
