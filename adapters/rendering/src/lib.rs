#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for tower-defense adapters.
//!
//! The simulation draws nothing itself. Every entity carrying a resolved
//! global position, box extents and a color becomes one unit cube scaled to
//! its extents; backends receive those as [`DrawCommand`]s inside a [`Frame`].

use anyhow::Result as AnyResult;
use glam::{Mat4, Vec3};
use tower_defense_core::{EntityId, GridLayout, Vector3};
use tower_defense_world::{query, World};
use std::{error::Error, fmt};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }
}

impl From<tower_defense_core::Color> for Color {
    fn from(color: tower_defense_core::Color) -> Self {
        Self::new(color.red, color.green, color.blue, 1.0)
    }
}

/// Geometry a draw command instantiates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mesh {
    /// Axis-aligned cube of edge length one centered on the origin.
    UnitCube,
}

/// One mesh instance to draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    /// Entity the command was collected from.
    pub entity: EntityId,
    /// Geometry to draw.
    pub mesh: Mesh,
    /// Model transform: translation to the global position times the box scale.
    pub transform: Mat4,
    /// Flat color of the mesh.
    pub color: Color,
}

/// Collects one draw command per drawable entity, ordered by entity id.
#[must_use]
pub fn collect_draw_commands(world: &World) -> Vec<DrawCommand> {
    query::renderables(world)
        .into_iter()
        .map(|renderable| DrawCommand {
            entity: renderable.entity,
            mesh: Mesh::UnitCube,
            transform: Mat4::from_translation(to_vec3(renderable.position))
                * Mat4::from_scale(to_vec3(renderable.extents)),
            color: renderable.color.into(),
        })
        .collect()
}

fn to_vec3(vector: Vector3) -> Vec3 {
    Vec3::new(vector.x, vector.y, vector.z)
}

/// Region of the world a viewer should keep in frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Framing {
    /// Middle of the playfield.
    pub center: Vec3,
    /// Edge length of the square covering the playfield and its border.
    pub size: f32,
}

impl Framing {
    /// Frames the playfield described by `layout`.
    #[must_use]
    pub fn for_layout(layout: &GridLayout) -> Self {
        Self {
            center: to_vec3(layout.center()),
            size: layout.extent(),
        }
    }
}

/// Everything a backend needs to present one simulation state.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Solid color used to clear the frame.
    pub clear_color: Color,
    /// Region to keep in view.
    pub framing: Framing,
    /// Meshes to draw.
    pub draw_commands: Vec<DrawCommand>,
}

impl Frame {
    /// Captures the current world state.
    pub fn capture(world: &World, clear_color: Color) -> Result<Self, RenderingError> {
        let level = query::level(world).ok_or(RenderingError::MissingLevel)?;
        Ok(Self {
            clear_color,
            framing: Framing::for_layout(level.layout()),
            draw_commands: collect_draw_commands(world),
        })
    }
}

/// Rendering backend capable of presenting tower-defense frames.
pub trait RenderingBackend {
    /// Presents one frame.
    fn present(&mut self, frame: &Frame) -> AnyResult<()>;
}

/// Errors that can occur when capturing frames.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// Frames are framed around a level, so one must exist.
    MissingLevel,
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLevel => write!(f, "no level has been constructed"),
        }
    }
}

impl Error for RenderingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_defense_core::{BoxExtents, Components, GlobalPosition};

    fn drawable(position: Vector3, extents: Vector3) -> Components {
        Components::default()
            .with(GlobalPosition(position))
            .with(BoxExtents(extents))
            .with(tower_defense_core::Color::new(0.2, 0.4, 0.6))
    }

    #[test]
    fn unit_cube_is_scaled_then_translated() {
        let mut world = World::new();
        let entity = world.spawn(drawable(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(2.0, 4.0, 0.5),
        ));

        let commands = collect_draw_commands(&world);
        assert_eq!(commands.len(), 1);
        let command = commands[0];
        assert_eq!(command.entity, entity);
        assert_eq!(command.mesh, Mesh::UnitCube);
        assert_eq!(command.color, Color::new(0.2, 0.4, 0.6, 1.0));

        let corner = command.transform.transform_point3(Vec3::splat(0.5));
        assert_eq!(corner, Vec3::new(2.0, 4.0, 3.25));
        let center = command.transform.transform_point3(Vec3::ZERO);
        assert_eq!(center, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn entities_missing_a_drawable_component_are_skipped() {
        let mut world = World::new();
        let _ = world.spawn(Components::default().with(GlobalPosition(Vector3::ZERO)));
        let _ = world.spawn(
            Components::default()
                .with(BoxExtents(Vector3::new(1.0, 1.0, 1.0)))
                .with(tower_defense_core::Color::new(1.0, 1.0, 1.0)),
        );
        let drawn = world.spawn(drawable(Vector3::ZERO, Vector3::new(1.0, 1.0, 1.0)));

        let commands = collect_draw_commands(&world);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].entity, drawn);
    }

    #[test]
    fn capture_requires_a_level() {
        let world = World::new();
        let error = Frame::capture(&world, Color::new(0.0, 0.0, 0.0, 1.0))
            .expect_err("no level constructed");
        assert_eq!(error, RenderingError::MissingLevel);
        assert_eq!(error.to_string(), "no level has been constructed");
    }

    #[test]
    fn framing_covers_the_reference_grid() {
        let layout = GridLayout::new(10, 10, 3.0, 0.0);
        let framing = Framing::for_layout(&layout);
        assert_eq!(framing.size, 32.0);
        assert_eq!(framing.center, Vec3::new(1.5, 0.0, 13.5));
    }
}
