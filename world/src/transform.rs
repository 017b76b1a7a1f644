//! Cascade resolution of absolute positions through the parent/child forest.

use std::collections::VecDeque;

use tower_defense_core::{GlobalPosition, LocalPosition, Vector3};

use crate::World;

/// Recomputes [`GlobalPosition`] for every live entity.
///
/// Entities are visited breadth-first from the roots, so a parent's global
/// position is final before any child reads it. Roots resolve against the
/// origin and an entity without a [`LocalPosition`] sits exactly at its
/// parent. Globals are always derived from locals, so repeated runs over
/// unchanged locals produce identical values.
pub fn resolve_global_positions(world: &mut World) {
    let mut queue: VecDeque<_> = world.roots().map(|root| (root, Vector3::ZERO)).collect();

    while let Some((entity, parent_global)) = queue.pop_front() {
        let local = world
            .get::<LocalPosition>(entity)
            .map_or(Vector3::ZERO, |local| local.0);
        let global = parent_global + local;
        let _ = world.insert(entity, GlobalPosition(global));

        queue.extend(world.children(entity).iter().map(|child| (*child, global)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_defense_core::{Components, EntityId};

    fn local(x: f32, y: f32, z: f32) -> Components {
        Components::default().with(LocalPosition(Vector3::new(x, y, z)))
    }

    fn global(world: &World, entity: EntityId) -> Vector3 {
        world
            .get::<GlobalPosition>(entity)
            .expect("resolved global position")
            .0
    }

    fn chain(world: &mut World, depth: usize) -> (EntityId, Vector3) {
        let mut expected = Vector3::new(1.0, 2.0, 3.0);
        let mut current = world.spawn(local(1.0, 2.0, 3.0));
        for level in 1..=depth {
            let offset = Vector3::new(level as f32, -0.5, 0.25 * level as f32);
            let child = world.spawn(Components::default().with(LocalPosition(offset)));
            world.set_parent(child, Some(current)).expect("acyclic");
            expected += offset;
            current = child;
        }
        (current, expected)
    }

    #[test]
    fn deepest_child_sums_every_ancestor() {
        for depth in 0..=3 {
            let mut world = World::new();
            let (leaf, expected) = chain(&mut world, depth);
            resolve_global_positions(&mut world);
            assert_eq!(global(&world, leaf), expected, "depth {depth}");
        }
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut world = World::new();
        let (leaf, _) = chain(&mut world, 3);
        resolve_global_positions(&mut world);
        let first: Vec<_> = world
            .entities()
            .map(|entity| global(&world, entity))
            .collect();
        resolve_global_positions(&mut world);
        let second: Vec<_> = world
            .entities()
            .map(|entity| global(&world, entity))
            .collect();

        let bits = |values: &[Vector3]| -> Vec<[u32; 3]> {
            values
                .iter()
                .map(|value| [value.x.to_bits(), value.y.to_bits(), value.z.to_bits()])
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
        assert!(world.contains(leaf));
    }

    #[test]
    fn stale_globals_are_overwritten() {
        let mut world = World::new();
        let entity = world.spawn(
            local(1.0, 1.0, 1.0).with(GlobalPosition(Vector3::new(99.0, 99.0, 99.0))),
        );
        resolve_global_positions(&mut world);
        assert_eq!(global(&world, entity), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn children_follow_a_moved_parent() {
        let mut world = World::new();
        let parent = world.spawn(local(0.0, 0.0, 0.0));
        let child = world.spawn(local(0.0, 1.0, 0.0));
        world.set_parent(child, Some(parent)).expect("acyclic");
        resolve_global_positions(&mut world);

        let _ = world
            .insert(parent, LocalPosition(Vector3::new(5.0, 0.0, -2.0)))
            .expect("parent exists");
        resolve_global_positions(&mut world);

        assert_eq!(global(&world, child), Vector3::new(5.0, 1.0, -2.0));
    }

    #[test]
    fn entities_without_local_position_sit_at_their_parent() {
        let mut world = World::new();
        let root = world.spawn(local(2.0, 0.0, 0.0));
        let group = world.spawn(Components::default());
        let member = world.spawn(local(0.0, 0.0, 3.0));
        world.set_parent(group, Some(root)).expect("acyclic");
        world.set_parent(member, Some(group)).expect("acyclic");

        resolve_global_positions(&mut world);

        assert_eq!(global(&world, group), Vector3::new(2.0, 0.0, 0.0));
        assert_eq!(global(&world, member), Vector3::new(2.0, 0.0, 3.0));
    }
}
