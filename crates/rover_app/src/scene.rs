//! Demonstration scene: a few robot prototypes, each replicated into a
//! swarm of clones that wander around the origin.

use anyhow::Result;
use rover_component::{Entity, EntityView, Name, PolygonCollider2D, Prototype, ScriptRef};
use rover_math::{Quat, Transform, Vec3};
use tracing::info;

use crate::config::SimConfig;
use crate::context::SimContext;

pub const WANDER: &str = "wander";

/// Half the side of the square arena.
const ARENA: f32 = 500.0;

const FOOTPRINT: [[f32; 2]; 4] = [[-0.4, -0.3], [0.4, -0.3], [0.4, 0.3], [-0.4, 0.3]];

/// Drive forward while turning at a rate set by the clone id, bouncing
/// off the arena walls.
pub fn wander(view: &mut EntityView<'_>, dt: f32) {
    let clone_id = view.entity().clone_id as f32;
    let Some(transform) = view.get_mut::<Transform>() else {
        return;
    };
    let speed = 0.5 + (clone_id % 8.0) * 0.125;
    let turn = 0.2 + clone_id * 0.05;

    let heading = transform.rotation() * Vec3::X;
    let mut next = transform
        .translated(heading * speed * dt)
        .rotated(Quat::from_rotation_z(turn * dt));
    if next.position.x.abs() > ARENA || next.position.y.abs() > ARENA {
        next.position = next.position.clamp(Vec3::splat(-ARENA), Vec3::splat(ARENA));
        next = next.rotated(Quat::from_rotation_z(std::f32::consts::PI));
    }
    *transform = next;
}

/// Populate `context` with `config.robots` scripted prototypes of
/// `config.clones` clones each.
///
/// # Errors
///
/// Fails if an entity or component does not fit the configured limits.
pub fn build(context: &mut SimContext, config: &SimConfig) -> Result<Vec<Entity>> {
    context.scripts.register(WANDER, wander)?;

    let mut robots = Vec::new();
    for i in 0..config.robots {
        let robot = context.data.create_entity(None)?;
        let data = &mut context.data;
        data.add(robot, Name::new(&format!("rover-{i}")))?;
        data.add(robot, Transform::from_position(Vec3::new(i as f32 * 10.0, 0.0, 0.0)))?;
        data.add(robot, Prototype { max_clones: config.clones })?;
        data.add(robot, ScriptRef::new(WANDER)?)?;
        data.add(robot, PolygonCollider2D::default())?;
        PolygonCollider2D::set_points(data, robot, &FOOTPRINT)?;
        context.add_factory(robot)?;
        robots.push(robot);
    }
    info!(robots = robots.len(), clones = config.clones, "scene built");
    Ok(robots)
}

#[cfg(test)]
mod tests {
    use rover_component::Component;
    use rover_processor::ProcessorType;

    use super::*;

    fn config(processor: ProcessorType) -> SimConfig {
        SimConfig {
            processor,
            clones: 12,
            robots: 2,
            ..SimConfig::default()
        }
    }

    fn run(processor: ProcessorType, ticks: usize) -> Vec<Transform> {
        let config = config(processor);
        let mut context = SimContext::new(&config).unwrap();
        let robots = build(&mut context, &config).unwrap();
        context.start().unwrap();
        for _ in 0..ticks {
            context.tick(config.dt).unwrap();
        }
        let state = robots
            .iter()
            .flat_map(|r| (0..=config.clones).map(move |c| Entity::with_clone(r.id, c)))
            .map(|e| *context.data.get::<Transform>(e).unwrap())
            .collect();
        context.stop().unwrap();
        state
    }

    #[test]
    fn test_scene_materialises_clones() {
        let config = config(ProcessorType::Serial);
        let mut context = SimContext::new(&config).unwrap();
        build(&mut context, &config).unwrap();
        context.start().unwrap();
        assert_eq!(context.data.live_count(Transform::component_id()), 26);
        assert_eq!(
            PolygonCollider2D::points(&context.data, Entity::with_clone(0, 5)).unwrap(),
            FOOTPRINT.to_vec()
        );
        context.stop().unwrap();
        assert_eq!(context.data.live_count(Transform::component_id()), 2);
    }

    #[test]
    fn test_prototypes_stay_put_and_clones_move() {
        let state = run(ProcessorType::Serial, 10);
        assert_eq!(state[0], Transform::IDENTITY);
        assert_ne!(state[1], Transform::IDENTITY);
    }

    #[test]
    fn test_backends_agree_on_scene() {
        let serial = run(ProcessorType::Serial, 20);
        assert_eq!(run(ProcessorType::Cpu, 20), serial);
        assert_eq!(run(ProcessorType::Gpu, 20), serial);
    }
}
