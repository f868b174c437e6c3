//! Every backend must leave clone state exactly as the serial backend does.

use std::mem::offset_of;

use rover_component::{
    AttributeDescription, AttributeType, Component, ComponentDescription, ComponentRegistry,
    DataManager, Entity, EntityView, Factory, Prototype,
};
use rover_math::{Quat, Transform, Vec3};
use rover_processor::{
    EmulatedProvider, NoDevice, Processor, ProcessorConfig, ProcessorManager, ProcessorType,
};

const CAPACITY: u32 = 64;
const DT: f32 = 0.05;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Odometer {
    distance: f32,
    ticks: u32,
}

impl Component for Odometer {
    fn type_name() -> &'static str {
        "Odometer"
    }

    fn describe() -> ComponentDescription {
        ComponentDescription::new("Odometer")
            .attribute(AttributeDescription::new(
                AttributeType::Float32,
                offset_of!(Odometer, distance),
                "distance",
            ))
            .attribute(AttributeDescription::new(
                AttributeType::UInt32,
                offset_of!(Odometer, ticks),
                "ticks",
            ))
            .max_instances(CAPACITY)
    }
}

/// Drives forward along the clone's heading, turning a little each tick.
fn drive(view: &mut EntityView<'_>, dt: f32) {
    let speed = 1.0 + view.entity().clone_id as f32 * 0.25;
    let Some(transform) = view.get_mut::<Transform>() else {
        return;
    };
    let heading = transform.rotation() * Vec3::X;
    *transform = transform
        .translated(heading * speed * dt)
        .rotated(Quat::from_rotation_z(0.1 * dt));
    if let Some(odometer) = view.get_mut::<Odometer>() {
        odometer.distance += speed * dt;
        odometer.ticks += 1;
    }
}

/// A prototype with `CAPACITY - 1` clones, so clone ids `0..CAPACITY`
/// fill the odometer pool.
fn world() -> (DataManager, Entity) {
    let registry = ComponentRegistry::builder()
        .with_builtins()
        .unwrap()
        .register::<Transform>()
        .unwrap()
        .register::<Odometer>()
        .unwrap()
        .build();
    let mut dm = DataManager::new(registry, 8);
    let e = dm.create_entity(None).unwrap();
    dm.add(e, Prototype { max_clones: CAPACITY - 1 }).unwrap();
    dm.add(e, Transform::IDENTITY).unwrap();
    dm.add(e, Odometer::default()).unwrap();
    Factory::new(&dm, e.id)
        .unwrap()
        .create_clones(&mut dm)
        .unwrap();

    for clone_id in 0..CAPACITY {
        let clone = Entity::with_clone(e.id, clone_id);
        let angle = clone_id as f32 * 0.1;
        let transform = dm.get_mut::<Transform>(clone).unwrap();
        *transform = Transform::from_position(Vec3::new(clone_id as f32, 0.0, 0.0))
            .rotated(Quat::from_rotation_z(angle));
    }
    (dm, e)
}

fn state(dm: &DataManager, e: Entity) -> Vec<(Transform, Odometer)> {
    (0..CAPACITY)
        .map(|c| {
            let clone = Entity::with_clone(e.id, c);
            (
                *dm.get::<Transform>(clone).unwrap(),
                *dm.get::<Odometer>(clone).unwrap(),
            )
        })
        .collect()
}

fn simulate(processor: &mut Processor, count: u32, ticks: usize) -> Vec<(Transform, Odometer)> {
    let (mut dm, e) = world();
    processor.start().unwrap();
    for _ in 0..ticks {
        processor
            .run_clones(&mut dm, &drive, Entity::new(e.id), DT, count)
            .unwrap();
    }
    processor.stop().unwrap();
    state(&dm, e)
}

#[test]
fn test_serial_is_deterministic() {
    let mut serial = Processor::serial();
    let first = simulate(&mut serial, CAPACITY, 5);
    let second = simulate(&mut serial, CAPACITY, 5);
    assert_eq!(first, second);
    assert!(first.iter().all(|(_, o)| o.ticks == 5));
}

#[test]
fn test_cpu_matches_serial_for_every_count() {
    let mut serial = Processor::serial();
    let mut cpu = Processor::cpu(4, 3);
    for count in 1..=CAPACITY {
        let expected = simulate(&mut serial, count, 3);
        let actual = simulate(&mut cpu, count, 3);
        assert_eq!(actual, expected, "count {count}");

        let (untouched, _) = world();
        let untouched = state(&untouched, Entity::new(0));
        assert_eq!(&actual[count as usize..], &untouched[count as usize..]);
    }
}

#[test]
fn test_emulated_device_matches_serial() {
    let mut serial = Processor::serial();
    let mut gpu = Processor::gpu(Box::new(EmulatedProvider { workers: 3 }), 8);
    for count in [1, 7, 8, 9, 33, CAPACITY] {
        assert_eq!(
            simulate(&mut gpu, count, 4),
            simulate(&mut serial, count, 4),
            "count {count}"
        );
    }
}

#[test]
fn test_fallback_runs_the_same_work() {
    let mut manager =
        ProcessorManager::new(ProcessorConfig::default(), Box::new(NoDevice), ProcessorType::Gpu);
    assert_eq!(manager.start_with_fallback().unwrap(), ProcessorType::Serial);

    let (mut dm, e) = world();
    manager
        .processor()
        .run_clones(&mut dm, &drive, Entity::new(e.id), DT, CAPACITY)
        .unwrap();
    let mut serial = Processor::serial();
    assert_eq!(state(&dm, e), simulate(&mut serial, CAPACITY, 1));
}
