//! # rover_component
//!
//! Entity-component storage for the rover simulator.
//!
//! This crate provides:
//!
//! - [`StringId`] and [`StringRegistry`]: interned, collision-checked names.
//! - [`Component`], [`ComponentDescription`] and [`AttributeDescription`]:
//!   plain-data components with reflection metadata.
//! - [`ComponentRegistry`]: the ordered, immutable catalog of component types.
//! - [`DataManager`]: fixed-capacity pools, entities, clones and snapshots.
//! - [`EventBus`]: synchronous lifecycle notifications.
//! - [`Factory`]: prototype replication for mass-instanced entities.

pub mod attribute;
pub mod component;
pub mod components;
pub mod data_manager;
pub mod entity;
pub mod error;
pub mod event;
pub mod factory;
pub mod pool;
pub mod registry;
pub mod serialize;
pub mod string_id;
pub mod view;

pub use attribute::{AttributeDescription, AttributeType, AttributeValue};
pub use component::{
    Component, ComponentDescription, ComponentId, CustomCodec, DEFAULT_MAX_INSTANCES,
    RangeViolation,
};
pub use components::{MAX_CLONES, Name, PolygonCollider2D, Prototype, ScriptRef};
pub use data_manager::{ComponentRef, DEFAULT_MAX_ENTITIES, DataManager};
pub use entity::{Entity, EntityAllocator, EntityId, NO_ENTITY};
pub use error::{DataError, RegistryError, SerializeError, StringIdError};
pub use event::{Event, EventBus, EventKind, Payload, SubscriptionId};
pub use factory::Factory;
pub use pool::ComponentPool;
pub use registry::{ComponentInfo, ComponentRegistry, ComponentRegistryBuilder};
pub use serialize::{SerializedAttribute, SerializedComponent, Snapshot};
pub use string_id::{StringId, StringRegistry};
pub use view::EntityView;
