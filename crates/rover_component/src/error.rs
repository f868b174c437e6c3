//! Error types for the component layer.
//!
//! Every fallible operation leaves the [`DataManager`](crate::DataManager)
//! untouched when it returns `Err`. Lookups that may legitimately miss
//! (`get_component`) return `Option` instead.

use crate::attribute::AttributeType;
use crate::component::ComponentId;
use crate::entity::{Entity, EntityId};

/// Errors raised while interning strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StringIdError {
    /// Two distinct strings hash to the same 32-bit id.
    #[error("string id {id:#010x} is owned by {existing:?}, refusing to alias {incoming:?}")]
    Collision {
        /// The contested hash.
        id: u32,
        /// The string registered first.
        existing: String,
        /// The string that was rejected.
        incoming: String,
    },
}

/// Errors raised while building the component registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The same component type was registered twice.
    #[error("component '{0}' is already registered")]
    Duplicate(String),

    /// The component name collides with another interned string.
    #[error("component name collision: {0}")]
    NameCollision(#[from] StringIdError),

    /// The component's alignment exceeds what the pool slots guarantee.
    #[error("component '{component}' requires {align}-byte alignment, pools provide at most 16")]
    Alignment {
        /// Component name.
        component: String,
        /// Required alignment.
        align: usize,
    },

    /// An attribute description does not fit the component layout.
    #[error("attribute '{attribute}' of '{component}' is invalid: {reason}")]
    InvalidAttribute {
        /// Component name.
        component: String,
        /// Attribute name.
        attribute: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Errors raised by [`DataManager`](crate::DataManager) mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataError {
    /// `create_entity` asked for an id that is already live.
    #[error("entity id {0} is already in use")]
    EntityIdInUse(EntityId),

    /// `create_entity` asked for an id beyond the entity limit.
    #[error("entity id {id} is out of range (max {max})")]
    EntityIdOutOfRange {
        /// Requested id.
        id: EntityId,
        /// Configured entity limit.
        max: u32,
    },

    /// Every entity id is taken.
    #[error("entity limit of {max} reached")]
    EntityLimitReached {
        /// Configured entity limit.
        max: u32,
    },

    /// The entity (or clone) does not exist.
    #[error("{0} does not exist")]
    EntityNotFound(Entity),

    /// The component id was never registered.
    #[error("component {0} is not registered")]
    UnknownComponent(ComponentId),

    /// The component's pool is full.
    #[error("component '{component}' is at capacity ({capacity} instances)")]
    CapacityExceeded {
        /// Component name.
        component: String,
        /// Pool capacity.
        capacity: u32,
    },

    /// The entity already holds a component of this type.
    #[error("{entity} already has component '{component}'")]
    DuplicateComponent {
        /// Owning entity.
        entity: Entity,
        /// Component name.
        component: String,
    },

    /// The entity holds no component of this type.
    #[error("{entity} has no component '{component}'")]
    ComponentNotFound {
        /// Entity that was queried.
        entity: Entity,
        /// Component name.
        component: String,
    },

    /// Raw component bytes do not match the registered component size.
    #[error("component '{component}' is {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Component name.
        component: String,
        /// Registered size.
        expected: usize,
        /// Supplied size.
        actual: usize,
    },

    /// A [`ComponentRef`](crate::ComponentRef) outlived a removal in its pool.
    #[error("reference to '{component}' slot {slot} is stale")]
    StaleReference {
        /// Component name.
        component: String,
        /// Slot the reference pointed at.
        slot: u32,
    },

    /// A variable-length payload has more elements than its header can count.
    #[error("payload of {len} elements is too large for '{component}'")]
    PayloadTooLarge {
        /// Component name.
        component: String,
        /// Requested element count.
        len: usize,
    },

    /// A prototype asks for more clones than its description allows.
    #[error("prototype {entity} asks for {requested} clones, at most {max} are allowed")]
    TooManyClones {
        /// Prototype entity id.
        entity: EntityId,
        /// Requested clone count.
        requested: u32,
        /// Upper bound from the `Prototype` description.
        max: u32,
    },

    /// A clone range reaches past the clones materialised for an entity.
    #[error("clone range up to {requested} exceeds the {available} clones of entity {entity}")]
    CloneOutOfRange {
        /// Base entity id.
        entity: EntityId,
        /// Exclusive end of the requested range.
        requested: u32,
        /// Number of clone ids in use (excluding the prototype itself).
        available: u32,
    },
}

/// Errors raised while encoding or decoding component data.
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// MessagePack encoding failed.
    #[error("failed to encode component data: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MessagePack decoding failed.
    #[error("failed to decode component data: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// A stored value does not match the attribute's declared type.
    #[error("attribute '{attribute}' expects {expected:?}")]
    TypeMismatch {
        /// Attribute name.
        attribute: String,
        /// Declared attribute type.
        expected: AttributeType,
    },

    /// A value has the right type but cannot be stored.
    #[error("attribute '{attribute}': {reason}")]
    InvalidValue {
        /// Attribute name.
        attribute: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A snapshot names a component type this registry does not know.
    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    /// A custom attribute codec rejected its input.
    #[error("custom attribute '{attribute}': {message}")]
    Custom {
        /// Attribute name.
        attribute: String,
        /// Codec message.
        message: String,
    },

    /// Rebuilding entities or components failed.
    #[error(transparent)]
    Data(#[from] DataError),
}
