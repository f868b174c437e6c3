//! Synchronous publish/subscribe.
//!
//! Subscribers are grouped by event type id and called in subscription
//! order. Delivery stops at the first subscriber that marks the event
//! handled. Publishing never crosses threads.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::component::ComponentId;
use crate::data_manager::ComponentRef;
use crate::entity::Entity;
use crate::error::StringIdError;
use crate::string_id::StringId;

/// Opaque payload of a custom event.
#[derive(Clone)]
pub struct Payload(pub Arc<dyn Any + Send + Sync>);

impl Payload {
    /// Wrap a value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the value as `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Payload(..)")
    }
}

/// What happened.
#[derive(Debug, Clone)]
pub enum EventKind {
    EntityCreated {
        entity: Entity,
    },
    EntityDestroyed {
        entity: Entity,
    },
    /// Published after the instance is written, so `reference` resolves.
    ComponentCreated {
        entity: Entity,
        component: ComponentId,
        reference: ComponentRef,
    },
    ComponentDestroyed {
        entity: Entity,
        component: ComponentId,
    },
    SimulationStart,
    SimulationPause,
    SimulationContinue,
    SimulationStop,
    /// Advance a paused simulation by one tick.
    SimulationStep,
    /// Application-defined event.
    Custom {
        type_id: StringId,
        payload: Payload,
    },
}

/// A published event.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventKind,
    /// Set by a subscriber to stop delivery.
    pub handled: bool,
}

impl Event {
    pub const ENTITY_CREATED: StringId = StringId::hash("EntityCreated");
    pub const ENTITY_DESTROYED: StringId = StringId::hash("EntityDestroyed");
    pub const COMPONENT_CREATED: StringId = StringId::hash("ComponentCreated");
    pub const COMPONENT_DESTROYED: StringId = StringId::hash("ComponentDestroyed");
    pub const SIMULATION_START: StringId = StringId::hash("SimulationStart");
    pub const SIMULATION_PAUSE: StringId = StringId::hash("SimulationPause");
    pub const SIMULATION_CONTINUE: StringId = StringId::hash("SimulationContinue");
    pub const SIMULATION_STOP: StringId = StringId::hash("SimulationStop");
    pub const SIMULATION_STEP: StringId = StringId::hash("SimulationStep");

    /// A fresh, unhandled event.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            handled: false,
        }
    }

    /// A custom event of type `name` carrying `payload`.
    ///
    /// # Errors
    ///
    /// Fails if `name` collides with another interned string.
    pub fn custom<T: Any + Send + Sync>(name: &str, payload: T) -> Result<Self, StringIdError> {
        Ok(Self::new(EventKind::Custom {
            type_id: StringId::new(name)?,
            payload: Payload::new(payload),
        }))
    }

    /// The event's payload.
    #[must_use]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The type tag subscribers are keyed by.
    #[must_use]
    pub fn event_type(&self) -> StringId {
        match &self.kind {
            EventKind::EntityCreated { .. } => Self::ENTITY_CREATED,
            EventKind::EntityDestroyed { .. } => Self::ENTITY_DESTROYED,
            EventKind::ComponentCreated { .. } => Self::COMPONENT_CREATED,
            EventKind::ComponentDestroyed { .. } => Self::COMPONENT_DESTROYED,
            EventKind::SimulationStart => Self::SIMULATION_START,
            EventKind::SimulationPause => Self::SIMULATION_PAUSE,
            EventKind::SimulationContinue => Self::SIMULATION_CONTINUE,
            EventKind::SimulationStop => Self::SIMULATION_STOP,
            EventKind::SimulationStep => Self::SIMULATION_STEP,
            EventKind::Custom { type_id, .. } => *type_id,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(&mut Event) + Send>;

/// Synchronous event dispatcher.
#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<StringId, Vec<(SubscriptionId, Callback)>>,
    next_id: u64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("types", &self.subscribers.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` for every future event of `type_id`.
    pub fn subscribe<F>(&mut self, type_id: StringId, callback: F) -> SubscriptionId
    where
        F: FnMut(&mut Event) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers
            .entry(type_id)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for list in self.subscribers.values_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Deliver `event` to its subscribers in order until one handles it.
    pub fn publish(&mut self, event: &mut Event) {
        let type_id = event.event_type();
        let Some(list) = self.subscribers.get_mut(&type_id) else {
            return;
        };
        trace!(event = %type_id, subscribers = list.len(), "publish");
        for (_, callback) in list.iter_mut() {
            callback(event);
            if event.handled {
                break;
            }
        }
    }

    /// Publish a fresh event of `kind`.
    pub fn emit(&mut self, kind: EventKind) {
        self.publish(&mut Event::new(kind));
    }

    /// Number of subscribers for `type_id`.
    #[must_use]
    pub fn subscriber_count(&self, type_id: StringId) -> usize {
        self.subscribers.get(&type_id).map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<usize>>>, EventBus) {
        (Arc::new(Mutex::new(Vec::new())), EventBus::new())
    }

    #[test]
    fn test_subscribers_called_in_order() {
        let (calls, mut bus) = recorder();
        for i in 0..3 {
            let calls = Arc::clone(&calls);
            bus.subscribe(Event::SIMULATION_START, move |_| calls.lock().unwrap().push(i));
        }
        bus.emit(EventKind::SimulationStart);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_handled_stops_delivery() {
        for k in 0..4 {
            let (calls, mut bus) = recorder();
            for i in 0..4 {
                let calls = Arc::clone(&calls);
                bus.subscribe(Event::SIMULATION_STOP, move |event| {
                    calls.lock().unwrap().push(i);
                    if i == k {
                        event.handled = true;
                    }
                });
            }
            let mut event = Event::new(EventKind::SimulationStop);
            bus.publish(&mut event);
            assert!(event.handled);
            assert_eq!(*calls.lock().unwrap(), (0..=k).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_event_type_tags() {
        let event = Event::new(EventKind::SimulationContinue);
        assert_eq!(event.event_type(), Event::SIMULATION_CONTINUE);
        let created = Event::new(EventKind::EntityCreated {
            entity: Entity::new(3),
        });
        assert_eq!(created.event_type(), StringId::hash("EntityCreated"));
    }

    #[test]
    fn test_no_subscribers_is_fine() {
        let mut bus = EventBus::new();
        let mut event = Event::new(EventKind::SimulationPause);
        bus.publish(&mut event);
        assert!(!event.handled);
    }

    #[test]
    fn test_only_matching_type_is_delivered() {
        let (calls, mut bus) = recorder();
        let c = Arc::clone(&calls);
        bus.subscribe(Event::ENTITY_CREATED, move |_| c.lock().unwrap().push(1));
        bus.emit(EventKind::EntityDestroyed {
            entity: Entity::new(0),
        });
        assert!(calls.lock().unwrap().is_empty());
        bus.emit(EventKind::EntityCreated {
            entity: Entity::new(0),
        });
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_unsubscribe_and_clear() {
        let (calls, mut bus) = recorder();
        let c = Arc::clone(&calls);
        let first = bus.subscribe(Event::SIMULATION_STEP, move |_| c.lock().unwrap().push(1));
        let c = Arc::clone(&calls);
        bus.subscribe(Event::SIMULATION_STEP, move |_| c.lock().unwrap().push(2));

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        bus.emit(EventKind::SimulationStep);
        assert_eq!(*calls.lock().unwrap(), vec![2]);

        bus.clear();
        assert_eq!(bus.subscriber_count(Event::SIMULATION_STEP), 0);
        bus.emit(EventKind::SimulationStep);
        assert_eq!(*calls.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_custom_event_payload() {
        let (calls, mut bus) = recorder();
        let c = Arc::clone(&calls);
        let type_id = StringId::new("event_test_custom").unwrap();
        bus.subscribe(type_id, move |event| {
            if let EventKind::Custom { payload, .. } = event.kind() {
                c.lock().unwrap().push(*payload.downcast_ref::<usize>().unwrap());
            }
        });
        let mut event = Event::custom("event_test_custom", 42usize).unwrap();
        assert_eq!(event.event_type(), type_id);
        bus.publish(&mut event);
        assert_eq!(*calls.lock().unwrap(), vec![42]);
    }
}
