//! Typed synchronous publish/subscribe bus.
//!
//! # Responsibility
//! - Register and remove listeners per declared event.
//! - Dispatch payloads to listeners in registration order.
//!
//! # Invariants
//! - A bus only accepts events declared for its `EventMap`.
//! - Each event has exactly one payload type.
//! - Dispatch iterates a snapshot taken at emit time; listeners added or
//!   removed during dispatch only affect later emits.
//! - No internal borrow is held while a listener runs, so listeners may call
//!   back into the bus or into whatever owns it.

use log::{trace, warn};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;
use std::rc::Rc;

/// Closed set of events one bus carries.
pub trait EventMap: 'static {}

/// One named event of map `M`.
pub trait Event<M: EventMap>: 'static {
    type Payload: 'static;
    /// Stable wire/log name, e.g. `todo:added`.
    const NAME: &'static str;
}

pub type ListenerResult = Result<(), ListenerError>;

/// Registered callback. Identity (for `off`) is the `Rc` allocation.
pub type Listener<P> = Rc<dyn Fn(&P) -> ListenerResult>;

/// Wraps a closure as a `Listener`.
pub fn listener<P, F>(callback: F) -> Listener<P>
where
    F: Fn(&P) -> ListenerResult + 'static,
{
    Rc::new(callback)
}

/// Failure reported by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ListenerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ListenerError {}

/// Listener failure surfaced to the emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitError {
    pub event: &'static str,
    /// Position of the failing listener in the dispatch snapshot.
    pub listener_index: usize,
    pub source: ListenerError,
}

impl Display for EmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "listener #{} for `{}` failed: {}",
            self.listener_index, self.event, self.source
        )
    }
}

impl Error for EmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Synchronous bus for the events of `M`.
pub struct EventBus<M: EventMap> {
    // TypeId of the event marker -> Vec<Listener<E::Payload>>
    listeners: RefCell<HashMap<TypeId, Box<dyn Any>>>,
    _map: PhantomData<M>,
}

impl<M: EventMap> Default for EventBus<M> {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            _map: PhantomData,
        }
    }
}

impl<M: EventMap> EventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` for event `E`. The same listener may be added twice.
    pub fn on<E: Event<M>>(&self, listener: Listener<E::Payload>) {
        let mut listeners = self.listeners.borrow_mut();
        let slot = listeners
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<Listener<E::Payload>>::new()) as Box<dyn Any>);
        if let Some(list) = slot.downcast_mut::<Vec<Listener<E::Payload>>>() {
            list.push(listener);
            trace!(
                "event=bus_on module=events event_name={} listeners={}",
                E::NAME,
                list.len()
            );
        }
    }

    /// Removes the first registration of `listener` for event `E`.
    ///
    /// Returns whether a registration was removed.
    pub fn off<E: Event<M>>(&self, listener: &Listener<E::Payload>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let Some(list) = listeners
            .get_mut(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_mut::<Vec<Listener<E::Payload>>>())
        else {
            return false;
        };

        match list
            .iter()
            .position(|registered| same_listener(registered, listener))
        {
            Some(index) => {
                list.remove(index);
                trace!(
                    "event=bus_off module=events event_name={} listeners={}",
                    E::NAME,
                    list.len()
                );
                true
            }
            None => false,
        }
    }

    /// Invokes every listener of `E` registered at call time, in order.
    ///
    /// Returns how many listeners ran.
    ///
    /// # Errors
    /// - `EmitError` from the first failing listener; later listeners of the
    ///   same dispatch are skipped.
    pub fn emit<E: Event<M>>(&self, payload: &E::Payload) -> Result<usize, EmitError> {
        let snapshot = self.snapshot::<E>();

        for (index, listener) in snapshot.iter().enumerate() {
            if let Err(source) = listener(payload) {
                warn!(
                    "event=bus_emit module=events status=error event_name={} listener_index={} error={}",
                    E::NAME,
                    index,
                    source
                );
                return Err(EmitError {
                    event: E::NAME,
                    listener_index: index,
                    source,
                });
            }
        }

        trace!(
            "event=bus_emit module=events status=ok event_name={} listeners={}",
            E::NAME,
            snapshot.len()
        );
        Ok(snapshot.len())
    }

    pub fn listener_count<E: Event<M>>(&self) -> usize {
        self.listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Vec<Listener<E::Payload>>>())
            .map_or(0, Vec::len)
    }

    fn snapshot<E: Event<M>>(&self) -> Vec<Listener<E::Payload>> {
        self.listeners
            .borrow()
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.downcast_ref::<Vec<Listener<E::Payload>>>())
            .cloned()
            .unwrap_or_default()
    }
}

fn same_listener<P: ?Sized>(left: &Rc<P>, right: &Rc<P>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(left), Rc::as_ptr(right))
}

#[cfg(test)]
mod tests {
    use super::{listener, Event, EventBus, EventMap, ListenerError};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Demo;
    impl EventMap for Demo {}

    struct Ping;
    impl Event<Demo> for Ping {
        type Payload = u32;
        const NAME: &'static str = "demo:ping";
    }

    struct Pong;
    impl Event<Demo> for Pong {
        type Payload = u32;
        const NAME: &'static str = "demo:pong";
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, tag: &'static str) -> super::Listener<u32> {
        let log = Rc::clone(log);
        listener(move |value: &u32| {
            log.borrow_mut().push(format!("{tag}:{value}"));
            Ok(())
        })
    }

    #[test]
    fn emit_runs_listeners_in_registration_order() {
        let bus = EventBus::<Demo>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on::<Ping>(recorder(&log, "a"));
        bus.on::<Ping>(recorder(&log, "b"));

        assert_eq!(bus.emit::<Ping>(&1).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn events_with_same_payload_type_are_separate() {
        let bus = EventBus::<Demo>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on::<Ping>(recorder(&log, "ping"));

        assert_eq!(bus.emit::<Pong>(&5).unwrap(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(bus.listener_count::<Ping>(), 1);
        assert_eq!(bus.listener_count::<Pong>(), 0);
    }

    #[test]
    fn off_removes_only_first_matching_registration() {
        let bus = EventBus::<Demo>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handler = recorder(&log, "h");
        bus.on::<Ping>(Rc::clone(&handler));
        bus.on::<Ping>(Rc::clone(&handler));

        assert!(bus.off::<Ping>(&handler));
        assert_eq!(bus.listener_count::<Ping>(), 1);
        assert!(bus.off::<Ping>(&handler));
        assert!(!bus.off::<Ping>(&handler));
        assert_eq!(bus.emit::<Ping>(&3).unwrap(), 0);
    }

    #[test]
    fn off_with_unregistered_listener_is_noop() {
        let bus = EventBus::<Demo>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on::<Ping>(recorder(&log, "kept"));

        assert!(!bus.off::<Ping>(&recorder(&log, "other")));
        assert_eq!(bus.listener_count::<Ping>(), 1);
    }

    #[test]
    fn listener_error_stops_dispatch_and_reaches_caller() {
        let bus = EventBus::<Demo>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.on::<Ping>(recorder(&log, "first"));
        bus.on::<Ping>(listener(|_: &u32| Err(ListenerError::new("boom"))));
        bus.on::<Ping>(recorder(&log, "skipped"));

        let err = bus.emit::<Ping>(&9).unwrap_err();
        assert_eq!(err.event, "demo:ping");
        assert_eq!(err.listener_index, 1);
        assert_eq!(err.source.message(), "boom");
        assert_eq!(*log.borrow(), vec!["first:9"]);
    }

    #[test]
    fn registration_during_dispatch_applies_to_next_emit() {
        let bus = Rc::new(EventBus::<Demo>::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let weak_bus = Rc::downgrade(&bus);
        let late = recorder(&log, "late");
        bus.on::<Ping>(listener(move |_: &u32| {
            if let Some(bus) = weak_bus.upgrade() {
                bus.on::<Ping>(Rc::clone(&late));
            }
            Ok(())
        }));

        assert_eq!(bus.emit::<Ping>(&1).unwrap(), 1);
        assert!(log.borrow().is_empty());

        assert_eq!(bus.emit::<Ping>(&2).unwrap(), 2);
        assert_eq!(*log.borrow(), vec!["late:2"]);
    }
}
