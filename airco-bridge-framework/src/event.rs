//! Typed event hooks.
//!
//! An [`EventHook`] is a registry of callbacks for one event type. Handlers are
//! registered during setup and invoked synchronously, in registration order,
//! every time the event fires. [`BridgeEvents`] groups the hooks the MQTT side
//! of a bridge fires.
//!
//! # Example
//!
//! ```
//! use airco_bridge_framework::event::EventHook;
//! use std::sync::{Arc, Mutex};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let mut hook = EventHook::<u32>::new();
//!
//! let sink = seen.clone();
//! hook.add_handler(move |value| sink.lock().unwrap().push(*value));
//!
//! hook.fire(&7);
//! assert_eq!(*seen.lock().unwrap(), vec![7]);
//! ```

use std::fmt;

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Callback registry for events of type `T`.
pub struct EventHook<T> {
    handlers: Vec<Handler<T>>,
}

impl<T> EventHook<T> {
    /// Create an empty hook.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler. Handlers run in the order they were added.
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Invoke every handler with the event.
    pub fn fire(&self, event: &T) {
        for handler in &self.handlers {
            handler(event);
        }
    }

    /// Remove all handlers.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<T> Default for EventHook<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventHook<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHook")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// The broker accepted our connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedEvent {
    /// Whether the broker resumed a previous session.
    pub session_present: bool,
}

/// The broker connection was lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectedEvent {
    /// Human-readable cause reported by the MQTT client.
    pub reason: String,
}

/// An inbound publish on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub topic: String,
    /// Payload decoded as UTF-8 (lossy).
    pub payload: String,
    pub retain: bool,
}

impl MessageEvent {
    /// Build an event from a raw MQTT payload.
    pub fn from_bytes(topic: impl Into<String>, payload: &[u8], retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retain,
        }
    }
}

/// Hooks fired by the MQTT side of a bridge.
#[derive(Debug, Default)]
pub struct BridgeEvents {
    pub on_connected: EventHook<ConnectedEvent>,
    pub on_message: EventHook<MessageEvent>,
    pub on_disconnect: EventHook<DisconnectedEvent>,
}

impl BridgeEvents {
    /// Create a set of empty hooks.
    pub fn new() -> Self {
        Self::default()
    }
}
