//! Republishes state deltas to MQTT.

use std::sync::Arc;

use airco_bridge_framework::{MessageSink, TopicSet};

use crate::codec::WireMode;
use crate::state::{StateChanged, StateStore};

/// Publishes each changed field to its retained state topic.
///
/// The mode topic doubles as the power indicator: while the unit is off it
/// carries `off`, and when the unit turns on it carries the current mode.
#[derive(Clone)]
pub struct ChangePublisher {
    sink: Arc<dyn MessageSink>,
    topics: TopicSet,
}

impl ChangePublisher {
    pub fn new(sink: Arc<dyn MessageSink>, topics: TopicSet) -> Self {
        Self { sink, topics }
    }

    /// Subscribe to the store's change events.
    pub fn attach(self, store: &mut StateStore) {
        store.on_change(move |changed| self.publish_changes(changed));
    }

    pub fn publish_changes(&self, changed: &StateChanged) {
        let StateChanged { delta, current } = changed;

        match delta.running {
            Some(false) => self.publish(&self.topics.mode_state, WireMode::Off.as_str()),
            Some(true) => {
                // Mode unknown until the first successful read
                if let Some(mode) = current.mode {
                    self.publish(&self.topics.mode_state, mode.to_wire().as_str());
                }
            }
            None => {
                if let Some(mode) = delta.mode {
                    self.publish(&self.topics.mode_state, mode.to_wire().as_str());
                }
            }
        }

        if let Some(temperature) = delta.set_temperature {
            self.publish(&self.topics.temperature_state, &temperature.to_string());
        }

        if let Some(temperature) = delta.current_temperature {
            self.publish(&self.topics.current_temperature, &temperature.to_string());
        }

        if let Some(fan_speed) = delta.fan_speed {
            self.publish(&self.topics.fan_mode_state, fan_speed.to_wire().as_str());
        }
    }

    fn publish(&self, topic: &str, payload: &str) {
        self.sink.publish_retained(topic, payload);
    }
}
