//! Bridge availability reporting.

use rumqttc::{LastWill, QoS};

use crate::Result;
use crate::publisher::Publisher;

/// Availability of the bridged device, as seen by MQTT consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    /// Payload published on the availability topic.
    pub fn payload(&self) -> &'static str {
        match self {
            Availability::Online => "Online",
            Availability::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.payload())
    }
}

/// Last Will that marks the device offline if the bridge dies unannounced.
pub fn last_will(availability_topic: &str) -> LastWill {
    LastWill::new(
        availability_topic,
        Availability::Offline.payload(),
        QoS::AtMostOnce,
        true,
    )
}

/// Helper to publish availability on startup and shutdown.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    publisher: Publisher,
    topic: String,
}

impl StatusPublisher {
    /// Create a new status publisher for an availability topic.
    pub fn new(publisher: Publisher, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    /// The availability topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish retained "Online".
    pub fn publish_online(&self) -> Result<()> {
        tracing::info!(topic = %self.topic, "Publishing availability: online");
        self.publisher
            .publish(&self.topic, Availability::Online.payload(), true)
    }

    /// Publish retained "Offline", waiting until it is queued ahead of a disconnect.
    pub async fn publish_offline(&self) -> Result<()> {
        tracing::info!(topic = %self.topic, "Publishing availability: offline");
        self.publisher
            .publish_flushed(&self.topic, Availability::Offline.payload())
            .await
    }
}
