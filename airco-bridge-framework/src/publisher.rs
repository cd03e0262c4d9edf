//! State publisher for MQTT.

use rumqttc::{AsyncClient, QoS};

use crate::error::{BridgeError, Result};

/// Destination for retained state messages.
///
/// Publishing is fire-and-forget: implementations log failures instead of
/// returning them, so callers on the state path never block or fail on the
/// broker.
pub trait MessageSink: Send + Sync {
    /// Publish a retained message at QoS 0.
    fn publish_retained(&self, topic: &str, payload: &str);
}

/// Publisher for sending bridge state to MQTT.
///
/// Wraps an MQTT client handle. Publishes are queued on the client's request
/// channel without awaiting, so they can be issued from synchronous event
/// handlers.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }

    /// Get a reference to the MQTT client.
    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    /// Queue a QoS 0 publish.
    pub fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>, retain: bool) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON value to a topic, retained.
    pub fn publish_json<T: serde::Serialize>(&self, topic: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish(topic, payload, true)
    }

    /// Publish and wait until the request is handed to the event loop.
    ///
    /// Used for messages that must precede a disconnect.
    pub async fn publish_flushed(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, true, payload.as_bytes().to_vec())
            .await
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Queue a QoS 0 subscription.
    pub fn subscribe(&self, topic: &str) -> Result<()> {
        self.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| BridgeError::Subscribe {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Subscribe to several topics, logging each failure.
    ///
    /// Returns the number of subscriptions queued.
    pub fn subscribe_all<'a, I>(&self, topics: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut queued = 0;

        for topic in topics {
            match self.subscribe(topic) {
                Ok(()) => {
                    tracing::debug!(topic = %topic, "Subscribed");
                    queued += 1;
                }
                Err(e) => tracing::warn!(error = %e, "Failed to subscribe"),
            }
        }

        queued
    }
}

impl MessageSink for Publisher {
    fn publish_retained(&self, topic: &str, payload: &str) {
        match self.publish(topic, payload.as_bytes().to_vec(), true) {
            Ok(()) => tracing::debug!(topic = %topic, payload = %payload, "Published"),
            Err(e) => tracing::warn!(error = %e, "Failed to publish state"),
        }
    }
}
