//! Inbound MQTT commands to device writes.

use std::sync::Arc;
use std::time::Duration;

use airco_bridge_framework::{CommandTopic, MessageEvent, MessageSink, TopicSet};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::codec::{Mode, UnknownValue, WireFanSpeed, WireMode};
use crate::controller::SharedController;
use crate::device::RegisterTransport;
use crate::state::{Temperature, TemperatureError, format_degrees, parse_degrees};

/// A command that was not acted on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("topic '{0}' is not a command topic")]
    UnknownTopic(String),
    #[error("unsupported power payload '{0}' (expected ON or OFF)")]
    InvalidPower(String),
    #[error("invalid temperature: {0}")]
    Temperature(#[from] TemperatureError),
    #[error(transparent)]
    Value(#[from] UnknownValue),
}

/// Turns command messages into ordered device writes and local echoes.
///
/// Every write goes through the shared controller, which also suppresses
/// the next few polls. Echoes are published straight away so consumers see
/// the requested value before the device catches up.
pub struct CommandTranslator<D> {
    controller: SharedController<D>,
    sink: Arc<dyn MessageSink>,
    topics: TopicSet,
    settle_delay: Duration,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<D: RegisterTransport> CommandTranslator<D> {
    pub fn new(
        controller: SharedController<D>,
        sink: Arc<dyn MessageSink>,
        topics: TopicSet,
        settle_delay: Duration,
    ) -> Self {
        Self {
            controller,
            sink,
            topics,
            settle_delay,
            shutdown: None,
        }
    }

    /// Dispatch one inbound message by topic.
    ///
    /// Device write failures are logged; only rejected payloads are errors.
    pub async fn handle(&self, topic: &str, payload: &str) -> Result<(), CommandError> {
        let command = self
            .topics
            .parse_command(topic)
            .ok_or_else(|| CommandError::UnknownTopic(topic.to_string()))?;

        debug!(command = ?command, payload = %payload, "Processing command");

        match command {
            CommandTopic::Power => self.power(payload).await,
            CommandTopic::Temperature => self.temperature(payload).await,
            CommandTopic::Mode => self.mode(payload).await.map(|_| ()),
            CommandTopic::FanMode => self.fan_mode(payload).await,
        }
    }

    /// `ON` powers the unit on, `OFF` powers it off and echoes mode `off`.
    pub async fn power(&self, payload: &str) -> Result<(), CommandError> {
        let running = match payload.trim() {
            "ON" => true,
            "OFF" => false,
            other => return Err(CommandError::InvalidPower(other.to_string())),
        };

        self.write_running(running).await;

        if !running {
            self.echo_mode(WireMode::Off);
        }
        Ok(())
    }

    /// Write the target temperature and echo the requested value.
    ///
    /// The register takes tenths of a degree; the echo carries the payload's
    /// own precision.
    pub async fn temperature(&self, payload: &str) -> Result<(), CommandError> {
        let degrees = parse_degrees(payload)?;
        let value = Temperature::from_degrees(degrees)?;

        let result = self.controller.lock().await.write_set_temperature(value).await;
        if let Err(e) = result {
            error!(error = %e, temperature = %value, "Failed to write set temperature");
        }

        self.sink
            .publish_retained(&self.topics.temperature_state, &format_degrees(degrees));
        Ok(())
    }

    /// Change the operating mode.
    ///
    /// `off` powers the unit down. Any other mode powers it on, echoes the
    /// mode, and writes the mode register after the settle delay so the
    /// unit's power-on sequence does not restore its previous mode over ours.
    /// Returns the deferred write's handle.
    pub async fn mode(&self, payload: &str) -> Result<Option<JoinHandle<()>>, CommandError> {
        let wire: WireMode = payload.trim().parse()?;

        let Some(mode) = wire.to_device() else {
            self.write_running(false).await;
            self.echo_mode(WireMode::Off);
            return Ok(None);
        };

        self.write_running(true).await;
        self.echo_mode(wire);

        Ok(Some(self.write_mode_later(mode)))
    }

    /// Write the fan speed and echo it.
    pub async fn fan_mode(&self, payload: &str) -> Result<(), CommandError> {
        let wire: WireFanSpeed = payload.trim().parse()?;

        let result = self
            .controller
            .lock()
            .await
            .write_fan_speed(wire.to_device())
            .await;
        if let Err(e) = result {
            error!(error = %e, fan_speed = %wire, "Failed to write fan speed");
        }

        self.sink
            .publish_retained(&self.topics.fan_mode_state, wire.as_str());
        Ok(())
    }

    /// Drain inbound messages in arrival order until shutdown.
    ///
    /// Deferred mode writes still waiting out the settle delay when shutdown
    /// begins are dropped.
    pub async fn run(
        mut self,
        mut messages: mpsc::UnboundedReceiver<MessageEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Command worker started");
        self.shutdown = Some(shutdown.clone());

        loop {
            let message = tokio::select! {
                message = messages.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
                _ = shutdown.wait_for(|stop| *stop) => break,
            };

            if let Err(e) = self.handle(&message.topic, &message.payload).await {
                warn!(topic = %message.topic, error = %e, "Rejected command");
            }
        }

        debug!("Command worker stopped");
    }

    async fn write_running(&self, running: bool) {
        let result = self.controller.lock().await.write_running(running).await;
        if let Err(e) = result {
            error!(error = %e, running, "Failed to write running state");
        }
    }

    fn echo_mode(&self, mode: WireMode) {
        self.sink
            .publish_retained(&self.topics.mode_state, mode.as_str());
    }

    fn write_mode_later(&self, mode: Mode) -> JoinHandle<()> {
        let controller = self.controller.clone();
        let delay = self.settle_delay;
        let mut shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let stopping = async {
                match shutdown.as_mut() {
                    // A dropped sender also means the bridge is going away
                    Some(rx) => drop(rx.wait_for(|stop| *stop).await),
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopping => {
                    warn!(mode = ?mode, "Shutting down, dropping pending mode write");
                    return;
                }
            }

            let mut controller = controller.lock().await;
            if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                warn!(mode = ?mode, "Shutting down, dropping pending mode write");
                return;
            }
            if let Err(e) = controller.write_mode(mode).await {
                error!(error = %e, mode = ?mode, "Failed to write mode");
            }
        })
    }
}
