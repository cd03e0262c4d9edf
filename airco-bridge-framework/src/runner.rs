//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Packet};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use airco_common::{LoggingConfig, TopicSet, init_tracing, mqtt_options};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::event::{BridgeEvents, ConnectedEvent, DisconnectedEvent, EventHook, MessageEvent};
use crate::publisher::Publisher;
use crate::status::{StatusPublisher, last_will};

/// Capacity of the MQTT client's request queue.
const REQUEST_CAPACITY: usize = 64;

/// How long spawned workers get to finish after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long the event loop gets to flush the final messages.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Fired once when the bridge begins shutting down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownEvent {
    /// Why the bridge is stopping.
    pub reason: String,
}

/// Bridge runner that manages the lifecycle of a device bridge.
///
/// Handles:
/// - Logging initialization
/// - MQTT connection, with a retained "Offline" Last Will
/// - Driving the MQTT event loop and firing [`BridgeEvents`]
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C, fail-fast shutdown on broker disconnect
///
/// # Example
///
/// ```ignore
/// use airco_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
///     runner.events_mut().on_message.add_handler(|msg| println!("{}", msg.topic));
///     runner.connect().await?;
///
///     runner.spawn(async move {
///         // Worker logic here
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Topic map rooted at the device id.
    topics: TopicSet,
    /// Publisher for state messages.
    publisher: Publisher,
    /// Availability publisher.
    status: StatusPublisher,
    /// Hooks to hand to the event loop on connect.
    events: BridgeEvents,
    /// Hooks run when shutdown begins.
    shutdown_hooks: EventHook<ShutdownEvent>,
    /// Event loop, until `connect` moves it into its task.
    event_loop: Option<EventLoop>,
    /// Task driving the event loop.
    loop_task: Option<JoinHandle<()>>,
    /// Spawned tasks.
    tasks: Vec<JoinHandle<()>>,
    /// Set once shutdown starts.
    shutdown_tx: watch::Sender<bool>,
    /// Set when the broker connection is lost.
    fatal_tx: watch::Sender<Option<String>>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    ///
    /// This will:
    /// 1. Initialize logging from config, with the CLI log level taking precedence
    /// 2. Build the MQTT client (no network traffic until [`connect`](Self::connect))
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        // Initialize logging with optional CLI override
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let topics = TopicSet::new(config.device_id());
        let options = mqtt_options(
            config.mqtt(),
            config.device_id(),
            Some(last_will(&topics.availability)),
        )?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

        let publisher = Publisher::new(client);
        let status = StatusPublisher::new(publisher.clone(), topics.availability.clone());
        let (shutdown_tx, _) = watch::channel(false);
        let (fatal_tx, _) = watch::channel(None);

        Ok(Self {
            name,
            version,
            config,
            topics,
            publisher,
            status,
            events: BridgeEvents::new(),
            shutdown_hooks: EventHook::new(),
            event_loop: Some(event_loop),
            loop_task: None,
            tasks: Vec::new(),
            shutdown_tx,
            fatal_tx,
        })
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get the device topic map.
    pub fn topics(&self) -> &TopicSet {
        &self.topics
    }

    /// Get a clone of the publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Event hooks. Handlers must be registered before [`connect`](Self::connect).
    pub fn events_mut(&mut self) -> &mut BridgeEvents {
        &mut self.events
    }

    /// Register a handler that runs when shutdown begins.
    pub fn on_shutdown<F>(&mut self, handler: F)
    where
        F: Fn(&ShutdownEvent) + Send + Sync + 'static,
    {
        self.shutdown_hooks.add_handler(handler);
    }

    /// A receiver that flips to `true` once shutdown begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Connect to the broker and start the event loop.
    ///
    /// Waits for the broker's CONNACK; any failure here is fatal. On success
    /// the connect hooks fire, "Online" is published, and a task takes over
    /// the event loop. A later connection loss fires the disconnect hooks and
    /// makes [`run`](Self::run) return an error.
    pub async fn connect(&mut self) -> Result<()> {
        let mut event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| BridgeError::MqttConnection("already connected".to_string()))?;

        let session_present = wait_for_connack(&mut event_loop).await?;
        tracing::info!(bridge = %self.name, session_present, "Connected to MQTT broker");

        let fatal = self.fatal_tx.clone();
        self.events.on_disconnect.add_handler(move |event| {
            fatal.send_replace(Some(event.reason.clone()));
        });

        let events = Arc::new(std::mem::take(&mut self.events));
        events
            .on_connected
            .fire(&ConnectedEvent { session_present });

        self.status.publish_online()?;

        let shutdown = self.shutdown_tx.subscribe();
        self.loop_task = Some(tokio::spawn(drive_event_loop(event_loop, events, shutdown)));

        Ok(())
    }

    /// Spawn a worker task.
    ///
    /// The task is given a grace period on shutdown, then aborted.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push(handle);
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received or the broker connection drops.
    ///
    /// Either way the bridge shuts down in order: shutdown hooks, worker
    /// grace period, "Offline", MQTT disconnect. A lost connection is
    /// reported as [`BridgeError::MqttDisconnected`].
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        let mut fatal = self.fatal_tx.subscribe();

        let outcome = tokio::select! {
            received = wait_for_signal() => {
                tracing::info!(bridge = %self.name, signal = received, "Received shutdown signal");
                Ok(())
            }
            reason = wait_for_fatal(&mut fatal) => {
                tracing::error!(bridge = %self.name, reason = %reason, "MQTT connection lost");
                Err(BridgeError::MqttDisconnected(reason))
            }
        };

        let reason = match &outcome {
            Ok(()) => "signal".to_string(),
            Err(e) => e.to_string(),
        };
        self.close(reason).await;

        outcome
    }

    /// Shut down without waiting for a signal, e.g. after a fatal startup error.
    pub async fn stop(mut self, reason: impl Into<String>) {
        self.close(reason.into()).await;
    }

    async fn close(&mut self, reason: String) {
        self.shutdown_tx.send_replace(true);
        self.shutdown_hooks.fire(&ShutdownEvent { reason });

        // Let workers finish in-flight work
        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        for task in &mut self.tasks {
            if tokio::time::timeout_at(deadline, &mut *task).await.is_err() {
                task.abort();
            }
        }

        if let Some(loop_task) = self.loop_task.take() {
            if let Err(e) = self.status.publish_offline().await {
                tracing::warn!(error = %e, "Failed to publish offline status");
            }
            if let Err(e) = self.publisher.client().disconnect().await {
                tracing::warn!(error = %e, "Error disconnecting from MQTT broker");
            }
            if tokio::time::timeout(FLUSH_TIMEOUT, loop_task).await.is_err() {
                tracing::warn!("MQTT event loop did not stop in time");
            }
        }

        tracing::info!(bridge = %self.name, "Goodbye!");
    }
}

/// Poll the event loop until the broker acknowledges the connection.
async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<bool> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(ack.session_present)
                } else {
                    Err(BridgeError::MqttConnection(format!(
                        "connection refused: {:?}",
                        ack.code
                    )))
                };
            }
            Ok(_) => {}
            Err(e) => return Err(BridgeError::MqttConnection(e.to_string())),
        }
    }
}

/// Drive the MQTT event loop, firing bridge events, until the connection ends.
async fn drive_event_loop(
    mut event_loop: EventLoop,
    events: Arc<BridgeEvents>,
    shutdown: watch::Receiver<bool>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message =
                    MessageEvent::from_bytes(publish.topic.clone(), &publish.payload, publish.retain);
                tracing::debug!(
                    topic = %message.topic,
                    payload = %message.payload,
                    retain = message.retain,
                    "Received MQTT message"
                );
                events.on_message.fire(&message);
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                events.on_connected.fire(&ConnectedEvent {
                    session_present: ack.session_present,
                });
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                events.on_disconnect.fire(&DisconnectedEvent {
                    reason: "broker closed the session".to_string(),
                });
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if *shutdown.borrow() {
                    tracing::debug!(error = %e, "MQTT event loop closed");
                } else {
                    events.on_disconnect.fire(&DisconnectedEvent {
                        reason: e.to_string(),
                    });
                }
                break;
            }
        }
    }
}

/// Resolve once Ctrl+C (or SIGTERM on Unix) arrives.
async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = signal::ctrl_c() => "SIGINT",
                    _ = term.recv() => "SIGTERM",
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await
    }
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

/// Resolve with the reason once a fatal disconnect has been recorded.
async fn wait_for_fatal(fatal: &mut watch::Receiver<Option<String>>) -> String {
    loop {
        if let Some(reason) = fatal.borrow_and_update().clone() {
            return reason;
        }
        if fatal.changed().await.is_err() {
            return "event loop stopped".to_string();
        }
    }
}
