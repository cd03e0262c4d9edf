//! MQTT bridge for LG air conditioners with a Modbus interface.
//!
//! Polls the unit over Modbus (TCP or RTU/serial), publishes its state to
//! MQTT and applies commands received from MQTT.

use std::sync::Arc;

use airco_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner, MessageSink};
use anyhow::{Context, Result};
use mqtt_bridge_airco::config::AircoBridgeConfig;
use mqtt_bridge_airco::discovery::{ClimateDiscovery, discovery_topic};
use mqtt_bridge_airco::{
    ChangePublisher, CommandTranslator, Controller, ModbusDevice, PollScheduler, StateStore,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = BridgeArgs::parse_with_default("airco.json5");

    let config = AircoBridgeConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    let mut runner = BridgeRunner::new_with_args("mqtt-bridge-airco", config, Some(&args))?;
    info!("Loaded configuration from {:?}", args.config);

    let topics = runner.topics().clone();
    let publisher = runner.publisher();
    let modbus = runner.config().modbus.clone();

    // Device first: without it there is nothing to bridge
    let device = ModbusDevice::new(
        modbus.connection.clone(),
        modbus.unit_id,
        modbus.connect_timeout(),
    );
    let sink: Arc<dyn MessageSink> = Arc::new(publisher.clone());
    let mut store = StateStore::new();
    ChangePublisher::new(sink.clone(), topics.clone()).attach(&mut store);

    let mut controller = Controller::new(device, store);
    if let Err(e) = controller.connect().await {
        error!(error = %e, "Failed to connect to Modbus device");
        runner.stop("Modbus connection failed").await;
        return Err(e).context("Failed to connect to Modbus device");
    }
    let controller = controller.shared();

    let discovery = runner.config().discovery.enabled.then(|| {
        (
            discovery_topic(&runner.config().discovery.prefix, topics.root()),
            ClimateDiscovery::new(runner.config(), &topics, runner.version()),
        )
    });

    // (Re)subscribe and announce on every ConnAck
    {
        let publisher = publisher.clone();
        let topics = topics.clone();
        runner.events_mut().on_connected.add_handler(move |event| {
            let queued = publisher.subscribe_all(topics.command_topics());
            debug!(queued, session_present = event.session_present, "Subscribed to command topics");

            if let Some((topic, document)) = &discovery {
                match publisher.publish_json(topic, document) {
                    Ok(()) => info!(topic = %topic, "Published discovery document"),
                    Err(e) => warn!(error = %e, "Failed to publish discovery document"),
                }
            }
        });
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    runner.events_mut().on_message.add_handler(move |message| {
        if command_tx.send(message.clone()).is_err() {
            debug!(topic = %message.topic, "Command worker stopped, dropping message");
        }
    });

    if let Err(e) = runner.connect().await {
        controller.lock().await.disconnect().await;
        return Err(e).context("Failed to connect to MQTT broker");
    }

    let scheduler = PollScheduler::new(controller.clone(), modbus.poll_interval());
    if let Some(handle) = scheduler.start() {
        runner.spawn(async move {
            if let Err(e) = handle.await {
                error!(error = %e, "Poll scheduler panicked");
            }
        });
    }
    let stop_polling = scheduler.stopper();
    runner.on_shutdown(move |event| {
        info!(reason = %event.reason, "Stopping poll scheduler");
        stop_polling();
    });

    let translator = CommandTranslator::new(
        controller.clone(),
        sink,
        topics.clone(),
        modbus.settle_delay(),
    );
    let shutdown = runner.shutdown_signal();
    runner.spawn(translator.run(command_rx, shutdown));

    info!(
        device = %topics.root(),
        interval_secs = modbus.poll_interval_secs,
        "Air conditioner bridge running"
    );

    let result = runner.run().await;

    controller.lock().await.disconnect().await;
    info!("Modbus connection closed");

    result.context("Bridge stopped with an error")
}
