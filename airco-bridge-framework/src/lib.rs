//! Air conditioner bridge framework
//!
//! Common plumbing for bridges that mirror a polled device onto MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (MQTT connect, event loop, shutdown)
//! - [`EventHook`] and [`BridgeEvents`] for typed, synchronous event dispatch
//! - [`Publisher`] and the [`MessageSink`] seam for retained state publishes
//! - [`BridgeArgs`] for common CLI argument parsing
//! - [`StatusPublisher`] for availability reporting with a Last Will
//!
//! # Example
//!
//! ```ignore
//! use airco_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!     runner.connect().await?;
//!
//!     // Spawn device workers
//!     let publisher = runner.publisher();
//!     runner.spawn(my_worker(publisher));
//!
//!     // Run until Ctrl+C or broker disconnect
//!     runner.run().await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
pub mod event;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use event::{BridgeEvents, ConnectedEvent, DisconnectedEvent, EventHook, MessageEvent};
pub use publisher::{MessageSink, Publisher};
pub use runner::{BridgeRunner, ShutdownEvent};
pub use status::{Availability, StatusPublisher, last_will};

// Re-export commonly used types from airco-common
pub use airco_common::{CommandTopic, LogFormat, LoggingConfig, MqttConfig, TopicSet};
