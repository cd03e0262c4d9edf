//! MQTT bridge for LG air conditioners with a Modbus interface.
//!
//! The bridge polls the unit's registers (TCP or RTU/serial), mirrors its
//! state onto retained MQTT topics, and turns commands received over MQTT
//! into register writes.
//!
//! # Topics
//!
//! ```text
//! <id>/command/{power,mode,temperature,fan-mode}   inbound
//! <id>/state/{mode,temperature,fan-mode}           retained state
//! <id>/current-temperature                         retained state
//! <id>/availability                                Online / Offline
//! ```
//!
//! # Register map
//!
//! | Address | Kind | Field |
//! |---|---|---|
//! | 0 | coil | running |
//! | 0 | holding | mode |
//! | 1 | holding | set temperature (×10) |
//! | 2 | input | current temperature (×10) |
//! | 14 | holding | fan speed |

pub mod codec;
pub mod commands;
pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod poller;
pub mod publisher;
pub mod state;

pub use commands::{CommandError, CommandTranslator};
pub use config::AircoBridgeConfig;
pub use controller::{Controller, SharedController, WRITE_SUPPRESSED_POLLS};
pub use device::{DeviceError, ModbusDevice, Register, RegisterTransport};
pub use poller::{PollOutcome, PollScheduler, SchedulerState};
pub use publisher::ChangePublisher;
pub use state::{DeviceState, StateChanged, StateStore, Temperature};
