//! Home Assistant MQTT discovery document.
//!
//! Published retained to `<prefix>/climate/lg-<id>/config` so Home Assistant
//! creates a climate entity wired to the bridge's topics.

use airco_bridge_framework::{Availability, TopicSet};
use serde::Serialize;

use crate::codec::{WireFanSpeed, WireMode};
use crate::config::AircoBridgeConfig;

pub const MIN_TEMP: u8 = 18;
pub const MAX_TEMP: u8 = 30;

/// Device registry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryDevice {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

/// Climate entity discovery payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClimateDiscovery {
    pub name: String,
    pub unique_id: String,
    pub availability_topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
    pub power_command_topic: String,
    pub mode_command_topic: String,
    pub temperature_command_topic: String,
    pub fan_mode_command_topic: String,
    pub mode_state_topic: String,
    pub temperature_state_topic: String,
    pub fan_mode_state_topic: String,
    pub current_temperature_topic: String,
    pub modes: Vec<&'static str>,
    pub fan_modes: Vec<&'static str>,
    pub min_temp: u8,
    pub max_temp: u8,
    pub precision: f32,
    pub device: DiscoveryDevice,
}

impl ClimateDiscovery {
    /// Build the document for a configured device.
    pub fn new(config: &AircoBridgeConfig, topics: &TopicSet, sw_version: &str) -> Self {
        Self {
            name: config.name.clone(),
            unique_id: config.id.clone(),
            availability_topic: topics.availability.clone(),
            payload_available: Availability::Online.payload(),
            payload_not_available: Availability::Offline.payload(),
            power_command_topic: topics.power_command.clone(),
            mode_command_topic: topics.mode_command.clone(),
            temperature_command_topic: topics.temperature_command.clone(),
            fan_mode_command_topic: topics.fan_mode_command.clone(),
            mode_state_topic: topics.mode_state.clone(),
            temperature_state_topic: topics.temperature_state.clone(),
            fan_mode_state_topic: topics.fan_mode_state.clone(),
            current_temperature_topic: topics.current_temperature.clone(),
            modes: WireMode::ALL.iter().map(|m| m.as_str()).collect(),
            fan_modes: WireFanSpeed::ALL.iter().map(|f| f.as_str()).collect(),
            min_temp: MIN_TEMP,
            max_temp: MAX_TEMP,
            precision: 0.1,
            device: DiscoveryDevice {
                identifiers: vec![format!("lg-{}", config.id)],
                manufacturer: "LG".to_string(),
                model: config.model.clone(),
                name: format!("LG {}", config.name),
                sw_version: sw_version.to_string(),
            },
        }
    }
}

/// Topic the discovery document is published to.
pub fn discovery_topic(prefix: &str, id: &str) -> String {
    format!("{}/climate/lg-{}/config", prefix, id)
}
