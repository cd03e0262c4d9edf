//! Configuration for the air conditioner bridge.

use std::time::Duration;

use airco_bridge_framework::{BridgeConfig, BridgeError, LoggingConfig, MqttConfig, Result};
use serde::{Deserialize, Serialize};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircoBridgeConfig {
    /// Unique device id. Root of every MQTT topic.
    pub id: String,

    /// Human-readable name, shown in discovery.
    pub name: String,

    /// Model string, shown in discovery.
    #[serde(default = "default_model")]
    pub model: String,

    /// MQTT broker settings
    pub mqtt: MqttConfig,

    /// Modbus device settings
    pub modbus: ModbusConfig,

    /// Home Assistant discovery
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_model() -> String {
    "PMBUSB00A".to_string()
}

/// Modbus connection and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Connection type and address
    pub connection: ConnectionConfig,

    /// Modbus unit/slave ID (1-247)
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Connection timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Delay between powering on and writing the mode, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_unit_id() -> u8 {
    1
}

fn default_poll_interval() -> u64 {
    10
}

fn default_timeout_ms() -> u64 {
    1000
}

fn default_settle_delay_ms() -> u64 {
    3000
}

impl ModbusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Connection configuration (TCP or RTU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// Modbus TCP connection
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port (default: 502)
        #[serde(default = "default_modbus_port")]
        port: u16,
    },
    /// Modbus RTU (serial) connection
    Rtu {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        port: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity: "none", "even", or "odd" (default: "none")
        #[serde(default = "default_parity")]
        parity: String,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_modbus_port() -> u16 {
    502
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

/// Home Assistant MQTT discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Publish the discovery document on connect (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Discovery topic prefix (default: "homeassistant")
    #[serde(default = "default_discovery_prefix")]
    pub prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_discovery_prefix(),
        }
    }
}

impl BridgeConfig for AircoBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn device_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<()> {
        self.validate_common()?;

        if self.name.trim().is_empty() {
            return Err(BridgeError::validation("Device name cannot be empty"));
        }

        let modbus = &self.modbus;
        if modbus.unit_id == 0 || modbus.unit_id > 247 {
            return Err(BridgeError::validation(format!(
                "unit_id must be 1-247, got {}",
                modbus.unit_id
            )));
        }

        if modbus.poll_interval_secs == 0 {
            return Err(BridgeError::validation(
                "poll_interval_secs must be greater than zero",
            ));
        }

        match &modbus.connection {
            ConnectionConfig::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(BridgeError::validation("Modbus host cannot be empty"));
                }
                if *port == 0 {
                    return Err(BridgeError::validation("Modbus port must be 1-65535"));
                }
            }
            ConnectionConfig::Rtu {
                port,
                data_bits,
                parity,
                stop_bits,
                ..
            } => {
                if port.trim().is_empty() {
                    return Err(BridgeError::validation("Serial port cannot be empty"));
                }
                match parity.to_lowercase().as_str() {
                    "none" | "even" | "odd" => {}
                    _ => {
                        return Err(BridgeError::validation(format!(
                            "invalid parity '{}' (use none, even, or odd)",
                            parity
                        )));
                    }
                }
                if !(5..=8).contains(data_bits) {
                    return Err(BridgeError::validation(format!(
                        "data_bits must be 5-8, got {}",
                        data_bits
                    )));
                }
                if !(1..=2).contains(stop_bits) {
                    return Err(BridgeError::validation(format!(
                        "stop_bits must be 1 or 2, got {}",
                        stop_bits
                    )));
                }
            }
        }

        if self.discovery.enabled && self.discovery.prefix.trim().is_empty() {
            return Err(BridgeError::validation(
                "discovery prefix cannot be empty when discovery is enabled",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TCP: &str = r#"{
        id: "airco-living",
        name: "Living room",
        mqtt: { host: "broker" },
        modbus: {
            connection: { type: "tcp", host: "192.168.1.10" }
        }
    }"#;

    #[test]
    fn test_parse_tcp_config() {
        let config = AircoBridgeConfig::from_json5(TCP).unwrap();
        assert_eq!(config.id, "airco-living");
        assert_eq!(config.model, "PMBUSB00A");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.modbus.unit_id, 1);
        assert_eq!(config.modbus.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.modbus.connect_timeout(), Duration::from_millis(1000));
        assert_eq!(config.modbus.settle_delay(), Duration::from_secs(3));
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.prefix, "homeassistant");

        if let ConnectionConfig::Tcp { host, port } = &config.modbus.connection {
            assert_eq!(host, "192.168.1.10");
            assert_eq!(*port, 502); // default
        } else {
            panic!("Expected TCP connection");
        }
    }

    #[test]
    fn test_parse_rtu_config() {
        let json = r#"{
            id: "airco-office",
            name: "Office",
            model: "PQRCVCL0QW",
            mqtt: { host: "broker", username: "u", password: "p" },
            modbus: {
                connection: {
                    type: "rtu",
                    port: "/dev/ttyUSB0",
                    baud_rate: 19200,
                    parity: "even"
                },
                unit_id: 5,
                settle_delay_ms: 500
            },
            discovery: { enabled: false },
            logging: { level: "debug", format: "json" }
        }"#;

        let config = AircoBridgeConfig::from_json5(json).unwrap();
        assert_eq!(config.modbus.unit_id, 5);
        assert_eq!(config.modbus.settle_delay(), Duration::from_millis(500));
        assert!(!config.discovery.enabled);

        if let ConnectionConfig::Rtu {
            port,
            baud_rate,
            parity,
            data_bits,
            stop_bits,
        } = &config.modbus.connection
        {
            assert_eq!(port, "/dev/ttyUSB0");
            assert_eq!(*baud_rate, 19200);
            assert_eq!(parity, "even");
            assert_eq!(*data_bits, 8);
            assert_eq!(*stop_bits, 1);
        } else {
            panic!("Expected RTU connection");
        }
    }

    fn with(modbus: &str) -> String {
        format!(
            r#"{{ id: "lg01", name: "LG", mqtt: {{ host: "broker" }}, modbus: {} }}"#,
            modbus
        )
    }

    fn rejected(json: &str) -> bool {
        matches!(
            AircoBridgeConfig::from_json5(json),
            Err(BridgeError::ConfigValidation(_))
        )
    }

    #[test]
    fn test_validate_unit_id() {
        assert!(rejected(&with(
            r#"{ connection: { type: "tcp", host: "h" }, unit_id: 0 }"#
        )));
        assert!(rejected(&with(
            r#"{ connection: { type: "tcp", host: "h" }, unit_id: 248 }"#
        )));
        assert!(!rejected(&with(
            r#"{ connection: { type: "tcp", host: "h" }, unit_id: 247 }"#
        )));
    }

    #[test]
    fn test_validate_poll_interval() {
        assert!(rejected(&with(
            r#"{ connection: { type: "tcp", host: "h" }, poll_interval_secs: 0 }"#
        )));
    }

    #[test]
    fn test_validate_parity() {
        assert!(rejected(&with(
            r#"{ connection: { type: "rtu", port: "/dev/ttyS0", parity: "mark" } }"#
        )));
        assert!(!rejected(&with(
            r#"{ connection: { type: "rtu", port: "/dev/ttyS0", parity: "ODD" } }"#
        )));
    }

    #[test]
    fn test_validate_identity() {
        let json = TCP.replace("airco-living", "airco/living");
        assert!(rejected(&json));

        let json = TCP.replace("Living room", " ");
        assert!(rejected(&json));
    }

    #[test]
    fn test_validate_mqtt_port() {
        let json = TCP.replace(r#"host: "broker""#, r#"host: "broker", port: 0"#);
        assert!(rejected(&json));
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = AircoBridgeConfig::from_json5(include_str!("../airco.example.json5"))
            .expect("example config should load");
        assert_eq!(config.id, "airco-living");
        assert_eq!(config.mqtt.username, None);
    }

    #[test]
    fn test_missing_modbus_section() {
        let result =
            AircoBridgeConfig::from_json5(r#"{ id: "lg01", name: "LG", mqtt: { host: "b" } }"#);
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
