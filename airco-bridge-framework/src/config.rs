//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use airco_bridge_framework::{BridgeConfig, MqttConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub id: String,
///     pub mqtt: MqttConfig,
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn device_id(&self) -> &str {
///         &self.id
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT broker configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Unique device id. All topics are rooted here.
    fn device_id(&self) -> &str;

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation,
    /// but keep calling [`validate_common`](Self::validate_common).
    fn validate(&self) -> Result<()> {
        self.validate_common()
    }

    /// Checks shared by every bridge: a usable device id and broker settings.
    fn validate_common(&self) -> Result<()> {
        airco_common::validate_id(self.device_id())
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        self.mqtt()
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn from_json5(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        id: String,
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn device_id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_from_json5_validates() {
        let config = tokio_test::assert_ok!(TestConfig::from_json5(
            r#"{ id: "lg01", mqtt: { host: "broker" } }"#
        ));
        assert_eq!(config.device_id(), "lg01");

        let bad_id = TestConfig::from_json5(r#"{ id: "lg/01", mqtt: { host: "broker" } }"#);
        assert!(matches!(bad_id, Err(BridgeError::ConfigValidation(_))));

        let bad_port =
            TestConfig::from_json5(r#"{ id: "lg01", mqtt: { host: "broker", port: 0 } }"#);
        assert!(matches!(bad_port, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = TestConfig::from_json5("{ id: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
