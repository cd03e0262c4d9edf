use std::time::Duration;

use rumqttc::{LastWill, MqttOptions};

use crate::config::MqttConfig;
use crate::error::Result;

/// Build MQTT client options from the broker configuration.
///
/// `default_client_id` is used when the configuration does not name one.
/// The optional `last_will` is registered with the broker on connect.
pub fn mqtt_options(
    config: &MqttConfig,
    default_client_id: &str,
    last_will: Option<LastWill>,
) -> Result<MqttOptions> {
    config.validate()?;

    let client_id = config
        .client_id
        .clone()
        .unwrap_or_else(|| default_client_id.to_string());

    let mut options = MqttOptions::new(&client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(config.keepalive_secs));
    options.set_clean_session(true);

    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    tracing::info!(
        host = %config.host,
        port = config.port,
        client_id = %client_id,
        "Prepared MQTT connection"
    );

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::QoS;

    #[test]
    fn test_client_id_defaults_to_given_id() {
        let config = MqttConfig {
            host: "broker".to_string(),
            ..MqttConfig::default()
        };

        let options = mqtt_options(&config, "airco-living", None).unwrap();
        assert_eq!(options.client_id(), "airco-living");
        assert_eq!(options.broker_address(), ("broker".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn test_configured_client_id_and_will() {
        let config = MqttConfig {
            host: "broker".to_string(),
            username: Some("bridge".to_string()),
            password: Some("secret".to_string()),
            client_id: Some("custom".to_string()),
            ..MqttConfig::default()
        };
        let will = LastWill::new("airco/availability", "Offline", QoS::AtMostOnce, true);

        let options = mqtt_options(&config, "airco-living", Some(will)).unwrap();
        assert_eq!(options.client_id(), "custom");
        let login = options.credentials().expect("credentials set");
        assert_eq!(login.username, "bridge");
        assert_eq!(login.password, "secret");
        assert_eq!(options.last_will().map(|w| w.topic), Some("airco/availability".to_string()));
    }

    #[test]
    fn test_username_without_password() {
        let config = MqttConfig {
            host: "broker".to_string(),
            username: Some("bridge".to_string()),
            ..MqttConfig::default()
        };

        let login = mqtt_options(&config, "airco", None)
            .unwrap()
            .credentials()
            .expect("credentials set");
        assert_eq!(login.username, "bridge");
        assert_eq!(login.password, "");

        let anonymous = MqttConfig {
            host: "broker".to_string(),
            ..MqttConfig::default()
        };
        assert!(mqtt_options(&anonymous, "airco", None).unwrap().credentials().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MqttConfig {
            host: String::new(),
            ..MqttConfig::default()
        };
        assert!(mqtt_options(&config, "airco", None).is_err());
    }
}
