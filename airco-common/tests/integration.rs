//! Integration tests for airco-common library.

use airco_common::{
    CommandTopic, LogFormat, MqttConfig, TopicSet, mqtt_options, parse_config, validate_id,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BridgeFile {
    id: String,
    mqtt: MqttConfig,
    #[serde(default)]
    logging: airco_common::LoggingConfig,
}

#[test]
fn test_config_to_mqtt_options() {
    let config: BridgeFile = parse_config(
        r#"{
            // comments are allowed in JSON5
            id: "airco-office",
            mqtt: { host: "10.0.0.2", keepalive_secs: 30 },
            logging: { format: "json" },
        }"#,
    )
    .expect("parse failed");

    validate_id(&config.id).expect("id should be valid");
    assert_eq!(config.logging.format, LogFormat::Json);

    let options = mqtt_options(&config.mqtt, &config.id, None).expect("options failed");
    assert_eq!(options.client_id(), "airco-office");
    assert_eq!(options.broker_address(), ("10.0.0.2".to_string(), 1883));
}

#[test]
fn test_topic_roundtrip_for_every_command() {
    let topics = TopicSet::new("airco-office");

    for command in CommandTopic::ALL {
        let topic = topics.command(command).to_string();
        assert!(topic.starts_with("airco-office/command/"));
        assert_eq!(topics.parse_command(&topic), Some(command));
    }
}

#[test]
fn test_state_topics_are_not_commands() {
    let topics = TopicSet::new("airco-office");

    for topic in [
        &topics.availability,
        &topics.mode_state,
        &topics.temperature_state,
        &topics.fan_mode_state,
        &topics.current_temperature,
    ] {
        assert_eq!(topics.parse_command(topic), None, "{} misclassified", topic);
    }
}
