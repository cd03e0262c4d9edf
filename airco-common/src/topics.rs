use crate::error::{Error, Result};

/// Inbound command topic categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTopic {
    /// `<id>/command/power`
    Power,
    /// `<id>/command/mode`
    Mode,
    /// `<id>/command/temperature`
    Temperature,
    /// `<id>/command/fan-mode`
    FanMode,
}

impl CommandTopic {
    /// All command topics, in subscription order.
    pub const ALL: [CommandTopic; 4] = [
        CommandTopic::Power,
        CommandTopic::Mode,
        CommandTopic::Temperature,
        CommandTopic::FanMode,
    ];

    /// Topic suffix below the device id.
    pub fn suffix(&self) -> &'static str {
        match self {
            CommandTopic::Power => "command/power",
            CommandTopic::Mode => "command/mode",
            CommandTopic::Temperature => "command/temperature",
            CommandTopic::FanMode => "command/fan-mode",
        }
    }
}

/// The fixed topic map of one bridged device.
///
/// Every topic is rooted at the configured unique device id:
/// `<id>/command/<what>` for inbound commands and `<id>/state/<what>`,
/// `<id>/current-temperature`, `<id>/availability` for retained outbound state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    root: String,
    pub availability: String,
    pub power_command: String,
    pub mode_command: String,
    pub temperature_command: String,
    pub fan_mode_command: String,
    pub mode_state: String,
    pub temperature_state: String,
    pub fan_mode_state: String,
    pub current_temperature: String,
}

impl TopicSet {
    /// Build the topic map for a device id.
    ///
    /// # Example
    /// ```
    /// use airco_common::topics::TopicSet;
    ///
    /// let topics = TopicSet::new("airco-living");
    /// assert_eq!(topics.mode_state, "airco-living/state/mode");
    /// assert_eq!(topics.fan_mode_command, "airco-living/command/fan-mode");
    /// ```
    pub fn new(id: &str) -> Self {
        let topic = |suffix: &str| format!("{}/{}", id, suffix);

        Self {
            root: id.to_string(),
            availability: topic("availability"),
            power_command: topic(CommandTopic::Power.suffix()),
            mode_command: topic(CommandTopic::Mode.suffix()),
            temperature_command: topic(CommandTopic::Temperature.suffix()),
            fan_mode_command: topic(CommandTopic::FanMode.suffix()),
            mode_state: topic("state/mode"),
            temperature_state: topic("state/temperature"),
            fan_mode_state: topic("state/fan-mode"),
            current_temperature: topic("current-temperature"),
        }
    }

    /// The device id all topics are rooted at.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full topic for a command category.
    pub fn command(&self, command: CommandTopic) -> &str {
        match command {
            CommandTopic::Power => &self.power_command,
            CommandTopic::Mode => &self.mode_command,
            CommandTopic::Temperature => &self.temperature_command,
            CommandTopic::FanMode => &self.fan_mode_command,
        }
    }

    /// The four inbound topics the bridge subscribes to.
    pub fn command_topics(&self) -> [&str; 4] {
        CommandTopic::ALL.map(|c| self.command(c))
    }

    /// Classify an inbound topic. Returns `None` for topics that are not ours.
    pub fn parse_command(&self, topic: &str) -> Option<CommandTopic> {
        CommandTopic::ALL
            .into_iter()
            .find(|c| self.command(*c) == topic)
    }
}

/// Check that a device id can be used as a topic root.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Topic("device id cannot be empty".to_string()));
    }

    if let Some(c) = id.chars().find(|c| matches!(c, '/' | '+' | '#' | '\0')) {
        return Err(Error::Topic(format!(
            "device id '{}' contains reserved character '{}'",
            id,
            c.escape_default()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_layout() {
        let topics = TopicSet::new("lg01");

        assert_eq!(topics.root(), "lg01");
        assert_eq!(topics.availability, "lg01/availability");
        assert_eq!(topics.power_command, "lg01/command/power");
        assert_eq!(topics.mode_command, "lg01/command/mode");
        assert_eq!(topics.temperature_command, "lg01/command/temperature");
        assert_eq!(topics.fan_mode_command, "lg01/command/fan-mode");
        assert_eq!(topics.mode_state, "lg01/state/mode");
        assert_eq!(topics.temperature_state, "lg01/state/temperature");
        assert_eq!(topics.fan_mode_state, "lg01/state/fan-mode");
        assert_eq!(topics.current_temperature, "lg01/current-temperature");
    }

    #[test]
    fn test_parse_command() {
        let topics = TopicSet::new("lg01");

        assert_eq!(
            topics.parse_command("lg01/command/power"),
            Some(CommandTopic::Power)
        );
        assert_eq!(
            topics.parse_command("lg01/command/fan-mode"),
            Some(CommandTopic::FanMode)
        );
        assert_eq!(topics.parse_command("lg01/state/mode"), None);
        assert_eq!(topics.parse_command("lg02/command/power"), None);
    }

    #[test]
    fn test_command_topics_order() {
        let topics = TopicSet::new("x");
        assert_eq!(
            topics.command_topics(),
            [
                "x/command/power",
                "x/command/mode",
                "x/command/temperature",
                "x/command/fan-mode"
            ]
        );
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("airco-living").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a+").is_err());
        assert!(validate_id("#").is_err());
    }
}
