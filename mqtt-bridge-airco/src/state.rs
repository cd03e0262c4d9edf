//! Last-known device state and change detection.

use std::fmt;
use std::str::FromStr;

use airco_bridge_framework::EventHook;
use thiserror::Error;

use crate::codec::{FanSpeed, Mode};

/// A temperature payload that cannot be written to the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemperatureError {
    #[error("'{0}' is not a decimal number")]
    Invalid(String),
    #[error("{0} is outside the register range")]
    OutOfRange(String),
}

/// A temperature in tenths of a degree, as the device stores it.
///
/// Kept as an integer so that comparisons in the diff are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temperature(i16);

impl Temperature {
    /// Build from tenths of a degree.
    pub const fn from_tenths(tenths: i16) -> Self {
        Self(tenths)
    }

    /// Tenths of a degree.
    pub const fn tenths(self) -> i16 {
        self.0
    }

    /// Decode a raw register value (signed, tenths of a degree).
    pub fn from_register(raw: u16) -> Self {
        Self(raw as i16)
    }

    /// Encode for a register write.
    pub fn to_register(self) -> u16 {
        self.0 as u16
    }

    /// Round a value in degrees to device precision.
    pub fn from_degrees(degrees: f64) -> Result<Self, TemperatureError> {
        if !degrees.is_finite() {
            return Err(TemperatureError::Invalid(degrees.to_string()));
        }

        let tenths = (degrees * 10.0).round();
        if tenths < f64::from(i16::MIN) || tenths > f64::from(i16::MAX) {
            return Err(TemperatureError::OutOfRange(degrees.to_string()));
        }

        Ok(Self(tenths as i16))
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

impl FromStr for Temperature {
    type Err = TemperatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_degrees(parse_degrees(s)?)
    }
}

/// Parse a decimal temperature payload in degrees.
pub fn parse_degrees(s: &str) -> Result<f64, TemperatureError> {
    s.trim()
        .parse()
        .map_err(|_| TemperatureError::Invalid(s.to_string()))
}

/// Render degrees as given, keeping one decimal for whole numbers.
pub fn format_degrees(degrees: f64) -> String {
    if degrees.fract() == 0.0 {
        format!("{:.1}", degrees)
    } else {
        degrees.to_string()
    }
}

/// Sparse snapshot of the unit's operating state.
///
/// `None` means the field has not been observed yet. It never stands for
/// "off" or zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceState {
    pub running: Option<bool>,
    pub current_temperature: Option<Temperature>,
    pub set_temperature: Option<Temperature>,
    pub mode: Option<Mode>,
    pub fan_speed: Option<FanSpeed>,
}

fn merge_field<T: PartialEq + Copy>(current: &mut Option<T>, incoming: Option<T>) -> Option<T> {
    let value = incoming?;
    if *current == Some(value) {
        return None;
    }
    *current = Some(value);
    Some(value)
}

impl DeviceState {
    /// Merge a partial observation into this state.
    ///
    /// Known fields in `incoming` overwrite ours. Returns the delta: the
    /// fields whose value actually changed, holding their new value.
    pub fn merge(&mut self, incoming: &DeviceState) -> DeviceState {
        DeviceState {
            running: merge_field(&mut self.running, incoming.running),
            current_temperature: merge_field(
                &mut self.current_temperature,
                incoming.current_temperature,
            ),
            set_temperature: merge_field(&mut self.set_temperature, incoming.set_temperature),
            mode: merge_field(&mut self.mode, incoming.mode),
            fan_speed: merge_field(&mut self.fan_speed, incoming.fan_speed),
        }
    }

    /// Whether no field is known.
    pub fn is_empty(&self) -> bool {
        *self == DeviceState::default()
    }

    /// Number of known fields.
    pub fn known_fields(&self) -> usize {
        [
            self.running.is_some(),
            self.current_temperature.is_some(),
            self.set_temperature.is_some(),
            self.mode.is_some(),
            self.fan_speed.is_some(),
        ]
        .into_iter()
        .filter(|known| *known)
        .count()
    }
}

/// Fired after a merge that changed at least one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    /// Only the fields that changed.
    pub delta: DeviceState,
    /// Full state after the merge.
    pub current: DeviceState,
}

/// Owner of the one authoritative [`DeviceState`].
#[derive(Debug, Default)]
pub struct StateStore {
    state: DeviceState,
    state_changed: EventHook<StateChanged>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Register a handler for state changes.
    pub fn on_change<F>(&mut self, handler: F)
    where
        F: Fn(&StateChanged) + Send + Sync + 'static,
    {
        self.state_changed.add_handler(handler);
    }

    /// Merge a partial observation and fire the change hook if anything changed.
    ///
    /// Returns the delta.
    pub fn merge(&mut self, incoming: &DeviceState) -> DeviceState {
        let delta = self.state.merge(incoming);

        if !delta.is_empty() {
            tracing::debug!(changed = delta.known_fields(), "Device state changed");
            self.state_changed.fire(&StateChanged {
                delta,
                current: self.state,
            });
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn temp(tenths: i16) -> Option<Temperature> {
        Some(Temperature::from_tenths(tenths))
    }

    #[test]
    fn test_temperature_parse_and_display() {
        let t: Temperature = "23.5".parse().unwrap();
        assert_eq!(t.tenths(), 235);
        assert_eq!(t.to_string(), "23.5");

        assert_eq!("21".parse::<Temperature>().unwrap().to_string(), "21.0");
        assert_eq!(" 19.96 ".parse::<Temperature>().unwrap().tenths(), 200);
    }

    #[test]
    fn test_format_degrees_keeps_precision() {
        assert_eq!(format_degrees(22.0), "22.0");
        assert_eq!(format_degrees(22.25), "22.25");
        assert_eq!(format_degrees(-0.5), "-0.5");
        assert_eq!(format_degrees(parse_degrees(" 19.96 ").unwrap()), "19.96");
        assert_eq!(Temperature::from_tenths(-5).to_string(), "-0.5");
        assert_eq!(Temperature::from_tenths(-125).to_string(), "-12.5");
    }

    #[test]
    fn test_temperature_rejects_bad_input() {
        assert!(matches!(
            "warm".parse::<Temperature>(),
            Err(TemperatureError::Invalid(_))
        ));
        assert!(matches!(
            "NaN".parse::<Temperature>(),
            Err(TemperatureError::Invalid(_))
        ));
        assert!(matches!(
            "4000".parse::<Temperature>(),
            Err(TemperatureError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_temperature_register_is_signed() {
        assert_eq!(Temperature::from_register(235).tenths(), 235);
        assert_eq!(Temperature::from_register(0xFFFB).tenths(), -5);
        assert_eq!(Temperature::from_tenths(-5).to_register(), 0xFFFB);
    }

    #[test]
    fn test_merge_first_observation_is_change() {
        let mut state = DeviceState::default();
        let incoming = DeviceState {
            running: Some(true),
            mode: Some(Mode::Auto),
            ..Default::default()
        };

        let delta = state.merge(&incoming);
        assert_eq!(delta, incoming);
        assert_eq!(state, incoming);
    }

    #[test]
    fn test_merge_only_reports_differences() {
        let mut state = DeviceState {
            running: Some(true),
            set_temperature: temp(220),
            fan_speed: Some(FanSpeed::Low),
            ..Default::default()
        };

        let delta = state.merge(&DeviceState {
            running: Some(true),
            set_temperature: temp(225),
            fan_speed: Some(FanSpeed::Low),
            ..Default::default()
        });

        assert_eq!(
            delta,
            DeviceState {
                set_temperature: temp(225),
                ..Default::default()
            }
        );
        assert_eq!(state.set_temperature, temp(225));
    }

    #[test]
    fn test_merge_none_never_erases() {
        let mut state = DeviceState {
            running: Some(false),
            current_temperature: temp(198),
            mode: Some(Mode::Cool),
            ..Default::default()
        };
        let before = state;

        let delta = state.merge(&DeviceState::default());
        assert!(delta.is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_known_fields() {
        assert_eq!(DeviceState::default().known_fields(), 0);
        let state = DeviceState {
            running: Some(false),
            fan_speed: Some(FanSpeed::Auto),
            ..Default::default()
        };
        assert_eq!(state.known_fields(), 2);
    }

    #[test]
    fn test_store_fires_only_on_change() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut store = StateStore::new();

        let sink = events.clone();
        store.on_change(move |changed| sink.lock().unwrap().push(*changed));

        let observation = DeviceState {
            running: Some(true),
            current_temperature: temp(211),
            ..Default::default()
        };
        store.merge(&observation);
        store.merge(&observation);
        store.merge(&DeviceState::default());

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].delta, observation);
        assert_eq!(events[0].current, observation);
    }

    #[test]
    fn test_store_event_carries_full_state() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut store = StateStore::new();
        store.merge(&DeviceState {
            mode: Some(Mode::Heating),
            ..Default::default()
        });

        let sink = events.clone();
        store.on_change(move |changed| sink.lock().unwrap().push(*changed));
        store.merge(&DeviceState {
            running: Some(true),
            ..Default::default()
        });

        let events = events.lock().unwrap();
        assert_eq!(events[0].delta.mode, None);
        assert_eq!(events[0].current.mode, Some(Mode::Heating));
        assert_eq!(store.state().running, Some(true));
    }
}
