//! Translation between device register codes and MQTT wire values.
//!
//! The device and MQTT sides use separate code spaces for the two
//! categorical attributes. Every translation is an explicit `match`, never an
//! ordinal cast. Register codes and wire strings outside those arms have no
//! mapping; callers treat them as an unknown observation or a rejected command.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A wire string with no table entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no {kind} mapping for '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

/// Operating mode as stored in holding register 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Cool,
    Dry,
    FanOnly,
    Auto,
    Heating,
}

/// Operating mode on the MQTT side.
///
/// `Off` has no device counterpart: power is the separate `running` coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireMode {
    Auto,
    Off,
    Cool,
    Heat,
    Dry,
    FanOnly,
}

/// Fan speed as stored in holding register 14.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSpeed {
    Low,
    Middle,
    High,
    Auto,
    Unknown,
}

/// Fan speed on the MQTT side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFanSpeed {
    Auto,
    Low,
    Medium,
    High,
    Unknown,
}

impl Mode {
    /// All device modes.
    pub const ALL: [Mode; 5] = [Mode::Cool, Mode::Dry, Mode::FanOnly, Mode::Auto, Mode::Heating];

    /// Register code for this mode.
    pub fn code(self) -> u16 {
        match self {
            Mode::Cool => 0,
            Mode::Dry => 1,
            Mode::FanOnly => 2,
            Mode::Auto => 3,
            Mode::Heating => 4,
        }
    }

    /// Decode a register value. `None` when the code is not in the table.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Mode::Cool),
            1 => Some(Mode::Dry),
            2 => Some(Mode::FanOnly),
            3 => Some(Mode::Auto),
            4 => Some(Mode::Heating),
            _ => None,
        }
    }

    /// Wire value for this mode.
    pub fn to_wire(self) -> WireMode {
        match self {
            Mode::Auto => WireMode::Auto,
            Mode::Cool => WireMode::Cool,
            Mode::Heating => WireMode::Heat,
            Mode::Dry => WireMode::Dry,
            Mode::FanOnly => WireMode::FanOnly,
        }
    }
}

impl WireMode {
    /// All wire modes, in the order advertised to consumers.
    pub const ALL: [WireMode; 6] = [
        WireMode::Auto,
        WireMode::Off,
        WireMode::Cool,
        WireMode::Heat,
        WireMode::Dry,
        WireMode::FanOnly,
    ];

    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            WireMode::Auto => "auto",
            WireMode::Off => "off",
            WireMode::Cool => "cool",
            WireMode::Heat => "heat",
            WireMode::Dry => "dry",
            WireMode::FanOnly => "fan_only",
        }
    }

    /// Device mode for this wire value. `Off` has none.
    pub fn to_device(self) -> Option<Mode> {
        match self {
            WireMode::Auto => Some(Mode::Auto),
            WireMode::Cool => Some(Mode::Cool),
            WireMode::Heat => Some(Mode::Heating),
            WireMode::Dry => Some(Mode::Dry),
            WireMode::FanOnly => Some(Mode::FanOnly),
            WireMode::Off => None,
        }
    }
}

impl FromStr for WireMode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(WireMode::Auto),
            "off" => Ok(WireMode::Off),
            "cool" => Ok(WireMode::Cool),
            "heat" => Ok(WireMode::Heat),
            "dry" => Ok(WireMode::Dry),
            "fan_only" => Ok(WireMode::FanOnly),
            _ => Err(UnknownValue {
                kind: "mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FanSpeed {
    /// All device fan speeds.
    pub const ALL: [FanSpeed; 5] = [
        FanSpeed::Low,
        FanSpeed::Middle,
        FanSpeed::High,
        FanSpeed::Auto,
        FanSpeed::Unknown,
    ];

    /// Register code for this fan speed.
    pub fn code(self) -> u16 {
        match self {
            FanSpeed::Low => 1,
            FanSpeed::Middle => 2,
            FanSpeed::High => 3,
            FanSpeed::Auto => 4,
            FanSpeed::Unknown => 5,
        }
    }

    /// Decode a register value. `None` when the code is not in the table.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(FanSpeed::Low),
            2 => Some(FanSpeed::Middle),
            3 => Some(FanSpeed::High),
            4 => Some(FanSpeed::Auto),
            5 => Some(FanSpeed::Unknown),
            _ => None,
        }
    }

    /// Wire value for this fan speed.
    pub fn to_wire(self) -> WireFanSpeed {
        match self {
            FanSpeed::Auto => WireFanSpeed::Auto,
            FanSpeed::Low => WireFanSpeed::Low,
            FanSpeed::Middle => WireFanSpeed::Medium,
            FanSpeed::High => WireFanSpeed::High,
            FanSpeed::Unknown => WireFanSpeed::Unknown,
        }
    }
}

impl WireFanSpeed {
    /// All wire fan speeds, in the order advertised to consumers.
    pub const ALL: [WireFanSpeed; 5] = [
        WireFanSpeed::Auto,
        WireFanSpeed::Low,
        WireFanSpeed::Medium,
        WireFanSpeed::High,
        WireFanSpeed::Unknown,
    ];

    /// Wire string.
    pub fn as_str(self) -> &'static str {
        match self {
            WireFanSpeed::Auto => "auto",
            WireFanSpeed::Low => "low",
            WireFanSpeed::Medium => "medium",
            WireFanSpeed::High => "high",
            WireFanSpeed::Unknown => "Unknown",
        }
    }

    /// Device fan speed for this wire value.
    pub fn to_device(self) -> FanSpeed {
        match self {
            WireFanSpeed::Auto => FanSpeed::Auto,
            WireFanSpeed::Low => FanSpeed::Low,
            WireFanSpeed::Medium => FanSpeed::Middle,
            WireFanSpeed::High => FanSpeed::High,
            WireFanSpeed::Unknown => FanSpeed::Unknown,
        }
    }
}

impl FromStr for WireFanSpeed {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(WireFanSpeed::Auto),
            "low" => Ok(WireFanSpeed::Low),
            "medium" => Ok(WireFanSpeed::Medium),
            "high" => Ok(WireFanSpeed::High),
            "Unknown" => Ok(WireFanSpeed::Unknown),
            _ => Err(UnknownValue {
                kind: "fan speed",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for WireFanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire value for a device mode.
pub fn mode_to_wire(mode: Mode) -> WireMode {
    mode.to_wire()
}

/// Device mode for a wire value, if it has one.
pub fn wire_to_mode(wire: WireMode) -> Option<Mode> {
    wire.to_device()
}

/// Wire value for a device fan speed.
pub fn fan_speed_to_wire(fan_speed: FanSpeed) -> WireFanSpeed {
    fan_speed.to_wire()
}

/// Device fan speed for a wire value.
pub fn wire_to_fan_speed(wire: WireFanSpeed) -> FanSpeed {
    wire.to_device()
}
