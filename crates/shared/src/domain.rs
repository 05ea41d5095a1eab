use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseWiperModeError;

/// Dotted VSS path identifying one leaf signal, e.g. `Vehicle.Body.Hood.IsOpen`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalPath(Cow<'static, str>);

impl SignalPath {
    pub const fn from_static(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(Cow::Owned(path.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SignalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int32,
    Float,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Sensor,
    Actuator,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    Bool(bool),
    Int32(i32),
    Float(f32),
    String(String),
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Int32(_) => DataType::Int32,
            Self::Float(_) => DataType::Float,
            Self::String(_) => DataType::String,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// Operating mode of a windshield wiper, carried as its upper-case name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WiperMode {
    Off,
    Slow,
    Medium,
    Fast,
    Interval,
    RainSensor,
}

impl WiperMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Slow => "SLOW",
            Self::Medium => "MEDIUM",
            Self::Fast => "FAST",
            Self::Interval => "INTERVAL",
            Self::RainSensor => "RAIN_SENSOR",
        }
    }
}

impl fmt::Display for WiperMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WiperMode {
    type Err = ParseWiperModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFF" => Ok(Self::Off),
            "SLOW" => Ok(Self::Slow),
            "MEDIUM" => Ok(Self::Medium),
            "FAST" => Ok(Self::Fast),
            "INTERVAL" => Ok(Self::Interval),
            "RAIN_SENSOR" => Ok(Self::RainSensor),
            other => Err(ParseWiperModeError(other.to_string())),
        }
    }
}

/// Rust-side type of a signal value and its mapping onto [`DataValue`].
pub trait SignalValue: fmt::Debug + Clone + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn into_data_value(self) -> DataValue;

    /// `None` when the untyped value cannot represent `Self`.
    fn from_data_value(value: &DataValue) -> Option<Self>;
}

impl SignalValue for bool {
    const DATA_TYPE: DataType = DataType::Bool;

    fn into_data_value(self) -> DataValue {
        DataValue::Bool(self)
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl SignalValue for WiperMode {
    const DATA_TYPE: DataType = DataType::String;

    fn into_data_value(self) -> DataValue {
        DataValue::String(self.as_str().to_string())
    }

    fn from_data_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::String(v) => v.parse().ok(),
            _ => None,
        }
    }
}

/// A leaf of the vehicle signal tree, known at compile time.
pub trait Signal: Send + Sync + 'static {
    const PATH: SignalPath;
    const ENTRY_TYPE: EntryType;
    type Value: SignalValue;
}

macro_rules! signal {
    ($(#[$meta:meta])* $name:ident, $path:literal, $entry:ident, $value:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl Signal for $name {
            const PATH: SignalPath = SignalPath::from_static($path);
            const ENTRY_TYPE: EntryType = EntryType::$entry;
            type Value = $value;
        }
    };
}

signal!(
    /// Whether the engine hood is open.
    HoodIsOpen,
    "Vehicle.Body.Hood.IsOpen",
    Actuator,
    bool
);
signal!(
    /// Requested mode of the front windshield wipers.
    FrontWipingMode,
    "Vehicle.Body.Windshield.Front.Wiping.Mode",
    Actuator,
    WiperMode
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wiper_mode_round_trips_through_data_value() {
        let value = WiperMode::RainSensor.into_data_value();
        assert_eq!(value, DataValue::String("RAIN_SENSOR".into()));
        assert_eq!(
            WiperMode::from_data_value(&value),
            Some(WiperMode::RainSensor)
        );
    }

    #[test]
    fn wiper_mode_rejects_unknown_names_and_wrong_types() {
        assert!("medium".parse::<WiperMode>().is_err());
        assert_eq!(
            WiperMode::from_data_value(&DataValue::String("TURBO".into())),
            None
        );
        assert_eq!(WiperMode::from_data_value(&DataValue::Bool(true)), None);
    }

    #[test]
    fn wiper_mode_serializes_as_upper_case_name() {
        let json = serde_json::to_string(&WiperMode::Medium).expect("serialize");
        assert_eq!(json, "\"MEDIUM\"");
    }

    #[test]
    fn signal_markers_carry_vss_paths() {
        assert_eq!(HoodIsOpen::PATH.as_str(), "Vehicle.Body.Hood.IsOpen");
        assert_eq!(
            FrontWipingMode::PATH,
            SignalPath::new("Vehicle.Body.Windshield.Front.Wiping.Mode")
        );
        assert_eq!(
            <<HoodIsOpen as Signal>::Value as SignalValue>::DATA_TYPE,
            DataType::Bool
        );
    }
}
