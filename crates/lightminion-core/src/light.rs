//! Light documents
//!
//! A light is the external document describing what a fixture should output:
//! which universe/address each of its channels is patched to, the target
//! values, and optional fade timing.
//!
//! ```rust
//! use lightminion_core::light::{Light, LightValues};
//!
//! let light: Light = serde_json::from_str(r#"{
//!     "_id": "wash-1",
//!     "minion": "m1",
//!     "channels": [{ "universe": 1, "address": 5, "type": "intensity" }],
//!     "values": [1.0],
//!     "settings": { "time": 0, "fade": 1.5 }
//! }"#).unwrap();
//!
//! assert!(matches!(light.values, Some(LightValues::Indexed(_))));
//! assert_eq!(light.fade_duration(), Some(1.5));
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};
use crate::time::Timestamp;
use crate::universe::{ChannelAddress, Slot, UniverseId};

/// A light document as delivered by the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Identity of the minion that should output this light
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minion: Option<String>,
    #[serde(default)]
    pub channels: Vec<LightChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<LightValues>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<FadeSettings>,
}

/// Where one channel of a light is patched
///
/// Universe and address are kept as authored. A missing or non-integral
/// entry deserializes to `None`, and the reconciler skips that channel while
/// its siblings are still applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightChannel {
    #[serde(
        default,
        deserialize_with = "lenient_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub universe: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub address: Option<i64>,
    /// Channel type tag, e.g. `intensity`, `red`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl LightChannel {
    pub fn new(universe: i64, address: i64) -> Self {
        Self {
            universe: Some(universe),
            address: Some(address),
            kind: None,
        }
    }

    /// Resolve the output slot this channel is patched to
    pub fn slot(&self) -> Result<Slot> {
        let universe = self
            .universe
            .ok_or(CoreError::MissingField("universe"))
            .and_then(UniverseId::try_from)?;
        let address = self
            .address
            .ok_or(CoreError::MissingField("address"))
            .and_then(ChannelAddress::try_from)?;
        Ok(Slot::new(universe, address))
    }
}

/// Target values of a light, in one of the two document encodings
///
/// Entries that are not numbers are kept as `None` so only the channel they
/// belong to goes without a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightValues {
    /// Positional list aligned with `channels`; `null` means "no value yet"
    Indexed(#[serde(deserialize_with = "lenient_list")] Vec<Option<f64>>),
    /// Values keyed by channel type tag
    Keyed(#[serde(deserialize_with = "lenient_map")] BTreeMap<String, Option<f64>>),
}

impl LightValues {
    /// Resolve the authored value for the channel at `position`.
    ///
    /// Indexed values yield `None` when the list is too short (the channel
    /// has no authored value). Keyed values default to 0 when the type tag
    /// is missing from the map.
    pub fn resolve(&self, position: usize, kind: Option<&str>) -> Option<f64> {
        match self {
            LightValues::Indexed(values) => values.get(position).copied().flatten(),
            LightValues::Keyed(values) => match kind.and_then(|k| values.get(k)) {
                Some(value) => *value,
                None => Some(0.0),
            },
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        number(value)
            .filter(|v| v.fract() == 0.0 && v.abs() <= i64::MAX as f64)
            .map(|v| v as i64)
    })
}

fn lenient_integer<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(integer))
}

fn lenient_list<'de, D>(deserializer: D) -> std::result::Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Vec::<Value>::deserialize(deserializer)?
        .iter()
        .map(number)
        .collect())
}

fn lenient_map<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(BTreeMap::<String, Value>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, value)| (key, number(&value)))
        .collect())
}

/// Fade block of a light document
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FadeSettings {
    /// Absolute start instant on the hub clock, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
    /// Fade duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade: Option<f64>,
}

impl FadeSettings {
    /// A block with neither a start time nor a duration
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.fade.is_none()
    }
}

impl Light {
    /// Whether the document carries a non-empty `settings` block
    pub fn is_configured(&self) -> bool {
        self.settings.is_some_and(|s| !s.is_empty())
    }

    /// Positive fade duration, if the document asks for a fade
    pub fn fade_duration(&self) -> Option<f64> {
        self.settings
            .and_then(|s| s.fade)
            .filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Start instant of the fade, falling back to `now`
    pub fn fade_start(&self, now: Timestamp) -> Timestamp {
        self.settings
            .and_then(|s| s.time)
            .filter(|t| t.is_finite())
            .unwrap_or(now)
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// How authored values map onto DMX levels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Values in [0, 1], scaled by 255
    #[default]
    Normalized,
    /// Values already in [0, 255]
    Raw,
}

impl ValueEncoding {
    /// Convert an authored value to an output level (rounded, clamped)
    pub fn to_level(self, value: f64) -> u8 {
        let scaled = match self {
            ValueEncoding::Normalized => value * 255.0,
            ValueEncoding::Raw => value,
        };
        scaled.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

/// Change notification for a light
#[derive(Debug, Clone, PartialEq)]
pub enum LightEvent {
    /// First sighting of a light (a change with no prior state)
    Added(Light),
    Changed(Light),
    Removed { id: String },
}

impl LightEvent {
    pub fn light_id(&self) -> &str {
        match self {
            LightEvent::Added(light) | LightEvent::Changed(light) => &light.id,
            LightEvent::Removed { id } => id,
        }
    }
}
