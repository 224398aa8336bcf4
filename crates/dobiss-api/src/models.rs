// Wire types for the gateway's local REST API.
//
// Gateway firmware is loose about JSON types: numeric fields arrive as
// numbers or strings, `dimmable` as a bool or 0/1. The deserializers below
// accept every observed shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Lenient scalar decoding ──────────────────────────────────────────

/// Coerce a JSON scalar to an integer.
///
/// Accepts integers, floats (truncated toward zero), trimmed numeric
/// strings and booleans. Everything else yields `None`.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Coerce a JSON scalar to a float (numbers and numeric strings).
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    coerce_i64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected integer, got {value}")))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let n = lenient_i64(deserializer)?;
    u32::try_from(n).map_err(|_| serde::de::Error::custom(format!("{n} out of range")))
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        other => coerce_i64(other)
            .map(|n| n != 0)
            .ok_or_else(|| serde::de::Error::custom(format!("expected boolean, got {value}"))),
    }
}

// ── Discovery ────────────────────────────────────────────────────────

/// Response of `GET discover`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
    #[serde(default)]
    pub temp_calendars: Vec<TempCalendar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEntry {
    pub group: GroupInfo,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A raw discovered device record, before kind mapping.
///
/// Every field beyond the fixed set lands in `attributes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "lenient_u32")]
    pub address: u32,
    #[serde(deserialize_with = "lenient_u32")]
    pub channel: u32,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub dimmable: bool,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub icons_id: i64,
    #[serde(rename = "type", default, deserialize_with = "lenient_i64")]
    pub module_type: i64,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

/// A named temperature schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempCalendar {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

// ── Status ───────────────────────────────────────────────────────────

/// Optional body of `GET status`. Empty means "everything".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u32>,
}

impl StatusFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn single(address: u32, channel: u32) -> Self {
        Self {
            address: Some(address),
            channel: Some(channel),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Value,
}

// ── Action ───────────────────────────────────────────────────────────

/// Body of `POST action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRequest {
    pub address: u32,
    pub channel: u32,
    pub action: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option1: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option2: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delayon: Option<Delay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delayoff: Option<Delay>,
}

impl ActionRequest {
    pub fn new(address: u32, channel: u32, action: u8) -> Self {
        Self {
            address,
            channel,
            action,
            option1: None,
            option2: None,
            delayon: None,
            delayoff: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DelayUnit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "min")]
    Minutes,
}

/// A switching delay as the gateway expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delay {
    pub value: u64,
    pub unit: DelayUnit,
}

/// Largest value the gateway accepts in either unit.
pub const MAX_DELAY_VALUE: u64 = 120;

impl Delay {
    /// Up to 120 seconds is sent as-is; longer delays become whole minutes
    /// (rounded to nearest), capped at 120 minutes.
    pub fn from_seconds(seconds: u64) -> Self {
        if seconds <= MAX_DELAY_VALUE {
            Self {
                value: seconds,
                unit: DelayUnit::Seconds,
            }
        } else {
            Self {
                value: (seconds.saturating_add(30) / 60).min(MAX_DELAY_VALUE),
                unit: DelayUnit::Minutes,
            }
        }
    }
}
