//! Daily trigger times.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ValidationError;

static HH_MM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid HH:MM regex"));

/// Wall-clock time of day at which a tenant's check fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DailyTime {
    hour: u8,
    minute: u8,
}

impl DailyTime {
    /// Parses strict 24-hour `HH:MM`. `"9:00"` and `"24:00"` are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidScheduleTime`] on malformed input.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let caps = HH_MM
            .captures(raw.trim())
            .ok_or_else(|| ValidationError::InvalidScheduleTime(raw.to_owned()))?;
        let hour = caps[1]
            .parse()
            .map_err(|_| ValidationError::InvalidScheduleTime(raw.to_owned()))?;
        let minute = caps[2]
            .parse()
            .map_err(|_| ValidationError::InvalidScheduleTime(raw.to_owned()))?;
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Six-field cron expression (`sec min hour dom mon dow`) firing once a
    /// day at this time.
    #[must_use]
    pub fn cron_expression(self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

impl Default for DailyTime {
    fn default() -> Self {
        Self { hour: 9, minute: 0 }
    }
}

impl fmt::Display for DailyTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for DailyTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for DailyTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DailyTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Persisted schedule for one tenant (or the global job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerState {
    #[serde(default)]
    pub time: DailyTime,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for TriggerState {
    fn default() -> Self {
        Self {
            time: DailyTime::default(),
            enabled: true,
        }
    }
}
