//! Stream-count parsing.
//!
//! Scraped pages report counts in several shapes: plain integers, grouped
//! text (`"1,234,567"`, `"12 345"`), abbreviated text (`"1.2M"`), or a
//! placeholder such as `"N/A"`. Everything funnels through
//! [`parse_stream_count`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

static ABBREVIATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9.]+)([KMB])?$").expect("valid abbreviated count regex"));

/// Parses a textual stream count.
///
/// Returns `None` when the text carries no digits at all, so callers can
/// tell "unavailable" apart from a real zero.
#[must_use]
pub fn parse_stream_count(raw: &str) -> Option<u64> {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect::<String>()
        .to_uppercase();

    if let Some(caps) = ABBREVIATED.captures(&compact) {
        if let Ok(value) = caps[1].parse::<f64>() {
            let multiplier = match caps.get(2).map(|m| m.as_str()) {
                Some("K") => 1_000.0,
                Some("M") => 1_000_000.0,
                Some("B") => 1_000_000_000.0,
                _ => 1.0,
            };
            return Some(float_to_count(value * multiplier));
        }
    }

    let digits: String = compact.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_count(value: f64) -> u64 {
    if value.is_finite() {
        value.max(0.0).round() as u64
    } else {
        0
    }
}

/// Wire shape of a stream value before interpretation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StreamValue {
    Int(u64),
    Float(f64),
    Text(String),
}

impl StreamValue {
    pub(crate) fn into_count(self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(n),
            Self::Float(f) => Some(float_to_count(f)),
            Self::Text(s) => parse_stream_count(&s),
        }
    }
}

/// Deserializes a per-track stream count; `null`, absent and unparseable
/// values all become `0`.
pub(crate) fn de_stream_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<StreamValue>::deserialize(deserializer)?;
    Ok(raw.and_then(StreamValue::into_count).unwrap_or(0))
}
