//! Playlist snapshot data model.
//!
//! A [`DailySnapshot`] is what one collection round produces for one tenant
//! on one calendar day. It is persisted as JSON and later diffed against the
//! previous day's snapshot.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::streams::{de_stream_count, StreamValue};
use crate::units::CollectionUnit;
use crate::ValidationError;

/// A tenant (chat) identity. Used verbatim as a store path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTenant`] for empty ids or ids that
    /// would escape their path segment.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let invalid = trimmed.is_empty()
            || trimmed.contains('/')
            || trimmed.contains("..")
            || trimmed.chars().any(char::is_whitespace);
        if invalid {
            return Err(ValidationError::InvalidTenant(raw.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Older snapshots stored numeric chat ids as JSON numbers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(i64),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::str::FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One track row as scraped from a playlist page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default, alias = "streams", deserialize_with = "de_stream_count")]
    pub stream_count: u64,
}

impl TrackRecord {
    /// Title/artist key used when a track has no entity id.
    ///
    /// `lowercase(title) || lowercase(artists joined by ",")`. `None` when
    /// the title is blank.
    #[must_use]
    pub fn composite_key(&self) -> Option<String> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        Some(format!(
            "{}||{}",
            title.to_lowercase(),
            self.artists.join(",").trim().to_lowercase()
        ))
    }
}

/// Declared total-streams value of a playlist page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalStreams {
    Count(u64),
    #[default]
    Unavailable,
}

impl TotalStreams {
    #[must_use]
    pub fn count(self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(n),
            Self::Unavailable => None,
        }
    }
}

impl Serialize for TotalStreams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u64(*n),
            Self::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

impl<'de> Deserialize<'de> for TotalStreams {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<StreamValue>::deserialize(deserializer)?;
        Ok(raw
            .and_then(StreamValue::into_count)
            .map_or(Self::Unavailable, Self::Count))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Success,
    #[default]
    Minimal,
    Error,
}

/// Result of one collection attempt for one playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    #[serde(default)]
    pub unit_id: String,
    pub url: String,
    #[serde(alias = "playlistName")]
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<TrackRecord>,
    #[serde(default)]
    pub total_tracks: u64,
    #[serde(default)]
    pub total_streams: TotalStreams,
    /// Sum of per-track streams, computed at collection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_streams: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub extraction_method: ExtractionMethod,
    #[serde(default = "Utc::now")]
    pub extracted_at: DateTime<Utc>,
}

impl PlaylistSnapshot {
    /// Builds a snapshot from extracted tracks.
    ///
    /// `declared_tracks` falls back to the number of extracted tracks when
    /// absent or zero.
    #[must_use]
    pub fn from_tracks(
        unit: &CollectionUnit,
        name: String,
        tracks: Vec<TrackRecord>,
        declared_tracks: Option<u64>,
        total_streams: TotalStreams,
    ) -> Self {
        let aggregate: u64 = tracks.iter().map(|t| t.stream_count).sum();
        let extraction_method = if tracks.is_empty() {
            ExtractionMethod::Minimal
        } else {
            ExtractionMethod::Success
        };
        let total_tracks = declared_tracks
            .filter(|n| *n > 0)
            .unwrap_or(tracks.len() as u64);

        Self {
            unit_id: unit.id.clone(),
            url: unit.url.clone(),
            name,
            tracks,
            total_tracks,
            total_streams,
            aggregate_streams: Some(aggregate),
            error: None,
            extraction_method,
            extracted_at: Utc::now(),
        }
    }

    /// Error-tagged snapshot for a unit whose collection failed.
    #[must_use]
    pub fn failed(unit: &CollectionUnit, reason: impl Into<String>) -> Self {
        Self {
            unit_id: unit.id.clone(),
            url: unit.url.clone(),
            name: format!("Error - {}", unit.id),
            tracks: Vec::new(),
            total_tracks: 0,
            total_streams: TotalStreams::Unavailable,
            aggregate_streams: None,
            error: Some(reason.into()),
            extraction_method: ExtractionMethod::Error,
            extracted_at: Utc::now(),
        }
    }

    /// Re-associates the snapshot with the unit it was collected for.
    #[must_use]
    pub fn tagged(mut self, unit: &CollectionUnit) -> Self {
        self.unit_id.clone_from(&unit.id);
        self.url.clone_from(&unit.url);
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.extraction_method == ExtractionMethod::Error
    }
}

/// Everything collected for one tenant on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySnapshot {
    #[serde(alias = "chatId")]
    pub tenant_id: TenantId,
    pub date: NaiveDate,
    #[serde(default)]
    pub playlists: Vec<PlaylistSnapshot>,
    pub generated_at: DateTime<Utc>,
}

impl DailySnapshot {
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.playlists.iter().filter(|p| p.is_error()).count()
    }
}
