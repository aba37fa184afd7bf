//! Scraper output to [`PlaylistSnapshot`].
//!
//! The scraper prints one JSON object per run:
//! `{ playlistName, tracks: [{ entityId, title, artists, streams }],
//! totalTracks, totalStreams, error? }`. Count fields may be numbers or
//! display strings.

use serde::Deserialize;
use streamdelta_core::{parse_stream_count, CollectionUnit, PlaylistSnapshot, TotalStreams, TrackRecord};

use crate::error::CollectError;

const UNKNOWN_PLAYLIST: &str = "Unknown Playlist";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlaylist {
    #[serde(default)]
    playlist_name: Option<String>,
    #[serde(default)]
    tracks: Vec<TrackRecord>,
    #[serde(default)]
    total_tracks: Option<serde_json::Value>,
    #[serde(default)]
    total_streams: TotalStreams,
    #[serde(default)]
    error: Option<String>,
}

/// Parses scraper stdout for `unit`.
///
/// The whole output is tried first; if the scraper also logged to stdout,
/// the last line that looks like a JSON object is used instead.
///
/// # Errors
///
/// [`CollectError::Parse`] when no JSON object can be read, and
/// [`CollectError::Scraper`] when the scraper reported an error.
pub fn parse_scraper_output(unit: &CollectionUnit, stdout: &str) -> Result<PlaylistSnapshot, CollectError> {
    let raw: RawPlaylist = match serde_json::from_str(stdout.trim()) {
        Ok(raw) => raw,
        Err(whole_err) => {
            let last_object = stdout
                .lines()
                .rev()
                .map(str::trim)
                .find(|line| line.starts_with('{'));
            match last_object.map(serde_json::from_str) {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => return Err(parse_error(unit, e)),
                None => return Err(parse_error(unit, whole_err)),
            }
        }
    };
    into_snapshot(unit, raw)
}

fn parse_error(unit: &CollectionUnit, source: serde_json::Error) -> CollectError {
    CollectError::Parse {
        url: unit.url.clone(),
        source,
    }
}

fn into_snapshot(unit: &CollectionUnit, raw: RawPlaylist) -> Result<PlaylistSnapshot, CollectError> {
    if let Some(error) = raw.error.filter(|e| !e.trim().is_empty()) {
        return Err(CollectError::Scraper(error));
    }

    let name = raw
        .playlist_name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_PLAYLIST.to_owned());

    Ok(PlaylistSnapshot::from_tracks(
        unit,
        name,
        raw.tracks,
        raw.total_tracks.as_ref().and_then(count_value),
        raw.total_streams,
    ))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count_value(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        serde_json::Value::String(s) => parse_stream_count(s),
        _ => None,
    }
}
