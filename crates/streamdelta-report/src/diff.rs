//! Day-over-day comparison of two snapshots.
//!
//! Playlists are matched by URL, then by playlist id; tracks by entity id,
//! then by a title/artist key. Neither side's ordering matters except that
//! today's playlist and track order is kept in the output.

use std::collections::HashMap;

use chrono::NaiveDate;
use streamdelta_core::{extract_unit_id, DailySnapshot, PlaylistSnapshot, TotalStreams, TrackRecord};

/// Tracks shown per playlist.
pub const TOP_TRACKS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    New,
    Delta(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDelta {
    pub title: String,
    pub artists: Vec<String>,
    pub streams: u64,
    pub change: TrackChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistReport {
    pub unit_id: String,
    pub name: String,
    pub total_tracks: u64,
    /// Total as declared by the playlist page.
    pub declared_streams: TotalStreams,
    pub total_today: u64,
    /// `None` when yesterday has no matching playlist.
    pub total_yesterday: Option<u64>,
    pub delta: i64,
    pub tracks: Vec<TrackDelta>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportModel {
    pub date: NaiveDate,
    pub playlists: Vec<PlaylistReport>,
    pub streams_change: i64,
}

/// Compares `today` with `yesterday` (absent on a tenant's first day).
#[must_use]
pub fn diff_snapshots(today: &DailySnapshot, yesterday: Option<&DailySnapshot>) -> ReportModel {
    let previous: &[PlaylistSnapshot] = yesterday.map_or(&[], |y| y.playlists.as_slice());

    let playlists: Vec<PlaylistReport> = today
        .playlists
        .iter()
        .map(|playlist| diff_playlist(playlist, find_match(playlist, previous)))
        .collect();
    let streams_change = playlists.iter().map(|p| p.delta).sum();

    ReportModel {
        date: today.date,
        playlists,
        streams_change,
    }
}

fn diff_playlist(today: &PlaylistSnapshot, yesterday: Option<&PlaylistSnapshot>) -> PlaylistReport {
    let total_today = resolve_total(today);
    let total_yesterday = yesterday.map(resolve_total);
    let delta = signed_diff(total_today, total_yesterday.unwrap_or(0));

    let lookup = yesterday.map(track_lookup).unwrap_or_default();
    let tracks = today
        .tracks
        .iter()
        .take(TOP_TRACKS)
        .map(|track| TrackDelta {
            title: track.title.clone(),
            artists: track.artists.clone(),
            streams: track.stream_count,
            change: match_track(track, &lookup)
                .map_or(TrackChange::New, |before| {
                    TrackChange::Delta(signed_diff(track.stream_count, before))
                }),
        })
        .collect();

    let unit_id = unit_id_of(today).unwrap_or_default();
    let name = if today.name.trim().is_empty() {
        format!("Playlist {unit_id}")
    } else {
        today.name.clone()
    };
    let total_tracks = if today.total_tracks > 0 {
        today.total_tracks
    } else {
        today.tracks.len() as u64
    };

    PlaylistReport {
        unit_id,
        name,
        total_tracks,
        declared_streams: today.total_streams,
        total_today,
        total_yesterday,
        delta,
        tracks,
        error: today.error.clone(),
    }
}

/// Aggregate streams, else the declared total, else the per-track sum. A
/// zero falls through to the next source.
#[must_use]
pub fn resolve_total(playlist: &PlaylistSnapshot) -> u64 {
    playlist
        .aggregate_streams
        .filter(|n| *n > 0)
        .or_else(|| playlist.total_streams.count().filter(|n| *n > 0))
        .unwrap_or_else(|| playlist.tracks.iter().map(|t| t.stream_count).sum())
}

fn unit_id_of(playlist: &PlaylistSnapshot) -> Option<String> {
    if playlist.unit_id.is_empty() {
        extract_unit_id(&playlist.url)
    } else {
        Some(playlist.unit_id.clone())
    }
}

fn find_match<'a>(
    playlist: &PlaylistSnapshot,
    previous: &'a [PlaylistSnapshot],
) -> Option<&'a PlaylistSnapshot> {
    previous.iter().find(|p| p.url == playlist.url).or_else(|| {
        let id = unit_id_of(playlist)?;
        previous
            .iter()
            .find(|p| unit_id_of(p).as_deref() == Some(id.as_str()))
    })
}

/// Yesterday's streams keyed by entity id and by composite key.
fn track_lookup(playlist: &PlaylistSnapshot) -> HashMap<String, u64> {
    let mut lookup = HashMap::with_capacity(playlist.tracks.len() * 2);
    for track in &playlist.tracks {
        if let Some(id) = track.entity_id.as_deref().filter(|id| !id.is_empty()) {
            lookup.insert(id.to_owned(), track.stream_count);
        }
        if let Some(key) = track.composite_key() {
            lookup.insert(key, track.stream_count);
        }
    }
    lookup
}

fn match_track(track: &TrackRecord, lookup: &HashMap<String, u64>) -> Option<u64> {
    track
        .entity_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .and_then(|id| lookup.get(id).copied())
        .or_else(|| track.composite_key().and_then(|key| lookup.get(&key).copied()))
}

#[allow(clippy::cast_possible_wrap)]
fn signed_diff(today: u64, yesterday: u64) -> i64 {
    if today >= yesterday {
        (today - yesterday).min(i64::MAX as u64) as i64
    } else {
        -((yesterday - today).min(i64::MAX as u64) as i64)
    }
}

#[cfg(test)]
#[path = "diff_test.rs"]
mod tests;
