//! Report text: one line per entry, then pagination into message-sized
//! chunks.

use streamdelta_core::TotalStreams;

use crate::diff::{PlaylistReport, ReportModel, TrackChange, TrackDelta};
use crate::format::{escape_html, format_number, format_optional, format_signed, trend};

/// Default chunk budget, in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 4000;

const UNKNOWN_TITLE: &str = "Unknown";
const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Renders the model to HTML-formatted report lines.
#[must_use]
pub fn render_lines(model: &ReportModel) -> Vec<String> {
    let mut lines = Vec::new();

    for playlist in &model.playlists {
        render_playlist(playlist, &mut lines);
    }

    lines.push("📊 General Report".to_owned());
    for playlist in &model.playlists {
        lines.push(format!("🎵 Playlist: {}", escape_html(&playlist.name)));
        lines.push(format!(
            "🎧 {} tracks | 🌊 {} total streams | {}",
            playlist.total_tracks,
            declared(playlist.declared_streams),
            trend(playlist.delta)
        ));
        lines.push(String::new());
    }
    lines.push(format!("🎵 Total Playlists Processed: {}", model.playlists.len()));
    lines.push(format!("🌊 Global Streams Change: {}", trend(model.streams_change)));
    lines.push(format!("📅 Report Date: {}", model.date.format("%Y-%m-%d")));
    lines
}

fn render_playlist(playlist: &PlaylistReport, lines: &mut Vec<String>) {
    lines.push(format!("🎵 Playlist: {}", escape_html(&playlist.name)));
    lines.push(format!(
        "🎧 {} tracks | 🌊 {} total streams | {} since yesterday\n",
        playlist.total_tracks,
        declared(playlist.declared_streams),
        trend(playlist.delta)
    ));
    if let Some(error) = &playlist.error {
        lines.push(format!("⚠️ Collection failed: {}", escape_html(error)));
    }
    lines.push("Track changes:".to_owned());
    if playlist.tracks.is_empty() {
        lines.push("(no tracks extracted)\n".to_owned());
    } else {
        lines.extend(playlist.tracks.iter().map(track_line));
    }
    lines.push("\n".to_owned());
}

fn declared(total: TotalStreams) -> String {
    format_optional(total.count())
}

fn track_line(track: &TrackDelta) -> String {
    let title = if track.title.trim().is_empty() {
        UNKNOWN_TITLE.to_owned()
    } else {
        track.title.clone()
    };
    let artists = if track.artists.is_empty() {
        UNKNOWN_ARTIST.to_owned()
    } else {
        track.artists.join(", ")
    };
    let suffix = match track.change {
        TrackChange::New => "(NEW)".to_owned(),
        TrackChange::Delta(d) => format!("({} streams)", format_signed(d)),
    };
    format!(
        "🎯 {} by {}: {} streams {suffix}",
        escape_html(&title),
        escape_html(&artists),
        format_number(track.streams)
    )
}

/// Packs lines into chunks of at most `budget` characters, joined by `\n`.
///
/// Lines are never split; a single line longer than the budget becomes a
/// chunk of its own.
#[must_use]
pub fn paginate(lines: &[String], budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let mut current_lines = 0usize;

    for line in lines {
        let line_chars = line.chars().count();
        if current_lines > 0 && current_chars + 1 + line_chars > budget {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
            current_lines = 0;
        }
        if current_lines > 0 {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(line);
        current_chars += line_chars;
        current_lines += 1;
    }
    if current_lines > 0 {
        chunks.push(current);
    }
    chunks
}
