//! Day-over-day playlist reports and their delivery.

pub mod channel;
pub mod diff;
pub mod format;
pub mod render;
pub mod telegram;

use streamdelta_core::DailySnapshot;

pub use channel::{
    deliver_paced, notify, ChannelError, ConsoleChannel, MemoryChannel, MessageChannel,
    SentMessage, TextFormat,
};
pub use diff::{diff_snapshots, PlaylistReport, ReportModel, TrackChange, TrackDelta};
pub use render::{paginate, render_lines, DEFAULT_CHUNK_CHARS};
pub use telegram::TelegramChannel;

/// Diffs `today` against `yesterday` and renders the paginated report.
#[must_use]
pub fn build_report(
    today: &DailySnapshot,
    yesterday: Option<&DailySnapshot>,
    chunk_chars: usize,
) -> Vec<String> {
    let model = diff_snapshots(today, yesterday);
    let lines = render_lines(&model);
    paginate(&lines, chunk_chars)
}
