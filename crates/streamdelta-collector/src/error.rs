use std::time::Duration;

use thiserror::Error;

/// Failure of one collection attempt. Never escapes a round: the dispatcher
/// and the sequential executor convert it into an error-tagged snapshot.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("executor launch failed: {0}")]
    Launch(String),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scraper exited with {}: {stderr}", describe_exit(.code))]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("unparseable scraper output for {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("collector panicked: {0}")]
    Panicked(String),

    /// Failure reported by the scraper itself inside a well-formed result.
    #[error("{0}")]
    Scraper(String),
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_owned(), |c| format!("status {c}"))
}

/// A parallel round that could not complete. Triggers the sequential
/// fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolFailure {
    #[error("no executor could be launched ({attempted} attempted)")]
    NoExecutors { attempted: usize },

    #[error("round timed out with {received}/{expected} results")]
    RoundTimeout { received: usize, expected: usize },

    #[error("executors exited with {received}/{expected} results")]
    WorkersExited { received: usize, expected: usize },
}
