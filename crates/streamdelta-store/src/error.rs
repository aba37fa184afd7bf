use thiserror::Error;

/// Errors returned by blob-store backends and the persistence helpers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote store answered with a status the backend does not handle.
    #[error("unexpected HTTP status {status} for {path}")]
    UnexpectedStatus { status: u16, path: String },

    /// The version token presented with a write no longer matches the stored
    /// record.
    #[error("version conflict writing {path}")]
    Conflict { path: String },

    /// A stored record could not be parsed.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON serialization error for {context}: {source}")]
    Serialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid encoding for {path}: {reason}")]
    Encoding { path: String, reason: String },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Paths must be relative and must not contain `..` segments.
    #[error("invalid store path \"{0}\"")]
    InvalidPath(String),

    #[error("invalid store configuration: {0}")]
    Config(String),

    /// Injected failure from the in-memory backend.
    #[error("simulated store failure for {0}")]
    Simulated(String),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
