//! Collection targets and URL normalization.
//!
//! Three URL families point at the same playlist page:
//! `open.spotify.com/playlist/<ID>`, `artist.tools/playlist/<ID>` and
//! `app.artist.tools/playlist/<ID>`. All of them normalize to the
//! `app.artist.tools` form, and the playlist ID is the unit's identity.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

const CANONICAL_BASE: &str = "https://app.artist.tools/playlist/";

static SUPPORTED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https://(?:app\.artist\.tools|artist\.tools|open\.spotify\.com)/playlist/([A-Za-z0-9]+)(?:[/?#].*)?$",
    )
    .expect("valid playlist url regex")
});

static PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"playlist/([A-Za-z0-9]+)").expect("valid playlist id regex"));

/// One playlist to collect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionUnit {
    pub id: String,
    pub url: String,
}

impl CollectionUnit {
    /// Validates and normalizes a user-supplied playlist URL.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedUrl`] when the URL is not one of
    /// the supported playlist URL families.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = normalize_url(raw)?;
        let id = extract_unit_id(&url).ok_or_else(|| ValidationError::UnsupportedUrl(raw.into()))?;
        Ok(Self { id, url })
    }
}

impl fmt::Display for CollectionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Rewrites a supported playlist URL into its canonical form.
///
/// # Errors
///
/// Returns [`ValidationError::UnsupportedUrl`] for anything else.
pub fn normalize_url(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let caps = SUPPORTED_URL
        .captures(trimmed)
        .ok_or_else(|| ValidationError::UnsupportedUrl(trimmed.to_owned()))?;
    Ok(format!("{CANONICAL_BASE}{}", &caps[1]))
}

/// Extracts the playlist ID from any URL containing `playlist/<ID>`.
#[must_use]
pub fn extract_unit_id(url: &str) -> Option<String> {
    PLAYLIST_ID.captures(url).map(|caps| caps[1].to_owned())
}
