//! Blob store backed by the GitHub repository contents API.
//!
//! Files are read and written through `/repos/{owner}/{repo}/contents/{path}`.
//! The blob SHA GitHub returns for each file is used as the [`VersionToken`];
//! GitHub itself rejects a write whose `sha` is stale (409) or missing for an
//! existing file (422), which maps onto [`StoreError::Conflict`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::blob::{validate_path, Blob, BlobStore, VersionToken};
use crate::error::StoreError;
use crate::retry::{retry_transient, TRANSIENT_RETRY_DELAY};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Client for one GitHub repository used as a blob store.
pub struct GithubStore {
    client: Client,
    token: String,
    base_url: Url,
    owner: String,
    repo: String,
    retry_delay: Duration,
}

#[derive(Debug, Deserialize)]
struct ContentFile {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

impl GithubStore {
    /// Creates a store pointed at the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `repo` is not `owner/name`, or
    /// [`StoreError::Http`] if the HTTP client cannot be built.
    pub fn new(token: &str, repo: &str, timeout_secs: u64) -> Result<Self, StoreError> {
        Self::with_base_url(token, repo, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a store with a custom API base URL (GitHub Enterprise, or a
    /// wiremock server in tests).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for a malformed repo or base URL, or
    /// [`StoreError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(
        token: &str,
        repo: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, StoreError> {
        let (owner, name) = repo
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty())
            .ok_or_else(|| StoreError::Config(format!("repo must be owner/name, got \"{repo}\"")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("streamdelta/0.1")
            .build()?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| StoreError::Config(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            token: token.to_owned(),
            base_url,
            owner: owner.to_owned(),
            repo: name.to_owned(),
            retry_delay: TRANSIENT_RETRY_DELAY,
        })
    }

    /// Overrides the pause before the single transient-read retry.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn contents_url(&self, path: &str) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Config("base URL cannot hold a path".to_owned()))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
            .extend(path.split('/'));
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn fetch_file(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        let url = self.contents_url(path)?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                path: path.to_owned(),
            });
        }

        let body = response.text().await?;
        let file: ContentFile =
            serde_json::from_str(&body).map_err(|e| StoreError::Deserialize {
                context: format!("GET contents/{path}"),
                source: e,
            })?;

        // Files above 1 MB come back without inline content.
        let content = match (file.encoding.as_deref(), file.download_url.as_deref()) {
            (Some("none"), Some(download_url)) => self.fetch_raw(download_url, path).await?,
            _ => decode_content(path, &file.content)?,
        };

        Ok(Some(Blob {
            content,
            version: VersionToken::new(file.sha),
        }))
    }

    async fn fetch_raw(&self, download_url: &str, path: &str) -> Result<String, StoreError> {
        let url = Url::parse(download_url).map_err(|e| StoreError::Encoding {
            path: path.to_owned(),
            reason: format!("invalid download URL: {e}"),
        })?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let url = self.contents_url(prefix)?;
        let response = self.request(Method::GET, url).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                path: prefix.to_owned(),
            });
        }

        let body = response.text().await?;
        let entries: Vec<DirEntry> =
            serde_json::from_str(&body).map_err(|e| StoreError::Deserialize {
                context: format!("GET contents/{prefix}"),
                source: e,
            })?;

        let mut dirs: Vec<String> = entries
            .into_iter()
            .filter(|e| e.kind == "dir")
            .map(|e| e.name)
            .collect();
        dirs.sort();
        Ok(dirs)
    }
}

#[async_trait]
impl BlobStore for GithubStore {
    async fn get(&self, path: &str) -> Result<Option<Blob>, StoreError> {
        validate_path(path)?;
        retry_transient(path, self.retry_delay, || self.fetch_file(path)).await
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        expected: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        validate_path(path)?;
        let url = self.contents_url(path)?;
        let body = PutRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(content.as_bytes()),
            sha: expected.map(VersionToken::as_str),
        };

        let response = self.request(Method::PUT, url).json(&body).send().await?;
        let status = response.status();

        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            tracing::debug!(path, status = status.as_u16(), "store: github rejected stale write");
            return Err(StoreError::Conflict {
                path: path.to_owned(),
            });
        }
        if !status.is_success() {
            return Err(StoreError::UnexpectedStatus {
                status: status.as_u16(),
                path: path.to_owned(),
            });
        }

        let text = response.text().await?;
        let parsed: PutResponse =
            serde_json::from_str(&text).map_err(|e| StoreError::Deserialize {
                context: format!("PUT contents/{path}"),
                source: e,
            })?;
        Ok(VersionToken::new(parsed.content.sha))
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        validate_path(prefix)?;
        retry_transient(prefix, self.retry_delay, || self.fetch_dirs(prefix)).await
    }
}

/// Decodes GitHub's line-wrapped base64 file content.
fn decode_content(path: &str, encoded: &str) -> Result<String, StoreError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| StoreError::Encoding {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|e| StoreError::Encoding {
        path: path.to_owned(),
        reason: e.to_string(),
    })
}
