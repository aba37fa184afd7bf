//! Telegram Bot API channel (`sendMessage`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use streamdelta_core::TenantId;

use crate::channel::{ChannelError, MessageChannel, TextFormat};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Hard per-message limit of the Bot API, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub struct TelegramChannel {
    client: Client,
    send_url: Url,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramChannel {
    /// # Errors
    ///
    /// Returns [`ChannelError::Http`] if the HTTP client cannot be built.
    pub fn new(token: &str, timeout_secs: u64) -> Result<Self, ChannelError> {
        Self::with_base_url(token, timeout_secs, DEFAULT_BASE_URL)
    }

    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] for a malformed base URL, or
    /// [`ChannelError::Http`] if the HTTP client cannot be built.
    pub fn with_base_url(token: &str, timeout_secs: u64, base_url: &str) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("streamdelta/0.1")
            .build()?;

        let raw = format!("{}/bot{token}/sendMessage", base_url.trim_end_matches('/'));
        let send_url = Url::parse(&raw)
            .map_err(|e| ChannelError::Config(format!("invalid Telegram base URL '{base_url}': {e}")))?;

        Ok(Self { client, send_url })
    }
}

#[async_trait]
impl MessageChannel for TelegramChannel {
    async fn send(&self, tenant: &TenantId, text: &str, format: TextFormat) -> Result<(), ChannelError> {
        let body = SendMessage {
            chat_id: tenant.as_str(),
            text: text.chars().take(MAX_MESSAGE_CHARS).collect(),
            parse_mode: match format {
                TextFormat::Html => Some("HTML"),
                TextFormat::Plain => None,
            },
        };

        let response = self.client.post(self.send_url.clone()).json(&body).send().await?;
        let status = response.status();
        let parsed = response.json::<ApiResponse>().await.ok();

        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            other => Err(ChannelError::Rejected {
                status: status.as_u16(),
                description: other
                    .and_then(|r| r.description)
                    .unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }
}
