//! Long-lived handles shared by every command.

use std::sync::Arc;

use anyhow::Context;
use streamdelta_core::{AppConfig, ConfigError, TenantId};
use streamdelta_report::format::escape_html;
use streamdelta_report::{notify, ConsoleChannel, MessageChannel, TelegramChannel, TextFormat};
use streamdelta_store::BlobStore;

const FALLBACK_TIMEOUT_SECS: u64 = 15;

#[derive(Clone)]
pub(crate) struct Services {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn BlobStore>,
    pub channel: Arc<dyn MessageChannel>,
}

impl Services {
    pub(crate) fn from_config(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let store = streamdelta_store::store_from_config(&config.store, config.request_timeout_secs)
            .context("failed to build blob store")?;

        let channel: Arc<dyn MessageChannel> = match &config.telegram_bot_token {
            Some(token) => Arc::new(
                TelegramChannel::with_base_url(
                    token,
                    config.request_timeout_secs,
                    &config.telegram_api_base,
                )
                .context("failed to build Telegram channel")?,
            ),
            None => {
                tracing::warn!("TELEGRAM_BOT_TOKEN not set; messages go to stdout");
                Arc::new(ConsoleChannel)
            }
        };

        Ok(Self {
            config,
            store,
            channel,
        })
    }
}

/// Suggested command for retrying a failed check.
pub(crate) fn retry_hint(tenant: &TenantId) -> String {
    format!("🔄 Retry with <code>streamdelta check --tenant {tenant}</code>")
}

/// Telegram channel built from the messaging variables alone, for reporting
/// a configuration that failed to load. `None` without a bot token.
pub(crate) fn fallback_channel<F>(lookup: F) -> Option<TelegramChannel>
where
    F: Fn(&str) -> Option<String>,
{
    let token = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.trim().is_empty())?;
    let base = lookup("STREAMDELTA_TELEGRAM_API_BASE")
        .unwrap_or_else(|| "https://api.telegram.org".to_owned());
    match TelegramChannel::with_base_url(&token, FALLBACK_TIMEOUT_SECS, &base) {
        Ok(channel) => Some(channel),
        Err(e) => {
            tracing::warn!(error = %e, "config: cannot build fallback Telegram channel");
            None
        }
    }
}

/// Tells the tenant the run could not start. Returns whether the message
/// went out.
pub(crate) async fn notify_config_failure(
    channel: &dyn MessageChannel,
    tenant: &TenantId,
    error: &ConfigError,
) -> bool {
    let text = format!(
        "❌ <b>Configuration error</b>\n🛠️ Details: {}\n{}",
        escape_html(&error.to_string()),
        retry_hint(tenant)
    );
    notify(channel, tenant, &text, TextFormat::Html).await
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use streamdelta_report::MemoryChannel;

    use super::*;
    use crate::test_support::tenant;

    fn lookup_from_map<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| map.get(key).map(|v| (*v).to_owned())
    }

    #[test]
    fn fallback_channel_needs_a_token() {
        let empty = HashMap::new();
        assert!(fallback_channel(lookup_from_map(&empty)).is_none());

        let blank = HashMap::from([("TELEGRAM_BOT_TOKEN", "  ")]);
        assert!(fallback_channel(lookup_from_map(&blank)).is_none());

        let set = HashMap::from([("TELEGRAM_BOT_TOKEN", "123:abc")]);
        assert!(fallback_channel(lookup_from_map(&set)).is_some());
    }

    #[test]
    fn fallback_channel_rejects_malformed_base() {
        let env = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("STREAMDELTA_TELEGRAM_API_BASE", "not a url"),
        ]);
        assert!(fallback_channel(lookup_from_map(&env)).is_none());
    }

    #[tokio::test]
    async fn config_failure_notice_names_the_variable() {
        let channel = MemoryChannel::new();
        let error = ConfigError::MissingEnvVar("GITHUB_TOKEN".to_owned());

        assert!(notify_config_failure(&channel, &tenant("-42"), &error).await);

        let texts = channel.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("❌ <b>Configuration error</b>"));
        assert!(texts[0].contains("GITHUB_TOKEN"));
        assert!(texts[0].contains("streamdelta check --tenant -42"));
    }
}
