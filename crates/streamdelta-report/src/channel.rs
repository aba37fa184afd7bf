//! Messaging channel capability.
//!
//! Delivery is best-effort: callers log failures and carry on. Nothing here
//! retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use streamdelta_core::TenantId;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Html,
    Plain,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected message ({status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("invalid channel configuration: {0}")]
    Config(String),

    /// Injected failure from the in-memory channel.
    #[error("simulated channel failure")]
    Simulated,
}

#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn send(&self, tenant: &TenantId, text: &str, format: TextFormat) -> Result<(), ChannelError>;
}

/// Sends one message, logging instead of returning a failure.
pub async fn notify<C>(channel: &C, tenant: &TenantId, text: &str, format: TextFormat) -> bool
where
    C: MessageChannel + ?Sized,
{
    match channel.send(tenant, text, format).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(tenant = %tenant, error = %e, "channel: message not delivered");
            false
        }
    }
}

/// Sends `chunks` in order with `delay` between consecutive messages.
///
/// A failed chunk is logged and skipped. Returns the number delivered.
pub async fn deliver_paced<C>(
    channel: &C,
    tenant: &TenantId,
    chunks: &[String],
    format: TextFormat,
    delay: Duration,
) -> usize
where
    C: MessageChannel + ?Sized,
{
    let mut delivered = 0;
    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if notify(channel, tenant, chunk, format).await {
            delivered += 1;
        }
    }
    tracing::debug!(tenant = %tenant, delivered, total = chunks.len(), "channel: report delivered");
    delivered
}

/// Writes messages to stdout. Used when no messaging credential is set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleChannel;

#[async_trait]
impl MessageChannel for ConsoleChannel {
    async fn send(&self, tenant: &TenantId, text: &str, _format: TextFormat) -> Result<(), ChannelError> {
        println!("[{tenant}]\n{text}\n");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub tenant: TenantId,
    pub text: String,
    pub format: TextFormat,
}

/// Records messages in memory.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl MemoryChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.text).collect()
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn send(&self, tenant: &TenantId, text: &str, format: TextFormat) -> Result<(), ChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ChannelError::Simulated);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentMessage {
                tenant: tenant.clone(),
                text: text.to_owned(),
                format,
            });
        Ok(())
    }
}
