use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which blob-store backend holds source lists, schedules and snapshots.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Github {
        token: String,
        repo: String,
        api_base: String,
    },
    Local {
        root: PathBuf,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Github { repo, api_base, .. } => f
                .debug_struct("Github")
                .field("token", &"[redacted]")
                .field("repo", repo)
                .field("api_base", api_base)
                .finish(),
            StoreConfig::Local { root } => f.debug_struct("Local").field("root", root).finish(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub api_keys: Vec<String>,
    pub store: StoreConfig,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
    pub request_timeout_secs: u64,
    pub scraper_program: String,
    pub scraper_args: Vec<String>,
    pub scraper_max_attempts: u32,
    pub scraper_retry_delay_secs: u64,
    pub pool_max_executors: usize,
    pub round_timeout_secs: u64,
    pub unit_timeout_secs: u64,
    pub collect_timeout_secs: u64,
    pub poll_max_wait_secs: u64,
    pub poll_interval_secs: u64,
    pub report_chunk_chars: usize,
    pub report_chunk_delay_ms: u64,
}

impl AppConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn round_timeout(&self) -> Duration {
        Duration::from_secs(self.round_timeout_secs)
    }

    #[must_use]
    pub fn unit_timeout(&self) -> Duration {
        Duration::from_secs(self.unit_timeout_secs)
    }

    #[must_use]
    pub fn collect_timeout(&self) -> Duration {
        Duration::from_secs(self.collect_timeout_secs)
    }

    #[must_use]
    pub fn poll_max_wait(&self) -> Duration {
        Duration::from_secs(self.poll_max_wait_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn report_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.report_chunk_delay_ms)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("store", &self.store)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "[redacted]"),
            )
            .field("telegram_api_base", &self.telegram_api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scraper_program", &self.scraper_program)
            .field("scraper_args", &self.scraper_args)
            .field("scraper_max_attempts", &self.scraper_max_attempts)
            .field("scraper_retry_delay_secs", &self.scraper_retry_delay_secs)
            .field("pool_max_executors", &self.pool_max_executors)
            .field("round_timeout_secs", &self.round_timeout_secs)
            .field("unit_timeout_secs", &self.unit_timeout_secs)
            .field("collect_timeout_secs", &self.collect_timeout_secs)
            .field("poll_max_wait_secs", &self.poll_max_wait_secs)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("report_chunk_chars", &self.report_chunk_chars)
            .field("report_chunk_delay_ms", &self.report_chunk_delay_ms)
            .finish()
    }
}
