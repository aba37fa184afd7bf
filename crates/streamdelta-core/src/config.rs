use crate::app_config::{AppConfig, Environment, StoreConfig};
use crate::ConfigError;

const MAX_DEFAULT_EXECUTORS: usize = 4;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can use a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_positive_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let value = parse_u64(var, default)?;
        if value == 0 {
            return Err(invalid(var, "must be greater than zero".to_string()));
        }
        Ok(value)
    };

    let env = parse_environment(&or_default("STREAMDELTA_ENV", "development"))?;
    let bind_addr = parse_addr("STREAMDELTA_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("STREAMDELTA_LOG_LEVEL", "info");
    let api_keys = split_list(&or_default("STREAMDELTA_API_KEYS", ""), ',');

    let store = match or_default("STREAMDELTA_STORE", "github").as_str() {
        "github" => {
            let token = require("GITHUB_TOKEN")?;
            let repo = require("STREAMDELTA_GITHUB_REPO")?;
            validate_repo(&repo).map_err(|reason| invalid("STREAMDELTA_GITHUB_REPO", reason))?;
            let api_base = or_default("STREAMDELTA_GITHUB_API_BASE", "https://api.github.com");
            StoreConfig::Github {
                token,
                repo,
                api_base: api_base.trim_end_matches('/').to_string(),
            }
        }
        "local" => StoreConfig::Local {
            root: PathBuf::from(or_default("STREAMDELTA_STORE_DIR", "./store")),
        },
        other => {
            return Err(invalid(
                "STREAMDELTA_STORE",
                format!("unknown store backend \"{other}\"; expected github or local"),
            ))
        }
    };

    let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let telegram_api_base = or_default(
        "STREAMDELTA_TELEGRAM_API_BASE",
        "https://api.telegram.org",
    )
    .trim_end_matches('/')
    .to_string();
    let request_timeout_secs = parse_positive_u64("STREAMDELTA_REQUEST_TIMEOUT_SECS", "15")?;

    let scraper_program = or_default("STREAMDELTA_SCRAPER_PROGRAM", "streamdelta-scrape");
    let scraper_args = split_list(&or_default("STREAMDELTA_SCRAPER_ARGS", ""), ' ');
    let scraper_max_attempts = parse_u32("STREAMDELTA_SCRAPER_MAX_ATTEMPTS", "3")?.max(1);
    let scraper_retry_delay_secs = parse_u64("STREAMDELTA_SCRAPER_RETRY_DELAY_SECS", "20")?;

    let default_executors = default_pool_size().to_string();
    let pool_max_executors =
        parse_usize("STREAMDELTA_POOL_MAX_EXECUTORS", &default_executors)?.max(1);
    let round_timeout_secs = parse_positive_u64("STREAMDELTA_ROUND_TIMEOUT_SECS", "600")?;
    let unit_timeout_secs = parse_positive_u64("STREAMDELTA_UNIT_TIMEOUT_SECS", "300")?;
    let collect_timeout_secs = parse_positive_u64("STREAMDELTA_COLLECT_TIMEOUT_SECS", "900")?;
    let poll_max_wait_secs = parse_u64("STREAMDELTA_POLL_MAX_WAIT_SECS", "300")?;
    let poll_interval_secs = parse_positive_u64("STREAMDELTA_POLL_INTERVAL_SECS", "5")?;

    let report_chunk_chars = parse_usize("STREAMDELTA_REPORT_CHUNK_CHARS", "4000")?;
    if report_chunk_chars == 0 {
        return Err(invalid(
            "STREAMDELTA_REPORT_CHUNK_CHARS",
            "must be greater than zero".to_string(),
        ));
    }
    let report_chunk_delay_ms = parse_u64("STREAMDELTA_REPORT_CHUNK_DELAY_MS", "300")?;

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        api_keys,
        store,
        telegram_bot_token,
        telegram_api_base,
        request_timeout_secs,
        scraper_program,
        scraper_args,
        scraper_max_attempts,
        scraper_retry_delay_secs,
        pool_max_executors,
        round_timeout_secs,
        unit_timeout_secs,
        collect_timeout_secs,
        poll_max_wait_secs,
        poll_interval_secs,
        report_chunk_chars,
        report_chunk_delay_ms,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "production" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        other => Err(ConfigError::InvalidEnvVar {
            var: "STREAMDELTA_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

fn split_list(raw: &str, sep: char) -> Vec<String> {
    raw.split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

fn validate_repo(repo: &str) -> Result<(), String> {
    match repo.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok(())
        }
        _ => Err(format!("expected owner/name, got \"{repo}\"")),
    }
}

fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map_or(1, std::num::NonZeroUsize::get)
        .min(MAX_DEFAULT_EXECUTORS)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
