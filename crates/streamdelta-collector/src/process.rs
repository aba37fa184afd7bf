//! Collection backend that runs an external scraper program per unit.
//!
//! Invokes `<program> <args…> <url>` and reads one JSON result from stdout.
//! A non-zero exit is retried with a fixed backoff; spawn and parse failures
//! are not.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use streamdelta_core::{AppConfig, CollectionUnit, PlaylistSnapshot};
use tokio::process::Command;

use crate::backend::{CollectorBackend, UnitExecutor};
use crate::error::CollectError;
use crate::normalize::parse_scraper_output;

const STDERR_TAIL_CHARS: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl ProcessConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            program: config.scraper_program.clone(),
            args: config.scraper_args.clone(),
            max_attempts: config.scraper_max_attempts,
            retry_delay: Duration::from_secs(config.scraper_retry_delay_secs),
        }
    }
}

pub struct ProcessBackend {
    config: Arc<ProcessConfig>,
}

impl ProcessBackend {
    #[must_use]
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl CollectorBackend for ProcessBackend {
    async fn launch(&self, slot: usize) -> Result<Box<dyn UnitExecutor>, CollectError> {
        let program = &self.config.program;
        // Bare names are resolved through PATH at spawn time.
        if program.contains('/') && !Path::new(program).exists() {
            return Err(CollectError::Launch(format!("scraper program not found: {program}")));
        }
        tracing::debug!(slot, program = %program, "collector: executor ready");
        Ok(Box::new(ProcessExecutor {
            config: Arc::clone(&self.config),
            slot,
        }))
    }
}

struct ProcessExecutor {
    config: Arc<ProcessConfig>,
    slot: usize,
}

impl ProcessExecutor {
    async fn run_once(&self, unit: &CollectionUnit) -> Result<PlaylistSnapshot, CollectError> {
        let output = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(&unit.url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CollectError::Spawn {
                program: self.config.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(CollectError::ExitStatus {
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        parse_scraper_output(unit, &String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl UnitExecutor for ProcessExecutor {
    async fn collect(&mut self, unit: &CollectionUnit) -> Result<PlaylistSnapshot, CollectError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match self.run_once(unit).await {
                Err(err @ CollectError::ExitStatus { .. }) if attempt < max_attempts => {
                    tracing::warn!(
                        slot = self.slot,
                        unit = %unit.id,
                        attempt,
                        max_attempts,
                        error = %err,
                        "collector: scraper failed, retrying after backoff"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars().skip(skip).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn unit() -> CollectionUnit {
        CollectionUnit::parse("https://app.artist.tools/playlist/P1").unwrap()
    }

    fn shell(script: &str, max_attempts: u32) -> ProcessBackend {
        ProcessBackend::new(ProcessConfig {
            program: "sh".to_owned(),
            args: vec!["-c".to_owned(), script.to_owned(), "scrape".to_owned()],
            max_attempts,
            retry_delay: Duration::ZERO,
        })
    }

    #[tokio::test]
    async fn passes_url_and_parses_stdout() {
        let backend = shell(
            r#"printf '{"playlistName":"%s","tracks":[{"title":"T","streams":3}]}' "$1""#,
            1,
        );
        let mut executor = backend.launch(0).await.unwrap();
        let snapshot = executor.collect(&unit()).await.unwrap();
        assert_eq!(snapshot.name, "https://app.artist.tools/playlist/P1");
        assert_eq!(snapshot.aggregate_streams, Some(3));
    }

    #[tokio::test]
    async fn non_zero_exit_is_retried_up_to_max_attempts() {
        let dir = std::env::temp_dir().join(format!("streamdelta-retry-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let counter = dir.join("count");
        let _ = std::fs::remove_file(&counter);

        let script = format!(
            "echo x >> {path}; echo boom >&2; exit 3",
            path = counter.display()
        );
        let backend = shell(&script, 3);
        let mut executor = backend.launch(0).await.unwrap();
        let err = executor.collect(&unit()).await.unwrap_err();

        assert!(matches!(err, CollectError::ExitStatus { code: Some(3), ref stderr } if stderr == "boom"));
        let runs = std::fs::read_to_string(&counter).unwrap().lines().count();
        assert_eq!(runs, 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn parse_failure_is_not_retried() {
        let backend = shell("echo not-json", 3);
        let mut executor = backend.launch(0).await.unwrap();
        let err = executor.collect(&unit()).await.unwrap_err();
        assert!(matches!(err, CollectError::Parse { .. }));
    }

    #[tokio::test]
    async fn missing_program_path_fails_launch() {
        let backend = ProcessBackend::new(ProcessConfig {
            program: "/nonexistent/streamdelta-scrape".to_owned(),
            args: Vec::new(),
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        });
        assert!(matches!(backend.launch(0).await, Err(CollectError::Launch(_))));
    }

    #[test]
    fn stderr_tail_keeps_the_end() {
        let long = "a".repeat(400) + "END";
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("END"));
    }
}
