//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Concurrent transcodes across all jobs in this process
    pub max_transcodes: usize,
    /// Ceiling for a single resolution transcode
    pub subtask_timeout: Duration,
    /// Idle backoff when nothing can be admitted
    pub poll_interval: Duration,
    /// Directory receiving `<job_id>_<label>.mp4` artifacts
    pub output_dir: PathBuf,
    /// Store connection attempts at startup
    pub startup_retries: u32,
    /// Delay between startup connection attempts
    pub startup_retry_delay: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Prometheus listener address, disabled when unset
    pub metrics_addr: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_transcodes: 2,
            subtask_timeout: Duration::from_secs(3600), // 1 hour
            poll_interval: Duration::from_millis(1000),
            output_dir: PathBuf::from("videos"),
            startup_retries: 5,
            startup_retry_delay: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(30),
            metrics_addr: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_transcodes: std::env::var("WORKER_MAX_TRANSCODES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(2),
            subtask_timeout: Duration::from_secs(
                std::env::var("WORKER_SUBTASK_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            poll_interval: Duration::from_millis(
                std::env::var("WORKER_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            output_dir: std::env::var("WORKER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("videos")),
            startup_retries: std::env::var("WORKER_STARTUP_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            startup_retry_delay: Duration::from_secs(
                std::env::var("WORKER_STARTUP_RETRY_DELAY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_transcodes, 2);
        assert_eq!(config.subtask_timeout, Duration::from_secs(3600));
        assert_eq!(config.startup_retries, 5);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_blank_metrics_addr_is_disabled() {
        std::env::set_var("METRICS_ADDR", "  ");
        let config = WorkerConfig::from_env();
        std::env::remove_var("METRICS_ADDR");
        assert!(config.metrics_addr.is_none());
    }
}
