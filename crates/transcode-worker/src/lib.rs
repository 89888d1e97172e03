//! Transcoding worker.
//!
//! This crate provides:
//! - The admission loop and per-job fan-out (`JobExecutor`)
//! - The per-resolution transcode driver (`SubtaskRunner`)
//! - Serialized job status updates (`StatusAggregator`)
//! - Artifact lookup for download handlers

pub mod aggregator;
pub mod artifact;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod runner;

pub use aggregator::StatusAggregator;
pub use artifact::{download_filename, locate_artifact};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use retry::{retry_async, FailureTracker, RetryConfig, RetryResult};
pub use runner::{output_path, output_url, SubtaskRunner};
