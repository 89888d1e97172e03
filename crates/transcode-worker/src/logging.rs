//! Structured job logging utilities.
//!
//! Keeps the `job_id` and `resolution` fields consistent across the
//! executor and the sub-task runner.

use tracing::{error, info, warn};
use transcode_models::JobId;

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    resolution: Option<String>,
}

impl JobLogger {
    /// Logger for job-level events.
    pub fn new(job_id: &JobId) -> Self {
        Self {
            job_id: job_id.to_string(),
            resolution: None,
        }
    }

    /// Logger for one resolution of a job.
    pub fn for_resolution(job_id: &JobId, resolution: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            resolution: Some(resolution.to_string()),
        }
    }

    fn resolution_field(&self) -> &str {
        self.resolution.as_deref().unwrap_or("-")
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            resolution = %self.resolution_field(),
            "Started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            resolution = %self.resolution_field(),
            "Progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            resolution = %self.resolution_field(),
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            resolution = %self.resolution_field(),
            "Error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            resolution = %self.resolution_field(),
            "Completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::from("job-123");
        let logger = JobLogger::new(&job_id);
        assert_eq!(logger.job_id(), "job-123");
        assert_eq!(logger.resolution(), None);

        let logger = JobLogger::for_resolution(&job_id, "720p");
        assert_eq!(logger.resolution(), Some("720p"));
    }
}
