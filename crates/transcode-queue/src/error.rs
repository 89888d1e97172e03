//! Queue error types.

use thiserror::Error;
use transcode_models::{JobError, JobId};

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job ID already exists: {0}")]
    DuplicateJob(JobId),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Concurrent updates to job {job_id} did not settle after {attempts} attempts")]
    UpdateConflict { job_id: JobId, attempts: u32 },

    #[error("Job invariant violated: {0}")]
    Job(#[from] JobError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn invalid_job(msg: impl Into<String>) -> Self {
        Self::InvalidJob(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Whether the failure means the store could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            QueueError::StoreUnavailable(_) => true,
            QueueError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_refusal()
                    || e.is_connection_dropped()
                    || e.is_timeout()
            }
            _ => false,
        }
    }
}
