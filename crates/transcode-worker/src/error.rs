//! Worker error types.

use thiserror::Error;
use transcode_models::JobId;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Artifact unavailable for job {job_id} resolution {resolution}: {reason}")]
    ArtifactUnavailable {
        job_id: JobId,
        resolution: String,
        reason: String,
    },

    #[error("Queue error: {0}")]
    Queue(#[from] transcode_queue::QueueError),
}

impl WorkerError {
    pub fn artifact_unavailable(
        job_id: &JobId,
        resolution: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ArtifactUnavailable {
            job_id: job_id.clone(),
            resolution: resolution.into(),
            reason: reason.into(),
        }
    }

    /// Check if the store could not be reached.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, WorkerError::Queue(e) if e.is_store_unavailable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcode_queue::QueueError;

    #[test]
    fn test_store_outage_classification() {
        let err = WorkerError::from(QueueError::store_unavailable("connection refused"));
        assert!(err.is_store_unavailable());

        let err = WorkerError::artifact_unavailable(&JobId::from("j1"), "720p", "conversion is failed");
        assert!(!err.is_store_unavailable());
        assert_eq!(
            err.to_string(),
            "Artifact unavailable for job j1 resolution 720p: conversion is failed"
        );
    }
}
