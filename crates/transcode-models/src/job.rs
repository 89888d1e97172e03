//! Job document tracked by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::conversion::{ConversionTask, ConversionUpdate};
use crate::status::{ConversionStatus, JobStatus};

/// Caller-supplied unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Errors raised when a mutation would break a job invariant.
#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("Job {job_id} has no conversion for resolution {resolution}")]
    UnknownResolution { job_id: JobId, resolution: String },

    #[error("Cannot finalize job with non-terminal status {0}")]
    NotTerminal(JobStatus),
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Opaque source locator (a local path for the FFmpeg transcoder)
    pub input_url: String,
    /// Requested target labels, in request order, without duplicates
    pub resolutions: Vec<String>,
}

/// A transcoding job: one source, several target resolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,

    #[serde(default)]
    pub status: JobStatus,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Mean progress over all conversions
    #[serde(default)]
    pub progress: f64,

    /// Job-level fault, separate from per-resolution diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Keys are fixed at creation and equal `job_data.resolutions`
    pub conversions: BTreeMap<String, ConversionTask>,

    pub job_data: JobRequest,
}

impl Job {
    /// Create a waiting job. Repeated labels collapse to their first occurrence.
    pub fn new(
        job_id: impl Into<JobId>,
        input_url: impl Into<String>,
        resolutions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut ordered: Vec<String> = Vec::new();
        for label in resolutions.into_iter().map(Into::into) {
            if !ordered.contains(&label) {
                ordered.push(label);
            }
        }

        let conversions = ordered
            .iter()
            .map(|label| (label.clone(), ConversionTask::new(label.clone())))
            .collect();

        Self {
            job_id: job_id.into(),
            status: JobStatus::Waiting,
            started_at: Utc::now(),
            completed_at: None,
            progress: 0.0,
            error: None,
            conversions,
            job_data: JobRequest {
                input_url: input_url.into(),
                resolutions: ordered,
            },
        }
    }

    /// Requested target labels in request order.
    pub fn target_resolutions(&self) -> &[String] {
        &self.job_data.resolutions
    }

    /// Source locator.
    pub fn input_url(&self) -> &str {
        &self.job_data.input_url
    }

    pub fn conversion(&self, resolution: &str) -> Option<&ConversionTask> {
        self.conversions.get(resolution)
    }

    /// Splice an update into one conversion and refresh the overall progress.
    pub fn apply_update(
        &mut self,
        resolution: &str,
        update: &ConversionUpdate,
    ) -> Result<(), JobError> {
        let task = self
            .conversions
            .get_mut(resolution)
            .ok_or_else(|| JobError::UnknownResolution {
                job_id: self.job_id.clone(),
                resolution: resolution.to_string(),
            })?;
        task.apply(update);
        self.recompute_progress();
        Ok(())
    }

    /// Arithmetic mean of all conversions' progress.
    pub fn recompute_progress(&mut self) {
        if self.conversions.is_empty() {
            self.progress = 0.0;
            return;
        }
        let total: f64 = self.conversions.values().map(|c| c.progress).sum();
        self.progress = total / self.conversions.len() as f64;
    }

    /// Terminal status implied by the conversions, once none is still running.
    pub fn outcome(&self) -> Option<JobStatus> {
        if self
            .conversions
            .values()
            .any(|c| !c.status.is_terminal())
        {
            return None;
        }
        let all_completed = self
            .conversions
            .values()
            .all(|c| c.status == ConversionStatus::Completed);
        Some(if all_completed {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        })
    }

    /// Admission by the gate.
    pub fn mark_pending(&mut self) {
        self.status = JobStatus::Pending;
    }

    /// Picked up by the executor.
    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
    }

    /// Set the terminal status and completion time.
    pub fn finalize(
        &mut self,
        status: JobStatus,
        completed_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Result<(), JobError> {
        if !status.is_terminal() {
            return Err(JobError::NotTerminal(status));
        }
        self.status = status;
        self.completed_at = Some(completed_at);
        if error.is_some() {
            self.error = error;
        }
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
