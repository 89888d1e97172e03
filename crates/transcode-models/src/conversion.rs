//! Per-resolution conversion state.

use serde::{Deserialize, Serialize};

use crate::status::ConversionStatus;

/// Highest progress a conversion may report before its artifact is confirmed.
pub const MAX_RUNNING_PROGRESS: f64 = 98.0;

/// State of one (job, resolution) transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionTask {
    /// Resolution label this task produces
    pub resolution: String,
    /// Current status
    #[serde(default)]
    pub status: ConversionStatus,
    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: f64,
    /// Reference to the finished artifact
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Diagnostic text if the conversion failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionTask {
    /// Create a waiting task for a resolution label.
    pub fn new(resolution: impl Into<String>) -> Self {
        Self {
            resolution: resolution.into(),
            status: ConversionStatus::Waiting,
            progress: 0.0,
            output_url: None,
            error: None,
        }
    }

    /// Splice a partial update into this task.
    ///
    /// Terminal tasks ignore non-terminal updates. While processing, progress
    /// never moves backwards. Only a completed task carries 100 and an
    /// output reference.
    pub fn apply(&mut self, update: &ConversionUpdate) {
        if self.status.is_terminal() && !update.status.is_terminal() {
            return;
        }

        let previous_status = self.status;
        let previous_progress = self.progress;
        self.status = update.status;

        self.progress = match update.status {
            ConversionStatus::Completed => 100.0,
            status => {
                let requested = update
                    .progress
                    .filter(|p| p.is_finite())
                    .unwrap_or(previous_progress);
                let clamped = requested.clamp(0.0, MAX_RUNNING_PROGRESS);
                if status == ConversionStatus::Processing
                    && previous_status == ConversionStatus::Processing
                {
                    clamped.max(previous_progress)
                } else {
                    clamped
                }
            }
        };

        if let Some(output_url) = &update.output_url {
            self.output_url = Some(output_url.clone());
        }
        match update.status {
            ConversionStatus::Completed => self.error = None,
            status => {
                // Only a completed conversion may point at an artifact
                if status == ConversionStatus::Failed {
                    self.output_url = None;
                }
                if let Some(error) = &update.error {
                    self.error = Some(error.clone());
                }
            }
        }
    }

    /// Whether the artifact for this conversion can be served.
    pub fn is_downloadable(&self) -> bool {
        self.status == ConversionStatus::Completed
    }
}

/// Partial status reported for one resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionUpdate {
    pub status: ConversionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConversionUpdate {
    /// Progress tick while the external tool is running.
    pub fn processing(progress: f64) -> Self {
        Self {
            status: ConversionStatus::Processing,
            progress: Some(progress),
            output_url: None,
            error: None,
        }
    }

    /// Successful finish with the artifact reference.
    pub fn completed(output_url: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Completed,
            progress: Some(100.0),
            output_url: Some(output_url.into()),
            error: None,
        }
    }

    /// Failure with captured diagnostic text.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Failed,
            progress: Some(0.0),
            output_url: None,
            error: Some(error.into()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_never_decreases_while_processing() {
        let mut task = ConversionTask::new("720p");
        task.apply(&ConversionUpdate::processing(40.0));
        task.apply(&ConversionUpdate::processing(25.0));
        assert_eq!(task.progress, 40.0);

        task.apply(&ConversionUpdate::processing(60.0));
        assert_eq!(task.progress, 60.0);
    }

    #[test]
    fn test_running_progress_is_clamped() {
        let mut task = ConversionTask::new("720p");
        task.apply(&ConversionUpdate::processing(150.0));
        assert_eq!(task.progress, MAX_RUNNING_PROGRESS);
        assert_eq!(task.status, ConversionStatus::Processing);

        task.apply(&ConversionUpdate::processing(f64::NAN));
        assert_eq!(task.progress, MAX_RUNNING_PROGRESS);
    }

    #[test]
    fn test_completed_means_full_progress() {
        let mut task = ConversionTask::new("480p");
        task.apply(&ConversionUpdate::processing(50.0));
        task.apply(&ConversionUpdate::completed("/download/j1/480p"));

        assert_eq!(task.status, ConversionStatus::Completed);
        assert_eq!(task.progress, 100.0);
        assert_eq!(task.output_url.as_deref(), Some("/download/j1/480p"));
        assert!(task.is_downloadable());
    }

    #[test]
    fn test_failed_keeps_diagnostic_below_full_progress() {
        let mut task = ConversionTask::new("1080p");
        task.apply(&ConversionUpdate::processing(70.0));
        task.apply(&ConversionUpdate::failed("FFmpeg failed: boom"));

        assert_eq!(task.status, ConversionStatus::Failed);
        assert!(task.progress < 100.0);
        assert_eq!(task.error.as_deref(), Some("FFmpeg failed: boom"));
        assert!(!task.is_downloadable());
    }

    #[test]
    fn test_failure_after_completion_drops_artifact_reference() {
        let mut task = ConversionTask::new("720p");
        task.apply(&ConversionUpdate::completed("/download/j1/720p"));
        task.apply(&ConversionUpdate::failed("Operation timed out after 3600 seconds"));

        assert_eq!(task.status, ConversionStatus::Failed);
        assert_eq!(task.output_url, None);
        assert_eq!(task.progress, 0.0);
        assert!(!task.is_downloadable());
    }

    #[test]
    fn test_terminal_task_ignores_late_ticks() {
        let mut task = ConversionTask::new("720p");
        task.apply(&ConversionUpdate::completed("/download/j1/720p"));
        task.apply(&ConversionUpdate::processing(10.0));

        assert_eq!(task.status, ConversionStatus::Completed);
        assert_eq!(task.progress, 100.0);
    }
}
