//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing or transcoding a source.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Input file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Failed to probe video: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("FFmpeg failed: {message}")]
    TranscodeFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create an FFmpeg failure error.
    pub fn transcode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::TranscodeFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Human-readable diagnostic including captured tool output.
    pub fn diagnostic(&self) -> String {
        let stderr = match self {
            MediaError::ProbeFailed { stderr, .. } | MediaError::TranscodeFailed { stderr, .. } => {
                stderr.as_deref().map(str::trim).filter(|s| !s.is_empty())
            }
            _ => None,
        };
        match stderr {
            Some(stderr) => format!("{}\n{}", self, stderr),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_includes_stderr() {
        let err = MediaError::transcode_failed(
            "exited with status 1",
            Some("Invalid data found when processing input\n".into()),
            Some(1),
        );
        assert_eq!(
            err.diagnostic(),
            "FFmpeg failed: exited with status 1\nInvalid data found when processing input"
        );
    }

    #[test]
    fn test_diagnostic_without_stderr() {
        let err = MediaError::SourceNotFound(PathBuf::from("/missing.mp4"));
        assert_eq!(err.diagnostic(), "Input file not found: /missing.mp4");
    }
}
