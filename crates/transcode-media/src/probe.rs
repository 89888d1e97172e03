//! FFprobe source information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Native frame size of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

async fn run_ffprobe(path: &Path, args: &[&str]) -> MediaResult<String> {
    if !path.exists() {
        return Err(MediaError::SourceNotFound(path.to_path_buf()));
    }

    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::probe_failed(
            format!("FFprobe exited with {}", output.status),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Get source duration in seconds.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let stdout = run_ffprobe(
        path.as_ref(),
        &[
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
    )
    .await?;
    parse_duration(&stdout)
}

/// Get width and height of the first video stream.
pub async fn probe_dimensions(path: impl AsRef<Path>) -> MediaResult<VideoDimensions> {
    let stdout = run_ffprobe(
        path.as_ref(),
        &[
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0",
        ],
    )
    .await?;
    parse_dimensions(&stdout)
}

/// Parse ffprobe's bare duration output (e.g. `12.345000`).
pub fn parse_duration(output: &str) -> MediaResult<f64> {
    let value = output.trim();
    let duration: f64 = value
        .parse()
        .map_err(|_| MediaError::probe_failed(format!("Invalid duration '{}'", value), None))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(MediaError::probe_failed(
            format!("Unusable duration {}", duration),
            None,
        ));
    }
    Ok(duration)
}

/// Parse ffprobe's `width,height` CSV output.
pub fn parse_dimensions(output: &str) -> MediaResult<VideoDimensions> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let invalid = || MediaError::probe_failed(format!("Invalid dimensions '{}'", line), None);

    let (width, height) = line.split_once(',').ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    // Some containers append a trailing separator
    let height: u32 = height
        .trim()
        .trim_end_matches(',')
        .parse()
        .map_err(|_| invalid())?;

    Ok(VideoDimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert!((parse_duration("12.345000\n").unwrap() - 12.345).abs() < 1e-9);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("0.000000").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(
            parse_dimensions("1920,1080\n").unwrap(),
            VideoDimensions {
                width: 1920,
                height: 1080
            }
        );
        assert_eq!(
            parse_dimensions("\n640,360,\n").unwrap(),
            VideoDimensions {
                width: 640,
                height: 360
            }
        );
        assert!(parse_dimensions("").is_err());
        assert!(parse_dimensions("1920x1080").is_err());
    }

    #[tokio::test]
    async fn test_missing_source_is_not_probed() {
        let err = probe_duration("/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::SourceNotFound(_)));
    }
}
