//! The external transcoding tool seen by the worker.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use transcode_models::Resolution;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{self, VideoDimensions};
use crate::progress::ProgressCallback;

/// Fixed encoding parameters applied to every resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingProfile {
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    pub crf: u8,
    pub preset: &'static str,
}

/// Constant-quality H.264 at the medium speed preset.
pub const DEFAULT_PROFILE: EncodingProfile = EncodingProfile {
    video_codec: "libx264",
    audio_codec: "aac",
    crf: 23,
    preset: "medium",
};

/// One source → one target size.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target: Resolution,
    /// Hard ceiling; the tool is killed when it expires
    pub timeout: Option<Duration>,
}

impl TranscodeRequest {
    /// Build the FFmpeg invocation for this request.
    pub fn to_command(&self, profile: &EncodingProfile) -> FfmpegCommand {
        FfmpegCommand::new(&self.input, &self.output)
            .video_codec(profile.video_codec)
            .crf(profile.crf)
            .preset(profile.preset)
            .video_filter(self.target.scale_filter())
            .audio_codec(profile.audio_codec)
    }
}

/// Probe and transcode capability of the external tool.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Resolve an opaque source locator to a readable file.
    async fn resolve_source(&self, input_url: &str) -> MediaResult<PathBuf> {
        let path = PathBuf::from(input_url);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(MediaError::SourceNotFound(path)),
        }
    }

    /// Source duration in seconds.
    async fn probe_duration(&self, source: &Path) -> MediaResult<f64>;

    /// Native frame size of the source.
    async fn probe_dimensions(&self, source: &Path) -> MediaResult<VideoDimensions>;

    /// Run the transcode, reporting every elapsed-time tick.
    async fn transcode(
        &self,
        request: &TranscodeRequest,
        on_progress: ProgressCallback,
    ) -> MediaResult<()>;
}

/// `Transcoder` backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    profile: EncodingProfile,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            profile: DEFAULT_PROFILE,
        }
    }
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn probe_duration(&self, source: &Path) -> MediaResult<f64> {
        probe::probe_duration(source).await
    }

    async fn probe_dimensions(&self, source: &Path) -> MediaResult<VideoDimensions> {
        probe::probe_dimensions(source).await
    }

    async fn transcode(
        &self,
        request: &TranscodeRequest,
        on_progress: ProgressCallback,
    ) -> MediaResult<()> {
        let cmd = request.to_command(&self.profile);
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = request.timeout {
            runner = runner.with_timeout(timeout);
        }
        runner
            .run_with_progress(&cmd, move |progress| on_progress(progress))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_fixed_profile() {
        let request = TranscodeRequest {
            input: PathBuf::from("/videos/in.mp4"),
            output: PathBuf::from("/videos/j1_720p.mp4"),
            target: Resolution::from_label("720p"),
            timeout: None,
        };
        let args = request.to_command(&DEFAULT_PROFILE).build_args();

        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "medium"]));
        assert!(args.windows(2).any(|w| w == ["-vf", "scale=1280:720"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert_eq!(args.last().map(String::as_str), Some("/videos/j1_720p.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"not really a video").unwrap();

        let transcoder = FfmpegTranscoder::new();
        let resolved = transcoder
            .resolve_source(source.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(resolved, source);

        let missing = dir.path().join("missing.mp4");
        let err = transcoder
            .resolve_source(missing.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceNotFound(_)));
    }
}
