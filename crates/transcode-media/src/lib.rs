//! FFmpeg CLI wrapper for resolution transcodes.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:1`
//! - Duration and dimension probes via FFprobe
//! - Timeout enforcement that kills the whole process group
//! - The `Transcoder` trait the worker drives

pub mod command;
pub mod error;
pub mod probe;
pub mod progress;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, kill_process_group, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_dimensions, probe_duration, VideoDimensions};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use transcoder::{
    EncodingProfile, FfmpegTranscoder, TranscodeRequest, Transcoder, DEFAULT_PROFILE,
};
