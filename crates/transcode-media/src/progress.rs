//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Current FPS
    pub fps: f64,
    /// Encoded output time in milliseconds
    pub out_time_ms: i64,
    /// Encoded output time as string (HH:MM:SS.microseconds)
    pub out_time: String,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether FFmpeg reported the end of the stream
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Calculate progress percentage given total duration in seconds.
    pub fn percentage(&self, total_duration_secs: f64) -> f64 {
        if total_duration_secs.is_nan() || total_duration_secs <= 0.0 {
            return 0.0;
        }
        let elapsed_secs = self.out_time_ms as f64 / 1000.0;
        ((elapsed_secs / total_duration_secs) * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + 'static>;

/// Parse `HH:MM:SS.micro` into milliseconds.
pub fn parse_out_time(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }
    let mut parts = value.splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let total = hours * 3600.0 + minutes * 60.0 + seconds;
    if !total.is_finite() {
        return None;
    }
    Some((total * 1000.0).round() as i64)
}

/// Parse a line of FFmpeg's `-progress` output.
///
/// Returns a snapshot on every elapsed-time tick (`out_time=`).
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();
    let (key, value) = line.split_once('=')?;

    match key {
        "out_time" => {
            let ms = parse_out_time(value)?;
            current.out_time = value.to_string();
            current.out_time_ms = ms;
            return Some(current.clone());
        }
        // Both keys carry microseconds; out_time_ms is misnamed upstream.
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "fps" => {
            if let Ok(fps) = value.parse() {
                current.fps = fps;
            }
        }
        "speed" => {
            if let Some(speed) = value
                .strip_suffix('x')
                .and_then(|s| s.trim().parse().ok())
            {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
        }
        _ => {}
    }

    None
}
