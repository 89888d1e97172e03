//! Resolution labels and their target frame sizes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target frame size for a resolution label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Size used when a label is not in the table.
pub const DEFAULT_RESOLUTION: Resolution = Resolution::new(854, 480);

const RESOLUTION_TABLE: &[(&str, Resolution)] = &[
    ("4K", Resolution::new(3840, 2160)),
    ("1080p", Resolution::new(1920, 1080)),
    ("720p", Resolution::new(1280, 720)),
    ("480p", Resolution::new(854, 480)),
    ("360p", Resolution::new(640, 360)),
    ("240p", Resolution::new(426, 240)),
    ("144p", Resolution::new(256, 144)),
];

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Look up a label, falling back to [`DEFAULT_RESOLUTION`] for unknown labels.
    pub fn from_label(label: &str) -> Self {
        Self::lookup(label).unwrap_or(DEFAULT_RESOLUTION)
    }

    /// Exact table lookup.
    pub fn lookup(label: &str) -> Option<Self> {
        RESOLUTION_TABLE
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, res)| *res)
    }

    /// FFmpeg scale filter for this size.
    pub fn scale_filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert_eq!(Resolution::from_label("4K"), Resolution::new(3840, 2160));
        assert_eq!(Resolution::from_label("1080p"), Resolution::new(1920, 1080));
        assert_eq!(Resolution::from_label("720p"), Resolution::new(1280, 720));
        assert_eq!(Resolution::from_label("144p"), Resolution::new(256, 144));
    }

    #[test]
    fn test_unknown_label_falls_back() {
        assert_eq!(Resolution::from_label("8K"), DEFAULT_RESOLUTION);
        assert_eq!(Resolution::from_label(""), DEFAULT_RESOLUTION);
        assert!(Resolution::lookup("8K").is_none());
    }

    #[test]
    fn test_scale_filter() {
        assert_eq!(Resolution::from_label("720p").scale_filter(), "scale=1280:720");
    }
}
