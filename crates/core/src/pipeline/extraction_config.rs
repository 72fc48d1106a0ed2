use std::path::PathBuf;
use std::time::Duration;

use crate::shared::constants::{DEFAULT_OUTPUT_DIR, DEFAULT_RELEASE_TIMEOUT_SECS};

/// Settings of one segmentation pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionConfig {
    /// Frames between oracle checks; 1 checks every frame.
    pub stride: usize,
    /// Fixed fragment length in seconds. `None` records until the first
    /// invalid check.
    pub duration: Option<u32>,
    pub output_dir: PathBuf,
    pub temp_dir: PathBuf,
    /// Frames before this index are decoded and skipped.
    pub start_frame: usize,
    /// Longest wait for an encoder or decoder to close.
    pub release_timeout: Duration,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            stride: 1,
            duration: None,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            temp_dir: std::env::temp_dir(),
            start_frame: 0,
            release_timeout: Duration::from_secs(DEFAULT_RELEASE_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.stride, 1);
        assert_eq!(config.duration, None);
        assert_eq!(config.output_dir, PathBuf::from("./output"));
        assert_eq!(config.temp_dir, std::env::temp_dir());
        assert_eq!(config.release_timeout, Duration::from_secs(30));
    }
}
