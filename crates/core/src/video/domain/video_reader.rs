use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sequential frame source for one segmentation pass.
///
/// `open` must report fps, frame count, dimensions and codec before any
/// frame is read; `frames` then yields frames in strictly increasing index
/// order until the source is exhausted.
pub trait VideoReader: Send {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    /// Releases decoder resources. Must be safe to call more than once.
    fn close(&mut self);
}

/// Builds a fresh, unopened reader for each source in a batch.
pub type ReaderFactory = Box<dyn Fn() -> Box<dyn VideoReader> + Send>;
