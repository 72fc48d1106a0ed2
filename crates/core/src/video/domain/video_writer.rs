use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Encoder for a single fragment file, sized from the source metadata.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes the encoder and writes the container trailer.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Builds a fresh, unopened writer for each fragment.
pub type WriterFactory = Box<dyn Fn() -> Box<dyn VideoWriter> + Send>;
