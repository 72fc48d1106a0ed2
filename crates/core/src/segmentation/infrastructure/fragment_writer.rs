use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::audio::domain::time_range::TimeRange;
use crate::pipeline::resource_guard::{release_guarded, ReleaseError};
use crate::segmentation::domain::fragment_naming::FragmentPaths;
use crate::segmentation::domain::fragment_state::OpenFragment;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::{VideoWriter, WriterFactory};

/// The encoder of one in-progress fragment, writing into its temp file.
///
/// Closing is explicit via [`close`](Self::close) or
/// [`discard`](Self::discard). A writer dropped while still open (early
/// return, unwinding) closes its encoder and removes the temp file.
pub struct FragmentWriter {
    writer: Option<Box<dyn VideoWriter>>,
    paths: FragmentPaths,
    start_index: usize,
    frames_written: usize,
    release_timeout: Duration,
}

/// A fragment whose encoder has been closed successfully.
#[derive(Clone, Debug, PartialEq)]
pub struct ClosedFragment {
    pub paths: FragmentPaths,
    pub start_index: usize,
    pub frames_written: usize,
}

impl ClosedFragment {
    /// Source time covered by the written frames, end exclusive.
    pub fn time_range(&self, fps: f64) -> TimeRange {
        TimeRange::for_frames(self.start_index, self.frames_written, fps)
    }
}

impl FragmentWriter {
    pub fn open(
        factory: &WriterFactory,
        paths: FragmentPaths,
        start_index: usize,
        metadata: &VideoMetadata,
        release_timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut writer = factory();
        if let Err(e) = writer.open(&paths.temp, metadata) {
            remove_temp(&paths.temp);
            return Err(e);
        }
        log::info!(
            "Started fragment at frame {start_index}: {}",
            paths.temp.display()
        );

        Ok(Self {
            writer: Some(writer),
            paths,
            start_index,
            frames_written: 0,
            release_timeout,
        })
    }

    pub fn paths(&self) -> &FragmentPaths {
        &self.paths
    }

    /// Encodes `frames` in order. They must continue the fragment without
    /// a gap.
    pub fn append(&mut self, frames: Vec<Frame>) -> Result<(), Box<dyn std::error::Error>> {
        let writer = self
            .writer
            .as_mut()
            .ok_or("fragment writer already closed")?;
        for frame in &frames {
            let expected = self.start_index + self.frames_written;
            if frame.index() != expected {
                return Err(format!(
                    "frame {} does not continue fragment {} (expected {expected})",
                    frame.index(),
                    self.start_index
                )
                .into());
            }
            writer.write(frame)?;
            self.frames_written += 1;
        }
        Ok(())
    }

    /// Closes the encoder through the guarded release. On failure the temp
    /// file is removed.
    pub fn close(mut self) -> Result<ClosedFragment, ReleaseError> {
        let closed = ClosedFragment {
            paths: self.paths.clone(),
            start_index: self.start_index,
            frames_written: self.frames_written,
        };
        match self.release() {
            Ok(()) => Ok(closed),
            Err(e) => {
                remove_temp(&closed.paths.temp);
                Err(e)
            }
        }
    }

    /// Closes the encoder and removes the temp file.
    pub fn discard(mut self) {
        if let Err(e) = self.release() {
            log::warn!("{e}");
        }
        remove_temp(&self.paths.temp);
    }

    fn release(&mut self) -> Result<(), ReleaseError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        release_guarded(
            "fragment writer",
            writer,
            self.release_timeout,
            |mut writer| writer.close().map_err(|e| e.to_string()),
        )
    }
}

impl OpenFragment for FragmentWriter {
    fn start_index(&self) -> usize {
        self.start_index
    }

    fn frames_written(&self) -> usize {
        self.frames_written
    }
}

impl Drop for FragmentWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            log::warn!(
                "Fragment at frame {} dropped while open, removing {}",
                self.start_index,
                self.paths.temp.display()
            );
            if let Err(e) = self.release() {
                log::warn!("{e}");
            }
            remove_temp(&self.paths.temp);
        }
    }
}

fn remove_temp(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// What a [`StubWriter`] saw, per fragment, in order.
    #[derive(Clone, Debug, PartialEq)]
    pub(crate) enum WriterEvent {
        Open(PathBuf),
        Write(usize),
        Close,
    }

    /// Writer stub: creates the target file on open and records calls.
    pub(crate) struct StubWriter {
        pub(crate) events: Arc<Mutex<Vec<WriterEvent>>>,
        pub(crate) fail_close: bool,
        pub(crate) close_delay: Option<Duration>,
    }

    impl VideoWriter for StubWriter {
        fn open(
            &mut self,
            path: &Path,
            _metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            fs::write(path, b"fragment")?;
            self.events
                .lock()
                .unwrap()
                .push(WriterEvent::Open(path.to_path_buf()));
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.events
                .lock()
                .unwrap()
                .push(WriterEvent::Write(frame.index()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            if let Some(delay) = self.close_delay {
                std::thread::sleep(delay);
            }
            self.events.lock().unwrap().push(WriterEvent::Close);
            if self.fail_close {
                return Err("trailer write failed".into());
            }
            Ok(())
        }
    }

    pub(crate) fn stub_factory(
        events: Arc<Mutex<Vec<WriterEvent>>>,
        fail_close: bool,
        close_delay: Option<Duration>,
    ) -> WriterFactory {
        Box::new(move || -> Box<dyn VideoWriter> {
            Box::new(StubWriter {
                events: events.clone(),
                fail_close,
                close_delay,
            })
        })
    }

    pub(crate) fn metadata(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 4,
            height: 4,
            fps,
            total_frames,
            codec: "mpeg4".to_string(),
        }
    }

    fn frames(indices: std::ops::Range<usize>) -> Vec<Frame> {
        indices
            .map(|i| Frame::new(vec![0u8; 48], 4, 4, 3, i))
            .collect()
    }

    fn open_writer(
        dir: &Path,
        events: &Arc<Mutex<Vec<WriterEvent>>>,
        fail_close: bool,
        close_delay: Option<Duration>,
    ) -> FragmentWriter {
        let factory = stub_factory(events.clone(), fail_close, close_delay);
        let paths = FragmentPaths {
            temp: dir.join("clip-10.mp4"),
            output: dir.join("out").join("clip-10.mp4"),
        };
        FragmentWriter::open(&factory, paths, 10, &metadata(30.0, 100), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_append_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut writer = open_writer(dir.path(), &events, false, None);

        writer.append(frames(10..12)).unwrap();
        writer.append(frames(12..13)).unwrap();
        assert_eq!(writer.frames_written(), 3);

        let closed = writer.close().unwrap();
        assert_eq!(closed.start_index, 10);
        assert_eq!(closed.frames_written, 3);
        assert!(closed.paths.temp.exists());
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                WriterEvent::Open(dir.path().join("clip-10.mp4")),
                WriterEvent::Write(10),
                WriterEvent::Write(11),
                WriterEvent::Write(12),
                WriterEvent::Close,
            ]
        );
    }

    #[test]
    fn test_closed_fragment_time_range() {
        let closed = ClosedFragment {
            paths: FragmentPaths {
                temp: PathBuf::from("a"),
                output: PathBuf::from("b"),
            },
            start_index: 30,
            frames_written: 15,
        };
        assert_eq!(closed.time_range(30.0), TimeRange::new(1.0, 1.5));
    }

    #[test]
    fn test_append_rejects_gap() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut writer = open_writer(dir.path(), &events, false, None);

        writer.append(frames(10..11)).unwrap();
        assert!(writer.append(frames(12..13)).is_err());
        assert_eq!(writer.frames_written(), 1);
    }

    #[test]
    fn test_failed_close_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let writer = open_writer(dir.path(), &events, true, None);
        let temp = writer.paths().temp.clone();

        let err = writer.close().unwrap_err();
        assert!(matches!(err, ReleaseError::Close { .. }));
        assert!(!temp.exists());
    }

    #[test]
    fn test_close_timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let factory = stub_factory(events.clone(), false, Some(Duration::from_secs(2)));
        let paths = FragmentPaths {
            temp: dir.path().join("slow-0.mp4"),
            output: dir.path().join("slow-0.mp4.out"),
        };
        let writer = FragmentWriter::open(
            &factory,
            paths,
            0,
            &metadata(30.0, 10),
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(matches!(
            writer.close().unwrap_err(),
            ReleaseError::TimedOut { .. }
        ));
    }

    #[test]
    fn test_discard_closes_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut writer = open_writer(dir.path(), &events, false, None);
        writer.append(frames(10..12)).unwrap();
        let temp = writer.paths().temp.clone();

        writer.discard();
        assert!(!temp.exists());
        assert_eq!(events.lock().unwrap().last(), Some(&WriterEvent::Close));
    }

    #[test]
    fn test_drop_while_open_closes_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let writer = open_writer(dir.path(), &events, false, None);
        let temp = writer.paths().temp.clone();
        assert!(temp.exists());

        drop(writer);
        assert!(!temp.exists());
        assert_eq!(events.lock().unwrap().last(), Some(&WriterEvent::Close));
    }

    #[test]
    fn test_open_failure_leaves_no_temp() {
        struct BrokenWriter;
        impl VideoWriter for BrokenWriter {
            fn open(
                &mut self,
                path: &Path,
                _metadata: &VideoMetadata,
            ) -> Result<(), Box<dyn std::error::Error>> {
                fs::write(path, b"partial header")?;
                Err("no encoder".into())
            }
            fn write(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
                Ok(())
            }
            fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let factory: WriterFactory = Box::new(|| -> Box<dyn VideoWriter> { Box::new(BrokenWriter) });
        let paths = FragmentPaths {
            temp: dir.path().join("broken-0.mp4"),
            output: dir.path().join("out.mp4"),
        };
        let result =
            FragmentWriter::open(&factory, paths, 0, &metadata(30.0, 1), Duration::from_secs(1));
        assert!(result.is_err());
        assert!(!dir.path().join("broken-0.mp4").exists());
    }
}
