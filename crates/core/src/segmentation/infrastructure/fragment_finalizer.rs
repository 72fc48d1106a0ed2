use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::domain::audio_splicer::AudioSplicer;

use super::fragment_writer::FragmentWriter;

/// What became of a fragment handed to [`FragmentFinalizer::finalize`].
#[derive(Debug, PartialEq)]
pub enum FinalizeOutcome {
    /// The fragment now lives at this path in the output directory.
    Stored(PathBuf),
    /// The fragment was thrown away; its temp file is gone.
    Discarded { reason: String },
}

/// Closes finished fragments, attaches their audio and moves them into the
/// output directory.
pub struct FragmentFinalizer<'a> {
    output_dir: &'a Path,
    audio: Option<(&'a Path, &'a dyn AudioSplicer)>,
    fps: f64,
}

impl<'a> FragmentFinalizer<'a> {
    pub fn new(output_dir: &'a Path, fps: f64) -> Self {
        Self {
            output_dir,
            audio: None,
            fps,
        }
    }

    /// Splice `audio_source` onto every fragment before it is stored.
    pub fn with_audio(mut self, audio_source: &'a Path, splicer: &'a dyn AudioSplicer) -> Self {
        self.audio = Some((audio_source, splicer));
        self
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir
    }

    /// Close, splice and store one fragment.
    ///
    /// Encoder, splice and move failures discard the fragment and are
    /// reported in the outcome. Only failing to create the output directory
    /// is an error.
    pub fn finalize(&self, fragment: FragmentWriter) -> std::io::Result<FinalizeOutcome> {
        let closed = match fragment.close() {
            Ok(closed) => closed,
            Err(e) => return Ok(discarded(format!("encoder did not close cleanly: {e}"))),
        };

        if let Some((audio_source, splicer)) = self.audio {
            let range = closed.time_range(self.fps);
            if let Err(e) = splicer.splice(&closed.paths.temp, audio_source, range) {
                log::error!(
                    "Failed to attach audio to fragment at frame {}: {e}",
                    closed.start_index
                );
                remove_quietly(&closed.paths.temp);
                return Ok(discarded(format!("audio splice failed: {e}")));
            }
        }

        if let Err(e) = ensure_dir(self.output_dir) {
            remove_quietly(&closed.paths.temp);
            return Err(e);
        }
        match move_file(&closed.paths.temp, &closed.paths.output) {
            Ok(()) => {
                log::info!(
                    "Stored fragment {} ({} frames from frame {})",
                    closed.paths.output.display(),
                    closed.frames_written,
                    closed.start_index
                );
                Ok(FinalizeOutcome::Stored(closed.paths.output))
            }
            Err(e) => {
                remove_quietly(&closed.paths.temp);
                Ok(discarded(format!(
                    "could not move {} to {}: {e}",
                    closed.paths.temp.display(),
                    closed.paths.output.display()
                )))
            }
        }
    }
}

fn discarded(reason: String) -> FinalizeOutcome {
    log::warn!("Discarding fragment: {reason}");
    FinalizeOutcome::Discarded { reason }
}

/// Creates `dir` and its parents, with mode 0755 on Unix.
fn ensure_dir(dir: &Path) -> std::io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

/// Renames, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
