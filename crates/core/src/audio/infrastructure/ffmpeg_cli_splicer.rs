use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::audio::domain::audio_splicer::{AudioSplicer, SpliceError};
use crate::audio::domain::time_range::TimeRange;

/// Splices audio by shelling out to the `ffmpeg` command-line tool.
///
/// Two invocations per fragment: a stream-copy cut of the audio source into
/// `<stem>.aac` next to the fragment, then a mux of that cut onto the
/// fragment into `<stem>.audio.<ext>`, which replaces the fragment.
pub struct FfmpegCliSplicer {
    binary: PathBuf,
}

impl FfmpegCliSplicer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn extract_command(&self, audio_source: &Path, range: TimeRange, artifact: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-y")
            .arg("-i")
            .arg(audio_source)
            .args(["-ss", &format_seconds(range.start)])
            .args(["-to", &format_seconds(range.end)])
            .args(["-vn", "-acodec", "copy"])
            .arg(artifact);
        cmd
    }

    fn mux_command(&self, video_path: &Path, artifact: &Path, combined: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-y")
            .arg("-i")
            .arg(video_path)
            .arg("-i")
            .arg(artifact)
            .args(["-c:v", "copy", "-c:a", "aac"])
            .arg(combined);
        cmd
    }
}

impl Default for FfmpegCliSplicer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioSplicer for FfmpegCliSplicer {
    fn splice(
        &self,
        video_path: &Path,
        audio_source: &Path,
        range: TimeRange,
    ) -> Result<(), SpliceError> {
        let artifact = artifact_path(video_path);
        let combined = combined_path(video_path);

        remove_stale(&artifact)?;
        run(self.extract_command(audio_source, range, &artifact))?;

        let muxed = remove_stale(&combined)
            .and_then(|()| run(self.mux_command(video_path, &artifact, &combined)))
            .and_then(|()| {
                fs::rename(&combined, video_path).map_err(|source| SpliceError::Io {
                    path: combined.clone(),
                    source,
                })
            });

        if muxed.is_err() {
            let _ = fs::remove_file(&combined);
        }
        let _ = fs::remove_file(&artifact);
        muxed
    }
}

/// `<dir>/<stem>.aac` for a fragment at `<dir>/<stem>.<ext>`.
pub fn artifact_path(video_path: &Path) -> PathBuf {
    video_path.with_extension("aac")
}

/// `<dir>/<stem>.audio.<ext>` for a fragment at `<dir>/<stem>.<ext>`.
pub fn combined_path(video_path: &Path) -> PathBuf {
    let mut ext = OsString::from("audio");
    if let Some(video_ext) = video_path.extension() {
        ext.push(".");
        ext.push(video_ext);
    }
    video_path.with_extension(ext)
}

fn format_seconds(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}

fn remove_stale(path: &Path) -> Result<(), SpliceError> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SpliceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn run(mut cmd: Command) -> Result<(), SpliceError> {
    let command = command_line(&cmd);
    log::debug!("Running {command}");

    let output = cmd.output().map_err(|source| SpliceError::Spawn {
        command: command.clone(),
        source,
    })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log::debug!("{}", stderr.trim_end());
        }
        Err(SpliceError::Failed {
            command,
            code: output.status.code(),
        })
    }
}
