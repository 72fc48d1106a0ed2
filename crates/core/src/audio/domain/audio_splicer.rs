use std::path::{Path, PathBuf};

use thiserror::Error;

use super::time_range::TimeRange;

#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}", describe_exit(.code))]
    Failed { command: String, code: Option<i32> },
    #[error("audio splice I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

/// Domain interface for attaching a slice of a separate audio track to a
/// finished video fragment.
///
/// On success the file at `video_path` has been replaced in place by a copy
/// that carries the audio of `range`. On failure `video_path` may be left in
/// any state and the caller discards it.
pub trait AudioSplicer: Send {
    fn splice(
        &self,
        video_path: &Path,
        audio_source: &Path,
        range: TimeRange,
    ) -> Result<(), SpliceError>;
}
