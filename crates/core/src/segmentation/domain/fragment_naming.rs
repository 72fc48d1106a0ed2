use std::path::{Path, PathBuf};

/// Extension used when the source file has none.
const FALLBACK_EXTENSION: &str = "mp4";

/// File name of the fragment starting at `start_index` of `source`:
/// `<stem>-<start>.<ext>`, or `<stem>-<start>-<D>s.<ext>` with a fixed
/// duration of `D` seconds.
pub fn fragment_file_name(source: &Path, start_index: usize, duration: Option<u32>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "fragment".to_string());
    let ext = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

    match duration {
        Some(d) => format!("{stem}-{start_index}-{d}s.{ext}"),
        None => format!("{stem}-{start_index}.{ext}"),
    }
}

/// Where a fragment is written while open, and where it lands once final.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentPaths {
    pub temp: PathBuf,
    pub output: PathBuf,
}

impl FragmentPaths {
    pub fn new(
        source: &Path,
        start_index: usize,
        duration: Option<u32>,
        temp_dir: &Path,
        output_dir: &Path,
    ) -> Self {
        let name = fragment_file_name(source, start_index, duration);
        Self {
            temp: temp_dir.join(&name),
            output: output_dir.join(name),
        }
    }
}
