use std::path::PathBuf;
use std::sync::atomic::Ordering;

use crate::shared::constants::{KEY_TOTAL_COUNT, KEY_TOTAL_FRAGMENTS_DONE, KEY_TOTAL_PROCESSED};
use crate::video::domain::video_reader::ReaderFactory;

use super::extract_fragments_use_case::ExtractFragmentsUseCase;
use super::progress_reporter::ProgressReporter;

/// One source video and the audio track to splice onto its fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoJob {
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
}

impl VideoJob {
    pub fn new(video: impl Into<PathBuf>, audio: Option<PathBuf>) -> Self {
        Self {
            video: video.into(),
            audio,
        }
    }

    /// Parses one `video[,audio]` line of a job list. Blank lines give
    /// `None`.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (video, audio) = match line.split_once(',') {
            Some((video, audio)) if !audio.trim().is_empty() => {
                (video.trim(), Some(PathBuf::from(audio.trim())))
            }
            Some((video, _)) => (video.trim(), None),
            None => (line, None),
        };
        Some(Self::new(video, audio))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchSummary {
    pub videos: usize,
    pub processed: usize,
    pub failed: usize,
    pub fragments: usize,
}

/// Runs one extraction pass per job, sequentially.
///
/// Each pass gets a fresh reader from the factory. A failing pass is logged
/// and counted; the batch moves on. Cancellation stops the batch once the
/// current pass has drained.
pub struct ProcessBatchUseCase {
    extractor: ExtractFragmentsUseCase,
    reader_factory: ReaderFactory,
}

impl ProcessBatchUseCase {
    pub fn new(extractor: ExtractFragmentsUseCase, reader_factory: ReaderFactory) -> Self {
        Self {
            extractor,
            reader_factory,
        }
    }

    pub fn execute(
        &mut self,
        jobs: &[VideoJob],
        reporter: &mut dyn ProgressReporter,
    ) -> BatchSummary {
        let cancelled = self.extractor.cancel_flag();
        let mut summary = BatchSummary {
            videos: jobs.len(),
            ..Default::default()
        };
        reporter.update(&[(KEY_TOTAL_COUNT, jobs.len())]);

        for (i, job) in jobs.iter().enumerate() {
            if cancelled.load(Ordering::Relaxed) {
                log::info!("Cancelled, skipping {} remaining videos", jobs.len() - i);
                break;
            }
            reporter.info(&format!(
                "[{}/{}] {}",
                i + 1,
                jobs.len(),
                job.video.display()
            ));

            let reader = (self.reader_factory)();
            match self
                .extractor
                .execute(reader, &job.video, job.audio.as_deref(), reporter)
            {
                Ok(pass) => {
                    summary.processed += 1;
                    summary.fragments += pass.fragments;
                }
                Err(e) => {
                    log::error!("Failed to process {}: {e}", job.video.display());
                    summary.failed += 1;
                }
            }

            reporter.update(&[
                (KEY_TOTAL_PROCESSED, summary.processed + summary.failed),
                (KEY_TOTAL_FRAGMENTS_DONE, summary.fragments),
            ]);
        }

        log::info!(
            "Batch done: {} of {} videos processed, {} failed, {} fragments",
            summary.processed,
            summary.videos,
            summary.failed,
            summary.fragments
        );
        summary
    }
}
