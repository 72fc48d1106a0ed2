use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::audio::domain::audio_splicer::AudioSplicer;
use crate::segmentation::domain::fragment_naming::FragmentPaths;
use crate::segmentation::domain::fragment_state::{FragmentState, OpenFragment};
use crate::segmentation::domain::pending_buffer::PendingBuffer;
use crate::segmentation::domain::segmentation_policy::{
    PolicyError, SegmentationPolicy, Transition,
};
use crate::segmentation::infrastructure::fragment_finalizer::{FinalizeOutcome, FragmentFinalizer};
use crate::segmentation::infrastructure::fragment_writer::FragmentWriter;
use crate::shared::constants::{
    KEY_PROCESS_FRAGMENTS, KEY_PROCESS_FRAME, KEY_PROCESS_TOTAL_FRAMES, PROGRESS_INTERVAL_FRAMES,
};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::validity::domain::validity_oracle::{OracleError, ValidityOracle};
use crate::validity::domain::verdict::Verdict;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::WriterFactory;

use super::extraction_config::ExtractionConfig;
use super::progress_reporter::ProgressReporter;
use super::resource_guard::release_guarded;

#[derive(Error, Debug)]
pub enum PassError {
    #[error("source is {actual:.2}s long, shorter than the {required}s fragment duration")]
    SourceTooShort { actual: f64, required: u32 },
    #[error("invalid configuration: {0}")]
    Config(#[from] PolicyError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    /// The frame source could not be opened.
    #[error("{0}")]
    Source(String),
}

/// Counters of one pass.
///
/// Every frame read ends up either handed to an encoder (`frames_written`,
/// including frames of fragments discarded later) or dropped from the
/// pending buffer (`frames_discarded`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassSummary {
    pub frames_read: usize,
    pub frames_written: usize,
    pub frames_discarded: usize,
    pub fragments: usize,
    pub fragments_discarded: usize,
    pub cancelled: bool,
}

/// Cuts one source video into fragments of consecutive valid frames.
///
/// Frames are read in order, judged by the validity oracle every `stride`
/// frames, and written into at most one open fragment at a time. Finished
/// fragments get their audio attached and are moved into the output
/// directory.
pub struct ExtractFragmentsUseCase {
    oracle: ValidityOracle,
    writer_factory: WriterFactory,
    splicer: Box<dyn AudioSplicer>,
    config: ExtractionConfig,
    cancelled: Arc<AtomicBool>,
}

impl ExtractFragmentsUseCase {
    pub fn new(
        oracle: ValidityOracle,
        writer_factory: WriterFactory,
        splicer: Box<dyn AudioSplicer>,
        config: ExtractionConfig,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Self {
        Self {
            oracle,
            writer_factory,
            splicer,
            config,
            cancelled: cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false))),
        }
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs one pass over `video`, splicing `audio` onto every fragment when
    /// given. The reader is always released before this returns.
    pub fn execute(
        &mut self,
        mut reader: Box<dyn VideoReader>,
        video: &Path,
        audio: Option<&Path>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<PassSummary, PassError> {
        let result = self.run(&mut *reader, video, audio, reporter);

        if let Err(e) = release_guarded(
            "frame source",
            reader,
            self.config.release_timeout,
            |mut reader| {
                reader.close();
                Ok(())
            },
        ) {
            log::warn!("{e}");
        }

        result
    }

    fn run(
        &mut self,
        reader: &mut dyn VideoReader,
        video: &Path,
        audio: Option<&Path>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<PassSummary, PassError> {
        if !self.oracle.is_initialized() {
            return Err(OracleError::NotInitialized.into());
        }

        let metadata = reader
            .open(video)
            .map_err(|e| PassError::Source(format!("cannot open {}: {e}", video.display())))?;

        if let (Some(required), Some(actual)) = (self.config.duration, metadata.duration_secs()) {
            if actual < required as f64 {
                return Err(PassError::SourceTooShort { actual, required });
            }
        }
        let policy =
            SegmentationPolicy::for_source(self.config.stride, self.config.duration, metadata.fps)?;

        log::info!(
            "Processing {} ({}x{}, {:.2} fps, {} frames, stride {}, {})",
            video.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            policy.stride(),
            match policy.fragment_len() {
                Some(len) => format!("{len} frames per fragment"),
                None => "fragments until invalid".to_string(),
            }
        );

        let mut finalizer = FragmentFinalizer::new(&self.config.output_dir, metadata.fps);
        if let Some(audio) = audio {
            finalizer = finalizer.with_audio(audio, &*self.splicer);
        }

        let mut pass = Pass {
            policy,
            metadata: &metadata,
            source: video,
            config: &self.config,
            factory: &self.writer_factory,
            finalizer,
            state: FragmentState::Idle,
            pending: PendingBuffer::new(),
            summary: PassSummary::default(),
        };
        let mut previous: Option<Frame> = None;

        let mut frames = reader.frames();
        loop {
            if self.cancelled.load(Ordering::Relaxed) {
                log::info!("Cancelled after {} frames", pass.summary.frames_read);
                pass.summary.cancelled = true;
                break;
            }
            let Some(result) = frames.next() else {
                break;
            };
            let frame = match result {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!(
                        "Decoding {} failed after {} frames, ending the pass: {e}",
                        video.display(),
                        pass.summary.frames_read
                    );
                    break;
                }
            };
            if frame.index() < self.config.start_frame {
                continue;
            }

            let index = frame.index();
            pass.summary.frames_read += 1;
            pass.pending.push(frame.clone());

            if pass.policy.should_check(index, pass.state.phase()) {
                let verdict = self.oracle.check(&frame, previous.as_ref())?;
                if let Verdict::Invalid(reason) = &verdict {
                    log::debug!(
                        "Frame {index} ({:.2}s) rejected: {reason}",
                        frame.timestamp(metadata.fps)
                    );
                }
                let first = pass.pending.first_index().unwrap_or(index);
                let steps =
                    pass.policy
                        .on_verdict(pass.state.phase(), &verdict, first, pass.pending.len());
                pass.apply(steps, verdict.reason(), reporter);
            }
            previous = Some(frame);

            if pass.summary.frames_read % PROGRESS_INTERVAL_FRAMES == 0 {
                log::info!("processed {} frames", pass.summary.frames_read);
                pass.report(reporter);
            }
        }
        drop(frames);

        let steps = pass
            .policy
            .on_end_of_stream(pass.state.phase(), pass.pending.len());
        let cause = if pass.summary.cancelled {
            "pass cancelled"
        } else {
            "end of stream"
        };
        pass.apply(steps, Some(cause), reporter);
        pass.report(reporter);

        let summary = pass.summary;
        log::info!(
            "Finished {}: {} fragments stored, {} discarded, {} of {} frames written",
            video.display(),
            summary.fragments,
            summary.fragments_discarded,
            summary.frames_written,
            summary.frames_read
        );
        Ok(summary)
    }
}

/// Mutable state of one running pass.
struct Pass<'a> {
    policy: SegmentationPolicy,
    metadata: &'a VideoMetadata,
    source: &'a Path,
    config: &'a ExtractionConfig,
    factory: &'a WriterFactory,
    finalizer: FragmentFinalizer<'a>,
    state: FragmentState<FragmentWriter>,
    pending: PendingBuffer,
    summary: PassSummary,
}

impl Pass<'_> {
    /// Applies policy steps in order. `cause` names why an open fragment
    /// ends, for the log.
    fn apply(
        &mut self,
        steps: Vec<Transition>,
        cause: Option<&str>,
        reporter: &mut dyn ProgressReporter,
    ) {
        for step in steps {
            match step {
                Transition::Start { start_index } => self.start(start_index),
                Transition::Append(count) => self.append(count),
                Transition::Finish => {
                    if let Some(fragment) = self.state.take() {
                        if let Some(cause) = cause {
                            log::debug!(
                                "Fragment at frame {} ends: {cause}",
                                fragment.start_index()
                            );
                        }
                        self.finish(fragment, reporter);
                    }
                }
                Transition::Interrupt => {
                    if let Some(fragment) = self.state.take() {
                        log::warn!(
                            "Interrupted fragment at frame {} after {} frames: {}",
                            fragment.start_index(),
                            fragment.frames_written(),
                            cause.unwrap_or("no reason given")
                        );
                        fragment.discard();
                        self.summary.fragments_discarded += 1;
                    }
                }
                Transition::DiscardPending => {
                    self.summary.frames_discarded += self.pending.clear();
                }
            }
        }
    }

    /// Opens the next fragment. An encoder that fails to open leaves the
    /// pass idle; the frames meant for it are dropped by `append`.
    fn start(&mut self, start_index: usize) {
        // a previous fragment must be closed before the next opens
        if let Some(stale) = self.state.take() {
            log::warn!(
                "Fragment at frame {} still open when starting another",
                stale.start_index()
            );
            stale.discard();
            self.summary.fragments_discarded += 1;
        }

        let paths = FragmentPaths::new(
            self.source,
            start_index,
            self.config.duration,
            &self.config.temp_dir,
            &self.config.output_dir,
        );
        match FragmentWriter::open(
            self.factory,
            paths,
            start_index,
            self.metadata,
            self.config.release_timeout,
        ) {
            Ok(writer) => self.state = FragmentState::Recording(writer),
            Err(e) => {
                log::error!(
                    "Discarding fragment at frame {start_index}: encoder did not open: {e}"
                );
                self.summary.fragments_discarded += 1;
            }
        }
    }

    /// Moves pending frames into the open fragment. An encoder error
    /// discards the whole fragment and the pass carries on idle.
    fn append(&mut self, count: usize) {
        let frames = self.pending.take(count);
        let taken = frames.len();
        let Some(writer) = self.state.current_mut() else {
            log::debug!("No open fragment for {taken} frames, dropping them");
            self.summary.frames_discarded += taken;
            return;
        };

        let before = writer.frames_written();
        let result = writer.append(frames);
        let written = writer.frames_written() - before;
        self.summary.frames_written += written;

        if let Err(e) = result {
            self.summary.frames_discarded += taken - written;
            if let Some(fragment) = self.state.take() {
                log::error!(
                    "Discarding fragment at frame {}: encoder failed: {e}",
                    fragment.start_index()
                );
                fragment.discard();
                self.summary.fragments_discarded += 1;
            }
        }
    }

    fn finish(
        &mut self,
        fragment: FragmentWriter,
        reporter: &mut dyn ProgressReporter,
    ) {
        let start_index = fragment.start_index();
        match self.finalizer.finalize(fragment) {
            Ok(FinalizeOutcome::Stored(_)) => self.summary.fragments += 1,
            Ok(FinalizeOutcome::Discarded { .. }) => self.summary.fragments_discarded += 1,
            Err(e) => {
                log::error!(
                    "Discarding fragment at frame {start_index}: cannot create output directory {}: {e}",
                    self.finalizer.output_dir().display()
                );
                self.summary.fragments_discarded += 1;
            }
        }
        self.report(reporter);
    }

    fn report(&self, reporter: &mut dyn ProgressReporter) {
        reporter.update(&[
            (KEY_PROCESS_FRAME, self.summary.frames_read),
            (KEY_PROCESS_TOTAL_FRAMES, self.metadata.total_frames),
            (KEY_PROCESS_FRAGMENTS, self.summary.fragments),
        ]);
    }
}
