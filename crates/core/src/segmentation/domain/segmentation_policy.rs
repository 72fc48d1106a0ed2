use thiserror::Error;

use crate::validity::domain::verdict::Verdict;

use super::fragment_state::Phase;

#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    #[error("check stride must be at least 1")]
    ZeroStride,
    #[error("a fixed duration needs a known frame rate, got {0} fps")]
    UnknownFrameRate(f64),
    #[error("{duration}s at {fps} fps is shorter than one frame")]
    EmptyFragment { duration: u32, fps: f64 },
}

/// One step of a segmentation decision, applied in order by the pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Open a fragment whose first frame is `start_index`.
    Start { start_index: usize },
    /// Move the oldest `n` pending frames into the open fragment.
    Append(usize),
    /// Close the open fragment and keep it.
    Finish,
    /// Close the open fragment and throw it away.
    Interrupt,
    /// Drop whatever is still pending without writing it.
    DiscardPending,
}

/// Pure segmentation rules: when to consult the oracle and what each
/// verdict does to the open fragment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentationPolicy {
    stride: usize,
    fragment_len: Option<usize>,
}

impl SegmentationPolicy {
    pub fn new(stride: usize, fragment_len: Option<usize>) -> Result<Self, PolicyError> {
        if stride == 0 {
            return Err(PolicyError::ZeroStride);
        }
        Ok(Self {
            stride,
            fragment_len,
        })
    }

    /// Builds the policy for a source, turning a fixed duration of
    /// `duration` seconds into `floor(duration * fps)` frames.
    pub fn for_source(
        stride: usize,
        duration: Option<u32>,
        fps: f64,
    ) -> Result<Self, PolicyError> {
        let fragment_len = match duration {
            None => None,
            Some(_) if fps <= 0.0 || !fps.is_finite() => {
                return Err(PolicyError::UnknownFrameRate(fps))
            }
            Some(d) => match (d as f64 * fps).floor() as usize {
                0 => return Err(PolicyError::EmptyFragment { duration: d, fps }),
                len => Some(len),
            },
        };
        Self::new(stride, fragment_len)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Frames in every finished fixed-duration fragment.
    pub fn fragment_len(&self) -> Option<usize> {
        self.fragment_len
    }

    /// Whether the frame at `index` is handed to the oracle.
    ///
    /// Frames on the stride are checked, as is the last frame of a
    /// fixed-length fragment so that the fragment closes exactly on its
    /// boundary.
    pub fn should_check(&self, index: usize, phase: Phase) -> bool {
        if index % self.stride == 0 {
            return true;
        }
        match (phase, self.fragment_len) {
            (Phase::Recording { start_index }, Some(len)) => index + 1 == start_index + len,
            _ => false,
        }
    }

    /// Steps for a verdict on the newest pending frame. `first_pending` is
    /// the index of the oldest of the `pending` frames.
    pub fn on_verdict(
        &self,
        phase: Phase,
        verdict: &Verdict,
        first_pending: usize,
        pending: usize,
    ) -> Vec<Transition> {
        if verdict.is_valid() {
            return self.flush(phase, first_pending, pending);
        }
        match (phase, self.fragment_len) {
            (Phase::Idle, _) => vec![Transition::DiscardPending],
            (Phase::Recording { .. }, Some(_)) => {
                vec![Transition::DiscardPending, Transition::Interrupt]
            }
            (Phase::Recording { .. }, None) => {
                vec![Transition::DiscardPending, Transition::Finish]
            }
        }
    }

    /// Steps once the source is exhausted or the pass is cancelled.
    pub fn on_end_of_stream(&self, phase: Phase, pending: usize) -> Vec<Transition> {
        match (phase, self.fragment_len) {
            (Phase::Idle, _) => vec![Transition::DiscardPending],
            (Phase::Recording { .. }, Some(_)) => {
                vec![Transition::DiscardPending, Transition::Interrupt]
            }
            (Phase::Recording { .. }, None) if pending > 0 => {
                vec![Transition::Append(pending), Transition::Finish]
            }
            (Phase::Recording { .. }, None) => vec![Transition::Finish],
        }
    }

    /// Writes every pending frame after a valid verdict. Fixed-length
    /// fragments finish on their boundary; frames past it start the next
    /// fragment under the same verdict.
    fn flush(&self, mut phase: Phase, first_pending: usize, pending: usize) -> Vec<Transition> {
        let mut steps = Vec::new();
        let end = first_pending + pending;
        let mut next = first_pending;

        while next < end {
            let start_index = match phase {
                Phase::Idle => {
                    steps.push(Transition::Start { start_index: next });
                    next
                }
                Phase::Recording { start_index } => start_index,
            };

            let boundary = self.fragment_len.map(|len| start_index + len);
            let limit = boundary.map_or(end, |b| b.min(end));
            if limit > next {
                steps.push(Transition::Append(limit - next));
                next = limit;
            }

            if boundary.is_some_and(|b| next >= b) {
                steps.push(Transition::Finish);
                phase = Phase::Idle;
            } else {
                phase = Phase::Recording { start_index };
            }
        }
        steps
    }
}
