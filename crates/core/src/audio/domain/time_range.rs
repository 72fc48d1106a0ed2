/// Half-open span of source time in seconds, `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Time covered by `frame_count` frames starting at `start_index`.
    /// Both bounds are zero when `fps` is not positive.
    pub fn for_frames(start_index: usize, frame_count: usize, fps: f64) -> Self {
        if fps <= 0.0 {
            return Self::new(0.0, 0.0);
        }
        Self::new(
            start_index as f64 / fps,
            (start_index + frame_count) as f64 / fps,
        )
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}
