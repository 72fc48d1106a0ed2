use std::collections::VecDeque;

use crate::shared::frame::Frame;

/// Frames read since the last oracle check, oldest first.
#[derive(Default)]
pub struct PendingBuffer {
    frames: VecDeque<Frame>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    /// Removes and returns up to `count` frames from the front.
    pub fn take(&mut self, count: usize) -> Vec<Frame> {
        let count = count.min(self.frames.len());
        self.frames.drain(..count).collect()
    }

    /// Drops every pending frame, returning how many were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        dropped
    }

    pub fn first_index(&self) -> Option<usize> {
        self.frames.front().map(Frame::index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
