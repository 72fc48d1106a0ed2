/// Whether a fragment is open, reduced to what the segmentation policy
/// needs to decide the next transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording { start_index: usize },
}

/// An open fragment as seen by the pass.
pub trait OpenFragment {
    fn start_index(&self) -> usize;
    fn frames_written(&self) -> usize;
}

/// The pass's single fragment slot. At most one fragment is open; a new one
/// can only be stored after the previous one was taken out and closed.
pub enum FragmentState<F> {
    Idle,
    Recording(F),
}

impl<F: OpenFragment> FragmentState<F> {
    pub fn phase(&self) -> Phase {
        match self {
            FragmentState::Idle => Phase::Idle,
            FragmentState::Recording(fragment) => Phase::Recording {
                start_index: fragment.start_index(),
            },
        }
    }

    pub fn current_mut(&mut self) -> Option<&mut F> {
        match self {
            FragmentState::Idle => None,
            FragmentState::Recording(fragment) => Some(fragment),
        }
    }

    /// Moves the open fragment out, leaving the slot idle.
    pub fn take(&mut self) -> Option<F> {
        match std::mem::replace(self, FragmentState::Idle) {
            FragmentState::Idle => None,
            FragmentState::Recording(fragment) => Some(fragment),
        }
    }
}

impl<F> Default for FragmentState<F> {
    fn default() -> Self {
        FragmentState::Idle
    }
}
