use crate::shared::frame::Frame;

use super::verdict::Verdict;

/// One validity criterion applied to a checked frame.
///
/// `previous` is the raw frame immediately before `frame` in the source,
/// regardless of which frames were checked. It is `None` for the first
/// frame of a pass.
pub trait FrameCheck: Send {
    fn check(
        &mut self,
        frame: &Frame,
        previous: Option<&Frame>,
    ) -> Result<Verdict, Box<dyn std::error::Error>>;
}
