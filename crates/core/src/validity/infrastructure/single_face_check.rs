use crate::shared::frame::Frame;
use crate::validity::domain::face_detector::FaceDetector;
use crate::validity::domain::frame_check::FrameCheck;
use crate::validity::domain::verdict::Verdict;

/// Accepts a frame only when exactly one face is visible.
pub struct SingleFaceCheck {
    detector: Box<dyn FaceDetector>,
}

impl SingleFaceCheck {
    pub fn new(detector: Box<dyn FaceDetector>) -> Self {
        Self { detector }
    }
}

impl FrameCheck for SingleFaceCheck {
    fn check(
        &mut self,
        frame: &Frame,
        _previous: Option<&Frame>,
    ) -> Result<Verdict, Box<dyn std::error::Error>> {
        let faces = self.detector.detect(frame)?.len();
        if faces == 1 {
            Ok(Verdict::Valid)
        } else {
            Ok(Verdict::invalid(format!("detected {faces} faces, expected 1")))
        }
    }
}
