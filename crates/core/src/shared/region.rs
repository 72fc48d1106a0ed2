/// Axis-aligned bounding box of a detected face, in source pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

impl Region {
    /// Builds a region from corner coordinates, clamped to the frame.
    pub fn from_corners(
        (x1, y1, x2, y2): (f64, f64, f64, f64),
        frame_w: u32,
        frame_h: u32,
        confidence: f64,
    ) -> Self {
        let x1 = x1.max(0.0).min(frame_w as f64);
        let y1 = y1.max(0.0).min(frame_h as f64);
        let x2 = x2.max(0.0).min(frame_w as f64);
        let y2 = y2.max(0.0).min(frame_h as f64);
        Self {
            x: x1.round() as i32,
            y: y1.round() as i32,
            width: (x2 - x1).round().max(0.0) as i32,
            height: (y2 - y1).round().max(0.0) as i32,
            confidence,
        }
    }
}
