use crate::shared::frame::Frame;

/// Axis-aligned box in absolute pixel coordinates of the source frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn area(&self) -> f64 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Grows the box by `margin` pixels on every side and clamps it to
    /// `[0, frame_width] x [0, frame_height]`.
    ///
    /// Coordinates are truncated to whole pixels before the margin is applied.
    pub fn expand_clamped(&self, margin: u32, frame_width: u32, frame_height: u32) -> CropRect {
        let m = margin as i64;
        let clamp = |v: i64, max: u32| v.clamp(0, max as i64) as u32;

        CropRect {
            x1: clamp(self.x1 as i64 - m, frame_width),
            y1: clamp(self.y1 as i64 - m, frame_height),
            x2: clamp(self.x2 as i64 + m, frame_width),
            y2: clamp(self.y2 as i64 + m, frame_height),
        }
    }
}

/// Integer pixel rectangle, `x2`/`y2` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// A crop is usable for face identification when it is non-empty and
    /// its shorter side reaches `min_side`.
    pub fn is_identifiable(&self, min_side: u32) -> bool {
        !self.is_empty() && self.width().min(self.height()) >= min_side
    }
}

/// One detector hit on one frame, converted once from the detector's own
/// output so the pipeline never depends on that library's shapes.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class_id: u32,
    pub score: f64,
    /// Tracker-assigned identifier; `None` when the tracker could not assign one.
    pub track_id: Option<u32>,
}

/// A frame together with everything the detector/tracker found on it.
#[derive(Clone, Debug)]
pub struct TrackedFrame {
    pub frame: Frame,
    pub detections: Vec<Detection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_expand_inside_frame() {
        let b = BoundingBox::new(100.0, 100.0, 200.0, 250.0);
        let r = b.expand_clamped(20, 640, 480);
        assert_eq!(
            r,
            CropRect {
                x1: 80,
                y1: 80,
                x2: 220,
                y2: 270
            }
        );
    }

    #[test]
    fn test_expand_clamps_to_frame_edges() {
        let b = BoundingBox::new(5.0, 10.0, 630.0, 475.0);
        let r = b.expand_clamped(20, 640, 480);
        assert_eq!(
            r,
            CropRect {
                x1: 0,
                y1: 0,
                x2: 640,
                y2: 480
            }
        );
    }

    #[test]
    fn test_expand_truncates_fractional_coordinates() {
        let b = BoundingBox::new(10.9, 10.9, 50.9, 50.9);
        let r = b.expand_clamped(0, 100, 100);
        assert_eq!((r.x1, r.y1, r.x2, r.y2), (10, 10, 50, 50));
    }

    #[test]
    fn test_box_entirely_outside_frame_becomes_empty() {
        let b = BoundingBox::new(700.0, 10.0, 800.0, 100.0);
        let r = b.expand_clamped(20, 640, 480);
        assert!(r.is_empty());
        assert!(!r.is_identifiable(1));
    }

    #[rstest]
    #[case(40, 40, 40, true)]
    #[case(39, 100, 40, false)]
    #[case(100, 39, 40, false)]
    #[case(0, 100, 40, false)]
    #[case(200, 41, 40, true)]
    fn test_is_identifiable(
        #[case] w: u32,
        #[case] h: u32,
        #[case] min_side: u32,
        #[case] expected: bool,
    ) {
        let r = CropRect {
            x1: 10,
            y1: 10,
            x2: 10 + w,
            y2: 10 + h,
        };
        assert_eq!(r.is_identifiable(min_side), expected);
    }

    #[test]
    fn test_area_of_inverted_box_is_zero() {
        assert_eq!(BoundingBox::new(10.0, 10.0, 5.0, 5.0).area(), 0.0);
    }
}
