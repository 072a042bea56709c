use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

/// Domain interface for a per-frame object detector with tracking.
///
/// Implementations are stateful (track IDs persist across calls),
/// hence `&mut self`. Frames must be fed in decode order.
pub trait TrackedDetector: Send {
    fn track(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>>;
}
