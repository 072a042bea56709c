use crate::detection::domain::detection::TrackedFrame;
use crate::detection::domain::tracked_detector::TrackedDetector;
use crate::shared::frame::Frame;

type FrameIter<'a> = Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + 'a>;

/// Lazily runs the tracker over every decoded frame.
///
/// Every frame goes through the tracker, sampled or not, so track IDs stay
/// continuous; sampling is the consumer's job. A decode error ends the
/// stream. A detector error on one frame yields that frame with no
/// detections so frame ordinals stay aligned.
pub struct TrackedFrameStream<'a> {
    frames: FrameIter<'a>,
    detector: &'a mut dyn TrackedDetector,
    done: bool,
}

impl<'a> TrackedFrameStream<'a> {
    pub fn new(frames: FrameIter<'a>, detector: &'a mut dyn TrackedDetector) -> Self {
        Self {
            frames,
            detector,
            done: false,
        }
    }
}

impl Iterator for TrackedFrameStream<'_> {
    type Item = TrackedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let frame = match self.frames.next()? {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Stopping at undecodable frame: {e}");
                self.done = true;
                return None;
            }
        };

        let detections = self.detector.track(&frame).unwrap_or_else(|e| {
            log::warn!("Detector failed on frame {}: {e}", frame.index());
            Vec::new()
        });
        Some(TrackedFrame { frame, detections })
    }
}
