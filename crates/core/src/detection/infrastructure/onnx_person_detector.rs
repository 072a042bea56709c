/// YOLO object detector (COCO head) using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, per-class NMS and ByteTrack
/// tracking, and converts the result into domain [`Detection`]s.
use std::path::Path;

use crate::detection::domain::detection::{BoundingBox, Detection};
use crate::detection::domain::tracked_detector::TrackedDetector;
use crate::detection::infrastructure::onnx_session;
use crate::shared::config::DetectorConfig;
use crate::shared::frame::Frame;

use super::bytetrack_tracker::{ByteTracker, TrackerInput};
use super::math;
use super::yolo::{self, Letterbox};

/// Values preceding the class scores in each output row (`cx, cy, w, h`).
const BOX_VALUES: usize = 4;

pub struct OnnxPersonDetector {
    session: ort::session::Session,
    tracker: ByteTracker,
    confidence: f64,
    iou: f64,
    input_size: u32,
}

impl OnnxPersonDetector {
    /// Load a YOLO ONNX model exported with the standard COCO head.
    pub fn new(model_path: &Path, config: &DetectorConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::build(model_path)?;
        let input_size = yolo::model_input_size(&session);
        log::info!(
            "Loaded detector {} ({input_size}px input)",
            model_path.display()
        );
        Ok(Self {
            session,
            tracker: ByteTracker::new(config.max_lost_frames),
            confidence: config.confidence,
            iou: config.iou,
            input_size,
        })
    }
}

impl TrackedDetector for OnnxPersonDetector {
    fn track(&mut self, frame: &Frame) -> Result<Vec<Detection>, Box<dyn std::error::Error>> {
        let (input_tensor, lb) = yolo::letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = yolo::output_rows(tensor.shape(), data)?;

        let candidates = decode_rows(&rows, &lb, self.confidence);
        let keep = math::nms(&candidates, self.iou);

        let inputs: Vec<TrackerInput> = keep
            .iter()
            .map(|&i| {
                let (bbox, score, class_id) = candidates[i];
                TrackerInput {
                    bbox,
                    score,
                    class_id,
                }
            })
            .collect();

        let tracks = self.tracker.update(&inputs);
        Ok(tracks
            .iter()
            .map(|t| Detection {
                bbox: clamp_to_frame(t.bbox, frame),
                class_id: t.class_id,
                score: inputs[t.det_index].score,
                track_id: Some(t.id),
            })
            .collect())
    }
}

/// Picks the best class per row and keeps rows scoring at least `confidence`.
fn decode_rows(rows: &[Vec<f32>], lb: &Letterbox, confidence: f64) -> Vec<([f64; 4], f64, u32)> {
    rows.iter()
        .filter(|row| row.len() > BOX_VALUES)
        .filter_map(|row| {
            let (class_id, score) = row[BOX_VALUES..]
                .iter()
                .enumerate()
                .fold((0usize, f32::MIN), |best, (i, &s)| {
                    if s > best.1 {
                        (i, s)
                    } else {
                        best
                    }
                });
            let score = score as f64;
            if score < confidence {
                return None;
            }
            let bbox = lb.unmap(row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            Some((bbox, score, class_id as u32))
        })
        .collect()
}

fn clamp_to_frame(b: [f64; 4], frame: &Frame) -> BoundingBox {
    let w = frame.width() as f64;
    let h = frame.height() as f64;
    BoundingBox::new(
        b[0].clamp(0.0, w),
        b[1].clamp(0.0, h),
        b[2].clamp(0.0, w),
        b[3].clamp(0.0, h),
    )
}
