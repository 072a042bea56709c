/// Face localisation with the YOLO widerface pose model.
///
/// Only the boxes are used; the five landmark keypoints in each output row
/// are ignored.
use std::path::Path;

use crate::detection::domain::detection::BoundingBox;
use crate::detection::infrastructure::yolo::{self, Letterbox};
use crate::detection::infrastructure::{math, onnx_session};
use crate::shared::frame::Frame;

pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// Index of the face confidence in each output row.
const CONF_INDEX: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub bbox: BoundingBox,
    pub score: f64,
}

pub struct OnnxFaceLocator {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxFaceLocator {
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = onnx_session::build(model_path)?;
        let input_size = yolo::model_input_size(&session);
        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }

    /// All faces in `frame` after NMS, highest score first.
    pub fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>> {
        if frame.is_empty() {
            return Ok(Vec::new());
        }
        let (input_tensor, lb) = yolo::letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let rows = yolo::output_rows(tensor.shape(), data)?;

        let candidates = decode_faces(&rows, &lb, self.confidence);
        let keep = math::nms(&candidates, NMS_IOU_THRESH);
        Ok(keep
            .into_iter()
            .map(|i| {
                let ([x1, y1, x2, y2], score, _) = candidates[i];
                FaceBox {
                    bbox: BoundingBox::new(x1, y1, x2, y2),
                    score,
                }
            })
            .collect())
    }
}

fn decode_faces(rows: &[Vec<f32>], lb: &Letterbox, confidence: f64) -> Vec<([f64; 4], f64, u32)> {
    rows.iter()
        .filter(|row| row.len() > CONF_INDEX)
        .filter(|row| row[CONF_INDEX] as f64 >= confidence)
        .map(|row| {
            let bbox = lb.unmap(row[0] as f64, row[1] as f64, row[2] as f64, row[3] as f64);
            (bbox, row[CONF_INDEX] as f64, 0)
        })
        .collect()
}
