//! Pre- and post-processing shared by the YOLO-family ONNX models.
//!
//! The person detector (COCO head: `cx, cy, w, h, 80 class scores`) and the
//! face locator (pose head: `cx, cy, w, h, conf, 5 keypoints`) both use the
//! same letterbox input and the same `[1, features, anchors]` output layout.

use crate::shared::frame::Frame;

/// Fallback model input resolution when the model doesn't specify dimensions.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Letterbox geometry needed to map model coordinates back to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Maps a `cx, cy, w, h` box in model space to `[x1, y1, x2, y2]` in frame space.
    pub fn unmap(&self, cx: f64, cy: f64, w: f64, h: f64) -> [f64; 4] {
        let px = self.pad_x as f64;
        let py = self.pad_y as f64;
        [
            (cx - w / 2.0 - px) / self.scale,
            (cy - h / 2.0 - py) / self.scale,
            (cx + w / 2.0 - px) / self.scale,
            (cy + h / 2.0 - py) / self.scale,
        ]
    }
}

/// Reads the square input size from an NCHW model signature, if static.
pub fn model_input_size(session: &ort::session::Session) -> u32 {
    session
        .inputs()
        .first()
        .and_then(|input| match input.dtype() {
            ort::value::ValueType::Tensor { ref shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                Some(shape[2] as u32)
            }
            _ => None,
        })
        .unwrap_or(DEFAULT_INPUT_SIZE)
}

/// Letterbox-resize a frame to `target_size` × `target_size`, normalised to
/// `[0, 1]`, NCHW, padded with YOLO's 114 gray.
pub fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (tensor, Letterbox { scale, pad_x, pad_y })
}

/// Splits a raw YOLO output tensor into per-anchor feature rows.
///
/// Accepts both `[1, features, anchors]` (exported default) and
/// `[1, anchors, features]`; the smaller of the two trailing axes is taken
/// to be the feature axis.
pub fn output_rows(shape: &[usize], data: &[f32]) -> Result<Vec<Vec<f32>>, String> {
    if shape.len() != 3 {
        return Err(format!("Unexpected YOLO output shape: {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (num_rows, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if data.len() < num_rows * num_feats {
        return Err(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            num_rows * num_feats
        ));
    }

    let rows = (0..num_rows)
        .map(|i| {
            if transposed {
                (0..num_feats).map(|f| data[f * num_rows + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            }
        })
        .collect();
    Ok(rows)
}
