/// ArcFace-style embedding extractor using ONNX Runtime.
///
/// Each image is decoded, the largest face is located, and that face alone
/// is resized to 112x112, normalized to `[-1, 1]` and embedded. Output
/// vectors are L2-normalized.
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::infrastructure::onnx_session;
use crate::recognition::domain::embedding::{l2_normalize, Embedding};
use crate::recognition::domain::embedding_extractor::{EmbeddingExtractor, ExtractionError};
use crate::shared::frame::Frame;

use super::onnx_face_locator::{FaceBox, OnnxFaceLocator};

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

#[derive(Error, Debug)]
pub enum ExtractorInitError {
    #[error("no embedding model could be loaded (tried: {})", .tried.join(", "))]
    NoModelAvailable { tried: Vec<String> },
}

pub struct OnnxEmbeddingExtractor {
    session: ort::session::Session,
    locator: OnnxFaceLocator,
    model_id: String,
}

impl OnnxEmbeddingExtractor {
    /// Loads the first candidate model that opens; the rest are not touched.
    pub fn load_first_available(
        candidates: &[PathBuf],
        locator: OnnxFaceLocator,
    ) -> Result<Self, ExtractorInitError> {
        let mut tried = Vec::with_capacity(candidates.len());
        for path in candidates {
            tried.push(path.display().to_string());
            if !path.exists() {
                log::warn!("Embedding model {} not found", path.display());
                continue;
            }
            match onnx_session::build(path) {
                Ok(session) => {
                    let model_id = model_id_for(path);
                    log::info!("Using embedding model {model_id} ({})", path.display());
                    return Ok(Self {
                        session,
                        locator,
                        model_id,
                    });
                }
                Err(e) => log::warn!("Cannot load embedding model {}: {e}", path.display()),
            }
        }
        Err(ExtractorInitError::NoModelAvailable { tried })
    }

    fn embed(&mut self, face: &Frame) -> Result<Embedding, Box<dyn std::error::Error>> {
        let tensor = preprocess(face);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Embedding model produced no outputs".into());
        }
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl EmbeddingExtractor for OnnxEmbeddingExtractor {
    fn extract(&mut self, image_path: &Path) -> Result<Embedding, ExtractionError> {
        let unreadable = |reason: String| ExtractionError::Unreadable {
            path: image_path.to_path_buf(),
            reason,
        };
        let image = image::open(image_path).map_err(|e| unreadable(e.to_string()))?;
        let frame = Frame::from_rgb_image(image.to_rgb8(), 0);
        if frame.is_empty() {
            return Err(unreadable("image has no pixels".to_string()));
        }

        let faces = self
            .locator
            .locate(&frame)
            .map_err(|e| ExtractionError::Inference(e.to_string()))?;
        let face = largest_face(&faces)
            .map(|f| frame.crop(&f.bbox.expand_clamped(0, frame.width(), frame.height())))
            .filter(|crop| !crop.is_empty())
            .ok_or_else(|| ExtractionError::NoFace(image_path.to_path_buf()))?;

        self.embed(&face)
            .map_err(|e| ExtractionError::Inference(e.to_string()))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Model identifier used to key the cache: the model file stem.
pub fn model_id_for(model_path: &Path) -> String {
    model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| model_path.display().to_string())
}

/// Face with the largest box area; the earliest wins ties.
fn largest_face(faces: &[FaceBox]) -> Option<&FaceBox> {
    faces.iter().fold(None, |best: Option<&FaceBox>, f| match best {
        Some(b) if b.bbox.area() >= f.bbox.area() => Some(b),
        _ => Some(f),
    })
}

/// Resize to 112x112 by centre sampling, normalize, NCHW layout.
fn preprocess(face: &Frame) -> ndarray::Array4<f32> {
    let src = face.as_ndarray();
    let src_w = face.width() as usize;
    let src_h = face.height() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / INPUT_SIZE as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_SIZE as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (src[[src_y, src_x, c]] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score: 0.9,
        }
    }

    #[test]
    fn test_largest_face_by_area() {
        let faces = vec![face(0.0, 0.0, 10.0, 10.0), face(0.0, 0.0, 30.0, 20.0)];
        assert_eq!(largest_face(&faces), Some(&faces[1]));
    }

    #[test]
    fn test_largest_face_tie_keeps_first() {
        let faces = vec![face(0.0, 0.0, 10.0, 10.0), face(50.0, 50.0, 60.0, 60.0)];
        assert_eq!(largest_face(&faces), Some(&faces[0]));
    }

    #[test]
    fn test_largest_face_none_when_empty() {
        assert_eq!(largest_face(&[]), None);
    }

    #[rstest]
    #[case("/models/w600k_r50.onnx", "w600k_r50")]
    #[case("custom/my-arcface.v2.onnx", "my-arcface.v2")]
    fn test_model_id_is_file_stem(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(model_id_for(Path::new(path)), expected);
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let frame = Frame::new(vec![255u8; 50 * 40 * 3], 50, 40, 3, 0);
        let tensor = preprocess(&frame);
        assert_eq!(tensor.shape(), &[1, 3, 112, 112]);
        assert_relative_eq!(tensor[[0, 2, 111, 111]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_preprocess_normalization_min_and_mid() {
        let black = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        assert_relative_eq!(preprocess(&black)[[0, 0, 0, 0]], -1.0, epsilon = 1e-6);

        let gray = Frame::new(vec![127u8; 10 * 10 * 3], 10, 10, 3, 0);
        let expected = (127.0 - 127.5) / 127.5;
        assert_relative_eq!(preprocess(&gray)[[0, 1, 5, 5]], expected, epsilon = 1e-6);
    }

    #[test]
    fn test_no_model_error_lists_candidates() {
        let err = ExtractorInitError::NoModelAvailable {
            tried: vec!["a.onnx".into(), "b.onnx".into()],
        };
        assert_eq!(
            err.to_string(),
            "no embedding model could be loaded (tried: a.onnx, b.onnx)"
        );
    }
}
