use std::path::{Path, PathBuf};

use thiserror::Error;

use super::embedding::Embedding;

/// Why an image produced no embedding.
///
/// `NoFace` and `Unreadable` are misses: the image simply has nothing to
/// identify. `Inference` is a fault in the model itself.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no face found in {0}")]
    NoFace(PathBuf),
    #[error("cannot read image {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("embedding inference failed: {0}")]
    Inference(String),
}

impl ExtractionError {
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NoFace(_) | Self::Unreadable { .. })
    }
}

/// Domain interface for turning a face image on disk into an embedding.
///
/// Implementations hold an inference session, hence `&mut self`.
pub trait EmbeddingExtractor: Send {
    fn extract(&mut self, image_path: &Path) -> Result<Embedding, ExtractionError>;

    /// Identifier of the active model, used to key the embedding cache.
    fn model_id(&self) -> &str;
}
