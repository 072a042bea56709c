use serde::{Deserialize, Serialize};

use super::embedding::Embedding;

/// Persisted enrollment: parallel `names[i] <-> embeddings[i]` for one model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedEmbeddings {
    pub model: String,
    pub names: Vec<String>,
    pub embeddings: Vec<Embedding>,
}

/// Domain interface for the model-tagged embedding cache.
pub trait EmbeddingCache: Send {
    /// Returns the cached enrollment only if it was produced by `model_id`.
    ///
    /// Missing, unreadable or mismatched caches all yield `None`.
    fn load(&self, model_id: &str) -> Option<CachedEmbeddings>;

    /// Replaces the cache contents.
    fn save(&self, cached: &CachedEmbeddings) -> Result<(), Box<dyn std::error::Error>>;

    /// Deletes the cache. Clearing an absent cache is not an error.
    fn clear(&self) -> Result<(), Box<dyn std::error::Error>>;
}
