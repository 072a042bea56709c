/// Embedding cache stored as one JSON document per model.
///
/// Layout: `{"model": "...", "names": [...], "embeddings": [[...], ...]}`.
/// The `model` header is checked before the (much larger) payload is
/// decoded, so switching models never pays for parsing a stale cache.
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::recognition::domain::embedding_cache::{CachedEmbeddings, EmbeddingCache};
use crate::shared::constants::CACHE_FILE_PREFIX;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove cache {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode cache: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct CacheHeader {
    model: String,
}

pub struct JsonEmbeddingCache {
    path: PathBuf,
}

impl JsonEmbeddingCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache file for `model_id` inside `cache_dir`.
    pub fn for_model(cache_dir: &Path, model_id: &str) -> Self {
        let file = format!("{CACHE_FILE_PREFIX}{}.json", model_id.to_lowercase());
        Self::new(cache_dir.join(file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EmbeddingCache for JsonEmbeddingCache {
    fn load(&self, model_id: &str) -> Option<CachedEmbeddings> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot read cache {}: {e}", self.path.display());
                }
                return None;
            }
        };

        let header: CacheHeader = match serde_json::from_str(&json) {
            Ok(h) => h,
            Err(e) => {
                log::warn!("Ignoring corrupt cache {}: {e}", self.path.display());
                return None;
            }
        };
        if header.model != model_id {
            log::info!(
                "Cache {} was built with {}, active model is {model_id}",
                self.path.display(),
                header.model
            );
            return None;
        }

        serde_json::from_str(&json)
            .map_err(|e| log::warn!("Ignoring corrupt cache {}: {e}", self.path.display()))
            .ok()
    }

    fn save(&self, cached: &CachedEmbeddings) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string(cached).map_err(CacheError::from)?;

        let part = self.path.with_extension("json.part");
        fs::write(&part, json).map_err(|source| CacheError::Write {
            path: part.clone(),
            source,
        })?;
        fs::rename(&part, &self.path).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        log::debug!(
            "Saved {} embeddings to {}",
            cached.names.len(),
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), Box<dyn std::error::Error>> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Removed cache {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Remove {
                path: self.path.clone(),
                source,
            }
            .into()),
        }
    }
}
