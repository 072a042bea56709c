use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::embedding::Embedding;
use super::embedding_cache::{CachedEmbeddings, EmbeddingCache};
use super::embedding_extractor::{EmbeddingExtractor, ExtractionError};
use crate::shared::constants::REFERENCE_IMAGE_EXTENSIONS;

/// Where an enrollment's embeddings came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrollmentSource {
    Cache,
    Computed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub enrolled_faces: usize,
}

/// Registry of known faces for the active embedding model.
///
/// Owns the `names[i] <-> embeddings[i]` records and keeps the model-tagged
/// cache in step with them.
pub struct EmbeddingStore {
    extractor: Box<dyn EmbeddingExtractor>,
    cache: Box<dyn EmbeddingCache>,
    names: Vec<String>,
    embeddings: Vec<Embedding>,
    extraction_times: Vec<(String, Duration)>,
}

impl EmbeddingStore {
    pub fn new(extractor: Box<dyn EmbeddingExtractor>, cache: Box<dyn EmbeddingCache>) -> Self {
        Self {
            extractor,
            cache,
            names: Vec::new(),
            embeddings: Vec::new(),
            extraction_times: Vec::new(),
        }
    }

    /// Enrolls every reference image in `folder`, or restores the previous
    /// enrollment from the cache when it was made with the active model.
    ///
    /// Each image is enrolled under its file stem. Images without a usable
    /// face are skipped. The cache is written only when at least one face
    /// was enrolled.
    pub fn enroll_from_folder(&mut self, folder: &Path) -> std::io::Result<EnrollmentSource> {
        let model_id = self.extractor.model_id().to_string();
        if let Some(cached) = self.cache.load(&model_id) {
            if cached.names.len() == cached.embeddings.len() {
                log::info!(
                    "Loaded {} cached embeddings for model {model_id}",
                    cached.names.len()
                );
                self.names = cached.names;
                self.embeddings = cached.embeddings;
                return Ok(EnrollmentSource::Cache);
            }
            log::warn!("Embedding cache for {model_id} is inconsistent, recomputing");
        }

        for path in reference_images(folder)? {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let start = Instant::now();
            match self.extractor.extract(&path) {
                Ok(embedding) => {
                    self.extraction_times.push((name.clone(), start.elapsed()));
                    log::info!("Enrolled {name}");
                    self.names.push(name);
                    self.embeddings.push(embedding);
                }
                Err(e) if e.is_miss() => log::debug!("Skipping {}: {e}", path.display()),
                Err(e) => log::warn!("Skipping {}: {e}", path.display()),
            }
        }

        if self.names.is_empty() {
            log::warn!("No faces enrolled from {}", folder.display());
        } else {
            self.persist();
        }
        Ok(EnrollmentSource::Computed)
    }

    /// Enrolls one extra face and rewrites the whole cache.
    ///
    /// Returns `false`, leaving the store unchanged, when no embedding could
    /// be extracted.
    pub fn enroll_single(&mut self, name: &str, image_path: &Path) -> bool {
        let start = Instant::now();
        let extracted = self.extractor.extract(image_path);
        self.extraction_times.push((name.to_string(), start.elapsed()));
        match extracted {
            Ok(embedding) => {
                self.names.push(name.to_string());
                self.embeddings.push(embedding);
                self.persist();
                log::info!("Enrolled {name} from {}", image_path.display());
                true
            }
            Err(e) => {
                log::warn!("Could not enroll {name}: {e}");
                false
            }
        }
    }

    /// Like [`enroll_single`](Self::enroll_single), but a name that is
    /// already enrolled (e.g. restored from the cache) is kept as is and
    /// nothing is extracted or rewritten.
    pub fn enroll_if_absent(&mut self, name: &str, image_path: &Path) -> bool {
        if self.contains(name) {
            log::debug!("{name} already enrolled, skipping {}", image_path.display());
            return true;
        }
        self.enroll_single(name, image_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Embeds a probe image.
    ///
    /// A miss (no face, unreadable file) is `Ok(None)`; only inference
    /// faults are errors.
    pub fn probe(&mut self, image_path: &Path) -> Result<Option<Embedding>, ExtractionError> {
        match self.extractor.extract(image_path) {
            Ok(embedding) => Ok(Some(embedding)),
            Err(e) if e.is_miss() => {
                log::debug!("Probe miss: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes the cache of the active model.
    pub fn reset_cache(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.cache.clear()
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_id: self.extractor.model_id().to_string(),
            enrolled_faces: self.names.len(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Extraction durations of the faces computed in this run, in order.
    pub fn extraction_times(&self) -> &[(String, Duration)] {
        &self.extraction_times
    }

    fn persist(&self) {
        let cached = CachedEmbeddings {
            model: self.extractor.model_id().to_string(),
            names: self.names.clone(),
            embeddings: self.embeddings.clone(),
        };
        if let Err(e) = self.cache.save(&cached) {
            log::warn!("Failed to write embedding cache: {e}");
        }
    }
}

/// Reference images in `folder`, sorted by path so enrollment order is stable.
fn reference_images(folder: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_reference_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

pub fn is_reference_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            REFERENCE_IMAGE_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}
