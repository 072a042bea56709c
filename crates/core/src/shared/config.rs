use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_CROP_MARGIN, DEFAULT_DETECTOR_CONFIDENCE, DEFAULT_DETECTOR_IOU,
    DEFAULT_FRAME_STRIDE, DEFAULT_MATCH_THRESHOLD, DEFAULT_MIN_CROP_SIDE, PERSON_CLASS_ID,
    TRACKER_MAX_LOST,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Knobs for the per-detection identification loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentificationConfig {
    pub match_threshold: f64,
    pub frame_stride: usize,
    pub crop_margin: u32,
    pub min_crop_side: u32,
    pub target_class: u32,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            frame_stride: DEFAULT_FRAME_STRIDE,
            crop_margin: DEFAULT_CROP_MARGIN,
            min_crop_side: DEFAULT_MIN_CROP_SIDE,
            target_class: PERSON_CLASS_ID,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence: f64,
    pub iou: f64,
    pub max_lost_frames: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_DETECTOR_CONFIDENCE,
            iou: DEFAULT_DETECTOR_IOU,
            max_lost_frames: TRACKER_MAX_LOST,
        }
    }
}

/// Complete run configuration.
///
/// Every field has a default, so a config file only needs the keys it
/// wants to change. Command-line flags are applied on top by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub identification: IdentificationConfig,
    pub detector: DetectorConfig,
    /// Directory for embedding caches; platform data dir when unset.
    pub cache_dir: Option<PathBuf>,
    /// Directory searched for models before downloading.
    pub bundled_models_dir: Option<PathBuf>,
}

impl RecognitionConfig {
    /// Default config file location (`<config dir>/facetrack/config.json`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    /// Loads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Embedding cache directory, falling back to the platform data dir.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join("cache")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let id = &self.identification;
        if !(-1.0..=1.0).contains(&id.match_threshold) {
            return Err(ConfigError::Invalid(format!(
                "Match threshold must be between -1.0 and 1.0, got {}",
                id.match_threshold
            )));
        }
        if id.frame_stride == 0 {
            return Err(ConfigError::Invalid(
                "Frame stride must be at least 1".to_string(),
            ));
        }
        if id.min_crop_side == 0 {
            return Err(ConfigError::Invalid(
                "Minimum crop side must be at least 1 pixel".to_string(),
            ));
        }
        let det = &self.detector;
        if !(0.0..=1.0).contains(&det.confidence) {
            return Err(ConfigError::Invalid(format!(
                "Detector confidence must be between 0.0 and 1.0, got {}",
                det.confidence
            )));
        }
        if !(0.0..=1.0).contains(&det.iou) {
            return Err(ConfigError::Invalid(format!(
                "Detector IoU must be between 0.0 and 1.0, got {}",
                det.iou
            )));
        }
        Ok(())
    }
}
