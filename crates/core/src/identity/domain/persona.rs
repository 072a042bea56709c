use std::path::{Path, PathBuf};

use serde::Serialize;

/// A known individual and the tracks they have been identified on.
///
/// `identification_count` always equals `track_id_history.len()`, and there
/// are never more confidences than history entries.
#[derive(Clone, Debug, PartialEq)]
pub struct Persona {
    name: String,
    reference_image_path: PathBuf,
    current_track_id: Option<u32>,
    track_id_history: Vec<Option<u32>>,
    confidence_history: Vec<f64>,
    identification_count: usize,
}

/// Serializable per-persona statistics for the run report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonaSummary {
    pub name: String,
    pub reference_image: PathBuf,
    pub current_track_id: Option<u32>,
    pub track_ids: Vec<Option<u32>>,
    pub identification_count: usize,
    pub average_confidence: Option<f64>,
}

impl Persona {
    pub fn new(name: impl Into<String>, reference_image_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            reference_image_path: reference_image_path.into(),
            current_track_id: None,
            track_id_history: Vec::new(),
            confidence_history: Vec::new(),
            identification_count: 0,
        }
    }

    /// Records an identification on `track_id` and returns the track the
    /// persona was bound to before.
    pub fn bind(&mut self, track_id: Option<u32>, confidence: Option<f64>) -> Option<u32> {
        let previous = self.current_track_id;
        self.track_id_history.push(track_id);
        self.current_track_id = track_id;
        self.identification_count += 1;
        if let Some(c) = confidence {
            self.confidence_history.push(c);
        }
        previous
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference_image_path(&self) -> &Path {
        &self.reference_image_path
    }

    pub fn current_track_id(&self) -> Option<u32> {
        self.current_track_id
    }

    pub fn track_id_history(&self) -> &[Option<u32>] {
        &self.track_id_history
    }

    pub fn confidence_history(&self) -> &[f64] {
        &self.confidence_history
    }

    pub fn identification_count(&self) -> usize {
        self.identification_count
    }

    pub fn average_confidence(&self) -> Option<f64> {
        if self.confidence_history.is_empty() {
            return None;
        }
        Some(self.confidence_history.iter().sum::<f64>() / self.confidence_history.len() as f64)
    }

    pub fn summary(&self) -> PersonaSummary {
        PersonaSummary {
            name: self.name.clone(),
            reference_image: self.reference_image_path.clone(),
            current_track_id: self.current_track_id,
            track_ids: self.track_id_history.clone(),
            identification_count: self.identification_count,
            average_confidence: self.average_confidence(),
        }
    }
}
