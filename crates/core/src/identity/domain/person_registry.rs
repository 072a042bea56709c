use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::persona::{Persona, PersonaSummary};
use crate::recognition::domain::embedding_store::is_reference_image;

/// Effect of a bind request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// No persona with that name; nothing changed.
    UnknownIdentity,
    /// Bound; `previous` is the track the persona held before.
    Bound { previous: Option<u32> },
}

/// Name -> [`Persona`], one per reference image.
///
/// Independent of the embedding store: a name can be enrolled without a
/// persona (binds are then no-ops) and vice versa.
#[derive(Debug, Default)]
pub struct PersonRegistry {
    personas: BTreeMap<String, Persona>,
}

impl PersonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One persona per reference image in `folder`, named by file stem.
    pub fn from_folder(folder: &Path) -> std::io::Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_reference_image(p))
            .collect();
        paths.sort();

        let mut registry = Self::new();
        for path in paths {
            if let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) {
                registry.register(&stem, &path);
            }
        }
        log::info!("Registered {} personas", registry.len());
        Ok(registry)
    }

    /// Adds a persona; an existing persona with the same name is kept.
    pub fn register(&mut self, name: &str, reference_image_path: &Path) {
        self.personas
            .entry(name.to_string())
            .or_insert_with(|| Persona::new(name, reference_image_path));
    }

    pub fn bind(&mut self, name: &str, track_id: Option<u32>, confidence: Option<f64>) -> Binding {
        match self.personas.get_mut(name) {
            Some(persona) => Binding::Bound {
                previous: persona.bind(track_id, confidence),
            },
            None => {
                log::debug!("No persona named {name}, bind ignored");
                Binding::UnknownIdentity
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.get(name)
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Summaries sorted by name.
    pub fn summaries(&self) -> Vec<PersonaSummary> {
        self.personas.values().map(Persona::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_folder_uses_stems_of_images_only() {
        let dir = tempfile::tempdir().unwrap();
        for f in ["bob.PNG", "alice.jpg", "readme.md"] {
            fs::write(dir.path().join(f), b"x").unwrap();
        }
        let registry = PersonRegistry::from_folder(dir.path()).unwrap();

        assert_eq!(registry.len(), 2);
        let bob = registry.get("bob").unwrap();
        assert_eq!(bob.reference_image_path(), dir.path().join("bob.PNG"));
        assert!(registry.get("readme").is_none());
    }

    #[test]
    fn test_bind_unknown_name_is_noop() {
        let mut registry = PersonRegistry::new();
        assert_eq!(
            registry.bind("ghost", Some(1), Some(0.9)),
            Binding::UnknownIdentity
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_bind_reports_previous_track() {
        let mut registry = PersonRegistry::new();
        registry.register("alice", Path::new("alice.jpg"));

        assert_eq!(
            registry.bind("alice", Some(7), Some(0.8)),
            Binding::Bound { previous: None }
        );
        assert_eq!(
            registry.bind("alice", Some(9), Some(0.7)),
            Binding::Bound { previous: Some(7) }
        );
        assert_eq!(
            registry.get("alice").unwrap().track_id_history(),
            &[Some(7), Some(9)]
        );
    }

    #[test]
    fn test_register_keeps_existing_persona() {
        let mut registry = PersonRegistry::new();
        registry.register("alice", Path::new("a1.jpg"));
        registry.bind("alice", Some(1), None);
        registry.register("alice", Path::new("a2.jpg"));

        let alice = registry.get("alice").unwrap();
        assert_eq!(alice.reference_image_path(), Path::new("a1.jpg"));
        assert_eq!(alice.identification_count(), 1);
    }

    #[test]
    fn test_summaries_sorted_by_name() {
        let mut registry = PersonRegistry::new();
        registry.register("zoe", Path::new("zoe.jpg"));
        registry.register("adam", Path::new("adam.jpg"));
        let names: Vec<String> = registry.summaries().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["adam", "zoe"]);
    }
}
