use super::embedding::cosine_similarity;
use super::embedding_store::EmbeddingStore;

/// Result of comparing a probe against the enrolled faces.
///
/// `Unknown` still carries the best similarity seen (0.0 when nothing was
/// compared) so callers can log how close the probe came.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    Identified { name: String, confidence: f64 },
    Unknown { best_similarity: f64 },
}

impl MatchOutcome {
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Identified { confidence, .. } => *confidence,
            Self::Unknown { best_similarity } => *best_similarity,
        }
    }
}

/// Nearest-neighbour identification by cosine similarity.
#[derive(Clone, Debug)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Picks the enrolled face most similar to `probe`.
    ///
    /// Ties go to the earliest enrolled face. The best face counts as a
    /// match only when its similarity is at least the threshold.
    pub fn best_match(&self, store: &EmbeddingStore, probe: Option<&[f32]>) -> MatchOutcome {
        let Some(probe) = probe else {
            return MatchOutcome::Unknown {
                best_similarity: 0.0,
            };
        };

        let mut best: Option<(usize, f64)> = None;
        for (i, stored) in store.embeddings().iter().enumerate() {
            let sim = cosine_similarity(probe, stored);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((i, sim));
            }
        }

        match best {
            Some((i, sim)) if sim >= self.threshold => MatchOutcome::Identified {
                name: store.names()[i].clone(),
                confidence: sim,
            },
            Some((_, sim)) => MatchOutcome::Unknown {
                best_similarity: sim,
            },
            None => MatchOutcome::Unknown {
                best_similarity: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::embedding_store::tests::{MemoryCache, TableExtractor};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::fs;

    fn store_with(faces: &[(&str, Vec<f32>)]) -> EmbeddingStore {
        let dir = tempfile::tempdir().unwrap();
        let entries: Vec<(String, Vec<f32>)> = faces
            .iter()
            .map(|(name, e)| (format!("{name}.jpg"), e.clone()))
            .collect();
        let table: Vec<(&str, Vec<f32>)> =
            entries.iter().map(|(f, e)| (f.as_str(), e.clone())).collect();
        let extractor = TableExtractor::new("m1", &table);
        let mut store =
            EmbeddingStore::new(Box::new(extractor), Box::new(MemoryCache::default()));
        for (name, _) in faces {
            let path = dir.path().join(format!("{name}.jpg"));
            fs::write(&path, b"img").unwrap();
            assert!(store.enroll_single(name, &path));
        }
        store
    }

    #[test]
    fn test_empty_store_is_unknown_with_zero_confidence() {
        let store = store_with(&[]);
        let outcome = Matcher::new(0.55).best_match(&store, Some(&[1.0, 0.0][..]));
        assert_eq!(
            outcome,
            MatchOutcome::Unknown {
                best_similarity: 0.0
            }
        );
    }

    #[test]
    fn test_missing_probe_is_unknown_with_zero_confidence() {
        let store = store_with(&[("alice", vec![1.0, 0.0])]);
        let outcome = Matcher::new(0.55).best_match(&store, None);
        assert_eq!(outcome.confidence(), 0.0);
        assert!(matches!(outcome, MatchOutcome::Unknown { .. }));
    }

    #[rstest]
    #[case(0.55, true)]
    #[case(0.79, true)]
    #[case(0.81, false)]
    fn test_threshold_boundaries(#[case] threshold: f64, #[case] identified: bool) {
        // cos ~= 0.8
        let store = store_with(&[("alice", vec![1.0, 0.0])]);
        let outcome = Matcher::new(threshold).best_match(&store, Some(&[0.8, 0.6][..]));

        assert_relative_eq!(outcome.confidence(), 0.8, epsilon = 1e-6);
        assert_eq!(
            matches!(outcome, MatchOutcome::Identified { .. }),
            identified
        );
    }

    #[test]
    fn test_similarity_equal_to_threshold_matches() {
        let store = store_with(&[("alice", vec![1.0, 0.0])]);
        let outcome = Matcher::new(1.0).best_match(&store, Some(&[2.0, 0.0][..]));
        assert!(matches!(outcome, MatchOutcome::Identified { .. }));
    }

    #[test]
    fn test_below_threshold_reports_best_similarity() {
        let store = store_with(&[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])]);
        let outcome = Matcher::new(0.9).best_match(&store, Some(&[0.6, 0.8][..]));
        match outcome {
            MatchOutcome::Unknown { best_similarity } => {
                assert_relative_eq!(best_similarity, 0.8, epsilon = 1e-6)
            }
            other => panic!("expected unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_picks_most_similar_face() {
        let store = store_with(&[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])]);
        let outcome = Matcher::new(0.55).best_match(&store, Some(&[0.1, 0.9][..]));
        match outcome {
            MatchOutcome::Identified { name, .. } => assert_eq!(name, "bob"),
            other => panic!("expected bob, got {other:?}"),
        }
    }

    #[test]
    fn test_tie_goes_to_first_enrolled() {
        let store = store_with(&[("alice", vec![1.0, 0.0]), ("alice2", vec![1.0, 0.0])]);
        let outcome = Matcher::new(0.5).best_match(&store, Some(&[1.0, 0.0][..]));
        match outcome {
            MatchOutcome::Identified { name, .. } => assert_eq!(name, "alice"),
            other => panic!("expected alice, got {other:?}"),
        }
    }
}
