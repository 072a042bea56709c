use crate::identity::domain::person_registry::PersonRegistry;
use crate::identity::domain::track_deduplicator::TrackDeduplicator;
use crate::recognition::domain::embedding_store::EmbeddingStore;
use crate::recognition::domain::matcher::Matcher;

use super::stats_collector::{RecognitionReport, StatsCollector};

/// Everything one run mutates, built once at startup and handed to the
/// use case explicitly.
pub struct PipelineContext {
    pub store: EmbeddingStore,
    pub matcher: Matcher,
    pub registry: PersonRegistry,
    pub dedup: TrackDeduplicator,
    pub stats: StatsCollector,
}

impl PipelineContext {
    pub fn new(store: EmbeddingStore, matcher: Matcher, registry: PersonRegistry) -> Self {
        Self {
            store,
            matcher,
            registry,
            dedup: TrackDeduplicator::new(),
            stats: StatsCollector::new(),
        }
    }

    /// Ends the run and produces the report.
    pub fn finish(self) -> RecognitionReport {
        let mut stats = self.stats;
        for (name, duration) in self.store.extraction_times() {
            stats.record_embedding_time(name, *duration);
        }
        stats.finalize(Some(self.store.model_info()), self.registry.summaries())
    }
}
