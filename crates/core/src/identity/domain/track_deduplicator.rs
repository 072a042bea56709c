use std::collections::HashSet;

/// Track IDs already resolved to an identity.
///
/// A track enters the set only on a successful identification and is then
/// skipped for the rest of the run. Failed attempts leave it out, so it is
/// retried on every sampled frame. Detections without a track ID are never
/// resolved.
#[derive(Debug, Default)]
pub struct TrackDeduplicator {
    resolved: HashSet<u32>,
}

impl TrackDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self, track_id: Option<u32>) -> bool {
        track_id.is_some_and(|id| self.resolved.contains(&id))
    }

    /// Marks `track_id` resolved. When the identity moved here from another
    /// track, `previous` is released so that track is identified afresh.
    pub fn mark_resolved(&mut self, track_id: Option<u32>, previous: Option<u32>) {
        if let Some(prev) = previous {
            if Some(prev) != track_id && self.resolved.remove(&prev) {
                log::debug!("Released track {prev}");
            }
        }
        if let Some(id) = track_id {
            self.resolved.insert(id);
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}
