use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::identity::domain::persona::PersonaSummary;
use crate::recognition::domain::embedding_store::ModelInfo;

/// Why an identification attempt did not produce a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The extractor found no usable face in the crop.
    NoFace,
    /// A face was embedded but nothing enrolled was similar enough.
    BelowThreshold,
    /// The attempt raised an error (I/O, inference).
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FailureBreakdown {
    pub no_face: usize,
    pub below_threshold: usize,
    pub errors: usize,
}

/// Finalized run statistics. Durations are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecognitionReport {
    pub frames_processed: usize,
    pub successful_identifications: usize,
    pub failed_attempts: usize,
    pub failures: FailureBreakdown,
    /// Percentage of attempts that identified someone; 0 without attempts.
    pub success_rate: f64,
    pub mean_confidence: f64,
    pub confidence_scores: Vec<f64>,
    pub embedding_times: BTreeMap<String, f64>,
    pub mean_embedding_time: f64,
    pub video_processing_time: f64,
    /// Fastest extraction+matching time per identified name.
    pub best_match_times: BTreeMap<String, f64>,
    pub all_match_times: BTreeMap<String, Vec<f64>>,
    pub model: Option<ModelInfo>,
    pub personas: Vec<PersonaSummary>,
}

impl RecognitionReport {
    pub fn summary_string(&self) -> String {
        let mut lines = vec![format!(
            "Recognition summary ({} frames, {:.1}s):",
            self.frames_processed, self.video_processing_time
        )];
        lines.push(format!(
            "  Identified: {}  Failed: {} (no face {}, below threshold {}, errors {})",
            self.successful_identifications,
            self.failed_attempts,
            self.failures.no_face,
            self.failures.below_threshold,
            self.failures.errors
        ));
        lines.push(format!(
            "  Success rate: {:.1}%  Mean confidence: {:.3}",
            self.success_rate, self.mean_confidence
        ));
        if !self.embedding_times.is_empty() {
            lines.push(format!(
                "  Mean embedding time: {:.1}ms",
                self.mean_embedding_time * 1000.0
            ));
        }
        for p in self.personas.iter().filter(|p| p.identification_count > 0) {
            lines.push(format!(
                "  {}: {} identifications, tracks {:?}",
                p.name, p.identification_count, p.track_ids
            ));
        }
        lines.join("\n")
    }
}

/// Running counters and timing samples for one run.
///
/// Mutated during the run and consumed by [`StatsCollector::finalize`], so
/// aggregates are computed exactly once.
#[derive(Debug, Default)]
pub struct StatsCollector {
    frames_processed: usize,
    successful_identifications: usize,
    failed_attempts: usize,
    failures: FailureBreakdown,
    confidence_scores: Vec<f64>,
    embedding_times: BTreeMap<String, Duration>,
    match_times: BTreeMap<String, Vec<Duration>>,
    video_processing_time: Duration,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self) {
        self.frames_processed += 1;
    }

    pub fn record_success(&mut self, confidence: f64) {
        self.successful_identifications += 1;
        self.confidence_scores.push(confidence);
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.failed_attempts += 1;
        match kind {
            FailureKind::NoFace => self.failures.no_face += 1,
            FailureKind::BelowThreshold => self.failures.below_threshold += 1,
            FailureKind::Error => self.failures.errors += 1,
        }
    }

    /// Re-enrolling a name overwrites its earlier duration.
    pub fn record_embedding_time(&mut self, name: &str, duration: Duration) {
        self.embedding_times.insert(name.to_string(), duration);
    }

    pub fn record_match_time(&mut self, name: &str, duration: Duration) {
        self.match_times
            .entry(name.to_string())
            .or_default()
            .push(duration);
    }

    pub fn set_video_processing_time(&mut self, duration: Duration) {
        self.video_processing_time = duration;
    }

    pub fn frames_processed(&self) -> usize {
        self.frames_processed
    }

    pub fn successful_identifications(&self) -> usize {
        self.successful_identifications
    }

    pub fn failed_attempts(&self) -> usize {
        self.failed_attempts
    }

    pub fn failures(&self) -> &FailureBreakdown {
        &self.failures
    }

    pub fn finalize(
        self,
        model: Option<ModelInfo>,
        personas: Vec<PersonaSummary>,
    ) -> RecognitionReport {
        let attempts = self.successful_identifications + self.failed_attempts;
        let success_rate = if attempts == 0 {
            0.0
        } else {
            self.successful_identifications as f64 / attempts as f64 * 100.0
        };

        let embedding_times: BTreeMap<String, f64> = self
            .embedding_times
            .iter()
            .map(|(name, d)| (name.clone(), d.as_secs_f64()))
            .collect();
        let mean_embedding_time = mean(embedding_times.values().copied());

        let all_match_times: BTreeMap<String, Vec<f64>> = self
            .match_times
            .iter()
            .map(|(name, ds)| (name.clone(), ds.iter().map(Duration::as_secs_f64).collect()))
            .collect();
        let best_match_times = all_match_times
            .iter()
            .filter_map(|(name, ts)| {
                ts.iter()
                    .copied()
                    .reduce(f64::min)
                    .map(|best| (name.clone(), best))
            })
            .collect();

        RecognitionReport {
            frames_processed: self.frames_processed,
            successful_identifications: self.successful_identifications,
            failed_attempts: self.failed_attempts,
            failures: self.failures,
            success_rate,
            mean_confidence: mean(self.confidence_scores.iter().copied()),
            confidence_scores: self.confidence_scores,
            embedding_times,
            mean_embedding_time,
            video_processing_time: self.video_processing_time.as_secs_f64(),
            best_match_times,
            all_match_times,
            model,
            personas,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
