use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::detection::domain::detection::{Detection, TrackedFrame};
use crate::identity::domain::person_registry::Binding;
use crate::recognition::domain::matcher::MatchOutcome;
use crate::shared::config::IdentificationConfig;
use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

use super::pipeline_context::PipelineContext;
use super::stats_collector::FailureKind;

/// Why a detection was skipped before any identification work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    WrongClass,
    AlreadyResolved,
    InvalidCrop,
}

/// Result of handling one detection.
#[derive(Clone, Debug, PartialEq)]
pub enum DetectionOutcome {
    Dropped(DropReason),
    Identified { name: String, confidence: f64 },
    Failed(FailureKind),
}

/// Online identification loop over a tracked-frame stream.
///
/// Every `frame_stride`-th frame is sampled. Each person detection on a
/// sampled frame whose track is not yet resolved is cropped, written to a
/// scratch image, embedded and matched. Crops are processed one at a time
/// through the single `crop_path`.
pub struct IdentifyPeopleUseCase {
    config: IdentificationConfig,
    crop_path: PathBuf,
    image_writer: Box<dyn ImageWriter>,
}

impl IdentifyPeopleUseCase {
    pub fn new(
        config: IdentificationConfig,
        crop_path: PathBuf,
        image_writer: Box<dyn ImageWriter>,
    ) -> Self {
        Self {
            config,
            crop_path,
            image_writer,
        }
    }

    pub fn execute(
        &mut self,
        ctx: &mut PipelineContext,
        frames: impl Iterator<Item = TrackedFrame>,
    ) {
        let stride = self.config.frame_stride.max(1);
        let start = Instant::now();

        for (ordinal, tracked) in frames.enumerate() {
            if ordinal % stride != 0 {
                continue;
            }
            ctx.stats.record_frame();

            for detection in &tracked.detections {
                let outcome = self.process_detection(ctx, &tracked.frame, detection);
                log::debug!(
                    "Frame {ordinal} track {:?}: {outcome:?}",
                    detection.track_id
                );
            }
        }

        ctx.stats.set_video_processing_time(start.elapsed());
    }

    /// Filters, identifies and records one detection.
    pub fn process_detection(
        &self,
        ctx: &mut PipelineContext,
        frame: &Frame,
        detection: &Detection,
    ) -> DetectionOutcome {
        if detection.class_id != self.config.target_class {
            return DetectionOutcome::Dropped(DropReason::WrongClass);
        }
        if ctx.dedup.is_resolved(detection.track_id) {
            return DetectionOutcome::Dropped(DropReason::AlreadyResolved);
        }
        let rect =
            detection
                .bbox
                .expand_clamped(self.config.crop_margin, frame.width(), frame.height());
        if !rect.is_identifiable(self.config.min_crop_side) {
            return DetectionOutcome::Dropped(DropReason::InvalidCrop);
        }

        let crop = frame.crop(&rect);
        let started = Instant::now();
        let outcome = match self.identify(ctx, &crop) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Identification of track {:?} failed: {e}", detection.track_id);
                ctx.stats.record_failure(FailureKind::Error);
                return DetectionOutcome::Failed(FailureKind::Error);
            }
        };

        match outcome {
            Some(MatchOutcome::Identified { name, confidence }) => {
                let elapsed = started.elapsed();
                ctx.stats.record_success(confidence);
                ctx.stats.record_match_time(&name, elapsed);
                if let Binding::Bound { previous } =
                    ctx.registry.bind(&name, detection.track_id, Some(confidence))
                {
                    ctx.dedup.mark_resolved(detection.track_id, previous);
                }
                log::info!(
                    "Identified {name} on track {:?} ({confidence:.3})",
                    detection.track_id
                );
                DetectionOutcome::Identified { name, confidence }
            }
            Some(MatchOutcome::Unknown { best_similarity }) => {
                log::debug!("Best similarity {best_similarity:.3} below threshold");
                ctx.stats.record_failure(FailureKind::BelowThreshold);
                DetectionOutcome::Failed(FailureKind::BelowThreshold)
            }
            None => {
                ctx.stats.record_failure(FailureKind::NoFace);
                DetectionOutcome::Failed(FailureKind::NoFace)
            }
        }
    }

    /// Round-trips the crop through the scratch file. `None` means the
    /// extractor found no face in it.
    fn identify(
        &self,
        ctx: &mut PipelineContext,
        crop: &Frame,
    ) -> Result<Option<MatchOutcome>, Box<dyn std::error::Error>> {
        if ctx.store.is_empty() {
            return Ok(Some(MatchOutcome::Unknown {
                best_similarity: 0.0,
            }));
        }
        let _scratch = ScratchFile(&self.crop_path);
        self.image_writer.write(&self.crop_path, crop)?;

        let Some(probe) = ctx.store.probe(&self.crop_path)? else {
            return Ok(None);
        };
        Ok(Some(ctx.matcher.best_match(&ctx.store, Some(probe.as_slice()))))
    }
}

/// Removes the scratch crop when dropped, on every exit path.
struct ScratchFile<'a>(&'a Path);

impl Drop for ScratchFile<'_> {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {e}", self.0.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::BoundingBox;
    use crate::identity::domain::person_registry::PersonRegistry;
    use crate::recognition::domain::embedding::Embedding;
    use crate::recognition::domain::embedding_extractor::{EmbeddingExtractor, ExtractionError};
    use crate::recognition::domain::embedding_store::tests::MemoryCache;
    use crate::recognition::domain::embedding_store::EmbeddingStore;
    use crate::recognition::domain::matcher::Matcher;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    /// Reference images come from `faces`; every probe pops the next
    /// scripted result and checks the scratch crop exists at that moment.
    struct ScriptedExtractor {
        faces: HashMap<String, Embedding>,
        probes: VecDeque<Result<Embedding, ExtractionError>>,
        probe_calls: Arc<Mutex<usize>>,
    }

    impl EmbeddingExtractor for ScriptedExtractor {
        fn extract(&mut self, image_path: &Path) -> Result<Embedding, ExtractionError> {
            let stem = image_path.file_stem().unwrap().to_string_lossy().into_owned();
            if let Some(e) = self.faces.get(&stem) {
                return Ok(e.clone());
            }
            assert!(image_path.exists(), "probe crop must exist during extraction");
            *self.probe_calls.lock().unwrap() += 1;
            self.probes
                .pop_front()
                .unwrap_or_else(|| Err(ExtractionError::NoFace(image_path.to_path_buf())))
        }

        fn model_id(&self) -> &str {
            "stub"
        }
    }

    struct TouchWriter {
        fail: bool,
        sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl ImageWriter for TouchWriter {
        fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail {
                return Err("disk full".into());
            }
            fs::write(path, b"jpeg")?;
            self.sizes
                .lock()
                .unwrap()
                .push((frame.width(), frame.height()));
            Ok(())
        }
    }

    // --- Helpers ---

    struct Harness {
        _dir: tempfile::TempDir,
        crop_path: PathBuf,
        ctx: PipelineContext,
        probe_calls: Arc<Mutex<usize>>,
        sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    fn harness(
        faces: &[(&str, Embedding)],
        probes: Vec<Result<Embedding, ExtractionError>>,
        threshold: f64,
    ) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let faces_dir = dir.path().join("faces");
        fs::create_dir(&faces_dir).unwrap();
        for (name, _) in faces {
            fs::write(faces_dir.join(format!("{name}.jpg")), b"ref").unwrap();
        }

        let probe_calls = Arc::new(Mutex::new(0));
        let extractor = ScriptedExtractor {
            faces: faces
                .iter()
                .map(|(n, e)| (n.to_string(), e.clone()))
                .collect(),
            probes: probes.into(),
            probe_calls: probe_calls.clone(),
        };
        let mut store = EmbeddingStore::new(Box::new(extractor), Box::new(MemoryCache::default()));
        store.enroll_from_folder(&faces_dir).unwrap();
        let registry = PersonRegistry::from_folder(&faces_dir).unwrap();

        Harness {
            crop_path: dir.path().join("crop.jpg"),
            _dir: dir,
            ctx: PipelineContext::new(store, Matcher::new(threshold), registry),
            probe_calls,
            sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn use_case(h: &Harness, stride: usize, fail_writes: bool) -> IdentifyPeopleUseCase {
        IdentifyPeopleUseCase::new(
            IdentificationConfig {
                frame_stride: stride,
                ..IdentificationConfig::default()
            },
            h.crop_path.clone(),
            Box::new(TouchWriter {
                fail: fail_writes,
                sizes: h.sizes.clone(),
            }),
        )
    }

    fn person(track_id: Option<u32>) -> Detection {
        Detection {
            bbox: BoundingBox::new(100.0, 100.0, 200.0, 300.0),
            class_id: 0,
            score: 0.9,
            track_id,
        }
    }

    fn tracked(index: usize, detections: Vec<Detection>) -> TrackedFrame {
        TrackedFrame {
            frame: Frame::new(vec![0u8; 640 * 480 * 3], 640, 480, 3, index),
            detections,
        }
    }

    fn frame() -> Frame {
        Frame::new(vec![0u8; 640 * 480 * 3], 640, 480, 3, 0)
    }

    // --- Tests ---

    #[test]
    fn test_identifies_closest_face_above_threshold() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])],
            vec![Ok(vec![0.8, 0.6])],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &person(Some(5)));

        match outcome {
            DetectionOutcome::Identified { name, confidence } => {
                assert_eq!(name, "alice");
                assert!((confidence - 0.8).abs() < 1e-6);
            }
            other => panic!("expected alice, got {other:?}"),
        }
        assert_eq!(h.ctx.stats.successful_identifications(), 1);
        assert!(h.ctx.dedup.is_resolved(Some(5)));
        assert_eq!(
            h.ctx.registry.get("alice").unwrap().track_id_history(),
            &[Some(5)]
        );
        assert!(!h.crop_path.exists());
    }

    #[test]
    fn test_below_threshold_is_a_failure_without_binding() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])],
            vec![Ok(vec![-1.0, -0.1])],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &person(Some(5)));

        assert_eq!(outcome, DetectionOutcome::Failed(FailureKind::BelowThreshold));
        assert_eq!(h.ctx.stats.failed_attempts(), 1);
        assert_eq!(h.ctx.stats.successful_identifications(), 0);
        assert!(!h.ctx.dedup.is_resolved(Some(5)));
        assert_eq!(h.ctx.registry.get("alice").unwrap().identification_count(), 0);
    }

    #[test]
    fn test_resolved_track_is_skipped_without_extraction() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![Ok(vec![1.0, 0.0])], 0.5);
        let uc = use_case(&h, 1, false);

        uc.process_detection(&mut h.ctx, &frame(), &person(Some(5)));
        let second = uc.process_detection(&mut h.ctx, &frame(), &person(Some(5)));

        assert_eq!(second, DetectionOutcome::Dropped(DropReason::AlreadyResolved));
        assert_eq!(*h.probe_calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_failed_track_is_retried() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0])],
            vec![
                Err(ExtractionError::NoFace(PathBuf::from("crop.jpg"))),
                Ok(vec![1.0, 0.0]),
            ],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        let first = uc.process_detection(&mut h.ctx, &frame(), &person(Some(3)));
        let second = uc.process_detection(&mut h.ctx, &frame(), &person(Some(3)));

        assert_eq!(first, DetectionOutcome::Failed(FailureKind::NoFace));
        assert!(matches!(second, DetectionOutcome::Identified { .. }));
        assert_eq!(*h.probe_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_reassignment_releases_old_track() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0])],
            vec![Ok(vec![1.0, 0.0]), Ok(vec![1.0, 0.0])],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        uc.process_detection(&mut h.ctx, &frame(), &person(Some(7)));
        uc.process_detection(&mut h.ctx, &frame(), &person(Some(9)));

        let alice = h.ctx.registry.get("alice").unwrap();
        assert_eq!(alice.track_id_history(), &[Some(7), Some(9)]);
        assert_eq!(alice.current_track_id(), Some(9));
        assert!(!h.ctx.dedup.is_resolved(Some(7)));
        assert!(h.ctx.dedup.is_resolved(Some(9)));
    }

    #[test]
    fn test_untracked_detection_is_always_retried() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0])],
            vec![Ok(vec![1.0, 0.0]), Ok(vec![1.0, 0.0])],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        uc.process_detection(&mut h.ctx, &frame(), &person(None));
        let second = uc.process_detection(&mut h.ctx, &frame(), &person(None));

        assert!(matches!(second, DetectionOutcome::Identified { .. }));
        assert!(h.ctx.dedup.is_empty());
    }

    #[test]
    fn test_empty_store_is_unknown_without_extraction() {
        let mut h = harness(&[], vec![Ok(vec![1.0, 0.0])], 0.5);
        let uc = use_case(&h, 1, false);

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &person(Some(4)));

        assert_eq!(outcome, DetectionOutcome::Failed(FailureKind::BelowThreshold));
        assert_eq!(*h.probe_calls.lock().unwrap(), 0);
        assert!(h.sizes.lock().unwrap().is_empty());
        assert!(!h.ctx.dedup.is_resolved(Some(4)));
    }

    #[test]
    fn test_non_person_class_is_dropped() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![], 0.5);
        let uc = use_case(&h, 1, false);
        let mut chair = person(Some(1));
        chair.class_id = 56;

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &chair);

        assert_eq!(outcome, DetectionOutcome::Dropped(DropReason::WrongClass));
        assert_eq!(h.ctx.stats.failed_attempts(), 0);
    }

    #[test]
    fn test_small_crop_is_dropped_without_failure() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![], 0.5);
        let uc = use_case(&h, 1, false);
        // 0..15 + 20px margin -> 35px tall after clamping at the top edge
        let det = Detection {
            bbox: BoundingBox::new(100.0, 0.0, 200.0, 15.0),
            ..person(Some(1))
        };

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &det);

        assert_eq!(outcome, DetectionOutcome::Dropped(DropReason::InvalidCrop));
        assert_eq!(h.ctx.stats.failed_attempts(), 0);
        assert_eq!(*h.probe_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_crop_includes_clamped_margin() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![Ok(vec![1.0, 0.0])], 0.5);
        let uc = use_case(&h, 1, false);
        let det = Detection {
            bbox: BoundingBox::new(5.0, 100.0, 105.0, 200.0),
            ..person(Some(1))
        };

        uc.process_detection(&mut h.ctx, &frame(), &det);

        assert_eq!(h.sizes.lock().unwrap()[0], (125, 140));
    }

    #[test]
    fn test_inference_fault_counts_as_error_and_cleans_up() {
        let mut h = harness(
            &[("alice", vec![1.0, 0.0])],
            vec![Err(ExtractionError::Inference("session crashed".into()))],
            0.5,
        );
        let uc = use_case(&h, 1, false);

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &person(Some(2)));

        assert_eq!(outcome, DetectionOutcome::Failed(FailureKind::Error));
        assert_eq!(h.ctx.stats.failures().errors, 1);
        assert!(!h.crop_path.exists());
    }

    #[test]
    fn test_write_error_counts_as_error() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![], 0.5);
        let uc = use_case(&h, 1, true);

        let outcome = uc.process_detection(&mut h.ctx, &frame(), &person(Some(2)));

        assert_eq!(outcome, DetectionOutcome::Failed(FailureKind::Error));
        assert_eq!(*h.probe_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_stride_samples_every_third_frame() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![], 0.5);
        let mut uc = use_case(&h, 3, false);
        let frames = (0..10).map(|i| tracked(i, vec![person(Some(i as u32 + 100))]));

        uc.execute(&mut h.ctx, frames);

        // ordinals 0, 3, 6, 9
        assert_eq!(h.ctx.stats.frames_processed(), 4);
        assert_eq!(*h.probe_calls.lock().unwrap(), 4);
    }

    #[test]
    fn test_video_processing_time_is_measured() {
        let mut h = harness(&[("alice", vec![1.0, 0.0])], vec![Ok(vec![1.0, 0.0])], 0.5);
        let mut uc = use_case(&h, 1, false);
        let frames = (0..3).map(|i| tracked(i, vec![person(Some(1))]));

        uc.execute(&mut h.ctx, frames);
        let report = h.ctx.finish();

        assert!(report.video_processing_time > 0.0);
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.successful_identifications, 1);
        assert!(report.best_match_times.contains_key("alice"));
    }
}
