/// Simplified ByteTrack multi-object tracker.
///
/// Two-stage association strategy: high-confidence detections are matched
/// first, then low-confidence detections fill remaining unmatched tracks.
/// Tracks only ever associate with detections of their own class, so a
/// person track is never handed to an overlapping chair.
use std::collections::HashSet;

use super::math::bbox_iou;

#[derive(Clone, Debug)]
pub struct TrackerInput {
    pub bbox: [f64; 4],
    pub score: f64,
    pub class_id: u32,
}

#[derive(Clone, Debug)]
pub struct Track {
    pub id: u32,
    pub bbox: [f64; 4],
    pub class_id: u32,
    /// Index into the input slice of the detection this track matched.
    pub det_index: usize,
}

const HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: [f64; 4],
    class_id: u32,
    frames_lost: usize,
    det_index: Option<usize>,
}

pub struct ByteTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Associates this frame's detections with existing tracks and returns
    /// the tracks matched on this frame. Lost tracks are kept internally for
    /// up to `max_lost` frames but are not reported.
    pub fn update(&mut self, detections: &[TrackerInput]) -> Vec<Track> {
        let (high, low): (Vec<usize>, Vec<usize>) =
            (0..detections.len()).partition(|&i| detections[i].score >= HIGH_THRESH);

        for track in &mut self.tracks {
            track.det_index = None;
        }
        let num_existing = self.tracks.len();

        let matched_high = self.associate(&high, detections);
        self.associate(&low, detections);

        for &di in &high {
            if !matched_high.contains(&di) {
                self.tracks.push(TrackState {
                    id: self.next_id,
                    bbox: detections[di].bbox,
                    class_id: detections[di].class_id,
                    frames_lost: 0,
                    det_index: Some(di),
                });
                self.next_id += 1;
            }
        }

        for track in self.tracks.iter_mut().take(num_existing) {
            if track.det_index.is_none() {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        self.tracks
            .iter()
            .filter_map(|t| {
                t.det_index.map(|det_index| Track {
                    id: t.id,
                    bbox: t.bbox,
                    class_id: t.class_id,
                    det_index,
                })
            })
            .collect()
    }

    /// Greedy IoU matching of still-unmatched tracks against `candidates`.
    /// Pairs are taken in descending IoU; each track/detection used once.
    fn associate(&mut self, candidates: &[usize], detections: &[TrackerInput]) -> HashSet<usize> {
        let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
        for (ti, track) in self.tracks.iter().enumerate() {
            if track.det_index.is_some() {
                continue;
            }
            for &di in candidates {
                let det = &detections[di];
                if det.class_id != track.class_id {
                    continue;
                }
                let score = bbox_iou(&track.bbox, &det.bbox);
                if score >= MATCH_THRESH {
                    pairs.push((ti, di, score));
                }
            }
        }
        pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        let mut used_tracks = HashSet::new();
        let mut used_dets = HashSet::new();
        for (ti, di, _) in pairs {
            if used_tracks.contains(&ti) || used_dets.contains(&di) {
                continue;
            }
            used_tracks.insert(ti);
            used_dets.insert(di);
            let track = &mut self.tracks[ti];
            track.bbox = detections[di].bbox;
            track.frames_lost = 0;
            track.det_index = Some(di);
        }
        used_dets
    }
}
