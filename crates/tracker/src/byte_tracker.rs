//! ByteTrack association and track pool management.

use std::fmt;

use contracts::{FrameId, TrackId, TrackerConfig};
use slab::Slab;
use tracing::instrument;

use crate::kalman::KalmanFilter;
use crate::matching::{deduplicate, fuse_score, iou_distance, linear_assignment};
use crate::track::{STrack, TrackState};

/// Tracker input: one detection of the tracked class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// (x1, y1, x2, y2)
    pub tlbr: [f32; 4],
    pub score: f32,
}

impl Detection {
    pub fn new(tlbr: [f32; 4], score: f32) -> Self {
        Self { tlbr, score }
    }

    /// Finite coordinates and score, positive width and height
    fn is_well_formed(&self) -> bool {
        self.tlbr.iter().all(|v| v.is_finite())
            && self.score.is_finite()
            && self.tlbr[2] > self.tlbr[0]
            && self.tlbr[3] > self.tlbr[1]
    }
}

/// One track reported after an update
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub track_id: TrackId,
    pub state: TrackState,
    /// Kalman box estimate
    pub tlbr: [f32; 4],
    pub score: f32,
    /// Index into this frame's detections; `None` for lost tracks
    pub detection_index: Option<usize>,
}

/// Result of [`ByteTracker::update`]
#[derive(Debug, Clone, Default)]
pub struct TrackerOutput {
    /// Tracks matched or born this frame (confirmed and tentative)
    pub tracked: Vec<TrackedObject>,
    /// Tracks currently lost but still re-identifiable
    pub lost: Vec<TrackedObject>,
    /// Tracks removed during this update
    pub removed: Vec<TrackId>,
    /// Detections dropped as malformed
    pub dropped: usize,
}

/// ByteTrack multi-object tracker for one object class
///
/// Track storage uses index separation: live tracks live in a `Slab`, the
/// tracked and lost pools only hold slab keys.
pub struct ByteTracker {
    class_name: String,
    config: TrackerConfig,
    max_time_lost: u64,
    kalman: KalmanFilter,
    tracks: Slab<STrack>,
    tracked: Vec<usize>,
    lost: Vec<usize>,
    frame_count: u64,
    next_id: TrackId,
}

impl fmt::Debug for ByteTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteTracker")
            .field("class_name", &self.class_name)
            .field("tracked", &self.tracked.len())
            .field("lost", &self.lost.len())
            .field("frame_count", &self.frame_count)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl ByteTracker {
    /// Create a tracker; `fps` sets the lost-track tolerance unless overridden
    pub fn new(class_name: impl Into<String>, config: TrackerConfig, fps: f64) -> Self {
        let max_time_lost = u64::from(config.max_time_lost_for(fps));
        Self {
            class_name: class_name.into(),
            config,
            max_time_lost,
            kalman: KalmanFilter::new(),
            tracks: Slab::new(),
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_count: 0,
            next_id: 1,
        }
    }

    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[inline]
    pub fn max_time_lost(&self) -> u64 {
        self.max_time_lost
    }

    /// Tracks in the tracked pool (confirmed and tentative)
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    pub fn lost_count(&self) -> usize {
        self.lost.len()
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn boxes(&self, keys: &[usize]) -> Vec<[f32; 4]> {
        keys.iter().map(|&k| self.tracks[k].tlbr()).collect()
    }

    /// Process one frame of detections.
    ///
    /// Must be called for every frame, including frames without detections,
    /// so lost-track ages advance.
    #[instrument(
        level = "trace",
        name = "byte_tracker_update",
        skip(self, detections),
        fields(class = %self.class_name, detections = detections.len())
    )]
    pub fn update(&mut self, frame_id: FrameId, detections: &[Detection]) -> TrackerOutput {
        self.frame_count += 1;
        let first_frame = self.frame_count == 1;
        let cfg = self.config.clone();

        // ===== Split detections by confidence =====
        let mut high = Vec::new();
        let mut low = Vec::new();
        let mut dropped = 0;
        for (i, det) in detections.iter().enumerate() {
            if !det.is_well_formed() {
                dropped += 1;
                continue;
            }
            if det.score > cfg.track_thresh {
                high.push(i);
            } else if det.score > cfg.low_score_floor {
                low.push(i);
            }
        }
        if dropped > 0 {
            tracing::debug!(frame_id, dropped, "dropped malformed detections");
        }
        let det_boxes = |idx: &[usize]| -> Vec<[f32; 4]> {
            idx.iter().map(|&i| detections[i].tlbr).collect()
        };
        let det_scores = |idx: &[usize]| -> Vec<f32> {
            idx.iter().map(|&i| detections[i].score).collect()
        };

        for &k in self.tracked.iter().chain(self.lost.iter()) {
            self.tracks[k].detection_index = None;
        }

        let (unconfirmed, confirmed): (Vec<usize>, Vec<usize>) = self
            .tracked
            .iter()
            .partition(|&&k| !self.tracks[k].is_activated);

        let mut pool = confirmed;
        pool.extend(self.lost.iter().copied());
        for &k in &pool {
            self.tracks[k].predict(&self.kalman);
        }

        let mut activated: Vec<usize> = Vec::new();
        let mut newly_lost: Vec<usize> = Vec::new();
        let mut removed: Vec<TrackId> = Vec::new();

        // ===== Pass 1: high-score detections, fused cost =====
        let mut cost = iou_distance(&self.boxes(&pool), &det_boxes(&high));
        fuse_score(&mut cost, &det_scores(&high));
        let first = linear_assignment(&cost, cfg.match_thresh);
        for &(ti, di) in &first.matches {
            let (k, d) = (pool[ti], high[di]);
            let det = &detections[d];
            if self.tracks[k].state == TrackState::Lost {
                tracing::trace!(track_id = self.tracks[k].track_id, frame_id, "track reacquired");
            }
            self.tracks[k].update(&self.kalman, &det.tlbr, det.score, frame_id, d);
            activated.push(k);
        }

        // ===== Pass 2: low-score detections against still-tracked leftovers =====
        let remaining: Vec<usize> = first
            .unmatched_rows
            .iter()
            .map(|&i| pool[i])
            .filter(|&k| self.tracks[k].state == TrackState::Tracked)
            .collect();
        let cost = iou_distance(&self.boxes(&remaining), &det_boxes(&low));
        let second = linear_assignment(&cost, cfg.low_match_thresh);
        for &(ti, di) in &second.matches {
            let (k, d) = (remaining[ti], low[di]);
            let det = &detections[d];
            self.tracks[k].update(&self.kalman, &det.tlbr, det.score, frame_id, d);
            activated.push(k);
        }
        for &ti in &second.unmatched_rows {
            let k = remaining[ti];
            self.tracks[k].mark_lost();
            newly_lost.push(k);
        }

        // ===== Pass 3: tentative tracks against leftover high detections =====
        let high_left: Vec<usize> = first.unmatched_cols.iter().map(|&j| high[j]).collect();
        let mut cost = iou_distance(&self.boxes(&unconfirmed), &det_boxes(&high_left));
        fuse_score(&mut cost, &det_scores(&high_left));
        let third = linear_assignment(&cost, cfg.unconfirmed_match_thresh);
        for &(ti, di) in &third.matches {
            let (k, d) = (unconfirmed[ti], high_left[di]);
            let det = &detections[d];
            self.tracks[k].update(&self.kalman, &det.tlbr, det.score, frame_id, d);
            activated.push(k);
        }
        for &ti in &third.unmatched_rows {
            let k = unconfirmed[ti];
            removed.push(self.remove_track(k));
        }

        // ===== Seed new tracks =====
        for &di in &third.unmatched_cols {
            let d = high_left[di];
            let det = &detections[d];
            if det.score <= cfg.det_thresh {
                continue;
            }
            let id = self.next_track_id();
            let track = STrack::activate(
                &self.kalman,
                &det.tlbr,
                det.score,
                id,
                frame_id,
                first_frame,
                d,
            );
            activated.push(self.tracks.insert(track));
            metrics::counter!("vidquery_tracks_created_total", "class" => self.class_name.clone())
                .increment(1);
        }

        // ===== Expire lost tracks =====
        let mut lost: Vec<usize> = self
            .lost
            .iter()
            .copied()
            .filter(|&k| self.tracks[k].state == TrackState::Lost)
            .collect();
        lost.extend(newly_lost);
        let mut kept_lost = Vec::with_capacity(lost.len());
        for k in lost {
            if frame_id.saturating_sub(self.tracks[k].end_frame()) >= self.max_time_lost {
                removed.push(self.remove_track(k));
            } else {
                kept_lost.push(k);
            }
        }

        // ===== Deduplicate tracked vs lost =====
        let (tracked, lost) = self.remove_duplicates(activated, kept_lost, &mut removed);
        self.tracked = tracked;
        self.lost = lost;

        self.tracked
            .sort_by_key(|&k| self.tracks[k].track_id);
        self.lost.sort_by_key(|&k| self.tracks[k].track_id);

        TrackerOutput {
            tracked: self.report(&self.tracked),
            lost: self.report(&self.lost),
            removed,
            dropped,
        }
    }

    fn remove_track(&mut self, key: usize) -> TrackId {
        let mut track = self.tracks.remove(key);
        track.state = TrackState::Removed;
        tracing::trace!(
            class = %self.class_name,
            track_id = track.track_id,
            end_frame = track.end_frame(),
            "track removed"
        );
        track.track_id
    }

    fn remove_duplicates(
        &mut self,
        tracked: Vec<usize>,
        lost: Vec<usize>,
        removed: &mut Vec<TrackId>,
    ) -> (Vec<usize>, Vec<usize>) {
        let describe = |keys: &[usize]| -> Vec<([f32; 4], u64)> {
            keys.iter()
                .map(|&k| (self.tracks[k].tlbr(), self.tracks[k].lifetime()))
                .collect()
        };
        let (keep_tracked, keep_lost) = deduplicate(
            &describe(&tracked),
            &describe(&lost),
            self.config.dedup_iou_distance,
        );

        let mut out_tracked = Vec::with_capacity(tracked.len());
        for (k, keep) in tracked.into_iter().zip(keep_tracked) {
            if keep {
                out_tracked.push(k);
            } else {
                removed.push(self.remove_track(k));
            }
        }
        let mut out_lost = Vec::with_capacity(lost.len());
        for (k, keep) in lost.into_iter().zip(keep_lost) {
            if keep {
                out_lost.push(k);
            } else {
                removed.push(self.remove_track(k));
            }
        }
        (out_tracked, out_lost)
    }

    fn report(&self, keys: &[usize]) -> Vec<TrackedObject> {
        keys.iter()
            .map(|&k| {
                let t = &self.tracks[k];
                TrackedObject {
                    track_id: t.track_id,
                    state: t.state,
                    tlbr: t.tlbr(),
                    score: t.score,
                    detection_index: t.detection_index,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(fps: f64) -> ByteTracker {
        ByteTracker::new("person", TrackerConfig::default(), fps)
    }

    fn det(x: f32, score: f32) -> Detection {
        Detection::new([x, 100.0, x + 40.0, 200.0], score)
    }

    #[test]
    fn test_first_frame_tracks_are_confirmed() {
        let mut t = tracker(24.0);
        let out = t.update(1, &[det(10.0, 0.9), det(300.0, 0.95)]);
        assert_eq!(out.tracked.len(), 2);
        assert!(out.tracked.iter().all(|o| o.state == TrackState::Tracked));
        assert_eq!(out.tracked[0].track_id, 1);
        assert_eq!(out.tracked[1].track_id, 2);
    }

    #[test]
    fn test_id_stable_across_consecutive_frames() {
        let mut t = tracker(24.0);
        let out1 = t.update(1, &[det(10.0, 0.9)]);
        let out2 = t.update(2, &[det(11.0, 0.9)]);
        assert_eq!(out1.tracked[0].track_id, out2.tracked[0].track_id);
        assert_eq!(out2.tracked[0].detection_index, Some(0));
    }

    #[test]
    fn test_tentative_track_confirmed_on_next_match() {
        let mut t = tracker(24.0);
        t.update(1, &[]);
        let out = t.update(2, &[det(10.0, 0.9)]);
        assert_eq!(out.tracked.len(), 1);
        assert_eq!(out.tracked[0].state, TrackState::New);
        let id = out.tracked[0].track_id;

        let out = t.update(3, &[det(10.5, 0.9)]);
        assert_eq!(out.tracked[0].state, TrackState::Tracked);
        assert_eq!(out.tracked[0].track_id, id);
    }

    #[test]
    fn test_tentative_track_removed_when_unmatched() {
        let mut t = tracker(24.0);
        t.update(1, &[]);
        let out = t.update(2, &[det(10.0, 0.9)]);
        let id = out.tracked[0].track_id;
        let out = t.update(3, &[]);
        assert!(out.tracked.is_empty());
        assert!(out.lost.is_empty());
        assert_eq!(out.removed, vec![id]);
    }

    #[test]
    fn test_low_score_detection_keeps_track_alive() {
        let mut t = tracker(24.0);
        let id = t.update(1, &[det(10.0, 0.9)]).tracked[0].track_id;
        let out = t.update(2, &[det(10.0, 0.4)]);
        assert_eq!(out.tracked.len(), 1);
        assert_eq!(out.tracked[0].track_id, id);
        assert!(out.lost.is_empty());
    }

    #[test]
    fn test_detection_below_det_thresh_does_not_seed() {
        let mut t = tracker(24.0);
        // High (> 0.6) but not above det_thresh (0.7)
        let out = t.update(1, &[det(10.0, 0.65)]);
        assert!(out.tracked.is_empty());
    }

    #[test]
    fn test_malformed_detections_dropped() {
        let mut t = tracker(24.0);
        let out = t.update(
            1,
            &[
                Detection::new([f32::NAN, 0.0, 10.0, 10.0], 0.9),
                Detection::new([0.0, 0.0, 10.0, 10.0], f32::INFINITY),
                Detection::new([10.0, 10.0, 5.0, 20.0], 0.9),
                det(10.0, 0.9),
            ],
        );
        assert_eq!(out.dropped, 3);
        assert_eq!(out.tracked.len(), 1);
        assert_eq!(out.tracked[0].detection_index, Some(3));
    }

    #[test]
    fn test_lost_track_reactivated_within_tolerance() {
        let mut t = tracker(24.0);
        let id = t.update(1, &[det(10.0, 0.9)]).tracked[0].track_id;
        for f in 2..=5 {
            let out = t.update(f, &[]);
            assert_eq!(out.lost.len(), 1);
            assert_eq!(out.lost[0].detection_index, None);
        }
        let out = t.update(6, &[det(10.0, 0.9)]);
        assert_eq!(out.tracked[0].track_id, id);
        assert!(out.lost.is_empty());
    }

    #[test]
    fn test_lost_track_removed_after_max_time_lost() {
        let mut t = tracker(24.0);
        assert_eq!(t.max_time_lost(), 24);

        let mut first_id = None;
        for f in 1..=10 {
            let out = t.update(f, &[det(10.0, 0.9)]);
            first_id.get_or_insert(out.tracked[0].track_id);
        }
        let first_id = first_id.unwrap();

        let mut removed_at = None;
        for f in 11..=34 {
            let out = t.update(f, &[]);
            if out.removed.contains(&first_id) {
                removed_at = Some(f);
            }
        }
        assert_eq!(removed_at, Some(34));
        assert_eq!(t.lost_count(), 0);

        let out = t.update(35, &[det(10.0, 0.9)]);
        assert_eq!(out.tracked.len(), 1);
        assert_ne!(out.tracked[0].track_id, first_id);
    }
}
