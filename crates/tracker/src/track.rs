//! Single track state and lifecycle transitions.

use contracts::{FrameId, TrackId};

use crate::kalman::{tlbr_to_xyah, xyah_to_tlbr, KalmanFilter, StateCovariance, StateMean};

/// Track lifecycle state
///
/// `New` tracks are tentative until confirmed by a second match (or by
/// being born on the first frame of the sequence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Newly created track, not yet confirmed
    #[default]
    New,
    /// Actively tracked object
    Tracked,
    /// Temporarily lost track
    Lost,
    /// Removed from tracking (terminal)
    Removed,
}

/// One track owned by a `ByteTracker`
#[derive(Debug, Clone)]
pub(crate) struct STrack {
    pub track_id: TrackId,
    pub state: TrackState,
    /// Confirmed at least once
    pub is_activated: bool,
    pub score: f32,
    mean: StateMean,
    covariance: StateCovariance,
    /// Last frame this track was matched
    pub frame_id: FrameId,
    pub start_frame: FrameId,
    pub tracklet_len: u32,
    /// Detection matched in the current frame, if any
    pub detection_index: Option<usize>,
}

impl STrack {
    /// Start a new track from a detection
    pub fn activate(
        kf: &KalmanFilter,
        tlbr: &[f32; 4],
        score: f32,
        track_id: TrackId,
        frame_id: FrameId,
        first_frame: bool,
        detection_index: usize,
    ) -> Self {
        let (mean, covariance) = kf.initiate(&tlbr_to_xyah(tlbr));
        Self {
            track_id,
            state: if first_frame {
                TrackState::Tracked
            } else {
                TrackState::New
            },
            is_activated: first_frame,
            score,
            mean,
            covariance,
            frame_id,
            start_frame: frame_id,
            tracklet_len: 0,
            detection_index: Some(detection_index),
        }
    }

    /// Kalman predict; height velocity is frozen for tracks not currently tracked
    pub fn predict(&mut self, kf: &KalmanFilter) {
        let mut mean = self.mean;
        if self.state != TrackState::Tracked {
            mean[7] = 0.0;
        }
        let (mean, covariance) = kf.predict(&mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
    }

    /// Associate a detection (continuing or re-acquiring the track)
    pub fn update(
        &mut self,
        kf: &KalmanFilter,
        tlbr: &[f32; 4],
        score: f32,
        frame_id: FrameId,
        detection_index: usize,
    ) {
        let reacquired = self.state == TrackState::Lost;
        match kf.update(&self.mean, &self.covariance, &tlbr_to_xyah(tlbr)) {
            Some((mean, covariance)) => {
                self.mean = mean;
                self.covariance = covariance;
            }
            None => {
                tracing::debug!(
                    track_id = self.track_id,
                    "innovation covariance not positive definite, re-initiating"
                );
                let (mean, covariance) = kf.initiate(&tlbr_to_xyah(tlbr));
                self.mean = mean;
                self.covariance = covariance;
            }
        }
        self.tracklet_len = if reacquired { 0 } else { self.tracklet_len + 1 };
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.score = score;
        self.frame_id = frame_id;
        self.detection_index = Some(detection_index);
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
        self.detection_index = None;
    }

    /// Current box estimate
    pub fn tlbr(&self) -> [f32; 4] {
        xyah_to_tlbr(&[self.mean[0], self.mean[1], self.mean[2], self.mean[3]])
    }

    /// Frames between first and last match
    #[inline]
    pub fn lifetime(&self) -> u64 {
        self.frame_id.saturating_sub(self.start_frame)
    }

    /// Last frame this track was matched
    #[inline]
    pub fn end_frame(&self) -> FrameId {
        self.frame_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_activation() {
        let kf = KalmanFilter::new();
        let t = STrack::activate(&kf, &[0.0, 0.0, 10.0, 20.0], 0.9, 1, 1, true, 0);
        assert_eq!(t.state, TrackState::Tracked);
        assert!(t.is_activated);

        let t = STrack::activate(&kf, &[0.0, 0.0, 10.0, 20.0], 0.9, 2, 5, false, 0);
        assert_eq!(t.state, TrackState::New);
        assert!(!t.is_activated);
    }

    #[test]
    fn test_update_confirms_and_reacquire_resets_length() {
        let kf = KalmanFilter::new();
        let mut t = STrack::activate(&kf, &[0.0, 0.0, 10.0, 20.0], 0.9, 1, 5, false, 0);
        t.predict(&kf);
        t.update(&kf, &[1.0, 0.0, 11.0, 20.0], 0.8, 6, 0);
        assert_eq!(t.state, TrackState::Tracked);
        assert!(t.is_activated);
        assert_eq!(t.tracklet_len, 1);
        assert_eq!(t.lifetime(), 1);

        t.mark_lost();
        assert_eq!(t.detection_index, None);
        t.predict(&kf);
        t.update(&kf, &[2.0, 0.0, 12.0, 20.0], 0.8, 8, 3);
        assert_eq!(t.tracklet_len, 0);
        assert_eq!(t.end_frame(), 8);
        assert_eq!(t.detection_index, Some(3));
    }
}
