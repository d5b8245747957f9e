//! # Tracker
//!
//! ByteTrack-style multi-object tracker giving detections stable integer
//! identities across frames.
//!
//! Responsibilities:
//! - Constant-velocity Kalman filter over (cx, cy, aspect, height)
//! - IOU cost matrices, score fusion and thresholded linear assignment
//! - Track lifecycle: Tentative -> Tracked <-> Lost -> Removed
//! - Duplicate suppression between tracked and lost pools
//!
//! ## Usage
//!
//! ```ignore
//! use tracker::{ByteTracker, Detection};
//! use contracts::TrackerConfig;
//!
//! let mut tracker = ByteTracker::new("person", TrackerConfig::default(), 24.0);
//! let output = tracker.update(1, &[Detection::new([10.0, 10.0, 50.0, 90.0], 0.9)]);
//! for obj in &output.tracked {
//!     println!("track {} <- detection {:?}", obj.track_id, obj.detection_index);
//! }
//! ```

mod byte_tracker;
mod kalman;
mod matching;
mod multi_class;
mod track;

pub use byte_tracker::{ByteTracker, Detection, TrackedObject, TrackerOutput};
pub use kalman::{tlbr_to_xyah, xyah_to_tlbr, KalmanFilter};
pub use matching::{deduplicate, fuse_score, iou, iou_distance, linear_assignment, Assignment};
pub use multi_class::MultiClassTracker;
pub use track::TrackState;

pub use contracts::TrackerConfig;
