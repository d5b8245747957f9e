//! LaunchConfig - Config Loader output
//!
//! Everything a run needs besides the query itself: frame source, detector,
//! tracker thresholds and output routing. Passed explicitly, never global.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Frame source
    pub video: VideoConfig,

    /// Detector plugin selection
    pub detector: DetectorConfig,

    /// Tracker thresholds
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Output routing
    #[serde(default)]
    pub output: OutputConfig,
}

/// Frame source selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum VideoConfig {
    /// Directory of image files, read in lexical order
    ImageDir {
        path: PathBuf,
        fps: f64,
    },
    /// Metadata-only source without pixels
    Blank {
        fps: f64,
        frame_width: u32,
        frame_height: u32,
        n_frames: u64,
    },
}

impl VideoConfig {
    pub fn fps(&self) -> f64 {
        match self {
            VideoConfig::ImageDir { fps, .. } | VideoConfig::Blank { fps, .. } => *fps,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            VideoConfig::ImageDir { .. } => "image_dir",
            VideoConfig::Blank { .. } => "blank",
        }
    }
}

/// Detector plugin selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Registered detector name (e.g., "precomputed")
    pub name: String,

    /// Model or detection file, detector specific
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Class-name table; `class_id` indexes into it
    #[serde(default)]
    pub class_names: Vec<String>,
}

/// ByteTrack thresholds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections above this score are "high"
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub track_thresh: f32,

    /// Max fused cost for the first association pass
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub match_thresh: f32,

    /// Min score to seed a new track
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub det_thresh: f32,

    /// Detections at or below this score are dropped
    #[validate(range(min = 0.0, max = 1.0))]
    pub low_score_floor: f32,

    /// Max IOU distance for the low-score pass
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub low_match_thresh: f32,

    /// Max fused cost when confirming tentative tracks
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub unconfirmed_match_thresh: f32,

    /// Tracks closer than this IOU distance are duplicates
    #[validate(range(exclusive_min = 0.0, max = 1.0))]
    pub dedup_iou_distance: f32,

    /// Frames a lost track survives; defaults to round(fps)
    pub max_time_lost: Option<u32>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.6,
            match_thresh: 0.9,
            det_thresh: 0.7,
            low_score_floor: 0.1,
            low_match_thresh: 0.5,
            unconfirmed_match_thresh: 0.7,
            dedup_iou_distance: 0.15,
            max_time_lost: None,
        }
    }
}

impl TrackerConfig {
    /// Lost-track tolerance for a video at `fps`
    pub fn max_time_lost_for(&self, fps: f64) -> u32 {
        self.max_time_lost
            .unwrap_or_else(|| fps.round().max(1.0) as u32)
    }
}

/// Which frames produce an output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Only frames with at least one passing object
    #[default]
    MatchesOnly,
    /// Every frame, possibly with an empty object list
    AllFrames,
}

/// Output routing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: OutputMode,

    /// JSON-lines destination; stdout summary only when unset
    pub save_path: Option<PathBuf>,

    /// Add the per-frame passing object count as `vobj_num`
    pub frame_vobj_num: bool,

    /// Add the cumulative distinct track count as `total_vobj_num`
    pub total_vobj_num: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_defaults() {
        let cfg = TrackerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_time_lost_for(24.0), 24);
        assert_eq!(cfg.max_time_lost_for(29.97), 30);

        let cfg = TrackerConfig {
            max_time_lost: Some(5),
            ..TrackerConfig::default()
        };
        assert_eq!(cfg.max_time_lost_for(24.0), 5);
    }

    #[test]
    fn test_tracker_range_validation() {
        let cfg = TrackerConfig {
            match_thresh: 1.5,
            ..TrackerConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.field_errors().contains_key("match_thresh"));
    }

    #[test]
    fn test_deserialize_tagged_video() {
        let content = r#"
[video]
source = "blank"
fps = 24.0
frame_width = 640
frame_height = 480
n_frames = 10

[detector]
name = "precomputed"
path = "dets.json"
class_names = ["person"]

[output]
mode = "all_frames"
"#;
        let cfg: LaunchConfig = toml::from_str(content).unwrap();
        assert_eq!(cfg.video.kind(), "blank");
        assert_eq!(cfg.video.fps(), 24.0);
        assert_eq!(cfg.output.mode, OutputMode::AllFrames);
        assert_eq!(cfg.tracker.det_thresh, 0.7);
    }
}
