//! Per-frame data model
//!
//! A `Frame` is created once per video tick by the video reader, mutated in
//! place as it travels down the operator chain, and dropped after the output
//! stage has consumed it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::Value;

/// Track identity within one class (query-local)
pub type TrackId = u64;

/// Monotonic frame counter, starting at 1
pub type FrameId = u64;

/// Index of a filter stage; class filters own their index list
pub type FilterIndex = usize;

/// Built-in field: bounding box (x1, y1, x2, y2)
pub const FIELD_TLBR: &str = "tlbr";
/// Built-in field: detection confidence
pub const FIELD_SCORE: &str = "score";
/// Built-in field: detector class id
pub const FIELD_CLASS_ID: &str = "class_id";
/// Built-in field: tracker identity
pub const FIELD_TRACK_ID: &str = "track_id";

/// Fixed video metadata exposed by every source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub n_frames: u64,
}

impl VideoMetadata {
    /// Look up a metadata key by name, as exposed to property functions
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "fps" => Some(Value::Float(self.fps)),
            "frame_width" => Some(Value::from(self.frame_width)),
            "frame_height" => Some(Value::from(self.frame_height)),
            "n_frames" => Some(Value::from(self.n_frames)),
            _ => None,
        }
    }

    /// Names accepted by [`VideoMetadata::get`]
    pub const KEYS: [&'static str; 4] = ["fps", "frame_width", "frame_height", "n_frames"];
}

/// One detection as produced by a detector plugin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// (x1, y1, x2, y2): top-left and bottom-right corners in pixels
    pub tlbr: [f32; 4],
    pub score: f32,
    pub class_id: u32,
}

/// Frame as delivered by a `VideoSource`
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub frame_id: FrameId,
    /// Absent for metadata-only sources
    pub image: Option<Arc<RgbImage>>,
}

/// One detected/tracked object in the current frame
#[derive(Debug, Clone, Default)]
pub struct ObjectRecord {
    fields: HashMap<String, Value>,
}

impl ObjectRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a raw detection
    pub fn from_detection(det: &RawDetection) -> Self {
        let mut record = Self::new();
        record.insert(
            FIELD_TLBR,
            Value::BBox(det.tlbr.map(f64::from)),
        );
        record.insert(FIELD_SCORE, Value::from(det.score));
        record.insert(FIELD_CLASS_ID, Value::from(det.class_id));
        record
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn tlbr(&self) -> Option<[f64; 4]> {
        self.get(FIELD_TLBR).and_then(Value::as_bbox)
    }

    pub fn score(&self) -> Option<f64> {
        self.get(FIELD_SCORE).and_then(Value::as_f64)
    }

    pub fn track_id(&self) -> Option<TrackId> {
        self.get(FIELD_TRACK_ID)
            .and_then(Value::as_i64)
            .and_then(|id| TrackId::try_from(id).ok())
    }

    pub fn set_track_id(&mut self, id: TrackId) {
        self.insert(FIELD_TRACK_ID, Value::from(id));
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A frame travelling through the operator chain
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub image: Option<Arc<RgbImage>>,
    pub metadata: VideoMetadata,
    /// Detected objects grouped by class name
    pub vobj_data: HashMap<String, Vec<ObjectRecord>>,
    /// Per filter index: indices into `vobj_data[class]` that passed
    pub filtered_vobjs: BTreeMap<FilterIndex, HashMap<String, Vec<usize>>>,
    /// Ids of tracks the tracker currently holds as lost, per class
    pub lost_tracks: HashMap<String, Vec<TrackId>>,
}

impl Frame {
    pub fn new(raw: RawFrame, metadata: VideoMetadata) -> Self {
        Self {
            id: raw.frame_id,
            image: raw.image,
            metadata,
            vobj_data: HashMap::new(),
            filtered_vobjs: BTreeMap::new(),
            lost_tracks: HashMap::new(),
        }
    }

    /// Indices of `class_name` objects that passed filter `index`
    pub fn filtered(&self, index: FilterIndex, class_name: &str) -> Option<&[usize]> {
        self.filtered_vobjs
            .get(&index)
            .and_then(|by_class| by_class.get(class_name))
            .map(Vec::as_slice)
    }

    /// Records of `class_name` that passed filter `index`
    pub fn filtered_records(&self, index: FilterIndex, class_name: &str) -> Vec<&ObjectRecord> {
        let (Some(indices), Some(records)) = (
            self.filtered(index, class_name),
            self.vobj_data.get(class_name),
        ) else {
            return Vec::new();
        };
        indices.iter().filter_map(|&i| records.get(i)).collect()
    }

    /// Whether any class has at least one object passing filter `index`
    pub fn has_passing(&self, index: FilterIndex) -> bool {
        self.filtered_vobjs
            .get(&index)
            .is_some_and(|by_class| by_class.values().any(|v| !v.is_empty()))
    }
}
