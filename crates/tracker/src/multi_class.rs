//! Per-class tracker map.
//!
//! Track identities are scoped to `(class_name, track_id)`; each class gets
//! its own `ByteTracker` and id counter.

use std::collections::HashMap;

use contracts::{FrameId, TrackerConfig};

use crate::byte_tracker::{ByteTracker, Detection, TrackerOutput};

/// One `ByteTracker` per tracked class
#[derive(Debug)]
pub struct MultiClassTracker {
    trackers: HashMap<String, ByteTracker>,
}

impl MultiClassTracker {
    pub fn new<I, S>(class_names: I, config: &TrackerConfig, fps: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let trackers = class_names
            .into_iter()
            .map(|name| {
                let name = name.into();
                let tracker = ByteTracker::new(name.clone(), config.clone(), fps);
                (name, tracker)
            })
            .collect();
        Self { trackers }
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.trackers.keys().map(String::as_str)
    }

    pub fn get(&self, class_name: &str) -> Option<&ByteTracker> {
        self.trackers.get(class_name)
    }

    /// Update every class tracker; classes absent from `detections` get an empty frame
    pub fn update(
        &mut self,
        frame_id: FrameId,
        detections: &HashMap<String, Vec<Detection>>,
    ) -> HashMap<String, TrackerOutput> {
        self.trackers
            .iter_mut()
            .map(|(name, tracker)| {
                let dets = detections.get(name).map(Vec::as_slice).unwrap_or(&[]);
                (name.clone(), tracker.update(frame_id, dets))
            })
            .collect()
    }
}
