//! Detector replaying detections stored on disk

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use contracts::{ContractError, Detector, FrameId, RawDetection};
use image::RgbImage;
use tracing::debug;

/// Registry name of [`PrecomputedDetector`]
pub const PRECOMPUTED_DETECTOR: &str = "precomputed";

/// Replays per-frame detections from JSON:
///
/// ```json
/// { "1": [ {"tlbr": [10, 20, 50, 120], "score": 0.92, "class_id": 0} ], "2": [] }
/// ```
///
/// Frames missing from the file have no detections.
#[derive(Debug, Clone)]
pub struct PrecomputedDetector {
    class_names: Vec<String>,
    detections: HashMap<FrameId, Vec<RawDetection>>,
}

impl PrecomputedDetector {
    pub fn new(class_names: Vec<String>, detections: HashMap<FrameId, Vec<RawDetection>>) -> Self {
        Self {
            class_names,
            detections,
        }
    }

    /// Load detections from a JSON file
    pub fn from_path(path: impl AsRef<Path>, class_names: Vec<String>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let detector = Self::from_json(&content, class_names)?;
        debug!(
            path = %path.display(),
            frames = detector.detections.len(),
            "precomputed detections loaded"
        );
        Ok(detector)
    }

    /// Parse detections from a JSON string
    pub fn from_json(content: &str, class_names: Vec<String>) -> Result<Self, ContractError> {
        let raw: HashMap<String, Vec<RawDetection>> =
            serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
                message: format!("invalid detection file: {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut detections = HashMap::with_capacity(raw.len());
        for (key, dets) in raw {
            let frame_id: FrameId = key.trim().parse().map_err(|_| {
                ContractError::config_parse(format!("invalid frame id '{key}' in detection file"))
            })?;
            if let Some(bad) = dets.iter().find(|d| d.class_id as usize >= class_names.len()) {
                return Err(ContractError::config_parse(format!(
                    "frame {frame_id}: class_id {} outside class table of {} names",
                    bad.class_id,
                    class_names.len()
                )));
            }
            detections.insert(frame_id, dets);
        }
        Ok(Self::new(class_names, detections))
    }

    /// Frames with at least one stored detection list
    pub fn frame_count(&self) -> usize {
        self.detections.len()
    }
}

impl Detector for PrecomputedDetector {
    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn inference(
        &mut self,
        frame_id: FrameId,
        _image: Option<&RgbImage>,
    ) -> Result<Vec<RawDetection>, ContractError> {
        Ok(self.detections.get(&frame_id).cloned().unwrap_or_default())
    }
}
