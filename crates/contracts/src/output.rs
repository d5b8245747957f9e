//! Per-frame output record

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::FrameId;

/// Requested fields of one reported object
pub type ObjectOutput = serde_json::Map<String, serde_json::Value>;

/// One output record, serialized as
/// `{"frame_id": 12, "<vobj_name>": [{"<field>": ...}, ...], ...}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameOutput {
    pub frame_id: FrameId,

    /// Reported objects keyed by VObj name
    #[serde(flatten)]
    pub objects: BTreeMap<String, Vec<ObjectOutput>>,

    /// Objects passing in this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vobj_num: Option<usize>,

    /// Distinct track ids reported so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_vobj_num: Option<usize>,
}

impl FrameOutput {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            ..Self::default()
        }
    }

    /// Number of reported objects over all VObj names
    pub fn object_count(&self) -> usize {
        self.objects.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }

    /// Track ids of reported objects that carry one
    pub fn track_ids(&self) -> impl Iterator<Item = (&str, u64)> {
        self.objects.iter().flat_map(|(name, objects)| {
            objects.iter().filter_map(move |o| {
                o.get(crate::FIELD_TRACK_ID)
                    .and_then(serde_json::Value::as_u64)
                    .map(|id| (name.as_str(), id))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_layout() {
        let mut out = FrameOutput::new(7);
        let mut obj = ObjectOutput::new();
        obj.insert("track_id".into(), json!(3));
        obj.insert("score".into(), json!(0.9));
        out.objects.insert("Person".into(), vec![obj]);

        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(
            value,
            json!({"frame_id": 7, "Person": [{"track_id": 3, "score": 0.9}]})
        );
        assert_eq!(out.object_count(), 1);
        assert_eq!(out.track_ids().collect::<Vec<_>>(), vec![("Person", 3)]);
    }

    #[test]
    fn test_counts_serialized_when_set() {
        let mut out = FrameOutput::new(1);
        out.vobj_num = Some(0);
        let line = serde_json::to_string(&out).unwrap();
        assert_eq!(line, r#"{"frame_id":1,"vobj_num":0}"#);
        assert!(out.is_empty());
    }
}
