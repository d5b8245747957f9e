//! Tracking stage

use std::collections::HashMap;

use contracts::{Frame, TrackerConfig};
use tracing::{instrument, trace};
use tracker::{Detection, MultiClassTracker};

use crate::{BoxedOperator, ExecError, Operator};

/// Assigns `track_id` to the detections of each tracked class.
///
/// The tracker is updated on every frame, including frames without
/// detections, so lost-track ages advance. Every track matched or born this
/// frame writes its id, tentative ones included. Ids of tracks currently lost
/// are published on `Frame::lost_tracks`.
pub struct TrackerOperator {
    prev: BoxedOperator,
    trackers: MultiClassTracker,
}

impl TrackerOperator {
    pub fn new<I, S>(prev: BoxedOperator, class_names: I, config: &TrackerConfig, fps: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prev,
            trackers: MultiClassTracker::new(class_names, config, fps),
        }
    }

    pub fn trackers(&self) -> &MultiClassTracker {
        &self.trackers
    }
}

impl Operator for TrackerOperator {
    fn name(&self) -> &str {
        "tracker"
    }

    fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    #[instrument(level = "trace", name = "tracker_next", skip(self))]
    fn next(&mut self) -> Result<Frame, ExecError> {
        let mut frame = self.prev.next()?;

        let detections: HashMap<String, Vec<Detection>> = self
            .trackers
            .classes()
            .map(|class_name| {
                let dets = frame
                    .vobj_data
                    .get(class_name)
                    .map(|records| {
                        records
                            .iter()
                            .map(|r| match (r.tlbr(), r.score()) {
                                (Some(b), Some(s)) => Detection::new(
                                    [b[0] as f32, b[1] as f32, b[2] as f32, b[3] as f32],
                                    s as f32,
                                ),
                                // Dropped by the tracker as malformed
                                _ => Detection::new([f32::NAN; 4], 0.0),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                (class_name.to_string(), dets)
            })
            .collect();

        let outputs = self.trackers.update(frame.id, &detections);

        for (class_name, output) in outputs {
            if let Some(records) = frame.vobj_data.get_mut(&class_name) {
                for obj in &output.tracked {
                    if let Some(record) = obj.detection_index.and_then(|i| records.get_mut(i)) {
                        record.set_track_id(obj.track_id);
                    }
                }
            }
            trace!(
                class = %class_name,
                tracked = output.tracked.len(),
                lost = output.lost.len(),
                removed = output.removed.len(),
                "tracker updated"
            );
            observability::record_track_pools(&class_name, output.tracked.len(), output.lost.len());
            frame.lost_tracks.insert(
                class_name,
                output.lost.iter().map(|obj| obj.track_id).collect(),
            );
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ObjectRecord, RawFrame, VideoMetadata};

    /// Replays scripted frames
    struct Scripted {
        frames: Vec<Vec<[f64; 4]>>,
        next: usize,
    }

    impl Operator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn has_next(&self) -> bool {
            self.next < self.frames.len()
        }

        fn next(&mut self) -> Result<Frame, ExecError> {
            let boxes = self.frames.get(self.next).ok_or(ExecError::Exhausted)?;
            self.next += 1;
            let mut frame = Frame::new(
                RawFrame {
                    frame_id: self.next as u64,
                    image: None,
                },
                VideoMetadata {
                    fps: 10.0,
                    frame_width: 640,
                    frame_height: 480,
                    n_frames: self.frames.len() as u64,
                },
            );
            let records = boxes
                .iter()
                .map(|b| {
                    let mut r = ObjectRecord::new();
                    r.insert("tlbr", contracts::Value::BBox(*b));
                    r.insert("score", contracts::Value::Float(0.9));
                    r
                })
                .collect();
            frame.vobj_data.insert("person".into(), records);
            Ok(frame)
        }
    }

    #[test]
    fn test_ids_written_and_lost_published() {
        let a = [10.0, 10.0, 50.0, 110.0];
        let b = [300.0, 50.0, 340.0, 150.0];
        let script = Scripted {
            frames: vec![vec![a, b], vec![a, b], vec![a]],
            next: 0,
        };
        let mut op = TrackerOperator::new(Box::new(script), ["person"], &TrackerConfig::default(), 10.0);

        let frame = op.next().unwrap();
        let ids: Vec<_> = frame.vobj_data["person"].iter().map(|r| r.track_id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);

        let frame = op.next().unwrap();
        let ids: Vec<_> = frame.vobj_data["person"].iter().map(|r| r.track_id()).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
        assert!(frame.lost_tracks["person"].is_empty());

        let frame = op.next().unwrap();
        assert_eq!(frame.vobj_data["person"][0].track_id(), Some(1));
        assert_eq!(frame.lost_tracks["person"], vec![2]);
    }

    #[test]
    fn test_new_track_gets_id_on_birth() {
        let a = [10.0, 10.0, 50.0, 110.0];
        let late = [300.0, 50.0, 340.0, 150.0];
        let script = Scripted {
            frames: vec![vec![a], vec![a, late], vec![a, late]],
            next: 0,
        };
        let mut op = TrackerOperator::new(Box::new(script), ["person"], &TrackerConfig::default(), 10.0);

        op.next().unwrap();
        // Born after the first update: still tentative, but already named
        let frame = op.next().unwrap();
        assert_eq!(frame.vobj_data["person"][1].track_id(), Some(2));
        assert_eq!(
            op.trackers().get("person").map(|t| t.tracked_count()),
            Some(2)
        );

        let frame = op.next().unwrap();
        assert_eq!(frame.vobj_data["person"][1].track_id(), Some(2));
    }
}
