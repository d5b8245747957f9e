//! Property projection stage
//!
//! A `VObjProjector` computes one derived property for every object listed
//! under its filter index and writes the result back onto the record. It owns
//! the history of the dependencies it reads with a window (including its own
//! past values when self-dependent), so no other stage touches that state.
//! Self-dependent values of lost tracks are carried forward frame by frame
//! until the tracker removes the track.

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    FilterIndex, Frame, FrameId, Input, ObjectRecord, PropertyDescriptor, PropertyInputs, TrackId, Value,
    DEP_FRAME_ID, DEP_IMAGE,
};
use image::imageops;
use planner::ProjectorSpec;
use tracing::{debug, instrument, trace, warn};

use crate::history::HistoryBuffer;
use crate::{BoxedOperator, ExecError, Operator};

/// Computes one derived property per object per frame
pub struct VObjProjector {
    prev: BoxedOperator,
    descriptor: PropertyDescriptor,
    class_name: String,
    filter_index: FilterIndex,
    /// Windowed dependencies as (name, window); column i of `history`
    windowed: Vec<(String, usize)>,
    history: HistoryBuffer,
}

/// Outcome of one object's evaluation, applied after the whole class is done
struct Evaluated {
    index: usize,
    track_id: Option<TrackId>,
    value: Value,
    row: Vec<Value>,
}

impl VObjProjector {
    pub fn from_spec(prev: BoxedOperator, spec: ProjectorSpec) -> Self {
        let windowed: Vec<(String, usize)> = spec
            .descriptor
            .dependencies()
            .iter()
            .filter(|(_, window)| *window > 0)
            .cloned()
            .collect();
        let columns = windowed.iter().map(|(name, _)| name.clone()).collect();
        let capacity = spec.history_len.max(spec.descriptor.max_window());

        Self {
            prev,
            history: HistoryBuffer::new(columns, capacity),
            windowed,
            descriptor: spec.descriptor,
            class_name: spec.class_name,
            filter_index: spec.filter_index,
        }
    }

    pub fn property(&self) -> &str {
        self.descriptor.name()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Current-frame value of `dependency` for `record`; `Invalid` if unavailable
    fn current_value(&self, frame: &Frame, record: &ObjectRecord, dependency: &str) -> Value {
        if let Some(value) = record.get(dependency) {
            return value.clone();
        }
        match dependency {
            DEP_IMAGE => crop(frame, record),
            DEP_FRAME_ID => Value::from(frame.id),
            _ => frame.metadata.get(dependency).unwrap_or(Value::Invalid),
        }
    }

    fn evaluate(
        &self,
        frame: &Frame,
        snapshot: &[ObjectRecord],
        index: usize,
        record: &ObjectRecord,
    ) -> Evaluated {
        let name = self.descriptor.name();
        let default = self.descriptor.default_value();
        let track_id = record.track_id();

        let mut inputs = PropertyInputs::new(snapshot);
        let mut valid = true;
        let mut held: Option<Value> = None;
        let mut row = Vec::with_capacity(self.windowed.len());

        for (dependency, window) in self.descriptor.dependencies() {
            let own = dependency == name;
            let current = if own {
                default.clone()
            } else {
                self.current_value(frame, record, dependency)
            };

            if *window == 0 {
                valid &= !current.is_invalid();
                inputs.insert(dependency.as_str(), Input::Current(current));
                continue;
            }

            let column = self
                .windowed
                .iter()
                .position(|(n, _)| n == dependency)
                .unwrap_or(0);
            let past = track_id.and_then(|id| self.history.window(id, frame.id, column, *window));

            if own {
                // Missing or invalid own history reads as the default
                let mut values: Vec<Value> = match past {
                    Some(values) => values
                        .into_iter()
                        .map(|v| if v.is_invalid() { default.clone() } else { v })
                        .collect(),
                    None => vec![default.clone(); *window],
                };
                held = values.last().cloned();
                values.push(current);
                inputs.insert(dependency.as_str(), Input::Window(values));
                // Placeholder, replaced by the result below
                row.push(Value::Invalid);
                continue;
            }

            match past {
                Some(mut values) if values.iter().all(|v| !v.is_invalid()) => {
                    valid &= !current.is_invalid();
                    row.push(current.clone());
                    values.push(current);
                    inputs.insert(dependency.as_str(), Input::Window(values));
                }
                _ => {
                    trace!(dependency = %dependency, window, "insufficient history");
                    valid = false;
                    row.push(current);
                }
            }
        }

        let value = if valid {
            self.descriptor.call(&inputs)
        } else if self.descriptor.is_self_dependent() {
            // Cannot advance this frame: hold the previous value
            held.unwrap_or_else(|| default.clone())
        } else {
            Value::Invalid
        };

        if let Some(slot) = self
            .windowed
            .iter()
            .position(|(n, _)| n == name)
            .and_then(|i| row.get_mut(i))
        {
            *slot = value.clone();
        }

        Evaluated {
            index,
            track_id,
            value,
            row,
        }
    }
}

impl VObjProjector {
    /// Advance the own value of a lost track by one frame without evaluating it.
    ///
    /// Other columns get `Invalid`, so windows over detection data still
    /// report the gap.
    fn carry_forward(&mut self, track_id: TrackId, frame_id: FrameId, own: usize) {
        let carried = match self.history.latest(track_id) {
            Some((last, row)) if last < frame_id => row.get(own).cloned(),
            _ => None,
        };
        let Some(carried) = carried else {
            return;
        };
        let mut row = vec![Value::Invalid; self.windowed.len()];
        if let Some(slot) = row.get_mut(own) {
            *slot = carried;
        }
        self.history.push(track_id, frame_id, row);
    }
}

/// Crop of the frame image to the record's box, clamped to the image bounds
fn crop(frame: &Frame, record: &ObjectRecord) -> Value {
    let (Some(image), Some(tlbr)) = (frame.image.as_ref(), record.tlbr()) else {
        return Value::Invalid;
    };
    let (w, h) = (f64::from(image.width()), f64::from(image.height()));
    let x1 = tlbr[0].clamp(0.0, w).floor();
    let y1 = tlbr[1].clamp(0.0, h).floor();
    let x2 = tlbr[2].clamp(0.0, w).ceil();
    let y2 = tlbr[3].clamp(0.0, h).ceil();
    if x2 <= x1 || y2 <= y1 {
        return Value::Invalid;
    }
    let view = imageops::crop_imm(
        &**image,
        x1 as u32,
        y1 as u32,
        (x2 - x1) as u32,
        (y2 - y1) as u32,
    );
    Value::Image(Arc::new(view.to_image()))
}

impl Operator for VObjProjector {
    fn name(&self) -> &str {
        self.descriptor.name()
    }

    fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    #[instrument(
        level = "trace",
        name = "projector_next",
        skip(self),
        fields(property = %self.descriptor.name(), class = %self.class_name)
    )]
    fn next(&mut self) -> Result<Frame, ExecError> {
        let mut frame = self.prev.next()?;

        let indices = frame
            .filtered(self.filter_index, &self.class_name)
            .ok_or_else(|| {
                ExecError::missing_filter_index(self.filter_index, self.class_name.as_str())
            })?
            .to_vec();

        let stateful = self.descriptor.is_stateful();
        let mut results = Vec::with_capacity(indices.len());
        {
            let snapshot = frame
                .vobj_data
                .get(&self.class_name)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let mut seen: HashSet<TrackId> = HashSet::new();

            for index in indices {
                let Some(record) = snapshot.get(index) else {
                    continue;
                };
                match record.track_id() {
                    None if stateful => continue,
                    Some(track_id) if !seen.insert(track_id) => {
                        warn!(
                            frame_id = frame.id,
                            track_id,
                            property = %self.descriptor.name(),
                            "track appears twice in one frame; evaluated once"
                        );
                        continue;
                    }
                    _ => {}
                }
                results.push(self.evaluate(&frame, snapshot, index, record));
            }
        }

        let mut invalid = 0usize;
        if let Some(records) = frame.vobj_data.get_mut(&self.class_name) {
            for evaluated in results {
                if evaluated.value.is_invalid() {
                    invalid += 1;
                }
                if let (Some(track_id), false) = (evaluated.track_id, self.windowed.is_empty()) {
                    self.history.push(track_id, frame.id, evaluated.row);
                }
                if let Some(record) = records.get_mut(evaluated.index) {
                    record.insert(self.descriptor.name(), evaluated.value);
                }
            }
        }
        for _ in 0..invalid {
            observability::record_property_invalid(self.descriptor.name());
        }

        let own = self
            .windowed
            .iter()
            .position(|(n, _)| n == self.descriptor.name());
        if let Some(own) = own {
            let lost = frame
                .lost_tracks
                .get(&self.class_name)
                .cloned()
                .unwrap_or_default();
            for track_id in lost {
                self.carry_forward(track_id, frame.id, own);
            }
        }

        if !self.windowed.is_empty() {
            let mut live: HashSet<TrackId> = frame
                .vobj_data
                .get(&self.class_name)
                .into_iter()
                .flatten()
                .filter_map(ObjectRecord::track_id)
                .collect();
            if let Some(lost) = frame.lost_tracks.get(&self.class_name) {
                live.extend(lost.iter().copied());
            }
            let evicted = self.history.evict(frame.id, |id| live.contains(&id));
            if evicted > 0 {
                debug!(
                    frame_id = frame.id,
                    evicted,
                    rows = self.history.len(),
                    "history evicted"
                );
            }
        }
        Ok(frame)
    }
}
