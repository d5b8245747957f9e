//! Output projection stage

use std::collections::HashSet;

use contracts::{
    Frame, FrameOutput, ObjectOutput, ObjectRecord, OutputConfig, OutputMode, TrackId, Value,
    DEP_FRAME_ID,
};
use planner::OutputSpec;
use tracing::{instrument, trace};

use crate::{BoxedOperator, ExecError};

/// Terminal stage: turns passing objects into a `FrameOutput`.
///
/// Unlike the other stages it does not implement `Operator`; `next` yields
/// `None` for frames suppressed in matches-only mode.
pub struct OutputFormatter {
    prev: BoxedOperator,
    spec: OutputSpec,
    mode: OutputMode,
    frame_vobj_num: bool,
    total_vobj_num: bool,
    seen_tracks: HashSet<TrackId>,
}

impl OutputFormatter {
    pub fn new(prev: BoxedOperator, spec: OutputSpec, config: &OutputConfig) -> Self {
        Self {
            prev,
            spec,
            mode: config.mode,
            frame_vobj_num: config.frame_vobj_num,
            total_vobj_num: config.total_vobj_num,
            seen_tracks: HashSet::new(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    /// Distinct track ids reported so far
    pub fn total_tracks(&self) -> usize {
        self.seen_tracks.len()
    }

    fn field(&self, frame: &Frame, record: &ObjectRecord, name: &str) -> Option<Value> {
        let value = match record.get(name) {
            Some(v) => v.clone(),
            None if name == DEP_FRAME_ID => Value::from(frame.id),
            None => frame.metadata.get(name)?,
        };
        (!value.is_invalid()).then_some(value)
    }

    fn object(&self, frame: &Frame, record: &ObjectRecord) -> ObjectOutput {
        let mut out = ObjectOutput::new();
        for name in &self.spec.fields {
            if let Some(value) = self.field(frame, record, name) {
                out.insert(name.clone(), value.to_json());
            }
        }
        out
    }

    /// Pull one frame and format it.
    ///
    /// # Errors
    /// Whatever the upstream stages return.
    #[instrument(
        level = "trace",
        name = "output_formatter_next",
        skip(self),
        fields(vobj = %self.spec.vobj_name)
    )]
    pub fn next(&mut self) -> Result<Option<FrameOutput>, ExecError> {
        let frame = self.prev.next()?;

        let passing = frame.filtered_records(self.spec.filter_index, &self.spec.class_name);
        if passing.is_empty() && self.mode == OutputMode::MatchesOnly {
            trace!(frame_id = frame.id, "no match; frame suppressed");
            return Ok(None);
        }

        let objects: Vec<ObjectOutput> = passing
            .iter()
            .map(|record| self.object(&frame, record))
            .collect();
        self.seen_tracks
            .extend(passing.iter().filter_map(|r| r.track_id()));

        let mut output = FrameOutput::new(frame.id);
        if self.frame_vobj_num {
            output.vobj_num = Some(objects.len());
        }
        if self.total_vobj_num {
            output.total_vobj_num = Some(self.seen_tracks.len());
        }
        output.objects.insert(self.spec.vobj_name.clone(), objects);
        Ok(Some(output))
    }
}
