//! Reusable property declarations
//!
//! Each function returns a ready `PropertyDescriptor` that a VObj type can
//! declare with `VObjBuilder::property`.

use contracts::{FrameId, PropertyDescriptor, Value, DEP_FRAME_ID, FIELD_TLBR};

fn box_center(b: &[f64; 4]) -> [f64; 2] {
    [(b[0] + b[2]) / 2.0, (b[1] + b[3]) / 2.0]
}

/// `center`: box centre as `[cx, cy]`
pub fn center() -> PropertyDescriptor {
    PropertyDescriptor::builder("center")
        .input(FIELD_TLBR)
        .compute(|inputs| match inputs.bbox(FIELD_TLBR) {
            Some(b) => {
                let [cx, cy] = box_center(&b);
                Value::List(vec![Value::Float(cx), Value::Float(cy)])
            }
            None => Value::Invalid,
        })
}

/// `area`: box area in square pixels
pub fn area() -> PropertyDescriptor {
    PropertyDescriptor::builder("area")
        .input(FIELD_TLBR)
        .compute(|inputs| match inputs.bbox(FIELD_TLBR) {
            Some(b) => Value::Float((b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0)),
            None => Value::Invalid,
        })
}

/// `bbox_velocity`: centre displacement over one frame, in units of the
/// average box height / 1.5, per second.
pub fn bbox_velocity() -> PropertyDescriptor {
    PropertyDescriptor::builder("bbox_velocity")
        .depends_on(FIELD_TLBR, 1)
        .input("fps")
        .compute(|inputs| {
            let (Some(window), Some(fps)) = (inputs.window(FIELD_TLBR), inputs.f64("fps")) else {
                return Value::Invalid;
            };
            let (Some(prev), Some(cur)) = (
                window.first().and_then(Value::as_bbox),
                window.last().and_then(Value::as_bbox),
            ) else {
                return Value::Invalid;
            };

            let scale = ((cur[3] - cur[1]) + (prev[3] - prev[1])) / 2.0 / 1.5;
            if scale <= 0.0 {
                return Value::Invalid;
            }
            let (c, p) = (box_center(&cur), box_center(&prev));
            let dx = (c[0] - p[0]) / scale * fps;
            let dy = (c[1] - p[1]) / scale * fps;
            Value::Float(dx.hypot(dy))
        })
}

/// `direction`: unit vector from the centre `window` frames ago to the
/// current centre; `Null` when the object has not moved.
pub fn direction(window: usize) -> PropertyDescriptor {
    PropertyDescriptor::builder("direction")
        .depends_on(FIELD_TLBR, window.max(1))
        .compute(|inputs| {
            let Some(boxes) = inputs.window(FIELD_TLBR) else {
                return Value::Invalid;
            };
            let (Some(first), Some(last)) = (
                boxes.first().and_then(Value::as_bbox),
                boxes.last().and_then(Value::as_bbox),
            ) else {
                return Value::Invalid;
            };
            let (c, p) = (box_center(&last), box_center(&first));
            let (dx, dy) = (c[0] - p[0], c[1] - p[1]);
            let norm = dx.hypot(dy);
            if norm == 0.0 {
                return Value::Null;
            }
            Value::List(vec![Value::Float(dx / norm), Value::Float(dy / norm)])
        })
}

/// Progress of one track under a [`Continuing`] condition.
///
/// Stored as the value of the `{name}_state` property, so the projector's
/// history owns it per track and drops it with the track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuingState {
    /// Whether the condition has held long enough at the last update
    pub holding: bool,
    /// First and last frame of the open period
    pub open: Option<(FrameId, FrameId)>,
    /// Recorded periods as `(start, end)` seconds
    pub periods: Vec<(u64, u64)>,
}

impl ContinuingState {
    /// Decode a stored state; anything else (the `Null` default) is a fresh state
    pub fn from_value(value: &Value) -> Self {
        let Some([holding, start, end, periods]) = value.as_list() else {
            return Self::default();
        };
        let frame = |v: &Value| v.as_i64().and_then(|f| FrameId::try_from(f).ok());
        let pair = |v: &Value| match v.as_list() {
            Some([s, e]) => Some((s.as_i64()? as u64, e.as_i64()? as u64)),
            _ => None,
        };
        Self {
            holding: holding.as_bool().unwrap_or(false),
            open: frame(start).zip(frame(end)),
            periods: periods
                .as_list()
                .map(|list| list.iter().filter_map(pair).collect())
                .unwrap_or_default(),
        }
    }

    pub fn to_value(&self) -> Value {
        let (start, end) = match self.open {
            Some((s, e)) => (Value::from(s), Value::from(e)),
            None => (Value::Null, Value::Null),
        };
        Value::List(vec![
            Value::Bool(self.holding),
            start,
            end,
            self.periods_value(),
        ])
    }

    /// Periods as a list of `[start, end]` seconds
    pub fn periods_value(&self) -> Value {
        Value::List(
            self.periods
                .iter()
                .map(|&(s, e)| Value::List(vec![Value::from(s), Value::from(e)]))
                .collect(),
        )
    }
}

/// "Condition held for at least `duration_s`" detector.
///
/// Frames where the condition holds extend the open period when they follow
/// its last frame within `gap_tolerance` frames (default: one second of
/// video); otherwise a new period opens. Frames in between are the ones where
/// the track was lost. A frame where the condition is false closes the open
/// period. Once a period reaches the duration it is recorded, in whole
/// seconds, as `(start, end)`; consecutive updates of the same period replace
/// its entry.
#[derive(Debug, Clone, Copy)]
pub struct Continuing {
    duration_s: f64,
    gap_tolerance: Option<u64>,
}

impl Continuing {
    pub fn new(duration_s: f64) -> Self {
        Self {
            duration_s,
            gap_tolerance: None,
        }
    }

    /// Max frames between two matching frames of one period
    pub fn with_gap_tolerance(mut self, frames: u64) -> Self {
        self.gap_tolerance = Some(frames);
        self
    }

    /// Feed one observation into `state`; returns whether the condition has
    /// held long enough.
    pub fn step(&self, state: &mut ContinuingState, frame_id: FrameId, fps: f64, holds: bool) -> bool {
        if !holds {
            state.open = None;
            state.holding = false;
            return false;
        }

        let tolerance = self
            .gap_tolerance
            .unwrap_or_else(|| fps.max(0.0) as u64);
        let (start, end) = match state.open {
            Some((start, end)) if frame_id.saturating_sub(end) <= tolerance => (start, frame_id),
            _ => (frame_id, frame_id),
        };
        state.open = Some((start, end));

        state.holding = ((end - start) as f64) >= self.duration_s * fps;
        if !state.holding {
            return false;
        }

        let seconds = |f: FrameId| if fps > 0.0 { (f as f64 / fps) as u64 } else { 0 };
        let entry = (seconds(start), seconds(end));
        match state.periods.last_mut() {
            Some(last) if last.0 == entry.0 => *last = entry,
            _ => state.periods.push(entry),
        }
        true
    }

    /// Declare `{name}_state` (self-dependent, holds a [`ContinuingState`]),
    /// `name` (Bool: `condition` on `property` has continued) and
    /// `{name}_periods` (List of `[start, end]` seconds).
    ///
    /// All three go on the VObj type; queries reference `name` and
    /// `{name}_periods`.
    pub fn into_properties<F>(
        self,
        name: &str,
        property: &str,
        condition: F,
    ) -> [PropertyDescriptor; 3]
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let state_name = format!("{name}_state");
        let property_name = property.to_string();

        let own = state_name.clone();
        let state = PropertyDescriptor::builder(state_name.as_str())
            .own_history(1)
            .input(property)
            .input(DEP_FRAME_ID)
            .input("fps")
            .compute(move |inputs| {
                let (Some(frame_id), Some(fps)) = (
                    inputs.current(DEP_FRAME_ID).and_then(Value::as_i64),
                    inputs.f64("fps"),
                ) else {
                    return Value::Invalid;
                };
                let mut state = inputs
                    .window(&own)
                    .and_then(|w| w.first())
                    .map(ContinuingState::from_value)
                    .unwrap_or_default();
                let holds = inputs
                    .current(&property_name)
                    .is_some_and(|v| !v.is_null() && condition(v));
                self.step(&mut state, frame_id as FrameId, fps, holds);
                state.to_value()
            });

        let flag_input = state_name.clone();
        let flag = PropertyDescriptor::builder(name)
            .input(state_name.as_str())
            .compute(move |inputs| {
                let holding = inputs
                    .current(&flag_input)
                    .map(ContinuingState::from_value)
                    .is_some_and(|state| state.holding);
                Value::Bool(holding)
            });

        let periods = PropertyDescriptor::builder(format!("{name}_periods"))
            .input(state_name.as_str())
            .compute(move |inputs| {
                inputs
                    .current(&state_name)
                    .map(ContinuingState::from_value)
                    .unwrap_or_default()
                    .periods_value()
            });

        [state, flag, periods]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Input, ObjectRecord, PropertyInputs};

    const NO_OBJECTS: &[ObjectRecord] = &[];

    fn window_inputs(boxes: &[[f64; 4]], fps: f64) -> PropertyInputs<'static> {
        let mut inputs = PropertyInputs::new(NO_OBJECTS);
        inputs.insert(
            FIELD_TLBR,
            Input::Window(boxes.iter().map(|b| Value::BBox(*b)).collect()),
        );
        inputs.insert("fps", Input::Current(Value::Float(fps)));
        inputs
    }

    #[test]
    fn test_center_and_area() {
        let mut inputs = PropertyInputs::new(&[]);
        inputs.insert(FIELD_TLBR, Input::Current(Value::BBox([0.0, 0.0, 4.0, 2.0])));
        assert_eq!(
            center().call(&inputs),
            Value::List(vec![Value::Float(2.0), Value::Float(1.0)])
        );
        assert_eq!(area().call(&inputs), Value::Float(8.0));

        let empty = PropertyInputs::new(&[]);
        assert!(area().call(&empty).is_invalid());
    }

    #[test]
    fn test_bbox_velocity() {
        // Height 30 -> scale 20; centre moves 4 px right and 3 px down
        let inputs = window_inputs(&[[0.0, 0.0, 10.0, 30.0], [4.0, 3.0, 14.0, 33.0]], 10.0);
        let v = bbox_velocity().call(&inputs).as_f64().unwrap();
        assert!((v - 2.5).abs() < 1e-9);

        let still = window_inputs(&[[0.0, 0.0, 10.0, 30.0], [0.0, 0.0, 10.0, 30.0]], 10.0);
        assert_eq!(bbox_velocity().call(&still), Value::Float(0.0));
    }

    #[test]
    fn test_direction() {
        let inputs = window_inputs(
            &[[0.0, 0.0, 2.0, 2.0], [1.0, 1.0, 3.0, 3.0], [3.0, 4.0, 5.0, 6.0]],
            10.0,
        );
        let d = direction(2).call(&inputs);
        assert_eq!(d, Value::List(vec![Value::Float(0.6), Value::Float(0.8)]));

        let still = window_inputs(&[[0.0, 0.0, 2.0, 2.0], [0.0, 0.0, 2.0, 2.0]], 10.0);
        assert!(direction(1).call(&still).is_null());
    }

    #[test]
    fn test_continuing_periods() {
        let c = Continuing::new(1.0);
        let mut state = ContinuingState::default();
        let fps = 2.0;
        // Held on frames 1..=3: two frames elapsed = 1 s at 2 fps
        assert!(!c.step(&mut state, 1, fps, true));
        assert!(!c.step(&mut state, 2, fps, true));
        assert!(c.step(&mut state, 3, fps, true));
        assert!(c.step(&mut state, 4, fps, true));
        assert_eq!(state.periods, vec![(0, 2)]);

        // Broken, then a fresh period
        assert!(!c.step(&mut state, 5, fps, false));
        assert_eq!(state.open, None);
        for f in 6..=8 {
            c.step(&mut state, f, fps, true);
        }
        assert_eq!(state.periods, vec![(0, 2), (3, 4)]);
    }

    #[test]
    fn test_continuing_gap_tolerance() {
        let c = Continuing::new(1.0).with_gap_tolerance(2);
        let mut state = ContinuingState::default();
        let fps = 4.0;
        c.step(&mut state, 1, fps, true);
        // Frames 2-3 unseen (track lost), within tolerance
        c.step(&mut state, 3, fps, true);
        assert!(c.step(&mut state, 5, fps, true));

        // Gap of 3 frames opens a new period
        assert!(!c.step(&mut state, 8, fps, true));
        assert_eq!(state.open, Some((8, 8)));
    }

    #[test]
    fn test_continuing_state_value() {
        let state = ContinuingState {
            holding: true,
            open: Some((4, 9)),
            periods: vec![(1, 2), (2, 4)],
        };
        assert_eq!(ContinuingState::from_value(&state.to_value()), state);
        assert_eq!(ContinuingState::from_value(&Value::Null), ContinuingState::default());
    }

    #[test]
    fn test_continuing_properties() {
        let [state, flag, periods] =
            Continuing::new(0.0).into_properties("stopped", "speed", |v| v.as_f64() == Some(0.0));
        assert_eq!(state.name(), "stopped_state");
        assert!(state.is_self_dependent());
        assert_eq!(flag.name(), "stopped");
        assert_eq!(periods.name(), "stopped_periods");
        assert_eq!(periods.dependencies()[0].0, "stopped_state");

        let mut inputs = PropertyInputs::new(&[]);
        inputs.insert("speed", Input::Current(Value::Float(0.0)));
        inputs.insert(DEP_FRAME_ID, Input::Current(Value::Int(4)));
        inputs.insert("fps", Input::Current(Value::Float(2.0)));
        inputs.insert("stopped_state", Input::Window(vec![Value::Null, Value::Null]));
        let stored = state.call(&inputs);

        let mut derived = PropertyInputs::new(&[]);
        derived.insert("stopped_state", Input::Current(stored));
        assert_eq!(flag.call(&derived), Value::Bool(true));
        assert_eq!(
            periods.call(&derived),
            Value::List(vec![Value::List(vec![Value::Int(2), Value::Int(2)])])
        );
    }
}
