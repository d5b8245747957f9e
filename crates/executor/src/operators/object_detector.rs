//! Detection stage

use std::collections::BTreeSet;

use contracts::{ContractError, Detector, Frame, ObjectRecord};
use tracing::{instrument, trace};

use crate::{BoxedOperator, ExecError, Operator};

/// Runs a detector on every frame and fills `vobj_data` with the requested classes
pub struct ObjectDetector {
    prev: BoxedOperator,
    detector: Box<dyn Detector>,
    detector_name: String,
    class_names: BTreeSet<String>,
}

impl ObjectDetector {
    /// # Errors
    /// `UnsupportedClass` if the detector's class table lacks a requested class.
    pub fn new<I, S>(
        prev: BoxedOperator,
        detector_name: impl Into<String>,
        detector: Box<dyn Detector>,
        class_names: I,
    ) -> Result<Self, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let detector_name = detector_name.into();
        let class_names: BTreeSet<String> = class_names.into_iter().map(Into::into).collect();
        let supported: BTreeSet<&str> = detector.class_names().iter().map(String::as_str).collect();
        if let Some(missing) = class_names.iter().find(|c| !supported.contains(c.as_str())) {
            return Err(ContractError::unsupported_class(&detector_name, missing.as_str()).into());
        }

        Ok(Self {
            prev,
            detector,
            detector_name,
            class_names,
        })
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.class_names.iter().map(String::as_str)
    }
}

impl Operator for ObjectDetector {
    fn name(&self) -> &str {
        "object_detector"
    }

    fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    #[instrument(
        level = "trace",
        name = "object_detector_next",
        skip(self),
        fields(detector = %self.detector_name)
    )]
    fn next(&mut self) -> Result<Frame, ExecError> {
        let mut frame = self.prev.next()?;

        if let Some(class_name) = self
            .class_names
            .iter()
            .find(|c| frame.vobj_data.contains_key(c.as_str()))
        {
            return Err(ExecError::ClassAlreadyDetected {
                class_name: class_name.clone(),
            });
        }

        let detections = self
            .detector
            .inference(frame.id, frame.image.as_deref())?;

        for class_name in &self.class_names {
            frame.vobj_data.insert(class_name.clone(), Vec::new());
        }
        for det in &detections {
            let Some(class_name) = self.detector.class_name(det.class_id) else {
                trace!(class_id = det.class_id, "detection with unknown class id skipped");
                continue;
            };
            if let Some(records) = frame.vobj_data.get_mut(class_name) {
                if self.class_names.contains(class_name) {
                    records.push(ObjectRecord::from_detection(det));
                }
            }
        }

        for (class_name, records) in &frame.vobj_data {
            if self.class_names.contains(class_name) {
                observability::record_objects_detected(class_name, records.len());
            }
        }
        Ok(frame)
    }
}
