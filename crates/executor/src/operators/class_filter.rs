//! Class selection stage

use contracts::{FilterIndex, Frame};
use tracing::instrument;

use crate::{BoxedOperator, ExecError, Operator};

/// Lists every object of one class under a filter index
pub struct ClassFilter {
    prev: BoxedOperator,
    class_name: String,
    filter_index: FilterIndex,
}

impl ClassFilter {
    pub fn new(prev: BoxedOperator, class_name: impl Into<String>, filter_index: FilterIndex) -> Self {
        Self {
            prev,
            class_name: class_name.into(),
            filter_index,
        }
    }
}

impl Operator for ClassFilter {
    fn name(&self) -> &str {
        "class_filter"
    }

    fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    #[instrument(
        level = "trace",
        name = "class_filter_next",
        skip(self),
        fields(class = %self.class_name, index = self.filter_index)
    )]
    fn next(&mut self) -> Result<Frame, ExecError> {
        let mut frame = self.prev.next()?;

        let count = frame
            .vobj_data
            .get(&self.class_name)
            .map_or(0, Vec::len);
        let by_class = frame.filtered_vobjs.entry(self.filter_index).or_default();
        if by_class.contains_key(&self.class_name) {
            return Err(ExecError::duplicate_class_filter(
                self.filter_index,
                self.class_name.as_str(),
            ));
        }
        by_class.insert(self.class_name.clone(), (0..count).collect());
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::PrecomputedDetector;
    use crate::operators::{ObjectDetector, VideoReader};
    use crate::sources::BlankVideoSource;
    use contracts::RawDetection;
    use std::collections::HashMap;

    fn detected() -> BoxedOperator {
        let det = |class_id| RawDetection {
            tlbr: [0.0, 0.0, 10.0, 10.0],
            score: 0.9,
            class_id,
        };
        let detector = PrecomputedDetector::new(
            vec!["person".into(), "car".into()],
            HashMap::from([(1, vec![det(0), det(1), det(0)])]),
        );
        let reader = VideoReader::new(Box::new(BlankVideoSource::with_size(10.0, 32, 32, 2)));
        Box::new(
            ObjectDetector::new(Box::new(reader), "test", Box::new(detector), ["person", "car"])
                .unwrap(),
        )
    }

    #[test]
    fn test_selects_all_objects_of_class() {
        let mut op = ClassFilter::new(detected(), "person", 0);
        let frame = op.next().unwrap();
        assert_eq!(frame.filtered(0, "person"), Some(&[0, 1][..]));
        assert_eq!(frame.filtered(0, "car"), None);

        // No detections: listed, but empty
        let frame = op.next().unwrap();
        assert_eq!(frame.filtered(0, "person"), Some(&[][..]));
    }

    #[test]
    fn test_separate_indices_coexist() {
        let person = ClassFilter::new(detected(), "person", 0);
        let mut car = ClassFilter::new(Box::new(person), "car", 1);
        let frame = car.next().unwrap();
        assert_eq!(frame.filtered(0, "person").map(<[usize]>::len), Some(2));
        assert_eq!(frame.filtered(1, "car").map(<[usize]>::len), Some(1));
    }

    #[test]
    fn test_duplicate_filter_is_fatal() {
        let first = ClassFilter::new(detected(), "person", 0);
        let mut second = ClassFilter::new(Box::new(first), "person", 0);
        assert!(matches!(
            second.next(),
            Err(ExecError::DuplicateClassFilter { index: 0, .. })
        ));
    }
}
