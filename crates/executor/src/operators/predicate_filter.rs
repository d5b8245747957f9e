//! Predicate filter stage

use contracts::{FilterIndex, Frame, Predicate};
use tracing::{instrument, trace};

use crate::{BoxedOperator, ExecError, Operator};

/// Narrows a filter index to the objects satisfying the query predicate.
///
/// Objects whose predicate result is unknown (missing or invalid
/// properties) are dropped.
pub struct PredicateFilter {
    prev: BoxedOperator,
    predicate: Predicate,
    class_name: String,
    filter_index: FilterIndex,
}

impl PredicateFilter {
    pub fn new(
        prev: BoxedOperator,
        predicate: Predicate,
        class_name: impl Into<String>,
        filter_index: FilterIndex,
    ) -> Self {
        Self {
            prev,
            predicate,
            class_name: class_name.into(),
            filter_index,
        }
    }
}

impl Operator for PredicateFilter {
    fn name(&self) -> &str {
        "predicate_filter"
    }

    fn has_next(&self) -> bool {
        self.prev.has_next()
    }

    #[instrument(
        level = "trace",
        name = "predicate_filter_next",
        skip(self),
        fields(class = %self.class_name, index = self.filter_index)
    )]
    fn next(&mut self) -> Result<Frame, ExecError> {
        let mut frame = self.prev.next()?;

        let indices = frame
            .filtered(self.filter_index, &self.class_name)
            .ok_or_else(|| {
                ExecError::missing_filter_index(self.filter_index, self.class_name.as_str())
            })?;
        let records = frame
            .vobj_data
            .get(&self.class_name)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let passed: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| {
                records
                    .get(i)
                    .is_some_and(|r| self.predicate.evaluate(&self.class_name, r))
            })
            .collect();
        trace!(candidates = indices.len(), passed = passed.len(), "predicate applied");

        if let Some(by_class) = frame.filtered_vobjs.get_mut(&self.filter_index) {
            by_class.insert(self.class_name.clone(), passed);
        }
        Ok(frame)
    }
}
