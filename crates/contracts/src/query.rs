//! Query surface consumed by the planner

use crate::{Predicate, PropertyRef};

/// A query over one VObj type
pub trait Query {
    /// Display name, used in logs and output
    fn name(&self) -> &str;

    /// Predicate an object must satisfy to be reported
    fn frame_constraint(&self) -> Predicate;

    /// Fields reported for each passing object
    fn frame_output(&self) -> Vec<PropertyRef>;
}

/// Query assembled from explicit parts
#[derive(Debug, Clone)]
pub struct QuerySpec {
    name: String,
    constraint: Predicate,
    output: Vec<PropertyRef>,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, constraint: Predicate, output: Vec<PropertyRef>) -> Self {
        Self {
            name: name.into(),
            constraint,
            output,
        }
    }
}

impl Query for QuerySpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn frame_constraint(&self) -> Predicate {
        self.constraint.clone()
    }

    fn frame_output(&self) -> Vec<PropertyRef> {
        self.output.clone()
    }
}

/// Combine a parent query with a refinement.
///
/// Constraints are conjoined (parent first). The child's output list is used
/// unless it is empty, in which case the parent's is kept.
pub fn merge(parent: &dyn Query, child: &dyn Query) -> QuerySpec {
    let child_output = child.frame_output();
    let output = if child_output.is_empty() {
        parent.frame_output()
    } else {
        child_output
    };
    QuerySpec {
        name: child.name().to_string(),
        constraint: parent.frame_constraint() & child.frame_constraint(),
        output,
    }
}
