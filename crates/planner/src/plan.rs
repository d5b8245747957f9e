//! Compiled plan: the ordered stage list handed to the executor.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use contracts::{FilterIndex, Predicate, PropertyDescriptor, VObjType};

/// Filter index shared by the class filter, projectors and predicate filter
pub const DEFAULT_FILTER_INDEX: FilterIndex = 0;

/// One projector stage
#[derive(Debug, Clone)]
pub struct ProjectorSpec {
    pub descriptor: PropertyDescriptor,
    pub class_name: String,
    /// Objects listed under this filter index are projected
    pub filter_index: FilterIndex,
    /// Rows of history this projector must retain (largest window it reads)
    pub history_len: usize,
    pub self_dependent: bool,
}

/// Output formatting stage
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub vobj_name: String,
    pub class_name: String,
    pub filter_index: FilterIndex,
    /// Requested field names, in query order
    pub fields: Vec<String>,
}

/// One pipeline stage
#[derive(Debug, Clone)]
pub enum Stage {
    /// Select all objects of one class under a filter index
    ClassFilter {
        class_name: String,
        filter_index: FilterIndex,
    },
    /// Compute one derived property
    Project(ProjectorSpec),
    /// Keep only objects satisfying the query predicate
    PredicateFilter {
        predicate: Predicate,
        class_name: String,
        filter_index: FilterIndex,
    },
    /// Extract requested fields into a per-frame record
    OutputFormat(OutputSpec),
}

impl Stage {
    pub fn kind(&self) -> &'static str {
        match self {
            Stage::ClassFilter { .. } => "class_filter",
            Stage::Project(_) => "projector",
            Stage::PredicateFilter { .. } => "predicate_filter",
            Stage::OutputFormat(_) => "output_formatter",
        }
    }
}

/// Compiled query plan
#[derive(Debug, Clone)]
pub struct Plan {
    pub(crate) query_name: String,
    pub(crate) vobj: Arc<VObjType>,
    pub(crate) stages: Vec<Stage>,
    pub(crate) required_hist_len: BTreeMap<String, usize>,
    pub(crate) self_dependent: BTreeSet<String>,
}

impl Plan {
    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn vobj(&self) -> &Arc<VObjType> {
        &self.vobj
    }

    pub fn class_name(&self) -> &str {
        self.vobj.class_name()
    }

    /// Detector requested by the query's VObj type
    pub fn detector(&self) -> Option<&str> {
        self.vobj.detector()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Consume the plan, yielding its stages in execution order
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    /// Largest window any planned property reads of `name` (0 if none).
    ///
    /// Informational: each projector stores the windowed inputs it reads, so
    /// history is sized by the reader, not by this value.
    pub fn required_hist_len(&self, name: &str) -> usize {
        self.required_hist_len.get(name).copied().unwrap_or(0)
    }

    pub fn self_dependent(&self) -> &BTreeSet<String> {
        &self.self_dependent
    }

    /// Projected property names in execution order
    pub fn projected_properties(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter_map(|s| match s {
                Stage::Project(p) => Some(p.descriptor.name()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Plan '{}' over {} (class '{}'):",
            self.query_name,
            self.vobj.name(),
            self.vobj.class_name()
        )?;
        for (i, stage) in self.stages.iter().enumerate() {
            write!(f, "  {:>2}. ", i + 1)?;
            match stage {
                Stage::ClassFilter {
                    class_name,
                    filter_index,
                } => writeln!(f, "ClassFilter class={class_name} index={filter_index}")?,
                Stage::Project(p) => {
                    write!(f, "Project {}", p.descriptor.name())?;
                    if p.history_len > 0 {
                        write!(f, " history={}", p.history_len)?;
                    }
                    if p.self_dependent {
                        write!(f, " self-dependent")?;
                    }
                    writeln!(f)?;
                }
                Stage::PredicateFilter { predicate, .. } => {
                    writeln!(f, "PredicateFilter {predicate:?}")?
                }
                Stage::OutputFormat(o) => {
                    writeln!(f, "OutputFormat {} fields={:?}", o.vobj_name, o.fields)?
                }
            }
        }
        Ok(())
    }
}
