//! Executor error types

use contracts::{ContractError, FilterIndex};
use planner::PlanError;
use thiserror::Error;

/// Pipeline errors; every variant aborts the run
#[derive(Debug, Error)]
pub enum ExecError {
    /// Source, detector or configuration failure
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Plan could not be compiled
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A class filter ran twice on the same index
    #[error("filter index {index} already contains class '{class_name}'")]
    DuplicateClassFilter {
        index: FilterIndex,
        class_name: String,
    },

    /// A stage reads a filter index no class filter has populated
    #[error("filter index {index} has no entry for class '{class_name}'")]
    MissingFilterIndex {
        index: FilterIndex,
        class_name: String,
    },

    /// Two detector stages produced the same class
    #[error("class '{class_name}' was already detected upstream")]
    ClassAlreadyDetected { class_name: String },

    /// Output sink failure
    #[error("sink '{path}' error: {message}")]
    Sink { path: String, message: String },

    /// `next` called after the source was exhausted
    #[error("pipeline exhausted")]
    Exhausted,
}

impl ExecError {
    pub fn duplicate_class_filter(index: FilterIndex, class_name: impl Into<String>) -> Self {
        Self::DuplicateClassFilter {
            index,
            class_name: class_name.into(),
        }
    }

    pub fn missing_filter_index(index: FilterIndex, class_name: impl Into<String>) -> Self {
        Self::MissingFilterIndex {
            index,
            class_name: class_name.into(),
        }
    }

    pub fn sink(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            path: path.into(),
            message: message.into(),
        }
    }
}
