//! Plan compilation errors
//!
//! All of them are fatal: no partial pipeline is ever returned.

use thiserror::Error;

/// Plan compilation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Non-self dependency edges remain after Kahn's algorithm
    #[error("cycle detected in property dependencies among {remaining:?}")]
    Cycle { remaining: Vec<String> },

    /// Predicate or output spans several VObj types
    #[error("only one VObj type per predicate supported, found {found:?}")]
    MultipleVObjTypes { found: Vec<String> },

    /// Predicate mentions no VObj type at all
    #[error("predicate does not reference any VObj type")]
    NoVObjType,

    /// Referenced property is neither built-in nor declared
    #[error("unknown property '{property}' on VObj '{vobj}'")]
    UnknownProperty { vobj: String, property: String },

    /// Declared property depends on something that does not exist
    #[error("property '{property}' depends on unknown '{dependency}'")]
    UnknownDependency { property: String, dependency: String },
}

impl PlanError {
    pub fn unknown_property(vobj: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            vobj: vobj.into(),
            property: property.into(),
        }
    }

    pub fn unknown_dependency(property: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::UnknownDependency {
            property: property.into(),
            dependency: dependency.into(),
        }
    }
}
