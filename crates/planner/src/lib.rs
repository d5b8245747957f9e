//! # Planner
//!
//! Compiles a query into an ordered list of pipeline stages.
//!
//! Responsibilities:
//! - Collect the derived properties a query needs, with their dependencies
//! - Order them topologically (declaration order breaks ties)
//! - Detect dependency cycles; self-dependencies are recorded, not cycles
//! - Compute per-property history retention (`required_hist_len`)
//!
//! # Example
//!
//! ```ignore
//! use planner::Planner;
//!
//! let plan = Planner::new().compile(&query)?;
//! println!("{plan}");
//! ```

mod error;
mod graph;
mod plan;
mod compiler;

pub use error::PlanError;
pub use graph::DependencyGraph;
pub use plan::{OutputSpec, Plan, ProjectorSpec, Stage, DEFAULT_FILTER_INDEX};
pub use compiler::Planner;
