//! # Executor
//!
//! Pull-based streaming engine that runs a compiled [`planner::Plan`]
//! frame by frame.
//!
//! Responsibilities:
//! - Read frames from a `VideoSource` and run the selected detector
//! - Assign track identities with the per-class ByteTrack tracker
//! - Evaluate derived properties with per-track history (`VObjProjector`)
//! - Filter objects by the query predicate and format output records
//!
//! # Example
//!
//! ```ignore
//! use executor::{DetectorRegistry, Executor, JsonLinesSink};
//!
//! let plan = planner::Planner::new().compile(&query)?;
//! let mut sink = JsonLinesSink::create("results.jsonl")?;
//! for output in Executor::from_config(plan, &config, &DetectorRegistry::with_builtins())? {
//!     sink.write(&output?)?;
//! }
//! ```

pub mod detectors;
mod error;
mod history;
mod operator;
pub mod operators;
mod pipeline;
pub mod properties;
mod sink;
pub mod sources;

pub use detectors::{DetectorRegistry, PrecomputedDetector};
pub use error::ExecError;
pub use history::HistoryBuffer;
pub use operator::{BoxedOperator, Operator};
pub use pipeline::Executor;
pub use sink::JsonLinesSink;
pub use sources::{open_source, BlankVideoSource, ImageSequenceSource};
