//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: the
//! per-frame data model, property/VObj declarations, the predicate tree, the
//! query surface, pluggable source/detector traits and the launch config.
//! Business crates depend on this crate only, reverse dependencies are prohibited.
//!
//! ## Frame Model
//! - `frame_id` starts at 1 and increases by one per video tick
//! - One `Frame` is fully retired before the next one is read

mod error;
mod frame;
mod launch;
mod output;
mod predicate;
mod property;
mod query;
mod source;
mod value;
mod vobj;

pub use error::*;
pub use frame::*;
pub use launch::*;
pub use output::*;
pub use predicate::{Operand, Predicate};
pub use property::*;
pub use query::*;
pub use source::*;
pub use value::Value;
pub use vobj::*;
