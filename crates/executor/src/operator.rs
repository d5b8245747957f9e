//! Pull-based operator abstraction
//!
//! Each stage owns its upstream and advances it exactly one frame per
//! `next` call, so frame N+1 is never read before frame N is retired.

use contracts::Frame;

use crate::ExecError;

/// One pipeline stage
pub trait Operator: Send {
    /// Stage name, used in logs
    fn name(&self) -> &str;

    /// Whether the upstream source can produce another frame
    fn has_next(&self) -> bool;

    /// Pull the next frame through this stage
    ///
    /// # Errors
    /// Any fatal pipeline error; the run must stop.
    fn next(&mut self) -> Result<Frame, ExecError>;
}

/// Boxed upstream stage
pub type BoxedOperator = Box<dyn Operator>;
