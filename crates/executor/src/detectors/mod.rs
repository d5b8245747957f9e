//! Detector plugins and their registry

mod precomputed;
mod registry;

pub use precomputed::{PrecomputedDetector, PRECOMPUTED_DETECTOR};
pub use registry::{DetectorFactory, DetectorRegistry};
