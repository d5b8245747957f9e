//! Pipeline stages

mod class_filter;
mod object_detector;
mod output_formatter;
mod predicate_filter;
mod projector;
mod tracker;
mod video_reader;

pub use class_filter::ClassFilter;
pub use object_detector::ObjectDetector;
pub use output_formatter::OutputFormatter;
pub use predicate_filter::PredicateFilter;
pub use projector::VObjProjector;
pub use tracker::TrackerOperator;
pub use video_reader::VideoReader;
