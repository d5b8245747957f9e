//! Pluggable frame sources and detectors
//!
//! Both are external collaborators: the executor only relies on the
//! interfaces below, concrete decoders and models live elsewhere.

use image::RgbImage;

use crate::{ContractError, FrameId, RawDetection, RawFrame, VideoMetadata};

/// Frame source abstraction
///
/// Implementations yield frames with strictly increasing `frame_id`,
/// starting at 1. `next_frame` is the only blocking call site of a pipeline.
///
/// # Example
///
/// ```ignore
/// let mut source: Box<dyn VideoSource> = open_source();
/// while source.has_next() {
///     let frame = source.next_frame()?;
///     println!("frame {}", frame.frame_id);
/// }
/// ```
pub trait VideoSource: Send {
    /// Fixed metadata, available before the first frame is read
    fn metadata(&self) -> VideoMetadata;

    /// Whether another frame can be read
    fn has_next(&self) -> bool;

    /// Read the next frame
    ///
    /// # Errors
    /// Decode failures are fatal for the run.
    fn next_frame(&mut self) -> Result<RawFrame, ContractError>;
}

/// Object detector plugin
pub trait Detector: Send {
    /// Class-name table; `class_id` of a detection indexes into it
    fn class_names(&self) -> &[String];

    /// Detect objects in one frame
    ///
    /// `image` is `None` for metadata-only sources; detectors that need
    /// pixels must return an error in that case.
    fn inference(
        &mut self,
        frame_id: FrameId,
        image: Option<&RgbImage>,
    ) -> Result<Vec<RawDetection>, ContractError>;

    /// Class name for a detection's `class_id`
    fn class_name(&self, class_id: u32) -> Option<&str> {
        self.class_names()
            .get(class_id as usize)
            .map(String::as_str)
    }
}
