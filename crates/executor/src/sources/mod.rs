//! Built-in frame sources

mod blank;
mod image_dir;

pub use blank::BlankVideoSource;
pub use image_dir::{ImageSequenceSource, IMAGE_EXTENSIONS};

use contracts::{ContractError, VideoConfig, VideoSource};

/// Open the source selected by the launch config
pub fn open_source(config: &VideoConfig) -> Result<Box<dyn VideoSource>, ContractError> {
    match config {
        VideoConfig::ImageDir { path, fps } => {
            Ok(Box::new(ImageSequenceSource::open(path, *fps)?))
        }
        VideoConfig::Blank {
            fps,
            frame_width,
            frame_height,
            n_frames,
        } => Ok(Box::new(BlankVideoSource::with_size(
            *fps,
            *frame_width,
            *frame_height,
            *n_frames,
        ))),
    }
}
