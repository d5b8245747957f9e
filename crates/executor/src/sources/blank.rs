//! Metadata-only frame source

use contracts::{ContractError, FrameId, RawFrame, VideoMetadata, VideoSource};

/// Source yielding `n_frames` frames without pixel data.
///
/// Used with detectors that do not look at pixels (precomputed detections).
#[derive(Debug, Clone)]
pub struct BlankVideoSource {
    metadata: VideoMetadata,
    next_id: FrameId,
}

impl BlankVideoSource {
    pub fn new(metadata: VideoMetadata) -> Self {
        Self {
            metadata,
            next_id: 1,
        }
    }

    pub fn with_size(fps: f64, frame_width: u32, frame_height: u32, n_frames: u64) -> Self {
        Self::new(VideoMetadata {
            fps,
            frame_width,
            frame_height,
            n_frames,
        })
    }
}

impl VideoSource for BlankVideoSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn has_next(&self) -> bool {
        self.next_id <= self.metadata.n_frames
    }

    fn next_frame(&mut self) -> Result<RawFrame, ContractError> {
        if !self.has_next() {
            return Err(ContractError::VideoExhausted {
                n_frames: self.metadata.n_frames,
            });
        }
        let frame_id = self.next_id;
        self.next_id += 1;
        Ok(RawFrame {
            frame_id,
            image: None,
        })
    }
}
