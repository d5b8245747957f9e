//! Pipeline head: wraps a `VideoSource`

use contracts::{Frame, VideoMetadata, VideoSource};
use tracing::instrument;

use crate::{ExecError, Operator};

/// Turns raw source frames into pipeline `Frame`s
pub struct VideoReader {
    source: Box<dyn VideoSource>,
    metadata: VideoMetadata,
}

impl VideoReader {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        let metadata = source.metadata();
        Self { source, metadata }
    }

    pub fn metadata(&self) -> VideoMetadata {
        self.metadata
    }
}

impl Operator for VideoReader {
    fn name(&self) -> &str {
        "video_reader"
    }

    fn has_next(&self) -> bool {
        self.source.has_next()
    }

    #[instrument(level = "trace", name = "video_reader_next", skip(self))]
    fn next(&mut self) -> Result<Frame, ExecError> {
        if !self.source.has_next() {
            return Err(ExecError::Exhausted);
        }
        let raw = self.source.next_frame()?;
        Ok(Frame::new(raw, self.metadata))
    }
}
