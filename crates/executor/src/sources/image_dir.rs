//! Directory-of-images frame source

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{ContractError, RawFrame, VideoMetadata, VideoSource};
use tracing::{debug, instrument};

/// File extensions picked up from the directory (case-insensitive)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Reads every image of a directory in lexical file-name order.
///
/// Width and height come from the first image; every later image must have
/// the same size. A file that fails to decode aborts the run.
#[derive(Debug)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    metadata: VideoMetadata,
    cursor: usize,
}

impl ImageSequenceSource {
    /// Scan `dir` for images
    pub fn open(dir: impl AsRef<Path>, fps: f64) -> Result<Self, ContractError> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();

        let Some(first) = files.first() else {
            return Err(ContractError::config_validation(
                "video.path",
                format!("no image files in {}", dir.display()),
            ));
        };
        let (frame_width, frame_height) = image::image_dimensions(first)
            .map_err(|e| ContractError::video_decode(1, format!("{}: {e}", first.display())))?;

        debug!(
            dir = %dir.display(),
            frames = files.len(),
            frame_width,
            frame_height,
            "image sequence opened"
        );

        Ok(Self {
            metadata: VideoMetadata {
                fps,
                frame_width,
                frame_height,
                n_frames: files.len() as u64,
            },
            files,
            cursor: 0,
        })
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

impl VideoSource for ImageSequenceSource {
    fn metadata(&self) -> VideoMetadata {
        self.metadata
    }

    fn has_next(&self) -> bool {
        self.cursor < self.files.len()
    }

    #[instrument(level = "trace", name = "image_sequence_next", skip(self), fields(cursor = self.cursor))]
    fn next_frame(&mut self) -> Result<RawFrame, ContractError> {
        let Some(path) = self.files.get(self.cursor) else {
            return Err(ContractError::VideoExhausted {
                n_frames: self.metadata.n_frames,
            });
        };
        let frame_id = self.cursor as u64 + 1;

        let image = image::open(path)
            .map_err(|e| ContractError::video_decode(frame_id, format!("{}: {e}", path.display())))?
            .to_rgb8();
        if image.dimensions() != (self.metadata.frame_width, self.metadata.frame_height) {
            return Err(ContractError::video_decode(
                frame_id,
                format!(
                    "{}: size {:?} differs from {}x{}",
                    path.display(),
                    image.dimensions(),
                    self.metadata.frame_width,
                    self.metadata.frame_height
                ),
            ));
        }

        self.cursor += 1;
        Ok(RawFrame {
            frame_id,
            image: Some(Arc::new(image)),
        })
    }
}
