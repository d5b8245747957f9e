//! JsonLinesSink - writes one `FrameOutput` per line

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::FrameOutput;
use tracing::{debug, error, instrument};

use crate::ExecError;

/// Appends output records to a JSON-lines file.
///
/// Every record is flushed as it is written, so records emitted before a
/// fatal pipeline error stay on disk.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonLinesSink {
    /// Create (or truncate) `path`, creating parent directories as needed
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ExecError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ExecError::sink(path.display().to_string(), e.to_string()))?;
        }
        let file = File::create(&path)
            .map_err(|e| ExecError::sink(path.display().to_string(), e.to_string()))?;
        debug!(path = %path.display(), "output sink opened");

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_line(&mut self, output: &FrameOutput) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, output)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }

    #[instrument(level = "trace", name = "sink_write", skip(self, output), fields(frame_id = output.frame_id))]
    pub fn write(&mut self, output: &FrameOutput) -> Result<(), ExecError> {
        self.write_line(output).map_err(|e| {
            error!(path = %self.path.display(), frame_id = output.frame_id, error = %e, "Write failed");
            ExecError::sink(self.path.display().to_string(), e.to_string())
        })?;
        self.written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), ExecError> {
        self.writer
            .flush()
            .map_err(|e| ExecError::sink(self.path.display().to_string(), e.to_string()))
    }
}
