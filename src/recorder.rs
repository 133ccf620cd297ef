// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 坐标记录器: one CSV file per recording session.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::tracking::Sample;

pub const HEADER: &str = "frame_number,x_center,y_center";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("cannot create record file {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write record file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Append-only coordinate sink.
///
/// The file is closed when the recorder is finished or dropped.
pub struct Recorder {
    path: PathBuf,
    writer: BufWriter<Box<dyn Write>>,
    rows: usize,
}

impl Recorder {
    /// Create `coordinate_data_<timestamp>.csv` in `dir` and write the header.
    /// An existing file is never reused; a numeric suffix is added instead.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self, RecordError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| RecordError::Create {
            path: dir.to_path_buf(),
            source,
        })?;

        let stem = format!("coordinate_data_{}", crate::gen_time_string());
        let (path, file) =
            crate::create_unique(dir, &stem, "csv").map_err(|source| RecordError::Create {
                path: dir.join(format!("{}.csv", stem)),
                source,
            })?;

        let recorder = Self::from_writer(path, file)?;
        info!("📝 recording to {}", recorder.path.display());
        Ok(recorder)
    }

    /// Record into an already open sink; `path` only labels it in logs and errors.
    pub fn from_writer(
        path: impl Into<PathBuf>,
        sink: impl Write + 'static,
    ) -> Result<Self, RecordError> {
        let sink: Box<dyn Write> = Box::new(sink);
        let mut recorder = Self {
            path: path.into(),
            writer: BufWriter::new(sink),
            rows: 0,
        };
        recorder.write_line(HEADER)?;
        Ok(recorder)
    }

    pub fn append(&mut self, sample: &Sample) -> Result<(), RecordError> {
        let line = format!("{},{:.2},{:.2}", sample.frame_index, sample.x, sample.y);
        self.write_line(&line)?;
        self.rows += 1;
        Ok(())
    }

    fn write_line(&mut self, line: &str) -> Result<(), RecordError> {
        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|source| RecordError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Flush and close; returns the file path.
    pub fn finish(mut self) -> Result<PathBuf, RecordError> {
        self.writer.flush().map_err(|source| RecordError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("record file {} closed ({} rows)", self.path.display(), self.rows);
        Ok(self.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }
}
