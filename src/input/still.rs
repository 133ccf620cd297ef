// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Still image as a one-shot frame source.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use super::source::{Frame, FrameSource, OpenError, SourceKind, SourceSpec};

/// Yields the decoded image once, then reports end-of-stream.
pub struct StillImageSource {
    path: PathBuf,
    image: Option<RgbImage>,
    position: u64,
}

impl StillImageSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();
        let image = image::open(path)
            .map_err(|e| OpenError::unavailable(&SourceSpec::Image(path.to_path_buf()), e.to_string()))?
            .to_rgb8();
        debug!(
            "🖼️ image opened: {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self {
            path: path.to_path_buf(),
            image: Some(image),
            position: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for StillImageSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Image
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let image = self.image.take()?;
        self.position += 1;
        Some(Frame::new(self.position, image))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn is_open(&self) -> bool {
        self.image.is_some()
    }

    fn close(&mut self) {
        self.image = None;
    }
}
