// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Frame source contract shared by the still-image and FFmpeg backends.

use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

/// A decoded frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Source position after this frame was read (1-based).
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Kind of input behind a source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Image,
    Video,
    Camera,
}

impl SourceKind {
    /// Video and camera sources are driven by the periodic tick; a still image is not.
    pub fn is_ticking(self) -> bool {
        matches!(self, SourceKind::Video | SourceKind::Camera)
    }
}

/// What to open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSpec {
    Image(PathBuf),
    Video(PathBuf),
    Camera(u32),
}

const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "webp"];

impl SourceSpec {
    /// Pick `Image` or `Video` from the file extension.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            SourceSpec::Image(path.to_path_buf())
        } else {
            SourceSpec::Video(path.to_path_buf())
        }
    }

    /// Parse a command-line argument: a bare non-negative integer is a camera index.
    pub fn parse(arg: &str) -> Self {
        match arg.trim().parse::<u32>() {
            Ok(index) => SourceSpec::Camera(index),
            Err(_) => SourceSpec::from_path(arg.trim()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::Image(_) => SourceKind::Image,
            SourceSpec::Video(_) => SourceKind::Video,
            SourceSpec::Camera(_) => SourceKind::Camera,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Image(p) => write!(f, "image {}", p.display()),
            SourceSpec::Video(p) => write!(f, "video {}", p.display()),
            SourceSpec::Camera(i) => write!(f, "camera {}", i),
        }
    }
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("cannot open {source_desc}: {reason}")]
    DeviceUnavailable { source_desc: String, reason: String },
}

impl OpenError {
    pub fn unavailable(spec: &SourceSpec, reason: impl Into<String>) -> Self {
        OpenError::DeviceUnavailable {
            source_desc: spec.to_string(),
            reason: reason.into(),
        }
    }
}

/// An open capture handle.
///
/// Implementations release the underlying device in `close` and again in
/// `Drop`, so a handle can never outlive its owner.
pub trait FrameSource {
    fn kind(&self) -> SourceKind;

    /// Next frame, or `None` once the stream is exhausted or unreadable.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Number of frames read so far.
    fn position(&self) -> u64;

    fn is_open(&self) -> bool;

    /// Release the device or file. Safe to call repeatedly.
    fn close(&mut self);
}

/// Factory for frame sources.
pub trait SourceOpener {
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>, OpenError>;
}
