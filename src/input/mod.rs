// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// Frame input system
///
/// - StillImageSource: a single image, yielded once
/// - FfmpegSource:     video container or local camera (feature `ffmpeg`)
/// - DecodeFilter:     FFmpeg frame → RGB frame channel
/// - MediaOpener:      picks the backend for a `SourceSpec`
pub mod source;
pub mod still;

#[cfg(feature = "ffmpeg")]
pub mod camera;
#[cfg(feature = "ffmpeg")]
pub mod decode_filter;
#[cfg(feature = "ffmpeg")]
pub mod decoder;

pub use source::{Frame, FrameSource, OpenError, SourceKind, SourceOpener, SourceSpec};
pub use still::StillImageSource;

#[cfg(feature = "ffmpeg")]
pub use camera::{list_cameras, CameraDevice};
#[cfg(feature = "ffmpeg")]
pub use decoder::FfmpegSource;

/// Production opener: images through `image`, video and cameras through FFmpeg.
#[derive(Debug, Default, Clone, Copy)]
pub struct MediaOpener;

impl SourceOpener for MediaOpener {
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>, OpenError> {
        match spec {
            SourceSpec::Image(path) => Ok(Box::new(StillImageSource::open(path)?)),
            #[cfg(feature = "ffmpeg")]
            SourceSpec::Video(path) => Ok(Box::new(FfmpegSource::open_file(path)?)),
            #[cfg(feature = "ffmpeg")]
            SourceSpec::Camera(index) => Ok(Box::new(FfmpegSource::open_camera(*index)?)),
            #[cfg(not(feature = "ffmpeg"))]
            SourceSpec::Video(_) | SourceSpec::Camera(_) => Err(OpenError::unavailable(
                spec,
                "built without the `ffmpeg` feature",
            )),
        }
    }
}
