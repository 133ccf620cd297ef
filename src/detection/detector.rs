// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测器接口 (Detector)
//! 职责: frame + thresholds → annotated frame + tracked-class points

use image::RgbImage;
use thiserror::Error;

use super::types::{Prediction, Thresholds};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Any detection backend.
///
/// Thresholds travel with every call; implementations must not keep them
/// between calls. Identical weights, thresholds and frame give identical
/// output.
pub trait Detector {
    fn predict(&mut self, frame: &RgbImage, thresholds: Thresholds)
        -> Result<Prediction, DetectError>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn predict(
        &mut self,
        frame: &RgbImage,
        thresholds: Thresholds,
    ) -> Result<Prediction, DetectError> {
        (**self).predict(frame, thresholds)
    }
}

/// Rejects frames no backend can letterbox.
pub fn check_frame(frame: &RgbImage) -> Result<(), DetectError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(DetectError::InvalidFrame(format!(
            "{}x{}",
            frame.width(),
            frame.height()
        )));
    }
    Ok(())
}
