// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 检测系统 (Detection System)
///
/// - Detector:    backend contract (`models::YoloDetector` under `onnx`)
/// - types:       Bbox, NMS, thresholds, prediction
/// - BoxPainter:  annotation of detected boxes
pub mod annotate;
pub mod detector;
pub mod types;

pub use annotate::BoxPainter;
pub use detector::{check_frame, DetectError, Detector};
pub use types::{
    contact_points, non_max_suppression, Bbox, Prediction, ThresholdError, Thresholds,
};
