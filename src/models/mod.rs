// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// ONNX 模型实现
///
/// - **YoloDetector**: YOLOv5 / YOLOv8 exports through `ort`
///   - 模型加载 (new)
///   - 预处理 (letterbox)
///   - 推理 (predict)
///   - 后处理 (decode + NMS + draw)
pub mod yolo;

pub use yolo::{OutputLayout, YoloDetector};
