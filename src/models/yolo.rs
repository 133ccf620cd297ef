// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 检测模型 (ONNX Runtime)
// 包含: 模型加载、预处理、推理、后处理

use std::path::Path;
use std::time::Instant;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::{s, ArrayView2, Axis};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::detection::{
    check_frame, contact_points, non_max_suppression, Bbox, BoxPainter, DetectError, Detector,
    Prediction, Thresholds,
};

const CXYWH_OFFSET: usize = 4;
const MAX_DET: usize = 300;
const PAD_VALUE: f32 = 144.0 / 255.0;

/// Head layout of the exported model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, N, 5 + nc]`: box, objectness, class scores per row.
    V5 { nc: usize },
    /// `[1, 4 + nc, N]`: box and class scores per column.
    V8 { nc: usize },
}

impl OutputLayout {
    /// Anchors always outnumber channels, which tells the layouts apart.
    pub fn infer(dims: &[usize]) -> Result<Self, DetectError> {
        match dims {
            [1, a, b] if a < b && *a > CXYWH_OFFSET => Ok(OutputLayout::V8 {
                nc: a - CXYWH_OFFSET,
            }),
            [1, a, b] if a >= b && *b > CXYWH_OFFSET + 1 => Ok(OutputLayout::V5 {
                nc: b - CXYWH_OFFSET - 1,
            }),
            _ => Err(DetectError::Inference(format!(
                "unexpected output shape {:?}",
                dims
            ))),
        }
    }

    pub fn nc(&self) -> usize {
        match self {
            OutputLayout::V5 { nc } | OutputLayout::V8 { nc } => *nc,
        }
    }
}

/// Decode raw head output into boxes in original-frame pixels.
///
/// `ratio` is the letterbox scale; the image sits at the top-left of the
/// input, so no pad offset applies.
pub fn decode(
    raw: &[f32],
    dims: &[usize],
    conf: f32,
    ratio: f32,
) -> Result<(OutputLayout, Vec<Bbox>), DetectError> {
    let layout = OutputLayout::infer(dims)?;
    let view = ArrayView2::from_shape((dims[1], dims[2]), raw)
        .map_err(|e| DetectError::Inference(e.to_string()))?;
    // one row per anchor
    let rows = match layout {
        OutputLayout::V8 { .. } => view.reversed_axes(),
        OutputLayout::V5 { .. } => view,
    };

    let mut boxes = Vec::new();
    for pred in rows.axis_iter(Axis(0)) {
        let (obj, clss) = match layout {
            OutputLayout::V8 { .. } => (1.0, pred.slice(s![CXYWH_OFFSET..])),
            OutputLayout::V5 { .. } => (pred[CXYWH_OFFSET], pred.slice(s![CXYWH_OFFSET + 1..])),
        };
        let Some((id, &score)) = clss
            .iter()
            .enumerate()
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            continue;
        };
        let confidence = obj * score;
        if confidence <= conf {
            continue;
        }
        boxes.push(Bbox::from_cxcywh(
            pred[0] / ratio,
            pred[1] / ratio,
            pred[2] / ratio,
            pred[3] / ratio,
            id,
            confidence,
        ));
    }
    Ok((layout, boxes))
}

/// Square letterbox: scaled frame at the top-left, grey padding elsewhere.
/// Returns CHW data and the scale ratio.
pub fn letterbox(frame: &RgbImage, size: u32) -> (Vec<f32>, f32) {
    let (w0, h0) = (frame.width() as f32, frame.height() as f32);
    let r = (size as f32 / w0).min(size as f32 / h0);
    let w_new = ((w0 * r).round() as u32).clamp(1, size);
    let h_new = ((h0 * r).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(frame, w_new, h_new, FilterType::Triangle);

    let plane = (size * size) as usize;
    let mut ys = vec![PAD_VALUE; 3 * plane];
    for (x, y, rgb) in resized.enumerate_pixels() {
        let i = (y * size + x) as usize;
        let [r, g, b] = rgb.0;
        ys[i] = r as f32 / 255.0;
        ys[plane + i] = g as f32 / 255.0;
        ys[2 * plane + i] = b as f32 / 255.0;
    }
    (ys, r)
}

pub struct YoloDetector {
    session: Session,
    input_size: u32,
    names: Vec<String>,
    tracked: Option<usize>,
    painter: BoxPainter,
}

impl YoloDetector {
    pub fn new(config: &AppConfig) -> Result<Self, DetectError> {
        let session = create_session(Path::new(&config.weights))?;
        info!(
            "✅ model {} loaded (input {}x{}, {} classes configured)",
            config.weights,
            config.input_size,
            config.input_size,
            config.class_names.len()
        );
        Ok(Self {
            session,
            input_size: config.input_size,
            names: config.class_names.clone(),
            tracked: config.tracked_class_id(),
            painter: BoxPainter::load(config.label_font.as_deref()),
        })
    }

    fn infer(&mut self, input: Vec<f32>) -> Result<(Vec<usize>, Vec<f32>), DetectError> {
        let size = self.input_size as usize;
        let tensor = Tensor::from_array((vec![1usize, 3, size, size], input.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| DetectError::Inference(format!("input tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output = outputs
            .get("output0")
            .or_else(|| outputs.get("output"))
            .ok_or_else(|| DetectError::Inference("missing output0 tensor".to_string()))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::Inference(format!("output tensor: {}", e)))?;

        let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((dims, data.to_vec()))
    }
}

impl Detector for YoloDetector {
    fn predict(
        &mut self,
        frame: &RgbImage,
        thresholds: Thresholds,
    ) -> Result<Prediction, DetectError> {
        check_frame(frame)?;

        let t_pre = Instant::now();
        let (input, ratio) = letterbox(frame, self.input_size);
        let t_run = Instant::now();
        let (dims, raw) = self.infer(input)?;
        let t_post = Instant::now();

        let (layout, mut boxes) = decode(&raw, &dims, thresholds.conf(), ratio)?;
        if layout.nc() != self.names.len() {
            debug!(
                "model reports {} classes, {} names configured",
                layout.nc(),
                self.names.len()
            );
        }
        non_max_suppression(&mut boxes, thresholds.iou());
        boxes.truncate(MAX_DET);
        let (w, h) = (frame.width() as f32, frame.height() as f32);
        let boxes: Vec<Bbox> = boxes.iter().map(|b| b.clamp_to(w, h)).collect();

        let mut annotated = frame.clone();
        self.painter.draw(&mut annotated, &boxes, &self.names);
        let points = contact_points(&boxes, self.tracked);

        debug!(
            "predict: pre {:?} | infer {:?} | post {:?} | {} boxes, {} points",
            t_run - t_pre,
            t_post - t_run,
            t_post.elapsed(),
            boxes.len(),
            points.len()
        );
        Ok(Prediction { annotated, points })
    }
}

fn create_session(model_path: &Path) -> Result<Session, DetectError> {
    let load_err = |reason: String| DetectError::ModelLoad {
        path: model_path.display().to_string(),
        reason,
    };
    if !model_path.is_file() {
        return Err(load_err("file not found".to_string()));
    }

    Session::builder()
        .map_err(|e| load_err(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_err(e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| load_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_layout() {
        assert_eq!(
            OutputLayout::infer(&[1, 5, 8400]).unwrap(),
            OutputLayout::V8 { nc: 1 }
        );
        assert_eq!(
            OutputLayout::infer(&[1, 25200, 6]).unwrap(),
            OutputLayout::V5 { nc: 1 }
        );
        assert!(OutputLayout::infer(&[2, 3]).is_err());
    }

    #[test]
    fn test_decode_v8_columns() {
        // 2 classes, 8 anchors, channel-major; anchors 3.. score zero
        let (channels, anchors) = (6, 8);
        let mut raw = vec![0.0f32; channels * anchors];
        let columns = [
            [100., 100., 20., 20., 0.9, 0.05],
            [10., 10., 4., 4., 0.1, 0.8],
            [50., 50., 8., 8., 0.2, 0.1],
        ];
        for (i, col) in columns.iter().enumerate() {
            for (c, v) in col.iter().enumerate() {
                raw[c * anchors + i] = *v;
            }
        }
        let dims = [1, channels, anchors];
        let (layout, boxes) = decode(&raw, &dims, 0.25, 2.0).unwrap();
        assert_eq!(layout, OutputLayout::V8 { nc: 2 });
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].id(), 0);
        assert_eq!(boxes[0].cxcy(), (50., 50.));
        assert_eq!(boxes[1].id(), 1);
        assert_eq!(boxes[1].width(), 2.);
    }

    #[test]
    fn test_decode_v5_objectness() {
        // 1 class, rows: cx cy w h obj cls
        let dims = [1, 7, 6];
        let mut raw = vec![0.0f32; 7 * 6];
        raw[..6].copy_from_slice(&[30., 40., 10., 10., 0.9, 0.9]);
        raw[6..12].copy_from_slice(&[30., 40., 10., 10., 0.4, 0.9]);
        let (_, boxes) = decode(&raw, &dims, 0.5, 1.0).unwrap();
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].confidence() - 0.81).abs() < 1e-6);
        assert_eq!(boxes[0].cxcy(), (30., 40.));
    }

    #[test]
    fn test_letterbox_pads_bottom() {
        let frame = RgbImage::from_pixel(20, 10, image::Rgb([255, 0, 0]));
        let (data, r) = letterbox(&frame, 8);
        assert_eq!(r, 0.4);
        assert_eq!(data.len(), 3 * 64);
        assert!(data[0] > 0.99);
        // row 4 onwards is padding
        assert_eq!(data[4 * 8], PAD_VALUE);
    }
}
