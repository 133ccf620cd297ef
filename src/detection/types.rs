// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测数据结构
//! Detection data types shared by every detector backend

use image::RgbImage;
use thiserror::Error;

// ========== 阈值 ==========

#[derive(Debug, Error, PartialEq)]
#[error("{name} threshold {value} is outside [0, 1]")]
pub struct ThresholdError {
    pub name: &'static str,
    pub value: f32,
}

/// Confidence and IoU thresholds, validated to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    conf: f32,
    iou: f32,
}

impl Thresholds {
    pub fn new(conf: f32, iou: f32) -> Result<Self, ThresholdError> {
        check_unit("confidence", conf)?;
        check_unit("iou", iou)?;
        Ok(Self { conf, iou })
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    pub fn iou(&self) -> f32 {
        self.iou
    }
}

pub(crate) fn check_unit(name: &'static str, value: f32) -> Result<f32, ThresholdError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ThresholdError { name, value })
    }
}

// ========== 检测框 ==========

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    id: usize,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, id: usize, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            id,
            confidence,
        }
    }

    /// From centre/size, the layout YOLO heads emit.
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32, id: usize, confidence: f32) -> Self {
        Self::new(cx - w / 2., cy - h / 2., w, h, id, confidence)
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn xmin(&self) -> f32 {
        self.xmin
    }

    pub fn ymin(&self) -> f32 {
        self.ymin
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn cxcy(&self) -> (f32, f32) {
        (self.xmin + self.width / 2., self.ymin + self.height / 2.)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            0.
        } else {
            self.intersection_area(another) / union
        }
    }

    /// Clip to an image of `w`×`h`.
    pub fn clamp_to(&self, w: f32, h: f32) -> Self {
        let x1 = self.xmin.clamp(0., w);
        let y1 = self.ymin.clamp(0., h);
        let x2 = self.xmax().clamp(0., w);
        let y2 = self.ymax().clamp(0., h);
        Self::new(x1, y1, x2 - x1, y2 - y1, self.id, self.confidence)
    }
}

/// Class-aware greedy NMS; survivors are left sorted by descending confidence.
pub fn non_max_suppression(xs: &mut Vec<Bbox>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if xs[prev_index].id() != xs[index].id() {
                continue;
            }
            if xs[prev_index].iou(&xs[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// Centres of the boxes of class `tracked`, walking the NMS ranking backwards:
/// the least confident box comes first.
pub fn contact_points(boxes: &[Bbox], tracked: Option<usize>) -> Vec<(f32, f32)> {
    let Some(tracked) = tracked else {
        return Vec::new();
    };
    let mut hits: Vec<&Bbox> = boxes.iter().filter(|b| b.id() == tracked).collect();
    hits.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    hits.into_iter().rev().map(Bbox::cxcy).collect()
}

// ========== 推理结果 ==========

/// Output of one `Detector::predict` call.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Input frame with boxes drawn; same dimensions as the input.
    pub annotated: RgbImage,
    /// Tracked-class centres in frame pixels. The pipeline uses the first.
    pub points: Vec<(f32, f32)>,
}

impl Prediction {
    pub fn first_point(&self) -> Option<(f32, f32)> {
        self.points.first().copied()
    }
}
