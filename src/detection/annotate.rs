// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测框绘制: boxes + optional labels on the frame

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use super::types::Bbox;

const PALETTE: [(u8, u8, u8); 8] = [
    (0, 160, 100), // 绿色 (contact point)
    (255, 0, 0),   // 红色
    (0, 0, 255),   // 蓝色
    (255, 255, 0), // 黄色
    (255, 0, 255), // 品红
    (0, 255, 255), // 青色
    (255, 128, 0), // 橙色
    (128, 0, 255), // 紫色
];

const LABEL_SCALE: f32 = 16.0;

pub struct BoxPainter {
    font: Option<FontVec>,
    thickness: i32,
}

impl Default for BoxPainter {
    fn default() -> Self {
        Self {
            font: None,
            thickness: 2,
        }
    }
}

impl BoxPainter {
    /// Boxes only when `font` is `None` or cannot be read.
    pub fn load(font: Option<&Path>) -> Self {
        let font = font.and_then(|path| {
            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("⚠️ label font {} unreadable: {}", path.display(), e);
                    return None;
                }
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    debug!("label font {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ label font {} invalid: {}", path.display(), e);
                    None
                }
            }
        });
        Self {
            font,
            ..Default::default()
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn color(id: usize) -> Rgb<u8> {
        let (r, g, b) = PALETTE[id % PALETTE.len()];
        Rgb([r, g, b])
    }

    /// Draw every box; `names[id]` with the confidence goes above it when a font is loaded.
    pub fn draw(&self, img: &mut RgbImage, boxes: &[Bbox], names: &[String]) {
        let (w, h) = (img.width() as f32, img.height() as f32);
        for bbox in boxes {
            let b = bbox.clamp_to(w, h);
            if b.width() < 1. || b.height() < 1. {
                continue;
            }
            let color = Self::color(b.id());
            for offset in 0..self.thickness {
                let rect = Rect::at(b.xmin() as i32 + offset, b.ymin() as i32 + offset).of_size(
                    (b.width() as i32 - 2 * offset).max(1) as u32,
                    (b.height() as i32 - 2 * offset).max(1) as u32,
                );
                draw_hollow_rect_mut(img, rect, color);
            }

            let Some(font) = &self.font else { continue };
            let name = names.get(b.id()).map(String::as_str).unwrap_or("unknown");
            let label = format!("{} {:.2}", name, b.confidence());
            let scale = PxScale::from(LABEL_SCALE);
            let (tw, th) = text_size(scale, font, &label);
            let x = b.xmin() as i32;
            let y = (b.ymin() as i32 - th as i32 - 2).max(0);
            draw_filled_rect_mut(img, Rect::at(x, y).of_size(tw + 4, th + 2), color);
            draw_text_mut(img, Rgb([255, 255, 255]), x + 2, y, scale, font, &label);
        }
    }
}
