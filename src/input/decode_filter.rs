// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! FFmpeg frame filter: packed RGB24 frame → `RgbImage` → frame channel.

use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::RgbImage;
use tracing::{debug, warn};

/// How frames are handed to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Block the decoder until the consumer takes the frame (video files).
    Blocking,
    /// Drop the frame when the consumer is behind (live cameras).
    DropWhenFull,
}

/// Runs on the FFmpeg worker thread. Expects the graph to end in `format=rgb24`.
#[derive(Clone)]
pub struct DecodeFilter {
    tx: Sender<RgbImage>,
    delivery: Delivery,
    pub total_frames: usize,
    pub dropped_frames: usize,
    count: usize,
    last: Instant,
}

impl DecodeFilter {
    pub fn new(tx: Sender<RgbImage>, delivery: Delivery) -> Self {
        Self {
            tx,
            delivery,
            total_frames: 0,
            dropped_frames: 0,
            count: 0,
            last: Instant::now(),
        }
    }

    fn deliver(&mut self, image: RgbImage) -> Result<(), String> {
        match self.delivery {
            Delivery::Blocking => self
                .tx
                .send(image)
                .map_err(|_| "frame source closed".to_string()),
            Delivery::DropWhenFull => match self.tx.try_send(image) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    self.dropped_frames += 1;
                    Ok(())
                }
                Err(TrySendError::Disconnected(_)) => Err("frame source closed".to_string()),
            },
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        debug!("decode thread started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                return Ok(None);
            }

            let av = &*frame.as_ptr();
            let (w, h) = (av.width, av.height);
            let stride = av.linesize[0];
            if w <= 0 || h <= 0 || av.data[0].is_null() || stride < w * 3 {
                self.dropped_frames += 1;
                if self.total_frames <= 10 {
                    warn!(
                        "⚠️ dropped frame #{}: {}x{} stride {}",
                        self.total_frames, w, h, stride
                    );
                }
                return Ok(None);
            }

            let (w, h, stride) = (w as usize, h as usize, stride as usize);
            let mut pixels = Vec::with_capacity(w * h * 3);
            for row in 0..h {
                let line = std::slice::from_raw_parts(av.data[0].add(row * stride), w * 3);
                pixels.extend_from_slice(line);
            }
            RgbImage::from_raw(w as u32, h as u32, pixels)
        };

        let Some(image) = image else {
            self.dropped_frames += 1;
            return Ok(None);
        };

        self.count += 1;
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed >= 5.0 {
            debug!(
                "📺 decode: {:.1} fps | total {} | dropped {}",
                self.count as f64 / elapsed,
                self.total_frames,
                self.dropped_frames
            );
            self.count = 0;
            self.last = Instant::now();
        }

        self.deliver(image)?;
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        debug!(
            "decode thread exited ({} frames, {} dropped)",
            self.total_frames, self.dropped_frames
        );
    }
}
