// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! FFmpeg-backed video file and camera sources.
//!
//! Decoding runs on ez-ffmpeg's worker threads; [`DecodeFilter`] pushes RGB
//! frames into a bounded channel and `next_frame` pulls them on the tick.

use std::path::Path;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};
use image::RgbImage;
use tracing::{debug, info, warn};

use super::camera::{camera_format, camera_url, list_cameras};
use super::decode_filter::{DecodeFilter, Delivery};
use super::source::{Frame, FrameSource, OpenError, SourceKind, SourceSpec};

/// Longest wait for a decoded frame before the source counts as failed.
const READ_TIMEOUT: Duration = Duration::from_secs(5);
/// Longest wait for the decode threads to wind down on close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(3);
const VIDEO_QUEUE: usize = 8;
const CAMERA_QUEUE: usize = 2;
// 摄像头忙 (上一个句柄的 demux 线程仍在退出) 时重试
const CAMERA_OPEN_RETRIES: u32 = 3;
const CAMERA_RETRY_DELAY: Duration = Duration::from_millis(300);

pub struct FfmpegSource {
    kind: SourceKind,
    label: String,
    rx: Option<Receiver<RgbImage>>,
    // thread blocked in `FfmpegScheduler::wait` for the whole decode run
    worker: Option<JoinHandle<()>>,
    done: Receiver<()>,
    position: u64,
}

impl FfmpegSource {
    pub fn open_file(path: &Path) -> Result<Self, OpenError> {
        let spec = SourceSpec::Video(path.to_path_buf());
        if !path.is_file() {
            return Err(OpenError::unavailable(&spec, "file not found"));
        }
        let input = Input::new(path.to_string_lossy().to_string());
        Self::start(spec, input, Delivery::Blocking, VIDEO_QUEUE)
    }

    pub fn open_camera(index: u32) -> Result<Self, OpenError> {
        let spec = SourceSpec::Camera(index);
        let name = list_cameras()
            .into_iter()
            .find(|d| d.index == index)
            .map(|d| d.name);
        let url = camera_url(index, name.as_deref());
        info!("📷 camera {} → {} ({})", index, url, camera_format());

        let mut attempt = 1;
        loop {
            let input = Input::new(url.clone()).set_format(camera_format());
            match Self::start(spec.clone(), input, Delivery::DropWhenFull, CAMERA_QUEUE) {
                Ok(source) => return Ok(source),
                Err(e) if attempt < CAMERA_OPEN_RETRIES => {
                    warn!(
                        "⚠️ camera busy or unavailable, retrying in {:?} ({}/{}): {}",
                        CAMERA_RETRY_DELAY, attempt, CAMERA_OPEN_RETRIES, e
                    );
                    std::thread::sleep(CAMERA_RETRY_DELAY);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn start(
        spec: SourceSpec,
        input: Input,
        delivery: Delivery,
        queue: usize,
    ) -> Result<Self, OpenError> {
        let (tx, rx) = crossbeam_channel::bounded(queue);
        let filter = DecodeFilter::new(tx, delivery);

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs(["format=rgb24"].into())
            .output(out)
            .build()
            .map_err(|e| OpenError::unavailable(&spec, e.to_string()))?;
        let sch = ctx
            .start()
            .map_err(|e| OpenError::unavailable(&spec, e.to_string()))?;

        // wait() only joins the pipeline when it starts before the run ends,
        // so it is entered right away on its own thread
        let label = spec.to_string();
        let (done_tx, done) = crossbeam_channel::bounded(1);
        let worker = std::thread::Builder::new()
            .name(format!("decode-wait:{}", label))
            .spawn({
                let label = label.clone();
                move || {
                    match sch.wait() {
                        Ok(()) => debug!("{}: decode finished", label),
                        // the filter fails its send once the source is closed
                        Err(e) => debug!("{}: decode ended: {}", label, e),
                    }
                    let _ = done_tx.send(());
                }
            })
            .map_err(|e| OpenError::unavailable(&spec, e.to_string()))?;

        info!("✅ {} opened", spec);
        Ok(Self {
            kind: spec.kind(),
            label,
            rx: Some(rx),
            worker: Some(worker),
            done,
            position: 0,
        })
    }

    /// Whether the FFmpeg pipeline threads are still running.
    pub fn is_decoding(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl FrameSource for FfmpegSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let rx = self.rx.as_ref()?;
        match rx.recv_timeout(READ_TIMEOUT) {
            Ok(image) => {
                self.position += 1;
                Some(Frame::new(self.position, image))
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("{}: end of stream after {} frames", self.label, self.position);
                None
            }
            Err(RecvTimeoutError::Timeout) if !self.is_decoding() => {
                warn!("⚠️ {}: decoder exited without closing the stream", self.label);
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("⚠️ {}: no frame within {:?}", self.label, READ_TIMEOUT);
                None
            }
        }
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn is_open(&self) -> bool {
        self.rx.is_some()
    }

    /// Returns once the pipeline threads have finished, or after
    /// [`CLOSE_TIMEOUT`] when the input stops producing frames.
    fn close(&mut self) {
        // dropping the receiver makes the filter fail its next send
        if self.rx.take().is_none() {
            return;
        }
        let Some(worker) = self.worker.take() else {
            return;
        };
        match self.done.recv_timeout(CLOSE_TIMEOUT) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                debug!("{} closed", self.label);
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "⚠️ {}: decoder still running {:?} after close, detaching",
                    self.label, CLOSE_TIMEOUT
                );
            }
        }
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.close();
    }
}
