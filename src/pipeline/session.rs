// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 检测会话 (DetectionSession)
//! 职责: tick → next frame → [detect] → first point → series → recorder → presenter
//!
//! Everything runs on the caller's thread. The caller drives time through
//! [`DetectionSession::run_due`] and [`DetectionSession::fire_debounced`].

use std::fs;
use std::io::{self, BufWriter, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::command::Control;
use super::presenter::Presenter;
use super::timer::{Debouncer, Ticker};
use crate::config::AppConfig;
use crate::detection::{Detector, ThresholdError, Thresholds};
use crate::input::{Frame, FrameSource, OpenError, SourceKind, SourceOpener, SourceSpec};
use crate::recorder::Recorder;
use crate::tracking::{Sample, TrackSeries};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("no source loaded")]
    NoSource,

    #[error(transparent)]
    ThresholdOutOfRange(#[from] ThresholdError),

    #[error("no frame to save")]
    NothingToSave,

    #[error("failed to save result: {0}")]
    Save(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Snapshot of the session flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionState {
    pub source_kind: Option<SourceKind>,
    pub is_playing: bool,
    pub is_detecting: bool,
    pub is_recording: bool,
    pub conf_thres: f32,
    pub iou_thres: f32,
}

/// Coarse session state derived from the flags.
///
/// The detect flag takes precedence over playback: a detecting session whose
/// playback is paused still reports `Detecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    Playing,
    Detecting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not ticking; nothing was read.
    Inactive,
    /// A frame was read and presented.
    Presented {
        frame_index: u64,
        sample: Option<Sample>,
    },
    /// The source ran dry and the session stopped.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdKind {
    Conf,
    Iou,
}

/// A threshold value that stayed unchanged for the debounce delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdChange {
    pub kind: ThresholdKind,
    pub value: f32,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub max_points: usize,
    pub tick_interval: Duration,
    pub debounce: Duration,
    pub record_dir: PathBuf,
    pub results_dir: PathBuf,
    pub conf: f32,
    pub iou: f32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_points: config.max_points,
            tick_interval: config.tick_interval(),
            debounce: config.debounce(),
            record_dir: config.record_dir.clone(),
            results_dir: config.results_dir.clone(),
            conf: config.conf_thres,
            iou: config.iou_thres,
        }
    }
}

pub struct DetectionSession {
    opener: Box<dyn SourceOpener>,
    detector: Box<dyn Detector>,
    presenter: Box<dyn Presenter>,

    source: Option<Box<dyn FrameSource>>,
    source_kind: Option<SourceKind>,
    recorder: Option<Recorder>,
    series: TrackSeries,

    is_playing: bool,
    is_detecting: bool,
    thresholds: Thresholds,

    ticker: Ticker,
    conf_debounce: Debouncer<f32>,
    iou_debounce: Debouncer<f32>,

    record_dir: PathBuf,
    results_dir: PathBuf,
    // raw frame of a loaded still image
    still: Option<RgbImage>,
    last_shown: Option<Frame>,
}

impl DetectionSession {
    pub fn new(
        opener: Box<dyn SourceOpener>,
        detector: Box<dyn Detector>,
        presenter: Box<dyn Presenter>,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let thresholds = Thresholds::new(options.conf, options.iou)?;
        Ok(Self {
            opener,
            detector,
            presenter,
            source: None,
            source_kind: None,
            recorder: None,
            series: TrackSeries::new(options.max_points),
            is_playing: false,
            is_detecting: false,
            thresholds,
            ticker: Ticker::new(options.tick_interval),
            conf_debounce: Debouncer::new(options.debounce),
            iou_debounce: Debouncer::new(options.debounce),
            record_dir: options.record_dir,
            results_dir: options.results_dir,
            still: None,
            last_shown: None,
        })
    }

    // ========== 查询 ==========

    pub fn state(&self) -> SessionState {
        SessionState {
            source_kind: self.source_kind,
            is_playing: self.is_playing,
            is_detecting: self.is_detecting,
            is_recording: self.recorder.is_some(),
            conf_thres: self.thresholds.conf(),
            iou_thres: self.thresholds.iou(),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.source.is_none() {
            Phase::Idle
        } else if self.is_detecting {
            Phase::Detecting
        } else if self.is_playing {
            Phase::Playing
        } else {
            Phase::Loaded
        }
    }

    pub fn series(&self) -> &TrackSeries {
        &self.series
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn is_ticking(&self) -> bool {
        self.is_playing && self.ticker.is_active()
    }

    pub fn recorder_path(&self) -> Option<&Path> {
        self.recorder.as_ref().map(Recorder::path)
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last_shown.as_ref()
    }

    // ========== 输入源 ==========

    /// Replace the current source. The old handle and recorder are closed
    /// and the series is cleared before the new source is opened.
    pub fn load(&mut self, spec: SourceSpec) -> Result<(), SessionError> {
        self.teardown();
        self.reset_flags();
        self.series.clear();
        self.last_shown = None;

        info!("📂 loading {}", spec);
        let mut source = match self.opener.open(&spec) {
            Ok(source) => source,
            Err(e) => {
                self.presenter.notify_error(&e.to_string());
                return Err(e.into());
            }
        };

        let kind = source.kind();
        if kind == SourceKind::Image {
            let Some(frame) = source.next_frame() else {
                source.close();
                let e = OpenError::unavailable(&spec, "no frame decoded");
                self.presenter.notify_error(&e.to_string());
                return Err(e.into());
            };
            self.still = Some(frame.image.clone());
            self.show(frame);
        }

        self.source = Some(source);
        self.source_kind = Some(kind);
        info!("✅ {} loaded", spec);
        if kind.is_ticking() {
            self.play();
        }
        Ok(())
    }

    pub fn play(&mut self) {
        if self.is_playing || !self.source_kind.is_some_and(SourceKind::is_ticking) {
            return;
        }
        self.is_playing = true;
        self.ticker.start(Instant::now());
        info!("▶️ play");
    }

    pub fn pause(&mut self) {
        if !self.is_playing {
            return;
        }
        self.is_playing = false;
        self.ticker.stop();
        info!("⏸ pause");
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Back to Idle. Thresholds, the series and the last shown frame survive.
    pub fn stop(&mut self) {
        let was_loaded = self.source.is_some();
        self.teardown();
        self.reset_flags();
        self.presenter.clear();
        if was_loaded {
            info!("⏹ stopped ({} samples kept)", self.series.len());
        }
    }

    // ========== 检测 ==========

    pub fn start_detect(&mut self) -> Result<(), SessionError> {
        let Some(kind) = self.source_kind else {
            return Err(SessionError::NoSource);
        };
        self.is_detecting = true;
        if self.recorder.is_none() {
            match Recorder::create(&self.record_dir) {
                Ok(recorder) => self.recorder = Some(recorder),
                Err(e) => warn!("⚠️ recording disabled: {}", e),
            }
        }
        info!("🔍 detection started");

        if kind == SourceKind::Image {
            if let Some(image) = &self.still {
                // single frame: shown annotated, never tracked
                match self.detector.predict(image, self.thresholds) {
                    Ok(prediction) => {
                        debug!("image: {} point(s) discarded", prediction.points.len());
                        self.show(Frame::new(1, prediction.annotated));
                    }
                    Err(e) => warn!("⚠️ image detection failed: {}", e),
                }
            }
        }
        Ok(())
    }

    /// Record into `recorder` instead of a new file under `record_dir`.
    /// Any current recorder is finished first.
    pub fn attach_recorder(&mut self, recorder: Recorder) -> Result<(), SessionError> {
        if self.source_kind.is_none() {
            return Err(SessionError::NoSource);
        }
        self.finish_recorder();
        info!("📝 recording to {}", recorder.path().display());
        self.recorder = Some(recorder);
        Ok(())
    }

    pub fn pause_detect(&mut self) {
        if self.is_detecting {
            self.is_detecting = false;
            info!("⏸ detection paused");
        }
    }

    // ========== 阈值 ==========

    pub fn set_conf(&mut self, value: f32) -> Result<(), SessionError> {
        self.thresholds = Thresholds::new(value, self.thresholds.iou())?;
        self.conf_debounce.touch(value, Instant::now());
        Ok(())
    }

    pub fn set_iou(&mut self, value: f32) -> Result<(), SessionError> {
        self.thresholds = Thresholds::new(self.thresholds.conf(), value)?;
        self.iou_debounce.touch(value, Instant::now());
        Ok(())
    }

    /// Log thresholds that have settled; each change is reported once.
    pub fn fire_debounced(&mut self, now: Instant) -> Vec<ThresholdChange> {
        let mut fired = Vec::new();
        if let Some(value) = self.conf_debounce.poll(now) {
            info!("🎚 confidence threshold {:.2}", value);
            fired.push(ThresholdChange {
                kind: ThresholdKind::Conf,
                value,
            });
        }
        if let Some(value) = self.iou_debounce.poll(now) {
            info!("🎚 IoU threshold {:.2}", value);
            fired.push(ThresholdChange {
                kind: ThresholdKind::Iou,
                value,
            });
        }
        fired
    }

    // ========== 帧循环 ==========

    pub fn run_due(&mut self, now: Instant) -> Option<TickOutcome> {
        if self.is_playing && self.ticker.due(now) {
            Some(self.on_tick())
        } else {
            None
        }
    }

    pub fn next_tick_in(&self, now: Instant) -> Option<Duration> {
        if self.is_playing {
            self.ticker.time_until_due(now)
        } else {
            None
        }
    }

    pub fn on_tick(&mut self) -> TickOutcome {
        if !self.is_ticking() {
            return TickOutcome::Inactive;
        }
        let Some(source) = self.source.as_mut() else {
            return TickOutcome::Inactive;
        };
        let Some(mut frame) = source.next_frame() else {
            info!("📭 source exhausted at frame {}", source.position());
            self.stop();
            return TickOutcome::Exhausted;
        };
        let frame_index = source.position();

        let mut sample = None;
        if self.is_detecting {
            match self.detector.predict(&frame.image, self.thresholds) {
                Ok(prediction) => {
                    sample = prediction
                        .first_point()
                        .map(|(x, y)| Sample::new(frame_index, x, y));
                    frame.image = prediction.annotated;
                }
                Err(e) => warn!("⚠️ frame {} skipped: {}", frame_index, e),
            }
        }

        if let Some(sample) = sample {
            self.track(sample);
        }
        self.show(frame);
        if sample.is_some() {
            let ranges = self.series.display_ranges();
            self.presenter.show_series(&self.series, ranges.as_ref());
        }
        TickOutcome::Presented {
            frame_index,
            sample,
        }
    }

    fn track(&mut self, sample: Sample) {
        self.series.append(sample);
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.append(&sample) {
                warn!("⚠️ {}", e);
            }
        }
    }

    fn show(&mut self, frame: Frame) {
        self.presenter.show_frame(&frame);
        self.last_shown = Some(frame);
    }

    // ========== 保存 ==========

    /// Write the last presented frame to `results_dir/result_<timestamp>.png`.
    pub fn save_result(&self) -> Result<PathBuf, SessionError> {
        let frame = self.last_shown.as_ref().ok_or(SessionError::NothingToSave)?;
        fs::create_dir_all(&self.results_dir)?;

        let stem = format!("result_{}", crate::gen_time_string());
        let (path, file) = crate::create_unique(&self.results_dir, &stem, "png")?;
        let mut out = BufWriter::new(file);
        frame.image.write_to(&mut out, ImageFormat::Png)?;
        out.flush()?;
        info!("💾 result saved to {}", path.display());
        Ok(path)
    }

    // ========== 控制 ==========

    /// Run one user control. `Break` asks the driver to quit.
    pub fn apply(&mut self, control: Control) -> Result<ControlFlow<()>, SessionError> {
        match control {
            Control::LoadImage(path) => self.load(SourceSpec::Image(path))?,
            Control::LoadVideo(path) => self.load(SourceSpec::Video(path))?,
            Control::OpenCamera(index) => self.load(SourceSpec::Camera(index))?,
            Control::Play => self.play(),
            Control::Pause => self.pause(),
            Control::TogglePlay => self.toggle_play(),
            Control::Stop => self.stop(),
            Control::StartDetect => self.start_detect()?,
            Control::PauseDetect => self.pause_detect(),
            Control::SetConf(v) => self.set_conf(v)?,
            Control::SetIou(v) => self.set_iou(v)?,
            Control::SaveResult => {
                self.save_result()?;
            }
            Control::Quit => {
                self.stop();
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    // ========== 资源释放 ==========

    fn teardown(&mut self) {
        self.ticker.stop();
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.finish_recorder();
    }

    fn finish_recorder(&mut self) {
        if let Some(recorder) = self.recorder.take() {
            match recorder.finish() {
                Ok(path) => info!("💾 coordinates saved to {}", path.display()),
                Err(e) => warn!("⚠️ {}", e),
            }
        }
    }

    fn reset_flags(&mut self) {
        self.source_kind = None;
        self.is_playing = false;
        self.is_detecting = false;
        self.still = None;
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
