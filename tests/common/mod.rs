// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Test doubles for driving a `DetectionSession` without devices or models.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use contact_tracker::detection::{DetectError, Detector, Prediction, Thresholds};
use contact_tracker::input::{Frame, FrameSource, OpenError, SourceKind, SourceOpener, SourceSpec};
use contact_tracker::pipeline::{DetectionSession, Presenter, SessionOptions};
use contact_tracker::tracking::{DisplayRanges, TrackSeries};
use image::{Rgb, RgbImage};
use tempfile::TempDir;

/// Camera index the opener refuses.
pub const MISSING_CAMERA: u32 = 99;
pub const ANNOTATION_MARK: Rgb<u8> = Rgb([255, 255, 255]);

/// Shared counters observed by the tests.
#[derive(Clone, Default)]
pub struct Probe {
    pub live: Rc<Cell<usize>>,
    pub max_live: Rc<Cell<usize>>,
    pub opened: Rc<Cell<usize>>,
    pub reads: Rc<Cell<u64>>,
    pub predict_calls: Rc<Cell<usize>>,
    pub thresholds_seen: Rc<RefCell<Vec<Thresholds>>>,
    pub shown: Rc<RefCell<Vec<(u64, bool)>>>,
    pub series_updates: Rc<Cell<usize>>,
    pub clears: Rc<Cell<usize>>,
    pub errors: Rc<RefCell<Vec<String>>>,
}

/// Frame `i` carries `i` in the red channel of pixel (0, 0).
pub fn synthetic_frame(index: u64) -> RgbImage {
    let mut img = RgbImage::new(8, 8);
    img.put_pixel(0, 0, Rgb([index as u8, 0, 0]));
    img
}

pub struct SyntheticSource {
    kind: SourceKind,
    frames: u64,
    position: u64,
    open: bool,
    probe: Probe,
}

impl FrameSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.open || self.position >= self.frames {
            return None;
        }
        self.probe.reads.set(self.probe.reads.get() + 1);
        self.position += 1;
        Some(Frame::new(self.position, synthetic_frame(self.position)))
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.probe.live.set(self.probe.live.get() - 1);
        }
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens synthetic sources: videos and cameras yield `frames` frames, images one.
pub struct CountingOpener {
    pub frames: u64,
    pub probe: Probe,
}

impl SourceOpener for CountingOpener {
    fn open(&mut self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>, OpenError> {
        if *spec == SourceSpec::Camera(MISSING_CAMERA) {
            return Err(OpenError::unavailable(spec, "no such device"));
        }
        let live = self.probe.live.get() + 1;
        self.probe.live.set(live);
        self.probe.max_live.set(self.probe.max_live.get().max(live));
        self.probe.opened.set(self.probe.opened.get() + 1);

        let kind = spec.kind();
        let frames = if kind == SourceKind::Image { 1 } else { self.frames };
        Ok(Box::new(SyntheticSource {
            kind,
            frames,
            position: 0,
            open: true,
            probe: self.probe.clone(),
        }))
    }
}

/// Maps the frame number to a point and marks pixel (1, 1) as annotated.
pub struct ScriptedDetector {
    pub hits: HashMap<u8, (f32, f32)>,
    pub fail_on: HashSet<u8>,
    pub probe: Probe,
}

impl Detector for ScriptedDetector {
    fn predict(
        &mut self,
        frame: &RgbImage,
        thresholds: Thresholds,
    ) -> Result<Prediction, DetectError> {
        self.probe.predict_calls.set(self.probe.predict_calls.get() + 1);
        self.probe.thresholds_seen.borrow_mut().push(thresholds);

        let index = frame.get_pixel(0, 0)[0];
        if self.fail_on.contains(&index) {
            return Err(DetectError::Inference(format!("scripted failure on {}", index)));
        }
        let mut annotated = frame.clone();
        annotated.put_pixel(1, 1, ANNOTATION_MARK);
        Ok(Prediction {
            annotated,
            points: self.hits.get(&index).copied().into_iter().collect(),
        })
    }
}

/// Accepts the first `ok_writes` writes, then fails every write like a full disk.
pub struct FlakySink {
    pub ok_writes: usize,
    pub attempts: Rc<Cell<usize>>,
}

impl Write for FlakySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.attempts.get() + 1;
        self.attempts.set(n);
        if n > self.ok_writes {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct RecordingPresenter {
    pub probe: Probe,
}

impl Presenter for RecordingPresenter {
    fn show_frame(&mut self, frame: &Frame) {
        let annotated = *frame.image.get_pixel(1, 1) == ANNOTATION_MARK;
        self.probe.shown.borrow_mut().push((frame.index, annotated));
    }

    fn show_series(&mut self, _series: &TrackSeries, ranges: Option<&DisplayRanges>) {
        assert!(ranges.is_some());
        self.probe.series_updates.set(self.probe.series_updates.get() + 1);
    }

    fn clear(&mut self) {
        self.probe.clears.set(self.probe.clears.get() + 1);
    }

    fn notify_error(&mut self, message: &str) {
        self.probe.errors.borrow_mut().push(message.to_string());
    }
}

pub struct Harness {
    pub session: DetectionSession,
    pub probe: Probe,
    pub dir: TempDir,
}

impl Harness {
    pub fn record_dir(&self) -> PathBuf {
        self.dir.path().join("records")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.dir.path().join("results")
    }

    pub fn record_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.record_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn harness(frames: u64, hits: &[(u8, (f32, f32))]) -> Harness {
    harness_with(frames, hits, &[])
}

pub fn harness_with(frames: u64, hits: &[(u8, (f32, f32))], fail_on: &[u8]) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let probe = Probe::default();
    let options = SessionOptions {
        max_points: 1000,
        tick_interval: Duration::from_millis(30),
        debounce: Duration::from_millis(500),
        record_dir: dir.path().join("records"),
        results_dir: dir.path().join("results"),
        conf: 0.25,
        iou: 0.45,
    };
    let session = DetectionSession::new(
        Box::new(CountingOpener {
            frames,
            probe: probe.clone(),
        }),
        Box::new(ScriptedDetector {
            hits: hits.iter().copied().collect(),
            fail_on: fail_on.iter().copied().collect(),
            probe: probe.clone(),
        }),
        Box::new(RecordingPresenter {
            probe: probe.clone(),
        }),
        options,
    )
    .unwrap();
    Harness {
        session,
        probe,
        dir,
    }
}

/// Hits of the ten-frame scenario.
pub const SCENARIO_HITS: [(u8, (f32, f32)); 3] =
    [(3, (150.0, 200.0)), (5, (160.0, 205.0)), (8, (900.0, 210.0))];

pub fn video() -> SourceSpec {
    SourceSpec::Video(PathBuf::from("synthetic.mp4"))
}

pub fn image() -> SourceSpec {
    SourceSpec::Image(PathBuf::from("synthetic.png"))
}
