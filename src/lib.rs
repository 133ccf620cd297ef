// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // JSON configuration
pub mod detection; // detector contract, boxes, NMS, annotation
pub mod input; // frame sources (image / video / camera)
pub mod logging; // tracing sinks: console, file, panel
#[cfg(feature = "onnx")]
pub mod models; // ONNX YOLO backend
pub mod pipeline; // detection session state machine
pub mod recorder; // CSV coordinate recorder
pub mod tracking; // bounded coordinate series

pub use crate::config::AppConfig;
pub use crate::detection::{Bbox, DetectError, Detector, Prediction, Thresholds};
pub use crate::input::{Frame, FrameSource, MediaOpener, OpenError, SourceKind, SourceOpener, SourceSpec};
pub use crate::pipeline::{
    Control, DetectionSession, Phase, Presenter, SessionError, SessionOptions, TickOutcome,
};
pub use crate::recorder::{RecordError, Recorder};
pub use crate::tracking::{DisplayRanges, Sample, TrackSeries};

/// Local wall-clock timestamp used in generated file names, e.g. `20251015_142301`.
pub fn gen_time_string() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Create `dir/<stem>.<ext>`, or `<stem>_N.<ext>` with the first free `N`.
/// An existing file is never opened.
pub(crate) fn create_unique(
    dir: &std::path::Path,
    stem: &str,
    ext: &str,
) -> std::io::Result<(std::path::PathBuf, std::fs::File)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, n, ext)
        };
        let path = dir.join(name);
        match std::fs::OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}
