// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Render collaborator. The session hands it borrowed views after each step.

use tracing::{debug, error};

use crate::input::Frame;
use crate::tracking::{DisplayRanges, TrackSeries};

pub trait Presenter {
    /// The frame to display, annotated when detection ran on it.
    fn show_frame(&mut self, frame: &Frame);

    /// Called after the series gained a sample.
    fn show_series(&mut self, series: &TrackSeries, ranges: Option<&DisplayRanges>);

    /// Session stopped; drop the displayed frame.
    fn clear(&mut self);

    /// A user-facing error, e.g. a source that failed to open.
    fn notify_error(&mut self, message: &str) {
        error!("❌ {}", message);
    }
}

/// Logs at debug level and draws nothing.
#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn show_frame(&mut self, frame: &Frame) {
        debug!("frame {} ({}x{})", frame.index, frame.width(), frame.height());
    }

    fn show_series(&mut self, series: &TrackSeries, ranges: Option<&DisplayRanges>) {
        if let (Some(last), Some(r)) = (series.last(), ranges) {
            debug!(
                "series {} | last ({:.1}, {:.1}) @ {} | x {:?} y {:?} frames {:?}",
                series.len(),
                last.x,
                last.y,
                last.frame_index,
                r.x,
                r.y,
                r.frame
            );
        }
    }

    fn clear(&mut self) {}
}
