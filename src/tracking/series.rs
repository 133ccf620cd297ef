// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Bounded coordinate series with hysteresis eviction and display windows.

/// Narrowest x window.
const X_MIN_SPAN: f32 = 200.0;
/// Widest x window.
const X_MAX_SPAN: f32 = 400.0;
/// Fixed y window.
const Y_SPAN: f32 = 100.0;
/// Frame axis gridline spacing.
const FRAME_GRID: u64 = 50;
const FRAME_LOOKBACK: u64 = 100;
const FRAME_LOOKAHEAD: u64 = 50;

/// One observation of the tracked point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub frame_index: u64,
    pub x: f32,
    pub y: f32,
}

impl Sample {
    pub fn new(frame_index: u64, x: f32, y: f32) -> Self {
        Self { frame_index, x, y }
    }
}

/// Axis windows for plotting the series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRanges {
    pub x: (f32, f32),
    pub y: (f32, f32),
    pub frame: (u64, u64),
}

/// Samples in insertion order, capped at `max_points`.
///
/// The series may grow to one and a half times its capacity before it is
/// cut back to the newest `max_points` samples, so truncation does not run
/// on every append.
#[derive(Debug, Clone)]
pub struct TrackSeries {
    samples: Vec<Sample>,
    max_points: usize,
}

impl Default for TrackSeries {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl TrackSeries {
    pub fn new(max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            samples: Vec::with_capacity(max_points + max_points / 2 + 1),
            max_points,
        }
    }

    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
        if self.samples.len() > self.high_water() {
            let excess = self.samples.len() - self.max_points;
            self.samples.drain(..excess);
        }
    }

    /// Largest length the series can reach.
    pub fn high_water(&self) -> usize {
        self.max_points + self.max_points / 2
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    fn bounds(&self, value: impl Fn(&Sample) -> f32) -> Option<(f32, f32)> {
        self.samples.iter().map(value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Centred 200-wide window for tight motion, centred 400-wide for wide
    /// motion, the raw extent in between.
    pub fn display_range_x(&self) -> Option<(f32, f32)> {
        let (min, max) = self.bounds(|s| s.x)?;
        let span = max - min;
        let center = (min + max) / 2.0;
        Some(if span < X_MIN_SPAN {
            (center - X_MIN_SPAN / 2.0, center + X_MIN_SPAN / 2.0)
        } else if span > X_MAX_SPAN {
            (center - X_MAX_SPAN / 2.0, center + X_MAX_SPAN / 2.0)
        } else {
            (min, max)
        })
    }

    pub fn display_range_y(&self) -> Option<(f32, f32)> {
        let (min, max) = self.bounds(|s| s.y)?;
        let center = (min + max) / 2.0;
        Some((center - Y_SPAN / 2.0, center + Y_SPAN / 2.0))
    }

    /// Window snapped to 50-frame gridlines, trailing the newest frame.
    pub fn display_range_frame_axis(&self) -> Option<(u64, u64)> {
        let max = self.samples.iter().map(|s| s.frame_index).max()?;
        let lo = (max / FRAME_GRID * FRAME_GRID).saturating_sub(FRAME_LOOKBACK);
        Some((lo, max + FRAME_LOOKAHEAD))
    }

    pub fn display_ranges(&self) -> Option<DisplayRanges> {
        Some(DisplayRanges {
            x: self.display_range_x()?,
            y: self.display_range_y()?,
            frame: self.display_range_frame_axis()?,
        })
    }
}
