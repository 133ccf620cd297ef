// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 轨迹 (tracked contact-point coordinates over time)
pub mod series;

pub use series::{DisplayRanges, Sample, TrackSeries};
