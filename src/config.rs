// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Application configuration, adjusted through a JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "tracker_config.json";

/// Tracker parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    // === model ===
    pub weights: String,          // ONNX weights path
    pub class_names: Vec<String>, // class id -> name
    pub tracked_class: String,    // class whose centre is tracked
    pub input_size: u32,          // square network input

    // === detection ===
    pub conf_thres: f32, // confidence threshold
    pub iou_thres: f32,  // NMS IoU threshold

    // === pipeline ===
    pub max_points: usize,     // TrackSeries capacity
    pub tick_interval_ms: u64, // frame cadence for video / camera
    pub debounce_ms: u64,      // delay before a threshold change is logged

    // === output ===
    pub record_dir: PathBuf,
    pub results_dir: PathBuf,
    pub log_dir: PathBuf,

    // === logging ===
    pub console_level: String,
    pub file_level: String,
    pub panel_level: String,

    /// TTF/OTF font used for box labels; boxes are drawn without labels when unset.
    pub label_font: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            weights: "weights/best.onnx".to_string(),
            class_names: vec!["contact point".to_string()],
            tracked_class: "contact point".to_string(),
            input_size: 640,

            conf_thres: 0.25,
            iou_thres: 0.45,

            max_points: 1000,
            tick_interval_ms: 30,
            debounce_ms: 500,

            record_dir: PathBuf::from("."),
            results_dir: PathBuf::from("results"),
            log_dir: PathBuf::from("logs"),

            console_level: "info".to_string(),
            file_level: "debug".to_string(),
            panel_level: "info".to_string(),

            label_font: None,
        }
    }
}

impl AppConfig {
    /// Load the configuration from a JSON file.
    ///
    /// A missing file is created with the defaults; a file that fails to parse
    /// is left untouched and the defaults are used instead.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Self>(&json) {
                Ok(config) => {
                    info!("✅ config loaded from {}", path.display());
                    config.sanitized()
                }
                Err(e) => {
                    warn!("⚠️ failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 {} not found, writing defaults", path.display());
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ failed to save config: {:#}", e);
                }
                config
            }
        }
    }

    /// Save the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("💾 config saved to {}", path.display());
        Ok(())
    }

    /// Clamp values a hand-edited file may have pushed out of range.
    pub fn sanitized(mut self) -> Self {
        self.conf_thres = self.conf_thres.clamp(0.0, 1.0);
        self.iou_thres = self.iou_thres.clamp(0.0, 1.0);
        self.max_points = self.max_points.max(1);
        self.tick_interval_ms = self.tick_interval_ms.max(1);
        self.input_size = self.input_size.max(32);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Index of the tracked class in `class_names`, if present.
    pub fn tracked_class_id(&self) -> Option<usize> {
        self.class_names.iter().position(|n| *n == self.tracked_class)
    }

    /// Log the settings that matter when reading a session log.
    pub fn print_summary(&self) {
        info!("🎛️ current configuration:");
        info!("  weights: {}", self.weights);
        info!("  tracked class: {:?}", self.tracked_class);
        info!("  conf: {:.2} | iou: {:.2}", self.conf_thres, self.iou_thres);
        info!(
            "  max points: {} | tick: {} ms | debounce: {} ms",
            self.max_points, self.tick_interval_ms, self.debounce_ms
        );
        info!("  records: {}", self.record_dir.display());
    }
}
