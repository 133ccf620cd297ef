// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Local camera addressing: DirectShow (Windows) / AVFoundation (macOS) / V4L2 (Linux).

use tracing::{info, warn};

/// A capture device reported by FFmpeg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub index: u32,
    pub name: String,
}

/// FFmpeg input format for local cameras on this platform.
pub fn camera_format() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "dshow"
    }
    #[cfg(target_os = "macos")]
    {
        "avfoundation"
    }
    #[cfg(target_os = "linux")]
    {
        "v4l2"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        "video4linux2"
    }
}

/// Input URL for camera `index`. DirectShow addresses devices by name, the others by index.
pub fn camera_url(index: u32, name: Option<&str>) -> String {
    #[cfg(target_os = "windows")]
    {
        match name {
            Some(name) => format!("video={}", name),
            None => format!("video={}", index),
        }
    }
    #[cfg(target_os = "linux")]
    {
        let _ = name;
        format!("/dev/video{}", index)
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = name;
        format!("{}", index)
    }
}

/// Enumerate capture devices; empty when FFmpeg cannot list them.
pub fn list_cameras() -> Vec<CameraDevice> {
    match ez_ffmpeg::device::get_input_video_devices() {
        Ok(devices) => {
            info!("🔍 found {} video device(s)", devices.len());
            devices
                .into_iter()
                .enumerate()
                .map(|(index, name)| CameraDevice {
                    index: index as u32,
                    name,
                })
                .collect()
        }
        Err(e) => {
            warn!("⚠️ failed to list cameras: {}", e);
            Vec::new()
        }
    }
}
