// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! 接触点追踪 (Contact Point Tracker)
//!
//! 命令行驱动:
//! 1. 主线程:  DetectionSession 帧循环 (tick / debounce)
//! 2. 输入线程: stdin 控制命令 → channel → 主线程
//!
//! Commands: image <path> | video <path> | camera <i> | play | pause | toggle |
//! stop | detect | pause-detect | conf <f> | iou <f> | save | quit
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use contact_tracker::config::{AppConfig, DEFAULT_CONFIG_PATH};
use contact_tracker::input::{Frame, MediaOpener, SourceSpec};
use contact_tracker::logging;
use contact_tracker::models::YoloDetector;
use contact_tracker::pipeline::{
    Control, DetectionSession, Presenter, SessionOptions, TickOutcome,
};
use contact_tracker::tracking::{DisplayRanges, TrackSeries};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Longest sleep between control polls.
const IDLE_POLL: Duration = Duration::from_millis(20);

/// 接触点追踪参数
#[derive(Parser, Debug)]
#[command(author, version, about = "接触点追踪 - contact point tracker", long_about = None)]
struct Args {
    /// Image, video file or camera index to open at start
    source: Option<String>,

    /// JSON configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// ONNX weights (overrides the config)
    #[arg(short, long)]
    weights: Option<String>,

    /// Confidence threshold
    #[arg(long)]
    conf: Option<f32>,

    /// NMS IoU threshold
    #[arg(long)]
    iou: Option<f32>,

    /// Play the source without starting detection
    #[arg(long, default_value_t = false)]
    no_detect: bool,

    /// Save the last frame to the results directory on exit
    #[arg(long, default_value_t = false)]
    save: bool,
}

/// Logs frames and series progress instead of drawing them.
#[derive(Default)]
struct ConsolePresenter {
    frames: u64,
}

impl Presenter for ConsolePresenter {
    fn show_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        if self.frames % 100 == 0 {
            info!(
                "🎞 {} frames shown (last #{}, {}x{})",
                self.frames,
                frame.index,
                frame.width(),
                frame.height()
            );
        }
    }

    fn show_series(&mut self, series: &TrackSeries, ranges: Option<&DisplayRanges>) {
        let (Some(last), Some(r)) = (series.last(), ranges) else {
            return;
        };
        debug!(
            "📍 #{} ({:.1}, {:.1}) | {} samples | x {:.0}..{:.0} y {:.0}..{:.0} frames {}..{}",
            last.frame_index,
            last.x,
            last.y,
            series.len(),
            r.x.0,
            r.x.1,
            r.y.0,
            r.y.1,
            r.frame.0,
            r.frame.1
        );
    }

    fn clear(&mut self) {
        self.frames = 0;
    }

    fn notify_error(&mut self, message: &str) {
        error!("❌ {}", message);
    }
}

fn spawn_stdin_reader() -> Receiver<Control> {
    let (tx, rx) = crossbeam_channel::unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("⚠️ {}", e),
            }
        }
        debug!("stdin closed");
    });
    rx
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config);
    if let Some(weights) = args.weights {
        config.weights = weights;
    }
    if let Some(conf) = args.conf {
        config.conf_thres = conf;
    }
    if let Some(iou) = args.iou {
        config.iou_thres = iou;
    }
    let config = config.sanitized();

    let log_path = logging::init(&config, None)?;
    info!("🚀 contact tracker starting, log file {}", log_path.display());
    config.print_summary();

    let detector = YoloDetector::new(&config).context("loading detector")?;
    let mut session = DetectionSession::new(
        Box::new(MediaOpener),
        Box::new(detector),
        Box::new(ConsolePresenter::default()),
        SessionOptions::from(&config),
    )?;

    if let Some(source) = args.source.as_deref() {
        session.load(SourceSpec::parse(source))?;
        if !args.no_detect {
            session.start_detect()?;
        }
    }

    let controls = spawn_stdin_reader();
    let mut stdin_open = true;
    loop {
        let now = Instant::now();
        if let Some(TickOutcome::Exhausted) = session.run_due(now) {
            info!("📭 end of stream");
        }
        session.fire_debounced(now);

        // nothing left to do once input is gone and no source is ticking
        if !stdin_open && !session.is_ticking() {
            break;
        }

        let wait = session
            .next_tick_in(Instant::now())
            .map_or(IDLE_POLL, |d| d.min(IDLE_POLL));
        if !stdin_open {
            std::thread::sleep(wait);
            continue;
        }
        match controls.recv_timeout(wait) {
            Ok(control) => match session.apply(control) {
                Ok(ControlFlow::Break(())) => break,
                Ok(ControlFlow::Continue(())) => {}
                Err(e) => warn!("⚠️ {}", e),
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => stdin_open = false,
        }
    }

    if args.save {
        match session.save_result() {
            Ok(path) => info!("💾 saved {}", path.display()),
            Err(e) => warn!("⚠️ {}", e),
        }
    }
    session.stop();
    info!("👋 bye ({} samples tracked)", session.series().len());
    Ok(())
}
