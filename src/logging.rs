// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Log sinks.
//!
//! Every component logs through `tracing`. [`init`] fans the event stream
//! out to independent subscribers, each with its own minimum level:
//! - console: `fmt` layer, level from config (`RUST_LOG` wins when set)
//! - file:    `logs/detect_<YYYYMMDD>.log`, appended, no ANSI colours
//! - panel:   optional [`PanelLayer`] that formats on the producing thread
//!   and hands the line to whichever thread owns the [`LogPanel`]

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Local;
use crossbeam_channel::{Receiver, Sender};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use crate::config::AppConfig;

const TIME_FORMAT: &str = "%H:%M:%S";

/// One formatted log record destined for a UI panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub text: String,
}

/// Producer half of the panel sink.
pub struct PanelLayer {
    tx: Sender<LogLine>,
}

/// Consumer half of the panel sink, owned by the UI thread.
pub struct LogPanel {
    rx: Receiver<LogLine>,
    lines: VecDeque<LogLine>,
    capacity: usize,
}

/// Create a connected panel sink keeping at most `capacity` lines.
pub fn panel(capacity: usize) -> (PanelLayer, LogPanel) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        PanelLayer { tx },
        LogPanel {
            rx,
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        },
    )
}

impl<S: Subscriber> Layer<S> for PanelLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let text = format!(
            "{} [{}] {}: {}",
            Local::now().format(TIME_FORMAT),
            meta.level(),
            meta.target(),
            visitor.finish()
        );
        // the panel may already be gone during shutdown
        let _ = self.tx.send(LogLine {
            level: *meta.level(),
            text,
        });
    }
}

impl LogPanel {
    /// Move every pending line into the panel buffer. Returns how many arrived.
    pub fn drain(&mut self) -> usize {
        let mut received = 0;
        while let Ok(line) = self.rx.try_recv() {
            if self.lines.len() == self.capacity {
                self.lines.pop_front();
            }
            self.lines.push_back(line);
            received += 1;
        }
        received
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Parse a level name, falling back to INFO.
pub fn parse_level(name: &str) -> LevelFilter {
    name.trim().parse().unwrap_or(LevelFilter::INFO)
}

/// Path of today's log file under `config.log_dir`.
pub fn log_file_path(config: &AppConfig) -> PathBuf {
    config
        .log_dir
        .join(Local::now().format("detect_%Y%m%d.log").to_string())
}

/// Install the global subscriber. Call once, before the session is built.
pub fn init(config: &AppConfig, panel: Option<PanelLayer>) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(&config.log_dir)?;
    let log_path = log_file_path(config);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.console_level));
    let console = fmt::layer()
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_target(true)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_writer(Mutex::new(file))
        .with_filter(parse_level(&config.file_level));

    let panel_layer = panel.map(|p| p.with_filter(parse_level(&config.panel_level)));

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(panel_layer)
        .try_init()?;

    Ok(log_path)
}
