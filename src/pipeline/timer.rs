// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//! Tick schedule and one-shot debounce, both driven by caller-supplied `Instant`s.

use std::time::{Duration, Instant};

/// Fixed-interval tick schedule without backlog catch-up.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<Instant>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// First tick is due immediately.
    pub fn start(&mut self, now: Instant) {
        if self.next_due.is_none() {
            self.next_due = Some(now);
        }
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// True when a tick should run now; schedules the next one.
    ///
    /// A late caller gets one tick, not a burst: if the following slot is
    /// already in the past the schedule restarts from `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        let Some(next) = self.next_due else {
            return false;
        };
        if now < next {
            return false;
        }
        let following = next + self.interval;
        self.next_due = Some(if following <= now {
            now + self.interval
        } else {
            following
        });
        true
    }

    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|next| next.saturating_duration_since(now))
    }
}

/// One-shot delay that restarts on every `touch` and fires once with the latest value.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn touch(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, deadline)) if now >= *deadline => self.pending.take().map(|(v, _)| v),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, d)| *d)
    }
}
