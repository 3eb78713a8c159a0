//! Wall-clock deadline compared once per tick. The caller supplies `now`.

use tokio::time::{Duration, Instant};


#[derive(Debug, Clone)]
pub struct Timer {
    timer_active: bool,
    timeout_duration: Duration,
    start_time: Instant,
}

pub fn new(timeout_duration: Duration, now: Instant) -> Timer {
    Timer {
        timer_active: false,
        timeout_duration,
        start_time: now,
    }
}

impl Timer {
    pub fn timer_start(&mut self, now: Instant) {
        self.timer_active = true;
        self.start_time = now;
    }

    pub fn timer_stop(&mut self) {
        self.timer_active = false;
    }

    /// `true` once strictly more than the timeout has passed since the last start
    pub fn timer_timeouted(&self, now: Instant) -> bool {
        self.timer_active && now.saturating_duration_since(self.start_time) > self.timeout_duration
    }
}
