//! Time utilities for the simulation and HTTP surface

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Wall-clock length of one tick at `tick_rate` Hz
pub fn tick_duration(tick_rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)))
}

/// Measures one tick against its wall-clock budget
#[derive(Debug, Clone)]
pub struct TickTimer {
    start: Instant,
    budget: Duration,
}

impl TickTimer {
    pub fn start(budget: Duration) -> Self {
        Self {
            start: Instant::now(),
            budget,
        }
    }

    /// Time spent past the budget, if any
    pub fn overrun(&self) -> Option<Duration> {
        self.start.elapsed().checked_sub(self.budget).filter(|d| !d.is_zero())
    }
}
