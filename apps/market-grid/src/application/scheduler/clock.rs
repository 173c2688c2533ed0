//! Refresh tick source.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval};

/// Refresh rate used when none is configured.
pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Display-refresh clock.
///
/// Ticks that fall behind are skipped rather than bursted, so a stalled
/// presentation context resumes at the normal cadence.
#[derive(Debug)]
pub struct FrameClock {
    interval: Interval,
    period: Duration,
}

impl FrameClock {
    /// Create a clock ticking `hz` times per second (0 is read as 1).
    #[must_use]
    pub fn new(hz: u32) -> Self {
        let period = Duration::from_secs(1) / hz.max(1);
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval, period }
    }

    /// Wait for the next refresh tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }

    /// Tick period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn period_matches_rate() {
        let clock = FrameClock::new(50);
        assert_eq!(clock.period(), Duration::from_millis(20));
    }

    #[tokio::test]
    async fn zero_rate_is_clamped() {
        assert_eq!(FrameClock::new(0).period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_advance_by_period() {
        let mut clock = FrameClock::new(10);
        let first = clock.tick().await;
        let second = clock.tick().await;
        assert_eq!(second - first, Duration::from_millis(100));
    }
}
