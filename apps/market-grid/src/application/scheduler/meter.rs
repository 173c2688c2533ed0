//! Frames-per-second measurement.

use std::time::Duration;

use tokio::time::Instant;

/// Counts drawn frames and publishes a rate once per elapsed second.
#[derive(Debug)]
pub struct FrameRateMeter {
    window_start: Option<Instant>,
    frames: u32,
    fps: u32,
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateMeter {
    /// Create a meter with no measurement yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window_start: None,
            frames: 0,
            fps: 0,
        }
    }

    /// Count one frame drawn at `now`.
    ///
    /// Returns the new rate when a full second has elapsed since the
    /// current measurement window opened.
    pub fn record_frame(&mut self, now: Instant) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames = self.frames.saturating_add(1);

        let elapsed = now.saturating_duration_since(start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }

        let rate = f64::from(self.frames) / elapsed.as_secs_f64();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let fps = rate.round() as u32;
        self.fps = fps;
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }

    /// Last published rate.
    #[must_use]
    pub const fn fps(&self) -> u32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_after_one_second() {
        let start = Instant::now();
        let mut meter = FrameRateMeter::new();

        assert_eq!(meter.record_frame(start), None);
        for i in 1..60u64 {
            assert_eq!(meter.record_frame(start + Duration::from_millis(i * 16)), None);
        }
        let published = meter.record_frame(start + Duration::from_secs(1));

        assert_eq!(published, Some(61));
        assert_eq!(meter.fps(), 61);
    }

    #[test]
    fn starts_at_zero() {
        assert_eq!(FrameRateMeter::new().fps(), 0);
    }
}
