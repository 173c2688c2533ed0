//! Tracing Frame Sink
//!
//! Headless [`FrameSink`]: logs every frame at `trace` and a viewport
//! summary at `info` once every `summary_every` frames.

use crate::application::ports::{Frame, FrameSink};

/// Default number of frames between summaries (about 5s at 60 Hz).
pub const DEFAULT_SUMMARY_EVERY: u64 = 300;

/// Frame sink that writes to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingFrameSink {
    summary_every: u64,
    last_summary: Option<Summary>,
}

/// What the last summary reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Frame the summary was taken from.
    pub sequence: u64,
    /// Records in the displayed ordering.
    pub total_count: usize,
    /// Rows materialized.
    pub rows: usize,
    /// Symbol of the first visible row.
    pub top_symbol: Option<String>,
}

impl Default for TracingFrameSink {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_EVERY)
    }
}

impl TracingFrameSink {
    /// Create a sink that summarizes every `summary_every` frames (minimum 1).
    #[must_use]
    pub const fn new(summary_every: u64) -> Self {
        Self {
            summary_every: if summary_every == 0 { 1 } else { summary_every },
            last_summary: None,
        }
    }

    /// Most recent summary.
    #[must_use]
    pub const fn last_summary(&self) -> Option<&Summary> {
        self.last_summary.as_ref()
    }
}

impl FrameSink for TracingFrameSink {
    fn draw(&mut self, frame: &Frame) {
        tracing::trace!(
            sequence = frame.sequence,
            start = frame.window.start_index,
            end = ?frame.window.end_index,
            rows = frame.rows.len(),
            "Frame drawn"
        );

        if frame.sequence % self.summary_every != 0 {
            return;
        }

        let top = frame.rows.first();
        tracing::info!(
            sequence = frame.sequence,
            total = frame.total_count,
            rows = frame.rows.len(),
            fps = frame.fps,
            top_symbol = top.map(|row| row.record.symbol.as_str()),
            top_change = top.map(|row| row.record.change),
            "Viewport"
        );

        self.last_summary = Some(Summary {
            sequence: frame.sequence,
            total_count: frame.total_count,
            rows: frame.rows.len(),
            top_symbol: top.map(|row| row.record.symbol.clone()),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::FrameRow;
    use crate::domain::record::{Record, Trend};
    use crate::domain::viewport::Window;

    fn frame(sequence: u64, symbols: &[&str]) -> Frame {
        let rows = symbols
            .iter()
            .enumerate()
            .map(|(index, symbol)| FrameRow {
                index,
                offset_top: 0.0,
                trend: Trend::Up,
                heat: 0.5,
                record: Record {
                    id: format!("r-{index}"),
                    symbol: (*symbol).to_string(),
                    category: "Technology".to_string(),
                    price: 10.0,
                    volume: 1,
                    change: 1.2,
                    timestamp: 0,
                },
            })
            .collect::<Vec<_>>();
        Frame {
            sequence,
            window: Window::empty(),
            total_count: rows.len(),
            rows,
            fps: 60,
        }
    }

    #[test]
    fn summarizes_on_interval() {
        let mut sink = TracingFrameSink::new(3);

        sink.draw(&frame(1, &["AAPL"]));
        sink.draw(&frame(2, &["AAPL"]));
        assert!(sink.last_summary().is_none());

        sink.draw(&frame(3, &["NVDA", "AAPL"]));
        let summary = sink.last_summary().unwrap();
        assert_eq!(summary.sequence, 3);
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.top_symbol.as_deref(), Some("NVDA"));
    }

    #[test]
    fn empty_frame_summary() {
        let mut sink = TracingFrameSink::new(0);
        sink.draw(&frame(7, &[]));

        let summary = sink.last_summary().unwrap();
        assert_eq!(summary.total_count, 0);
        assert!(summary.top_symbol.is_none());
    }
}
