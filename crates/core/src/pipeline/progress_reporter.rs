use std::collections::BTreeMap;
use std::time::Instant;

use crate::shared::constants::KEY_PROCESS_FRAME;

/// Receiver for the string-keyed counters a pass publishes.
///
/// Decouples the segmentation pass from whatever displays progress (log
/// lines, a dashboard, nothing at all in tests).
pub trait ProgressReporter: Send {
    /// Set each counter to its current value.
    fn update(&mut self, counters: &[(&str, usize)]);

    /// Log a human-readable status message. Default: no-op.
    fn info(&mut self, _message: &str) {}

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Reporter that discards everything.
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {
    fn update(&mut self, _counters: &[(&str, usize)]) {}
}

/// Keeps the latest value of every counter and writes them through the
/// `log` facade.
pub struct LogProgressReporter {
    counters: BTreeMap<String, usize>,
    start_time: Instant,
}

impl LogProgressReporter {
    pub fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
            start_time: Instant::now(),
        }
    }

    pub fn counter(&self, key: &str) -> Option<usize> {
        self.counters.get(key).copied()
    }

    /// Returns the formatted summary, or `None` if nothing was reported.
    pub fn summary_string(&self) -> Option<String> {
        if self.counters.is_empty() {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!("Run summary ({elapsed:.1}s):")];
        for (key, value) in &self.counters {
            lines.push(format!("  {key:24} {value}"));
        }
        if let Some(frames) = self.counter(KEY_PROCESS_FRAME) {
            if frames > 0 && elapsed > 0.0 {
                lines.push(format!("  Throughput: {:.1} fps", frames as f64 / elapsed));
            }
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for LogProgressReporter {
    fn update(&mut self, counters: &[(&str, usize)]) {
        for &(key, value) in counters {
            self.counters.insert(key.to_string(), value);
        }
        let line = counters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("{line}");
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::{KEY_PROCESS_FRAGMENTS, KEY_TOTAL_COUNT};

    #[test]
    fn test_null_reporter_is_noop() {
        let mut reporter = NullProgressReporter;
        reporter.update(&[(KEY_PROCESS_FRAME, 100)]);
        reporter.info("hello");
        reporter.summary();
    }

    #[test]
    fn test_update_keeps_latest_value() {
        let mut reporter = LogProgressReporter::new();
        reporter.update(&[(KEY_PROCESS_FRAME, 100), (KEY_PROCESS_FRAGMENTS, 0)]);
        reporter.update(&[(KEY_PROCESS_FRAME, 200)]);

        assert_eq!(reporter.counter(KEY_PROCESS_FRAME), Some(200));
        assert_eq!(reporter.counter(KEY_PROCESS_FRAGMENTS), Some(0));
        assert_eq!(reporter.counter(KEY_TOTAL_COUNT), None);
    }

    #[test]
    fn test_summary_lists_counters() {
        let mut reporter = LogProgressReporter::new();
        reporter.update(&[(KEY_TOTAL_COUNT, 3), (KEY_PROCESS_FRAGMENTS, 2)]);

        let summary = reporter.summary_string().unwrap();
        assert!(summary.starts_with("Run summary"));
        assert!(summary.contains(KEY_TOTAL_COUNT));
        assert!(summary.contains(KEY_PROCESS_FRAGMENTS));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogProgressReporter::new().summary_string().is_none());
    }
}
