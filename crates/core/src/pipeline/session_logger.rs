use std::collections::BTreeMap;
use std::time::Instant;

/// Cross-cutting logger for monitoring-session events.
///
/// Keeps the session loop independent of where diagnostics end up.
pub trait SessionLogger: Send {
    /// Report that `frames` frames have been processed so far.
    fn progress(&mut self, frames: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a per-frame metric such as `ear` or `closed_seconds`.
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn progress(&mut self, _frames: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Count, sum and extremes of a sample stream, without the samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl RunningStats {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

fn record(table: &mut BTreeMap<String, RunningStats>, name: &str, value: f64) {
    match table.get_mut(name) {
        Some(stats) => stats.add(value),
        None => {
            table.insert(name.to_string(), RunningStats::first(value));
        }
    }
}

/// Reports a monitoring session through `log`.
///
/// Timings and metrics are folded into one [`RunningStats`] per name as they
/// arrive, so a session that runs for hours holds the same state as one that
/// runs for seconds. Progress lines are throttled to one every
/// `throttle_frames` frames.
pub struct LogSessionLogger {
    throttle_frames: usize,
    stages: BTreeMap<String, RunningStats>,
    metrics: BTreeMap<String, RunningStats>,
    started: Instant,
    frames: usize,
}

impl LogSessionLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
            started: Instant::now(),
            frames: 0,
        }
    }

    pub fn stage_stats(&self, stage: &str) -> Option<RunningStats> {
        self.stages.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<RunningStats> {
        self.metrics.get(name).copied()
    }

    /// Number of distinct stage and metric names being tracked.
    pub fn tracked_names(&self) -> usize {
        self.stages.len() + self.metrics.len()
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.tracked_names() == 0 {
            return None;
        }

        let elapsed_s = self.started.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Session summary ({} frames, {elapsed_s:.1}s total):",
            self.frames
        )];

        for (stage, stats) in &self.stages {
            let share = if elapsed_s > 0.0 {
                stats.sum / (elapsed_s * 1000.0) * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  total {:7.0}ms  ({share:4.1}%)",
                stats.mean(),
                stats.sum
            ));
        }

        for (name, stats) in &self.metrics {
            lines.push(format!(
                "  {name}: avg {:.3}  min {:.3}  max {:.3}",
                stats.mean(),
                stats.min,
                stats.max
            ));
        }

        if self.frames > 0 && elapsed_s > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} fps",
                self.frames as f64 / elapsed_s
            ));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogSessionLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl SessionLogger for LogSessionLogger {
    fn progress(&mut self, frames: usize) {
        self.frames = frames;
        if frames % self.throttle_frames == 0 {
            log::info!("Processed {frames} frames");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.stages, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
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
