use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::shared::constants::DEFAULT_TIME_STEP;
use crate::shared::stream_metadata::StreamMetadata;

/// Supplies the time credited to each processed frame.
pub trait FrameClock: Send {
    fn tick(&mut self) -> Duration;
}

/// Credits the same nominal step to every frame regardless of real timing.
pub struct FixedStepClock {
    step: Duration,
}

impl FixedStepClock {
    pub fn new(step: Duration) -> Self {
        Self { step }
    }
}

impl Default for FixedStepClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

impl FrameClock for FixedStepClock {
    fn tick(&mut self) -> Duration {
        self.step
    }
}

/// Credits the wall time elapsed since the previous tick.
///
/// The first tick has no predecessor and returns zero.
#[derive(Default)]
pub struct WallClock {
    last: Option<Instant>,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameClock for WallClock {
    fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = self
            .last
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or(Duration::ZERO);
        self.last = Some(now);
        elapsed
    }
}

/// Configured time-step policy, resolved into a clock once the source is open.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeStep {
    Fixed { seconds: f64 },
    WallClock,
    /// One frame period of the source (`1 / fps`).
    SourceRate,
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep::Fixed {
            seconds: DEFAULT_TIME_STEP.as_secs_f64(),
        }
    }
}

impl TimeStep {
    pub fn clock_for(&self, metadata: &StreamMetadata) -> Box<dyn FrameClock> {
        match *self {
            TimeStep::Fixed { seconds } => Box::new(FixedStepClock::new(step_or_default(seconds))),
            TimeStep::WallClock => Box::new(WallClock::new()),
            TimeStep::SourceRate => {
                let step = match metadata.frame_rate() {
                    Some(fps) => step_or_default(1.0 / fps),
                    None => {
                        log::warn!(
                            "Source {} reports no frame rate; using {:?} per frame",
                            metadata.source,
                            DEFAULT_TIME_STEP
                        );
                        DEFAULT_TIME_STEP
                    }
                };
                Box::new(FixedStepClock::new(step))
            }
        }
    }
}

fn step_or_default(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).unwrap_or(DEFAULT_TIME_STEP)
    } else {
        DEFAULT_TIME_STEP
    }
}
