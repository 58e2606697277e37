//! Eye-closure accumulator and alarm state machine.
//!
//! The tracker itself is immutable configuration. The evolving
//! [`TrackerState`] is owned by the caller and threaded through
//! [`DrowsinessTracker::update`] once per processed frame.
//!
//! A frame without a detected face resets the accumulator exactly like an
//! open-eyes frame. A drowsy episode interrupted by a single missed detection
//! therefore starts over.

use std::time::Duration;

use crate::shared::constants::{DEFAULT_ALARM_THRESHOLD_SECONDS, DEFAULT_EAR_THRESHOLD};

/// Marker color used by the annotator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HighlightColor {
    #[default]
    Normal,
    Alert,
}

impl HighlightColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            HighlightColor::Normal => [0, 255, 0],
            HighlightColor::Alert => [255, 0, 0],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub closed_duration: Duration,
    pub alarm_active: bool,
    pub highlight: HighlightColor,
}

impl TrackerState {
    pub fn closed_seconds(&self) -> f64 {
        self.closed_duration.as_secs_f64()
    }
}

/// What the pipeline saw in one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameObservation {
    Face { ear: f64 },
    NoFace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmTransition {
    Raised,
    Cleared,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerUpdate {
    pub state: TrackerState,
    pub transition: Option<AlarmTransition>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    pub ear_threshold: f64,
    pub alarm_threshold: Duration,
}

impl TrackerConfig {
    /// Builds a config from seconds, as exposed in settings and on the CLI.
    ///
    /// Negative and NaN alarm thresholds clamp to zero; values too large
    /// for a `Duration` saturate.
    pub fn new(ear_threshold: f64, alarm_threshold_seconds: f64) -> Self {
        let alarm_threshold = if alarm_threshold_seconds.is_nan() || alarm_threshold_seconds <= 0.0
        {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(alarm_threshold_seconds).unwrap_or(Duration::MAX)
        };
        Self {
            ear_threshold,
            alarm_threshold,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_EAR_THRESHOLD, DEFAULT_ALARM_THRESHOLD_SECONDS)
    }
}

pub struct DrowsinessTracker {
    config: TrackerConfig,
}

impl DrowsinessTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Advances the state machine by one frame lasting `dt`.
    pub fn update(
        &self,
        state: TrackerState,
        observation: FrameObservation,
        dt: Duration,
    ) -> TrackerUpdate {
        let next = match observation {
            FrameObservation::Face { ear } if ear < self.config.ear_threshold => {
                let mut next = state;
                next.closed_duration = state.closed_duration.saturating_add(dt);
                if next.closed_duration >= self.config.alarm_threshold {
                    next.alarm_active = true;
                    next.highlight = HighlightColor::Alert;
                }
                next
            }
            _ => TrackerState::default(),
        };

        let transition = match (state.alarm_active, next.alarm_active) {
            (false, true) => Some(AlarmTransition::Raised),
            (true, false) => Some(AlarmTransition::Cleared),
            _ => None,
        };

        TrackerUpdate {
            state: next,
            transition,
        }
    }
}

impl Default for DrowsinessTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
