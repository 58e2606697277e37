use std::time::{Duration, Instant};

use thiserror::Error;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::measurement::domain::ear_aggregator::{average_ear, FrameMetric};
use crate::measurement::domain::eye_aspect_ratio::EyeIndices;
use crate::monitoring::domain::alarm_notifier::{AlarmNotifier, NullAlarmNotifier};
use crate::monitoring::domain::drowsiness_tracker::{
    AlarmTransition, DrowsinessTracker, FrameObservation, TrackerConfig, TrackerState,
};
use crate::monitoring::domain::frame_clock::TimeStep;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{CaptureError, FrameSource};
use crate::video::domain::render_sink::RenderSink;

use super::capture_session::CaptureSession;
use super::session_logger::{NullSessionLogger, SessionLogger};
use super::stop_signal::StopSignal;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
}

/// Why a session that did not fail came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped,
    EndOfStream,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames_processed: usize,
    /// Frames in which a face was detected.
    pub face_frames: usize,
    pub alarms_raised: usize,
    pub longest_closed: Duration,
    pub end: SessionEnd,
}

/// Tunables for one monitoring session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub tracker: TrackerConfig,
    pub left_eye: EyeIndices,
    pub right_eye: EyeIndices,
    pub time_step: TimeStep,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerConfig::default(),
            left_eye: EyeIndices::LEFT,
            right_eye: EyeIndices::RIGHT,
            time_step: TimeStep::default(),
        }
    }
}

/// Runs the capture → detect → measure → track → annotate → render loop.
///
/// Single-threaded: one iteration per frame, blocking only on capture. The
/// stop signal is polled once per iteration, after the frame is rendered.
pub struct MonitorSessionUseCase {
    source: Box<dyn FrameSource>,
    sinks: Vec<Box<dyn RenderSink>>,
    stop: Box<dyn StopSignal>,
    time_step: TimeStep,
    processor: FrameProcessor,
}

/// Per-frame work that does not touch the source or the sinks.
struct FrameProcessor {
    detector: Box<dyn LandmarkDetector>,
    annotator: Box<dyn FrameAnnotator>,
    tracker: DrowsinessTracker,
    left_eye: EyeIndices,
    right_eye: EyeIndices,
    notifier: Box<dyn AlarmNotifier>,
    logger: Box<dyn SessionLogger>,
}

impl MonitorSessionUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn LandmarkDetector>,
        annotator: Box<dyn FrameAnnotator>,
        sinks: Vec<Box<dyn RenderSink>>,
        stop: Box<dyn StopSignal>,
        config: SessionConfig,
    ) -> Self {
        Self {
            source,
            sinks,
            stop,
            time_step: config.time_step,
            processor: FrameProcessor {
                detector,
                annotator,
                tracker: DrowsinessTracker::new(config.tracker),
                left_eye: config.left_eye,
                right_eye: config.right_eye,
                notifier: Box::new(NullAlarmNotifier),
                logger: Box::new(NullSessionLogger),
            },
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn AlarmNotifier>) -> Self {
        self.processor.notifier = notifier;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn SessionLogger>) -> Self {
        self.processor.logger = logger;
        self
    }

    /// Runs until the stop signal fires, a finite source ends, or capture
    /// fails. Sinks are closed and the source released on every path.
    pub fn execute(&mut self) -> Result<SessionSummary, SessionError> {
        let mut capture = CaptureSession::open(self.source.as_mut())?;
        let metadata = capture.metadata().clone();
        let logger = &mut self.processor.logger;
        logger.info(&format!(
            "Monitoring {} ({}x{})",
            metadata.source, metadata.width, metadata.height
        ));

        let mut sinks: Vec<&mut Box<dyn RenderSink>> = self
            .sinks
            .iter_mut()
            .filter_map(|sink| match sink.open(&metadata) {
                Ok(()) => Some(sink),
                Err(e) => {
                    log::warn!("Render sink disabled, failed to open: {e}");
                    None
                }
            })
            .collect();

        let mut clock = self.time_step.clock_for(&metadata);
        let mut state = TrackerState::default();
        let mut stats = SessionStats::default();

        let outcome = loop {
            let mut frame = match capture.source().read() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(SessionEnd::EndOfStream),
                Err(e) => break Err(e),
            };

            let dt = clock.tick();
            state = self.processor.process(&mut frame, state, dt, &mut stats);

            let t0 = Instant::now();
            for sink in sinks.iter_mut() {
                if let Err(e) = sink.render(&frame) {
                    log::warn!("Failed to render frame {}: {e}", frame.index());
                }
            }
            self.processor.logger.timing("render", elapsed_ms(t0));

            stats.frames_processed += 1;
            self.processor.logger.progress(stats.frames_processed);

            if self.stop.should_stop(stats.frames_processed) {
                break Ok(SessionEnd::Stopped);
            }
        };

        for sink in sinks.iter_mut() {
            if let Err(e) = sink.close() {
                log::warn!("Failed to close render sink: {e}");
            }
        }
        drop(capture);
        self.processor.logger.summary();

        match outcome {
            Ok(end) => Ok(stats.finish(end)),
            Err(e) => {
                log::error!(
                    "Capture failed after {} frames: {e}",
                    stats.frames_processed
                );
                Err(SessionError::Capture(e))
            }
        }
    }
}

#[derive(Default)]
struct SessionStats {
    frames_processed: usize,
    face_frames: usize,
    alarms_raised: usize,
    longest_closed: Duration,
}

impl SessionStats {
    fn finish(self, end: SessionEnd) -> SessionSummary {
        SessionSummary {
            frames_processed: self.frames_processed,
            face_frames: self.face_frames,
            alarms_raised: self.alarms_raised,
            longest_closed: self.longest_closed,
            end,
        }
    }
}

impl FrameProcessor {
    /// Detects, measures, tracks and annotates one frame in place.
    fn process(
        &mut self,
        frame: &mut Frame,
        state: TrackerState,
        dt: Duration,
        stats: &mut SessionStats,
    ) -> TrackerState {
        let t0 = Instant::now();
        let landmarks = match self.detector.detect(frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                log::warn!("Landmark detection failed on frame {}: {e}", frame.index());
                None
            }
        };
        self.logger.timing("detect", elapsed_ms(t0));

        let t0 = Instant::now();
        let metric: Option<FrameMetric> = landmarks.as_ref().map(|lm| {
            average_ear(
                lm,
                &self.left_eye,
                &self.right_eye,
                frame.width(),
                frame.height(),
            )
        });
        self.logger.timing("measure", elapsed_ms(t0));

        let observation = match metric {
            Some(m) => {
                stats.face_frames += 1;
                self.logger.metric("ear", m.ear);
                FrameObservation::Face { ear: m.ear }
            }
            None => FrameObservation::NoFace,
        };

        let update = self.tracker.update(state, observation, dt);
        match update.transition {
            Some(AlarmTransition::Raised) => {
                stats.alarms_raised += 1;
                self.notifier.alarm_raised(&update.state);
            }
            Some(AlarmTransition::Cleared) => self.notifier.alarm_cleared(&update.state),
            None => {}
        }
        stats.longest_closed = stats.longest_closed.max(update.state.closed_duration);
        self.logger
            .metric("closed_seconds", update.state.closed_seconds());

        let t0 = Instant::now();
        let overlay = Overlay {
            metric,
            state: update.state,
        };
        if let Err(e) = self.annotator.annotate(frame, &overlay) {
            log::warn!("Failed to annotate frame {}: {e}", frame.index());
        }
        self.logger.timing("annotate", elapsed_ms(t0));

        update.state
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
