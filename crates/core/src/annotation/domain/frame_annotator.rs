use crate::measurement::domain::ear_aggregator::FrameMetric;
use crate::monitoring::domain::drowsiness_tracker::TrackerState;
use crate::shared::frame::Frame;

/// Snapshot of everything the annotator may draw for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Overlay {
    /// `None` when no face was detected in this frame.
    pub metric: Option<FrameMetric>,
    pub state: TrackerState,
}

/// Draws diagnostics onto a frame.
///
/// Implementations modify the frame in place and never observe tracker state
/// beyond the given snapshot.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, overlay: &Overlay)
        -> Result<(), Box<dyn std::error::Error>>;
}
