use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative stop request, polled once per processed frame.
pub trait StopSignal: Send {
    /// `frames_processed` counts frames completed so far, including the
    /// one just rendered.
    fn should_stop(&mut self, frames_processed: usize) -> bool;
}

impl StopSignal for Arc<AtomicBool> {
    fn should_stop(&mut self, _frames_processed: usize) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Any message requests a stop; a disconnected sender is ignored.
impl StopSignal for crossbeam_channel::Receiver<()> {
    fn should_stop(&mut self, _frames_processed: usize) -> bool {
        self.try_recv().is_ok()
    }
}

/// Never stops; the session runs until the source ends or fails.
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&mut self, _frames_processed: usize) -> bool {
        false
    }
}

/// Stops once a fixed number of frames has been processed.
pub struct FrameLimit(pub usize);

impl StopSignal for FrameLimit {
    fn should_stop(&mut self, frames_processed: usize) -> bool {
        frames_processed >= self.0
    }
}

/// Stops as soon as any contained signal does. Every signal is polled on
/// each call so channel-based signals are drained.
pub struct AnyStop(pub Vec<Box<dyn StopSignal>>);

impl StopSignal for AnyStop {
    fn should_stop(&mut self, frames_processed: usize) -> bool {
        self.0
            .iter_mut()
            .fold(false, |stop, s| s.should_stop(frames_processed) | stop)
    }
}
