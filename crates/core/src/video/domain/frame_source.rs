use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Fatal acquisition failures. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("failed to open capture source {location}: {reason}")]
    Open { location: String, reason: String },
    #[error("failed to read frame {index}: {reason}")]
    Read { index: usize, reason: String },
    #[error("capture device {0} stopped producing frames")]
    Disconnected(String),
    #[error("capture source is not open")]
    NotOpen,
}

/// A camera, capture device or video file delivering frames in order.
///
/// `read` returns `Ok(None)` only when a finite source is exhausted.
/// `release` must be safe to call more than once.
pub trait FrameSource: Send {
    fn open(&mut self) -> Result<StreamMetadata, CaptureError>;

    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;

    fn release(&mut self);
}
