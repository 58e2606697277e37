use crate::shared::stream_metadata::StreamMetadata;
use crate::video::domain::frame_source::{CaptureError, FrameSource};

/// Scoped acquisition of a frame source.
///
/// `release` is called exactly once, when the guard is dropped, no matter
/// how the session ends. A source that fails to open is never released.
pub struct CaptureSession<'a> {
    source: &'a mut dyn FrameSource,
    metadata: StreamMetadata,
}

impl<'a> CaptureSession<'a> {
    pub fn open(source: &'a mut dyn FrameSource) -> Result<Self, CaptureError> {
        let metadata = source.open()?;
        Ok(Self { source, metadata })
    }

    pub fn metadata(&self) -> &StreamMetadata {
        &self.metadata
    }

    pub fn source(&mut self) -> &mut dyn FrameSource {
        &mut *self.source
    }
}

impl Drop for CaptureSession<'_> {
    fn drop(&mut self) {
        self.source.release();
    }
}
