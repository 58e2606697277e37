use crate::shared::frame::Frame;
use crate::shared::stream_metadata::StreamMetadata;

/// Destination for annotated frames: a window, an encoded file, a preview
/// image. Failures are reported but never stop the session.
pub trait RenderSink: Send {
    fn open(&mut self, metadata: &StreamMetadata) -> Result<(), Box<dyn std::error::Error>>;

    fn render(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
