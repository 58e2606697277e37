/// Describes an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
    /// Nominal frame rate; 0.0 when the source does not report one.
    pub fps: f64,
    /// Human-readable source description (device or file path).
    pub source: String,
}

impl StreamMetadata {
    /// Frame rate if the source reported a usable one.
    pub fn frame_rate(&self) -> Option<f64> {
        (self.fps.is_finite() && self.fps > 0.0).then_some(self.fps)
    }
}
