use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

/// Domain interface for facial landmark detection.
///
/// `Ok(None)` means no face in the frame, which is an ordinary outcome.
/// At most one face is reported per frame. Implementations may be stateful
/// (e.g., reusing the previous region of interest), hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame)
        -> Result<Option<FaceLandmarks>, Box<dyn std::error::Error>>;
}
