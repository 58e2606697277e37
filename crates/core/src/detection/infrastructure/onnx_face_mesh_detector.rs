//! Face-mesh landmark detector: BlazeFace box → square crop → 468 landmarks.
use std::path::Path;

use super::execution_provider::build_session;
use super::tensor::{sample_nchw, sigmoid, PixelRange, SampleRect};
use crate::detection::domain::face_detector::{best_face, FaceBox, FaceDetector};
use crate::detection::domain::face_landmarks::{FaceLandmarks, NormalizedLandmark};
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::constants::FACE_MESH_LANDMARK_COUNT;
use crate::shared::frame::Frame;

/// Face-mesh model input resolution.
const INPUT_SIZE: u32 = 192;

/// Crop side length relative to the larger side of the face box.
const ROI_SCALE: f64 = 1.5;

pub struct OnnxFaceMeshDetector {
    session: ort::session::Session,
    face_detector: Box<dyn FaceDetector>,
    presence_threshold: f64,
}

impl OnnxFaceMeshDetector {
    pub fn new(
        model_path: &Path,
        face_detector: Box<dyn FaceDetector>,
        presence_threshold: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        Ok(Self {
            session,
            face_detector,
            presence_threshold,
        })
    }
}

impl LandmarkDetector for OnnxFaceMeshDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<FaceLandmarks>, Box<dyn std::error::Error>> {
        let boxes = self.face_detector.detect(frame)?;
        let Some(face) = best_face(&boxes) else {
            return Ok(None);
        };
        let roi = square_roi(&face);

        let input_tensor = sample_nchw(frame, roi, INPUT_SIZE, PixelRange::Unit);
        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // Output order differs between conversions; tell the landmark and
        // presence tensors apart by size.
        let mut landmarks: Option<Vec<f32>> = None;
        let mut presence_logit: Option<f32> = None;
        for i in 0..outputs.len() {
            let array = outputs[i].try_extract_array::<f32>()?;
            if array.len() >= FACE_MESH_LANDMARK_COUNT * 3 {
                landmarks = Some(array.iter().copied().collect());
            } else if array.len() == 1 {
                presence_logit = array.iter().next().copied();
            }
        }
        let landmarks = landmarks.ok_or("face-mesh model produced no landmark tensor")?;

        if let Some(logit) = presence_logit {
            let presence = sigmoid(logit) as f64;
            if presence < self.presence_threshold {
                log::trace!("Face presence {presence:.3} below threshold");
                return Ok(None);
            }
        }

        Ok(Some(map_to_frame(
            &landmarks,
            roi,
            frame.width(),
            frame.height(),
        )))
    }
}

/// Square crop centred on the face box, enlarged to include brows and chin.
fn square_roi(face: &FaceBox) -> SampleRect {
    let (cx, cy) = face.center();
    let side = face.width().max(face.height()) * ROI_SCALE;
    SampleRect {
        x: cx - side / 2.0,
        y: cy - side / 2.0,
        width: side,
        height: side,
    }
}

/// Convert model-space `(x, y, z)` triples to frame-normalized landmarks.
fn map_to_frame(raw: &[f32], roi: SampleRect, frame_width: u32, frame_height: u32) -> FaceLandmarks {
    let size = INPUT_SIZE as f64;
    let fw = frame_width as f64;
    let fh = frame_height as f64;
    raw.chunks_exact(3)
        .take(FACE_MESH_LANDMARK_COUNT)
        .map(|p| {
            let x = roi.x + p[0] as f64 / size * roi.width;
            let y = roi.y + p[1] as f64 / size * roi.height;
            NormalizedLandmark::new(x / fw, y / fh)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn face(x1: f64, y1: f64, x2: f64, y2: f64) -> FaceBox {
        FaceBox {
            x1,
            y1,
            x2,
            y2,
            score: 0.9,
        }
    }

    #[test]
    fn test_square_roi_uses_larger_side() {
        let roi = square_roi(&face(100.0, 100.0, 200.0, 180.0));
        assert_relative_eq!(roi.width, 150.0);
        assert_relative_eq!(roi.height, 150.0);
        assert_relative_eq!(roi.x, 75.0);
        assert_relative_eq!(roi.y, 65.0);
    }

    #[test]
    fn test_square_roi_may_leave_frame() {
        let roi = square_roi(&face(0.0, 0.0, 40.0, 40.0));
        assert!(roi.x < 0.0);
        assert!(roi.y < 0.0);
    }

    #[test]
    fn test_map_to_frame_centre_and_corner() {
        let roi = SampleRect {
            x: 100.0,
            y: 50.0,
            width: 192.0,
            height: 192.0,
        };
        let raw = [96.0, 96.0, 0.0, 0.0, 0.0, 0.0];
        let lm = map_to_frame(&raw, roi, 400, 200);
        assert_eq!(lm.len(), 2);
        let centre = lm.get(0).unwrap();
        assert_relative_eq!(centre.x, 196.0 / 400.0);
        assert_relative_eq!(centre.y, 146.0 / 200.0);
        let corner = lm.get(1).unwrap();
        assert_relative_eq!(corner.x, 0.25);
        assert_relative_eq!(corner.y, 0.25);
    }

    #[test]
    fn test_map_to_frame_truncates_extra_values() {
        let raw = vec![0.0f32; (FACE_MESH_LANDMARK_COUNT + 10) * 3 + 2];
        let roi = SampleRect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        assert_eq!(map_to_frame(&raw, roi, 10, 10).len(), FACE_MESH_LANDMARK_COUNT);
    }

    #[test]
    fn test_landmarks_outside_frame_keep_out_of_range_values() {
        let roi = SampleRect {
            x: -96.0,
            y: 0.0,
            width: 192.0,
            height: 192.0,
        };
        let lm = map_to_frame(&[0.0, 0.0, 0.0], roi, 100, 100);
        let p = lm.get(0).unwrap();
        assert!(p.x < 0.0);
        assert!(p.denormalize(100, 100).is_none());
    }
}
