use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::measurement::domain::eye_aspect_ratio::{eye_aspect_ratio, EyeIndices, EyeMeasurement};

/// Per-frame openness signal: the mean of both eyes' EAR.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameMetric {
    pub ear: f64,
    pub left: EyeMeasurement,
    pub right: EyeMeasurement,
}

/// Averages left and right EAR.
///
/// The average is taken unconditionally: an unmeasurable eye contributes 0.0
/// and drags the metric toward "closed".
pub fn average_ear(
    landmarks: &FaceLandmarks,
    left_eye: &EyeIndices,
    right_eye: &EyeIndices,
    frame_width: u32,
    frame_height: u32,
) -> FrameMetric {
    let left = eye_aspect_ratio(landmarks, left_eye, frame_width, frame_height);
    let right = eye_aspect_ratio(landmarks, right_eye, frame_width, frame_height);
    FrameMetric {
        ear: (left.ear + right.ear) / 2.0,
        left,
        right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::NormalizedLandmark;
    use approx::assert_relative_eq;

    const LEFT: EyeIndices = EyeIndices([0, 1, 2, 3, 4, 5]);
    const RIGHT: EyeIndices = EyeIndices([6, 7, 8, 9, 10, 11]);

    /// Rectangular eye in a 128x128 frame with the given lid gap (pixels)
    /// and 40px width, so EAR = gap / 40.
    fn box_eye(x0: f64, gap: f64) -> Vec<NormalizedLandmark> {
        let lm = |x: f64, y: f64| NormalizedLandmark::new(x / 128.0, y / 128.0);
        let top = 50.0 - gap / 2.0;
        let bottom = 50.0 + gap / 2.0;
        vec![
            lm(x0, 50.0),
            lm(x0 + 10.0, top),
            lm(x0 + 30.0, top),
            lm(x0 + 40.0, 50.0),
            lm(x0 + 30.0, bottom),
            lm(x0 + 10.0, bottom),
        ]
    }

    #[test]
    fn test_average_of_both_eyes() {
        let mut points = box_eye(5.0, 8.0);
        points.extend(box_eye(70.0, 16.0));
        let metric = average_ear(&FaceLandmarks::new(points), &LEFT, &RIGHT, 128, 128);
        assert_relative_eq!(metric.left.ear, 0.2, epsilon = 1e-12);
        assert_relative_eq!(metric.right.ear, 0.4, epsilon = 1e-12);
        assert_relative_eq!(metric.ear, 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_unmeasurable_eye_pulls_average_down() {
        // Right eye landmarks are absent entirely.
        let points = box_eye(5.0, 16.0);
        let metric = average_ear(&FaceLandmarks::new(points), &LEFT, &RIGHT, 128, 128);
        assert_relative_eq!(metric.left.ear, 0.4, epsilon = 1e-12);
        assert_eq!(metric.right, EyeMeasurement::UNMEASURABLE);
        assert_relative_eq!(metric.ear, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_both_unmeasurable_is_zero() {
        let metric = average_ear(&FaceLandmarks::default(), &LEFT, &RIGHT, 128, 128);
        assert_eq!(metric.ear, 0.0);
        assert!(metric.left.points.is_none());
        assert!(metric.right.points.is_none());
    }
}
