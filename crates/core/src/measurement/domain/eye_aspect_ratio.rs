//! Eye aspect ratio (EAR) for a single eye.
//!
//! With P1..P6 ordered as outer corner, two upper-lid points, inner corner and
//! two lower-lid points:
//!
//! ```text
//! EAR = (|P2 - P6| + |P3 - P5|) / (2 * |P1 - P4|)
//! ```
//!
//! Any measurement fault yields an EAR of exactly 0.0 with no points. Callers
//! treat that as "not measurable", which reads as closed, never as open.

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::measurement::domain::point::{distance, Point};
use crate::shared::constants::{LEFT_EYE_INDICES, RIGHT_EYE_INDICES};

/// Landmark indices of P1..P6 for one eye.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EyeIndices(pub [usize; 6]);

impl EyeIndices {
    pub const LEFT: EyeIndices = EyeIndices(LEFT_EYE_INDICES);
    pub const RIGHT: EyeIndices = EyeIndices(RIGHT_EYE_INDICES);

    pub fn as_array(&self) -> &[usize; 6] {
        &self.0
    }

    /// True when the same landmark is referenced twice.
    pub fn has_duplicates(&self) -> bool {
        let idx = &self.0;
        (0..idx.len()).any(|i| idx[i + 1..].contains(&idx[i]))
    }
}

/// EAR for one eye plus the pixel points it was computed from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyeMeasurement {
    pub ear: f64,
    /// `None` when the measurement degenerated.
    pub points: Option<[Point; 6]>,
}

impl EyeMeasurement {
    pub const UNMEASURABLE: EyeMeasurement = EyeMeasurement {
        ear: 0.0,
        points: None,
    };

    pub fn is_measurable(&self) -> bool {
        self.points.is_some()
    }
}

/// Computes the EAR of one eye from normalized landmarks.
pub fn eye_aspect_ratio(
    landmarks: &FaceLandmarks,
    eye: &EyeIndices,
    frame_width: u32,
    frame_height: u32,
) -> EyeMeasurement {
    let mut points = [Point::default(); 6];
    for (slot, &index) in points.iter_mut().zip(eye.as_array()) {
        let Some(point) = landmarks
            .get(index)
            .and_then(|lm| lm.denormalize(frame_width, frame_height))
        else {
            return EyeMeasurement::UNMEASURABLE;
        };
        *slot = point;
    }

    match ratio_from_points(&points) {
        Some(ear) => EyeMeasurement {
            ear,
            points: Some(points),
        },
        None => EyeMeasurement::UNMEASURABLE,
    }
}

fn ratio_from_points(p: &[Point; 6]) -> Option<f64> {
    let vertical = distance(p[1], p[5]) + distance(p[2], p[4]);
    let horizontal = distance(p[0], p[3]);
    if horizontal <= 0.0 {
        return None;
    }
    let ear = vertical / (2.0 * horizontal);
    ear.is_finite().then_some(ear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::face_landmarks::NormalizedLandmark;
    use approx::assert_relative_eq;
    use rstest::rstest;

    const EYE: EyeIndices = EyeIndices([0, 1, 2, 3, 4, 5]);

    /// Six points on an ellipse centered in the frame: corners at 0/180
    /// degrees, lid points at 60/120 and 240/300 degrees.
    fn ellipse_eye(semi_x: f64, semi_y: f64) -> FaceLandmarks {
        let (cx, cy) = (0.5, 0.5);
        let at = |deg: f64| {
            let r = deg.to_radians();
            NormalizedLandmark::new(cx + semi_x * r.cos(), cy - semi_y * r.sin())
        };
        FaceLandmarks::new(vec![
            at(180.0), // P1 outer corner
            at(120.0), // P2 upper lid
            at(60.0),  // P3 upper lid
            at(0.0),   // P4 inner corner
            at(300.0), // P5 lower lid
            at(240.0), // P6 lower lid
        ])
    }

    #[rstest]
    #[case::wide_open(0.5)]
    #[case::relaxed(0.3)]
    #[case::nearly_closed(0.1)]
    fn test_ellipse_matches_analytic_ratio(#[case] axis_ratio: f64) {
        // Vertical chords are 2 * b * sin(60deg), horizontal is 2 * a, so
        // EAR = (b / a) * sin(60deg).
        let landmarks = ellipse_eye(0.1, 0.1 * axis_ratio);
        let m = eye_aspect_ratio(&landmarks, &EYE, 4000, 4000);
        let expected = axis_ratio * 60f64.to_radians().sin();
        assert_relative_eq!(m.ear, expected, epsilon = 5e-3);
        assert!(m.is_measurable());
    }

    #[test]
    fn test_exact_pixel_geometry() {
        // 128x128 frame so normalization is exact in binary.
        let lm = |x: f64, y: f64| NormalizedLandmark::new(x / 128.0, y / 128.0);
        let landmarks = FaceLandmarks::new(vec![
            lm(10.0, 50.0),
            lm(30.0, 45.0),
            lm(50.0, 45.0),
            lm(70.0, 50.0),
            lm(50.0, 55.0),
            lm(30.0, 55.0),
        ]);
        let m = eye_aspect_ratio(&landmarks, &EYE, 128, 128);
        // (10 + 10) / (2 * 60)
        assert_relative_eq!(m.ear, 20.0 / 120.0, epsilon = 1e-12);
        let points = m.points.unwrap();
        assert_eq!(points[0], Point::new(10.0, 50.0));
        assert_eq!(points[3], Point::new(70.0, 50.0));
    }

    #[test]
    fn test_points_follow_reference_order() {
        let landmarks = ellipse_eye(0.1, 0.03);
        let reversed = EyeIndices([5, 4, 3, 2, 1, 0]);
        let a = eye_aspect_ratio(&landmarks, &EYE, 1000, 1000);
        let b = eye_aspect_ratio(&landmarks, &reversed, 1000, 1000);
        assert_eq!(a.points.unwrap()[0], b.points.unwrap()[5]);
    }

    #[rstest]
    #[case::p1(0)]
    #[case::p2(1)]
    #[case::p3(2)]
    #[case::p4(3)]
    #[case::p5(4)]
    #[case::p6(5)]
    fn test_missing_landmark_yields_zero(#[case] slot: usize) {
        let landmarks = ellipse_eye(0.1, 0.03);
        let mut indices = EYE;
        indices.0[slot] = 999;
        let m = eye_aspect_ratio(&landmarks, &indices, 640, 480);
        assert_eq!(m.ear, 0.0);
        assert!(m.points.is_none());
    }

    #[test]
    fn test_off_frame_landmark_yields_zero() {
        let mut points = ellipse_eye(0.1, 0.03).points().to_vec();
        points[2] = NormalizedLandmark::new(1.2, 0.5);
        let m = eye_aspect_ratio(&FaceLandmarks::new(points), &EYE, 640, 480);
        assert_eq!(m, EyeMeasurement::UNMEASURABLE);
    }

    #[test]
    fn test_zero_width_eye_yields_zero() {
        // P1 and P4 coincide, so the denominator is zero.
        let same = NormalizedLandmark::new(0.5, 0.5);
        let landmarks = FaceLandmarks::new(vec![
            same,
            NormalizedLandmark::new(0.5, 0.45),
            NormalizedLandmark::new(0.5, 0.45),
            same,
            NormalizedLandmark::new(0.5, 0.55),
            NormalizedLandmark::new(0.5, 0.55),
        ]);
        let m = eye_aspect_ratio(&landmarks, &EYE, 640, 480);
        assert_eq!(m.ear, 0.0);
        assert!(m.points.is_none());
    }

    #[test]
    fn test_empty_landmarks_yield_zero() {
        let m = eye_aspect_ratio(&FaceLandmarks::default(), &EyeIndices::LEFT, 640, 480);
        assert_eq!(m, EyeMeasurement::UNMEASURABLE);
    }

    #[test]
    fn test_default_eye_sets_have_no_duplicates() {
        assert!(!EyeIndices::LEFT.has_duplicates());
        assert!(!EyeIndices::RIGHT.has_duplicates());
        assert!(EyeIndices([1, 2, 3, 4, 5, 1]).has_duplicates());
    }
}
