//! Normalized face-mesh landmarks as produced by a landmark detector.
//!
//! Coordinates are relative to the frame: (0, 0) is the top-left corner and
//! (1, 1) the bottom-right. Points the detector extrapolated outside the frame
//! keep their out-of-range values and fail denormalization.

use crate::measurement::domain::point::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f64,
    pub y: f64,
}

impl NormalizedLandmark {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Converts to integer pixel coordinates within a `width` x `height` frame.
    ///
    /// Returns `None` when either coordinate lies outside [0, 1] (or is not
    /// finite), or the frame is empty.
    pub fn denormalize(&self, width: u32, height: u32) -> Option<Point> {
        let x = to_pixel(self.x, width)?;
        let y = to_pixel(self.y, height)?;
        Some(Point::new(x, y))
    }
}

fn to_pixel(value: f64, extent: u32) -> Option<f64> {
    if extent == 0 || !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return None;
    }
    let max = f64::from(extent - 1);
    Some((value * f64::from(extent)).floor().min(max))
}

/// Ordered landmark set for one detected face.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceLandmarks {
    points: Vec<NormalizedLandmark>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<NormalizedLandmark>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[NormalizedLandmark] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NormalizedLandmark> {
        self.points.get(index)
    }
}

impl FromIterator<NormalizedLandmark> for FaceLandmarks {
    fn from_iter<I: IntoIterator<Item = NormalizedLandmark>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
