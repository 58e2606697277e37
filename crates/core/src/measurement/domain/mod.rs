pub mod ear_aggregator;
pub mod eye_aspect_ratio;
pub mod point;
