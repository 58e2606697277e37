//! Eye-aspect-ratio drowsiness monitoring.
//!
//! Frames flow from a [`video::domain::frame_source::FrameSource`] through a
//! landmark detector, the EAR measurement, the drowsiness tracker and the
//! overlay annotator to any number of render sinks. The loop lives in
//! [`pipeline::monitor_session_use_case::MonitorSessionUseCase`].

pub mod annotation;
pub mod detection;
pub mod measurement;
pub mod monitoring;
pub mod pipeline;
pub mod shared;
pub mod video;
