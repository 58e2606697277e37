use std::time::Duration;

/// Average EAR below which a frame counts as "eyes closed".
pub const DEFAULT_EAR_THRESHOLD: f64 = 0.2;

/// Sustained closure, in seconds, that raises the alarm.
pub const DEFAULT_ALARM_THRESHOLD_SECONDS: f64 = 3.0;

/// Nominal time credited to each processed frame when no clock is configured.
pub const DEFAULT_TIME_STEP: Duration = Duration::from_millis(100);

/// P1..P6 of the left eye in face-mesh topology.
pub const LEFT_EYE_INDICES: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// P1..P6 of the right eye in face-mesh topology.
pub const RIGHT_EYE_INDICES: [usize; 6] = [33, 160, 158, 133, 153, 144];

pub const FACE_MESH_LANDMARK_COUNT: usize = 468;

pub const FACE_DETECTION_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const FACE_MESH_MODEL_NAME: &str = "face_landmark.onnx";

/// Default face box confidence for the detector stage.
pub const DEFAULT_FACE_CONFIDENCE: f64 = 0.5;

/// Default face-presence probability required from the mesh model.
pub const DEFAULT_PRESENCE_THRESHOLD: f64 = 0.5;
