use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::measurement::domain::eye_aspect_ratio::EyeIndices;
use crate::monitoring::domain::frame_clock::TimeStep;
use crate::shared::constants::{
    DEFAULT_ALARM_THRESHOLD_SECONDS, DEFAULT_EAR_THRESHOLD, DEFAULT_FACE_CONFIDENCE,
    DEFAULT_PRESENCE_THRESHOLD,
};
use crate::shared::model_resolver::ModelSource;

const APP_DIR: &str = "Drowsiness Monitor";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
    #[error("could not determine config directory")]
    NoConfigDir,
}

/// Persisted monitor configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub ear_threshold: f64,
    pub alarm_threshold_seconds: f64,
    pub left_eye: EyeIndices,
    pub right_eye: EyeIndices,
    pub time_step: TimeStep,
    /// Flip the annotated frame horizontally (selfie view).
    pub mirror: bool,
    pub face_confidence: f64,
    pub presence_threshold: f64,
    pub preview_every_n_frames: usize,
    pub face_detection_model: ModelSource,
    pub face_mesh_model: ModelSource,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            alarm_threshold_seconds: DEFAULT_ALARM_THRESHOLD_SECONDS,
            left_eye: EyeIndices::LEFT,
            right_eye: EyeIndices::RIGHT,
            time_step: TimeStep::default(),
            mirror: true,
            face_confidence: DEFAULT_FACE_CONFIDENCE,
            presence_threshold: DEFAULT_PRESENCE_THRESHOLD,
            preview_every_n_frames: 5,
            face_detection_model: ModelSource::default(),
            face_mesh_model: ModelSource::default(),
        }
    }
}

impl MonitorSettings {
    /// `<config dir>/Drowsiness Monitor/settings.json`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("settings.json"))
    }

    /// Loads the user's settings, falling back to defaults when the file is
    /// absent or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring settings: {e}");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::config_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)?;
        fs::write(path, json).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.ear_threshold.is_finite() && self.ear_threshold > 0.0) {
            return Err(invalid(format!(
                "EAR threshold must be positive, got {}",
                self.ear_threshold
            )));
        }
        if !(self.alarm_threshold_seconds.is_finite() && self.alarm_threshold_seconds >= 0.0) {
            return Err(invalid(format!(
                "alarm threshold must be a non-negative number of seconds, got {}",
                self.alarm_threshold_seconds
            )));
        }
        if let TimeStep::Fixed { seconds } = self.time_step {
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(invalid(format!(
                    "fixed time step must be positive, got {seconds}"
                )));
            }
        }
        for (name, value) in [
            ("face confidence", self.face_confidence),
            ("presence threshold", self.presence_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        for (name, eye) in [("left", &self.left_eye), ("right", &self.right_eye)] {
            if eye.has_duplicates() {
                return Err(invalid(format!(
                    "{name} eye indices contain duplicates: {:?}",
                    eye.as_array()
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: String) -> SettingsError {
    SettingsError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let settings = MonitorSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.ear_threshold, 0.2);
        assert_eq!(settings.alarm_threshold_seconds, 3.0);
        assert_eq!(settings.left_eye, EyeIndices::LEFT);
        assert_eq!(settings.time_step, TimeStep::Fixed { seconds: 0.1 });
    }

    #[test]
    fn test_save_and_load_preserves_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("settings.json");
        let settings = MonitorSettings {
            ear_threshold: 0.25,
            time_step: TimeStep::WallClock,
            mirror: false,
            face_mesh_model: ModelSource {
                path: Some(PathBuf::from("/models/mesh.onnx")),
                url: None,
            },
            ..MonitorSettings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(MonitorSettings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(
            &path,
            r#"{"alarm_threshold_seconds": 5.0, "time_step": {"kind": "source_rate"}}"#,
        )
        .unwrap();
        let settings = MonitorSettings::load_from(&path).unwrap();
        assert_eq!(settings.alarm_threshold_seconds, 5.0);
        assert_eq!(settings.time_step, TimeStep::SourceRate);
        assert_eq!(settings.ear_threshold, DEFAULT_EAR_THRESHOLD);
        assert_eq!(settings.right_eye, EyeIndices::RIGHT);
    }

    #[test]
    fn test_malformed_file_reports_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let err = MonitorSettings::load_from(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_reports_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = MonitorSettings::load_from(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[rstest]
    #[case::zero_ear(MonitorSettings { ear_threshold: 0.0, ..MonitorSettings::default() })]
    #[case::nan_ear(MonitorSettings { ear_threshold: f64::NAN, ..MonitorSettings::default() })]
    #[case::negative_alarm(MonitorSettings { alarm_threshold_seconds: -1.0, ..MonitorSettings::default() })]
    #[case::infinite_alarm(MonitorSettings { alarm_threshold_seconds: f64::INFINITY, ..MonitorSettings::default() })]
    #[case::zero_step(MonitorSettings { time_step: TimeStep::Fixed { seconds: 0.0 }, ..MonitorSettings::default() })]
    #[case::confidence(MonitorSettings { face_confidence: 1.5, ..MonitorSettings::default() })]
    #[case::presence(MonitorSettings { presence_threshold: -0.1, ..MonitorSettings::default() })]
    #[case::duplicate_eye(MonitorSettings { left_eye: EyeIndices([1, 2, 3, 4, 5, 1]), ..MonitorSettings::default() })]
    fn test_validate_rejects(#[case] settings: MonitorSettings) {
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_zero_alarm_threshold_is_allowed() {
        let settings = MonitorSettings {
            alarm_threshold_seconds: 0.0,
            ..MonitorSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_config_path_ends_with_settings_file() {
        if let Some(path) = MonitorSettings::config_path() {
            assert!(path.ends_with("Drowsiness Monitor/settings.json"));
        }
    }
}
