//! Layered settings: defaults, then a TOML file, then `FOG_*` environment

use std::collections::HashMap;
use std::path::Path;

use adas::{AdasConfig, FaultPolicy, InferenceBackend};
use alerting::AlertConfig;
use config::{Config, Environment, File};
use dehaze::DehazeConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::runner::RunnerConfig;
use crate::PipelineError;

/// Settings file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "fog-detect.toml";

/// Environment variable prefix (`FOG_MODEL_PATH`, ...)
pub const ENV_PREFIX: &str = "FOG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Detector acceptance threshold
    pub confidence_threshold: f32,
    /// Collision warning distance (meters)
    pub warning_distance_meters: f32,
    /// Detector weights
    pub model_path: String,
    pub iou_threshold: f32,
    /// Working resolution (square) for every frame
    pub frame_size: u32,
    pub dehaze_clip_limit: f32,
    pub dehaze_tile_grid: u32,
    pub beep_frequency_hz: u32,
    pub beep_duration_ms: u64,
    pub beep_player: String,
    pub font_path: Option<String>,
    pub class_names: Option<Vec<String>>,
    pub backend: InferenceBackend,
    pub distance_fault_policy: FaultPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        let adas = AdasConfig::default();
        let dehaze = DehazeConfig::default();
        let alert = AlertConfig::default();
        Self {
            confidence_threshold: adas.confidence_threshold,
            warning_distance_meters: adas.warning_distance_m,
            model_path: adas.model_path,
            iou_threshold: adas.iou_threshold,
            frame_size: adas.input_size,
            dehaze_clip_limit: dehaze.clip_limit,
            dehaze_tile_grid: dehaze.tile_grid,
            beep_frequency_hz: alert.frequency_hz,
            beep_duration_ms: alert.duration_ms,
            beep_player: alert.player,
            font_path: adas.font_path,
            class_names: adas.class_names,
            backend: adas.backend,
            distance_fault_policy: adas.distance_fault_policy,
        }
    }
}

impl Settings {
    /// Load from `path` (required) or `fog-detect.toml` (optional), then the
    /// process environment
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        Self::load_with_env(path, None)
    }

    /// As [`Settings::load`], reading `FOG_*` variables from `env` instead of
    /// the process environment when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, PipelineError> {
        let file = match path {
            Some(path) => {
                info!("Loading settings from {}", path.display());
                File::from(path).required(true)
            }
            None => File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false),
        };

        let environment = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("class_names")
            .source(env);

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::Config(msg));

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return invalid(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            ));
        }
        if !(self.warning_distance_meters > 0.0) {
            return invalid(format!(
                "warning_distance_meters must be positive, got {}",
                self.warning_distance_meters
            ));
        }
        if self.frame_size == 0 {
            return invalid("frame_size must be positive".to_string());
        }
        if self.dehaze_tile_grid == 0 {
            return invalid("dehaze_tile_grid must be positive".to_string());
        }
        if !(self.dehaze_clip_limit > 0.0) {
            return invalid(format!(
                "dehaze_clip_limit must be positive, got {}",
                self.dehaze_clip_limit
            ));
        }
        if self.model_path.trim().is_empty() {
            return invalid("model_path is empty".to_string());
        }
        Ok(())
    }

    pub fn adas_config(&self) -> AdasConfig {
        AdasConfig {
            warning_distance_m: self.warning_distance_meters,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            model_path: self.model_path.clone(),
            input_size: self.frame_size,
            class_names: self.class_names.clone(),
            backend: self.backend,
            distance_fault_policy: self.distance_fault_policy,
            font_path: self.font_path.clone(),
        }
    }

    pub fn dehaze_config(&self) -> DehazeConfig {
        DehazeConfig {
            clip_limit: self.dehaze_clip_limit,
            tile_grid: self.dehaze_tile_grid,
        }
    }

    pub fn alert_config(&self) -> AlertConfig {
        AlertConfig {
            frequency_hz: self.beep_frequency_hz,
            duration_ms: self.beep_duration_ms,
            player: self.beep_player.clone(),
            ..Default::default()
        }
    }

    pub fn runner_config(&self, alert_enabled: bool) -> RunnerConfig {
        RunnerConfig {
            frame_size: self.frame_size,
            alert_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::load_with_env(None, env(&[])).unwrap();
        assert_eq!(settings.confidence_threshold, 0.4);
        assert_eq!(settings.warning_distance_meters, 10.0);
        assert_eq!(settings.model_path, "models/best.onnx");
        assert_eq!(settings.frame_size, 640);
        assert_eq!(settings.distance_fault_policy, FaultPolicy::AssumeFar);
        assert!(settings.class_names.is_none());
    }

    #[test]
    fn test_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "warning_distance_meters = 20.0\nmodel_path = \"from-file.onnx\"\ndistance_fault_policy = \"assume_near\""
        )
        .unwrap();

        let settings = Settings::load_with_env(
            Some(file.path()),
            env(&[
                ("FOG_MODEL_PATH", "from-env.onnx"),
                ("FOG_CONFIDENCE_THRESHOLD", "0.55"),
                ("FOG_CLASS_NAMES", "car,truck,bus"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.warning_distance_meters, 20.0);
        assert_eq!(settings.model_path, "from-env.onnx");
        assert_eq!(settings.confidence_threshold, 0.55);
        assert_eq!(settings.distance_fault_policy, FaultPolicy::AssumeNear);
        assert_eq!(
            settings.class_names,
            Some(vec!["car".to_string(), "truck".to_string(), "bus".to_string()])
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load_with_env(Some(Path::new("/nonexistent/fog.toml")), env(&[]));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.confidence_threshold = 1.5;
        assert!(settings.validate().is_err());

        settings = Settings::default();
        settings.warning_distance_meters = 0.0;
        assert!(settings.validate().is_err());

        settings = Settings::default();
        settings.dehaze_tile_grid = 0;
        assert!(settings.validate().is_err());

        settings = Settings::default();
        settings.dehaze_clip_limit = f32::NAN;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_component_configs() {
        let settings = Settings {
            warning_distance_meters: 15.0,
            frame_size: 320,
            ..Default::default()
        };
        let adas = settings.adas_config();
        assert_eq!(adas.warning_distance_m, 15.0);
        assert_eq!(adas.input_size, 320);
        assert_eq!(settings.dehaze_config().tile_grid, 8);
        assert_eq!(settings.alert_config().frequency_hz, 1000);
        assert!(!settings.runner_config(false).alert_enabled);
    }
}
