//! Foggy Vehicle Detection Pipeline
//!
//! Wires frame sources, dehazing, detection and annotation into a single
//! frame loop, plus the layered settings the binary is configured with.

pub mod runner;
pub mod settings;

pub use runner::{RunState, RunSummary, RunnerConfig, StreamRunner};
pub use settings::Settings;

use adas::AdasError;
use camera_capture::CameraError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error(transparent)]
    Adas(#[from] AdasError),
}

impl From<config::ConfigError> for PipelineError {
    fn from(e: config::ConfigError) -> Self {
        PipelineError::Config(e.to_string())
    }
}

/// Initialize logging
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_errors_convert() {
        let err: PipelineError = CameraError::Open("camera 0".into()).into();
        assert!(matches!(err, PipelineError::Camera(CameraError::Open(_))));
        assert_eq!(err.to_string(), "Failed to open source: camera 0");

        let err: PipelineError = AdasError::Inference("model crashed".into()).into();
        assert!(matches!(err, PipelineError::Adas(_)));

        let err: PipelineError = config::ConfigError::Message("bad key".into()).into();
        assert!(matches!(err, PipelineError::Config(ref msg) if msg == "bad key"));
    }
}
