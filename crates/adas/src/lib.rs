//! Foggy-road vehicle detection
//!
//! - Vehicle detection (car, truck, bus) with a YOLOv8 ONNX model
//! - Monocular distance estimation from box height
//! - Collision-risk annotation and alerting

pub mod annotate;
pub mod backends;
pub mod config;
pub mod detector;
pub mod distance;
pub mod object;
pub mod yolo;

pub use annotate::{Annotation, Annotator, Assessment, Overlay, RISK_COLOR, RISK_TEXT, SAFE_COLOR};
pub use config::{AdasConfig, InferenceBackend};
pub use detector::{DetectorBackend, VehicleDetector};
pub use distance::{estimate_distance, DistanceEstimator, FaultPolicy};
pub use object::{Detection, RawDetection, VehicleClass};

use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum AdasError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
}
