//! Detection and collision-warning configuration

use serde::{Deserialize, Serialize};

use crate::distance::FaultPolicy;

/// Inference runtime used for the ONNX model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// Pure-Rust tract runtime
    #[default]
    Tract,
    /// ONNX Runtime (requires the `backend-ort` feature)
    Ort,
}

/// Detection and warning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdasConfig {
    /// Collision warning distance (meters); strictly closer vehicles alert
    pub warning_distance_m: f32,

    /// Minimum detection confidence
    pub confidence_threshold: f32,

    /// Non-maximum suppression IoU threshold
    pub iou_threshold: f32,

    /// YOLO ONNX model path
    pub model_path: String,

    /// Square model input size (pixels)
    pub input_size: u32,

    /// Class names by model index; read from model metadata when absent
    pub class_names: Option<Vec<String>>,

    /// Inference runtime
    pub backend: InferenceBackend,

    /// Distance returned when the estimate faults
    pub distance_fault_policy: FaultPolicy,

    /// TrueType font for overlay text; boxes are still drawn without it
    pub font_path: Option<String>,
}

impl Default for AdasConfig {
    fn default() -> Self {
        Self {
            warning_distance_m: 10.0,
            confidence_threshold: 0.4,
            iou_threshold: 0.7,
            model_path: "models/best.onnx".to_string(),
            input_size: 640,
            class_names: None,
            backend: InferenceBackend::Tract,
            distance_fault_policy: FaultPolicy::AssumeFar,
            font_path: Some("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()),
        }
    }
}
