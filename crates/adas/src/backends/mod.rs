//! ONNX inference runtimes

pub mod tract;
#[cfg(feature = "backend-ort")]
pub mod ort;

pub use self::tract::TractBackend;
#[cfg(feature = "backend-ort")]
pub use self::ort::OrtBackend;

use tracing::{info, warn};

use crate::config::AdasConfig;
use crate::yolo::coco_class_names;

/// Class names by precedence: model metadata, configuration, COCO-80
pub(crate) fn resolve_class_names(from_model: Option<Vec<String>>, config: &AdasConfig) -> Vec<String> {
    if let Some(names) = from_model {
        info!("Using {} class names from model metadata", names.len());
        return names;
    }
    if let Some(names) = &config.class_names {
        info!("Using {} class names from configuration", names.len());
        return names.clone();
    }
    warn!("Model carries no class names, assuming COCO-80");
    coco_class_names()
}
