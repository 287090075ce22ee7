//! ONNX Runtime backend

use std::path::Path;

use camera_capture::VideoFrame;
use ndarray::Array4;
use ort::{GraphOptimizationLevel, Session};
use tracing::{debug, error, info};

use crate::backends::resolve_class_names;
use crate::config::AdasConfig;
use crate::detector::DetectorBackend;
use crate::object::RawDetection;
use crate::yolo::{parse_class_names, preprocess, YoloDecoder};
use crate::AdasError;

/// YOLOv8 detection through an ONNX Runtime session
pub struct OrtBackend {
    session: Session,
    decoder: YoloDecoder,
    input_size: u32,
}

impl OrtBackend {
    pub fn load(config: &AdasConfig) -> Result<Self, AdasError> {
        let path = Path::new(&config.model_path);
        if !path.is_file() {
            return Err(AdasError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        info!("Loading detection model from {} (onnxruntime)", path.display());

        let session = Session::builder()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(path))
            .map_err(|e| {
                error!("Failed to load detection model: {}", e);
                AdasError::ModelLoad(e.to_string())
            })?;

        let names = session
            .metadata()
            .ok()
            .and_then(|meta| meta.custom("names").ok().flatten())
            .and_then(|raw| parse_class_names(&raw));

        let decoder = YoloDecoder::new(
            resolve_class_names(names, config),
            config.confidence_threshold,
            config.iou_threshold,
            config.input_size,
        );

        Ok(Self {
            session,
            decoder,
            input_size: config.input_size,
        })
    }
}

impl DetectorBackend for OrtBackend {
    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<RawDetection>, AdasError> {
        let size = self.input_size as usize;
        let input_array = Array4::from_shape_vec((1, 3, size, size), preprocess(frame, self.input_size))
            .map_err(|e| AdasError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![input_array].map_err(|e| AdasError::Inference(e.to_string()))?)
            .map_err(|e| AdasError::Inference(e.to_string()))?;
        let view = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| AdasError::Inference(e.to_string()))?;

        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        let detections = self
            .decoder
            .decode(&data, &shape, frame.width(), frame.height())?;
        debug!("ort: {} raw detections on frame #{}", detections.len(), frame.sequence);
        Ok(detections)
    }
}
