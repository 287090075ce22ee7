//! tract-onnx backend

use std::path::Path;

use camera_capture::VideoFrame;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use crate::backends::resolve_class_names;
use crate::config::AdasConfig;
use crate::detector::DetectorBackend;
use crate::object::RawDetection;
use crate::yolo::{parse_class_names, preprocess, YoloDecoder};
use crate::AdasError;

/// Pure-Rust ONNX inference of a YOLOv8 detection model
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    decoder: YoloDecoder,
    input_size: u32,
}

impl TractBackend {
    /// Load and optimise the model at `config.model_path`
    pub fn load(config: &AdasConfig) -> Result<Self, AdasError> {
        let path = Path::new(&config.model_path);
        if !path.is_file() {
            return Err(AdasError::ModelLoad(format!(
                "model file not found: {}",
                path.display()
            )));
        }
        info!("Loading detection model from {}", path.display());

        let onnx = tract_onnx::onnx();
        let proto = onnx
            .proto_model_for_path(path)
            .map_err(|e| AdasError::ModelLoad(format!("{}: {:#}", path.display(), e)))?;
        let names = proto
            .metadata_props
            .iter()
            .find(|prop| prop.key == "names")
            .and_then(|prop| parse_class_names(&prop.value));

        let size = config.input_size as usize;
        let model = onnx
            .model_for_proto_model(&proto)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| AdasError::ModelLoad(format!("{}: {:#}", path.display(), e)))?;

        let decoder = YoloDecoder::new(
            resolve_class_names(names, config),
            config.confidence_threshold,
            config.iou_threshold,
            config.input_size,
        );

        Ok(Self {
            model,
            decoder,
            input_size: config.input_size,
        })
    }

    pub fn class_names(&self) -> &[String] {
        self.decoder.class_names()
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<RawDetection>, AdasError> {
        let size = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_vec(
            (1, 3, size, size),
            preprocess(frame, self.input_size),
        )
        .map_err(|e| AdasError::Inference(e.to_string()))?
        .into_tensor();

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| AdasError::Inference(format!("{:#}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| AdasError::Inference("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| AdasError::Inference(format!("output tensor was not f32: {}", e)))?;

        let shape = view.shape().to_vec();
        let data: Vec<f32> = view.iter().copied().collect();
        let detections = self
            .decoder
            .decode(&data, &shape, frame.width(), frame.height())?;
        debug!("tract: {} raw detections on frame #{}", detections.len(), frame.sequence);
        Ok(detections)
    }
}
