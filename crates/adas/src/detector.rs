//! Vehicle detector

use camera_capture::VideoFrame;
use tracing::{debug, info};

use crate::config::{AdasConfig, InferenceBackend};
use crate::object::{Detection, RawDetection};
use crate::AdasError;

/// Object-detection runtime seam.
///
/// Returns every box the model reports, any class, in pixel coordinates of
/// the frame passed in.
pub trait DetectorBackend: Send {
    fn name(&self) -> &'static str;

    fn infer(&mut self, frame: &VideoFrame) -> Result<Vec<RawDetection>, AdasError>;
}

/// Confidence threshold and vehicle allow-list over a [`DetectorBackend`]
pub struct VehicleDetector {
    backend: Box<dyn DetectorBackend>,
    confidence_threshold: f32,
}

impl VehicleDetector {
    pub fn new(backend: Box<dyn DetectorBackend>, confidence_threshold: f32) -> Self {
        Self {
            backend,
            confidence_threshold,
        }
    }

    /// Load the model with the configured runtime
    pub fn load(config: &AdasConfig) -> Result<Self, AdasError> {
        let backend: Box<dyn DetectorBackend> = match config.backend {
            InferenceBackend::Tract => Box::new(crate::backends::TractBackend::load(config)?),
            #[cfg(feature = "backend-ort")]
            InferenceBackend::Ort => Box::new(crate::backends::OrtBackend::load(config)?),
            #[cfg(not(feature = "backend-ort"))]
            InferenceBackend::Ort => {
                return Err(AdasError::ModelLoad(
                    "onnxruntime backend requires the `backend-ort` feature".to_string(),
                ))
            }
        };
        info!("Vehicle detector ready ({} backend)", backend.name());
        Ok(Self::new(backend, config.confidence_threshold))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Car, truck and bus boxes at or above the confidence threshold
    pub fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<Detection>, AdasError> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(AdasError::InvalidFrame(format!(
                "{}x{} frame",
                frame.width(),
                frame.height()
            )));
        }
        let raw = self.backend.infer(frame)?;
        let total = raw.len();

        let detections: Vec<Detection> = raw
            .iter()
            .filter(|r| r.confidence >= self.confidence_threshold)
            .filter_map(Detection::from_raw)
            .collect();

        debug!(
            "Frame #{}: {} of {} boxes are vehicles",
            frame.sequence,
            detections.len(),
            total
        );
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::VehicleClass;

    struct FixedBackend(Vec<RawDetection>);

    impl DetectorBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn infer(&mut self, _frame: &VideoFrame) -> Result<Vec<RawDetection>, AdasError> {
            Ok(self.0.clone())
        }
    }

    struct FailingBackend;

    impl DetectorBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn infer(&mut self, _frame: &VideoFrame) -> Result<Vec<RawDetection>, AdasError> {
            Err(AdasError::Inference("boom".into()))
        }
    }

    fn raw(label: &str, confidence: f32, bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    fn frame() -> VideoFrame {
        VideoFrame::from_rgb(vec![0; 64 * 64 * 3], 64, 64).unwrap()
    }

    #[test]
    fn test_keeps_only_vehicles_above_threshold() {
        let backend = FixedBackend(vec![
            raw("car", 0.9, [1.0, 2.0, 30.0, 40.0]),
            raw("person", 0.95, [0.0, 0.0, 10.0, 10.0]),
            raw("Truck", 0.4, [5.5, 5.5, 20.9, 25.1]),
            raw("bus", 0.39, [0.0, 0.0, 50.0, 50.0]),
            raw("car", 0.8, [10.0, 10.0, 10.5, 30.0]),
        ]);
        let mut detector = VehicleDetector::new(Box::new(backend), 0.4);
        let dets = detector.detect(&frame()).unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class(), VehicleClass::Car);
        assert_eq!(dets[0].corners(), (1, 2, 30, 40));
        assert_eq!(dets[1].class(), VehicleClass::Truck);
        assert_eq!(dets[1].corners(), (5, 5, 20, 25));
    }

    #[test]
    fn test_backend_errors_propagate() {
        let mut detector = VehicleDetector::new(Box::new(FailingBackend), 0.4);
        assert!(matches!(detector.detect(&frame()), Err(AdasError::Inference(_))));
    }

    #[test]
    fn test_missing_model_fails_to_load() {
        let config = AdasConfig {
            model_path: "/nonexistent/best.onnx".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VehicleDetector::load(&config),
            Err(AdasError::ModelLoad(_))
        ));
    }
}
