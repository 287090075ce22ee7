//! Collision-risk annotation and alerting

use std::sync::Arc;

use ab_glyph::{FontVec, PxScale};
use alerting::{AlertSignal, AlertSink};
use camera_capture::VideoFrame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, warn};

use crate::config::AdasConfig;
use crate::distance::DistanceEstimator;
use crate::object::Detection;

pub const SAFE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const RISK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const RISK_TEXT: &str = "COLLISION RISK";

const BOX_THICKNESS: u32 = 2;
const RISK_TEXT_OFFSET: i32 = 10;
const LABEL_OFFSET: i32 = 20;
const TEXT_PX: f32 = 20.0;

/// One drawing primitive applied to the frame
#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Rect {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        color: Rgb<u8>,
        thickness: u32,
    },
    /// `(x, y)` is the left end of the text baseline
    Text {
        text: String,
        x: i32,
        y: i32,
        color: Rgb<u8>,
    },
}

/// Per-detection outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub detection: Detection,
    pub distance_m: f32,
    pub at_risk: bool,
}

/// What one annotation pass drew and signalled
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub overlays: Vec<Overlay>,
    pub assessments: Vec<Assessment>,
    /// Alert signals dispatched
    pub alerts: usize,
}

impl Annotation {
    pub fn at_risk(&self) -> usize {
        self.assessments.iter().filter(|a| a.at_risk).count()
    }
}

/// Draws boxes and distance labels; flags and signals vehicles inside the
/// warning distance.
///
/// Holds no state across frames: every call decides risk and alerts from
/// its own detections only.
pub struct Annotator {
    estimator: DistanceEstimator,
    warning_distance_m: f32,
    sink: Arc<dyn AlertSink>,
    font: Option<FontVec>,
}

impl Annotator {
    pub fn new(config: &AdasConfig, sink: Arc<dyn AlertSink>) -> Self {
        let font = config.font_path.as_deref().and_then(load_font);
        Self {
            estimator: DistanceEstimator::new(config.distance_fault_policy),
            warning_distance_m: config.warning_distance_m,
            sink,
            font,
        }
    }

    pub fn warning_distance_m(&self) -> f32 {
        self.warning_distance_m
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn annotate(
        &self,
        frame: &mut VideoFrame,
        detections: &[Detection],
        alert_enabled: bool,
    ) -> Annotation {
        let frame_height = frame.height() as f32;
        let mut annotation = Annotation::default();

        for detection in detections {
            let distance_m = self
                .estimator
                .estimate(Some(detection.height() as f32), frame_height);
            let at_risk = distance_m < self.warning_distance_m;
            let (x1, y1, x2, y2) = detection.corners();
            let color = if at_risk { RISK_COLOR } else { SAFE_COLOR };

            if at_risk {
                annotation.overlays.push(Overlay::Text {
                    text: RISK_TEXT.to_string(),
                    x: x1,
                    y: y1 - RISK_TEXT_OFFSET,
                    color: RISK_COLOR,
                });
                if alert_enabled {
                    self.sink.signal(AlertSignal {
                        label: detection.class().to_string(),
                        distance_m,
                    });
                    annotation.alerts += 1;
                }
            }

            annotation.overlays.push(Overlay::Rect {
                x1,
                y1,
                x2,
                y2,
                color,
                thickness: BOX_THICKNESS,
            });
            annotation.overlays.push(Overlay::Text {
                text: format!("{} {:.1}m", detection.class(), distance_m),
                x: x1,
                y: y2 + LABEL_OFFSET,
                color,
            });
            annotation.assessments.push(Assessment {
                detection: *detection,
                distance_m,
                at_risk,
            });
        }

        for overlay in &annotation.overlays {
            self.draw(frame.image_mut(), overlay);
        }

        if !annotation.assessments.is_empty() {
            debug!(
                "Frame #{}: {} vehicles, {} at risk, {} alerts",
                frame.sequence,
                annotation.assessments.len(),
                annotation.at_risk(),
                annotation.alerts
            );
        }
        annotation
    }

    fn draw(&self, image: &mut RgbImage, overlay: &Overlay) {
        match overlay {
            Overlay::Rect {
                x1,
                y1,
                x2,
                y2,
                color,
                thickness,
            } => {
                for inset in 0..*thickness as i32 {
                    let width = x2 - x1 - 2 * inset;
                    let height = y2 - y1 - 2 * inset;
                    if width <= 0 || height <= 0 {
                        break;
                    }
                    let rect = Rect::at(x1 + inset, y1 + inset).of_size(width as u32, height as u32);
                    draw_hollow_rect_mut(image, rect, *color);
                }
            }
            Overlay::Text { text, x, y, color } => {
                if let Some(font) = &self.font {
                    let top = y - TEXT_PX as i32;
                    draw_text_mut(image, *color, *x, top, PxScale::from(TEXT_PX), font, text);
                }
            }
        }
    }
}

fn load_font(path: &str) -> Option<FontVec> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Overlay font {} unavailable ({}), labels will not be drawn", path, e);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Overlay font {} is invalid ({}), labels will not be drawn", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::VehicleClass;
    use alerting::RecordingSink;

    fn annotator(warning_distance_m: f32, sink: Arc<RecordingSink>) -> Annotator {
        let config = AdasConfig {
            warning_distance_m,
            font_path: None,
            ..Default::default()
        };
        Annotator::new(&config, sink)
    }

    fn blank() -> VideoFrame {
        VideoFrame::from_rgb(vec![0; 640 * 640 * 3], 640, 640).unwrap()
    }

    fn texts(annotation: &Annotation) -> Vec<&str> {
        annotation
            .overlays
            .iter()
            .filter_map(|o| match o {
                Overlay::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_far_vehicle_gets_plain_label() {
        let sink = Arc::new(RecordingSink::new());
        let annotator = annotator(20.0, sink.clone());
        let mut frame = blank();
        let car = Detection::new(VehicleClass::Car, 0.9, 100, 100, 200, 150).unwrap();

        let annotation = annotator.annotate(&mut frame, &[car], true);

        assert_eq!(texts(&annotation), vec!["car 24.0m"]);
        assert_eq!(annotation.alerts, 0);
        assert_eq!(sink.count(), 0);
        assert_eq!(annotation.assessments[0].distance_m, 24.0);
        assert!(!annotation.assessments[0].at_risk);
        assert_eq!(frame.get_pixel(100, 100), Some(SAFE_COLOR.0));
        assert_eq!(frame.get_pixel(101, 101), Some(SAFE_COLOR.0));
        assert_eq!(frame.get_pixel(150, 125), Some([0, 0, 0]));
    }

    #[test]
    fn test_close_vehicles_alert_once_each() {
        let sink = Arc::new(RecordingSink::new());
        let annotator = annotator(10.0, sink.clone());
        let mut frame = blank();
        let detections = [
            // 1200 / 300 = 4.0 m
            Detection::new(VehicleClass::Truck, 0.8, 10, 10, 300, 310).unwrap(),
            // 1200 / 200 = 6.0 m
            Detection::new(VehicleClass::Bus, 0.7, 320, 100, 600, 300).unwrap(),
            // 24.0 m
            Detection::new(VehicleClass::Car, 0.9, 400, 500, 450, 550).unwrap(),
        ];

        let annotation = annotator.annotate(&mut frame, &detections, true);

        let texts = texts(&annotation);
        assert_eq!(texts.iter().filter(|t| **t == RISK_TEXT).count(), 2);
        assert!(texts.contains(&"truck 4.0m"));
        assert!(texts.contains(&"bus 6.0m"));
        assert_eq!(annotation.alerts, 2);
        assert_eq!(annotation.at_risk(), 2);

        let signals = sink.signals();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].label, "truck");
        assert_eq!(signals[0].distance_m, 4.0);
        assert_eq!(frame.get_pixel(10, 10), Some(RISK_COLOR.0));
        assert_eq!(frame.get_pixel(400, 500), Some(SAFE_COLOR.0));
    }

    #[test]
    fn test_alerts_disabled_still_flags_risk() {
        let sink = Arc::new(RecordingSink::new());
        let annotator = annotator(10.0, sink.clone());
        let mut frame = blank();
        let truck = Detection::new(VehicleClass::Truck, 0.8, 10, 10, 300, 310).unwrap();

        let annotation = annotator.annotate(&mut frame, &[truck], false);

        assert!(texts(&annotation).contains(&RISK_TEXT));
        assert_eq!(annotation.alerts, 0);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_text_positions() {
        let sink = Arc::new(RecordingSink::new());
        let annotator = annotator(10.0, sink);
        let mut frame = blank();
        let truck = Detection::new(VehicleClass::Truck, 0.8, 10, 30, 300, 330).unwrap();

        let annotation = annotator.annotate(&mut frame, &[truck], false);

        assert!(annotation.overlays.contains(&Overlay::Text {
            text: RISK_TEXT.to_string(),
            x: 10,
            y: 20,
            color: RISK_COLOR,
        }));
        assert!(annotation.overlays.contains(&Overlay::Text {
            text: "truck 4.0m".to_string(),
            x: 10,
            y: 350,
            color: RISK_COLOR,
        }));
    }

    #[test]
    fn test_exact_warning_distance_is_not_risk() {
        let sink = Arc::new(RecordingSink::new());
        // 1200 / 120 = 10.0 m
        let annotator = annotator(10.0, sink.clone());
        let mut frame = blank();
        let car = Detection::new(VehicleClass::Car, 0.9, 0, 0, 100, 120).unwrap();

        let annotation = annotator.annotate(&mut frame, &[car], true);
        assert_eq!(annotation.at_risk(), 0);
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_unreadable_font_degrades() {
        let config = AdasConfig {
            font_path: Some("/nonexistent/font.ttf".to_string()),
            ..Default::default()
        };
        let annotator = Annotator::new(&config, Arc::new(RecordingSink::new()));
        assert!(!annotator.has_font());

        let mut frame = blank();
        let car = Detection::new(VehicleClass::Car, 0.9, 5, 5, 60, 60).unwrap();
        let annotation = annotator.annotate(&mut frame, &[car], true);
        assert_eq!(annotation.overlays.len(), 2);
    }

    #[test]
    fn test_box_hanging_off_frame() {
        let sink = Arc::new(RecordingSink::new());
        let annotator = annotator(10.0, sink);
        let mut frame = blank();
        let car = Detection::new(VehicleClass::Car, 0.9, 600, 620, 700, 700).unwrap();
        let annotation = annotator.annotate(&mut frame, &[car], false);
        assert_eq!(annotation.assessments.len(), 1);
        assert_eq!(frame.get_pixel(600, 620), Some(SAFE_COLOR.0));
    }
}
