//! Vehicle detections

use std::fmt;

use serde::{Deserialize, Serialize};

/// Vehicle classes that are kept; every other model class is dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [VehicleClass::Car, VehicleClass::Truck, VehicleClass::Bus];

    /// Case-insensitive lookup of a model label
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|class| class.as_str().eq_ignore_ascii_case(label))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend output before vehicle filtering.
///
/// `bbox` is `[x1, y1, x2, y2]` in pixels of the frame handed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// A kept vehicle box in integer pixel coordinates.
///
/// Always satisfies `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    class: VehicleClass,
    confidence: f32,
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl Detection {
    /// `None` for degenerate boxes
    pub fn new(class: VehicleClass, confidence: f32, x1: i32, y1: i32, x2: i32, y2: i32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self {
                class,
                confidence,
                x1,
                y1,
                x2,
                y2,
            })
        } else {
            None
        }
    }

    /// Vehicle filter and truncation toward zero of the corners
    pub fn from_raw(raw: &RawDetection) -> Option<Self> {
        let class = VehicleClass::from_label(&raw.label)?;
        let [x1, y1, x2, y2] = raw.bbox;
        if !raw.bbox.iter().all(|v| v.is_finite()) {
            return None;
        }
        Self::new(class, raw.confidence, x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }

    pub fn class(&self) -> VehicleClass {
        self.class
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// `(x1, y1, x2, y2)`
    pub fn corners(&self) -> (i32, i32, i32, i32) {
        (self.x1, self.y1, self.x2, self.y2)
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1) as u32
    }
}
