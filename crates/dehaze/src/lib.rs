//! Fog Dehazing
//!
//! Visibility enhancement applied to each frame before detection. The
//! current stage equalises local contrast of the luminance channel only
//! (CLAHE in L*a*b*), leaving chrominance untouched. A learned dehazing
//! model can replace it behind the same [`Dehazer`] contract.

pub mod clahe;
pub mod lab;

pub use clahe::Clahe;

use camera_capture::VideoFrame;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frame enhancement stage.
///
/// Implementations are pure: same dimensions and channel layout out as in,
/// no shared mutable state, safe to call from several threads.
pub trait Dehazer: Send + Sync {
    fn name(&self) -> &'static str;

    fn enhance(&self, frame: &VideoFrame) -> VideoFrame;
}

/// Dehazing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DehazeConfig {
    /// CLAHE clip limit
    pub clip_limit: f32,

    /// CLAHE tile grid (n x n)
    pub tile_grid: u32,
}

impl Default for DehazeConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

/// CLAHE on the L*a*b* lightness channel
#[derive(Debug, Clone)]
pub struct ClaheDehazer {
    clahe: Clahe,
}

impl ClaheDehazer {
    pub fn new(config: &DehazeConfig) -> Self {
        Self {
            clahe: Clahe::new(config.clip_limit, config.tile_grid),
        }
    }
}

impl Default for ClaheDehazer {
    fn default() -> Self {
        Self::new(&DehazeConfig::default())
    }
}

impl Dehazer for ClaheDehazer {
    fn name(&self) -> &'static str {
        "clahe-lab"
    }

    fn enhance(&self, frame: &VideoFrame) -> VideoFrame {
        let (width, height) = (frame.width(), frame.height());
        if width == 0 || height == 0 {
            return frame.clone();
        }

        let mut lab = lab::rgb_to_lab(frame.as_rgb(), width, height);
        lab.l = self.clahe.apply(&lab.l, width, height);
        let rgb = lab::lab_to_rgb(&lab);

        debug!("Dehazed frame #{} ({}x{})", frame.sequence, width, height);
        match RgbImage::from_raw(width, height, rgb) {
            Some(image) => frame.with_image(image),
            None => frame.clone(),
        }
    }
}
