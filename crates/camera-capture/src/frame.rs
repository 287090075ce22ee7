//! Video frame types and processing

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Decoded RGB video frame.
///
/// Pixels are always stored in RGB order. Raw BGR buffers are converted at
/// the boundary with [`VideoFrame::from_bgr`] and [`VideoFrame::to_bgr`].
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    image: RgbImage,
    /// Capture timestamp (nanoseconds since the source was opened)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Wrap a decoded RGB image
    pub fn new(image: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            image,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a frame from raw RGB data (width * height * 3)
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        RgbImage::from_raw(width, height, data).map(|image| Self::new(image, 0, 0))
    }

    /// Create a frame from raw BGR data, swapping channels into RGB order
    pub fn from_bgr(mut data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        Self::from_rgb(data, width, height)
    }

    /// Copy the pixels out in BGR order
    pub fn to_bgr(&self) -> Vec<u8> {
        let mut data = self.image.as_raw().clone();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        data
    }

    /// Frame width
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Raw RGB bytes (width * height * 3)
    pub fn as_rgb(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let Rgb(pixel) = *self.image.get_pixel(x, y);
        Some(pixel)
    }

    /// Same frame with the pixels replaced, keeping timestamp and sequence
    pub fn with_image(&self, image: RgbImage) -> VideoFrame {
        VideoFrame {
            image,
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Resize frame using bilinear interpolation
    pub fn resize(&self, new_width: u32, new_height: u32) -> VideoFrame {
        if self.width() == new_width && self.height() == new_height {
            return self.clone();
        }
        let resized = imageops::resize(&self.image, new_width, new_height, FilterType::Triangle);
        self.with_image(resized)
    }
}
