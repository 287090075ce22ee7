//! Camera Capture Library for Foggy Vehicle Detection
//!
//! Frame acquisition and output for the detection pipeline:
//! - Source classification (camera index, network stream, video file,
//!   image directory, single image)
//! - Frame sources (image sequences, OpenCV capture)
//! - Frame sinks (per-image files, `output.mp4`)
//! - Display with a non-interactive fallback

pub mod display;
pub mod frame;
pub mod sink;
pub mod source;

#[cfg(feature = "opencv")]
pub mod capture;

pub use display::{open_display, DisplayAction, FrameDisplay, PreviewFileDisplay, WINDOW_NAME};
pub use frame::VideoFrame;
pub use sink::{FrameSink, ImageDirSink};
pub use source::{
    classify, list_images, FrameSource, ImageSequenceSource, SourceFrame, SourceInput, SourceKind,
    WaitMode,
};

#[cfg(feature = "opencv")]
pub use capture::{CaptureSource, HighGuiDisplay, VideoFileSink};

use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Failed to decode {name}: {reason}")]
    Decode { name: String, reason: String },

    #[error("Failed to write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Display error: {0}")]
    Display(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("{0} requires the `opencv` feature")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Open the frame source for a classified input
pub fn open_source(kind: &SourceKind) -> Result<Box<dyn FrameSource>, CameraError> {
    match kind {
        SourceKind::ImageDirectory(dir) => Ok(Box::new(ImageSequenceSource::from_directory(dir)?)),
        SourceKind::ImageFile(path) => Ok(Box::new(ImageSequenceSource::single(path.clone()))),
        #[cfg(feature = "opencv")]
        SourceKind::Camera(_) | SourceKind::Stream(_) => Ok(Box::new(CaptureSource::open(kind)?)),
        #[cfg(not(feature = "opencv"))]
        SourceKind::Camera(_) | SourceKind::Stream(_) => {
            Err(CameraError::Unsupported(format!("reading {}", kind)))
        }
    }
}

/// Open the output sink for a classified input: `output.mp4` for streaming
/// sources, one image per input otherwise.
pub fn open_sink(
    kind: &SourceKind,
    dir: &std::path::Path,
    fps: Option<f64>,
    frame_size: u32,
) -> Result<Box<dyn FrameSink>, CameraError> {
    if !kind.is_streaming() {
        return Ok(Box::new(ImageDirSink::new(dir)?));
    }

    #[cfg(feature = "opencv")]
    {
        let fps = fps.unwrap_or(capture::FALLBACK_FPS);
        Ok(Box::new(VideoFileSink::create(dir, fps, frame_size, frame_size)?))
    }

    #[cfg(not(feature = "opencv"))]
    {
        let _ = (fps, frame_size);
        Err(CameraError::Unsupported(format!("recording {}", kind)))
    }
}
