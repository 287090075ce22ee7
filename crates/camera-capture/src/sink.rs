//! Annotated frame output

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{CameraError, VideoFrame};

/// Destination for annotated frames
pub trait FrameSink {
    /// Persist one frame. `name` is the source file name for image sources.
    fn write(&mut self, frame: &VideoFrame, name: Option<&str>) -> Result<(), CameraError>;

    /// Flush and release the underlying resource. Safe to call more than once.
    fn finish(&mut self) -> Result<(), CameraError> {
        Ok(())
    }

    /// Number of frames written so far
    fn written(&self) -> usize;
}

/// Writes one annotated image per input, keeping the input's basename
pub struct ImageDirSink {
    dir: PathBuf,
    written: usize,
}

impl ImageDirSink {
    /// Create the sink, creating `dir` if it does not exist
    pub fn new(dir: &Path) -> Result<Self, CameraError> {
        fs::create_dir_all(dir)?;
        info!("Writing annotated images to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    fn target(&self, frame: &VideoFrame, name: Option<&str>) -> PathBuf {
        match name {
            Some(name) => self.dir.join(name),
            None => self.dir.join(format!("frame_{:06}.png", frame.sequence)),
        }
    }
}

impl FrameSink for ImageDirSink {
    fn write(&mut self, frame: &VideoFrame, name: Option<&str>) -> Result<(), CameraError> {
        let path = self.target(frame, name);
        frame.image().save(&path).map_err(|e| CameraError::Write {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        self.written += 1;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_directory_and_keeps_basename() {
        let root = tempfile::tempdir().unwrap();
        let out = root.path().join("nested").join("out");
        let mut sink = ImageDirSink::new(&out).unwrap();

        let frame = VideoFrame::from_rgb(vec![200; 16 * 16 * 3], 16, 16).unwrap();
        sink.write(&frame, Some("fog_001.png")).unwrap();
        sink.write(&frame, None).unwrap();

        assert!(out.join("fog_001.png").is_file());
        assert!(out.join("frame_000000.png").is_file());
        assert_eq!(sink.written(), 2);
    }

    #[test]
    fn test_unknown_extension_is_write_error() {
        let root = tempfile::tempdir().unwrap();
        let mut sink = ImageDirSink::new(root.path()).unwrap();
        let frame = VideoFrame::from_rgb(vec![0; 12], 2, 2).unwrap();

        let err = sink.write(&frame, Some("frame.unknownext")).unwrap_err();
        assert!(matches!(err, CameraError::Write { .. }));
        assert_eq!(sink.written(), 0);
    }
}
