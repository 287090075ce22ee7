//! On-screen review of annotated frames

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{CameraError, VideoFrame, WaitMode};

/// Window title shared by every display backend
pub const WINDOW_NAME: &str = "Foggy Vehicle Detection";

/// What the operator asked for after a frame was shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    Continue,
    Quit,
}

/// Shows annotated frames and reports early-exit requests
pub trait FrameDisplay {
    fn name(&self) -> &'static str;

    fn show(&mut self, frame: &VideoFrame, wait: WaitMode) -> Result<DisplayAction, CameraError>;
}

/// Non-interactive backend used when no windowing support is available.
///
/// Each frame overwrites a preview PNG. In [`WaitMode::Block`] the operator
/// confirms on stdin (`q` quits); [`WaitMode::Poll`] never blocks.
pub struct PreviewFileDisplay {
    path: PathBuf,
    input: Box<dyn BufRead + Send>,
    announced: bool,
}

impl PreviewFileDisplay {
    pub fn new(path: PathBuf) -> Self {
        Self::with_input(path, Box::new(io::BufReader::new(io::stdin())))
    }

    pub fn with_input(path: PathBuf, input: Box<dyn BufRead + Send>) -> Self {
        Self {
            path,
            input,
            announced: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wait_for_operator(&mut self) -> Result<DisplayAction, CameraError> {
        eprint!("[{}] Enter: next frame, q + Enter: quit > ", WINDOW_NAME);
        io::stderr().flush()?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read > 0 && line.trim().eq_ignore_ascii_case("q") {
            Ok(DisplayAction::Quit)
        } else {
            Ok(DisplayAction::Continue)
        }
    }
}

impl FrameDisplay for PreviewFileDisplay {
    fn name(&self) -> &'static str {
        "preview-file"
    }

    fn show(&mut self, frame: &VideoFrame, wait: WaitMode) -> Result<DisplayAction, CameraError> {
        frame
            .image()
            .save(&self.path)
            .map_err(|e| CameraError::Display(e.to_string()))?;

        if !self.announced {
            info!("Preview frames are written to {}", self.path.display());
            self.announced = true;
        }

        match wait {
            WaitMode::Poll => Ok(DisplayAction::Continue),
            WaitMode::Block => self.wait_for_operator(),
        }
    }
}

/// Open the best available display: an OpenCV window when compiled with the
/// `opencv` feature and a windowing backend is present, else the preview file.
pub fn open_display() -> Box<dyn FrameDisplay> {
    #[cfg(feature = "opencv")]
    match crate::capture::HighGuiDisplay::new(WINDOW_NAME) {
        Ok(display) => return Box::new(display),
        Err(e) => warn!("No windowing support ({}), using preview file", e),
    }

    #[cfg(not(feature = "opencv"))]
    warn!("Built without the `opencv` feature, using preview file");

    Box::new(PreviewFileDisplay::new(
        std::env::temp_dir().join("fog-detect-preview.png"),
    ))
}
