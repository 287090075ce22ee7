//! OpenCV-backed capture, video writer and window.
//!
//! OpenCV hands out BGR matrices. Frames are converted with `cvt_color` on
//! the way in and out so the rest of the pipeline only ever sees RGB.

use std::path::{Path, PathBuf};
use std::time::Instant;

use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::{highgui, imgproc, videoio};
use tracing::{debug, info, warn};

use crate::display::{DisplayAction, FrameDisplay};
use crate::sink::FrameSink;
use crate::source::{FrameSource, SourceFrame, SourceKind, WaitMode};
use crate::{CameraError, VideoFrame};

/// Frame rate assumed when the capture does not report one
pub const FALLBACK_FPS: f64 = 20.0;

/// Consecutive read faults tolerated before a stream is considered ended
const MAX_CONSECUTIVE_FAULTS: u32 = 30;

const QUIT_KEY: i32 = 'q' as i32;

fn cv_err(context: &str, e: opencv::Error) -> CameraError {
    CameraError::Stream(format!("{}: {}", context, e))
}

fn mat_to_frame(mat: &Mat, timestamp_ns: u64, sequence: u32) -> Result<VideoFrame, CameraError> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| cv_err("convert frame to RGB", e))?;

    let width = rgb.cols() as u32;
    let height = rgb.rows() as u32;
    let bytes = rgb
        .data_bytes()
        .map_err(|e| cv_err("read frame bytes", e))?
        .to_vec();

    let mut frame = VideoFrame::from_rgb(bytes, width, height).ok_or_else(|| {
        CameraError::Stream(format!("unexpected frame layout {}x{}", width, height))
    })?;
    frame.timestamp_ns = timestamp_ns;
    frame.sequence = sequence;
    Ok(frame)
}

fn frame_to_mat(frame: &VideoFrame) -> Result<Mat, CameraError> {
    let flat = Mat::from_slice(frame.as_rgb()).map_err(|e| cv_err("wrap frame", e))?;
    let rgb = flat
        .reshape(3, frame.height() as i32)
        .map_err(|e| cv_err("reshape frame", e))?;

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&*rgb, &mut bgr, imgproc::COLOR_RGB2BGR)
        .map_err(|e| cv_err("convert frame to BGR", e))?;
    Ok(bgr)
}

/// Live camera, network stream or video file read through `VideoCapture`
pub struct CaptureSource {
    capture: videoio::VideoCapture,
    description: String,
    opened_at: Instant,
    sequence: u32,
    faults: u32,
}

impl CaptureSource {
    /// Open a streaming source. Fails when the capture cannot be opened.
    pub fn open(kind: &SourceKind) -> Result<Self, CameraError> {
        let capture = match kind {
            SourceKind::Camera(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY),
            SourceKind::Stream(location) => {
                videoio::VideoCapture::from_file(location, videoio::CAP_ANY)
            }
            other => {
                return Err(CameraError::Open(format!("{} is not a streaming source", other)))
            }
        }
        .map_err(|e| CameraError::Open(format!("{}: {}", kind, e)))?;

        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::Open(format!("{}: {}", kind, e)))?;
        if !opened {
            return Err(CameraError::Open(format!("cannot open video source {}", kind)));
        }

        info!("Opened {}", kind);
        Ok(Self {
            capture,
            description: kind.to_string(),
            opened_at: Instant::now(),
            sequence: 0,
            faults: 0,
        })
    }
}

impl FrameSource for CaptureSource {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn next_frame(&mut self) -> Option<Result<SourceFrame, CameraError>> {
        let mut mat = Mat::default();
        match self.capture.read(&mut mat) {
            Ok(true) if !mat.empty() => {}
            Ok(_) => {
                debug!("{} ended", self.description);
                return None;
            }
            Err(e) => {
                self.faults += 1;
                if self.faults >= MAX_CONSECUTIVE_FAULTS {
                    warn!("{}: giving up after {} read faults", self.description, self.faults);
                    return None;
                }
                return Some(Err(cv_err("read frame", e)));
            }
        }
        self.faults = 0;

        let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        Some(mat_to_frame(&mat, timestamp_ns, sequence).map(|frame| SourceFrame {
            frame,
            name: None,
        }))
    }

    fn fps(&self) -> Option<f64> {
        self.capture
            .get(videoio::CAP_PROP_FPS)
            .ok()
            .filter(|fps| fps.is_finite() && *fps > 0.0)
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release {}: {}", self.description, e);
        }
    }
}

/// Encodes annotated frames into `<dir>/output.mp4`
pub struct VideoFileSink {
    writer: Option<videoio::VideoWriter>,
    path: PathBuf,
    written: usize,
}

impl VideoFileSink {
    pub const FILE_NAME: &'static str = "output.mp4";

    /// Create `dir` if needed and open an `mp4v` writer sized to the working
    /// resolution (frames are resized before they reach the sink).
    pub fn create(dir: &Path, fps: f64, width: u32, height: u32) -> Result<Self, CameraError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::FILE_NAME);
        let open_err = |reason: String| CameraError::Write {
            path: path.clone(),
            reason,
        };

        let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v')
            .map_err(|e| open_err(e.to_string()))?;
        let path_str = path
            .to_str()
            .ok_or_else(|| open_err("path is not valid UTF-8".to_string()))?;
        let writer = videoio::VideoWriter::new(
            path_str,
            fourcc,
            fps,
            Size::new(width as i32, height as i32),
            true,
        )
        .map_err(|e| open_err(e.to_string()))?;

        if !writer.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err("video writer failed to open".to_string()));
        }

        info!("Recording to {} at {:.1} fps", path.display(), fps);
        Ok(Self {
            writer: Some(writer),
            path,
            written: 0,
        })
    }
}

impl FrameSink for VideoFileSink {
    fn write(&mut self, frame: &VideoFrame, _name: Option<&str>) -> Result<(), CameraError> {
        let writer = self.writer.as_mut().ok_or_else(|| CameraError::Write {
            path: self.path.clone(),
            reason: "writer already finished".to_string(),
        })?;
        let mat = frame_to_mat(frame)?;
        writer.write(&mat).map_err(|e| CameraError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CameraError> {
        if let Some(mut writer) = self.writer.take() {
            writer.release().map_err(|e| CameraError::Write {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
            info!("Wrote {} frame(s) to {}", self.written, self.path.display());
        }
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

impl Drop for VideoFileSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("{}", e);
        }
    }
}

/// HighGUI window
pub struct HighGuiDisplay {
    window: String,
}

impl HighGuiDisplay {
    /// Fails when OpenCV was built without a GUI backend or no display is
    /// reachable.
    pub fn new(window: &str) -> Result<Self, CameraError> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .map_err(|e| CameraError::Display(e.to_string()))?;
        Ok(Self {
            window: window.to_string(),
        })
    }
}

impl FrameDisplay for HighGuiDisplay {
    fn name(&self) -> &'static str {
        "highgui"
    }

    fn show(&mut self, frame: &VideoFrame, wait: WaitMode) -> Result<DisplayAction, CameraError> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(&self.window, &mat).map_err(|e| CameraError::Display(e.to_string()))?;

        let delay = match wait {
            WaitMode::Poll => 1,
            WaitMode::Block => 0,
        };
        let key = highgui::wait_key(delay).map_err(|e| CameraError::Display(e.to_string()))?;
        if key & 0xFF == QUIT_KEY {
            Ok(DisplayAction::Quit)
        } else {
            Ok(DisplayAction::Continue)
        }
    }
}

impl Drop for HighGuiDisplay {
    fn drop(&mut self) {
        let _ = highgui::destroy_all_windows();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Vec3b;

    fn striped(width: u32, height: u32) -> VideoFrame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[200, (x % 251) as u8, (y % 241) as u8]);
            }
        }
        VideoFrame::from_rgb(data, width, height).unwrap()
    }

    #[test]
    fn test_mat_is_bgr_and_converts_back() {
        let frame = VideoFrame::from_rgb(vec![200, 100, 30, 1, 2, 3], 2, 1).unwrap();

        let mat = frame_to_mat(&frame).unwrap();
        assert_eq!((mat.cols(), mat.rows(), mat.channels()), (2, 1, 3));
        assert_eq!(mat.at_2d::<Vec3b>(0, 0).unwrap().0, [30, 100, 200]);
        assert_eq!(mat.at_2d::<Vec3b>(0, 1).unwrap().0, [3, 2, 1]);

        let back = mat_to_frame(&mat, 42, 7).unwrap();
        assert_eq!(back.get_pixel(0, 0), Some([200, 100, 30]));
        assert_eq!(back.as_rgb(), frame.as_rgb());
        assert_eq!((back.timestamp_ns, back.sequence), (42, 7));
    }

    #[test]
    fn test_video_file_reopens_with_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = VideoFileSink::create(dir.path(), FALLBACK_FPS, 640, 640).unwrap();
        for _ in 0..5 {
            sink.write(&striped(640, 640), None).unwrap();
        }
        sink.finish().unwrap();
        assert_eq!(sink.written(), 5);

        let path = dir.path().join(VideoFileSink::FILE_NAME);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);

        let kind = SourceKind::Stream(path.to_string_lossy().into_owned());
        let mut source = CaptureSource::open(&kind).unwrap();
        let mut frames = 0;
        while let Some(unit) = source.next_frame() {
            let unit = unit.unwrap();
            assert_eq!((unit.frame.width(), unit.frame.height()), (640, 640));
            assert!(unit.frame.as_rgb().iter().any(|&b| b != 0));
            assert_eq!(unit.frame.sequence, frames);
            frames += 1;
        }
        assert_eq!(frames, 5);
    }

    #[test]
    fn test_missing_video_fails_to_open() {
        let kind = SourceKind::Stream("/nonexistent/clip.mp4".to_string());
        assert!(matches!(CaptureSource::open(&kind), Err(CameraError::Open(_))));
    }
}
