//! Source classification and frame sources

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{CameraError, VideoFrame};

/// Prefixes that select a network capture source. Anything starting with
/// `http` also covers `https://`.
const STREAM_PREFIXES: [&str; 3] = ["http", "rtsp://", "rtmp://"];

/// Extensions opened through the video capture backend
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Extensions accepted when walking an image directory
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// What the operator asked to read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// Local camera index (e.g. 0 for the built-in webcam)
    Camera(i32),
    /// URL, video file, image file or image directory
    Location(String),
}

/// Classified source, decided once before streaming starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Camera(i32),
    Stream(String),
    ImageDirectory(PathBuf),
    ImageFile(PathBuf),
}

impl SourceKind {
    /// Live cameras, network streams and video files
    pub fn is_streaming(&self) -> bool {
        matches!(self, SourceKind::Camera(_) | SourceKind::Stream(_))
    }

    /// How long the display waits after each frame from this source
    pub fn wait_mode(&self) -> WaitMode {
        if self.is_streaming() {
            WaitMode::Poll
        } else {
            WaitMode::Block
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Camera(index) => write!(f, "camera #{}", index),
            SourceKind::Stream(url) => write!(f, "stream {}", url),
            SourceKind::ImageDirectory(dir) => write!(f, "image directory {}", dir.display()),
            SourceKind::ImageFile(path) => write!(f, "image {}", path.display()),
        }
    }
}

/// Display wait policy after a frame is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Non-blocking key poll (~1ms), used for streaming sources
    Poll,
    /// Wait for the operator before moving on (single-image review)
    Block,
}

/// Classify an input into a source kind.
///
/// Order matters: camera index, then network/video names (which need not
/// exist on disk), then directory, then file.
pub fn classify(input: &SourceInput) -> Result<SourceKind, CameraError> {
    let location = match input {
        SourceInput::Camera(index) => return Ok(SourceKind::Camera(*index)),
        SourceInput::Location(location) => location,
    };

    if is_stream_location(location) {
        return Ok(SourceKind::Stream(location.clone()));
    }

    let path = Path::new(location);
    if path.is_dir() {
        Ok(SourceKind::ImageDirectory(path.to_path_buf()))
    } else if path.is_file() {
        Ok(SourceKind::ImageFile(path.to_path_buf()))
    } else {
        Err(CameraError::NotFound(path.to_path_buf()))
    }
}

fn is_stream_location(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    STREAM_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || has_extension(Path::new(&lower), &VIDEO_EXTENSIONS)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut images = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, &IMAGE_EXTENSIONS) {
            images.push(path);
        }
    }
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(images)
}

/// One raw unit pulled from a source
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub frame: VideoFrame,
    /// File name for image sources, used as the output basename
    pub name: Option<String>,
}

/// Pull-based frame source.
///
/// `None` means the source is exhausted. `Some(Err(_))` is a single unit that
/// failed to decode; callers may skip it and keep pulling.
pub trait FrameSource {
    /// Human readable description for logs
    fn describe(&self) -> String;

    fn next_frame(&mut self) -> Option<Result<SourceFrame, CameraError>>;

    /// Native frame rate, when the source knows it
    fn fps(&self) -> Option<f64> {
        None
    }
}

/// Sequence of still images decoded with the `image` crate
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        info!("Image sequence with {} file(s)", paths.len());
        Self { paths, position: 0 }
    }

    /// Sorted images of a directory
    pub fn from_directory(dir: &Path) -> Result<Self, CameraError> {
        Ok(Self::new(list_images(dir)?))
    }

    pub fn single(path: PathBuf) -> Self {
        Self::new(vec![path])
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn describe(&self) -> String {
        format!("{} image(s)", self.paths.len())
    }

    fn next_frame(&mut self) -> Option<Result<SourceFrame, CameraError>> {
        let path = self.paths.get(self.position)?;
        let sequence = self.position as u32;
        self.position += 1;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let decoded = image::open(path).map_err(|e| CameraError::Decode {
            name: name.clone(),
            reason: e.to_string(),
        });

        Some(decoded.map(|img| {
            debug!("Decoded {} ({}x{})", name, img.width(), img.height());
            SourceFrame {
                frame: VideoFrame::new(img.into_rgb8(), 0, sequence),
                name: Some(name),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use proptest::prelude::*;

    #[test]
    fn test_camera_index_is_camera() {
        assert_eq!(
            classify(&SourceInput::Camera(0)).unwrap(),
            SourceKind::Camera(0)
        );
    }

    #[test]
    fn test_network_and_video_names_are_streams() {
        for location in [
            "http://192.168.1.5:8080/video",
            "https://cam.local/live",
            "rtsp://10.0.0.2/stream",
            "clips/fog.MP4",
            "missing.avi",
            "drive.mov",
        ] {
            let kind = classify(&SourceInput::Location(location.to_string())).unwrap();
            assert_eq!(kind, SourceKind::Stream(location.to_string()), "{}", location);
            assert_eq!(kind.wait_mode(), WaitMode::Poll);
        }
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let err = classify(&SourceInput::Location("/no/such/fog.jpg".into())).unwrap_err();
        assert!(matches!(err, CameraError::NotFound(_)));
        assert!(err.to_string().contains("/no/such/fog.jpg"));
    }

    #[test]
    fn test_directory_and_file_classification() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        RgbImage::new(4, 4).save(&file).unwrap();

        let kind = classify(&SourceInput::Location(dir.path().display().to_string())).unwrap();
        assert_eq!(kind, SourceKind::ImageDirectory(dir.path().to_path_buf()));
        assert_eq!(kind.wait_mode(), WaitMode::Block);

        let kind = classify(&SourceInput::Location(file.display().to_string())).unwrap();
        assert_eq!(kind, SourceKind::ImageFile(file));
    }

    #[test]
    fn test_list_images_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.jpg", "a.PNG", "b.jpeg", "notes.txt", "d.bmp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.png")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.jpeg", "c.jpg"]);
    }

    #[test]
    fn test_sequence_yields_decode_error_then_continues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a_broken.jpg"), b"not a jpeg").unwrap();
        RgbImage::from_pixel(8, 6, image::Rgb([1, 2, 3]))
            .save(dir.path().join("b_good.png"))
            .unwrap();

        let mut source = ImageSequenceSource::from_directory(dir.path()).unwrap();
        assert_eq!(source.len(), 2);

        let first = source.next_frame().unwrap();
        assert!(matches!(first, Err(CameraError::Decode { .. })));

        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.name.as_deref(), Some("b_good.png"));
        assert_eq!((second.frame.width(), second.frame.height()), (8, 6));
        assert_eq!(second.frame.get_pixel(0, 0), Some([1, 2, 3]));

        assert!(source.next_frame().is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_list_images_sorted_and_only_images(
            files in proptest::collection::btree_set(
                ("[a-z0-9]{1,8}", prop::sample::select(vec!["jpg", "JPEG", "png", "Png", "txt", "bmp", "gif", "mp4"])),
                0..12,
            )
        ) {
            let dir = tempfile::tempdir().unwrap();
            for (stem, ext) in &files {
                fs::write(dir.path().join(format!("{}.{}", stem, ext)), b"x").unwrap();
            }

            let names: Vec<String> = list_images(dir.path())
                .unwrap()
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect();

            let mut expected: Vec<String> = files
                .iter()
                .filter(|(_, ext)| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
                .map(|(stem, ext)| format!("{}.{}", stem, ext))
                .collect();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(names, expected);
        }
    }
}
