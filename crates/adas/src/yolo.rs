//! YOLOv8 pre- and post-processing shared by the inference backends

use camera_capture::VideoFrame;
use image::imageops::FilterType;

use crate::object::RawDetection;
use crate::AdasError;

/// COCO-80 class names, the default YOLOv8 label set
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

pub fn coco_class_names() -> Vec<String> {
    COCO_CLASSES.iter().map(|s| s.to_string()).collect()
}

/// Parse the `names` metadata entry exported with YOLO models,
/// e.g. `{0: 'car', 1: 'truck', 2: 'bus'}`.
///
/// Commas inside quoted names are kept. Sparse indices are filled with their
/// number; an index far beyond the entry count rejects the whole mapping.
pub fn parse_class_names(raw: &str) -> Option<Vec<String>> {
    let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;

    let mut entries = Vec::new();
    for entry in split_unquoted(body, ',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (index, name) = entry.split_once(':')?;
        let index: usize = index.trim().parse().ok()?;
        let name = name.trim().trim_matches(|c| c == '\'' || c == '"');
        entries.push((index, name.to_string()));
    }

    let len = entries.iter().map(|(i, _)| i.saturating_add(1)).max()?;
    if len > entries.len() * MAX_INDEX_SPREAD {
        return None;
    }
    let mut names: Vec<String> = (0..len).map(|i| i.to_string()).collect();
    for (index, name) in entries {
        names[index] = name;
    }
    Some(names)
}

/// Largest ratio of highest index to entry count accepted in `names`
const MAX_INDEX_SPREAD: usize = 4;

/// Split on `separator` outside single- or double-quoted runs
fn split_unquoted(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (pos, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == separator => {
                parts.push(&text[start..pos]);
                start = pos + c.len_utf8();
            }
            None => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// NCHW float input in `[0, 1]`, RGB channel order, stretched to `size x size`
pub fn preprocess(frame: &VideoFrame, size: u32) -> Vec<f32> {
    let resized;
    let image = if frame.width() == size && frame.height() == size {
        frame.image()
    } else {
        resized = image::imageops::resize(frame.image(), size, size, FilterType::Triangle);
        &resized
    };

    let plane = (size * size) as usize;
    let raw = image.as_raw();
    let mut tensor = vec![0f32; 3 * plane];
    for idx in 0..plane {
        tensor[idx] = raw[idx * 3] as f32 / 255.0;
        tensor[plane + idx] = raw[idx * 3 + 1] as f32 / 255.0;
        tensor[2 * plane + idx] = raw[idx * 3 + 2] as f32 / 255.0;
    }
    tensor
}

/// Turns the `[1, 4 + C, N]` head output into scored, suppressed boxes
#[derive(Debug, Clone)]
pub struct YoloDecoder {
    class_names: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
    input_size: u32,
}

impl YoloDecoder {
    pub fn new(
        class_names: Vec<String>,
        confidence_threshold: f32,
        iou_threshold: f32,
        input_size: u32,
    ) -> Self {
        Self {
            class_names,
            confidence_threshold,
            iou_threshold,
            input_size,
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Decode into frame pixel coordinates.
    ///
    /// Both `[1, 4 + C, N]` and the transposed `[1, N, 4 + C]` layouts are
    /// accepted; the smaller axis is taken as the feature axis.
    pub fn decode(
        &self,
        data: &[f32],
        shape: &[usize],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<RawDetection>, AdasError> {
        let (rows, cols) = match shape {
            [1, rows, cols] => (*rows, *cols),
            [rows, cols] => (*rows, *cols),
            other => {
                return Err(AdasError::Inference(format!(
                    "unexpected output shape {:?}",
                    other
                )))
            }
        };
        if data.len() != rows * cols {
            return Err(AdasError::Inference(format!(
                "output has {} values, shape {:?} needs {}",
                data.len(),
                shape,
                rows * cols
            )));
        }

        let channel_major = rows <= cols;
        let (features, proposals) = if channel_major { (rows, cols) } else { (cols, rows) };
        if features <= 4 {
            return Err(AdasError::Inference(format!(
                "output shape {:?} has no class scores",
                shape
            )));
        }
        let num_classes = features - 4;
        let at = |feature: usize, proposal: usize| {
            if channel_major {
                data[feature * proposals + proposal]
            } else {
                data[proposal * features + feature]
            }
        };

        let scale_x = frame_width as f32 / self.input_size as f32;
        let scale_y = frame_height as f32 / self.input_size as f32;
        let (max_x, max_y) = (frame_width as f32, frame_height as f32);

        let mut candidates = Vec::new();
        for i in 0..proposals {
            let mut best_class = 0;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let score = at(4 + c, i);
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score.is_nan() || best_score < self.confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
            candidates.push(Candidate {
                class: best_class,
                score: best_score,
                bbox: [
                    ((cx - w / 2.0) * scale_x).clamp(0.0, max_x),
                    ((cy - h / 2.0) * scale_y).clamp(0.0, max_y),
                    ((cx + w / 2.0) * scale_x).clamp(0.0, max_x),
                    ((cy + h / 2.0) * scale_y).clamp(0.0, max_y),
                ],
            });
        }

        Ok(nms(candidates, self.iou_threshold)
            .into_iter()
            .map(|c| RawDetection {
                label: self
                    .class_names
                    .get(c.class)
                    .cloned()
                    .unwrap_or_else(|| c.class.to_string()),
                confidence: c.score,
                bbox: c.bbox,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    class: usize,
    score: f32,
    bbox: [f32; 4],
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);
    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area = |r: &[f32; 4]| (r[2] - r[0]) * (r[3] - r[1]);
    inter / (area(a) + area(b) - inter)
}

/// Greedy class-aware NMS, highest score first
fn nms(mut boxes: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(boxes[i]);
        for j in (i + 1)..boxes.len() {
            if boxes[j].class == boxes[i].class && iou(&boxes[i].bbox, &boxes[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }
    kept
}
