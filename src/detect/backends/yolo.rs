//! YOLOv5 pre- and post-processing, independent of the inference runtime.
//!
//! Input: letterboxed square RGB image, CHW, scaled to [0, 1].
//! Output rows: `cx, cy, w, h, objectness, class scores...` in input pixels.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

use super::coco::class_name;
use crate::detect::result::Candidate;

/// Grey used by YOLOv5 for letterbox padding.
pub const PAD_VALUE: u8 = 114;

/// Rows scoring below this never become candidates.
pub const CANDIDATE_FLOOR: f32 = 0.25;

/// Upper bound on rows fed to NMS.
const MAX_NMS_INPUTS: usize = 30_000;

/// Placement of the frame inside the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub new_width: u32,
    pub new_height: u32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            size,
            scale,
            new_width,
            new_height,
            pad_x: (size - new_width) / 2,
            pad_y: (size - new_height) / 2,
        }
    }

    /// Map a centre-format box in model input pixels back to frame pixels, clamped.
    pub fn to_frame(&self, cxcywh: [f32; 4], frame_width: u32, frame_height: u32) -> [f32; 4] {
        let [cx, cy, w, h] = cxcywh;
        let unpad_x = |v: f32| (v - self.pad_x as f32) / self.scale;
        let unpad_y = |v: f32| (v - self.pad_y as f32) / self.scale;
        [
            unpad_x(cx - w / 2.0).clamp(0.0, frame_width as f32),
            unpad_y(cy - h / 2.0).clamp(0.0, frame_height as f32),
            unpad_x(cx + w / 2.0).clamp(0.0, frame_width as f32),
            unpad_y(cy + h / 2.0).clamp(0.0, frame_height as f32),
        ]
    }
}

/// Letterbox an RGB frame into a `3 x size x size` CHW buffer.
pub fn letterbox_chw(rgb: &[u8], width: u32, height: u32, size: u32) -> Result<(Vec<f32>, Letterbox)> {
    let image = RgbImage::from_raw(width, height, rgb.to_vec())
        .ok_or_else(|| anyhow!("RGB buffer does not match {}x{}", width, height))?;
    let letterbox = Letterbox::fit(width, height, size);
    let resized = imageops::resize(
        &image,
        letterbox.new_width,
        letterbox.new_height,
        imageops::FilterType::Triangle,
    );

    let side = size as usize;
    let plane = side * side;
    let mut chw = vec![PAD_VALUE as f32 / 255.0; plane * 3];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let dst = (y + letterbox.pad_y) as usize * side + (x + letterbox.pad_x) as usize;
        for channel in 0..3 {
            chw[channel * plane + dst] = pixel[channel] as f32 / 255.0;
        }
    }
    Ok((chw, letterbox))
}

#[derive(Clone, Debug)]
struct Scored {
    class_index: usize,
    score: f32,
    xyxy: [f32; 4],
}

/// Decode a `[rows, stride]` YOLOv5 output into frame-space candidates after per-class NMS.
pub fn decode(
    output: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    frame_width: u32,
    frame_height: u32,
    iou_threshold: f32,
) -> Result<Vec<Candidate>> {
    if stride < 6 || output.len() % stride != 0 {
        return Err(anyhow!(
            "unexpected YOLO output: {} values with row stride {}",
            output.len(),
            stride
        ));
    }
    let class_count = stride - 5;

    let mut scored = Vec::new();
    for row in output.chunks_exact(stride) {
        let objectness = row[4];
        if !(objectness >= CANDIDATE_FLOOR) {
            continue;
        }
        let (class_index, class_score) = row[5..].iter().copied().enumerate().fold(
            (0usize, f32::NEG_INFINITY),
            |best, (idx, score)| if score > best.1 { (idx, score) } else { best },
        );
        let score = objectness * class_score;
        if !(score >= CANDIDATE_FLOOR) {
            continue;
        }
        let cxcywh = [row[0], row[1], row[2], row[3]];
        if cxcywh.iter().any(|v| !v.is_finite()) || cxcywh[2] <= 0.0 || cxcywh[3] <= 0.0 {
            continue;
        }
        scored.push(Scored {
            class_index,
            score: score.min(1.0),
            xyxy: letterbox.to_frame(cxcywh, frame_width, frame_height),
        });
    }

    Ok(nms(scored, iou_threshold)
        .into_iter()
        .map(|s| Candidate::new(class_name(s.class_index, class_count), s.score, s.xyxy))
        .collect())
}

fn nms(mut detections: Vec<Scored>, iou_threshold: f32) -> Vec<Scored> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));
    if detections.len() > MAX_NMS_INPUTS {
        log::warn!(
            "NMS input truncated from {} to {}",
            detections.len(),
            MAX_NMS_INPUTS
        );
        detections.truncate(MAX_NMS_INPUTS);
    }

    let mut keep: Vec<Scored> = Vec::new();
    for candidate in detections {
        let suppressed = keep.iter().any(|kept| {
            kept.class_index == candidate.class_index
                && iou(&kept.xyxy, &candidate.xyxy) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
