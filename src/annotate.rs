//! Drawing accepted detections onto frames.
//!
//! Box policy:
//! - boxes partly outside the frame are clamped to `[0, width] x [0, height]` and drawn;
//! - boxes entirely outside, or empty once clamped, are skipped with a warning;
//! - the outline grows inward from the clamped box and stops at the last pixel
//!   column and row, so a box one pixel wide at the right edge is still drawn.
//!
//! Label policy: the label sits `LABEL_OFFSET` pixels above the box's top-left
//! corner. If that would place it above the frame it is moved down to row 0.
//! It is not clamped horizontally; glyph pixels beyond the right edge are clipped.
//! Labels are rendered with the bundled DejaVu Sans Mono unless another font is given.

use std::path::Path;

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;

/// Outline colour, BGR.
pub const BOX_COLOR: [u8; 3] = [0, 255, 0];
pub const BOX_THICKNESS: i32 = 2;
/// Label colour, BGR.
pub const LABEL_COLOR: [u8; 3] = [0, 255, 0];
pub const LABEL_THICKNESS: i32 = 2;
/// Gap between the label's baseline and the top of the box.
pub const LABEL_OFFSET: i32 = 10;
/// Glyph height in pixels.
pub const DEFAULT_FONT_SCALE: f32 = 16.0;

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSansMono.ttf");

/// What was drawn for one detection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Annotation {
    pub label: String,
    /// Box after clamping to `[0, width] x [0, height]`.
    pub bbox: BoundingBox,
    /// Top-left corner of the label text.
    pub label_origin: (i32, i32),
}

pub struct Annotator {
    font: Option<FontArc>,
    font_scale: f32,
}

impl Annotator {
    /// Annotator drawing labels with the bundled font.
    pub fn new() -> Result<Self> {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|_| anyhow!("bundled label font is not a usable font"))?;
        Ok(Self::with_font(font))
    }

    /// Annotator that draws boxes only; labels are still computed and reported.
    pub fn without_font() -> Self {
        Self {
            font: None,
            font_scale: DEFAULT_FONT_SCALE,
        }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            font_scale: DEFAULT_FONT_SCALE,
        }
    }

    /// Load a TrueType/OpenType font from disk.
    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|_| anyhow!("{} is not a usable font file", path.display()))?;
        Ok(Self::with_font(font))
    }

    pub fn with_font_scale(mut self, scale: f32) -> Self {
        self.font_scale = scale;
        self
    }

    pub fn renders_text(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `detections` onto `frame` in order; later detections draw on top.
    ///
    /// The frame is modified in place. Returns one `Annotation` per drawn detection.
    pub fn annotate(&self, frame: &mut Frame, detections: &[Detection]) -> Vec<Annotation> {
        let (width, height) = (frame.width, frame.height);
        let mut annotations = Vec::with_capacity(detections.len());
        let Some(mut canvas) =
            ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, frame.as_bgr_mut())
        else {
            log::error!("frame buffer does not match {}x{}; nothing drawn", width, height);
            return annotations;
        };

        for detection in detections {
            let Some(bbox) = clamp_to_frame(detection.bbox(), width, height) else {
                log::warn!(
                    "skipping '{}': box {:?} lies outside the {}x{} frame",
                    detection.class_name(),
                    detection.bbox(),
                    width,
                    height
                );
                continue;
            };

            draw_box(&mut canvas, bbox);

            let label = detection.label();
            let label_origin = self.label_origin(bbox);
            if let Some(font) = &self.font {
                for dx in 0..LABEL_THICKNESS {
                    draw_text_mut(
                        &mut canvas,
                        Rgb(LABEL_COLOR),
                        label_origin.0 + dx,
                        label_origin.1,
                        self.font_scale,
                        font,
                        &label,
                    );
                }
            }

            annotations.push(Annotation {
                label,
                bbox,
                label_origin,
            });
        }
        annotations
    }

    fn label_origin(&self, bbox: BoundingBox) -> (i32, i32) {
        let text_height = self.font_scale.ceil() as i32;
        let top = bbox.y1() - LABEL_OFFSET - text_height;
        (bbox.x1(), top.max(0))
    }
}

/// Clamp to the frame's edges; `None` when nothing is left inside it.
fn clamp_to_frame(bbox: BoundingBox, width: u32, height: u32) -> Option<BoundingBox> {
    BoundingBox::new(
        bbox.x1().max(0),
        bbox.y1().max(0),
        bbox.x2().min(width as i32),
        bbox.y2().min(height as i32),
    )
    .ok()
}

// The canvas channels are BGR; `Rgb` is only the 3-channel container type.
fn draw_box(canvas: &mut ImageBuffer<Rgb<u8>, &mut [u8]>, bbox: BoundingBox) {
    let last_x = canvas.width() as i32 - 1;
    let last_y = canvas.height() as i32 - 1;
    let (right, bottom) = (bbox.x2().min(last_x), bbox.y2().min(last_y));
    for inset in 0..BOX_THICKNESS {
        let (x1, y1) = (bbox.x1() + inset, bbox.y1() + inset);
        let (x2, y2) = (right - inset, bottom - inset);
        if x1 > x2 || y1 > y2 {
            break;
        }
        let rect = Rect::at(x1, y1).of_size((x2 - x1 + 1) as u32, (y2 - y1 + 1) as u32);
        draw_hollow_rect_mut(canvas, rect, Rgb(BOX_COLOR));
    }
}
