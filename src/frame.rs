//! Frame container shared by sources, the detector and the annotator.
//!
//! A `Frame` holds packed 8-bit pixels, row-major, no padding, in **BGR**
//! channel order. BGR is the contract at the capture/display boundary:
//!
//! - Frame sources hand the pipeline BGR frames (converting if the device
//!   delivers something else).
//! - Display sinks receive BGR frames.
//! - The inference adapter is the only place that converts to RGB.

use anyhow::{anyhow, Result};

/// Bytes per pixel.
pub const CHANNELS: usize = 3;

/// One raster image, owned by the pipeline for the duration of a cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Packed BGR bytes, `width * height * 3` long.
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap BGR bytes. Fails when the buffer length does not match the dimensions.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "BGR frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Wrap RGB bytes, converting them to the pipeline's BGR order.
    pub fn from_rgb(mut data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        swap_red_blue(&mut data);
        Self::from_bgr(data, width, height)
    }

    /// A frame of a single colour (BGR).
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Result<Self> {
        let len = expected_len(width, height)?;
        let data = bgr.iter().copied().cycle().take(len).collect();
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bgr_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bgr(self) -> Vec<u8> {
        self.data
    }

    /// Copy of the pixels in RGB order, as detection models expect them.
    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = self.data.clone();
        swap_red_blue(&mut rgb);
        rgb
    }

    /// BGR value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }
}

/// Byte length of a packed 3-channel frame.
pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero ({}x{})", width, height));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// Swap the first and third channel of every pixel (BGR <-> RGB).
pub fn swap_red_blue(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(CHANNELS) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_length_mismatch() {
        assert!(Frame::from_bgr(vec![0u8; 10], 2, 2).is_err());
        assert!(Frame::from_bgr(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(Frame::from_bgr(Vec::new(), 0, 4).is_err());
        assert!(Frame::filled(4, 0, [0, 0, 0]).is_err());
    }

    #[test]
    fn rgb_conversion_swaps_channels() -> Result<()> {
        let frame = Frame::from_bgr(vec![1, 2, 3, 4, 5, 6], 2, 1)?;
        assert_eq!(frame.to_rgb(), vec![3, 2, 1, 6, 5, 4]);
        // Source buffer keeps BGR order.
        assert_eq!(frame.as_bgr(), &[1, 2, 3, 4, 5, 6]);

        let from_rgb = Frame::from_rgb(vec![3, 2, 1], 1, 1)?;
        assert_eq!(from_rgb.pixel(0, 0), Some([1, 2, 3]));
        Ok(())
    }

    #[test]
    fn pixel_lookup_is_bounds_checked() -> Result<()> {
        let frame = Frame::filled(3, 2, [0, 255, 0])?;
        assert_eq!(frame.pixel(2, 1), Some([0, 255, 0]));
        assert_eq!(frame.pixel(3, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
        Ok(())
    }
}
