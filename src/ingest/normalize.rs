use anyhow::{anyhow, Context, Result};

use crate::frame::{expected_len, swap_red_blue};

/// Pixel layouts a capture device may hand back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Bgr24,
    Rgb24,
    Nv12,
    /// Packed 4:2:2, `Y0 U Y1 V` per pixel pair.
    Yuyv,
    /// One JPEG image per buffer.
    Mjpeg,
}

/// Convert a captured buffer into packed BGR.
pub(crate) fn normalize_to_bgr(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Bgr24 => {
            check_packed_len(pixels, width, height, "BGR")?;
            Ok(pixels.to_vec())
        }
        PixelFormat::Rgb24 => {
            check_packed_len(pixels, width, height, "RGB")?;
            let mut bgr = pixels.to_vec();
            swap_red_blue(&mut bgr);
            Ok(bgr)
        }
        PixelFormat::Nv12 => nv12_to_bgr(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_bgr(pixels, width, height),
        PixelFormat::Mjpeg => jpeg_to_bgr(pixels, width, height),
    }
}

fn check_packed_len(pixels: &[u8], width: u32, height: u32, label: &str) -> Result<()> {
    let expected = expected_len(width, height)?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "{} frame length mismatch: expected {}, got {}",
            label,
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

fn nv12_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let y_plane = w
        .checked_mul(h)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() != expected {
        return Err(anyhow!(
            "NV12 frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut bgr = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let y = pixels[j * w + i] as f32;
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let u = pixels[uv_index] as f32 - 128.0;
            let v = pixels[uv_index + 1] as f32 - 128.0;

            let offset = (j * w + i) * 3;
            bgr[offset] = clamp_to_u8(y + 1.772_f32 * u);
            bgr[offset + 1] = clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v);
            bgr[offset + 2] = clamp_to_u8(y + 1.402_f32 * v);
        }
    }

    Ok(bgr)
}

fn yuyv_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width {} is not even", width));
    }
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    let expected = pixel_count * 2;
    if pixels.len() != expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut bgr = Vec::with_capacity(pixel_count * 3);
    for pair in pixels.chunks_exact(4) {
        let u = pair[1] as f32 - 128.0;
        let v = pair[3] as f32 - 128.0;
        for y in [pair[0] as f32, pair[2] as f32] {
            bgr.push(clamp_to_u8(y + 1.772_f32 * u));
            bgr.push(clamp_to_u8(y - 0.344_136_f32 * u - 0.714_136_f32 * v));
            bgr.push(clamp_to_u8(y + 1.402_f32 * v));
        }
    }
    Ok(bgr)
}

fn jpeg_to_bgr(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = image::load_from_memory_with_format(pixels, image::ImageFormat::Jpeg)
        .context("decode MJPG frame")?
        .to_rgb8();
    if image.dimensions() != (width, height) {
        return Err(anyhow!(
            "MJPG frame is {}x{}, expected {}x{}",
            image.width(),
            image.height(),
            width,
            height
        ));
    }
    let mut bgr = image.into_raw();
    swap_red_blue(&mut bgr);
    Ok(bgr)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_neutral_chroma_is_gray() -> Result<()> {
        let nv12 = [vec![128u8; 4], vec![128u8; 2]].concat();
        let bgr = normalize_to_bgr(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(bgr, vec![128u8; 12]);
        Ok(())
    }

    #[test]
    fn nv12_red_lands_in_last_channel() -> Result<()> {
        // Full-scale V pushes red up and leaves blue at luma.
        let nv12 = [vec![100u8; 4], vec![128u8, 255u8]].concat();
        let bgr = normalize_to_bgr(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(bgr[0], 100);
        assert!(bgr[2] > 200);
        Ok(())
    }

    #[test]
    fn rgb_input_is_swapped() -> Result<()> {
        let bgr = normalize_to_bgr(&[1, 2, 3], 1, 1, PixelFormat::Rgb24)?;
        assert_eq!(bgr, vec![3, 2, 1]);
        Ok(())
    }

    #[test]
    fn packed_formats_validate_length() {
        assert!(normalize_to_bgr(&[0u8; 8], 1, 3, PixelFormat::Bgr24).is_err());
        assert!(normalize_to_bgr(&[0u8; 5], 2, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_bgr(&[0u8; 6], 2, 2, PixelFormat::Yuyv).is_err());
        assert!(normalize_to_bgr(&[0u8; 6], 3, 1, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn yuyv_pairs_share_chroma() -> Result<()> {
        // Two pixel pairs: neutral gray, then full-scale V (red).
        let yuyv = [128u8, 128, 128, 128, 100, 128, 100, 255];
        let bgr = normalize_to_bgr(&yuyv, 4, 1, PixelFormat::Yuyv)?;
        assert_eq!(&bgr[..6], &[128u8; 6]);
        for pixel in bgr[6..].chunks_exact(3) {
            assert_eq!(pixel[0], 100);
            assert!(pixel[2] > 200);
        }
        Ok(())
    }

    #[test]
    fn mjpeg_frames_decode_to_bgr() -> Result<()> {
        let mut jpeg = Vec::new();
        image::RgbImage::from_pixel(8, 8, image::Rgb([250, 10, 10]))
            .write_to(&mut std::io::Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)?;

        let bgr = normalize_to_bgr(&jpeg, 8, 8, PixelFormat::Mjpeg)?;
        assert_eq!(bgr.len(), 8 * 8 * 3);
        assert!(bgr[2] > 200 && bgr[0] < 60, "red lands in the last channel: {:?}", &bgr[..3]);

        assert!(normalize_to_bgr(&jpeg, 16, 8, PixelFormat::Mjpeg).is_err());
        assert!(normalize_to_bgr(b"not a jpeg", 8, 8, PixelFormat::Mjpeg).is_err());
        Ok(())
    }
}
