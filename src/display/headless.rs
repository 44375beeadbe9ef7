use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::DisplaySink;
use crate::frame::Frame;

const PROGRESS_EVERY: u64 = 100;

/// Sink for machines without a screen. Never reports a key press.
pub struct HeadlessDisplay {
    save_dir: Option<PathBuf>,
    frames_shown: u64,
}

impl HeadlessDisplay {
    pub fn new(save_dir: Option<PathBuf>) -> Self {
        Self {
            save_dir,
            frames_shown: 0,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    fn save(&self, dir: &Path, frame: &Frame) -> Result<()> {
        let path = dir.join(format!("frame_{:06}.jpg", self.frames_shown));
        let image = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        image
            .save(&path)
            .with_context(|| format!("write {}", path.display()))
    }
}

impl DisplaySink for HeadlessDisplay {
    fn name(&self) -> &str {
        "headless"
    }

    fn open(&mut self) -> Result<()> {
        if let Some(dir) = &self.save_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create frame directory {}", dir.display()))?;
            log::info!("HeadlessDisplay: writing frames to {}", dir.display());
        }
        Ok(())
    }

    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        self.frames_shown += 1;
        if self.frames_shown % PROGRESS_EVERY == 0 {
            log::info!("{}: {} frames", window, self.frames_shown);
        }
        if let Some(dir) = &self.save_dir {
            self.save(dir, frame)?;
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        None
    }

    fn close_all(&mut self) {
        log::debug!("HeadlessDisplay: closed after {} frames", self.frames_shown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_frames_without_writing() -> Result<()> {
        let mut sink = HeadlessDisplay::new(None);
        sink.open()?;
        let frame = Frame::filled(4, 4, [0, 0, 0])?;
        sink.show("test", &frame)?;
        sink.show("test", &frame)?;
        assert_eq!(sink.frames_shown(), 2);
        assert_eq!(sink.poll_key(), None);
        sink.close_all();
        Ok(())
    }

    #[test]
    fn writes_numbered_jpegs_in_rgb_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("frames");
        let mut sink = HeadlessDisplay::new(Some(out.clone()));
        sink.open()?;
        let frame = Frame::filled(16, 16, [255, 0, 0])?;
        sink.show("test", &frame)?;

        let saved = image::open(out.join("frame_000001.jpg"))?.to_rgb8();
        assert_eq!(saved.dimensions(), (16, 16));
        let pixel = saved.get_pixel(8, 8);
        assert!(pixel[2] > 200, "blue channel was {:?}", pixel);
        assert!(pixel[0] < 60, "red channel was {:?}", pixel);
        Ok(())
    }
}
