use anyhow::{anyhow, Result};

use super::{FrameSource, SourceSettings};
use crate::frame::{expected_len, Frame};

/// Deterministic frames for `stub://` URIs.
///
/// Simulates a scene that shifts every 50 frames. With `max_frames` set, the
/// stream ends after that many reads and the next `read` fails.
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    max_frames: Option<u64>,
    frame_count: u64,
    scene_state: u8,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            name: settings.uri.clone(),
            width: settings.width,
            height: settings.height,
            max_frames: settings.max_frames,
            frame_count: 0,
            scene_state: 0,
            opened: false,
        }
    }

    pub fn frames_read(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Result<Vec<u8>> {
        let len = expected_len(self.width, self.height)?;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.frame_count + self.scene_state as u64;
        Ok((0..len)
            .map(|i| ((i as u64 + shift) % 256) as u8)
            .collect())
    }
}

impl FrameSource for SyntheticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        expected_len(self.width, self.height)?;
        self.opened = true;
        log::info!(
            "SyntheticSource: opened {} ({}x{})",
            self.name,
            self.width,
            self.height
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("source {} is not open", self.name));
        }
        if let Some(limit) = self.max_frames {
            if self.frame_count >= limit {
                return Err(anyhow!("{}: end of stream after {} frames", self.name, limit));
            }
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels()?;
        Frame::from_bgr(pixels, self.width, self.height)
    }

    fn release(&mut self) {
        if self.opened {
            log::debug!(
                "SyntheticSource: released {} after {} frames",
                self.name,
                self.frame_count
            );
        }
        self.opened = false;
    }
}
