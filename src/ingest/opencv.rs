use anyhow::{anyhow, Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};

use super::{FrameSource, SourceSettings};
use crate::frame::Frame;

/// Camera capture through OpenCV `videoio`. Frames arrive as `CV_8UC3` BGR.
pub struct OpenCvSource {
    settings: SourceSettings,
    index: i32,
    capture: Option<VideoCapture>,
    frame: Mat,
    frame_count: u64,
}

impl OpenCvSource {
    pub fn new(settings: &SourceSettings, index: i32) -> Self {
        Self {
            settings: settings.clone(),
            index,
            capture: None,
            frame: Mat::default(),
            frame_count: 0,
        }
    }
}

impl FrameSource for OpenCvSource {
    fn name(&self) -> &str {
        &self.settings.uri
    }

    fn open(&mut self) -> Result<()> {
        let mut capture = VideoCapture::new(self.index, CAP_ANY)
            .with_context(|| format!("open camera {}", self.index))?;
        if !capture.is_opened()? {
            return Err(anyhow!("camera {} failed to open", self.index));
        }

        capture.set(CAP_PROP_FRAME_WIDTH, self.settings.width as f64)?;
        capture.set(CAP_PROP_FRAME_HEIGHT, self.settings.height as f64)?;
        if self.settings.target_fps > 0 {
            capture.set(CAP_PROP_FPS, self.settings.target_fps as f64)?;
        }

        self.capture = Some(capture);
        log::info!(
            "OpenCvSource: opened camera {} ({})",
            self.index,
            self.settings.uri
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        let capture = self.capture.as_mut().context("camera not open")?;
        if !capture.read(&mut self.frame)? || self.frame.empty() {
            return Err(anyhow!("camera {} returned no frame", self.index));
        }
        if self.frame.channels() != 3 {
            return Err(anyhow!(
                "camera {} returned {} channels, expected 3",
                self.index,
                self.frame.channels()
            ));
        }

        let width = u32::try_from(self.frame.cols()).context("frame width")?;
        let height = u32::try_from(self.frame.rows()).context("frame height")?;
        let bytes = if self.frame.is_continuous() {
            self.frame.data_bytes()?.to_vec()
        } else {
            self.frame.try_clone()?.data_bytes()?.to_vec()
        };
        self.frame_count += 1;
        Frame::from_bgr(bytes, width, height)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                log::warn!("OpenCvSource: release of camera {} failed: {}", self.index, err);
            }
            log::info!(
                "OpenCvSource: released camera {} after {} frames",
                self.index,
                self.frame_count
            );
        }
    }
}
