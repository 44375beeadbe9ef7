use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Scalar, CV_8UC3},
    highgui,
    prelude::*,
};

use super::DisplaySink;
use crate::frame::Frame;

/// HighGUI window. `poll_key` also pumps the window's event loop.
pub struct OpenCvWindow {
    title: String,
    opened: bool,
}

impl OpenCvWindow {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            opened: false,
        }
    }
}

impl DisplaySink for OpenCvWindow {
    fn name(&self) -> &str {
        "window"
    }

    fn open(&mut self) -> Result<()> {
        highgui::named_window(&self.title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("create window '{}'", self.title))?;
        self.opened = true;
        Ok(())
    }

    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        let mut mat = Mat::new_rows_cols_with_default(
            frame.height as i32,
            frame.width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )?;
        mat.data_bytes_mut()?.copy_from_slice(frame.as_bgr());
        highgui::imshow(window, &mat)?;
        Ok(())
    }

    fn poll_key(&mut self) -> Option<char> {
        match highgui::wait_key(1) {
            Ok(key) if key >= 0 => char::from_u32((key & 0xFF) as u32),
            Ok(_) => None,
            Err(err) => {
                log::warn!("OpenCvWindow: wait_key failed: {}", err);
                None
            }
        }
    }

    fn close_all(&mut self) {
        if !self.opened {
            return;
        }
        self.opened = false;
        if let Err(err) = highgui::destroy_all_windows() {
            log::warn!("OpenCvWindow: destroy_all_windows failed: {}", err);
        }
    }
}
