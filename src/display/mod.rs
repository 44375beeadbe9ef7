//! Display sinks for annotated frames.
//!
//! - `headless`: no window, optionally writes every frame as a JPEG
//! - `window`: OpenCV HighGUI window (feature: opencv-io)

pub mod headless;
#[cfg(feature = "opencv-io")]
pub mod opencv;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

pub use headless::HeadlessDisplay;
#[cfg(feature = "opencv-io")]
pub use opencv::OpenCvWindow;

/// Best-effort output for annotated frames.
pub trait DisplaySink {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn show(&mut self, window: &str, frame: &Frame) -> Result<()>;

    /// Key pressed since the last poll, if any.
    fn poll_key(&mut self) -> Option<char>;

    /// Must be safe to call more than once.
    fn close_all(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Window,
    Headless,
}

impl Default for DisplayMode {
    /// A window when HighGUI is compiled in.
    fn default() -> Self {
        if cfg!(feature = "opencv-io") {
            Self::Window
        } else {
            Self::Headless
        }
    }
}

impl FromStr for DisplayMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "window" => Ok(Self::Window),
            "headless" | "none" => Ok(Self::Headless),
            other => Err(anyhow!(
                "unknown display mode '{}' (expected window or headless)",
                other
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplaySettings {
    pub mode: DisplayMode,
    pub window_title: String,
    pub stop_key: char,
    pub save_dir: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            mode: DisplayMode::default(),
            window_title: "Detección de Objetos".to_string(),
            stop_key: 'q',
            save_dir: None,
        }
    }
}

/// Build the sink for `settings.mode`. The sink is returned unopened.
pub fn open_display(settings: &DisplaySettings) -> Result<Box<dyn DisplaySink>> {
    match settings.mode {
        DisplayMode::Headless => Ok(Box::new(HeadlessDisplay::new(settings.save_dir.clone()))),
        #[cfg(feature = "opencv-io")]
        DisplayMode::Window => Ok(Box::new(OpenCvWindow::new(&settings.window_title))),
        #[cfg(not(feature = "opencv-io"))]
        DisplayMode::Window => Err(anyhow!(
            "window display needs --features opencv-io; use --display headless"
        )),
    }
}
