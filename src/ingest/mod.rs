//! Frame sources.
//!
//! - `stub://<name>`: synthetic frames, always available
//! - `/dev/videoN`: V4L2 device (feature: ingest-v4l2), else OpenCV
//! - `cam:N`: OpenCV camera index (feature: opencv-io)
//!
//! Every source hands the pipeline BGR frames. A failed `read` ends the run;
//! sources are not retried.

#[cfg_attr(not(feature = "ingest-v4l2"), allow(dead_code))]
mod normalize;
#[cfg(feature = "opencv-io")]
pub mod opencv;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[cfg(feature = "opencv-io")]
pub use opencv::OpenCvSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

pub trait FrameSource {
    fn name(&self) -> &str;

    fn open(&mut self) -> Result<()>;

    /// Next frame. An error means the stream is over.
    fn read(&mut self) -> Result<Frame>;

    /// Must be safe to call more than once and on a source that never opened.
    fn release(&mut self);
}

/// Camera 0 when a capture backend is compiled in, synthetic frames otherwise.
#[cfg(any(feature = "ingest-v4l2", feature = "opencv-io"))]
pub const DEFAULT_SOURCE_URI: &str = "/dev/video0";
#[cfg(not(any(feature = "ingest-v4l2", feature = "opencv-io")))]
pub const DEFAULT_SOURCE_URI: &str = "stub://camera";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceSettings {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            uri: DEFAULT_SOURCE_URI.to_string(),
            width: 640,
            height: 480,
            target_fps: 30,
            max_frames: None,
        }
    }
}

/// Build the source for `settings.uri`. The source is returned unopened.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    let uri = settings.uri.as_str();
    if uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings)));
    }

    #[cfg(feature = "ingest-v4l2")]
    {
        if uri.starts_with("/dev/video") {
            return Ok(Box::new(V4l2Source::new(settings)));
        }
    }

    #[cfg(feature = "opencv-io")]
    {
        if let Some(index) = camera_index(uri) {
            return Ok(Box::new(OpenCvSource::new(settings, index)));
        }
    }

    let hint = if camera_index(uri).is_some() {
        "; camera capture needs --features ingest-v4l2 or --features opencv-io"
    } else {
        ""
    };
    Err(anyhow!("no frame source for '{}'{}", uri, hint))
}

/// Camera index from `cam:N`, `/dev/videoN` or a bare number.
pub fn camera_index(uri: &str) -> Option<i32> {
    let digits = uri
        .strip_prefix("cam:")
        .or_else(|| uri.strip_prefix("/dev/video"))
        .unwrap_or(uri);
    digits.parse::<i32>().ok().filter(|index| *index >= 0)
}
