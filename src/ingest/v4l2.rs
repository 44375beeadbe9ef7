//! V4L2 capture for local device nodes (e.g. `/dev/video0`).
//!
//! Requests `BGR3` at the configured size. Drivers that refuse keep their own
//! format; `RGB3`, `NV12`, `YUYV` and `MJPG` are converted to BGR, anything
//! else is an error.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_bgr, PixelFormat};
use super::{FrameSource, SourceSettings};
use crate::frame::Frame;

pub struct V4l2Source {
    settings: SourceSettings,
    state: Option<V4l2State>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    pixel_format: PixelFormat,
}

#[self_referencing]
struct V4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            active_width: settings.width,
            active_height: settings.height,
            settings: settings.clone(),
            state: None,
            frame_count: 0,
            pixel_format: PixelFormat::Bgr24,
        }
    }
}

fn pixel_format_for(fourcc: v4l::FourCC) -> Result<PixelFormat> {
    match &fourcc.repr {
        b"BGR3" => Ok(PixelFormat::Bgr24),
        b"RGB3" => Ok(PixelFormat::Rgb24),
        b"NV12" => Ok(PixelFormat::Nv12),
        b"YUYV" => Ok(PixelFormat::Yuyv),
        b"MJPG" => Ok(PixelFormat::Mjpeg),
        other => Err(anyhow!(
            "unsupported v4l2 pixel format {}",
            String::from_utf8_lossy(other)
        )),
    }
}

impl FrameSource for V4l2Source {
    fn name(&self) -> &str {
        &self.settings.uri
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let uri = &self.settings.uri;
        let device =
            v4l::Device::with_path(uri).with_context(|| format!("open v4l2 device {}", uri))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"BGR3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!("V4l2Source: failed to set format on {}: {}", uri, err);
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        self.pixel_format = pixel_format_for(format.fourcc)?;

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", uri, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: opened {} ({}x{}, {:?})",
            uri,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not open")?;
        let (buf, meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
        // Compressed formats fill only part of the mapped buffer.
        let used = meta.bytesused as usize;
        let payload = if used > 0 && used <= buf.len() {
            &buf[..used]
        } else {
            buf
        };

        let bgr = normalize_to_bgr(payload, self.active_width, self.active_height, self.pixel_format)?;
        self.frame_count += 1;
        Frame::from_bgr(bgr, self.active_width, self.active_height)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Source: released {} after {} frames",
                self.settings.uri,
                self.frame_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_mapping() -> Result<()> {
        assert_eq!(pixel_format_for(v4l::FourCC::new(b"BGR3"))?, PixelFormat::Bgr24);
        assert_eq!(pixel_format_for(v4l::FourCC::new(b"NV12"))?, PixelFormat::Nv12);
        assert_eq!(pixel_format_for(v4l::FourCC::new(b"YUYV"))?, PixelFormat::Yuyv);
        assert_eq!(pixel_format_for(v4l::FourCC::new(b"MJPG"))?, PixelFormat::Mjpeg);
        assert!(pixel_format_for(v4l::FourCC::new(b"H264")).is_err());
        Ok(())
    }

    #[test]
    fn read_before_open_fails() {
        let settings = SourceSettings {
            uri: "/dev/video-missing".to_string(),
            width: 640,
            height: 480,
            target_fps: 10,
            max_frames: None,
        };
        let mut source = V4l2Source::new(&settings);
        assert!(source.read().is_err());
        assert!(source.open().is_err());
    }
}
