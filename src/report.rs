//! Console report of accepted detections.
//!
//! ```text
//! Objetos detectados:
//! - perro (Confianza: 0.75)
//! ```

use std::io::{self, Write};

use crate::detect::Detection;

pub const HEADER: &str = "Objetos detectados:";

pub struct DetectionReport {
    out: Box<dyn Write>,
}

impl DetectionReport {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Report one frame. Frames without accepted detections print nothing.
    pub fn frame(&mut self, detections: &[Detection]) -> io::Result<()> {
        if detections.is_empty() {
            return Ok(());
        }
        writeln!(self.out, "{}", HEADER)?;
        for detection in detections {
            writeln!(self.out, "- {}", format_detection(detection))?;
        }
        self.out.flush()
    }
}

pub fn format_detection(detection: &Detection) -> String {
    format!(
        "{} (Confianza: {:.2})",
        detection.localized_name(),
        detection.confidence()
    )
}
