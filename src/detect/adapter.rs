use crate::error::{InferenceError, InitError};
use crate::frame::Frame;

use super::backend::{DetectorBackend, ModelLoader};
use super::result::{Candidate, RawDetection};

/// Bridges the pipeline's BGR frames and a detection backend.
///
/// The adapter owns the loaded backend, converts frames to RGB before
/// inference, and validates every record the backend emits.
#[derive(Default)]
pub struct InferenceAdapter {
    backend: Option<Box<dyn DetectorBackend>>,
}

impl InferenceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter around an already loaded backend.
    pub fn with_backend(backend: Box<dyn DetectorBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|backend| backend.name())
    }

    /// Load the model through `loader`. A second call on a loaded adapter is a no-op.
    pub fn load(&mut self, loader: &mut dyn ModelLoader) -> Result<(), InitError> {
        if let Some(name) = self.backend_name() {
            log::debug!("detection model already loaded ({})", name);
            return Ok(());
        }
        let loader_name = loader.name();
        let load_error = |err: anyhow::Error| InitError::ModelLoad {
            backend: loader_name.to_string(),
            reason: format!("{:#}", err),
        };
        let mut backend = loader.load().map_err(load_error)?;
        backend.warm_up().map_err(load_error)?;
        log::info!("detection model loaded ({})", backend.name());
        self.backend = Some(backend);
        Ok(())
    }

    /// Run the model on one frame.
    ///
    /// The returned sequence validates records lazily; malformed records are
    /// logged and skipped. A backend failure is reported as a recoverable
    /// per-frame error.
    pub fn infer(&mut self, frame: &Frame) -> Result<RawDetections, InferenceError> {
        let backend = self.backend.as_mut().ok_or(InferenceError::NotLoaded)?;
        let rgb = frame.to_rgb();
        let candidates = backend
            .infer(&rgb, frame.width, frame.height)
            .map_err(|err| InferenceError::Backend(format!("{:#}", err)))?;
        Ok(RawDetections::new(candidates))
    }
}

/// Validated view over one frame's backend output.
#[derive(Debug)]
pub struct RawDetections {
    candidates: std::vec::IntoIter<Candidate>,
    rejected: usize,
}

impl RawDetections {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates: candidates.into_iter(),
            rejected: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Records dropped so far because they failed validation.
    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

impl Iterator for RawDetections {
    type Item = RawDetection;

    fn next(&mut self) -> Option<RawDetection> {
        for candidate in self.candidates.by_ref() {
            let name = candidate.name.clone();
            match RawDetection::from_candidate(candidate) {
                Ok(detection) => return Some(detection),
                Err(err) => {
                    self.rejected += 1;
                    log::warn!("dropping malformed detection '{}': {}", name, err);
                }
            }
        }
        None
    }
}
