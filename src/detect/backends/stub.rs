use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectorBackend, ModelLoader};
use crate::detect::result::Candidate;

/// Scripted backend for demos and tests.
///
/// Cycles through a fixed list of per-frame candidate sets, independent of
/// the pixels it is given.
#[derive(Clone, Debug)]
pub struct StubBackend {
    script: Vec<Vec<Candidate>>,
    cursor: usize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_script(default_script())
    }

    pub fn with_script(script: Vec<Vec<Candidate>>) -> Self {
        Self { script, cursor: 0 }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<Vec<Candidate>> {
        let expected = crate::frame::expected_len(width, height)?;
        if rgb.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                rgb.len()
            ));
        }
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let candidates = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(candidates)
    }
}

/// Person walking right past a low-confidence dog that the default threshold rejects.
fn default_script() -> Vec<Vec<Candidate>> {
    (0..8)
        .map(|step| {
            let x = 80.0 + step as f32 * 40.0;
            vec![
                Candidate::new("person", 0.82, [x, 120.0, x + 120.0, 420.0]),
                Candidate::new("dog", 0.35, [420.0, 300.0, 560.0, 430.0]),
            ]
        })
        .collect()
}

/// Loader for the scripted backend. Loading never touches disk or network.
#[derive(Clone, Debug, Default)]
pub struct StubLoader {
    script: Option<Vec<Vec<Candidate>>>,
}

impl StubLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Vec<Vec<Candidate>>) -> Self {
        Self {
            script: Some(script),
        }
    }
}

impl ModelLoader for StubLoader {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn load(&mut self) -> Result<Box<dyn DetectorBackend>> {
        let backend = match &self.script {
            Some(script) => StubBackend::with_script(script.clone()),
            None => StubBackend::new(),
        };
        Ok(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_cycles_script() -> Result<()> {
        let mut backend = StubBackend::with_script(vec![
            vec![Candidate::new("dog", 0.75, [10.0, 10.0, 50.0, 50.0])],
            vec![],
        ]);
        let rgb = vec![0u8; 4 * 4 * 3];

        assert_eq!(backend.infer(&rgb, 4, 4)?.len(), 1);
        assert!(backend.infer(&rgb, 4, 4)?.is_empty());
        assert_eq!(backend.infer(&rgb, 4, 4)?[0].name, "dog");
        Ok(())
    }

    #[test]
    fn stub_backend_validates_buffer_length() {
        let mut backend = StubBackend::new();
        assert!(backend.infer(&[0u8; 5], 4, 4).is_err());
    }

    #[test]
    fn default_script_mixes_accepted_and_rejected() -> Result<()> {
        let mut loader = StubLoader::new();
        let mut backend = loader.load()?;
        let rgb = vec![0u8; 640 * 480 * 3];
        let candidates = backend.infer(&rgb, 640, 480)?;
        assert!(candidates.iter().any(|c| c.confidence > 0.4));
        assert!(candidates.iter().any(|c| c.confidence <= 0.4));
        Ok(())
    }
}
