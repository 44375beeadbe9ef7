//! Model file resolution: use the local copy, or fetch it once and cache it.
//!
//! Downloads go to a `.part` file that is renamed into place only after the
//! transfer completes, so an interrupted fetch never leaves a truncated model.
//! When a sha256 is configured, the file is verified before every load.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug)]
pub struct ModelStore {
    path: PathBuf,
    url: Option<String>,
    sha256: Option<String>,
    refresh: bool,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            url: None,
            sha256: None,
            refresh: false,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256;
        self
    }

    /// Download again even if a cached copy exists.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a path to a verified model file, downloading it if needed.
    pub fn resolve(&self) -> Result<PathBuf> {
        if self.path.is_file() && !self.refresh {
            log::info!("using cached model {}", self.path.display());
        } else {
            let url = self.url.as_deref().ok_or_else(|| {
                anyhow!(
                    "model file {} not found and no download URL configured",
                    self.path.display()
                )
            })?;
            self.download(url)?;
        }
        self.verify()?;
        Ok(self.path.clone())
    }

    fn download(&self, url: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create model directory {}", parent.display()))?;
        }
        log::info!("downloading model from {} (first run may take a while)", url);

        let response = ureq::get(url)
            .call()
            .with_context(|| format!("fetch model from {}", url))?;
        let part = self.path.with_extension("part");
        let mut file =
            File::create(&part).with_context(|| format!("create {}", part.display()))?;
        let copied = std::io::copy(&mut response.into_reader(), &mut file)
            .with_context(|| format!("write {}", part.display()));
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = std::fs::remove_file(&part);
                return Err(err);
            }
        };
        if bytes == 0 {
            let _ = std::fs::remove_file(&part);
            return Err(anyhow!("empty model download from {}", url));
        }
        std::fs::rename(&part, &self.path)
            .with_context(|| format!("move model into {}", self.path.display()))?;
        log::info!("model cached at {} ({} bytes)", self.path.display(), bytes);
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        let Some(expected) = self.sha256.as_deref() else {
            return Ok(());
        };
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read model {}", self.path.display()))?;
        let actual = hex::encode(Sha256::digest(&bytes));
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(anyhow!(
                "model checksum mismatch for {} (expected {}, got {})",
                self.path.display(),
                expected,
                actual
            ));
        }
        Ok(())
    }
}
