use std::collections::HashMap;

use anyhow::{anyhow, Result};

use super::backend::ModelLoader;

/// Named model loaders available to this build.
///
/// Optional backends only register when their cargo feature is enabled, so
/// the error for an unknown name lists what the binary actually supports.
pub struct BackendRegistry {
    loaders: HashMap<String, Box<dyn ModelLoader>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a loader. The first registered loader becomes the default.
    pub fn register<L: ModelLoader + 'static>(&mut self, loader: L) {
        let name = loader.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.loaders.insert(name, Box::new(loader));
    }

    /// Set default loader by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.loaders.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove and return the loader registered under `name`.
    pub fn take(&mut self, name: &str) -> Result<Box<dyn ModelLoader>> {
        if let Some(loader) = self.loaders.remove(name) {
            return Ok(loader);
        }
        let hint = match name {
            "tract" => " (rebuild with --features backend-tract)",
            _ => "",
        };
        Err(anyhow!(
            "detection backend '{}' is not available{}; available: {}",
            name,
            hint,
            self.list().join(", ")
        ))
    }

    pub fn take_default(&mut self) -> Result<Box<dyn ModelLoader>> {
        let name = self
            .default_name
            .clone()
            .ok_or_else(|| anyhow!("no detection backend registered"))?;
        self.take(&name)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
