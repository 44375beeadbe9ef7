use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{ConfidenceThreshold, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::display::DisplaySettings;
use crate::ingest::SourceSettings;
use crate::labels::{LabelMap, SUPPORTED_LANGUAGES};
use crate::model_store::ModelStore;
use crate::pipeline::PipelineSettings;

#[cfg(feature = "backend-tract")]
const DEFAULT_BACKEND: &str = "tract";
#[cfg(not(feature = "backend-tract"))]
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_PATH: &str = "models/yolov5s.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_LANGUAGE: &str = "es";
const DEFAULT_FONT_SCALE: f32 = 16.0;
const DEFAULT_PROBE_URL: &str = "https://github.com";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Deserialize, Default)]
struct OjoConfigFile {
    source: Option<SourceConfigFile>,
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    labels: Option<LabelsConfigFile>,
    annotate: Option<AnnotateConfigFile>,
    display: Option<DisplayConfigFile>,
    connectivity: Option<ConnectivityConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    url: Option<String>,
    sha256: Option<String>,
    refresh: Option<bool>,
    input_size: Option<u32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct LabelsConfigFile {
    language: Option<String>,
    overrides_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct AnnotateConfigFile {
    font_path: Option<PathBuf>,
    font_scale: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    mode: Option<String>,
    window_title: Option<String>,
    stop_key: Option<String>,
    save_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ConnectivityConfigFile {
    required: Option<bool>,
    probe_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct OjoConfig {
    pub source: SourceSettings,
    pub model: ModelSettings,
    pub confidence_threshold: f32,
    pub labels: LabelSettings,
    pub annotate: AnnotateSettings,
    pub display: DisplaySettings,
    pub connectivity: ConnectivitySettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    pub path: PathBuf,
    pub url: Option<String>,
    pub sha256: Option<String>,
    pub refresh: bool,
    pub input_size: u32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct LabelSettings {
    pub language: String,
    pub overrides_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AnnotateSettings {
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
}

#[derive(Debug, Clone)]
pub struct ConnectivitySettings {
    pub required: bool,
    pub probe_url: String,
    pub timeout: Duration,
}

impl Default for OjoConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            model: ModelSettings {
                backend: DEFAULT_BACKEND.to_string(),
                path: PathBuf::from(DEFAULT_MODEL_PATH),
                url: None,
                sha256: None,
                refresh: false,
                input_size: DEFAULT_INPUT_SIZE,
                iou_threshold: DEFAULT_IOU_THRESHOLD,
            },
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            labels: LabelSettings {
                language: DEFAULT_LANGUAGE.to_string(),
                overrides_path: None,
            },
            annotate: AnnotateSettings {
                font_path: None,
                font_scale: DEFAULT_FONT_SCALE,
            },
            display: DisplaySettings::default(),
            connectivity: ConnectivitySettings {
                required: true,
                probe_url: DEFAULT_PROBE_URL.to_string(),
                timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            },
        }
    }
}

impl OjoConfig {
    /// Defaults, then the file named by `OJO_CONFIG`, then `OJO_*` overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like `load`, with an explicit config file taking precedence over `OJO_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("OJO_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => OjoConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OjoConfigFile) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(source) = file.source {
            cfg.source.uri = source.uri.unwrap_or(cfg.source.uri);
            cfg.source.width = source.width.unwrap_or(cfg.source.width);
            cfg.source.height = source.height.unwrap_or(cfg.source.height);
            cfg.source.target_fps = source.target_fps.unwrap_or(cfg.source.target_fps);
            cfg.source.max_frames = source.max_frames;
        }

        if let Some(model) = file.model {
            cfg.model.backend = model.backend.unwrap_or(cfg.model.backend);
            cfg.model.path = model.path.unwrap_or(cfg.model.path);
            cfg.model.url = model.url;
            cfg.model.sha256 = model.sha256;
            cfg.model.refresh = model.refresh.unwrap_or(false);
            cfg.model.input_size = model.input_size.unwrap_or(cfg.model.input_size);
            cfg.model.iou_threshold = model.iou_threshold.unwrap_or(cfg.model.iou_threshold);
        }

        if let Some(threshold) = file
            .detection
            .and_then(|detection| detection.confidence_threshold)
        {
            cfg.confidence_threshold = threshold;
        }

        if let Some(labels) = file.labels {
            cfg.labels.language = labels.language.unwrap_or(cfg.labels.language);
            cfg.labels.overrides_path = labels.overrides_path;
        }

        if let Some(annotate) = file.annotate {
            cfg.annotate.font_path = annotate.font_path;
            cfg.annotate.font_scale = annotate.font_scale.unwrap_or(cfg.annotate.font_scale);
        }

        if let Some(display) = file.display {
            if let Some(mode) = display.mode.as_deref() {
                cfg.display.mode = mode.parse()?;
            }
            if let Some(key) = display.stop_key.as_deref() {
                cfg.display.stop_key = parse_stop_key(key)?;
            }
            cfg.display.window_title = display.window_title.unwrap_or(cfg.display.window_title);
            cfg.display.save_dir = display.save_dir;
        }

        if let Some(connectivity) = file.connectivity {
            cfg.connectivity.required = connectivity.required.unwrap_or(true);
            cfg.connectivity.probe_url = connectivity
                .probe_url
                .unwrap_or(cfg.connectivity.probe_url);
            if let Some(secs) = connectivity.timeout_secs {
                cfg.connectivity.timeout = Duration::from_secs(secs);
            }
        }

        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(uri) = env_value("OJO_SOURCE") {
            self.source.uri = uri;
        }
        if let Some(backend) = env_value("OJO_BACKEND") {
            self.model.backend = backend;
        }
        if let Some(path) = env_value("OJO_MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }
        if let Some(url) = env_value("OJO_MODEL_URL") {
            self.model.url = Some(url);
        }
        if let Some(confidence) = env_value("OJO_CONFIDENCE") {
            self.confidence_threshold = confidence
                .parse()
                .map_err(|_| anyhow!("OJO_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(language) = env_value("OJO_LANGUAGE") {
            self.labels.language = language;
        }
        if let Some(path) = env_value("OJO_FONT_PATH") {
            self.annotate.font_path = Some(PathBuf::from(path));
        }
        if let Some(mode) = env_value("OJO_DISPLAY") {
            self.display.mode = mode.parse()?;
        }
        if let Some(offline) = env_value("OJO_OFFLINE") {
            self.connectivity.required = !parse_flag("OJO_OFFLINE", &offline)?;
        }
        Ok(())
    }

    /// Check cross-field constraints. Run again after applying CLI overrides.
    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1), got {}",
                self.confidence_threshold
            ));
        }
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!(
                "source frame size must be non-zero, got {}x{}",
                self.source.width,
                self.source.height
            ));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if !(self.model.iou_threshold > 0.0 && self.model.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "model iou threshold must be within (0, 1], got {}",
                self.model.iou_threshold
            ));
        }
        if let Some(sha256) = &self.model.sha256 {
            let normalized = sha256.trim().to_ascii_lowercase();
            if normalized.len() != 64 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(anyhow!("model sha256 must be 64 hex characters"));
            }
            self.model.sha256 = Some(normalized);
        }

        self.labels.language = self.labels.language.trim().to_ascii_lowercase();
        if !SUPPORTED_LANGUAGES.contains(&self.labels.language.as_str()) {
            return Err(anyhow!(
                "unsupported label language '{}' (supported: {})",
                self.labels.language,
                SUPPORTED_LANGUAGES.join(", ")
            ));
        }
        if !(self.annotate.font_scale > 0.0) {
            return Err(anyhow!("font scale must be greater than zero"));
        }
        if self.connectivity.timeout.is_zero() {
            return Err(anyhow!("connectivity timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn label_map(&self) -> Result<LabelMap> {
        let map = LabelMap::for_language(&self.labels.language)?;
        match &self.labels.overrides_path {
            Some(path) => map.load_overrides(path),
            None => Ok(map),
        }
    }

    pub fn model_store(&self) -> ModelStore {
        ModelStore::new(self.model.path.clone())
            .with_url(self.model.url.clone())
            .with_sha256(self.model.sha256.clone())
            .with_refresh(self.model.refresh)
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings> {
        Ok(PipelineSettings {
            threshold: ConfidenceThreshold::new(self.confidence_threshold)?,
            window_title: self.display.window_title.clone(),
            stop_key: self.display.stop_key,
            max_frames: self.source.max_frames,
        })
    }
}

fn read_config_file(path: &Path) -> Result<OjoConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be true or false, got '{}'", key, value)),
    }
}

/// Exactly one character.
pub fn parse_stop_key(value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(anyhow!("stop key must be a single character, got '{}'", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let mut cfg = OjoConfig::from_file(OjoConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.source.uri, crate::ingest::DEFAULT_SOURCE_URI);
        assert_eq!(cfg.model.backend, DEFAULT_BACKEND);
        assert_eq!(cfg.confidence_threshold, 0.4);
        assert_eq!(cfg.labels.language, "es");
        assert_eq!(cfg.display.stop_key, 'q');
        assert!(cfg.connectivity.required);
        assert_eq!(cfg.connectivity.timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn validate_rejects_out_of_range_values() -> Result<()> {
        let mut cfg = OjoConfig::default();
        cfg.confidence_threshold = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = OjoConfig::default();
        cfg.source.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = OjoConfig::default();
        cfg.labels.language = "fr".to_string();
        assert!(cfg.validate().is_err());

        let mut cfg = OjoConfig::default();
        cfg.model.sha256 = Some("abc".to_string());
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn stop_key_must_be_one_character() -> Result<()> {
        assert_eq!(parse_stop_key("x")?, 'x');
        assert!(parse_stop_key("").is_err());
        assert!(parse_stop_key("qq").is_err());
        Ok(())
    }

    #[test]
    fn pipeline_settings_follow_config() -> Result<()> {
        let mut cfg = OjoConfig::default();
        cfg.confidence_threshold = 0.6;
        cfg.source.max_frames = Some(3);
        let settings = cfg.pipeline_settings()?;
        assert_eq!(settings.threshold.value(), 0.6);
        assert_eq!(settings.max_frames, Some(3));
        Ok(())
    }
}
