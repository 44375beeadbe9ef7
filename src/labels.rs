//! Class-name localization.
//!
//! Detection models report classes in their own (English, COCO) vocabulary.
//! A `LabelMap` is built once at startup and shared read-only through a
//! `Localizer`; lookups never fail and fall back to the canonical name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};

/// COCO class names with their Spanish display names.
pub const SPANISH: &[(&str, &str)] = &[
    ("person", "persona"),
    ("bicycle", "bicicleta"),
    ("car", "auto"),
    ("motorcycle", "motocicleta"),
    ("airplane", "avión"),
    ("bus", "autobús"),
    ("train", "tren"),
    ("truck", "camión"),
    ("boat", "bote"),
    ("traffic light", "semáforo"),
    ("fire hydrant", "hidrante"),
    ("stop sign", "señal de stop"),
    ("parking meter", "parquímetro"),
    ("bench", "banco"),
    ("bird", "pájaro"),
    ("cat", "gato"),
    ("dog", "perro"),
    ("horse", "caballo"),
    ("sheep", "oveja"),
    ("cow", "vaca"),
    ("elephant", "elefante"),
    ("bear", "oso"),
    ("zebra", "cebra"),
    ("giraffe", "jirafa"),
    ("backpack", "mochila"),
    ("umbrella", "paraguas"),
    ("handbag", "bolso"),
    ("tie", "corbata"),
    ("suitcase", "maleta"),
    ("frisbee", "frisbee"),
    ("skis", "esquís"),
    ("snowboard", "snowboard"),
    ("sports ball", "pelota"),
    ("kite", "cometa"),
    ("baseball bat", "bate de béisbol"),
    ("baseball glove", "guante de béisbol"),
    ("skateboard", "patineta"),
    ("surfboard", "tabla de surf"),
    ("tennis racket", "raqueta de tenis"),
    ("bottle", "botella"),
    ("wine glass", "copa de vino"),
    ("cup", "taza"),
    ("fork", "tenedor"),
    ("knife", "cuchillo"),
    ("spoon", "cuchara"),
    ("bowl", "cuenco"),
    ("banana", "plátano"),
    ("apple", "manzana"),
    ("sandwich", "sándwich"),
    ("orange", "naranja"),
    ("broccoli", "brócoli"),
    ("carrot", "zanahoria"),
    ("hot dog", "perrito caliente"),
    ("pizza", "pizza"),
    ("donut", "dona"),
    ("cake", "pastel"),
    ("chair", "silla"),
    ("couch", "sofá"),
    ("potted plant", "planta en maceta"),
    ("bed", "cama"),
    ("dining table", "mesa de comedor"),
    ("toilet", "inodoro"),
    ("tv", "televisor"),
    ("laptop", "portátil"),
    ("mouse", "ratón"),
    ("remote", "control remoto"),
    ("keyboard", "teclado"),
    ("cell phone", "teléfono móvil"),
    ("microwave", "microondas"),
    ("oven", "horno"),
    ("toaster", "tostadora"),
    ("sink", "fregadero"),
    ("refrigerator", "refrigerador"),
    ("book", "libro"),
    ("clock", "reloj"),
    ("vase", "florero"),
    ("scissors", "tijeras"),
    ("teddy bear", "oso de peluche"),
    ("hair drier", "secador de pelo"),
    ("toothbrush", "cepillo de dientes"),
];

/// Languages with a built-in table.
pub const SUPPORTED_LANGUAGES: &[&str] = &["es", "en"];

/// Canonical class name -> display name.
#[derive(Clone, Debug, Default)]
pub struct LabelMap {
    entries: HashMap<String, String>,
}

impl LabelMap {
    /// Empty map: every class is shown under its canonical name.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn spanish() -> Self {
        Self::from_pairs(SPANISH.iter().copied())
    }

    pub fn for_language(language: &str) -> Result<Self> {
        match language.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Self::spanish()),
            "en" => Ok(Self::identity()),
            other => Err(anyhow!(
                "unsupported label language '{}' (supported: {})",
                other,
                SUPPORTED_LANGUAGES.join(", ")
            )),
        }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let entries = pairs
            .into_iter()
            .map(|(canonical, localized)| (canonical.to_string(), localized.to_string()))
            .collect();
        Self { entries }
    }

    /// Add or replace entries. Empty display names are ignored so lookups stay non-empty.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (canonical, localized) in overrides {
            if localized.trim().is_empty() {
                log::warn!("ignoring empty label override for '{}'", canonical);
                continue;
            }
            self.entries.insert(canonical, localized);
        }
        self
    }

    /// Apply overrides from a JSON object file (`{"dog": "perrito"}`).
    pub fn load_overrides(self, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read label file {}: {}", path.display(), e))?;
        let overrides: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid label file {}: {}", path.display(), e))?;
        log::info!(
            "loaded {} label overrides from {}",
            overrides.len(),
            path.display()
        );
        Ok(self.with_overrides(overrides))
    }

    pub fn get(&self, class_name: &str) -> Option<&str> {
        self.entries.get(class_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read-only handle to the process label map.
#[derive(Clone, Debug)]
pub struct Localizer {
    map: Arc<LabelMap>,
}

impl Localizer {
    pub fn new(map: LabelMap) -> Self {
        Self { map: Arc::new(map) }
    }

    /// Display name for `class_name`; the input itself when unmapped.
    pub fn localize<'a>(&'a self, class_name: &'a str) -> &'a str {
        self.map.get(class_name).unwrap_or(class_name)
    }
}
