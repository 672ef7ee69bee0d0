//! Sky model configuration: identifier and ordered component list.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraError};
use crate::keys::Artifact;

/// Component name that carries a noise model when none is declared.
pub const DEFAULT_NOISE_COMPONENT: &str = "cmb";

/// Whether a component defines a per-pixel noise variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    Present,
    Absent,
}

/// A sky signal category, e.g. `cmb`, `dust`, `synchrotron`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub noise: NoiseModel,
}

impl Component {
    pub fn new(name: impl Into<String>, noise: NoiseModel) -> Self {
        Self {
            name: name.into(),
            noise,
        }
    }

    /// Resolve the noise capability from the name alone.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let noise = if name == DEFAULT_NOISE_COMPONENT {
            NoiseModel::Present
        } else {
            NoiseModel::Absent
        };
        Self { name, noise }
    }

    pub fn has_noise_model(&self) -> bool {
        self.noise == NoiseModel::Present
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ComponentEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        noise_model: Option<bool>,
    },
}

impl From<ComponentEntry> for Component {
    fn from(entry: ComponentEntry) -> Self {
        match entry {
            ComponentEntry::Name(name) => Component::named(name),
            ComponentEntry::Full {
                name,
                noise_model: None,
            } => Component::named(name),
            ComponentEntry::Full {
                name,
                noise_model: Some(true),
            } => Component::new(name, NoiseModel::Present),
            ComponentEntry::Full {
                name,
                noise_model: Some(false),
            } => Component::new(name, NoiseModel::Absent),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawModel {
    identifier: String,
    components: Vec<ComponentEntry>,
}

/// Model identifier plus the components to process, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub identifier: String,
    pub components: Vec<Component>,
}

impl ModelConfig {
    pub fn new(identifier: impl Into<String>, components: Vec<Component>) -> Result<Self> {
        let model = Self {
            identifier: identifier.into(),
            components,
        };
        model.validate()?;
        Ok(model)
    }

    /// Parse a model from JSON.
    ///
    /// ```json
    /// {"identifier": "modelA", "components": ["cmb", {"name": "dust", "noise_model": false}]}
    /// ```
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawModel = serde_json::from_str(raw)
            .map_err(|e| SpectraError::config(format!("invalid model configuration: {e}")))?;
        Self::new(
            parsed.identifier,
            parsed.components.into_iter().map(Component::from).collect(),
        )
    }

    /// Load a model from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.identifier.trim().is_empty() || self.identifier.contains('/') {
            return Err(SpectraError::config(format!(
                "model identifier '{}' must be non-empty and contain no '/'",
                self.identifier
            )));
        }
        if self.components.is_empty() {
            return Err(SpectraError::config("model defines no components"));
        }
        let mut seen = HashSet::new();
        for c in &self.components {
            if c.name.is_empty() || c.name.contains('/') {
                return Err(SpectraError::config(format!(
                    "component name '{}' must be non-empty and contain no '/'",
                    c.name
                )));
            }
            if Artifact::is_reserved(&c.name) {
                return Err(SpectraError::config(format!(
                    "component name '{}' collides with a reserved dataset name",
                    c.name
                )));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(SpectraError::config(format!(
                    "component '{}' listed twice",
                    c.name
                )));
            }
        }
        Ok(())
    }
}
