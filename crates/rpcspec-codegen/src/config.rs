//! Generator configuration, usually read from a `rpcspec.toml`

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use rpcspec_core::CanonicalName;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenConfig {
    /// Package prefix for every generated declaration; empty for none
    #[serde(default)]
    pub package: String,

    #[serde(default)]
    pub packaging: Packaging,

    /// Definitions provided by the target platform, mapped to the type path
    /// that stands in for them
    #[serde(default)]
    pub native_elements: BTreeMap<CanonicalName, String>,
}

/// How generated declarations are grouped into packages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Packaging {
    /// One package per root namespace, nested under [`GenConfig::package`]
    #[default]
    SubPackages,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            packaging: Packaging::default(),
            native_elements: BTreeMap::new(),
        }
    }
}

impl GenConfig {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Self::default()
        }
    }

    /// Map `name` to a type path the target already provides
    pub fn with_native(mut self, name: impl Into<CanonicalName>, type_path: impl Into<String>) -> Self {
        self.native_elements.insert(name.into(), type_path.into());
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse generator config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read generator config from {:?}", path))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid generator config in {:?}", path))
    }

    pub fn native_type(&self, name: &CanonicalName) -> Option<&str> {
        self.native_elements.get(name).map(String::as_str)
    }
}
