//! Resolved project configuration handed to every request.
//!
//! Loading the file from disk belongs to the caller. This module only parses
//! and validates the TOML text, and exposes the per-stage transform lists that
//! [`ConfiguredTransforms`](crate::stages::ConfiguredTransforms) turns into
//! transform specs.
//!
//! ```toml
//! name = "web"
//!
//! [transforms]
//! normalize = ["strip-parens"]
//! lint = ["no-debugger", { id = "max-depth", options = { limit = 4 } }]
//!
//! [settings]
//! strict = true
//! ```

use crate::errors::{PipelineError, Result};
use crate::pipeline::TransformOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entry of a stage's transform list: a bare identifier or an identifier
/// with options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfiguredTransform {
    Id(String),
    Detailed {
        id: String,
        #[serde(default)]
        options: TransformOptions,
    },
}

impl ConfiguredTransform {
    pub fn id(&self) -> &str {
        match self {
            ConfiguredTransform::Id(id) => id,
            ConfiguredTransform::Detailed { id, .. } => id,
        }
    }

    pub fn options(&self) -> TransformOptions {
        match self {
            ConfiguredTransform::Id(_) => TransformOptions::default(),
            ConfiguredTransform::Detailed { options, .. } => options.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Stage name to ordered transform list.
    #[serde(default)]
    pub transforms: BTreeMap<String, Vec<ConfiguredTransform>>,
    /// Free-form settings visible to transforms.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config = toml::from_str::<ProjectConfig>(contents)?;
        config.validate()?;
        log::debug!(
            "Parsed project config {:?} with {} configured stage(s)",
            config.name,
            config.transforms.len()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (stage, transforms) in &self.transforms {
            if stage.trim().is_empty() {
                return Err(PipelineError::configuration(
                    "transform table has an empty stage name",
                ));
            }
            if let Some(blank) = transforms.iter().find(|t| t.id().trim().is_empty()) {
                return Err(PipelineError::configuration(format!(
                    "stage `{}` configures a transform with an empty id ({:?})",
                    stage, blank
                )));
            }
        }
        Ok(())
    }

    pub fn with_transforms(
        mut self,
        stage: impl Into<String>,
        transforms: Vec<ConfiguredTransform>,
    ) -> Self {
        self.transforms.insert(stage.into(), transforms);
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn transforms_for(&self, stage: &str) -> &[ConfiguredTransform] {
        self.transforms.get(stage).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}
