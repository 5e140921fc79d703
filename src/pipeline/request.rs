//! Request and result values exchanged with the pipeline.

use crate::ast::Node;
use crate::config::ProjectConfig;
use crate::diagnostics::Diagnostic;
use crate::stages::StageId;
use crate::suppression::Suppression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Stage-specific tunables.
///
/// Keys are kept sorted so that two option sets with the same entries
/// serialize, and therefore fingerprint, identically regardless of insertion
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransformOptions(BTreeMap<String, Value>);

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(String, Value)> for TransformOptions {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Immutable request to transform one compilation unit up to a stage.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub ast: Arc<Node>,
    pub project: Arc<ProjectConfig>,
    pub options: TransformOptions,
    /// Target stage; the registry's primary stage when unset.
    pub stage: Option<StageId>,
}

impl TransformRequest {
    pub fn new(ast: impl Into<Arc<Node>>, project: impl Into<Arc<ProjectConfig>>) -> Self {
        Self {
            ast: ast.into(),
            project: project.into(),
            options: TransformOptions::default(),
            stage: None,
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_stage(mut self, stage: impl Into<StageId>) -> Self {
        self.stage = Some(stage.into());
        self
    }
}

/// Output of one stage, including everything inherited from earlier stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformResult {
    pub ast: Arc<Node>,
    /// Directives found in the tree as it entered this stage.
    pub suppressions: Vec<Suppression>,
    pub diagnostics: Vec<Diagnostic>,
    /// External identifiers whose change invalidates this result.
    pub cache_dependencies: Vec<String>,
}

impl TransformResult {
    pub fn depends_on(&self, dependency: &str) -> bool {
        self.cache_dependencies.iter().any(|d| d == dependency)
    }
}
