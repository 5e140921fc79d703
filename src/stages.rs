//! Ordered stage registry.
//!
//! The registry is the only way to add a compilation phase. It fixes the
//! total order of stages, the transforms each stage runs, the hook visitors
//! that run first in every stage, and the primary stage used when a request
//! does not name one.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = StageRegistry::builder()
//!     .configured_stage("normalize")
//!     .configured_stage("lint")
//!     .primary("lint")
//!     .hook(Arc::new(SourceMapHook))
//!     .build()?;
//! ```

use crate::config::ProjectConfig;
use crate::errors::{PipelineError, Result};
use crate::pipeline::TransformOptions;
use crate::transform::{TransformSpec, VisitorRef};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StageId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Produces the transforms a stage runs for a given project and options.
pub trait TransformFactory: Send + Sync {
    fn transforms(&self, project: &ProjectConfig, options: &TransformOptions)
        -> Vec<TransformSpec>;
}

impl<F> TransformFactory for F
where
    F: Fn(&ProjectConfig, &TransformOptions) -> Vec<TransformSpec> + Send + Sync,
{
    fn transforms(
        &self,
        project: &ProjectConfig,
        options: &TransformOptions,
    ) -> Vec<TransformSpec> {
        self(project, options)
    }
}

/// Factory reading the stage's transform list from the project's
/// `[transforms]` table.
pub struct ConfiguredTransforms {
    stage: StageId,
}

impl ConfiguredTransforms {
    pub fn new(stage: impl Into<StageId>) -> Self {
        Self {
            stage: stage.into(),
        }
    }
}

impl TransformFactory for ConfiguredTransforms {
    fn transforms(&self, project: &ProjectConfig, _options: &TransformOptions) -> Vec<TransformSpec> {
        project
            .transforms_for(self.stage.as_str())
            .iter()
            .map(|configured| TransformSpec::named(configured.id(), configured.options()))
            .collect()
    }
}

pub struct StageDefinition {
    pub id: StageId,
    pub factory: Arc<dyn TransformFactory>,
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

pub struct StageRegistry {
    stages: Vec<StageDefinition>,
    primary: usize,
    hook_visitors: Vec<VisitorRef>,
    known_options: Option<BTreeSet<String>>,
}

impl StageRegistry {
    pub fn builder() -> StageRegistryBuilder {
        StageRegistryBuilder::new()
    }

    /// Position of `stage` in the stage order.
    pub fn index_of(&self, stage: &StageId) -> Result<usize> {
        self.stages
            .iter()
            .position(|definition| &definition.id == stage)
            .ok_or_else(|| PipelineError::UnknownStage {
                stage: stage.to_string(),
                registered: self.stage_ids().map(StageId::to_string).collect(),
            })
    }

    /// Index of the requested stage, or of the primary stage when unset.
    pub fn resolve_stage(&self, stage: Option<&StageId>) -> Result<usize> {
        stage.map_or(Ok(self.primary), |stage| self.index_of(stage))
    }

    pub fn stage(&self, index: usize) -> &StageDefinition {
        &self.stages[index]
    }

    pub fn primary(&self) -> &StageId {
        &self.stages[self.primary].id
    }

    pub fn stage_ids(&self) -> impl Iterator<Item = &StageId> {
        self.stages.iter().map(|definition| &definition.id)
    }

    pub fn hook_visitors(&self) -> &[VisitorRef] {
        &self.hook_visitors
    }

    /// Option names some stage understands, when the registry declares them.
    pub fn known_options(&self) -> Option<&BTreeSet<String>> {
        self.known_options.as_ref()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("stages", &self.stages)
            .field("primary", &self.primary())
            .field("hook_visitors", &self.hook_visitors.len())
            .finish()
    }
}

#[derive(Default)]
pub struct StageRegistryBuilder {
    stages: Vec<StageDefinition>,
    primary: Option<StageId>,
    hook_visitors: Vec<VisitorRef>,
    known_options: Option<BTreeSet<String>>,
}

impl StageRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage after every stage registered so far.
    pub fn stage<F>(mut self, id: impl Into<StageId>, factory: F) -> Self
    where
        F: TransformFactory + 'static,
    {
        self.stages.push(StageDefinition {
            id: id.into(),
            factory: Arc::new(factory),
        });
        self
    }

    /// Append a stage whose transforms come from the project configuration.
    pub fn configured_stage(self, id: impl Into<StageId>) -> Self {
        let id = id.into();
        let factory = ConfiguredTransforms::new(id.clone());
        self.stage(id, factory)
    }

    /// Stage used when a request names none. Defaults to the first stage.
    pub fn primary(mut self, id: impl Into<StageId>) -> Self {
        self.primary = Some(id.into());
        self
    }

    /// Visitor applied first in every stage.
    pub fn hook(mut self, visitor: VisitorRef) -> Self {
        self.hook_visitors.push(visitor);
        self
    }

    /// Declare option names the stages understand. Requests carrying other
    /// options get an `transform/unknown-option` warning.
    pub fn known_options<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_options
            .get_or_insert_with(BTreeSet::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<StageRegistry> {
        if self.stages.is_empty() {
            return Err(PipelineError::configuration(
                "stage registry needs at least one stage",
            ));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.stages.iter().find(|d| !seen.insert(&d.id)) {
            return Err(PipelineError::configuration(format!(
                "stage `{}` is registered twice",
                duplicate.id
            )));
        }

        let primary = match &self.primary {
            None => 0,
            Some(id) => self
                .stages
                .iter()
                .position(|d| &d.id == id)
                .ok_or_else(|| {
                    PipelineError::configuration(format!(
                        "primary stage `{}` is not registered",
                        id
                    ))
                })?,
        };

        Ok(StageRegistry {
            stages: self.stages,
            primary,
            hook_visitors: self.hook_visitors,
            known_options: self.known_options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfiguredTransform;

    fn no_transforms(_: &ProjectConfig, _: &TransformOptions) -> Vec<TransformSpec> {
        Vec::new()
    }

    #[test]
    fn test_stage_order_and_default_primary() {
        let registry = StageRegistry::builder()
            .stage("normalize", no_transforms)
            .stage("lint", no_transforms)
            .build()
            .unwrap();

        let ids: Vec<_> = registry.stage_ids().map(StageId::as_str).collect();
        assert_eq!(ids, vec!["normalize", "lint"]);
        assert_eq!(registry.primary().as_str(), "normalize");
        assert_eq!(registry.resolve_stage(None).unwrap(), 0);
        assert_eq!(registry.resolve_stage(Some(&"lint".into())).unwrap(), 1);
    }

    #[test]
    fn test_explicit_primary() {
        let registry = StageRegistry::builder()
            .stage("pre", no_transforms)
            .stage("compile", no_transforms)
            .stage("bundle", no_transforms)
            .primary("compile")
            .build()
            .unwrap();
        assert_eq!(registry.resolve_stage(None).unwrap(), 1);
    }

    #[test]
    fn test_unknown_stage_is_error() {
        let registry = StageRegistry::builder()
            .stage("lint", no_transforms)
            .build()
            .unwrap();
        let err = registry.resolve_stage(Some(&"bundle".into())).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownStage { ref stage, .. } if stage == "bundle"));
    }

    #[test]
    fn test_invalid_registries_rejected() {
        assert!(StageRegistry::builder().build().is_err());
        assert!(StageRegistry::builder()
            .stage("lint", no_transforms)
            .stage("lint", no_transforms)
            .build()
            .is_err());
        assert!(StageRegistry::builder()
            .stage("lint", no_transforms)
            .primary("compile")
            .build()
            .is_err());
    }

    #[test]
    fn test_configured_transforms_read_project_table() {
        let project = ProjectConfig::default().with_transforms(
            "lint",
            vec![
                ConfiguredTransform::Id("no-debugger".into()),
                ConfiguredTransform::Detailed {
                    id: "max-depth".into(),
                    options: TransformOptions::new().with("limit", 3),
                },
            ],
        );
        let specs = ConfiguredTransforms::new("lint").transforms(&project, &TransformOptions::new());
        let ids: Vec<_> = specs.iter().map(TransformSpec::describe).collect();
        assert_eq!(ids, vec!["no-debugger", "max-depth"]);
        assert!(ConfiguredTransforms::new("compile")
            .transforms(&project, &TransformOptions::new())
            .is_empty());
    }

    #[test]
    fn test_known_options_accumulate() {
        let registry = StageRegistry::builder()
            .stage("lint", no_transforms)
            .known_options(["target"])
            .known_options(vec!["jsx".to_string()])
            .build()
            .unwrap();
        let known: Vec<_> = registry.known_options().unwrap().iter().cloned().collect();
        assert_eq!(known, vec!["jsx", "target"]);
    }
}
