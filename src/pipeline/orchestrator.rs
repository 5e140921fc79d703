//! Recursive, memoized stage resolution.
//!
//! Resolving stage *i* first consults stage *i*'s cache. A hit returns
//! immediately without looking at earlier stages. A miss resolves stage
//! *i − 1* (recursively, through its own cache), reduces that result's tree
//! with stage *i*'s visitors, and stores the outcome.
//!
//! Fatal errors propagate to the caller and leave every cache untouched for
//! the failing key.

use super::request::{TransformRequest, TransformResult};
use crate::cache::{CacheKeyBuilder, CacheStats, CacheStore, RequestFingerprint};
use crate::diagnostics::{Diagnostic, DiagnosticOrigin};
use crate::errors::Result;
use crate::stages::{StageId, StageRegistry};
use crate::suppression::extract_suppressions;
use crate::transform::{TransformCatalog, TransformContext};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug_span;

pub const UNKNOWN_OPTION: &str = "transform/unknown-option";

/// Runtime switches for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// When false every resolution recomputes the whole stage chain and
    /// nothing is stored.
    pub cache_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
        }
    }
}

/// Staged transform pipeline for one build session.
///
/// Owns the stage caches; dropping the pipeline drops every cached result.
pub struct TransformPipeline {
    registry: Arc<StageRegistry>,
    catalog: Arc<TransformCatalog>,
    caches: CacheStore,
    settings: PipelineSettings,
}

impl TransformPipeline {
    pub fn new(registry: StageRegistry, catalog: TransformCatalog) -> Self {
        let caches = CacheStore::for_registry(&registry);
        Self {
            registry: Arc::new(registry),
            catalog: Arc::new(catalog),
            caches,
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &CacheStore {
        &self.caches
    }

    /// Transform `request` up to its target stage.
    pub fn resolve(&self, request: &TransformRequest) -> Result<Arc<TransformResult>> {
        let index = self.registry.resolve_stage(request.stage.as_ref())?;
        let fingerprint = CacheKeyBuilder::fingerprint(request)?;
        self.resolve_stage(request, &fingerprint, index)
    }

    /// Resolve independent requests in parallel.
    ///
    /// Requests that share a key at some stage share its single computation.
    pub fn resolve_all(&self, requests: &[TransformRequest]) -> Vec<Result<Arc<TransformResult>>> {
        requests
            .par_iter()
            .map(|request| self.resolve(request))
            .collect()
    }

    /// Results of every stage up to and including the target, in stage order.
    pub fn resolve_stages(
        &self,
        request: &TransformRequest,
    ) -> Result<Vec<(StageId, Arc<TransformResult>)>> {
        let target = self.registry.resolve_stage(request.stage.as_ref())?;
        let fingerprint = CacheKeyBuilder::fingerprint(request)?;
        // Resolving the target fills the whole chain; the loop below only hits.
        self.resolve_stage(request, &fingerprint, target)?;
        (0..=target)
            .map(|index| {
                let id = self.registry.stage(index).id.clone();
                self.resolve_stage(request, &fingerprint, index)
                    .map(|result| (id, result))
            })
            .collect()
    }

    /// Drop cached results depending on `dependency`.
    pub fn invalidate(&self, dependency: &str) -> usize {
        self.caches.invalidate(dependency)
    }

    pub fn clear(&self) {
        self.caches.clear();
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.caches.stats()
    }

    fn resolve_stage(
        &self,
        request: &TransformRequest,
        fingerprint: &RequestFingerprint,
        index: usize,
    ) -> Result<Arc<TransformResult>> {
        let stage = &self.registry.stage(index).id;
        let _span = debug_span!("resolve_stage", stage = %stage).entered();

        if !self.settings.cache_enabled {
            return self
                .compute_stage(request, fingerprint, index)
                .map(Arc::new);
        }

        let cache = self.caches.stage(index);
        let key = fingerprint.for_stage(stage.clone());

        if let Some(cached) = cache.get(&key) {
            return Ok(cached);
        }

        let (result, computed) =
            cache.get_or_try_compute(&key, || self.compute_stage(request, fingerprint, index))?;
        if computed {
            log::debug!(
                "Computed stage `{}` ({} diagnostic(s))",
                stage,
                result.diagnostics.len()
            );
        }
        Ok(result)
    }

    fn compute_stage(
        &self,
        request: &TransformRequest,
        fingerprint: &RequestFingerprint,
        index: usize,
    ) -> Result<TransformResult> {
        let (working, mut diagnostics, mut cache_dependencies) = if index > 0 {
            let previous = self.resolve_stage(request, fingerprint, index - 1)?;
            (
                Arc::clone(&previous.ast),
                previous.diagnostics.clone(),
                previous.cache_dependencies.clone(),
            )
        } else {
            (Arc::clone(&request.ast), Vec::new(), Vec::new())
        };

        let definition = self.registry.stage(index);
        let mut context = TransformContext::new(
            definition.id.clone(),
            Arc::clone(&request.project),
            request.options.clone(),
            Arc::clone(&self.catalog),
        );
        if index == 0 {
            self.report_unknown_options(&mut context);
        }

        let specs = definition
            .factory
            .transforms(&request.project, &request.options);
        let mut visitors = self.registry.hook_visitors().to_vec();
        visitors.extend(context.normalize_transforms(specs)?);

        let reduced = context.reduce(&working, &visitors)?;
        let extracted = extract_suppressions(&working);

        let (own_diagnostics, own_dependencies) = context.finish();
        diagnostics.extend(own_diagnostics);
        diagnostics.extend(extracted.diagnostics);
        for dependency in own_dependencies {
            if !cache_dependencies.contains(&dependency) {
                cache_dependencies.push(dependency);
            }
        }

        Ok(TransformResult {
            ast: Arc::new(reduced),
            suppressions: extracted.suppressions,
            diagnostics,
            cache_dependencies,
        })
    }

    fn report_unknown_options(&self, context: &mut TransformContext) {
        let Some(known) = self.registry.known_options() else {
            return;
        };
        let unknown: Vec<String> = context
            .options()
            .keys()
            .filter(|key| !known.contains(*key))
            .map(str::to_string)
            .collect();
        for key in unknown {
            let origin = DiagnosticOrigin::new("transform").with_stage(context.stage().as_str());
            context.add_diagnostic(
                Diagnostic::warning(UNKNOWN_OPTION, format!("Unrecognized option `{}` was ignored", key))
                    .with_origin(origin),
            );
        }
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("registry", &self.registry)
            .field("catalog", &self.catalog)
            .field("settings", &self.settings)
            .field("cached_results", &self.caches.len())
            .finish()
    }
}
