//! Session-owned collection of stage caches.

use super::stage_cache::{CacheStats, StageCache};
use crate::stages::{StageId, StageRegistry};

/// One [`StageCache`] per registered stage, in registry order.
///
/// Constructed once per build session and owned by the pipeline. Key spaces
/// never overlap: each cache only accepts keys scoped to its own stage.
pub struct CacheStore {
    caches: Vec<StageCache>,
}

impl CacheStore {
    pub fn for_registry(registry: &StageRegistry) -> Self {
        Self::new(registry.stage_ids().cloned())
    }

    pub fn new(stages: impl IntoIterator<Item = StageId>) -> Self {
        Self {
            caches: stages.into_iter().map(StageCache::new).collect(),
        }
    }

    /// Cache for the stage at `index` in registry order.
    pub fn stage(&self, index: usize) -> &StageCache {
        &self.caches[index]
    }

    pub fn by_id(&self, stage: &StageId) -> Option<&StageCache> {
        self.caches.iter().find(|cache| cache.stage() == stage)
    }

    /// Drop every result, in every stage, that depends on `dependency`.
    ///
    /// Returns the number of removed entries.
    pub fn invalidate(&self, dependency: &str) -> usize {
        let removed: usize = self
            .caches
            .iter()
            .map(|cache| cache.retain(|_, result| !result.depends_on(dependency)))
            .sum();
        if removed > 0 {
            log::debug!(
                "Invalidated {} cached stage result(s) depending on {}",
                removed,
                dependency
            );
        }
        removed
    }

    pub fn clear(&self) {
        self.caches.iter().for_each(StageCache::clear);
        log::debug!("Cleared {} stage cache(s)", self.caches.len());
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.caches.iter().map(StageCache::stats).collect()
    }

    pub fn len(&self) -> usize {
        self.caches.iter().map(StageCache::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;
    use crate::config::ProjectConfig;
    use crate::pipeline::{TransformRequest, TransformResult};
    use std::sync::Arc;

    fn result(deps: &[&str]) -> Arc<TransformResult> {
        Arc::new(TransformResult {
            ast: Arc::new(Node::program(vec![])),
            suppressions: Vec::new(),
            diagnostics: Vec::new(),
            cache_dependencies: deps.iter().map(|d| d.to_string()).collect(),
        })
    }

    #[test]
    fn test_invalidate_spans_stages() {
        let store = CacheStore::new(["normalize".into(), "lint".into()]);
        let request = TransformRequest::new(Node::program(vec![]), ProjectConfig::default());

        for index in 0..2 {
            let cache = store.stage(index);
            let key = cache.build_query(&request).unwrap();
            cache.set(key, result(&["tsconfig.json"]));
        }
        assert_eq!(store.len(), 2);

        assert_eq!(store.invalidate("package.json"), 0);
        assert_eq!(store.invalidate("tsconfig.json"), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_by_id_and_clear() {
        let store = CacheStore::new(["normalize".into(), "lint".into()]);
        let lint = store.by_id(&"lint".into()).unwrap();
        assert_eq!(lint.stage().as_str(), "lint");
        assert!(store.by_id(&"bundle".into()).is_none());

        let request = TransformRequest::new(Node::program(vec![]), ProjectConfig::default());
        lint.set(lint.build_query(&request).unwrap(), result(&[]));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.stats().len(), 2);
    }
}
