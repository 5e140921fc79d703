//! Memo table for the results of a single stage.
//!
//! # Concurrency
//!
//! Each key maps to a shared slot (`Arc<OnceCell<..>>`). The first caller to
//! reach an empty slot runs the computation; callers arriving while it runs
//! block on the same slot and receive the finished value. The map's shard
//! lock is only held long enough to fetch or create the slot, never while a
//! computation runs, so computations may recursively consult other stages.
//!
//! A slot is filled at most once. Observers see either no value or the final
//! one. A failed computation leaves the slot empty and nothing is stored; a
//! caller that was waiting on it runs the computation itself.

use super::key::CacheKey;
use crate::errors::Result;
use crate::pipeline::TransformResult;
use crate::stages::StageId;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Slot = Arc<OnceCell<Arc<TransformResult>>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub stage: String,
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub computations: usize,
    pub hit_rate: f64,
}

/// Results of one stage, keyed by [`CacheKey`].
pub struct StageCache {
    stage: StageId,
    entries: DashMap<CacheKey, Slot>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    computations: AtomicUsize,
}

impl StageCache {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            entries: DashMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn stage(&self) -> &StageId {
        &self.stage
    }

    /// Key for `request` in this stage's key space.
    pub fn build_query(&self, request: &crate::pipeline::TransformRequest) -> Result<CacheKey> {
        super::key::CacheKeyBuilder::build(request, &self.stage)
    }

    fn owns(&self, key: &CacheKey) -> bool {
        if key.stage == self.stage {
            return true;
        }
        log::warn!(
            "Rejected key for stage `{}` in the `{}` stage cache",
            key.stage,
            self.stage
        );
        false
    }

    /// Completed result for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<TransformResult>> {
        let found = self
            .owns(key)
            .then(|| self.entries.get(key).and_then(|slot| slot.get().cloned()))
            .flatten();

        match found {
            Some(result) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::trace!("Cache hit in stage `{}`", self.stage);
                Some(result)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `result` under `key` unless a result is already present.
    ///
    /// Entries are write-once; the returned value is whichever result the
    /// cache holds after the call.
    pub fn set(&self, key: CacheKey, result: Arc<TransformResult>) -> Arc<TransformResult> {
        if !self.owns(&key) {
            return result;
        }
        let slot = Arc::clone(&self.entries.entry(key).or_default());
        let stored = slot.get_or_init(|| result);
        Arc::clone(stored)
    }

    /// Return the cached result for `key`, running `compute` at most once
    /// across all concurrent callers when it is missing.
    ///
    /// The boolean is `true` when this call ran the computation.
    pub fn get_or_try_compute<F>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<(Arc<TransformResult>, bool)>
    where
        F: FnOnce() -> Result<TransformResult>,
    {
        if !self.owns(key) {
            self.computations.fetch_add(1, Ordering::Relaxed);
            return compute().map(|result| (Arc::new(result), true));
        }

        let slot = Arc::clone(&self.entries.entry(key.clone()).or_default());
        let mut computed = false;
        let result = slot.get_or_try_init(|| {
            computed = true;
            self.computations.fetch_add(1, Ordering::Relaxed);
            compute().map(Arc::new)
        })?;

        if !computed {
            log::debug!("Reused in-flight result in stage `{}`", self.stage);
        }
        Ok((Arc::clone(result), computed))
    }

    pub fn remove(&self, key: &CacheKey) -> Option<Arc<TransformResult>> {
        self.entries
            .remove(key)
            .and_then(|(_, slot)| slot.get().cloned())
    }

    /// Drop completed entries for which `keep` returns false. Slots still
    /// being computed are left alone.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&CacheKey, &TransformResult) -> bool,
    {
        let before = self.entries.len();
        self.entries
            .retain(|key, slot| slot.get().is_none_or(|result| keep(key, &**result)));
        before - self.entries.len()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|slot| slot.value().get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            stage: self.stage.to_string(),
            entries: self.len(),
            hits,
            misses,
            computations: self.computations.load(Ordering::Relaxed),
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}
