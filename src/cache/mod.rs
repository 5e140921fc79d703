//! Per-stage memoization of transform results.
//!
//! - [`key`]: deterministic, stage-scoped cache keys
//! - [`stage_cache`]: one write-once memo table per stage with in-flight
//!   de-duplication
//! - [`store`]: the session-owned set of stage caches and invalidation

pub mod key;
pub mod stage_cache;
pub mod store;

pub use key::{CacheKey, CacheKeyBuilder, Fingerprint, RequestFingerprint};
pub use stage_cache::{CacheStats, StageCache};
pub use store::CacheStore;
