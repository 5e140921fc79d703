//! Staged, memoized AST transform pipeline.
//!
//! A compilation unit is transformed by running its tree through an ordered
//! sequence of named stages (for example `normalize`, `compile`, `lint`).
//! Each stage reduces the previous stage's tree with a set of visitors in a
//! single traversal. Every stage result is cached per request, and carries the
//! diagnostics and cache-invalidation dependencies accumulated by itself and
//! all preceding stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use stagewise::{
//!     Node, ProjectConfig, StageRegistry, TransformCatalog, TransformPipeline,
//!     TransformRequest,
//! };
//!
//! let registry = StageRegistry::builder()
//!     .configured_stage("normalize")
//!     .configured_stage("lint")
//!     .primary("lint")
//!     .build()?;
//! let catalog = TransformCatalog::new().with("no-debugger", NoDebugger::from_options);
//! let pipeline = TransformPipeline::new(registry, catalog);
//!
//! let project = ProjectConfig::from_toml_str(&config_text)?;
//! let result = pipeline.resolve(&TransformRequest::new(parsed_tree, project))?;
//! for diagnostic in apply_suppressions(result.diagnostics.clone(), &result.suppressions) {
//!     println!("{}", diagnostic);
//! }
//! ```

pub mod ast;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod pipeline;
pub mod stages;
pub mod suppression;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod transform;

pub use crate::ast::{Comment, Node, NodeKind, Position, SourceSpan};
pub use crate::cache::{CacheKey, CacheKeyBuilder, CacheStats, CacheStore, StageCache};
pub use crate::config::{ConfiguredTransform, ProjectConfig};
pub use crate::diagnostics::{Diagnostic, DiagnosticOrigin, Severity};
pub use crate::errors::PipelineError;
pub use crate::pipeline::{
    PipelineSettings, TransformOptions, TransformPipeline, TransformRequest, TransformResult,
};
pub use crate::stages::{
    ConfiguredTransforms, StageId, StageRegistry, StageRegistryBuilder, TransformFactory,
};
pub use crate::suppression::{
    apply_suppressions, extract_suppressions, ExtractedSuppressions, Suppression,
    SuppressionTarget,
};
pub use crate::transform::{
    NodeInterest, TransformCatalog, TransformContext, TransformSpec, VisitContext, Visitor,
    VisitorRef,
};
