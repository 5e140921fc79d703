//! Testing infrastructure for pipelines.
//!
//! - **Tree helpers**: synthetic trees of a known size and annotated nodes
//! - **Instrumented visitors**: count handler calls, emit diagnostics, record
//!   cache dependencies, strip comments
//! - **Assertion macros**: [`crate::assert_result_ok!`] and
//!   [`crate::assert_result_err!`]
//!
//! # Example
//!
//! ```rust,ignore
//! use stagewise::testkit::{sample_tree, CountingVisitor};
//!
//! let counter = CountingVisitor::new("count");
//! let registry = StageRegistry::builder()
//!     .stage("lint", counter.factory())
//!     .build()?;
//! let pipeline = TransformPipeline::new(registry, TransformCatalog::new());
//! pipeline.resolve(&TransformRequest::new(sample_tree(10), ProjectConfig::default()))?;
//! assert_eq!(counter.visits(), 10);
//! ```

pub mod assertions;
pub mod helpers;
pub mod visitors;

pub use helpers::{annotated_function, directive, sample_tree, two_stage_registry};
pub use visitors::{CountingVisitor, DependencyVisitor, EmittingVisitor, StripComments};
