//! Staged transform pipeline.
//!
//! [`TransformPipeline`] threads a [`TransformRequest`] through the stages of
//! a [`StageRegistry`](crate::stages::StageRegistry), memoizing each stage's
//! [`TransformResult`] so repeated requests are served from cache.

pub mod orchestrator;
pub mod request;

pub use orchestrator::{PipelineSettings, TransformPipeline, UNKNOWN_OPTION};
pub use request::{TransformOptions, TransformRequest, TransformResult};
