// Shared helpers for stagewise integration tests
#![allow(dead_code)]

use stagewise::testkit::{two_stage_registry, CountingVisitor, EmittingVisitor};
use stagewise::{
    Diagnostic, Node, ProjectConfig, TransformCatalog, TransformPipeline, TransformRequest,
};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn request(ast: Node) -> TransformRequest {
    TransformRequest::new(ast, ProjectConfig::new("fixture"))
}

/// Pipeline over `[normalize, lint]` running one counting visitor per stage.
pub fn counting_pipeline(
    normalize: &CountingVisitor,
    lint: &CountingVisitor,
) -> TransformPipeline {
    let registry = two_stage_registry(normalize.factory(), lint.factory())
        .expect("two-stage registry is valid");
    TransformPipeline::new(registry, TransformCatalog::new())
}

/// Pipeline over `[normalize, lint]` whose stages each emit one diagnostic.
pub fn emitting_pipeline(normalize: Diagnostic, lint: Diagnostic) -> TransformPipeline {
    let registry = two_stage_registry(
        EmittingVisitor::new("normalize-emitter", normalize).factory(),
        EmittingVisitor::new("lint-emitter", lint).factory(),
    )
    .expect("two-stage registry is valid");
    TransformPipeline::new(registry, TransformCatalog::new())
}
