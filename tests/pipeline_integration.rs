mod common;

use common::{counting_pipeline, init_logging, request};
use pretty_assertions::assert_eq;
use stagewise::testkit::{sample_tree, CountingVisitor, EmittingVisitor};
use stagewise::{
    assert_result_err, assert_result_ok, Diagnostic, Node, NodeKind, PipelineError,
    StageRegistry, TransformCatalog, TransformOptions, TransformPipeline, TransformSpec,
    VisitContext, Visitor, VisitorRef,
};
use std::sync::Arc;

fn categories(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.category.as_str()).collect()
}

fn hook_and_lint_pipeline() -> TransformPipeline {
    let hook = EmittingVisitor::new("hook", Diagnostic::warning("hook/d1", "from hook"));
    let lint = EmittingVisitor::new("lint", Diagnostic::new("lint/d2", "from lint"));
    let registry = StageRegistry::builder()
        .stage("normalize", |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            Vec::<TransformSpec>::new()
        })
        .stage("lint", lint.factory())
        .hook(Arc::new(hook) as VisitorRef)
        .build()
        .unwrap();
    TransformPipeline::new(registry, TransformCatalog::new())
}

#[test]
fn test_hook_runs_in_every_stage() {
    init_logging();
    let pipeline = hook_and_lint_pipeline();
    let base = request(sample_tree(6));

    // The hook runs in both stages, but normalize's result only holds its own
    // run, and lint inherits it before adding the lint visitor's output.
    let normalize = assert_result_ok!(pipeline.resolve(&base.clone().with_stage("normalize")));
    assert_eq!(categories(&normalize.diagnostics), vec!["hook/d1"]);

    let lint = assert_result_ok!(pipeline.resolve(&base.with_stage("lint")));
    assert_eq!(categories(&lint.diagnostics), vec!["hook/d1", "hook/d1", "lint/d2"]);
}

/// Hook that only reports while the unit is first normalized.
struct NormalizeOnlyHook;

impl Visitor for NormalizeOnlyHook {
    fn name(&self) -> &str {
        "normalize-only-hook"
    }

    fn enter(&self, node: Node, cx: &mut VisitContext<'_>) -> Node {
        if node.is_program() && cx.stage().as_str() == "normalize" {
            cx.report(Diagnostic::warning("hook/d1", "from hook"));
        }
        node
    }
}

#[test]
fn test_end_to_end_hook_and_lint_example() {
    let lint = EmittingVisitor::new("lint", Diagnostic::new("lint/d2", "from lint"));
    let registry = StageRegistry::builder()
        .stage("normalize", |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            Vec::<TransformSpec>::new()
        })
        .stage("lint", lint.factory())
        .hook(Arc::new(NormalizeOnlyHook) as VisitorRef)
        .build()
        .unwrap();
    let pipeline = TransformPipeline::new(registry, TransformCatalog::new());
    let base = request(sample_tree(5));

    let lint = pipeline.resolve(&base.clone().with_stage("lint")).unwrap();
    assert_eq!(categories(&lint.diagnostics), vec!["hook/d1", "lint/d2"]);

    let normalize = pipeline.resolve(&base.with_stage("normalize")).unwrap();
    assert_eq!(categories(&normalize.diagnostics), vec!["hook/d1"]);
}

#[test]
fn test_stage_diagnostics_end_to_end() {
    let pipeline = common::emitting_pipeline(
        Diagnostic::new("normalize/d1", "first"),
        Diagnostic::new("lint/d2", "second"),
    );
    let base = request(sample_tree(4));

    let lint = pipeline.resolve(&base.clone().with_stage("lint")).unwrap();
    assert_eq!(categories(&lint.diagnostics), vec!["normalize/d1", "lint/d2"]);

    let normalize = pipeline.resolve(&base.with_stage("normalize")).unwrap();
    assert_eq!(categories(&normalize.diagnostics), vec!["normalize/d1"]);
}

#[test]
fn test_diagnostic_origin_names_stage_and_visitor() {
    let pipeline = common::emitting_pipeline(
        Diagnostic::new("normalize/d1", "first"),
        Diagnostic::new("lint/d2", "second"),
    );
    let lint = pipeline.resolve(&request(sample_tree(2))).unwrap();
    let origin = lint.diagnostics[1].origin.clone().unwrap();
    assert_eq!(origin.category, "transform");
    assert_eq!(origin.stage.as_deref(), Some("lint"));
    assert_eq!(origin.visitor.as_deref(), Some("lint-emitter"));
}

#[test]
fn test_monotonic_accumulation() {
    let pipeline = hook_and_lint_pipeline();
    let base = request(sample_tree(9));

    let previous = pipeline.resolve(&base.clone().with_stage("normalize")).unwrap();
    let current = pipeline.resolve(&base.with_stage("lint")).unwrap();

    assert!(current.diagnostics.len() >= previous.diagnostics.len());
    assert_eq!(
        &current.diagnostics[..previous.diagnostics.len()],
        previous.diagnostics.as_slice()
    );
}

#[test]
fn test_determinism_across_pipelines() {
    let base = request(sample_tree(12)).with_stage("lint");
    let first = hook_and_lint_pipeline().resolve(&base).unwrap();
    let second = hook_and_lint_pipeline().resolve(&base).unwrap();
    assert_eq!(*first, *second);
}

#[test]
fn test_sequential_requests_compute_once() {
    let normalize = CountingVisitor::new("normalize");
    let lint = CountingVisitor::new("lint");
    let pipeline = counting_pipeline(&normalize, &lint);
    let tree = sample_tree(5);

    for _ in 0..10 {
        // Rebuild the request each time: content-equal trees share an entry.
        pipeline
            .resolve(&request(tree.clone()).with_stage("lint"))
            .unwrap();
    }

    assert_eq!(normalize.visits(), 5);
    assert_eq!(lint.visits(), 5);
}

#[test]
fn test_single_traversal_per_reduction() {
    let counters: Vec<CountingVisitor> = (0..4)
        .map(|i| CountingVisitor::new(format!("v{}", i)))
        .collect();
    let visitors: Vec<VisitorRef> = counters.iter().map(CountingVisitor::as_visitor).collect();
    let registry = StageRegistry::builder()
        .stage("lint", move |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            visitors
                .iter()
                .cloned()
                .map(TransformSpec::visitor)
                .collect::<Vec<_>>()
        })
        .build()
        .unwrap();
    let pipeline = TransformPipeline::new(registry, TransformCatalog::new());

    let tree = sample_tree(25);
    pipeline.resolve(&request(tree)).unwrap();

    for counter in &counters {
        assert_eq!(counter.visits(), 25);
    }
}

#[test]
fn test_stage_isolation() {
    let normalize = CountingVisitor::new("normalize");
    let lint = CountingVisitor::new("lint");
    let pipeline = counting_pipeline(&normalize, &lint);
    let base = request(sample_tree(3));

    pipeline.resolve(&base.clone().with_stage("normalize")).unwrap();

    let normalize_cache = pipeline.caches().stage(0);
    let lint_cache = pipeline.caches().stage(1);
    let normalize_key = normalize_cache.build_query(&base).unwrap();
    let lint_key = lint_cache.build_query(&base).unwrap();

    assert_ne!(normalize_key, lint_key);
    assert!(normalize_cache.get(&normalize_key).is_some());
    assert!(lint_cache.get(&lint_key).is_none());
    // A key built for one stage never hits in another stage's cache.
    assert!(lint_cache.get(&normalize_key).is_none());
}

#[test]
fn test_options_isolate_keys_and_results() {
    let normalize = CountingVisitor::new("normalize");
    let lint = CountingVisitor::new("lint");
    let pipeline = counting_pipeline(&normalize, &lint);
    let base = request(sample_tree(3)).with_stage("lint");
    let tuned = base
        .clone()
        .with_options(TransformOptions::new().with("target", "es2015"));

    let lint_cache = pipeline.caches().stage(1);
    assert_ne!(
        lint_cache.build_query(&base).unwrap(),
        lint_cache.build_query(&tuned).unwrap()
    );

    let a = pipeline.resolve(&base).unwrap();
    let b = pipeline.resolve(&tuned).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(lint_cache.len(), 2);
    assert_eq!(lint.visits(), 6);
}

struct Flatten;

impl Visitor for Flatten {
    fn name(&self) -> &str {
        "flatten"
    }

    fn exit(&self, mut node: Node, _cx: &mut VisitContext<'_>) -> Node {
        if node.is_program() {
            Node::new(NodeKind::Block).with_children(std::mem::take(&mut node.children))
        } else {
            node
        }
    }
}

#[test]
fn test_broken_visitor_is_fatal_and_uncached() {
    let registry = StageRegistry::builder()
        .stage("normalize", |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            Vec::<TransformSpec>::new()
        })
        .stage("compile", |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            vec![TransformSpec::visitor(Arc::new(Flatten))]
        })
        .build()
        .unwrap();
    let pipeline = TransformPipeline::new(registry, TransformCatalog::new());
    let req = request(sample_tree(3)).with_stage("compile");

    let err = assert_result_err!(pipeline.resolve(&req));
    assert!(matches!(err, PipelineError::InvalidRoot { .. }));
    // The valid earlier stage stays cached, the failing one does not.
    assert_eq!(pipeline.caches().stage(0).len(), 1);
    assert_eq!(pipeline.caches().stage(1).len(), 0);
}

#[test]
fn test_unknown_transform_is_fatal() {
    let registry = StageRegistry::builder()
        .stage("lint", |_: &stagewise::ProjectConfig, _: &TransformOptions| {
            vec![TransformSpec::named("no-such-rule", TransformOptions::new())]
        })
        .build()
        .unwrap();
    let pipeline = TransformPipeline::new(registry, TransformCatalog::new());

    let err = pipeline.resolve(&request(sample_tree(2))).unwrap_err();
    assert!(matches!(err, PipelineError::UnknownTransform { ref id, .. } if id == "no-such-rule"));
    assert!(pipeline.caches().is_empty());
}

#[test]
fn test_stats_track_hits_and_computations() {
    let normalize = CountingVisitor::new("normalize");
    let lint = CountingVisitor::new("lint");
    let pipeline = counting_pipeline(&normalize, &lint);
    let req = request(sample_tree(3)).with_stage("lint");

    pipeline.resolve(&req).unwrap();
    pipeline.resolve(&req).unwrap();

    let stats = pipeline.stats();
    assert_eq!(stats[0].stage, "normalize");
    assert_eq!(stats[0].computations, 1);
    assert_eq!(stats[1].computations, 1);
    assert_eq!(stats[1].hits, 1);
    assert_eq!(stats[1].misses, 1);
}

fn expression_chain(depth: usize) -> Node {
    let mut node = Node::new(NodeKind::Identifier);
    for _ in 0..depth {
        node = Node::new(NodeKind::Expression).with_child(node);
    }
    Node::program(vec![node])
}

#[test]
fn test_deeply_nested_tree_resolves_through_every_stage() {
    let normalize = CountingVisitor::new("normalize");
    let lint = CountingVisitor::new("lint");
    let pipeline = counting_pipeline(&normalize, &lint);
    let req = request(expression_chain(20_000)).with_stage("lint");

    let result = assert_result_ok!(pipeline.resolve(&req));

    assert_eq!(normalize.visits(), 20_002);
    assert_eq!(lint.visits(), 20_002);
    assert_eq!(result.ast.depth(), 20_002);
    assert!(result.ast == req.ast);

    // Second resolve hashes the deep tree again and hits the cache.
    assert_result_ok!(pipeline.resolve(&req));
    assert_eq!(lint.visits(), 20_002);
}
