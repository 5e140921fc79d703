//! Instrumented visitors for exercising pipelines in tests and benchmarks.

use crate::ast::{Node, NodeKind};
use crate::config::ProjectConfig;
use crate::diagnostics::Diagnostic;
use crate::pipeline::TransformOptions;
use crate::stages::TransformFactory;
use crate::transform::{NodeInterest, TransformSpec, VisitContext, Visitor, VisitorRef};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts `enter` calls. Clones share the counter.
#[derive(Clone)]
pub struct CountingVisitor {
    name: String,
    interest: NodeInterest,
    visits: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingVisitor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interest: NodeInterest::All,
            visits: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    pub fn for_kinds(mut self, kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        self.interest = NodeInterest::kinds(kinds);
        self
    }

    /// Sleep on every root visit, widening the window for concurrent callers.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn visits(&self) -> usize {
        self.visits.load(Ordering::SeqCst)
    }

    pub fn as_visitor(&self) -> VisitorRef {
        Arc::new(self.clone())
    }

    /// Stage factory returning only this visitor.
    pub fn factory(&self) -> impl TransformFactory + 'static {
        let visitor = self.as_visitor();
        move |_: &ProjectConfig, _: &TransformOptions| vec![TransformSpec::visitor(Arc::clone(&visitor))]
    }
}

impl Visitor for CountingVisitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> NodeInterest {
        self.interest.clone()
    }

    fn enter(&self, node: Node, _cx: &mut VisitContext<'_>) -> Node {
        self.visits.fetch_add(1, Ordering::SeqCst);
        if let (Some(delay), true) = (self.delay, node.is_program()) {
            std::thread::sleep(delay);
        }
        node
    }
}

/// Reports one diagnostic per program it enters.
#[derive(Clone)]
pub struct EmittingVisitor {
    name: String,
    diagnostic: Diagnostic,
}

impl EmittingVisitor {
    pub fn new(name: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            name: name.into(),
            diagnostic,
        }
    }

    pub fn factory(&self) -> impl TransformFactory + 'static {
        let visitor: VisitorRef = Arc::new(self.clone());
        move |_: &ProjectConfig, _: &TransformOptions| vec![TransformSpec::visitor(Arc::clone(&visitor))]
    }
}

impl Visitor for EmittingVisitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn interest(&self) -> NodeInterest {
        NodeInterest::kinds([NodeKind::Program])
    }

    fn enter(&self, node: Node, cx: &mut VisitContext<'_>) -> Node {
        cx.report(self.diagnostic.clone());
        node
    }
}

/// Records a fixed cache dependency, or the value of a project setting when
/// built with [`DependencyVisitor::from_setting`].
pub struct DependencyVisitor {
    dependency: Option<String>,
    setting: Option<String>,
}

impl DependencyVisitor {
    pub fn new(dependency: impl Into<String>) -> Self {
        Self {
            dependency: Some(dependency.into()),
            setting: None,
        }
    }

    pub fn from_setting(key: impl Into<String>) -> Self {
        Self {
            dependency: None,
            setting: Some(key.into()),
        }
    }
}

impl Visitor for DependencyVisitor {
    fn name(&self) -> &str {
        "dependency"
    }

    fn interest(&self) -> NodeInterest {
        NodeInterest::kinds([NodeKind::Program])
    }

    fn enter(&self, node: Node, cx: &mut VisitContext<'_>) -> Node {
        let from_setting = self
            .setting
            .as_deref()
            .and_then(|key| cx.project().setting(key))
            .and_then(|value| value.as_str().map(str::to_string));
        if let Some(dependency) = self.dependency.clone().or(from_setting) {
            cx.add_cache_dependency(dependency);
        }
        node
    }
}

/// Removes every attached comment.
pub struct StripComments;

impl Visitor for StripComments {
    fn name(&self) -> &str {
        "strip-comments"
    }

    fn enter(&self, mut node: Node, _cx: &mut VisitContext<'_>) -> Node {
        node.comments.clear();
        node
    }
}
