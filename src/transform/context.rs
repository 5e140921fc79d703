//! Execution context for one stage.
//!
//! A [`TransformContext`] is created per stage resolution. It resolves the
//! stage's transform specs into visitors, runs the combined reduction, and
//! collects what the visitors report: diagnostics (append-only) and cache
//! dependencies (ordered, deduplicated).
//!
//! # Reduction
//!
//! [`TransformContext::reduce`] walks the tree once, depth first. At every
//! node, interested visitors run `enter` in list order, the children are
//! reduced, then interested visitors run `exit` in list order. The cost is
//! nodes × visitors handler calls over a single walk.

use super::{NodeInterest, TransformCatalog, TransformSpec, VisitorRef};
use crate::ast::Node;
use crate::config::ProjectConfig;
use crate::diagnostics::{Diagnostic, DiagnosticOrigin};
use crate::errors::{PipelineError, Result};
use crate::pipeline::TransformOptions;
use crate::stages::StageId;
use std::sync::Arc;
use tracing::debug_span;

pub struct TransformContext {
    stage: StageId,
    project: Arc<ProjectConfig>,
    options: TransformOptions,
    catalog: Arc<TransformCatalog>,
    diagnostics: Vec<Diagnostic>,
    cache_dependencies: Vec<String>,
}

/// A node whose `enter` handlers have run and whose children are being
/// reduced.
struct OpenNode {
    node: Node,
    pending: std::vec::IntoIter<Node>,
    reduced: Vec<Node>,
    depth: usize,
}

impl OpenNode {
    fn new(mut node: Node, depth: usize) -> Self {
        let children = std::mem::take(&mut node.children);
        Self {
            node,
            reduced: Vec::with_capacity(children.len()),
            pending: children.into_iter(),
            depth,
        }
    }

    fn close(mut self) -> Node {
        self.node.children = std::mem::take(&mut self.reduced);
        self.node
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Enter,
    Exit,
}

impl TransformContext {
    pub fn new(
        stage: StageId,
        project: Arc<ProjectConfig>,
        options: TransformOptions,
        catalog: Arc<TransformCatalog>,
    ) -> Self {
        Self {
            stage,
            project,
            options,
            catalog,
            diagnostics: Vec::new(),
            cache_dependencies: Vec::new(),
        }
    }

    pub fn stage(&self) -> &StageId {
        &self.stage
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Resolve transform specs into visitors, preserving order.
    pub fn normalize_transforms(&self, specs: Vec<TransformSpec>) -> Result<Vec<VisitorRef>> {
        specs
            .into_iter()
            .map(|spec| match spec {
                TransformSpec::Visitor(visitor) => Ok(visitor),
                TransformSpec::Named { id, options } => {
                    let constructor =
                        self.catalog
                            .get(&id)
                            .ok_or_else(|| PipelineError::UnknownTransform {
                                id: id.clone(),
                                stage: self.stage.to_string(),
                            })?;
                    constructor(&options)
                        .map_err(|source| PipelineError::TransformConstruction { id, source })
                }
            })
            .collect()
    }

    /// Apply every visitor to `ast` in one traversal.
    ///
    /// Fails with [`PipelineError::InvalidRoot`] if the reduced tree's root is
    /// not a program node.
    pub fn reduce(&mut self, ast: &Node, visitors: &[VisitorRef]) -> Result<Node> {
        let _span = debug_span!("reduce", stage = %self.stage, visitors = visitors.len()).entered();

        let interests: Vec<NodeInterest> = visitors.iter().map(|v| v.interest()).collect();
        let reduced = self.reduce_tree(ast.clone(), visitors, &interests);

        if !reduced.is_program() {
            return Err(PipelineError::InvalidRoot {
                stage: self.stage.to_string(),
                found: reduced.kind.clone(),
            });
        }
        Ok(reduced)
    }

    /// Depth-first reduction driven by an explicit stack of open nodes, so
    /// tree depth is bounded by memory rather than by the thread's stack.
    fn reduce_tree(
        &mut self,
        root: Node,
        visitors: &[VisitorRef],
        interests: &[NodeInterest],
    ) -> Node {
        let entered = self.dispatch(root, visitors, interests, Phase::Enter, 0);
        let mut stack = vec![OpenNode::new(entered, 0)];

        while let Some(open) = stack.last_mut() {
            if let Some(child) = open.pending.next() {
                let depth = open.depth + 1;
                let entered = self.dispatch(child, visitors, interests, Phase::Enter, depth);
                stack.push(OpenNode::new(entered, depth));
                continue;
            }

            let Some(open) = stack.pop() else { break };
            let depth = open.depth;
            let node = self.dispatch(open.close(), visitors, interests, Phase::Exit, depth);
            match stack.last_mut() {
                Some(parent) => parent.reduced.push(node),
                None => return node,
            }
        }
        unreachable!("the root is closed last")
    }

    fn dispatch(
        &mut self,
        mut node: Node,
        visitors: &[VisitorRef],
        interests: &[NodeInterest],
        phase: Phase,
        depth: usize,
    ) -> Node {
        for (visitor, interest) in visitors.iter().zip(interests) {
            // Kind may have been rewritten by an earlier visitor.
            if !interest.matches(&node.kind) {
                continue;
            }
            let span = node.span;
            let mut cx = VisitContext {
                context: self,
                visitor: visitor.name(),
                depth,
            };
            node = match phase {
                Phase::Enter => visitor.enter(node, &mut cx),
                Phase::Exit => visitor.exit(node, &mut cx),
            };
            if node.span.is_none() {
                node.span = span;
            }
        }
        node
    }

    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn add_cache_dependency(&mut self, dependency: impl Into<String>) {
        let dependency = dependency.into();
        if !self.cache_dependencies.contains(&dependency) {
            self.cache_dependencies.push(dependency);
        }
    }

    pub fn cache_dependencies(&self) -> &[String] {
        &self.cache_dependencies
    }

    /// Consume the context, yielding its diagnostics and dependencies.
    pub fn finish(self) -> (Vec<Diagnostic>, Vec<String>) {
        (self.diagnostics, self.cache_dependencies)
    }
}

/// Handle given to visitor handlers during a reduction.
pub struct VisitContext<'a> {
    context: &'a mut TransformContext,
    visitor: &'a str,
    depth: usize,
}

impl VisitContext<'_> {
    /// Record a diagnostic. An origin naming this stage and visitor is filled
    /// in when the diagnostic has none.
    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.origin.is_none() {
            diagnostic.origin = Some(
                DiagnosticOrigin::new("transform")
                    .with_stage(self.context.stage.as_str())
                    .with_visitor(self.visitor),
            );
        }
        self.context.add_diagnostic(diagnostic);
    }

    /// Record an external identifier whose change invalidates this stage.
    pub fn add_cache_dependency(&mut self, dependency: impl Into<String>) {
        self.context.add_cache_dependency(dependency);
    }

    pub fn stage(&self) -> &StageId {
        &self.context.stage
    }

    pub fn project(&self) -> &ProjectConfig {
        &self.context.project
    }

    pub fn options(&self) -> &TransformOptions {
        &self.context.options
    }

    /// Depth of the current node; the root is at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }
}
