//! Factory functions for test trees and registries.

use crate::ast::{Comment, Node, NodeKind, SourceSpan};
use crate::errors::Result;
use crate::stages::{StageRegistry, TransformFactory};

/// Program with exactly `node_count` nodes (at least the root).
///
/// Statements are grouped under blocks of up to three, so the tree has some
/// depth.
pub fn sample_tree(node_count: usize) -> Node {
    let mut remaining = node_count.saturating_sub(1);
    let mut blocks = Vec::new();
    let mut line = 1;

    while remaining > 0 {
        remaining -= 1;
        let statements = remaining.min(3);
        remaining -= statements;

        let children = (0..statements)
            .map(|i| {
                Node::new(NodeKind::Statement)
                    .with_span(SourceSpan::lines(line + i + 1, line + i + 1))
                    .with_property("index", (line + i) as u64)
            })
            .collect();
        blocks.push(
            Node::new(NodeKind::Block)
                .with_span(SourceSpan::lines(line, line + statements + 1))
                .with_children(children),
        );
        line += statements + 2;
    }

    Node::program(blocks).with_span(SourceSpan::lines(1, line.max(1)))
}

pub fn directive(id: u32, text: &str) -> Comment {
    Comment::new(id, text)
}

/// Function node spanning `start..=end` with `comment` attached.
pub fn annotated_function(start: usize, end: usize, comment: Comment) -> Node {
    Node::new(NodeKind::Function)
        .with_span(SourceSpan::lines(start, end))
        .with_comment(comment)
}

/// Registry `[normalize, lint]` with `lint` as the primary stage.
pub fn two_stage_registry<N, L>(normalize: N, lint: L) -> Result<StageRegistry>
where
    N: TransformFactory + 'static,
    L: TransformFactory + 'static,
{
    StageRegistry::builder()
        .stage("normalize", normalize)
        .stage("lint", lint)
        .primary("lint")
        .build()
}
