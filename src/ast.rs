//! Generic syntax tree threaded through the transform pipeline.
//!
//! The pipeline does not parse anything itself. A parser outside this crate
//! produces a [`Node`] tree; stages rewrite it and hand it on. Every tree that
//! enters or leaves a stage must satisfy the root-shape contract: its root is
//! a [`NodeKind::Program`] node.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Tag used by visitors to declare which nodes they handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,
    Function,
    Block,
    Statement,
    Expression,
    Call,
    Identifier,
    Literal,
    /// Grammar-specific kinds the pipeline has no opinion about.
    Custom(String),
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Program => write!(f, "program"),
            NodeKind::Function => write!(f, "function"),
            NodeKind::Block => write!(f, "block"),
            NodeKind::Statement => write!(f, "statement"),
            NodeKind::Expression => write!(f, "expression"),
            NodeKind::Call => write!(f, "call"),
            NodeKind::Identifier => write!(f, "identifier"),
            NodeKind::Literal => write!(f, "literal"),
            NodeKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: Position,
    pub end: Position,
}

impl SourceSpan {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Span covering whole lines `start_line..=end_line`.
    pub fn lines(start_line: usize, end_line: usize) -> Self {
        Self {
            start: Position::new(start_line, 1),
            end: Position::new(end_line, usize::MAX),
        }
    }

    /// Whether `other` lies entirely inside this span.
    pub fn contains(&self, other: &SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// A source comment attached to the node that follows it.
///
/// `id` identifies the comment in its source file. Parsers may attach the
/// same comment to several nodes; consumers use the id to process it once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u32,
    pub text: String,
    #[serde(default)]
    pub span: Option<SourceSpan>,
}

impl Comment {
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }
}

/// A tree node.
///
/// `Clone`, `PartialEq` and `Drop` walk the tree with an explicit stack, so
/// arbitrarily deep trees (long operator chains, generated code) never
/// exhaust the thread's stack.
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    #[serde(default)]
    pub span: Option<SourceSpan>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            span: None,
            properties: BTreeMap::new(),
            children: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Root node holding `children`.
    pub fn program(children: Vec<Node>) -> Self {
        Self::new(NodeKind::Program).with_children(children)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Root-shape contract for trees entering or leaving a stage.
    pub fn is_program(&self) -> bool {
        self.kind == NodeKind::Program
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        self.descendants().count()
    }

    /// Length of the longest root-to-leaf path; a lone node has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(node.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    /// Copy of this node without its children.
    fn shallow_clone(&self) -> Node {
        Node {
            kind: self.kind.clone(),
            span: self.span,
            properties: self.properties.clone(),
            children: Vec::with_capacity(self.children.len()),
            comments: self.comments.clone(),
        }
    }

    /// Pre-order iterator over this subtree.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

impl Clone for Node {
    fn clone(&self) -> Self {
        // Each frame pairs a source node with its copy; a copy is attached to
        // its parent once all of its children have been copied.
        let mut stack = vec![(self, self.shallow_clone())];
        while let Some((source, copy)) = stack.pop() {
            match source.children.get(copy.children.len()) {
                Some(child) => {
                    stack.push((source, copy));
                    stack.push((child, child.shallow_clone()));
                }
                None => match stack.last_mut() {
                    Some((_, parent)) => parent.children.push(copy),
                    None => return copy,
                },
            }
        }
        unreachable!("the root frame is always popped last")
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if a.kind != b.kind
                || a.span != b.span
                || a.properties != b.properties
                || a.comments != b.comments
                || a.children.len() != b.children.len()
            {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}
