//! Visitors and the catalog that builds them from configuration.
//!
//! A visitor is a set of per-node-kind handlers. Visitors declare the kinds
//! they handle with [`Visitor::interest`]; the reduction engine in
//! [`context`] only dispatches matching nodes to them, and combines every
//! active visitor into a single traversal.

pub mod context;

pub use context::{TransformContext, VisitContext};

use crate::ast::{Node, NodeKind};
use crate::pipeline::TransformOptions;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Node kinds a visitor wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeInterest {
    All,
    Kinds(Vec<NodeKind>),
}

impl NodeInterest {
    pub fn kinds(kinds: impl IntoIterator<Item = NodeKind>) -> Self {
        Self::Kinds(kinds.into_iter().collect())
    }

    pub fn matches(&self, kind: &NodeKind) -> bool {
        match self {
            NodeInterest::All => true,
            NodeInterest::Kinds(kinds) => kinds.contains(kind),
        }
    }
}

/// Per-node handlers applied during a reduction.
///
/// `enter` runs before a node's children are reduced and `exit` after. Both
/// receive the node as left by the previous visitor in the list and return
/// the node to hand to the next one. Problems with the input are reported
/// through [`VisitContext::report`], never by panicking.
pub trait Visitor: Send + Sync {
    fn name(&self) -> &str;

    fn interest(&self) -> NodeInterest {
        NodeInterest::All
    }

    fn enter(&self, node: Node, _cx: &mut VisitContext<'_>) -> Node {
        node
    }

    fn exit(&self, node: Node, _cx: &mut VisitContext<'_>) -> Node {
        node
    }
}

pub type VisitorRef = Arc<dyn Visitor>;

/// A configured transform: either a ready visitor or an identifier to be
/// resolved through the [`TransformCatalog`].
#[derive(Clone)]
pub enum TransformSpec {
    Visitor(VisitorRef),
    Named {
        id: String,
        options: TransformOptions,
    },
}

impl TransformSpec {
    pub fn visitor(visitor: VisitorRef) -> Self {
        Self::Visitor(visitor)
    }

    pub fn named(id: impl Into<String>, options: TransformOptions) -> Self {
        Self::Named {
            id: id.into(),
            options,
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            TransformSpec::Visitor(visitor) => visitor.name(),
            TransformSpec::Named { id, .. } => id,
        }
    }
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformSpec::Visitor(visitor) => f.debug_tuple("Visitor").field(&visitor.name()).finish(),
            TransformSpec::Named { id, options } => f
                .debug_struct("Named")
                .field("id", id)
                .field("options", options)
                .finish(),
        }
    }
}

pub type VisitorConstructor =
    Arc<dyn Fn(&TransformOptions) -> anyhow::Result<VisitorRef> + Send + Sync>;

/// Maps transform identifiers to visitor constructors.
#[derive(Clone, Default)]
pub struct TransformCatalog {
    constructors: HashMap<String, VisitorConstructor>,
}

impl TransformCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&TransformOptions) -> anyhow::Result<VisitorRef> + Send + Sync + 'static,
    {
        self.constructors.insert(id.into(), Arc::new(constructor));
        self
    }

    pub fn with<F>(mut self, id: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&TransformOptions) -> anyhow::Result<VisitorRef> + Send + Sync + 'static,
    {
        self.register(id, constructor);
        self
    }

    pub fn get(&self, id: &str) -> Option<&VisitorConstructor> {
        self.constructors.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for TransformCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformCatalog")
            .field("ids", &self.ids())
            .finish()
    }
}
