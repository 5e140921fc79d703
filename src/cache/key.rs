//! Deterministic cache keys for stage results.
//!
//! Fingerprints are SHA-256 digests of the canonical JSON form of each input.
//! Trees are hashed node by node so their depth never matters.
//! Node properties, options and settings are all sorted maps, so content-equal
//! inputs produce equal digests no matter how they were built. Content hashing
//! lets two independently parsed but identical trees share one cache entry.

use crate::ast::{Comment, Node, NodeKind, SourceSpan};
use crate::config::ProjectConfig;
use crate::errors::Result;
use crate::pipeline::{TransformOptions, TransformRequest};
use crate::stages::StageId;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    fn of<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(Self(Sha256::digest(&bytes).into()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_string()[..12])
    }
}

/// Stage-independent part of a cache key.
///
/// Computed once per top-level resolution and reused for every stage in the
/// chain, so the tree is hashed once rather than once per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestFingerprint {
    pub ast: Fingerprint,
    pub options: Fingerprint,
    pub project: Fingerprint,
}

impl RequestFingerprint {
    pub fn for_stage(&self, stage: StageId) -> CacheKey {
        CacheKey {
            stage,
            ast: self.ast,
            options: self.options,
            project: self.project,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub stage: StageId,
    pub ast: Fingerprint,
    pub options: Fingerprint,
    pub project: Fingerprint,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:?}:{:?}:{:?}",
            self.stage, self.ast, self.options, self.project
        )
    }
}

/// A node's own content, without its subtree.
#[derive(Serialize)]
struct NodeHeader<'a> {
    kind: &'a NodeKind,
    span: Option<SourceSpan>,
    properties: &'a BTreeMap<String, Value>,
    comments: &'a [Comment],
    children: usize,
}

impl<'a> From<&'a Node> for NodeHeader<'a> {
    fn from(node: &'a Node) -> Self {
        Self {
            kind: &node.kind,
            span: node.span,
            properties: &node.properties,
            comments: &node.comments,
            children: node.children.len(),
        }
    }
}

pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Hash the tree one node at a time in pre-order. Each node contributes
    /// its own fields and child count, which together fix the tree's shape.
    pub fn fingerprint_ast(ast: &Node) -> Result<Fingerprint> {
        let mut hasher = Sha256::new();
        for node in ast.descendants() {
            let header = serde_json::to_vec(&NodeHeader::from(node))?;
            hasher.update((header.len() as u64).to_le_bytes());
            hasher.update(&header);
        }
        Ok(Fingerprint(hasher.finalize().into()))
    }

    pub fn fingerprint_options(options: &TransformOptions) -> Result<Fingerprint> {
        Fingerprint::of(options)
    }

    pub fn fingerprint_project(project: &ProjectConfig) -> Result<Fingerprint> {
        Fingerprint::of(project)
    }

    pub fn fingerprint(request: &TransformRequest) -> Result<RequestFingerprint> {
        Ok(RequestFingerprint {
            ast: Self::fingerprint_ast(&request.ast)?,
            options: Self::fingerprint_options(&request.options)?,
            project: Self::fingerprint_project(&request.project)?,
        })
    }

    /// Key for `request` scoped to `stage`.
    pub fn build(request: &TransformRequest, stage: &StageId) -> Result<CacheKey> {
        Ok(Self::fingerprint(request)?.for_stage(stage.clone()))
    }
}
