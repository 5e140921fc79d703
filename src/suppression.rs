//! Suppression directives attached to tree nodes.
//!
//! A directive is a comment of the form
//!
//! ```text
//! stagewise-ignore[lint/no-debugger,lint/max-depth] -- legacy code
//! stagewise-ignore[*]
//! stagewise-ignore[lint] legacy code
//! ```
//!
//! The `--` before the reason is optional.
//!
//! attached to a node. It suppresses diagnostics of the listed categories
//! (or every category for `*`) located inside that node's span. A category
//! also covers its sub-categories: `lint` suppresses `lint/no-debugger`.
//!
//! Extraction never fails. Malformed directives are reported as diagnostics in
//! the `suppressions/` category and otherwise ignored.

use crate::ast::{Node, SourceSpan};
use crate::diagnostics::{Diagnostic, DiagnosticOrigin};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const MISSING_TARGET: &str = "suppressions/missing-target";
pub const DUPLICATE: &str = "suppressions/duplicate";
pub const INCORRECT_PREFIX: &str = "suppressions/incorrect-prefix";

const DIRECTIVE_PREFIX: &str = "stagewise-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionTarget {
    Category(String),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    pub target: SuppressionTarget,
    /// Span of the annotated node, or of the comment when the node has none.
    /// `None` (neither has a span) covers the whole unit.
    pub span: Option<SourceSpan>,
    pub reason: Option<String>,
    pub comment_id: u32,
}

impl Suppression {
    pub fn matches(&self, diagnostic: &Diagnostic) -> bool {
        let category_matches = match &self.target {
            SuppressionTarget::Wildcard => true,
            SuppressionTarget::Category(category) => diagnostic.in_category(category),
        };
        let location_matches = match (&self.span, &diagnostic.location) {
            (None, _) => true,
            (Some(span), Some(location)) => span.contains(location),
            (Some(_), None) => false,
        };
        category_matches && location_matches
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedSuppressions {
    pub suppressions: Vec<Suppression>,
    pub diagnostics: Vec<Diagnostic>,
}

static VALID_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^stagewise-ignore\[([^\]]*)\](?:\s*(?:--)?\s*(.*))?$").expect("valid regex")
});

static BARE_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^stagewise-ignore(?:[^\w-]|$)").expect("valid regex"));

static OTHER_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^stagewise-([\w-]+)").expect("valid regex"));

enum DirectiveParse {
    Directive {
        targets: Vec<String>,
        reason: Option<String>,
    },
    MissingTarget,
    IncorrectPrefix(String),
    NotDirective,
}

fn parse_directive(text: &str) -> DirectiveParse {
    let text = text.trim();
    if !text.starts_with(DIRECTIVE_PREFIX) {
        return DirectiveParse::NotDirective;
    }

    try_parse_valid(text)
        .or_else(|| try_parse_bare(text))
        .or_else(|| try_parse_other_prefix(text))
        .unwrap_or(DirectiveParse::NotDirective)
}

fn try_parse_valid(text: &str) -> Option<DirectiveParse> {
    VALID_DIRECTIVE.captures(text).map(|captures| {
        let targets: Vec<String> = captures
            .get(1)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if targets.is_empty() {
            return DirectiveParse::MissingTarget;
        }
        DirectiveParse::Directive {
            targets,
            reason: captures
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|r| !r.is_empty()),
        }
    })
}

fn try_parse_bare(text: &str) -> Option<DirectiveParse> {
    BARE_DIRECTIVE
        .is_match(text)
        .then_some(DirectiveParse::MissingTarget)
}

fn try_parse_other_prefix(text: &str) -> Option<DirectiveParse> {
    OTHER_DIRECTIVE
        .captures(text)
        .filter(|captures| &captures[1] != "ignore")
        .map(|captures| DirectiveParse::IncorrectPrefix(captures[0].to_string()))
}

fn malformed(category: &str, message: String, location: Option<SourceSpan>) -> Diagnostic {
    let diagnostic =
        Diagnostic::warning(category, message).with_origin(DiagnosticOrigin::new("suppressions"));
    match location {
        Some(location) => diagnostic.with_location(location),
        None => diagnostic,
    }
}

/// Collect every directive in `ast`.
///
/// Pure and idempotent: the tree is only read, and equal trees always yield
/// equal output. Comments attached to several nodes are processed once, for
/// the first node reached in pre-order.
pub fn extract_suppressions(ast: &Node) -> ExtractedSuppressions {
    let mut extracted = ExtractedSuppressions::default();
    let mut seen_comments = HashSet::new();

    for node in ast.descendants() {
        for comment in &node.comments {
            if !seen_comments.insert(comment.id) {
                continue;
            }
            let location = comment.span.or(node.span);
            match parse_directive(&comment.text) {
                DirectiveParse::Directive { targets, reason } => {
                    let scope = node.span.or(comment.span);
                    push_targets(&mut extracted, scope, comment.id, targets, reason, location)
                }
                DirectiveParse::MissingTarget => extracted.diagnostics.push(malformed(
                    MISSING_TARGET,
                    "Suppression directive has no category list; use stagewise-ignore[category] or stagewise-ignore[*]"
                        .to_string(),
                    location,
                )),
                DirectiveParse::IncorrectPrefix(found) => extracted.diagnostics.push(malformed(
                    INCORRECT_PREFIX,
                    format!("Unknown directive `{}`; did you mean stagewise-ignore?", found),
                    location,
                )),
                DirectiveParse::NotDirective => {}
            }
        }
    }

    extracted
}

fn push_targets(
    extracted: &mut ExtractedSuppressions,
    scope: Option<SourceSpan>,
    comment_id: u32,
    targets: Vec<String>,
    reason: Option<String>,
    location: Option<SourceSpan>,
) {
    let mut seen_targets = HashSet::new();
    for target in targets {
        if !seen_targets.insert(target.clone()) {
            extracted.diagnostics.push(malformed(
                DUPLICATE,
                format!("Category `{}` is listed more than once", target),
                location,
            ));
            continue;
        }
        let target = if target == "*" {
            SuppressionTarget::Wildcard
        } else {
            SuppressionTarget::Category(target)
        };
        extracted.suppressions.push(Suppression {
            target,
            span: scope,
            reason: reason.clone(),
            comment_id,
        });
    }
}

/// Flag every diagnostic covered by a suppression.
///
/// Diagnostics are never removed. Diagnostics about the directives themselves
/// cannot be suppressed.
pub fn apply_suppressions(
    diagnostics: Vec<Diagnostic>,
    suppressions: &[Suppression],
) -> Vec<Diagnostic> {
    diagnostics
        .into_iter()
        .map(|mut diagnostic| {
            if !diagnostic.in_category("suppressions")
                && suppressions.iter().any(|s| s.matches(&diagnostic))
            {
                diagnostic.suppressed = true;
            }
            diagnostic
        })
        .collect()
}
