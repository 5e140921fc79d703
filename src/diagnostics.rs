//! Diagnostics collected while resolving stages.
//!
//! Diagnostics are plain data. The pipeline only appends them; ordering,
//! deduplication and rendering are left to reporters. Suppressed diagnostics
//! stay in the list with [`Diagnostic::suppressed`] set.

use crate::ast::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Where a diagnostic came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticOrigin {
    /// Producer family, e.g. `transform` or `suppressions`.
    pub category: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub visitor: Option<String>,
}

impl DiagnosticOrigin {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            stage: None,
            visitor: None,
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_visitor(mut self, visitor: impl Into<String>) -> Self {
        self.visitor = Some(visitor.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Slash-separated category, e.g. `lint/no-debugger`.
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub location: Option<SourceSpan>,
    pub severity: Severity,
    #[serde(default)]
    pub origin: Option<DiagnosticOrigin>,
    #[serde(default)]
    pub suppressed: bool,
}

impl Diagnostic {
    /// Error-severity diagnostic.
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
            location: None,
            severity: Severity::Error,
            origin: None,
            suppressed: false,
        }
    }

    pub fn warning(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(category, message).with_severity(Severity::Warning)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_location(mut self, location: SourceSpan) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_origin(mut self, origin: DiagnosticOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Whether this diagnostic belongs to `group` (`lint` matches `lint/x`).
    pub fn in_category(&self, group: &str) -> bool {
        self.category == group
            || self
                .category
                .strip_prefix(group)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(
                f,
                "{} [{}] {}: {}",
                location, self.severity, self.category, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.severity, self.category, self.message),
        }
    }
}
