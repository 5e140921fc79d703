//! Fatal errors raised while resolving a stage.
//!
//! Anything that a visitor can report as a problem with the input is a
//! [`Diagnostic`](crate::diagnostics::Diagnostic), not an error. The variants
//! here abort the current resolution and are never written to a stage cache.

use crate::ast::NodeKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request named a stage the registry does not know.
    #[error("Configuration error: unknown stage `{stage}` (registered: {})", .registered.join(", "))]
    UnknownStage {
        stage: String,
        registered: Vec<String>,
    },

    /// A stage configured a transform identifier with no registered constructor.
    #[error("Unknown transform `{id}` configured for stage `{stage}`")]
    UnknownTransform { id: String, stage: String },

    /// A transform constructor rejected its options.
    #[error("Transform `{id}` could not be constructed: {source}")]
    TransformConstruction {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// A reduction returned a tree whose root is not a program node.
    #[error("Stage `{stage}` produced a `{found}` root node, expected `program`")]
    InvalidRoot { stage: String, found: NodeKind },

    /// Registry or project configuration is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the error points at configuration the user can fix, as opposed
    /// to a defective visitor.
    pub fn is_user_fixable(&self) -> bool {
        !matches!(self, Self::InvalidRoot { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
