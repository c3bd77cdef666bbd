//! Engine-level error types.
//!
//! Only these are flow-fatal: a bad definition fails initialization, a
//! strict-mode configuration problem fails `trigger` before any action runs.
//! Everything else (evaluation, lookup, execution failures) stays local to
//! the owning action and lands in its [`ActionState`](crate::ActionState).

use thiserror::Error;

/// A malformed flow document: rejected at initialization, never mid-run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    /// The document is not valid JSON or not shaped like a flow.
    #[error("failed to parse flow document: {0}")]
    Parse(String),

    /// Two actions share one name.
    #[error("duplicate action name: '{0}'")]
    DuplicateActionName(String),

    /// A `runAfter` entry names an action that does not exist.
    #[error("action '{action}' runs after unknown action '{reference}'")]
    UnknownRunAfterReference { action: String, reference: String },

    /// Topological sort found a cycle in the run-after relation.
    #[error("run-after relation contains a cycle involving '{0}'")]
    CycleDetected(String),
}

/// Strict-mode policy violation: an action type with no registered executor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no executor registered for action type '{action_type}' (action '{action}')")]
    UnknownActionType { action: String, action_type: String },
}

/// Failures of a `trigger` call as a whole. A run that gets past these
/// always produces a complete [`FlowReport`](crate::FlowReport).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// `trigger` was called before `initialize`.
    #[error("flow runner is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}
