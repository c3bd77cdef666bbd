//! Error types for the value model and the expression engine.

use thiserror::Error;

/// Failure of a *required* path access on a [`ValueContainer`].
///
/// The optional access form never produces this — it yields `Null` instead.
///
/// [`ValueContainer`]: crate::ValueContainer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// A mapping has no entry under the requested key.
    #[error("key '{key}' not found")]
    MissingKey { key: String },

    /// A sequence index past the end.
    #[error("index {index} out of bounds (length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// The intermediate value cannot be indexed by that segment kind.
    #[error("cannot index {found} value with '{segment}'")]
    NotIndexable {
        segment: String,
        found: &'static str,
    },

    /// The path text itself is malformed.
    #[error("invalid path syntax '{0}'")]
    InvalidPath(String),
}

/// Failure to parse an expression or template string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at offset {offset}: {message}")]
pub struct ParseError {
    /// Byte offset into the expression source.
    pub offset: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Failure during expression evaluation. Local to the owning action: the
/// runner records it as that action's Failed state and the run continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A function name with no registered implementation.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// `outputs(name)` naming something that is not a defined action.
    #[error("'{0}' is not a defined action")]
    UnknownActionOutput(String),

    /// `variables(name)` naming an undeclared variable.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// A function applied to an operand of the wrong shape.
    #[error("function '{function}' expected {expected}, found {found}")]
    TypeMismatch {
        function: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Wrong number of arguments to a function.
    #[error("function '{function}' takes {expected} argument(s), received {received}")]
    ArityMismatch {
        function: String,
        expected: &'static str,
        received: usize,
    },

    /// A required accessor missed; the optional form would have yielded Null.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A guard expression produced something other than a boolean.
    #[error("condition evaluated to {found}, expected boolean")]
    NonBooleanCondition { found: &'static str },
}
