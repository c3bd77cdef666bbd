//! `expressions` crate — the universal value model and the embedded
//! expression engine.
//!
//! Everything a flow touches travels as a [`ValueContainer`]; input templates
//! and guards are evaluated by the [`ExpressionEngine`] against an explicit
//! [`EvaluationContext`]. No other crate reaches into the value
//! representation except through these types.

pub mod ast;
pub mod engine;
pub mod error;
mod functions;
pub mod parser;
pub mod value;

pub use engine::{EvaluationContext, ExpressionEngine};
pub use error::{EvaluationError, LookupError, ParseError};
pub use value::{ValueContainer, NULL};
