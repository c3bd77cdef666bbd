//! `actions` crate — the `ActionExecutor` contract, the type-tag registry,
//! and the built-in executor implementations.
//!
//! Every executor — built-in and extension alike — implements
//! [`ActionExecutor`]; the engine crate dispatches execution through a
//! factory registered in [`ActionRegistry`] under the action's type tag.

pub mod builtin;
pub mod error;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod traits;

pub use builtin::{Connector, ConnectorRequest, NoopExecutor, OpenApiConnectionExecutor};
pub use error::ExecutionError;
pub use registry::{ActionRegistry, ExecutorFactory};
pub use retry::{RetryExecutor, RetryPolicy};
pub use traits::{ActionContext, ActionExecutor, ActionResult};
