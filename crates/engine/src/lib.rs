//! `engine` crate — flow definition parsing, graph building, and the flow
//! runner that orchestrates one execution per trigger call.

pub mod definition;
pub mod error;
pub mod graph;
pub mod report;
pub mod runner;
pub mod settings;

pub use definition::{ActionDefinition, ActionMap, FlowDefinition, TriggerDefinition};
pub use error::{ConfigurationError, DefinitionError, FlowError};
pub use graph::{build_graph, FlowGraph};
pub use report::{ActionError, ActionState, ActionStatus, FlowReport, FlowStatus};
pub use runner::FlowRunner;
pub use settings::{FailedDependencyPolicy, FlowSettings};

#[cfg(test)]
mod runner_tests;
