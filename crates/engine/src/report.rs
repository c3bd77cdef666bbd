//! Per-run execution records: action states and the flow report.

use std::collections::HashMap;
use std::time::Duration;

use actions::ExecutionError;
use expressions::{EvaluationError, ValueContainer};
use serde::{Serialize, Serializer};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ActionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one action within one run.
///
/// `Pending` exists only while the run is in flight; the final report carries
/// terminal states exclusively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Skipped,
    Succeeded,
    Failed,
}

impl ActionStatus {
    /// Whether this action will not change state again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionStatus::Pending)
    }

    /// Whether an executor actually ran for this action.
    pub fn is_executed(self) -> bool {
        matches!(self, ActionStatus::Succeeded | ActionStatus::Failed)
    }
}

// ---------------------------------------------------------------------------
// ActionError
// ---------------------------------------------------------------------------

/// What a Failed action state records. Serializes as its display text.
#[derive(Debug, Error, Clone)]
pub enum ActionError {
    /// A guard or input template failed to evaluate.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// The executor's own logic failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The executor exceeded its per-action timeout.
    #[error("action timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The executor task panicked; isolated to this action.
    #[error("executor panicked: {0}")]
    Panicked(String),
}

impl Serialize for ActionError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ---------------------------------------------------------------------------
// ActionState
// ---------------------------------------------------------------------------

/// The complete record of one action in one run.
#[derive(Debug, Clone, Serialize)]
pub struct ActionState {
    pub status: ActionStatus,
    /// The fully resolved input, present once the guard passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<ValueContainer>,
    /// The published output, present for Succeeded actions that produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_output: Option<ValueContainer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionError>,
}

impl ActionState {
    pub(crate) fn pending() -> Self {
        Self {
            status: ActionStatus::Pending,
            action_input: None,
            action_output: None,
            error: None,
        }
    }

    pub(crate) fn skip(&mut self) {
        self.status = ActionStatus::Skipped;
    }

    pub(crate) fn succeed(&mut self, output: Option<ValueContainer>) {
        self.status = ActionStatus::Succeeded;
        self.action_output = output;
    }

    pub(crate) fn fail(&mut self, error: ActionError) {
        self.status = ActionStatus::Failed;
        self.error = Some(error);
    }
}

// ---------------------------------------------------------------------------
// FlowReport
// ---------------------------------------------------------------------------

/// Overall outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// Every executed action succeeded.
    Succeeded,
    /// At least one action failed; the rest still ran to a terminal state.
    Failed,
    /// The caller cancelled the run; never-dispatched actions are Skipped.
    Cancelled,
}

/// The complete record of one `trigger` call: the trigger input plus exactly
/// one terminal [`ActionState`] per defined action.
#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub trigger: ValueContainer,
    pub action_states: HashMap<String, ActionState>,
    pub status: FlowStatus,
}

impl FlowReport {
    /// The state recorded for `name`, if such an action is defined.
    pub fn action_state(&self, name: &str) -> Option<&ActionState> {
        self.action_states.get(name)
    }

    /// Names of the actions whose executor actually ran — the
    /// positive-membership view of the run (Skipped actions are absent).
    pub fn executed_action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .action_states
            .iter()
            .filter(|(_, state)| state.status.is_executed())
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}
