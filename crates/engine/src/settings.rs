//! Runner configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default per-action timeout (5 minutes).
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 300;

/// How the runner treats dependents of a Failed action.
///
/// This is a flow-level policy, not an implicit engine decision: the default
/// lets each dependent's own guard observe the missing output (Null) and
/// decide; the alternative hard-skips everything downstream of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedDependencyPolicy {
    /// Evaluate the dependent's guard against the context as-is.
    #[default]
    EvaluateGuards,
    /// Mark any action with a Failed predecessor as Skipped, guard unseen.
    SkipDependents,
}

/// Tuning knobs for the flow runner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowSettings {
    /// Strict mode: an unregistered action type fails the run before any
    /// action executes. Lenient mode treats such actions as inert (Skipped).
    pub fail_on_unknown_action: bool,

    /// Per-action execution timeout in seconds; `None` means unbounded.
    /// Individual actions may override this in their definition.
    pub action_timeout_secs: Option<u64>,

    /// Policy for dependents of a Failed action.
    pub failed_dependency_policy: FailedDependencyPolicy,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            fail_on_unknown_action: true,
            action_timeout_secs: Some(DEFAULT_ACTION_TIMEOUT_SECS),
            failed_dependency_policy: FailedDependencyPolicy::default(),
        }
    }
}

impl FlowSettings {
    /// A lenient configuration: unknown action types are skipped.
    pub fn lenient() -> Self {
        Self {
            fail_on_unknown_action: false,
            ..Self::default()
        }
    }

    pub(crate) fn action_timeout(&self) -> Option<Duration> {
        self.action_timeout_secs.map(Duration::from_secs)
    }
}
