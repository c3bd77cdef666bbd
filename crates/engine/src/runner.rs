//! The flow runner — drives one execution per `trigger` call.
//!
//! `FlowRunner` compiles a flow document once at initialization, then runs it
//! any number of times, concurrently if the host wants: the compiled flow is
//! shared read-only and every run owns its own context and states.
//!
//! Scheduling is publish-on-completion, block-on-dependency: every action
//! whose predecessors are all terminal is dispatched onto a worker task;
//! guard checks and input resolution are synchronous and run inline on the
//! scheduling path; executor calls may block and are bounded by the
//! per-action timeout. A completion publishes its output into the evaluation
//! context and unblocks dependents. The only synchronization points are the
//! per-action completion signals of the `JoinSet`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use actions::{ActionContext, ActionExecutor, ActionRegistry, ActionResult};
use expressions::{EvaluationContext, ExpressionEngine, ValueContainer};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::definition::{ActionDefinition, FlowDefinition};
use crate::error::{ConfigurationError, DefinitionError, FlowError};
use crate::graph::{build_graph, FlowGraph};
use crate::report::{ActionError, ActionState, ActionStatus, FlowReport, FlowStatus};
use crate::settings::{FailedDependencyPolicy, FlowSettings};

// ---------------------------------------------------------------------------
// CompiledFlow
// ---------------------------------------------------------------------------

/// A validated definition plus its cached topological order. Built once,
/// then read-only.
#[derive(Debug)]
struct CompiledFlow {
    definition: FlowDefinition,
    graph: FlowGraph,
}

// ---------------------------------------------------------------------------
// FlowRunner
// ---------------------------------------------------------------------------

/// Orchestrates flow executions against a registry of action executors.
pub struct FlowRunner {
    registry: Arc<ActionRegistry>,
    settings: FlowSettings,
    engine: Arc<ExpressionEngine>,
    flow: Option<Arc<CompiledFlow>>,
}

/// What the dispatch pass decided for one eligible action.
enum Dispatch {
    Skip,
    Fail(ActionError),
    Launch(ValueContainer),
}

impl FlowRunner {
    pub fn new(registry: ActionRegistry, settings: FlowSettings) -> Self {
        Self {
            registry: Arc::new(registry),
            settings,
            engine: Arc::new(ExpressionEngine::new()),
            flow: None,
        }
    }

    /// The expression engine shared with executors.
    pub fn engine(&self) -> Arc<ExpressionEngine> {
        self.engine.clone()
    }

    /// Parse and validate a JSON flow document. Any structural problem —
    /// malformed shape, duplicate name, dangling reference, cycle — fails
    /// here, so a flow that initialized can never produce a partially
    /// validated run.
    pub fn initialize(&mut self, document: &str) -> Result<(), DefinitionError> {
        self.initialize_definition(FlowDefinition::parse(document)?)
    }

    /// Like [`initialize`](Self::initialize) for an already-parsed value.
    pub fn initialize_value(&mut self, document: serde_json::Value) -> Result<(), DefinitionError> {
        self.initialize_definition(FlowDefinition::from_value(document)?)
    }

    /// Install a definition built programmatically.
    pub fn initialize_definition(
        &mut self,
        definition: FlowDefinition,
    ) -> Result<(), DefinitionError> {
        let graph = build_graph(&definition)?;
        info!(
            flow = definition.name.as_deref().unwrap_or("<unnamed>"),
            actions = definition.actions.len(),
            "flow initialized"
        );
        self.flow = Some(Arc::new(CompiledFlow { definition, graph }));
        Ok(())
    }

    /// Run the flow once. Awaits the complete report; a run that starts
    /// always returns one, partial failures included.
    pub async fn trigger(&self, trigger: ValueContainer) -> Result<FlowReport, FlowError> {
        self.trigger_with_cancellation(trigger, CancellationToken::new())
            .await
    }

    /// Run the flow once under a cancellation token. Cancelling stops the
    /// dispatch of new actions; in-flight actions finish or time out, and
    /// the report comes back with status `Cancelled` and every never-ran
    /// action Skipped.
    #[instrument(skip_all)]
    pub async fn trigger_with_cancellation(
        &self,
        trigger: ValueContainer,
        cancel: CancellationToken,
    ) -> Result<FlowReport, FlowError> {
        let flow = self.flow.as_ref().ok_or(FlowError::NotInitialized)?.clone();

        // Strict mode fails before anything is dispatched.
        if self.settings.fail_on_unknown_action {
            for (name, action) in flow.definition.actions.iter() {
                if !self.registry.contains(&action.action_type) {
                    return Err(ConfigurationError::UnknownActionType {
                        action: name.to_owned(),
                        action_type: action.action_type.clone(),
                    }
                    .into());
                }
            }
        }

        // Per-run state: the evaluation context and one Pending state per
        // defined action. Nothing here outlives or is shared beyond the run.
        let mut ctx = EvaluationContext::new(trigger.clone());
        let mut states: HashMap<String, ActionState> = HashMap::new();
        for (name, _) in flow.definition.actions.iter() {
            ctx.declare_action(name);
            states.insert(name.to_owned(), ActionState::pending());
        }
        for (name, value) in &flow.definition.variables {
            ctx.set_variable(name.clone(), value.clone());
        }

        let mut dispatched: HashSet<String> = HashSet::new();
        let mut join_set: JoinSet<Result<ActionResult, ActionError>> = JoinSet::new();
        let mut task_names: HashMap<tokio::task::Id, String> = HashMap::new();

        loop {
            // Dispatch to fixpoint: marking an action Skipped or Failed here
            // is itself a terminal transition that can unblock dependents.
            let mut progressed = true;
            while progressed {
                progressed = false;
                for name in flow.graph.order() {
                    if dispatched.contains(name) {
                        continue;
                    }
                    let Some(action) = flow.definition.actions.get(name) else {
                        continue;
                    };
                    let ready = action.run_after.iter().all(|pred| {
                        states
                            .get(pred)
                            .map(|s| s.status.is_terminal())
                            .unwrap_or(false)
                    });
                    if !ready {
                        continue;
                    }

                    dispatched.insert(name.clone());
                    progressed = true;

                    match self.plan(name, action, &states, &ctx, &cancel) {
                        Dispatch::Skip => {
                            if let Some(state) = states.get_mut(name) {
                                state.skip();
                            }
                            debug!(action = %name, "skipped");
                        }
                        Dispatch::Fail(err) => {
                            error!(action = %name, error = %err, "failed before dispatch");
                            if let Some(state) = states.get_mut(name) {
                                state.fail(err);
                            }
                        }
                        Dispatch::Launch(inputs) => {
                            if let Some(state) = states.get_mut(name) {
                                state.action_input = Some(inputs.clone());
                            }
                            let executor = self.registry.instantiate(
                                &action.action_type,
                                ActionContext {
                                    action_name: name.clone(),
                                    inputs,
                                    engine: self.engine.clone(),
                                },
                            );
                            match executor {
                                Some(executor) => {
                                    let timeout = action
                                        .timeout_secs
                                        .map(Duration::from_secs)
                                        .or_else(|| self.settings.action_timeout());
                                    let handle =
                                        join_set.spawn(run_executor(executor, timeout));
                                    task_names.insert(handle.id(), name.clone());
                                    info!(action = %name, action_type = %action.action_type, "dispatched");
                                }
                                None => {
                                    // contains() held above; a registry
                                    // mutated between the checks is not
                                    // possible, but degrade to Skipped
                                    // rather than crash the scheduler.
                                    if let Some(state) = states.get_mut(name) {
                                        state.skip();
                                    }
                                }
                            }
                        }
                    }
                }
            }

            // Await one completion; it will unblock the next dispatch round.
            match join_set.join_next_with_id().await {
                None => break,
                Some(Ok((id, result))) => {
                    let Some(name) = task_names.remove(&id) else {
                        continue;
                    };
                    match result {
                        Ok(ActionResult { output }) => {
                            info!(action = %name, "succeeded");
                            if let Some(output) = &output {
                                ctx.publish_output(name.as_str(), output.clone());
                            }
                            if let Some(state) = states.get_mut(&name) {
                                state.succeed(output);
                            }
                        }
                        Err(err) => {
                            // Local to this action; independent branches
                            // keep going.
                            error!(action = %name, error = %err, "failed");
                            if let Some(state) = states.get_mut(&name) {
                                state.fail(err);
                            }
                        }
                    }
                }
                Some(Err(join_err)) => {
                    if let Some(name) = task_names.remove(&join_err.id()) {
                        error!(action = %name, "executor task aborted: {join_err}");
                        if let Some(state) = states.get_mut(&name) {
                            state.fail(ActionError::Panicked(join_err.to_string()));
                        }
                    }
                }
            }
        }

        // Pending never appears in a report.
        for state in states.values_mut() {
            if state.status == ActionStatus::Pending {
                state.skip();
            }
        }

        let status = if cancel.is_cancelled() {
            FlowStatus::Cancelled
        } else if states
            .values()
            .any(|state| state.status == ActionStatus::Failed)
        {
            FlowStatus::Failed
        } else {
            FlowStatus::Succeeded
        };

        info!(?status, "flow run complete");

        Ok(FlowReport {
            trigger,
            action_states: states,
            status,
        })
    }

    /// Decide what to do with an eligible action: skip it, fail it before
    /// dispatch, or launch it with resolved inputs.
    fn plan(
        &self,
        name: &str,
        action: &ActionDefinition,
        states: &HashMap<String, ActionState>,
        ctx: &EvaluationContext,
        cancel: &CancellationToken,
    ) -> Dispatch {
        if cancel.is_cancelled() {
            return Dispatch::Skip;
        }

        // Lenient mode treats unknown types as inert (strict mode already
        // failed the whole run before dispatch).
        if !self.registry.contains(&action.action_type) {
            warn!(
                action = %name,
                action_type = %action.action_type,
                "no executor registered, treating action as inert"
            );
            return Dispatch::Skip;
        }

        if self.settings.failed_dependency_policy == FailedDependencyPolicy::SkipDependents {
            let failed_pred = action.run_after.iter().any(|pred| {
                states
                    .get(pred)
                    .map(|s| s.status == ActionStatus::Failed)
                    .unwrap_or(false)
            });
            if failed_pred {
                return Dispatch::Skip;
            }
        }

        // Guard: all conditions must hold. Evaluation errors fail the
        // action, a false condition skips it.
        for condition in &action.conditions {
            match self.engine.evaluate_condition(condition, ctx) {
                Ok(true) => {}
                Ok(false) => return Dispatch::Skip,
                Err(err) => return Dispatch::Fail(err.into()),
            }
        }

        match self.engine.resolve(&action.inputs, ctx) {
            Ok(inputs) => Dispatch::Launch(inputs),
            Err(err) => Dispatch::Fail(err.into()),
        }
    }
}

/// Run one executor, bounding it by the per-action timeout. A timeout is an
/// ordinary Failed state for the owning action.
async fn run_executor(
    mut executor: Box<dyn ActionExecutor>,
    timeout: Option<Duration>,
) -> Result<ActionResult, ActionError> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, executor.execute()).await {
            Ok(result) => result.map_err(ActionError::from),
            Err(_) => Err(ActionError::Timeout(limit)),
        },
        None => executor.execute().await.map_err(ActionError::from),
    }
}
