//! `MockExecutor` — a scripted test double for `ActionExecutor`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use expressions::ValueContainer;

use crate::registry::ExecutorFactory;
use crate::traits::{ActionContext, ActionExecutor, ActionResult};
use crate::ExecutionError;

/// Behaviour injected into `MockExecutor` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Succeed and publish the given output.
    ReturnValue(ValueContainer),
    /// Succeed without publishing anything.
    ReturnNothing,
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a permanent error.
    Fail(String),
    /// Sleep, then succeed without output — for exercising timeouts.
    Sleep(Duration),
}

/// Shared view into the calls a mock (or a whole mocked type tag) received.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    calls: Arc<Mutex<Vec<(String, ValueContainer)>>>,
}

impl MockHandle {
    /// Number of `execute` invocations observed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// `(action name, resolved inputs)` per invocation, in call order.
    pub fn calls(&self) -> Vec<(String, ValueContainer)> {
        self.calls.lock().unwrap().clone()
    }

    /// Action names in the order their executors ran.
    pub fn executed_actions(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// A mock executor that records every call and performs its scripted
/// behaviour.
pub struct MockExecutor {
    ctx: ActionContext,
    behaviour: MockBehaviour,
    handle: MockHandle,
}

impl MockExecutor {
    /// Create a mock plus the handle observing it.
    pub fn recording(ctx: ActionContext, behaviour: MockBehaviour) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                ctx,
                behaviour,
                handle: handle.clone(),
            },
            handle,
        )
    }

    /// A factory whose executors all share one recording handle — register
    /// it under a type tag and assert on the handle after the run.
    pub fn factory(behaviour: MockBehaviour) -> (ExecutorFactory, MockHandle) {
        let handle = MockHandle::default();
        let shared = handle.clone();
        let factory: ExecutorFactory = Arc::new(move |ctx| {
            Box::new(MockExecutor {
                ctx,
                behaviour: behaviour.clone(),
                handle: shared.clone(),
            }) as Box<dyn ActionExecutor>
        });
        (factory, handle)
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    fn inputs(&self) -> &ValueContainer {
        &self.ctx.inputs
    }

    async fn execute(&mut self) -> Result<ActionResult, ExecutionError> {
        self.handle
            .calls
            .lock()
            .unwrap()
            .push((self.ctx.action_name.clone(), self.ctx.inputs.clone()));

        match &self.behaviour {
            MockBehaviour::ReturnValue(value) => Ok(ActionResult::with_output(value.clone())),
            MockBehaviour::ReturnNothing => Ok(ActionResult::default()),
            MockBehaviour::FailRetryable(msg) => Err(ExecutionError::Retryable(msg.clone())),
            MockBehaviour::Fail(msg) => Err(ExecutionError::Failed(msg.clone())),
            MockBehaviour::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ActionResult::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expressions::ExpressionEngine;

    fn ctx(name: &str) -> ActionContext {
        ActionContext {
            action_name: name.into(),
            inputs: ValueContainer::from_json_str(r#"{"parameters": {"k": "v"}}"#).unwrap(),
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    #[tokio::test]
    async fn mock_records_calls_and_returns_value() {
        let (mut mock, handle) = MockExecutor::recording(
            ctx("step"),
            MockBehaviour::ReturnValue(ValueContainer::from("done")),
        );

        let result = mock.execute().await.unwrap();
        assert_eq!(result.output, Some(ValueContainer::from("done")));
        assert_eq!(handle.call_count(), 1);
        assert_eq!(handle.executed_actions(), vec!["step"]);
        assert_eq!(
            handle.calls()[0].1["parameters"]["k"],
            ValueContainer::from("v")
        );
    }

    #[tokio::test]
    async fn shared_factory_handle_sees_every_executor() {
        let (factory, handle) = MockExecutor::factory(MockBehaviour::ReturnNothing);

        for name in ["a", "b"] {
            let mut executor = factory(ctx(name));
            executor.execute().await.unwrap();
        }
        assert_eq!(handle.executed_actions(), vec!["a", "b"]);
    }
}
