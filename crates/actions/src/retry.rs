//! Retry decorator — bounded exponential back-off layered above `execute()`.
//!
//! The scheduler itself never retries; wrapping a factory with
//! [`RetryExecutor::wrap`] opts an action type into re-attempting
//! [`ExecutionError::Retryable`] failures.

use std::time::Duration;

use async_trait::async_trait;
use expressions::ValueContainer;
use tracing::warn;

use crate::registry::ExecutorFactory;
use crate::traits::{ActionExecutor, ActionResult};
use crate::ExecutionError;

/// Tuning knobs for the retry wrapper.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of times a retryable failure will be re-attempted.
    pub max_retries: u32,
    /// Base delay for exponential back-off between attempts.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Wraps an inner executor, re-invoking it on `Retryable` errors until the
/// policy is exhausted. `Failed` errors pass through untouched.
pub struct RetryExecutor {
    inner: Box<dyn ActionExecutor>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(inner: Box<dyn ActionExecutor>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Decorate a factory so every executor it produces retries per `policy`.
    pub fn wrap(factory: ExecutorFactory, policy: RetryPolicy) -> ExecutorFactory {
        std::sync::Arc::new(move |ctx| {
            Box::new(RetryExecutor::new(factory(ctx), policy.clone())) as Box<dyn ActionExecutor>
        })
    }
}

#[async_trait]
impl ActionExecutor for RetryExecutor {
    fn inputs(&self) -> &ValueContainer {
        self.inner.inputs()
    }

    async fn execute(&mut self) -> Result<ActionResult, ExecutionError> {
        let mut attempts = 0u32;

        loop {
            match self.inner.execute().await {
                Ok(result) => return Ok(result),

                Err(ExecutionError::Failed(msg)) => return Err(ExecutionError::Failed(msg)),

                Err(ExecutionError::Retryable(msg)) => {
                    attempts += 1;
                    if attempts > self.policy.max_retries {
                        return Err(ExecutionError::Retryable(msg));
                    }

                    let delay = self.policy.base_delay * 2u32.pow(attempts.saturating_sub(1));

                    warn!(
                        attempt = attempts,
                        max = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "retryable action error, backing off: {msg}"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
