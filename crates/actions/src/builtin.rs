//! Built-in executors: the no-op default and the connector-backed
//! OpenAPI-style action.

use std::sync::Arc;

use async_trait::async_trait;
use expressions::ValueContainer;
use tracing::debug;

use crate::registry::ExecutorFactory;
use crate::traits::{ActionContext, ActionExecutor, ActionResult};
use crate::ExecutionError;

// ---------------------------------------------------------------------------
// NoopExecutor
// ---------------------------------------------------------------------------

/// Succeeds without side effects and publishes no output.
///
/// The default stand-in for action types a host acknowledges but does not
/// implement; also handy in tests and the CLI runner.
pub struct NoopExecutor {
    ctx: ActionContext,
}

impl NoopExecutor {
    pub fn new(ctx: ActionContext) -> Self {
        Self { ctx }
    }

    /// A factory registering this executor under some tag.
    pub fn factory() -> ExecutorFactory {
        Arc::new(|ctx| Box::new(NoopExecutor::new(ctx)) as Box<dyn ActionExecutor>)
    }
}

#[async_trait]
impl ActionExecutor for NoopExecutor {
    fn inputs(&self) -> &ValueContainer {
        &self.ctx.inputs
    }

    async fn execute(&mut self) -> Result<ActionResult, ExecutionError> {
        debug!(action = %self.ctx.action_name, "noop executor");
        Ok(ActionResult::default())
    }
}

// ---------------------------------------------------------------------------
// Connector seam
// ---------------------------------------------------------------------------

/// The request an OpenAPI-style action hands to its transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorRequest {
    /// Name of the dispatching action.
    pub action_name: String,
    /// `inputs.host.apiId`, when the flow declares one.
    pub api_id: Option<String>,
    /// `inputs.host.connectionName`, when the flow declares one.
    pub connection_name: Option<String>,
    /// `inputs.host.operationId`, when the flow declares one.
    pub operation_id: Option<String>,
    /// The action's resolved `parameters` block.
    pub parameters: ValueContainer,
}

/// The transport behind [`OpenApiConnectionExecutor`]. Concrete network
/// implementations live outside this workspace; hosts inject one per
/// connector-backed action type.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the described operation and return its response body.
    async fn invoke(&self, request: ConnectorRequest) -> Result<ValueContainer, ExecutionError>;
}

// ---------------------------------------------------------------------------
// OpenApiConnectionExecutor
// ---------------------------------------------------------------------------

/// Models invoking an externally described operation: builds a
/// [`ConnectorRequest`] from the resolved inputs, delegates to the injected
/// [`Connector`], and publishes the response as the action output.
pub struct OpenApiConnectionExecutor {
    ctx: ActionContext,
    connector: Arc<dyn Connector>,
}

impl OpenApiConnectionExecutor {
    pub fn new(ctx: ActionContext, connector: Arc<dyn Connector>) -> Self {
        Self { ctx, connector }
    }

    /// A factory binding every produced executor to the given transport.
    pub fn factory(connector: Arc<dyn Connector>) -> ExecutorFactory {
        Arc::new(move |ctx| {
            Box::new(OpenApiConnectionExecutor::new(ctx, connector.clone()))
                as Box<dyn ActionExecutor>
        })
    }

    fn request(&self) -> ConnectorRequest {
        let host = self.ctx.inputs.get_opt("host");
        let text_at = |key: &str| host.get_opt(key).as_str().map(str::to_owned);
        ConnectorRequest {
            action_name: self.ctx.action_name.clone(),
            api_id: text_at("apiId"),
            connection_name: text_at("connectionName"),
            operation_id: text_at("operationId"),
            parameters: self.parameters().clone(),
        }
    }
}

#[async_trait]
impl ActionExecutor for OpenApiConnectionExecutor {
    fn inputs(&self) -> &ValueContainer {
        &self.ctx.inputs
    }

    async fn execute(&mut self) -> Result<ActionResult, ExecutionError> {
        let request = self.request();
        debug!(
            action = %request.action_name,
            operation = request.operation_id.as_deref().unwrap_or("<unset>"),
            "invoking connector"
        );
        let response = self.connector.invoke(request).await?;
        Ok(ActionResult::with_output(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expressions::ExpressionEngine;

    fn ctx(inputs: &str) -> ActionContext {
        ActionContext {
            action_name: "create_note".into(),
            inputs: ValueContainer::from_json_str(inputs).unwrap(),
            engine: Arc::new(ExpressionEngine::new()),
        }
    }

    struct EchoConnector;

    #[async_trait]
    impl Connector for EchoConnector {
        async fn invoke(
            &self,
            request: ConnectorRequest,
        ) -> Result<ValueContainer, ExecutionError> {
            Ok(request.parameters)
        }
    }

    #[tokio::test]
    async fn noop_publishes_nothing() {
        let mut executor = NoopExecutor::new(ctx(r#"{"parameters": {"x": 1}}"#));
        let result = executor.execute().await.unwrap();
        assert_eq!(result.output, None);
    }

    #[test]
    fn parameters_alias_reads_inputs_parameters() {
        let executor = NoopExecutor::new(ctx(r#"{"parameters": {"x": 1}}"#));
        assert_eq!(executor.parameters()["x"], ValueContainer::Number(1.0));

        let bare = NoopExecutor::new(ctx(r#"{"other": true}"#));
        assert!(bare.parameters().is_null());
    }

    #[tokio::test]
    async fn connector_request_is_built_from_inputs() {
        let inputs = r#"{
            "host": {"apiId": "notes", "operationId": "CreateRecord"},
            "parameters": {"item": {"subject": "Hi"}}
        }"#;
        let mut executor = OpenApiConnectionExecutor::new(ctx(inputs), Arc::new(EchoConnector));
        let request = executor.request();
        assert_eq!(request.operation_id.as_deref(), Some("CreateRecord"));
        assert_eq!(request.api_id.as_deref(), Some("notes"));
        assert_eq!(request.connection_name, None);

        let result = executor.execute().await.unwrap();
        assert_eq!(
            result.output.unwrap()["item"]["subject"],
            ValueContainer::Text("Hi".into())
        );
    }
}
