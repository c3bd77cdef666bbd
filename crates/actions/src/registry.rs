//! Maps action type tags to executor factories.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{ActionContext, ActionExecutor};

/// Produces a fresh executor for one dispatch of one action.
pub type ExecutorFactory = Arc<dyn Fn(ActionContext) -> Box<dyn ActionExecutor> + Send + Sync>;

/// Registry of action type tags.
///
/// External code extends the system purely by registering new tags against
/// the [`ActionExecutor`] contract — there is no other extension point. The
/// engine consults [`contains`](Self::contains) up front in strict mode and
/// [`instantiate`](Self::instantiate) at dispatch time.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    factories: HashMap<String, ExecutorFactory>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a type tag, replacing any previous entry.
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn(ActionContext) -> Box<dyn ActionExecutor> + Send + Sync + 'static,
    {
        self.factories.insert(type_tag.into(), Arc::new(factory));
    }

    /// Whether a type tag has a registered factory.
    pub fn contains(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    /// Registered type tags, for diagnostics.
    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build an executor for the tag, or `None` if it is unregistered.
    pub fn instantiate(&self, type_tag: &str, ctx: ActionContext) -> Option<Box<dyn ActionExecutor>> {
        self.factories.get(type_tag).map(|factory| factory(ctx))
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("type_tags", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
