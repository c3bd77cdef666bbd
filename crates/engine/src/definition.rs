//! Flow document model.
//!
//! A flow document is a JSON object with a trigger descriptor and an
//! `actions` mapping; every action carries a type tag, an input template
//! (expressions embedded anywhere inside), a `runAfter` predecessor list,
//! and optional guard `conditions`. Parsing preserves the declaration order
//! of actions — the graph builder uses it to break scheduling ties — and
//! rejects duplicate names.

use std::collections::{BTreeMap, HashMap};

use expressions::ValueContainer;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::error::DefinitionError;

// ---------------------------------------------------------------------------
// TriggerDefinition
// ---------------------------------------------------------------------------

/// The trigger descriptor. The engine does not interpret the type tag — the
/// host decides when to call `trigger` — but the descriptor rides along for
/// hosts that route on it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default)]
    pub inputs: ValueContainer,
}

// ---------------------------------------------------------------------------
// ActionDefinition
// ---------------------------------------------------------------------------

/// One step in the flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    /// Maps to a factory registered in the `ActionRegistry`.
    #[serde(rename = "type")]
    pub action_type: String,

    /// Raw input template; expression-bearing text may appear at any depth.
    #[serde(default)]
    pub inputs: ValueContainer,

    /// Names of actions that must reach a terminal state first.
    #[serde(default)]
    pub run_after: Vec<String>,

    /// Guard expressions, ANDed; empty means "always run".
    #[serde(default)]
    pub conditions: Vec<String>,

    /// Per-action override of the configured execution timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// ActionMap — declaration-ordered, duplicate-free
// ---------------------------------------------------------------------------

/// The flow's actions, iterable in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    names: Vec<String>,
    entries: HashMap<String, ActionDefinition>,
}

impl ActionMap {
    /// Build from `(name, definition)` pairs, rejecting duplicate names.
    pub fn from_entries(
        pairs: impl IntoIterator<Item = (String, ActionDefinition)>,
    ) -> Result<Self, DefinitionError> {
        let mut map = Self::default();
        for (name, definition) in pairs {
            if map.entries.contains_key(&name) {
                return Err(DefinitionError::DuplicateActionName(name));
            }
            map.names.push(name.clone());
            map.entries.insert(name, definition);
        }
        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&ActionDefinition> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Action names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// `(name, definition)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionDefinition)> {
        self.names
            .iter()
            .map(|name| (name.as_str(), &self.entries[name]))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// serde_json's map type is sorted, which would discard declaration order, so
// the visitor consumes entries straight off the deserializer instead.
impl<'de> Deserialize<'de> for ActionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ActionMapVisitor;

        impl<'de> Visitor<'de> for ActionMapVisitor {
            type Value = ActionMap;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a mapping of action name to action definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ActionMap, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(entry) = access.next_entry::<String, ActionDefinition>()? {
                    pairs.push(entry);
                }
                ActionMap::from_entries(pairs).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(ActionMapVisitor)
    }
}

// ---------------------------------------------------------------------------
// FlowDefinition
// ---------------------------------------------------------------------------

/// A parsed flow document. Immutable after construction; the runner shares
/// it read-only across concurrent runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    #[serde(default)]
    pub name: Option<String>,

    pub trigger: TriggerDefinition,

    pub actions: ActionMap,

    /// Flow-level variables, readable through `variables('name')`.
    #[serde(default)]
    pub variables: BTreeMap<String, ValueContainer>,
}

impl FlowDefinition {
    /// Parse a JSON flow document.
    pub fn parse(source: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(source).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    /// Convert an already-parsed JSON value.
    pub fn from_value(document: serde_json::Value) -> Result<Self, DefinitionError> {
        serde_json::from_value(document).map_err(|e| DefinitionError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "name": "greeting",
        "trigger": {"type": "request"},
        "variables": {"greeting": "Welcome"},
        "actions": {
            "zeta": {"type": "noop"},
            "alpha": {
                "type": "open_api_connection",
                "inputs": {"parameters": {"item": "@{variables('greeting')}"}},
                "runAfter": ["zeta"],
                "conditions": ["@equals(1, 1)"],
                "timeoutSecs": 10
            }
        }
    }"#;

    #[test]
    fn parses_and_preserves_declaration_order() {
        let flow = FlowDefinition::parse(DOCUMENT).unwrap();
        assert_eq!(flow.name.as_deref(), Some("greeting"));
        assert_eq!(flow.trigger.trigger_type, "request");
        // "zeta" sorts after "alpha" but was declared first.
        assert_eq!(flow.actions.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);

        let alpha = flow.actions.get("alpha").unwrap();
        assert_eq!(alpha.run_after, vec!["zeta"]);
        assert_eq!(alpha.conditions.len(), 1);
        assert_eq!(alpha.timeout_secs, Some(10));
        assert_eq!(flow.variables["greeting"], ValueContainer::from("Welcome"));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let flow = FlowDefinition::parse(
            r#"{"trigger": {"type": "manual"}, "actions": {"only": {"type": "noop"}}}"#,
        )
        .unwrap();
        let only = flow.actions.get("only").unwrap();
        assert!(only.inputs.is_null());
        assert!(only.run_after.is_empty());
        assert!(only.conditions.is_empty());
        assert!(flow.variables.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected_programmatically() {
        let action = ActionDefinition {
            action_type: "noop".into(),
            inputs: ValueContainer::Null,
            run_after: vec![],
            conditions: vec![],
            timeout_secs: None,
        };
        let result = ActionMap::from_entries(vec![
            ("a".to_string(), action.clone()),
            ("a".to_string(), action),
        ]);
        assert_eq!(result.unwrap_err(), DefinitionError::DuplicateActionName("a".into()));
    }

    #[test]
    fn malformed_documents_fail_parse() {
        assert!(matches!(
            FlowDefinition::parse("{not json"),
            Err(DefinitionError::Parse(_))
        ));
        assert!(matches!(
            FlowDefinition::parse(r#"{"actions": {}}"#),
            Err(DefinitionError::Parse(_))
        ));
    }
}
