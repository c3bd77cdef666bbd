//! The expression engine: template evaluation against an explicit context.
//!
//! The engine itself is a stateless value — all data comes in through the
//! [`EvaluationContext`] argument, so concurrent evaluation against distinct
//! contexts needs no synchronization.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Expression, ParsedTemplate, TemplateSpan};
use crate::error::{EvaluationError, LookupError};
use crate::parser;
use crate::ValueContainer;

// ---------------------------------------------------------------------------
// EvaluationContext
// ---------------------------------------------------------------------------

/// The data surface an expression can reference: the trigger value, outputs
/// published by completed actions, and flow variables.
///
/// The runner builds one per run, publishes outputs as actions complete, and
/// hands the context by shared reference into every evaluation — evaluation
/// itself never mutates it, and there is no ambient fallback lookup.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    trigger: ValueContainer,
    outputs: BTreeMap<String, ValueContainer>,
    known_actions: BTreeSet<String>,
    variables: BTreeMap<String, ValueContainer>,
}

impl EvaluationContext {
    pub fn new(trigger: ValueContainer) -> Self {
        Self {
            trigger,
            outputs: BTreeMap::new(),
            known_actions: BTreeSet::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Register an action name so `outputs(name)` can distinguish "defined
    /// but silent" (Null) from "no such action" (error).
    pub fn declare_action(&mut self, name: impl Into<String>) {
        self.known_actions.insert(name.into());
    }

    /// Publish a completed action's output for downstream consumers.
    pub fn publish_output(&mut self, name: impl Into<String>, output: ValueContainer) {
        let name = name.into();
        self.known_actions.insert(name.clone());
        self.outputs.insert(name, output);
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: ValueContainer) {
        self.variables.insert(name.into(), value);
    }

    pub fn trigger(&self) -> &ValueContainer {
        &self.trigger
    }

    /// The published output of `name`, if any.
    pub fn output(&self, name: &str) -> Option<&ValueContainer> {
        self.outputs.get(name)
    }

    pub(crate) fn action_output(&self, name: &str) -> Result<ValueContainer, EvaluationError> {
        if let Some(output) = self.outputs.get(name) {
            return Ok(output.clone());
        }
        if self.known_actions.contains(name) {
            // Defined action that published nothing (skipped or failed
            // predecessor): downstream degrades to Null rather than erroring.
            return Ok(ValueContainer::Null);
        }
        Err(EvaluationError::UnknownActionOutput(name.to_owned()))
    }

    pub(crate) fn variable(&self, name: &str) -> Result<ValueContainer, EvaluationError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownVariable(name.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// ExpressionEngine
// ---------------------------------------------------------------------------

/// Parses and evaluates template strings. Stateless; freely shareable.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpressionEngine;

/// Outcome of an accessor chain: a value, or a short-circuit begun by an
/// optional accessor that missed. The short-circuit swallows the remainder
/// of the chain and surfaces as Null.
enum Chained {
    Value(ValueContainer),
    Shorted,
}

impl ExpressionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one template string: whole-string expressions keep their
    /// value's type, interpolated templates concatenate to text, plain text
    /// passes through.
    pub fn evaluate(
        &self,
        source: &str,
        ctx: &EvaluationContext,
    ) -> Result<ValueContainer, EvaluationError> {
        match parser::parse_template(source)? {
            ParsedTemplate::Literal(text) => Ok(ValueContainer::Text(text)),
            ParsedTemplate::Expression(expr) => self.eval(&expr, ctx),
            ParsedTemplate::Interpolated(spans) => {
                let mut out = String::new();
                for span in &spans {
                    match span {
                        TemplateSpan::Text(text) => out.push_str(text),
                        TemplateSpan::Embedded(expr) => {
                            out.push_str(&self.eval(expr, ctx)?.as_text())
                        }
                    }
                }
                Ok(ValueContainer::Text(out))
            }
        }
    }

    /// Evaluate a guard expression; the result must be a boolean.
    pub fn evaluate_condition(
        &self,
        source: &str,
        ctx: &EvaluationContext,
    ) -> Result<bool, EvaluationError> {
        match self.evaluate(source, ctx)? {
            ValueContainer::Boolean(b) => Ok(b),
            other => Err(EvaluationError::NonBooleanCondition {
                found: other.kind(),
            }),
        }
    }

    /// Resolve an input template: deep-walk the container and evaluate every
    /// expression-bearing text leaf against the context.
    pub fn resolve(
        &self,
        template: &ValueContainer,
        ctx: &EvaluationContext,
    ) -> Result<ValueContainer, EvaluationError> {
        match template {
            ValueContainer::Text(text) => self.evaluate(text, ctx),
            ValueContainer::Sequence(items) => items
                .iter()
                .map(|item| self.resolve(item, ctx))
                .collect::<Result<Vec<_>, _>>()
                .map(ValueContainer::Sequence),
            ValueContainer::Mapping(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve(v, ctx)?)))
                .collect::<Result<BTreeMap<_, _>, EvaluationError>>()
                .map(ValueContainer::Mapping),
            other => Ok(other.clone()),
        }
    }

    // -- tree walk ----------------------------------------------------------

    fn eval(
        &self,
        expr: &Expression,
        ctx: &EvaluationContext,
    ) -> Result<ValueContainer, EvaluationError> {
        match self.eval_chain(expr, ctx)? {
            Chained::Value(value) => Ok(value),
            Chained::Shorted => Ok(ValueContainer::Null),
        }
    }

    fn eval_chain(
        &self,
        expr: &Expression,
        ctx: &EvaluationContext,
    ) -> Result<Chained, EvaluationError> {
        match expr {
            Expression::Literal(value) => Ok(Chained::Value(value.clone())),
            Expression::Call { function, args } => {
                let evaluated = args
                    .iter()
                    .map(|arg| self.eval(arg, ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                crate::functions::invoke(function, &evaluated, ctx).map(Chained::Value)
            }
            Expression::Access {
                base,
                index,
                optional,
            } => {
                let base = match self.eval_chain(base, ctx)? {
                    Chained::Shorted => return Ok(Chained::Shorted),
                    Chained::Value(value) => value,
                };
                let index = self.eval(index, ctx)?;
                if *optional {
                    match step(&base, &index) {
                        Ok(value) => Ok(Chained::Value(value)),
                        Err(_) => Ok(Chained::Shorted),
                    }
                } else {
                    step(&base, &index)
                        .map(Chained::Value)
                        .map_err(EvaluationError::Lookup)
                }
            }
        }
    }
}

/// Apply one accessor step with required semantics.
fn step(base: &ValueContainer, index: &ValueContainer) -> Result<ValueContainer, LookupError> {
    match (base, index) {
        (ValueContainer::Mapping(entries), ValueContainer::Text(key)) => entries
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| LookupError::MissingKey { key: key.clone() }),
        (ValueContainer::Sequence(items), ValueContainer::Number(n)) => {
            if n.fract() != 0.0 || *n < 0.0 {
                return Err(LookupError::InvalidPath(format!("[{n}]")));
            }
            let index = *n as usize;
            items
                .get(index)
                .cloned()
                .ok_or(LookupError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                })
        }
        (other, index) => Err(LookupError::NotIndexable {
            segment: index.as_text(),
            found: other.kind(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> EvaluationContext {
        let trigger = ValueContainer::from_json_str(
            r#"{"body": {"contactid": "c-1", "fullname": "John Doe", "lastname": "Doe"}}"#,
        )
        .unwrap();
        let mut ctx = EvaluationContext::new(trigger);
        ctx.declare_action("create_note");
        ctx.declare_action("send_email");
        ctx.publish_output(
            "create_note",
            ValueContainer::from_json_str(r#"{"body": {"subject": "Hello"}}"#).unwrap(),
        );
        ctx.set_variable("greeting", "Welcome".into());
        ctx
    }

    fn eval(source: &str) -> Result<ValueContainer, EvaluationError> {
        ExpressionEngine::new().evaluate(source, &context())
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(eval("Greet our new Contact").unwrap(), "Greet our new Contact".into());
    }

    #[test]
    fn interpolation_concatenates_as_text() {
        assert_eq!(
            eval("With the name of @{triggerBody()?['fullname']}").unwrap(),
            "With the name of John Doe".into()
        );
    }

    #[test]
    fn whole_string_expression_keeps_type() {
        assert_eq!(
            eval("@equals(triggerBody()['lastname'], 'Doe')").unwrap(),
            ValueContainer::Boolean(true)
        );
    }

    #[test]
    fn optional_accessor_short_circuits_the_chain() {
        // 'nickname' is absent: the optional step swallows the rest of the
        // chain instead of failing the required step after it.
        assert!(eval("@triggerBody()?['nickname']['upper']").unwrap().is_null());
    }

    #[test]
    fn required_accessor_misses_loudly() {
        assert!(matches!(
            eval("@triggerBody()['nickname']"),
            Err(EvaluationError::Lookup(LookupError::MissingKey { .. }))
        ));
    }

    #[test]
    fn outputs_of_completed_action() {
        assert_eq!(
            eval("@outputs('create_note')['body']['subject']").unwrap(),
            "Hello".into()
        );
    }

    #[test]
    fn outputs_of_silent_action_is_null() {
        assert!(eval("@outputs('send_email')").unwrap().is_null());
    }

    #[test]
    fn outputs_of_undefined_action_is_an_error() {
        assert!(matches!(
            eval("@outputs('no_such_action')"),
            Err(EvaluationError::UnknownActionOutput(_))
        ));
    }

    #[test]
    fn variables_resolve_and_unknowns_fail() {
        assert_eq!(eval("@variables('greeting')").unwrap(), "Welcome".into());
        assert!(matches!(
            eval("@variables('missing')"),
            Err(EvaluationError::UnknownVariable(_))
        ));
    }

    #[test]
    fn unknown_function_fails() {
        assert!(matches!(
            eval("@fooBar()"),
            Err(EvaluationError::UnknownFunction(_))
        ));
    }

    #[test]
    fn coalesce_picks_first_non_null() {
        assert_eq!(
            eval("@coalesce(triggerBody()?['nickname'], 'fallback')").unwrap(),
            "fallback".into()
        );
    }

    #[test]
    fn condition_requires_boolean() {
        let engine = ExpressionEngine::new();
        let ctx = context();
        assert!(engine
            .evaluate_condition("@equals(1, 1)", &ctx)
            .unwrap());
        assert!(matches!(
            engine.evaluate_condition("@concat('a')", &ctx),
            Err(EvaluationError::NonBooleanCondition { .. })
        ));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let source = "@concat(triggerBody()['fullname'], ' / ', variables('greeting'))";
        assert_eq!(eval(source).unwrap(), eval(source).unwrap());
    }

    #[test]
    fn resolve_walks_nested_templates() {
        let template = ValueContainer::from_json_str(
            r#"{
                "parameters": {
                    "item": {
                        "subject": "Greet our new Contact",
                        "notetext": "With the name of @{triggerBody()?['fullname']}"
                    }
                }
            }"#,
        )
        .unwrap();
        let resolved = ExpressionEngine::new().resolve(&template, &context()).unwrap();
        assert_eq!(
            resolved["parameters"]["item"]["notetext"],
            "With the name of John Doe".into()
        );
        assert_eq!(
            resolved["parameters"]["item"]["subject"],
            "Greet our new Contact".into()
        );
    }

    #[test]
    fn guid_mints_an_opaque_scalar() {
        let value = eval("@guid()").unwrap();
        assert_eq!(value.kind(), "guid");
    }
}
