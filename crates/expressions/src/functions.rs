//! Built-in expression functions.
//!
//! Arguments arrive fully evaluated; every function is pure except `guid()`
//! and `utcNow()`, which mint fresh opaque scalars. Unknown names fail with
//! [`EvaluationError::UnknownFunction`].

use chrono::Utc;
use uuid::Uuid;

use crate::engine::EvaluationContext;
use crate::error::EvaluationError;
use crate::ValueContainer;

pub(crate) fn invoke(
    name: &str,
    args: &[ValueContainer],
    ctx: &EvaluationContext,
) -> Result<ValueContainer, EvaluationError> {
    match name {
        "trigger" | "triggerOutputs" => {
            expect_arity(name, args, 0)?;
            Ok(ctx.trigger().clone())
        }
        "triggerBody" => {
            expect_arity(name, args, 0)?;
            Ok(ctx.trigger().get("body")?.clone())
        }
        "outputs" => {
            expect_arity(name, args, 1)?;
            ctx.action_output(text_arg(name, &args[0])?)
        }
        "variables" => {
            expect_arity(name, args, 1)?;
            ctx.variable(text_arg(name, &args[0])?)
        }
        "concat" => {
            let mut out = String::new();
            for arg in args {
                out.push_str(&arg.as_text());
            }
            Ok(ValueContainer::Text(out))
        }
        "coalesce" => Ok(args
            .iter()
            .find(|arg| !arg.is_null())
            .cloned()
            .unwrap_or(ValueContainer::Null)),
        "guid" => {
            expect_arity(name, args, 0)?;
            Ok(ValueContainer::Guid(Uuid::new_v4()))
        }
        "utcNow" => {
            expect_arity(name, args, 0)?;
            Ok(ValueContainer::Timestamp(Utc::now()))
        }
        "equals" => {
            expect_arity(name, args, 2)?;
            Ok(ValueContainer::Boolean(args[0] == args[1]))
        }
        "not" => {
            expect_arity(name, args, 1)?;
            Ok(ValueContainer::Boolean(!bool_arg(name, &args[0])?))
        }
        "and" => {
            expect_at_least(name, args, 2)?;
            for arg in args {
                if !bool_arg(name, arg)? {
                    return Ok(ValueContainer::Boolean(false));
                }
            }
            Ok(ValueContainer::Boolean(true))
        }
        "or" => {
            expect_at_least(name, args, 2)?;
            for arg in args {
                if bool_arg(name, arg)? {
                    return Ok(ValueContainer::Boolean(true));
                }
            }
            Ok(ValueContainer::Boolean(false))
        }
        "if" => {
            expect_arity(name, args, 3)?;
            if bool_arg(name, &args[0])? {
                Ok(args[1].clone())
            } else {
                Ok(args[2].clone())
            }
        }
        "empty" => {
            expect_arity(name, args, 1)?;
            let empty = match &args[0] {
                ValueContainer::Null => true,
                ValueContainer::Text(s) => s.is_empty(),
                ValueContainer::Sequence(items) => items.is_empty(),
                ValueContainer::Mapping(entries) => entries.is_empty(),
                _ => false,
            };
            Ok(ValueContainer::Boolean(empty))
        }
        "length" => {
            expect_arity(name, args, 1)?;
            let len = match &args[0] {
                ValueContainer::Text(s) => s.chars().count(),
                ValueContainer::Sequence(items) => items.len(),
                ValueContainer::Mapping(entries) => entries.len(),
                other => {
                    return Err(EvaluationError::TypeMismatch {
                        function: name.into(),
                        expected: "text, sequence or mapping",
                        found: other.kind(),
                    })
                }
            };
            Ok(ValueContainer::Number(len as f64))
        }
        "greater" => compare(name, args, |ord| ord == std::cmp::Ordering::Greater),
        "less" => compare(name, args, |ord| ord == std::cmp::Ordering::Less),
        _ => Err(EvaluationError::UnknownFunction(name.into())),
    }
}

fn compare(
    name: &str,
    args: &[ValueContainer],
    pick: impl Fn(std::cmp::Ordering) -> bool,
) -> Result<ValueContainer, EvaluationError> {
    expect_arity(name, args, 2)?;
    let ordering = match (&args[0], &args[1]) {
        (ValueContainer::Number(a), ValueContainer::Number(b)) => a.partial_cmp(b),
        (ValueContainer::Text(a), ValueContainer::Text(b)) => Some(a.cmp(b)),
        (a, b) => {
            return Err(EvaluationError::TypeMismatch {
                function: name.into(),
                expected: "two numbers or two texts",
                found: if a.kind() == "number" || a.kind() == "text" {
                    b.kind()
                } else {
                    a.kind()
                },
            })
        }
    };
    Ok(ValueContainer::Boolean(
        ordering.map(&pick).unwrap_or(false),
    ))
}

fn expect_arity(
    name: &str,
    args: &[ValueContainer],
    expected: usize,
) -> Result<(), EvaluationError> {
    if args.len() != expected {
        return Err(EvaluationError::ArityMismatch {
            function: name.into(),
            expected: match expected {
                0 => "0",
                1 => "1",
                2 => "2",
                3 => "3",
                _ => "several",
            },
            received: args.len(),
        });
    }
    Ok(())
}

fn expect_at_least(
    name: &str,
    args: &[ValueContainer],
    minimum: usize,
) -> Result<(), EvaluationError> {
    if args.len() < minimum {
        return Err(EvaluationError::ArityMismatch {
            function: name.into(),
            expected: "at least 2",
            received: args.len(),
        });
    }
    Ok(())
}

fn text_arg<'a>(name: &str, arg: &'a ValueContainer) -> Result<&'a str, EvaluationError> {
    arg.as_str().ok_or(EvaluationError::TypeMismatch {
        function: name.into(),
        expected: "text",
        found: arg.kind(),
    })
}

fn bool_arg(name: &str, arg: &ValueContainer) -> Result<bool, EvaluationError> {
    arg.as_bool().ok_or(EvaluationError::TypeMismatch {
        function: name.into(),
        expected: "boolean",
        found: arg.kind(),
    })
}
