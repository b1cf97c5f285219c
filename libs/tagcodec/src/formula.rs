//! Sandboxed user formula evaluation
//!
//! Tag formulas are arithmetic over the single variable `x` (the scaled
//! value) plus a fixed allow-list of math functions. The evaluation
//! context is built fresh per call and carries nothing else: no
//! environment access, no state.

use evalexpr::{
    ContextWithMutableFunctions, ContextWithMutableVariables, EvalexprError, Function,
    HashMapContext, Value,
};

/// Formula evaluation failure, reported as a non-fatal diagnostic by callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("formula error: {0}")]
pub struct FormulaError(pub String);

/// Evaluate `formula` with `x` bound to `input`.
pub fn evaluate(formula: &str, input: f64) -> Result<f64, FormulaError> {
    let formula = formula.trim();
    if formula.is_empty() {
        return Ok(input);
    }

    let mut context = HashMapContext::new();
    context
        .set_value("x".to_string(), Value::Float(input))
        .map_err(|e| FormulaError(format!("failed to bind x: {e}")))?;
    register_math_functions(&mut context)?;

    let result = evalexpr::eval_with_context(formula, &context)
        .map_err(|e| FormulaError(format!("failed to evaluate '{formula}': {e}")))?;

    match result {
        Value::Float(f) => Ok(f),
        Value::Int(i) => Ok(i as f64),
        Value::Boolean(b) => Ok(if b { 1.0 } else { 0.0 }),
        other => Err(FormulaError(format!(
            "expression did not evaluate to a number: {other:?}"
        ))),
    }
}

fn to_f64(value: &Value) -> Result<f64, EvalexprError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        _ => Err(EvalexprError::expected_number(value.clone())),
    }
}

/// Register the math allow-list. Single-argument helpers share one macro
/// arm; two-argument ones unpack a tuple.
fn register_math_functions(context: &mut HashMapContext) -> Result<(), FormulaError> {
    macro_rules! unary {
        ($name:literal, $f:expr) => {
            context
                .set_function(
                    $name.to_string(),
                    Function::new(|arg| {
                        let v = to_f64(arg)?;
                        Ok(Value::Float($f(v)))
                    }),
                )
                .map_err(|e| FormulaError(format!("failed to register {}: {e}", $name)))?;
        };
    }

    macro_rules! binary {
        ($name:literal, $f:expr) => {
            context
                .set_function(
                    $name.to_string(),
                    Function::new(|arg| {
                        let tuple = arg.as_tuple()?;
                        if tuple.len() != 2 {
                            return Err(EvalexprError::CustomMessage(format!(
                                "{} expects 2 arguments, got {}",
                                $name,
                                tuple.len()
                            )));
                        }
                        let a = to_f64(&tuple[0])?;
                        let b = to_f64(&tuple[1])?;
                        Ok(Value::Float($f(a, b)))
                    }),
                )
                .map_err(|e| FormulaError(format!("failed to register {}: {e}", $name)))?;
        };
    }

    unary!("sqrt", f64::sqrt);
    unary!("abs", f64::abs);
    unary!("ln", f64::ln);
    unary!("log10", f64::log10);
    unary!("exp", f64::exp);
    unary!("sin", f64::sin);
    unary!("cos", f64::cos);
    unary!("tan", f64::tan);
    unary!("floor", f64::floor);
    unary!("ceil", f64::ceil);
    unary!("round", f64::round);
    binary!("pow", f64::powf);
    binary!("min", f64::min);
    binary!("max", f64::max);

    Ok(())
}
