use anyhow::Result;
use serde_json::Value;

use super::ast::{BinaryOp, Expr, PathExpression, SelectStatement};
use super::joiner::Tuple;
use super::{json_path, jq};

/// Everything evaluation needs besides the tuple itself. Subqueries are
/// executed through the callback so the evaluator stays independent of
/// the session; the executor wires it to `execute_select` with the
/// current tuple as the correlated binding.
pub struct EvalContext<'a> {
    pub subquery: &'a dyn Fn(&SelectStatement, &Tuple) -> Result<Value>,
}

/// Evaluate an expression against a tuple binding.
///
/// A type mismatch, missing field, bad index or division by zero
/// degrades to `Value::Null`; only broken query shapes (subquery shape
/// violations, sublanguage compile/run failures) return errors.
pub fn eval(expr: &Expr, ctx: &EvalContext<'_>, tuple: &Tuple) -> Result<Value> {
    match expr {
        Expr::Integer(value) => Ok(Value::from(*value)),
        Expr::Float(value) => Ok(float_value(*value)),
        Expr::StringLit(value) => Ok(Value::String(value.clone())),
        Expr::Boolean(value) => Ok(Value::Bool(*value)),

        Expr::Reference { name, path } => {
            let Some(value) = tuple.get(name) else {
                // unknown names resolve to absent
                return Ok(Value::Null);
            };
            match path {
                Some(path) => Ok(resolve_path(value, &path.fields)),
                None => Ok(value.clone()),
            }
        }

        Expr::Paren { inner, path } => {
            let value = eval(inner, ctx, tuple)?;
            Ok(apply_path(value, path))
        }

        Expr::Binary { op, lhs, rhs } => {
            let lhs = eval(lhs, ctx, tuple)?;
            let rhs = eval(rhs, ctx, tuple)?;
            Ok(apply_op(&lhs, *op, &rhs))
        }

        Expr::JsonPath {
            inner,
            program,
            path,
        } => {
            let input = eval(inner, ctx, tuple)?;
            let result = json_path::run(program, &input)?;
            Ok(apply_path(result, path))
        }

        Expr::Jq {
            inner,
            program,
            path,
        } => {
            let input = eval(inner, ctx, tuple)?;
            let result = jq::run(program, &input)?;
            Ok(apply_path(result, path))
        }

        Expr::Subselect(select) => (ctx.subquery)(select, tuple),
    }
}

/// WHERE keeps a row when its condition is not empty.
pub fn eval_is_empty(expr: &Expr, ctx: &EvalContext<'_>, tuple: &Tuple) -> Result<bool> {
    Ok(is_empty(&eval(expr, ctx, tuple)?))
}

/// A value is empty iff it is null, `false`, an empty string, a zero
/// number, or a zero-length sequence. A mapping is never empty.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_i64() == Some(0) || n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

/// Step through a value along path components. A missing key, a
/// non-numeric or out-of-range sequence index resolves to `Null`; a
/// scalar reached with components left over is returned unchanged.
pub fn resolve_path(value: &Value, fields: &[String]) -> Value {
    let Some((head, rest)) = fields.split_first() else {
        return value.clone();
    };

    match value {
        Value::Object(map) => match map.get(head) {
            Some(child) => resolve_path(child, rest),
            None => Value::Null,
        },
        Value::Array(items) => match head.parse::<usize>().ok().and_then(|idx| items.get(idx)) {
            Some(child) => resolve_path(child, rest),
            None => Value::Null,
        },
        other => other.clone(),
    }
}

fn apply_path(value: Value, path: &Option<PathExpression>) -> Value {
    match path {
        Some(path) => resolve_path(&value, &path.fields),
        None => value,
    }
}

/// Scalar view of a value for operator dispatch. Sequences and mappings
/// have no scalar view and make any operator evaluate to `Null`.
#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

fn operand(value: &Value) -> Option<Operand> {
    match value {
        Value::Bool(b) => Some(Operand::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Operand::Int(i)),
            None => n.as_f64().map(Operand::Float),
        },
        Value::String(s) => Some(Operand::Str(s.clone())),
        _ => None,
    }
}

/// Convert the right operand to the type of the left, except that a
/// float on the right promotes the left instead — `1 >= 1.1` must not
/// be decided by truncation. Pairs without a numeric widening between
/// them do not coerce.
fn coerce(lhs: Operand, rhs: Operand) -> Option<(Operand, Operand)> {
    use Operand::*;
    match (lhs, rhs) {
        (Int(l), Float(r)) => Some((Float(l as f64), Float(r))),
        (Float(l), Int(r)) => Some((Float(l), Float(r as f64))),
        (Int(l), Int(r)) => Some((Int(l), Int(r))),
        (Float(l), Float(r)) => Some((Float(l), Float(r))),
        (Bool(l), Bool(r)) => Some((Bool(l), Bool(r))),
        (Str(l), Str(r)) => Some((Str(l), Str(r))),
        _ => None,
    }
}

fn int_value(value: Option<i64>) -> Value {
    match value {
        Some(v) => Value::from(v),
        None => Value::Null,
    }
}

fn float_value(value: f64) -> Value {
    match serde_json::Number::from_f64(value) {
        Some(n) => Value::Number(n),
        None => Value::Null,
    }
}

/// Apply a binary operator after coercion. Every combination outside
/// the operator's domain evaluates to `Null` rather than failing the
/// query.
pub fn apply_op(lhs: &Value, op: BinaryOp, rhs: &Value) -> Value {
    use BinaryOp::*;
    use Operand::*;

    let coerced = match (operand(lhs), operand(rhs)) {
        (Some(l), Some(r)) => coerce(l, r),
        _ => None,
    };
    let Some(pair) = coerced else {
        return Value::Null;
    };

    match (op, pair) {
        (Or, (Bool(l), Bool(r))) => Value::Bool(l || r),
        (And, (Bool(l), Bool(r))) => Value::Bool(l && r),

        (Equal, (l, r)) => Value::Bool(l == r),
        (NotEqual, (l, r)) => Value::Bool(l != r),

        (LessThan, (Int(l), Int(r))) => Value::Bool(l < r),
        (LessThan, (Float(l), Float(r))) => Value::Bool(l < r),
        (LessThanEqual, (Int(l), Int(r))) => Value::Bool(l <= r),
        (LessThanEqual, (Float(l), Float(r))) => Value::Bool(l <= r),
        (GreaterThan, (Int(l), Int(r))) => Value::Bool(l > r),
        (GreaterThan, (Float(l), Float(r))) => Value::Bool(l > r),
        (GreaterThanEqual, (Int(l), Int(r))) => Value::Bool(l >= r),
        (GreaterThanEqual, (Float(l), Float(r))) => Value::Bool(l >= r),

        (Add, (Int(l), Int(r))) => int_value(l.checked_add(r)),
        (Add, (Float(l), Float(r))) => float_value(l + r),
        (Subtract, (Int(l), Int(r))) => int_value(l.checked_sub(r)),
        (Subtract, (Float(l), Float(r))) => float_value(l - r),
        (Multiply, (Int(l), Int(r))) => int_value(l.checked_mul(r)),
        (Multiply, (Float(l), Float(r))) => float_value(l * r),
        // checked division covers the zero divisor
        (Divide, (Int(l), Int(r))) => int_value(l.checked_div(r)),
        (Divide, (Float(l), Float(r))) => float_value(l / r),

        _ => Value::Null,
    }
}
