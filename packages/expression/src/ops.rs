//! Operator semantics shared by the evaluator and constant folding.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::{EvalError, EvalResult};
use crate::value::Value;
use std::cmp::Ordering;

pub fn unary(op: UnaryOp, value: Value) -> EvalResult<Value> {
    match (op, value) {
        (UnaryOp::Negate, Value::Scalar(v)) => Ok(Value::Scalar(-v)),
        (UnaryOp::Negate, Value::Int(v)) => Ok(v
            .checked_neg()
            .map(Value::Int)
            .unwrap_or(Value::Scalar(-(v as f64)))),
        (UnaryOp::Negate, Value::Point(p)) => Ok(Value::Point(p * -1.0)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, value) => Err(EvalError::invalid_operands(
            op.symbol(),
            "nothing",
            value.value_type(),
        )),
    }
}

pub fn binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Subtract => match (left, right) {
            (Value::Point(a), Value::Point(b)) => Ok(Value::Point(a - b)),
            (left, right) => arithmetic(op, left, right, |a, b| a - b, i64::checked_sub),
        },
        BinaryOp::Multiply => multiply(left, right),
        BinaryOp::Divide => {
            let (a, b) = numbers(op, &left, &right)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Scalar(a / b))
        }
        BinaryOp::Modulo => {
            let (_, b) = numbers(op, &left, &right)?;
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            arithmetic(op, left, right, |a, b| a.rem_euclid(b), i64::checked_rem_euclid)
        }
        BinaryOp::Equals => Ok(Value::Bool(left.loosely_equals(&right))),
        BinaryOp::NotEquals => Ok(Value::Bool(!left.loosely_equals(&right))),
        BinaryOp::LessThan => compare(op, &left, &right, Ordering::is_lt),
        BinaryOp::LessThanOrEqual => compare(op, &left, &right, Ordering::is_le),
        BinaryOp::GreaterThan => compare(op, &left, &right, Ordering::is_gt),
        BinaryOp::GreaterThanOrEqual => compare(op, &left, &right, Ordering::is_ge),
        BinaryOp::And | BinaryOp::Or => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(operand_error(op, &left, &right)),
        },
    }
}

fn operand_error(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::invalid_operands(op.symbol(), left.value_type(), right.value_type())
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> EvalResult<(f64, f64)> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(operand_error(op, left, right)),
    }
}

/// Int op Int stays Int unless it overflows; anything mixed becomes Scalar.
fn arithmetic(
    op: BinaryOp,
    left: Value,
    right: Value,
    float: impl Fn(f64, f64) -> f64,
    int: impl Fn(i64, i64) -> Option<i64>,
) -> EvalResult<Value> {
    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        if let Some(v) = int(*a, *b) {
            return Ok(Value::Int(v));
        }
    }
    let (a, b) = numbers(op, &left, &right)?;
    Ok(Value::Scalar(float(a, b)))
}

fn add(left: Value, right: Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b))),
        (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Value::Point(a), Value::Point(b)) => Ok(Value::Point(a + b)),
        (left, right) => arithmetic(BinaryOp::Add, left, right, |a, b| a + b, i64::checked_add),
    }
}

fn multiply(left: Value, right: Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Transform(a), Value::Transform(b)) => Ok(Value::Transform(a * b)),
        (Value::Point(p), n) | (n, Value::Point(p)) if n.as_f64().is_some() => {
            Ok(Value::Point(p * n.as_f64().unwrap_or(1.0)))
        }
        (left, right) => arithmetic(
            BinaryOp::Multiply,
            left,
            right,
            |a, b| a * b,
            i64::checked_mul,
        ),
    }
}

fn compare(
    op: BinaryOp,
    left: &Value,
    right: &Value,
    test: impl Fn(Ordering) -> bool,
) -> EvalResult<Value> {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            let (a, b) = numbers(op, left, right)?;
            a.partial_cmp(&b)
        }
    };
    Ok(Value::Bool(ordering.map(test).unwrap_or(false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stencil_geometry::{Point, Transform};

    #[test]
    fn int_arithmetic_stays_int() {
        assert_eq!(
            binary(BinaryOp::Add, Value::Int(2), Value::Int(3)),
            Ok(Value::Int(5))
        );
        assert_eq!(
            binary(BinaryOp::Add, Value::Int(2), Value::Scalar(0.5)),
            Ok(Value::Scalar(2.5))
        );
        assert_eq!(
            binary(BinaryOp::Divide, Value::Int(3), Value::Int(2)),
            Ok(Value::Scalar(1.5))
        );
        assert_eq!(
            binary(BinaryOp::Modulo, Value::Int(-1), Value::Int(3)),
            Ok(Value::Int(2))
        );
    }

    #[test]
    fn string_concatenation_formats_numbers() {
        assert_eq!(
            binary(BinaryOp::Add, Value::String("n=".into()), Value::Scalar(4.0)),
            Ok(Value::String("n=4".into()))
        );
    }

    #[test]
    fn transforms_compose() {
        let t = binary(
            BinaryOp::Multiply,
            Value::Transform(Transform::translate(1.0, 0.0)),
            Value::Transform(Transform::scale(2.0, 2.0)),
        )
        .unwrap();
        assert_eq!(
            t,
            Value::Transform(Transform::translate(1.0, 0.0) * Transform::scale(2.0, 2.0))
        );
        assert_eq!(
            binary(BinaryOp::Multiply, Value::Int(2), Value::Point(Point::new(1.0, 2.0))),
            Ok(Value::Point(Point::new(2.0, 4.0)))
        );
    }

    #[test]
    fn negating_the_smallest_int_widens_to_scalar() {
        assert_eq!(unary(UnaryOp::Negate, Value::Int(7)), Ok(Value::Int(-7)));
        assert_eq!(
            unary(UnaryOp::Negate, Value::Int(i64::MIN)),
            Ok(Value::Scalar(9223372036854775808.0))
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            binary(BinaryOp::Divide, Value::Scalar(1.0), Value::Int(0)),
            Err(EvalError::DivisionByZero)
        );
        assert!(matches!(
            binary(BinaryOp::Subtract, Value::Bool(true), Value::Int(1)),
            Err(EvalError::InvalidOperands { .. })
        ));
        assert!(matches!(
            unary(UnaryOp::Not, Value::Int(1)),
            Err(EvalError::InvalidOperands { .. })
        ));
    }
}
