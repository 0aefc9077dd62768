//! Pure builtin functions and named colour constants. Everything here may be
//! constant-folded at parse time.

use crate::error::{EvalError, EvalResult};
use crate::value::{Value, ValueType};
use std::fmt;
use stencil_geometry::{Color, Margins, Point, Rect, Size, Transform};

/// Most items `range` may produce. Larger requests are an evaluation error.
pub const MAX_RANGE_LEN: usize = 1_000_000;

/// Accepted argument counts of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    const fn between(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min && self.max.map(|max| count <= max).unwrap_or(true)
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", max),
            Some(max) => write!(f, "{} to {}", self.min, max),
            None => write!(f, "at least {}", self.min),
        }
    }
}

const NAMED_COLORS: &[&str] = &["black", "white", "red", "green", "blue", "gray", "transparent"];

/// Value of a bare builtin name such as `red`.
pub fn constant(name: &str) -> Option<Value> {
    if NAMED_COLORS.contains(&name) {
        Color::named(name).map(Value::Color)
    } else {
        None
    }
}

pub fn is_constant(name: &str) -> bool {
    NAMED_COLORS.contains(&name)
}

pub fn arity(name: &str) -> Option<Arity> {
    let arity = match name {
        "min" | "max" => Arity::at_least(1),
        "abs" | "floor" | "ceil" | "round" | "sqrt" | "sin" | "cos" | "tan" | "len" | "gray"
        | "hex" | "str" | "int" | "skew_x" | "skew_y" => Arity::exactly(1),
        "atan2" | "pow" | "size" | "point" => Arity::exactly(2),
        "clamp" | "rgb" | "if" => Arity::exactly(3),
        "rgba" | "rect" => Arity::exactly(4),
        "range" | "translate" | "scale" => Arity::between(1, 2),
        "rotate" => Arity::between(1, 3),
        "margins" => Arity::between(1, 4),
        "matrix" => Arity::exactly(6),
        _ => return None,
    };
    Some(arity)
}

pub fn is_builtin(name: &str) -> bool {
    arity(name).is_some()
}

/// Static result type given the argument types (used by the checker).
pub fn return_type(name: &str, args: &[ValueType]) -> ValueType {
    match name {
        "min" | "max" | "abs" => {
            if args.iter().all(|a| *a == ValueType::Int) {
                ValueType::Int
            } else {
                ValueType::Scalar
            }
        }
        "len" | "int" => ValueType::Int,
        "range" => ValueType::list_of(ValueType::Int),
        "rgb" | "rgba" | "gray" | "hex" => ValueType::Color,
        "str" => ValueType::String,
        "translate" | "scale" | "rotate" | "skew_x" | "skew_y" | "matrix" => ValueType::Transform,
        "rect" => ValueType::Rect,
        "size" => ValueType::Size,
        "point" => ValueType::Point,
        "margins" => ValueType::Margins,
        "if" => match args {
            [_, a, b] if a.accepts(b) => a.clone(),
            [_, a, b] if b.accepts(a) => b.clone(),
            _ => ValueType::Any,
        },
        _ => ValueType::Scalar,
    }
}

/// Expected type of each argument, `Any` where several are accepted.
pub fn parameter_type(name: &str, index: usize) -> ValueType {
    match name {
        "len" | "str" | "int" => ValueType::Any,
        "hex" => ValueType::String,
        "if" if index == 0 => ValueType::Bool,
        "if" => ValueType::Any,
        _ => ValueType::Scalar,
    }
}

fn number(function: &str, value: &Value) -> EvalResult<f64> {
    value.as_f64().ok_or_else(|| {
        EvalError::invalid_argument(function, format!("expected a number, got {}", value.value_type()))
    })
}

fn numbers(function: &str, args: &[Value]) -> EvalResult<Vec<f64>> {
    args.iter().map(|a| number(function, a)).collect()
}

pub fn call(name: &str, args: Vec<Value>) -> EvalResult<Value> {
    let expected = arity(name).ok_or_else(|| EvalError::UndefinedName {
        name: name.to_string(),
    })?;
    if !expected.accepts(args.len()) {
        return Err(EvalError::Arity {
            function: name.to_string(),
            expected: expected.to_string(),
            found: args.len(),
        });
    }

    match name {
        "min" | "max" => {
            let pick_min = name == "min";
            if args.iter().all(|a| matches!(a, Value::Int(_))) {
                let ints = args.iter().filter_map(|a| match a {
                    Value::Int(v) => Some(*v),
                    _ => None,
                });
                let best = if pick_min { ints.min() } else { ints.max() };
                return Ok(Value::Int(best.unwrap_or_default()));
            }
            let values = numbers(name, &args)?;
            let best = values
                .into_iter()
                .reduce(|a, b| if pick_min { a.min(b) } else { a.max(b) })
                .unwrap_or_default();
            Ok(Value::Scalar(best))
        }
        "abs" => match &args[0] {
            Value::Int(v) => Ok(Value::Int(v.abs())),
            other => Ok(Value::Scalar(number(name, other)?.abs())),
        },
        "floor" => unary(name, &args, f64::floor),
        "ceil" => unary(name, &args, f64::ceil),
        "round" => unary(name, &args, f64::round),
        "sqrt" => {
            let v = number(name, &args[0])?;
            if v < 0.0 {
                return Err(EvalError::invalid_argument(name, "negative input"));
            }
            Ok(Value::Scalar(v.sqrt()))
        }
        "sin" => unary(name, &args, |d| d.to_radians().sin()),
        "cos" => unary(name, &args, |d| d.to_radians().cos()),
        "tan" => unary(name, &args, |d| d.to_radians().tan()),
        "atan2" => {
            let v = numbers(name, &args)?;
            Ok(Value::Scalar(v[0].atan2(v[1]).to_degrees()))
        }
        "pow" => {
            let v = numbers(name, &args)?;
            Ok(Value::Scalar(v[0].powf(v[1])))
        }
        "clamp" => {
            let v = numbers(name, &args)?;
            if v[1] > v[2] {
                return Err(EvalError::invalid_argument(name, "lower bound above upper bound"));
            }
            Ok(Value::Scalar(v[0].clamp(v[1], v[2])))
        }
        "len" => match &args[0] {
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
            other => Err(EvalError::bad_cast(other.value_type(), "list")),
        },
        "range" => {
            let v = numbers(name, &args)?;
            let (start, end) = match *v.as_slice() {
                [end] => (0.0, end),
                [start, end] => (start, end),
                _ => (0.0, 0.0),
            };
            if !start.is_finite() || !end.is_finite() {
                return Err(EvalError::invalid_argument(name, "bounds must be finite"));
            }
            let (start, end) = (start.trunc(), end.trunc());
            if end - start > MAX_RANGE_LEN as f64 {
                return Err(EvalError::invalid_argument(
                    name,
                    format!("{} items exceeds the limit of {}", end - start, MAX_RANGE_LEN),
                ));
            }
            Ok(Value::List((start as i64..end as i64).map(Value::Int).collect()))
        }
        "rgb" => {
            let v = numbers(name, &args)?;
            Ok(Value::Color(Color::from_rgba8(v[0], v[1], v[2], 1.0)))
        }
        "rgba" => {
            let v = numbers(name, &args)?;
            Ok(Value::Color(Color::from_rgba8(v[0], v[1], v[2], v[3])))
        }
        "gray" => Ok(Value::Color(Color::gray(number(name, &args[0])?))),
        "hex" => {
            let text = args[0]
                .as_str()
                .ok_or_else(|| EvalError::bad_cast(args[0].value_type(), ValueType::String))?;
            Color::from_hex(text)
                .map(Value::Color)
                .ok_or_else(|| EvalError::invalid_argument(name, format!("'{}' is not a hex colour", text)))
        }
        "str" => Ok(Value::String(args[0].to_string())),
        "int" => match &args[0] {
            Value::Int(v) => Ok(Value::Int(*v)),
            Value::Scalar(v) if v.is_finite() => Ok(Value::Int(v.trunc() as i64)),
            Value::Bool(b) => Ok(Value::Int(*b as i64)),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EvalError::bad_cast(format!("string '{}'", s), ValueType::Int)),
            other => Err(EvalError::bad_cast(other.value_type(), ValueType::Int)),
        },
        "translate" => {
            let v = numbers(name, &args)?;
            let ty = v.get(1).copied().unwrap_or(0.0);
            Ok(Value::Transform(Transform::translate(v[0], ty)))
        }
        "scale" => {
            let v = numbers(name, &args)?;
            let sy = v.get(1).copied().unwrap_or(v[0]);
            Ok(Value::Transform(Transform::scale(v[0], sy)))
        }
        "rotate" => {
            let v = numbers(name, &args)?;
            match *v.as_slice() {
                [deg] => Ok(Value::Transform(Transform::rotate(deg))),
                [deg, cx, cy] => Ok(Value::Transform(Transform::rotate_about(deg, cx, cy))),
                _ => Err(EvalError::invalid_argument(name, "expects an angle and an optional centre")),
            }
        }
        "skew_x" => Ok(Value::Transform(Transform::skew_x(number(name, &args[0])?))),
        "skew_y" => Ok(Value::Transform(Transform::skew_y(number(name, &args[0])?))),
        "matrix" => {
            let v = numbers(name, &args)?;
            Ok(Value::Transform(Transform::new(v[0], v[1], v[2], v[3], v[4], v[5])))
        }
        "rect" => {
            let v = numbers(name, &args)?;
            Ok(Value::Rect(Rect::new(v[0], v[1], v[2], v[3])))
        }
        "size" => {
            let v = numbers(name, &args)?;
            Ok(Value::Size(Size::new(v[0], v[1])))
        }
        "point" => {
            let v = numbers(name, &args)?;
            Ok(Value::Point(Point::new(v[0], v[1])))
        }
        "margins" => {
            let v = numbers(name, &args)?;
            Margins::from_values(&v)
                .map(Value::Margins)
                .ok_or_else(|| EvalError::invalid_argument(name, "takes 1, 2 or 4 values"))
        }
        "if" => {
            let condition = args[0]
                .as_bool()
                .ok_or_else(|| EvalError::bad_cast(args[0].value_type(), ValueType::Bool))?;
            let mut args = args;
            Ok(if condition { args.swap_remove(1) } else { args.swap_remove(2) })
        }
        _ => Err(EvalError::UndefinedName {
            name: name.to_string(),
        }),
    }
}

fn unary(name: &str, args: &[Value], f: impl Fn(f64) -> f64) -> EvalResult<Value> {
    Ok(Value::Scalar(f(number(name, &args[0])?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_checks() {
        assert!(matches!(
            call("pow", vec![Value::Int(2)]),
            Err(EvalError::Arity { found: 1, .. })
        ));
        assert_eq!(arity("margins").map(|a| a.to_string()), Some("1 to 4".to_string()));
        assert_eq!(arity("min").map(|a| a.to_string()), Some("at least 1".to_string()));
        assert!(arity("nope").is_none());
    }

    #[test]
    fn numeric_builtins() {
        assert_eq!(call("max", vec![Value::Int(1), Value::Int(4)]), Ok(Value::Int(4)));
        assert_eq!(
            call("min", vec![Value::Int(1), Value::Scalar(0.5)]),
            Ok(Value::Scalar(0.5))
        );
        assert_eq!(
            call("clamp", vec![Value::Int(12), Value::Int(0), Value::Int(10)]),
            Ok(Value::Scalar(10.0))
        );
        assert_eq!(
            call("range", vec![Value::Int(3)]),
            Ok(Value::List(vec![Value::Int(0), Value::Int(1), Value::Int(2)]))
        );
        let Value::Scalar(s) = call("sin", vec![Value::Int(90)]).unwrap() else {
            panic!("expected scalar");
        };
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn range_is_bounded() {
        assert!(matches!(
            call("range", vec![Value::Scalar(1e11)]),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert!(matches!(
            call("range", vec![Value::Int(0), Value::Scalar(f64::INFINITY)]),
            Err(EvalError::InvalidArgument { .. })
        ));
        let limit = vec![Value::Int(5), Value::Int(5 + MAX_RANGE_LEN as i64)];
        let Ok(Value::List(items)) = call("range", limit) else {
            panic!("a range at the limit is allowed");
        };
        assert_eq!(items.len(), MAX_RANGE_LEN);
        assert_eq!(call("range", vec![Value::Int(3), Value::Int(1)]), Ok(Value::List(vec![])));
    }

    #[test]
    fn constructors() {
        assert_eq!(
            call("rgb", vec![Value::Int(255), Value::Int(0), Value::Int(0)]),
            Ok(Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0)))
        );
        assert_eq!(
            call("hex", vec![Value::String("#00f".into())]),
            Ok(Value::Color(Color::rgba(0.0, 0.0, 1.0, 1.0)))
        );
        assert_eq!(
            call("margins", vec![Value::Int(1), Value::Int(2)]),
            Ok(Value::Margins(Margins::new(1.0, 2.0, 1.0, 2.0)))
        );
        assert!(matches!(
            call("margins", vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
            Err(EvalError::InvalidArgument { .. })
        ));
        assert_eq!(
            call("scale", vec![Value::Int(2)]),
            Ok(Value::Transform(Transform::scale(2.0, 2.0)))
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(call("int", vec![Value::Scalar(2.7)]), Ok(Value::Int(2)));
        assert!(matches!(
            call("int", vec![Value::String("abc".into())]),
            Err(EvalError::BadCast { .. })
        ));
        assert_eq!(
            call("str", vec![Value::Scalar(1.5)]),
            Ok(Value::String("1.5".into()))
        );
        assert_eq!(constant("red"), Some(Value::Color(Color::rgba(1.0, 0.0, 0.0, 1.0))));
        assert_eq!(constant("width"), None);
    }
}
