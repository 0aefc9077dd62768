use crate::error::{EvalError, EvalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use stencil_geometry::{Color, Margins, Point, Rect, Size, Transform};

/// Static type of a formula or binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Scalar,
    Int,
    Bool,
    String,
    Color,
    Transform,
    Rect,
    Size,
    Point,
    Margins,
    /// File path, resolved against the source directory.
    Path,
    /// One of a closed set of names.
    Enum(Vec<String>),
    List(Box<ValueType>),
    Record(BTreeMap<String, ValueType>),
    Any,
}

impl ValueType {
    /// Resolves a `type="..."` attribute. `values` is the comma separated
    /// member list used by `enum`.
    pub fn from_name(name: &str, values: Option<&str>) -> Option<ValueType> {
        let ty = match name.trim() {
            "scalar" | "number" => ValueType::Scalar,
            "int" => ValueType::Int,
            "bool" => ValueType::Bool,
            "string" => ValueType::String,
            "color" => ValueType::Color,
            "transform" => ValueType::Transform,
            "rect" => ValueType::Rect,
            "size" => ValueType::Size,
            "point" => ValueType::Point,
            "margins" => ValueType::Margins,
            "path" => ValueType::Path,
            "enum" => {
                let members: Vec<String> = values?
                    .split(',')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if members.is_empty() {
                    return None;
                }
                ValueType::Enum(members)
            }
            _ => return None,
        };
        Some(ty)
    }

    pub fn list_of(item: ValueType) -> ValueType {
        ValueType::List(Box::new(item))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Scalar | ValueType::Int | ValueType::Any)
    }

    pub fn is_stringy(&self) -> bool {
        matches!(
            self,
            ValueType::String | ValueType::Path | ValueType::Enum(_) | ValueType::Any
        )
    }

    /// Whether a value of type `other` can be used where `self` is expected.
    pub fn accepts(&self, other: &ValueType) -> bool {
        match (self, other) {
            (ValueType::Any, _) | (_, ValueType::Any) => true,
            (ValueType::Scalar, ValueType::Int) => true,
            (ValueType::String | ValueType::Path | ValueType::Enum(_), ValueType::String)
            | (ValueType::String | ValueType::Path, ValueType::Path | ValueType::Enum(_)) => true,
            (ValueType::Enum(a), ValueType::Enum(b)) => b.iter().all(|v| a.contains(v)),
            (ValueType::List(a), ValueType::List(b)) => a.accepts(b),
            (ValueType::Record(a), ValueType::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, t)| b.get(k).map(|u| t.accepts(u)).unwrap_or(false))
            }
            (a, b) => a == b,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Scalar => f.write_str("scalar"),
            ValueType::Int => f.write_str("int"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::String => f.write_str("string"),
            ValueType::Color => f.write_str("color"),
            ValueType::Transform => f.write_str("transform"),
            ValueType::Rect => f.write_str("rect"),
            ValueType::Size => f.write_str("size"),
            ValueType::Point => f.write_str("point"),
            ValueType::Margins => f.write_str("margins"),
            ValueType::Path => f.write_str("path"),
            ValueType::Enum(values) => write!(f, "enum({})", values.join("|")),
            ValueType::List(item) => write!(f, "list({})", item),
            ValueType::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                f.write_str("}")
            }
            ValueType::Any => f.write_str("any"),
        }
    }
}

/// Runtime value produced by evaluating a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Scalar(f64),
    Int(i64),
    Bool(bool),
    String(String),
    Color(Color),
    Transform(Transform),
    Rect(Rect),
    Size(Size),
    Point(Point),
    Margins(Margins),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::String(_) => ValueType::String,
            Value::Color(_) => ValueType::Color,
            Value::Transform(_) => ValueType::Transform,
            Value::Rect(_) => ValueType::Rect,
            Value::Size(_) => ValueType::Size,
            Value::Point(_) => ValueType::Point,
            Value::Margins(_) => ValueType::Margins,
            Value::List(items) => {
                let item = items
                    .first()
                    .map(Value::value_type)
                    .unwrap_or(ValueType::Any);
                ValueType::list_of(item)
            }
            Value::Record(fields) => ValueType::Record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.value_type()))
                    .collect(),
            ),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts to the representation `ty` expects: ints widen to scalars,
    /// integral scalars narrow to ints, numbers and booleans print as text,
    /// a single number is uniform margins.
    pub fn coerce(self, ty: &ValueType) -> EvalResult<Value> {
        match (ty, self) {
            (ValueType::Any, v) => Ok(v),
            (ValueType::Scalar, Value::Int(v)) => Ok(Value::Scalar(v as f64)),
            (ValueType::Int, Value::Scalar(v)) if v.fract() == 0.0 && v.is_finite() => {
                Ok(Value::Int(v as i64))
            }
            (ValueType::String | ValueType::Path, v @ (Value::Scalar(_) | Value::Int(_) | Value::Bool(_))) => {
                Ok(Value::String(v.to_string()))
            }
            (ValueType::Path, v @ Value::String(_)) => Ok(v),
            (ValueType::Enum(members), Value::String(s)) => {
                if members.contains(&s) {
                    Ok(Value::String(s))
                } else {
                    Err(EvalError::bad_cast(format!("'{}'", s), ty))
                }
            }
            (ValueType::Margins, v) if v.as_f64().is_some() => Ok(Value::Margins(
                Margins::uniform(v.as_f64().unwrap_or_default()),
            )),
            (ValueType::List(item), Value::List(items)) => items
                .into_iter()
                .map(|v| v.coerce(item))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            (ValueType::Record(fields), Value::Record(values)) if fields.len() == values.len() => {
                values
                    .into_iter()
                    .map(|(name, value)| match fields.get(&name) {
                        Some(field) => value.coerce(field).map(|v| (name, v)),
                        None => Err(EvalError::NoSuchMember {
                            member: name,
                            on: ty.to_string(),
                        }),
                    })
                    .collect::<EvalResult<BTreeMap<_, _>>>()
                    .map(Value::Record)
            }
            (ty, v) if ty.accepts(&v.value_type()) => Ok(v),
            (ty, v) => Err(EvalError::bad_cast(v.value_type(), ty)),
        }
    }

    /// Numeric-aware equality: `1 == 1.0`.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        write!(f, "{}", v as i64)
    } else {
        write!(f, "{}", v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write_number(f, *v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
            Value::Color(c) => write!(f, "{}", c),
            Value::Transform(t) => write!(
                f,
                "matrix({}, {}, {}, {}, {}, {})",
                t.a, t.b, t.c, t.d, t.e, t.f
            ),
            Value::Rect(r) => write!(f, "{}, {}, {}, {}", r.x, r.y, r.width, r.height),
            Value::Size(s) => write!(f, "{}, {}", s.width, s.height),
            Value::Point(p) => write!(f, "{}, {}", p.x, p.y),
            Value::Margins(m) => write!(f, "{} {} {} {}", m.top, m.right, m.bottom, m.left),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                f.write_str("}")
            }
        }
    }
}
