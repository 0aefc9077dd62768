use crate::ast::{Ast, BinaryOp};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::ops;
use crate::scope::Scope;
use crate::value::{Value, ValueType};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::rc::Rc;
use stencil_geometry::{Color, Margins, Point, Rect, Size, Transform};

/// Unevaluated formula together with the type its consumer expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    ast: Rc<Ast>,
    ty: ValueType,
}

impl Formula {
    pub fn new(ast: Ast, ty: ValueType) -> Self {
        Self {
            ast: Rc::new(ast),
            ty,
        }
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn value_type(&self) -> &ValueType {
        &self.ty
    }
}

impl Serialize for Formula {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.ast)
    }
}

/// Either a value known at parse time or a formula evaluated per instance.
/// Parsing folds literal-only formulas, but a `Formula` is never turned
/// into a `Constant` afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression<T> {
    Constant(T),
    Formula(Formula),
}

/// Rust types that have a formula-language counterpart.
pub trait Typed: Clone + Sized {
    fn value_type() -> ValueType;
    fn from_value(value: Value) -> EvalResult<Self>;
    fn into_value(self) -> Value;
}

impl<T: Typed> Expression<T> {
    /// Wraps a parsed (and folded) tree: a literal root becomes a constant.
    pub fn from_ast(ast: Ast) -> EvalResult<Self> {
        Self::from_ast_as(ast, T::value_type())
    }

    pub fn from_ast_as(ast: Ast, ty: ValueType) -> EvalResult<Self> {
        match ast.kind {
            crate::ast::AstKind::Literal(value) => Ok(Expression::Constant(T::from_value(value)?)),
            _ => Ok(Expression::Formula(Formula::new(ast, ty))),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::Constant(_))
    }

    pub fn as_constant(&self) -> Option<&T> {
        match self {
            Expression::Constant(value) => Some(value),
            Expression::Formula(_) => None,
        }
    }

    pub fn formula(&self) -> Option<&Formula> {
        match self {
            Expression::Formula(formula) => Some(formula),
            Expression::Constant(_) => None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Expression::Constant(_) => T::value_type(),
            Expression::Formula(formula) => formula.ty.clone(),
        }
    }

    pub fn eval(&self, scope: &Scope) -> EvalResult<T> {
        match self {
            Expression::Constant(value) => Ok(value.clone()),
            Expression::Formula(formula) => {
                T::from_value(Evaluator::new().evaluate(&formula.ast, scope)?)
            }
        }
    }

    pub fn to_ast(&self) -> Ast {
        match self {
            Expression::Constant(value) => Ast::literal(value.clone().into_value(), 0..0),
            Expression::Formula(formula) => formula.ast.as_ref().clone(),
        }
    }

    /// Names this expression reads; empty for constants.
    pub fn free_names(&self) -> Vec<String> {
        self.formula()
            .map(|f| f.ast.free_names())
            .unwrap_or_default()
    }

    /// Builds `self op other` without evaluating anything. Two constants
    /// fold immediately; otherwise the result is a formula.
    pub fn combine(self, op: BinaryOp, other: Expression<T>) -> EvalResult<Expression<T>> {
        match (self, other) {
            (Expression::Constant(a), Expression::Constant(b)) => Ok(Expression::Constant(
                T::from_value(ops::binary(op, a.into_value(), b.into_value())?)?,
            )),
            (a, b) => {
                let ty = a.value_type();
                Ok(Expression::Formula(Formula::new(
                    Ast::binary(op, a.to_ast(), b.to_ast()),
                    ty,
                )))
            }
        }
    }

    pub fn into_value_expression(self) -> Expression<Value> {
        match self {
            Expression::Constant(value) => Expression::Constant(value.into_value()),
            Expression::Formula(formula) => Expression::Formula(formula),
        }
    }
}

impl Expression<Value> {
    /// Narrows a dynamically typed expression. Constants are converted now;
    /// formulas keep their tree and are converted when evaluated.
    pub fn cast<T: Typed>(self) -> EvalResult<Expression<T>> {
        match self {
            Expression::Constant(value) => Ok(Expression::Constant(T::from_value(value)?)),
            Expression::Formula(formula) => Ok(Expression::Formula(formula)),
        }
    }
}

impl<T: Typed> From<T> for Expression<T> {
    fn from(value: T) -> Self {
        Expression::Constant(value)
    }
}

impl Expression<Transform> {
    /// `parent * self`: the cascade composes transforms multiplicatively.
    pub fn compose(parent: &Expression<Transform>, own: Expression<Transform>) -> EvalResult<Self> {
        if parent.as_constant().map(Transform::is_identity).unwrap_or(false) {
            return Ok(own);
        }
        parent.clone().combine(BinaryOp::Multiply, own)
    }
}

fn cast_error<T>(value: &Value, to: ValueType) -> EvalResult<T> {
    Err(EvalError::bad_cast(value.value_type(), to))
}

impl Typed for f64 {
    fn value_type() -> ValueType {
        ValueType::Scalar
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        value
            .as_f64()
            .map_or_else(|| cast_error(&value, ValueType::Scalar), Ok)
    }

    fn into_value(self) -> Value {
        Value::Scalar(self)
    }
}

impl Typed for i64 {
    fn value_type() -> ValueType {
        ValueType::Int
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        match value {
            Value::Int(v) => Ok(v),
            Value::Scalar(v) if v.fract() == 0.0 && v.is_finite() => Ok(v as i64),
            other => cast_error(&other, ValueType::Int),
        }
    }

    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl Typed for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        value
            .as_bool()
            .map_or_else(|| cast_error(&value, ValueType::Bool), Ok)
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Typed for String {
    fn value_type() -> ValueType {
        ValueType::String
    }

    /// Numbers and booleans print themselves; structured values do not.
    fn from_value(value: Value) -> EvalResult<Self> {
        match value {
            Value::String(s) => Ok(s),
            v @ (Value::Scalar(_) | Value::Int(_) | Value::Bool(_)) => Ok(v.to_string()),
            other => cast_error(&other, ValueType::String),
        }
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl Typed for PathBuf {
    fn value_type() -> ValueType {
        ValueType::Path
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        String::from_value(value).map(PathBuf::from)
    }

    fn into_value(self) -> Value {
        Value::String(self.to_string_lossy().into_owned())
    }
}

impl Typed for Margins {
    fn value_type() -> ValueType {
        ValueType::Margins
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        match value {
            Value::Margins(m) => Ok(m),
            other => match other.as_f64() {
                Some(v) => Ok(Margins::uniform(v)),
                None => cast_error(&other, ValueType::Margins),
            },
        }
    }

    fn into_value(self) -> Value {
        Value::Margins(self)
    }
}

macro_rules! typed_variant {
    ($ty:ty, $variant:ident) => {
        impl Typed for $ty {
            fn value_type() -> ValueType {
                ValueType::$variant
            }

            fn from_value(value: Value) -> EvalResult<Self> {
                match value {
                    Value::$variant(v) => Ok(v),
                    other => cast_error(&other, ValueType::$variant),
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

typed_variant!(Color, Color);
typed_variant!(Transform, Transform);
typed_variant!(Rect, Rect);
typed_variant!(Size, Size);
typed_variant!(Point, Point);

impl Typed for Value {
    fn value_type() -> ValueType {
        ValueType::Any
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        Ok(value)
    }

    fn into_value(self) -> Value {
        self
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn value_type() -> ValueType {
        ValueType::list_of(T::value_type())
    }

    fn from_value(value: Value) -> EvalResult<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => cast_error(&other, Self::value_type()),
        }
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Typed::into_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstKind;

    #[test]
    fn combine_folds_constants() {
        let a: Expression<f64> = 2.0.into();
        let b: Expression<f64> = 3.0.into();
        assert_eq!(a.combine(BinaryOp::Add, b), Ok(Expression::Constant(5.0)));
    }

    #[test]
    fn combine_keeps_formulas() {
        let width = Expression::<f64>::from_ast(Ast::name("width", 0..5)).unwrap();
        let sum = width.combine(BinaryOp::Add, 1.0.into()).unwrap();
        assert!(!sum.is_constant());
        assert_eq!(sum.formula().unwrap().ast().to_string(), "(width + 1)");

        let mut scope = Scope::new();
        scope.bind_value("width", Value::Scalar(9.0));
        assert_eq!(sum.eval(&scope), Ok(10.0));
    }

    #[test]
    fn literal_root_becomes_constant() {
        let e = Expression::<i64>::from_ast(Ast::literal(Value::Int(3), 0..1)).unwrap();
        assert_eq!(e, Expression::Constant(3));
        assert!(matches!(
            Expression::<Color>::from_ast(Ast::literal(Value::Int(3), 0..1)),
            Err(EvalError::BadCast { .. })
        ));
    }

    #[test]
    fn compose_skips_identity_parent() {
        let own = Expression::Constant(Transform::translate(1.0, 2.0));
        let composed = Expression::compose(&Transform::IDENTITY.into(), own.clone()).unwrap();
        assert_eq!(composed, own);

        let parent = Expression::<Transform>::from_ast(Ast::name("t", 0..1)).unwrap();
        let composed = Expression::compose(&parent, own).unwrap();
        assert!(matches!(
            composed.formula().map(|f| &f.ast().kind),
            Some(AstKind::Binary { op: BinaryOp::Multiply, .. })
        ));
    }

    #[test]
    fn serializes_formula_as_text() {
        let e = Expression::<f64>::from_ast(Ast::binary(
            BinaryOp::Multiply,
            Ast::name("width", 0..5),
            Ast::literal(Value::Scalar(0.5), 8..11),
        ))
        .unwrap();
        assert_eq!(
            serde_json::to_string(&e).unwrap(),
            r#"{"formula":"(width * 0.5)"}"#
        );
        let c: Expression<f64> = 1.5.into();
        assert_eq!(serde_json::to_string(&c).unwrap(), r#"{"constant":1.5}"#);
    }
}
