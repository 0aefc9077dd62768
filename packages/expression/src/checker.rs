use crate::ast::{Ast, AstKind, BinaryOp, UnaryOp};
use crate::builtins;
use crate::error::CheckError;
use crate::scope::Scope;
use crate::value::ValueType;
use std::ops::Range;

/// Bind-time type checker. Infers the type of a formula against the
/// declared types in a scope and collects every problem it finds.
pub struct TypeChecker<'a> {
    scope: &'a Scope,
    errors: Vec<CheckError>,
}

/// Checks `ast` and returns its inferred type with any errors found.
pub fn check(ast: &Ast, scope: &Scope) -> (ValueType, Vec<CheckError>) {
    let mut checker = TypeChecker::new(scope);
    let ty = checker.check(ast);
    (ty, checker.errors)
}

/// Like [`check`], additionally requiring the result to fit `expected`.
pub fn check_as(ast: &Ast, expected: &ValueType, scope: &Scope) -> Vec<CheckError> {
    let (found, mut errors) = check(ast, scope);
    if !expected.accepts(&found) && !coerces(expected, &found) {
        errors.push(CheckError::Mismatch {
            expected: expected.to_string(),
            found: found.to_string(),
            range: ast.range.clone(),
        });
    }
    errors
}

/// Conversions the `Typed` impls perform on evaluation.
fn coerces(expected: &ValueType, found: &ValueType) -> bool {
    match expected {
        ValueType::String | ValueType::Path => {
            matches!(found, ValueType::Scalar | ValueType::Int | ValueType::Bool)
        }
        ValueType::Margins => found.is_numeric(),
        ValueType::Int => *found == ValueType::Scalar,
        _ => false,
    }
}

impl<'a> TypeChecker<'a> {
    pub fn new(scope: &'a Scope) -> Self {
        Self {
            scope,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    pub fn check(&mut self, ast: &Ast) -> ValueType {
        match &ast.kind {
            AstKind::Literal(value) => value.value_type(),
            AstKind::Name(name) => match self.scope.type_of(name) {
                Some(ty) => ty.clone(),
                None => match builtins::constant(name) {
                    Some(value) => value.value_type(),
                    None => {
                        self.errors.push(CheckError::UndefinedName {
                            name: name.clone(),
                            range: ast.range.clone(),
                        });
                        ValueType::Any
                    }
                },
            },
            AstKind::List(items) => {
                let types: Vec<ValueType> = items.iter().map(|i| self.check(i)).collect();
                ValueType::list_of(types.into_iter().next().unwrap_or(ValueType::Any))
            }
            AstKind::Unary { op, operand } => {
                let ty = self.check(operand);
                match (op, &ty) {
                    (_, ValueType::Any) => ValueType::Any,
                    (UnaryOp::Negate, ValueType::Scalar | ValueType::Int | ValueType::Point) => ty.clone(),
                    (UnaryOp::Not, ValueType::Bool) => ValueType::Bool,
                    _ => {
                        self.invalid(op.symbol(), "nothing", &ty, &ast.range);
                        ValueType::Any
                    }
                }
            }
            AstKind::Binary { op, left, right } => {
                let l = self.check(left);
                let r = self.check(right);
                self.check_binary(*op, l, r, &ast.range)
            }
            AstKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let c = self.check(condition);
                self.expect(&ValueType::Bool, &c, &condition.range);
                let a = self.check(then);
                let b = self.check(otherwise);
                unify(a, b)
            }
            AstKind::Call { function, args } => self.check_call(function, args, &ast.range),
            AstKind::Member { object, member } => {
                let ty = self.check(object);
                self.check_member(ty, member, &ast.range)
            }
            AstKind::Index { object, index } => {
                let o = self.check(object);
                let i = self.check(index);
                self.expect(&ValueType::Int, &i, &index.range);
                match o {
                    ValueType::List(item) => *item,
                    ValueType::Any => ValueType::Any,
                    other => {
                        self.invalid("[]", &other, &i, &ast.range);
                        ValueType::Any
                    }
                }
            }
            AstKind::Interpolation(parts) => {
                for part in parts {
                    self.check(part);
                }
                ValueType::String
            }
        }
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        l: ValueType,
        r: ValueType,
        range: &Range<usize>,
    ) -> ValueType {
        use ValueType::*;
        let numeric = |l: &ValueType, r: &ValueType| {
            if *l == Int && *r == Int {
                Int
            } else if *l == Any || *r == Any {
                Any
            } else {
                Scalar
            }
        };
        let result = match op {
            BinaryOp::Add => match (&l, &r) {
                (String, _) | (_, String) => Some(String),
                (List(_), List(_)) => Some(l.clone()),
                (Point, Point) => Some(Point),
                (a, b) if a.is_numeric() && b.is_numeric() => Some(numeric(a, b)),
                (Any, _) | (_, Any) => Some(Any),
                _ => None,
            },
            BinaryOp::Subtract => match (&l, &r) {
                (Point, Point) => Some(Point),
                (a, b) if a.is_numeric() && b.is_numeric() => Some(numeric(a, b)),
                (Any, _) | (_, Any) => Some(Any),
                _ => None,
            },
            BinaryOp::Multiply => match (&l, &r) {
                (Transform, Transform) => Some(Transform),
                (Point, n) | (n, Point) if n.is_numeric() => Some(Point),
                (a, b) if a.is_numeric() && b.is_numeric() => Some(numeric(a, b)),
                (Any, _) | (_, Any) => Some(Any),
                _ => None,
            },
            BinaryOp::Divide => (l.is_numeric() && r.is_numeric()).then_some(Scalar),
            BinaryOp::Modulo => (l.is_numeric() && r.is_numeric()).then(|| numeric(&l, &r)),
            BinaryOp::Equals | BinaryOp::NotEquals => Some(Bool),
            BinaryOp::LessThan
            | BinaryOp::LessThanOrEqual
            | BinaryOp::GreaterThan
            | BinaryOp::GreaterThanOrEqual => {
                let ok = (l.is_numeric() && r.is_numeric())
                    || (l == String && r == String)
                    || l == Any
                    || r == Any;
                ok.then_some(Bool)
            }
            BinaryOp::And | BinaryOp::Or => {
                let ok = matches!(l, Bool | Any) && matches!(r, Bool | Any);
                ok.then_some(Bool)
            }
        };
        result.unwrap_or_else(|| {
            self.invalid(op.symbol(), &l, &r, range);
            Any
        })
    }

    fn check_call(&mut self, function: &str, args: &[Ast], range: &Range<usize>) -> ValueType {
        let types: Vec<ValueType> = args.iter().map(|a| self.check(a)).collect();
        let scope = self.scope;

        if let Some(host) = scope.function(function) {
            if host.params.len() != args.len() {
                self.errors.push(CheckError::Arity {
                    function: function.to_string(),
                    expected: host.params.len().to_string(),
                    found: args.len(),
                    range: range.clone(),
                });
            } else {
                for ((param, ty), arg) in host.params.iter().zip(&types).zip(args) {
                    self.expect(param, ty, &arg.range);
                }
            }
            return host.returns.clone();
        }

        let Some(arity) = builtins::arity(function) else {
            self.errors.push(CheckError::UnknownFunction {
                name: function.to_string(),
                range: range.clone(),
            });
            return ValueType::Any;
        };
        if !arity.accepts(args.len()) {
            self.errors.push(CheckError::Arity {
                function: function.to_string(),
                expected: arity.to_string(),
                found: args.len(),
                range: range.clone(),
            });
        }
        for (i, (ty, arg)) in types.iter().zip(args).enumerate() {
            let param = builtins::parameter_type(function, i);
            self.expect(&param, ty, &arg.range);
        }
        builtins::return_type(function, &types)
    }

    fn check_member(&mut self, ty: ValueType, member: &str, range: &Range<usize>) -> ValueType {
        let known = match (&ty, member) {
            (ValueType::Any, _) => Some(ValueType::Any),
            (ValueType::Record(fields), _) => fields.get(member).cloned(),
            (ValueType::Rect, "x" | "y" | "width" | "height")
            | (ValueType::Size, "width" | "height")
            | (ValueType::Point, "x" | "y")
            | (ValueType::Margins, "top" | "right" | "bottom" | "left")
            | (ValueType::Color, "r" | "g" | "b" | "a") => Some(ValueType::Scalar),
            _ => None,
        };
        known.unwrap_or_else(|| {
            self.errors.push(CheckError::NoSuchMember {
                member: member.to_string(),
                on: ty.to_string(),
                range: range.clone(),
            });
            ValueType::Any
        })
    }

    fn expect(&mut self, expected: &ValueType, found: &ValueType, range: &Range<usize>) {
        if !expected.accepts(found) {
            self.errors.push(CheckError::Mismatch {
                expected: expected.to_string(),
                found: found.to_string(),
                range: range.clone(),
            });
        }
    }

    fn invalid(
        &mut self,
        operator: &str,
        left: impl ToString,
        right: impl ToString,
        range: &Range<usize>,
    ) {
        self.errors.push(CheckError::InvalidOperands {
            operator: operator.to_string(),
            left: left.to_string(),
            right: right.to_string(),
            range: range.clone(),
        });
    }
}

fn unify(a: ValueType, b: ValueType) -> ValueType {
    if a.accepts(&b) {
        a
    } else if b.accepts(&a) {
        b
    } else {
        ValueType::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_ast;
    use crate::scope::HostFunction;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn scope() -> Scope {
        let mut scope = Scope::new();
        scope.declare("width", ValueType::Scalar);
        scope.declare("count", ValueType::Int);
        scope.declare("label", ValueType::String);
        scope.declare(
            "pad",
            ValueType::Record(BTreeMap::from([("left".to_string(), ValueType::Scalar)])),
        );
        scope.define_function(HostFunction::new(
            "text_width",
            vec![ValueType::String, ValueType::Scalar],
            ValueType::Scalar,
            |_| Ok(Value::Scalar(0.0)),
        ));
        scope
    }

    fn infer(text: &str) -> (ValueType, Vec<CheckError>) {
        check(&parse_ast(text, 0).unwrap(), &scope())
    }

    #[test]
    fn test_inference() {
        assert_eq!(infer("count * 2").0, ValueType::Int);
        assert_eq!(infer("width / 2").0, ValueType::Scalar);
        assert_eq!(infer("label + count").0, ValueType::String);
        assert_eq!(infer("pad.left + 1").0, ValueType::Scalar);
        assert_eq!(infer("translate(1) * rotate(45)").0, ValueType::Transform);
        assert_eq!(infer("text_width(label, 12)").0, ValueType::Scalar);
        assert_eq!(infer("range(count)[0]").0, ValueType::Int);
        assert!(infer("count > 1 ? 'a' : 'b'").1.is_empty());
    }

    #[test]
    fn test_errors_are_collected() {
        let (_, errors) = infer("nope + missing(1) + count.x");
        assert_eq!(errors.len(), 3);
        assert!(matches!(errors[0], CheckError::UndefinedName { ref name, .. } if name == "nope"));
        assert!(matches!(errors[1], CheckError::UnknownFunction { .. }));
        assert!(matches!(errors[2], CheckError::NoSuchMember { .. }));

        let (_, errors) = infer("pow(1)");
        assert!(matches!(errors[0], CheckError::Arity { found: 1, .. }));

        let (_, errors) = infer("text_width(1, 2)");
        assert!(matches!(errors[0], CheckError::Mismatch { ref range, .. } if *range == (11..12)));

        let (_, errors) = infer("label - 1");
        assert!(matches!(errors[0], CheckError::InvalidOperands { .. }));
    }

    #[test]
    fn test_check_as() {
        let s = scope();
        let ast = parse_ast("width * 2", 0).unwrap();
        assert!(check_as(&ast, &ValueType::Scalar, &s).is_empty());
        assert!(check_as(&ast, &ValueType::String, &s).is_empty());
        assert_eq!(check_as(&ast, &ValueType::Color, &s).len(), 1);
    }
}
