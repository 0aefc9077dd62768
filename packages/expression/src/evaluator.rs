use crate::ast::{Ast, AstKind, BinaryOp};
use crate::builtins;
use crate::error::{EvalError, EvalResult};
use crate::expression::Expression;
use crate::ops;
use crate::scope::Scope;
use crate::value::{Value, ValueType};
use tracing::trace;

/// Tree-walking evaluator. Pure apart from the visiting set, which holds
/// the variable bindings currently being evaluated so a formula that reads
/// itself (directly or through others) fails instead of recursing forever.
#[derive(Debug, Default)]
pub struct Evaluator {
    visiting: Vec<(String, usize)>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&mut self, ast: &Ast, scope: &Scope) -> EvalResult<Value> {
        match &ast.kind {
            AstKind::Literal(value) => Ok(value.clone()),
            AstKind::Name(name) => self.evaluate_name(name, scope),
            AstKind::List(items) => items
                .iter()
                .map(|item| self.evaluate(item, scope))
                .collect::<EvalResult<Vec<_>>>()
                .map(Value::List),
            AstKind::Unary { op, operand } => {
                let value = self.evaluate(operand, scope)?;
                ops::unary(*op, value)
            }
            AstKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right, scope),
            AstKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.evaluate_condition(condition, scope)? {
                    self.evaluate(then, scope)
                } else {
                    self.evaluate(otherwise, scope)
                }
            }
            AstKind::Call { function, args } => self.evaluate_call(function, args, scope),
            AstKind::Member { object, member } => {
                let value = self.evaluate(object, scope)?;
                member_of(value, member)
            }
            AstKind::Index { object, index } => {
                let object = self.evaluate(object, scope)?;
                let index = self.evaluate(index, scope)?;
                index_into(object, index)
            }
            AstKind::Interpolation(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&self.evaluate(part, scope)?.to_string());
                }
                Ok(Value::String(out))
            }
        }
    }

    fn evaluate_name(&mut self, name: &str, scope: &Scope) -> EvalResult<Value> {
        let Some((binding, owner)) = scope.resolve(name) else {
            return builtins::constant(name).ok_or_else(|| EvalError::UndefinedName {
                name: name.to_string(),
            });
        };

        match &binding.value {
            None => Err(binding.missing(name)),
            Some(Expression::Constant(value)) => Ok(value.clone()),
            Some(Expression::Formula(formula)) => {
                let key = (name.to_string(), owner.id());
                if let Some(start) = self.visiting.iter().position(|k| *k == key) {
                    let mut chain: Vec<String> =
                        self.visiting[start..].iter().map(|(n, _)| n.clone()).collect();
                    chain.push(name.to_string());
                    return Err(EvalError::Recursion { chain });
                }
                trace!(variable = name, "evaluating variable");
                self.visiting.push(key);
                let result = self.evaluate(formula.ast(), owner);
                self.visiting.pop();
                result
            }
        }
    }

    fn evaluate_condition(&mut self, condition: &Ast, scope: &Scope) -> EvalResult<bool> {
        let value = self.evaluate(condition, scope)?;
        value
            .as_bool()
            .ok_or_else(|| EvalError::bad_cast(value.value_type(), ValueType::Bool))
    }

    fn evaluate_binary(
        &mut self,
        op: BinaryOp,
        left: &Ast,
        right: &Ast,
        scope: &Scope,
    ) -> EvalResult<Value> {
        match op {
            BinaryOp::And | BinaryOp::Or => {
                let lhs = self.evaluate(left, scope)?;
                match (op, lhs.as_bool()) {
                    (BinaryOp::And, Some(false)) => Ok(Value::Bool(false)),
                    (BinaryOp::Or, Some(true)) => Ok(Value::Bool(true)),
                    _ => {
                        let rhs = self.evaluate(right, scope)?;
                        ops::binary(op, lhs, rhs)
                    }
                }
            }
            _ => {
                let lhs = self.evaluate(left, scope)?;
                let rhs = self.evaluate(right, scope)?;
                ops::binary(op, lhs, rhs)
            }
        }
    }

    fn evaluate_call(&mut self, function: &str, args: &[Ast], scope: &Scope) -> EvalResult<Value> {
        if let Some(host) = scope.function(function).cloned() {
            if args.len() != host.params.len() {
                return Err(EvalError::Arity {
                    function: function.to_string(),
                    expected: host.params.len().to_string(),
                    found: args.len(),
                });
            }
            let values = self.evaluate_args(args, scope)?;
            return host.call(&values);
        }

        // `if` only evaluates the branch it takes.
        if function == "if" && args.len() == 3 {
            return if self.evaluate_condition(&args[0], scope)? {
                self.evaluate(&args[1], scope)
            } else {
                self.evaluate(&args[2], scope)
            };
        }

        if !builtins::is_builtin(function) {
            return Err(EvalError::UndefinedName {
                name: function.to_string(),
            });
        }
        let values = self.evaluate_args(args, scope)?;
        builtins::call(function, values)
    }

    fn evaluate_args(&mut self, args: &[Ast], scope: &Scope) -> EvalResult<Vec<Value>> {
        args.iter().map(|arg| self.evaluate(arg, scope)).collect()
    }
}

pub(crate) fn member_of(value: Value, member: &str) -> EvalResult<Value> {
    let no_such_member = |value: &Value| EvalError::NoSuchMember {
        member: member.to_string(),
        on: value.value_type().to_string(),
    };
    if let Value::Record(fields) = &value {
        return fields
            .get(member)
            .cloned()
            .ok_or_else(|| no_such_member(&value));
    }
    let number = |v: f64| -> EvalResult<Value> { Ok(Value::Scalar(v)) };
    match (&value, member) {
        (Value::Rect(r), "x") => number(r.x),
        (Value::Rect(r), "y") => number(r.y),
        (Value::Rect(r), "width") => number(r.width),
        (Value::Rect(r), "height") => number(r.height),
        (Value::Size(s), "width") => number(s.width),
        (Value::Size(s), "height") => number(s.height),
        (Value::Point(p), "x") => number(p.x),
        (Value::Point(p), "y") => number(p.y),
        (Value::Margins(m), "top") => number(m.top),
        (Value::Margins(m), "right") => number(m.right),
        (Value::Margins(m), "bottom") => number(m.bottom),
        (Value::Margins(m), "left") => number(m.left),
        (Value::Color(c), "r") => number(c.r),
        (Value::Color(c), "g") => number(c.g),
        (Value::Color(c), "b") => number(c.b),
        (Value::Color(c), "a") => number(c.a),
        _ => Err(no_such_member(&value)),
    }
}

pub(crate) fn index_into(object: Value, index: Value) -> EvalResult<Value> {
    let Value::List(mut items) = object else {
        return Err(EvalError::invalid_operands("[]", object.value_type(), index.value_type()));
    };
    let i = match index {
        Value::Int(i) => i,
        Value::Scalar(v) if v.fract() == 0.0 => v as i64,
        other => return Err(EvalError::bad_cast(other.value_type(), ValueType::Int)),
    };
    if i < 0 || i as usize >= items.len() {
        return Err(EvalError::IndexOutOfRange {
            index: i,
            len: items.len(),
        });
    }
    Ok(items.swap_remove(i as usize))
}
