use crate::value::Value;
use std::fmt;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstKind {
    Literal(Value),
    Name(String),
    List(Vec<Ast>),
    Unary {
        op: UnaryOp,
        operand: Box<Ast>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    Conditional {
        condition: Box<Ast>,
        then: Box<Ast>,
        otherwise: Box<Ast>,
    },
    Call {
        function: String,
        args: Vec<Ast>,
    },
    Member {
        object: Box<Ast>,
        member: String,
    },
    Index {
        object: Box<Ast>,
        index: Box<Ast>,
    },
    /// Text with embedded formulas; parts are concatenated as strings.
    Interpolation(Vec<Ast>),
}

/// Formula syntax tree. `range` locates the node in the attribute text it
/// was parsed from (empty for synthesized nodes).
#[derive(Debug, Clone, PartialEq)]
pub struct Ast {
    pub kind: AstKind,
    pub range: Range<usize>,
}

impl Ast {
    pub fn new(kind: AstKind, range: Range<usize>) -> Self {
        Self { kind, range }
    }

    pub fn literal(value: Value, range: Range<usize>) -> Self {
        Self::new(AstKind::Literal(value), range)
    }

    pub fn name(name: impl Into<String>, range: Range<usize>) -> Self {
        Self::new(AstKind::Name(name.into()), range)
    }

    pub fn call(function: impl Into<String>, args: Vec<Ast>, range: Range<usize>) -> Self {
        Self::new(
            AstKind::Call {
                function: function.into(),
                args,
            },
            range,
        )
    }

    pub fn binary(op: BinaryOp, left: Ast, right: Ast) -> Self {
        let range = left.range.start.min(right.range.start)..left.range.end.max(right.range.end);
        Self::new(
            AstKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            range,
        )
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match &self.kind {
            AstKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        self.as_literal().is_some()
    }

    /// Names read by this formula, in first-use order.
    pub fn free_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            AstKind::Literal(_) => {}
            AstKind::Name(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            AstKind::List(items) | AstKind::Interpolation(items) => {
                items.iter().for_each(|i| i.collect_names(out))
            }
            AstKind::Call { args, .. } => args.iter().for_each(|a| a.collect_names(out)),
            AstKind::Unary { operand, .. } => operand.collect_names(out),
            AstKind::Binary { left, right, .. } => {
                left.collect_names(out);
                right.collect_names(out);
            }
            AstKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_names(out);
                then.collect_names(out);
                otherwise.collect_names(out);
            }
            AstKind::Member { object, .. } => object.collect_names(out),
            AstKind::Index { object, index } => {
                object.collect_names(out);
                index.collect_names(out);
            }
        }
    }
}

/// Prints the formula back in source syntax (fully parenthesized).
impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AstKind::Literal(Value::String(s)) => write!(f, "{:?}", s),
            AstKind::Literal(value) => write!(f, "{}", value),
            AstKind::Name(name) => f.write_str(name),
            AstKind::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            AstKind::Unary { op, operand } => write!(f, "{}{}", op.symbol(), operand),
            AstKind::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            AstKind::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
            AstKind::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            AstKind::Member { object, member } => write!(f, "{}.{}", object, member),
            AstKind::Index { object, index } => write!(f, "{}[{}]", object, index),
            AstKind::Interpolation(parts) => {
                for part in parts {
                    match &part.kind {
                        AstKind::Literal(Value::String(s)) => {
                            f.write_str(&s.replace('{', "{{").replace('}', "}}"))?
                        }
                        _ => write!(f, "{{{}}}", part)?,
                    }
                }
                Ok(())
            }
        }
    }
}
