//! The stencil formula language: values and types, a logos lexer, a
//! precedence parser with constant folding, a bind-time type checker, a
//! tree-walking evaluator over chained scopes, and type-directed parsers
//! for attribute literals.

pub mod ast;
pub mod builtins;
pub mod checker;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod lexer;
pub mod literal;
pub mod ops;
pub mod parser;
pub mod scope;
pub mod value;

pub use ast::{Ast, AstKind, BinaryOp, UnaryOp};
pub use checker::{check, check_as, TypeChecker};
pub use error::{CheckError, EvalError, EvalResult, FormatError, FormatResult};
pub use evaluator::Evaluator;
pub use expression::{Expression, Formula, Typed};
pub use literal::{parse_as, parse_typed, LiteralContext};
pub use parser::{braced, fold, parse_ast, parse_formula, parse_template};
pub use scope::{Binding, HostFunction, Scope};
pub use value::{Value, ValueType};
