use std::ops::Range;
use thiserror::Error;

pub type FormatResult<T> = Result<T, FormatError>;
pub type EvalResult<T> = Result<T, EvalError>;

/// Malformed literal or formula syntax. Ranges are byte offsets into the
/// text handed to the parser (an attribute value or text node).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("unexpected character in formula")]
    UnexpectedCharacter { range: Range<usize> },

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        range: Range<usize>,
    },

    #[error("formula ended early: expected {expected}")]
    UnexpectedEnd { expected: String, range: Range<usize> },

    #[error("'{{' is never closed")]
    UnclosedBrace { range: Range<usize> },

    #[error("'}}' without a matching '{{'; write '}}}}' for a literal brace")]
    UnmatchedBrace { range: Range<usize> },

    #[error("'{text}' is not a valid {expected}")]
    InvalidLiteral {
        expected: String,
        text: String,
        range: Range<usize>,
    },

    #[error("percentage needs '{axis}' in scope")]
    PercentWithoutAxis { axis: &'static str, range: Range<usize> },

    #[error("unknown transform function '{name}'")]
    UnknownTransform { name: String, range: Range<usize> },

    #[error("{what} takes {expected} values, found {found}")]
    WrongCount {
        what: String,
        expected: String,
        found: usize,
        range: Range<usize>,
    },

    #[error("'{value}' is not one of: {}", .allowed.join(", "))]
    UnknownEnumValue {
        value: String,
        allowed: Vec<String>,
        range: Range<usize>,
    },
}

impl FormatError {
    pub fn range(&self) -> Range<usize> {
        match self {
            FormatError::UnexpectedCharacter { range }
            | FormatError::UnexpectedToken { range, .. }
            | FormatError::UnexpectedEnd { range, .. }
            | FormatError::UnclosedBrace { range }
            | FormatError::UnmatchedBrace { range }
            | FormatError::InvalidLiteral { range, .. }
            | FormatError::PercentWithoutAxis { range, .. }
            | FormatError::UnknownTransform { range, .. }
            | FormatError::WrongCount { range, .. }
            | FormatError::UnknownEnumValue { range, .. } => range.clone(),
        }
    }

    pub fn invalid_literal(expected: impl ToString, text: &str, range: Range<usize>) -> Self {
        FormatError::InvalidLiteral {
            expected: expected.to_string(),
            text: text.to_string(),
            range,
        }
    }
}

/// Failure while evaluating a formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("'{name}' is not defined")]
    UndefinedName { name: String },

    #[error("'{name}' is declared but has no value")]
    Unbound { name: String },

    #[error("'{function}' expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("cannot apply '{operator}' to {left} and {right}")]
    InvalidOperands {
        operator: String,
        left: String,
        right: String,
    },

    #[error("cannot use a {from} as {to}")]
    BadCast { from: String, to: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("'{}' refers to itself: {}", .chain.first().map(String::as_str).unwrap_or(""), .chain.join(" -> "))]
    Recursion { chain: Vec<String> },

    #[error("index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("{on} has no member '{member}'")]
    NoSuchMember { member: String, on: String },

    #[error("invalid argument to '{function}': {message}")]
    InvalidArgument { function: String, message: String },
}

impl EvalError {
    pub fn bad_cast(from: impl ToString, to: impl ToString) -> Self {
        EvalError::BadCast {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_operands(operator: &str, left: impl ToString, right: impl ToString) -> Self {
        EvalError::InvalidOperands {
            operator: operator.to_string(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    pub fn invalid_argument(function: &str, message: impl Into<String>) -> Self {
        EvalError::InvalidArgument {
            function: function.to_string(),
            message: message.into(),
        }
    }
}

/// Static problem found by the type checker at bind time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error("'{name}' is not defined")]
    UndefinedName { name: String, range: Range<usize> },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String, range: Range<usize> },

    #[error("'{function}' expects {expected} arguments, got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
        range: Range<usize>,
    },

    #[error("cannot apply '{operator}' to {left} and {right}")]
    InvalidOperands {
        operator: String,
        left: String,
        right: String,
        range: Range<usize>,
    },

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: String,
        found: String,
        range: Range<usize>,
    },

    #[error("{on} has no member '{member}'")]
    NoSuchMember {
        member: String,
        on: String,
        range: Range<usize>,
    },
}

impl CheckError {
    pub fn range(&self) -> Range<usize> {
        match self {
            CheckError::UndefinedName { range, .. }
            | CheckError::UnknownFunction { range, .. }
            | CheckError::Arity { range, .. }
            | CheckError::InvalidOperands { range, .. }
            | CheckError::Mismatch { range, .. }
            | CheckError::NoSuchMember { range, .. } => range.clone(),
        }
    }
}
