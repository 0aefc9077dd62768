use stencil_common::CommonError;
use stencil_expression::EvalError;
use thiserror::Error;

pub type BindResult<T> = Result<T, BindError>;
pub type RenderResult<T> = Result<T, RenderError>;

/// Hard failures around binding. Problems in the markup itself are never
/// errors; they end up as diagnostics on the bound document.
#[derive(Error, Debug)]
pub enum BindError {
    #[error("failed to read pattern source: {0}")]
    Source(#[from] CommonError),

    #[error("pattern '{name}' not found")]
    PatternNotFound { name: String },
}

/// Failures that stop a pattern from being drawn at all. Evaluation errors
/// inside single elements are reported in the render report instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("pattern '{name}' failed to bind and cannot be drawn")]
    ErrorPattern { name: String },

    #[error("target rectangle {width} x {height} is not drawable")]
    InvalidTarget { width: f64, height: f64 },

    #[error("pattern '{name}': {source}")]
    Evaluation {
        name: String,
        #[source]
        source: EvalError,
    },
}
