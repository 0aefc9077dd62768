use thiserror::Error;

pub type SliceResult<T> = Result<T, SliceError>;
pub type PathResult<T> = Result<T, PathError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    #[error("reference {axis} length must be positive and finite, got {length}")]
    InvalidReference { axis: &'static str, length: f64 },

    #[error("{axis} cut {index} at {value} is outside (0, {reference})")]
    CutOutOfRange {
        axis: &'static str,
        index: usize,
        value: f64,
        reference: f64,
    },

    #[error("{axis} cuts must be strictly increasing: cut {index} ({value}) <= previous ({previous})")]
    NotIncreasing {
        axis: &'static str,
        index: usize,
        value: f64,
        previous: f64,
    },

    #[error("cannot infer {axis} scaling: {reason}")]
    Degenerate { axis: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("path data must start with a move-to command (offset {offset})")]
    MissingMoveTo { offset: usize },

    #[error("unknown path command '{command}' at offset {offset}")]
    UnknownCommand { offset: usize, command: char },

    #[error("expected a number at offset {offset}")]
    ExpectedNumber { offset: usize },
}
