use thiserror::Error;

/// Every failure the training core can report.
///
/// None of these are retried internally; a failed call aborts the current
/// mini-batch step and leaves the parameters untouched.
#[derive(Debug, Error)]
pub enum NetError {
    /// Two operands had incompatible dimensions for `op`.
    #[error("shape mismatch in {op}: {left:?} vs {right:?}")]
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("matrix is singular and cannot be inverted")]
    SingularMatrix,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A backward step was asked to read state its forward call never produced.
    #[error("backward called without matching forward state: {0}")]
    MissingForwardState(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetError>;

impl NetError {
    pub(crate) fn shape(op: &'static str, left: (usize, usize), right: (usize, usize)) -> Self {
        NetError::ShapeMismatch { op, left, right }
    }
}
