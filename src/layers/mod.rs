pub mod batch_norm;
pub mod dropout;

pub use batch_norm::{BatchNorm, BatchNormCache, BatchNormGradients};
pub use dropout::{Dropout, DropoutCache};

/// Whether a forward call is part of a training step or a pure evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}
