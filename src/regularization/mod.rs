pub mod penalty;

pub use penalty::{l1_penalty, l1_subgradient, l2_penalty, total_penalty, weight_decay_gradient, Penalty, Regularization};
