pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod regularization;
pub mod network;
pub mod loss;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use error::{NetError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::{ActivationFunction, DerivativeSource};
pub use layers::Mode;
pub use network::{Dims, ForwardCache, Gradients, Network, NetworkConfig, Params};
pub use loss::cross_entropy::CrossEntropyLoss;
pub use optim::sgd::Sgd;
pub use regularization::penalty::Regularization;
pub use train::{StepStats, TrainConfig, Trainer};
