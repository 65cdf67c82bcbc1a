use serde::{Serialize, Deserialize};

use crate::activation::activation::{ActivationFunction, DerivativeSource};
use crate::error::{NetError, Result};
use crate::layers::batch_norm::{BatchNorm, DEFAULT_EPSILON};
use crate::layers::dropout::Dropout;

/// Serializable description of the stochastic and nonlinear parts of the
/// network. The topology itself is fixed at three dense layers.
///
/// Fields:
/// - `hidden_activation` — activation after layer 1 and layer 2
/// - `derivative_source` — which cached tensor the backward pass evaluates
///                         activation derivatives at
/// - `dropout_rates`     — drop probability after hidden layer 1 and on the
///                         input to the output layer
/// - `batch_norm`        — normalize hidden layer 2's activations
/// - `bn_epsilon`        — variance floor inside the batch-norm square root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub hidden_activation: [ActivationFunction; 2],
    pub derivative_source: DerivativeSource,
    pub dropout_rates: [f64; 2],
    pub batch_norm: bool,
    pub bn_epsilon: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            hidden_activation: [ActivationFunction::ReLU; 2],
            derivative_source: DerivativeSource::PreActivation,
            dropout_rates: [0.3, 0.0],
            batch_norm: true,
            bn_epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Validated runtime form of a [`NetworkConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Architecture {
    pub activations: [ActivationFunction; 2],
    pub derivative_source: DerivativeSource,
    pub dropout: [Dropout; 2],
    pub batch_norm: Option<BatchNorm>,
}

impl NetworkConfig {
    /// No dropout and no batch norm: a deterministic network.
    pub fn plain(activation: ActivationFunction) -> Self {
        NetworkConfig {
            hidden_activation: [activation; 2],
            dropout_rates: [0.0, 0.0],
            batch_norm: false,
            ..NetworkConfig::default()
        }
    }

    pub fn build(&self) -> Result<Architecture> {
        for act in &self.hidden_activation {
            if let ActivationFunction::LeakyReLU { alpha } = act {
                if self.derivative_source == DerivativeSource::Output && *alpha <= 0.0 {
                    return Err(NetError::InvalidArgument(format!(
                        "leaky relu alpha {alpha} cannot be differentiated from its output"
                    )));
                }
            }
        }
        Ok(Architecture {
            activations: self.hidden_activation,
            derivative_source: self.derivative_source,
            dropout: [Dropout::new(self.dropout_rates[0])?, Dropout::new(self.dropout_rates[1])?],
            batch_norm: if self.batch_norm { Some(BatchNorm::new(self.bn_epsilon)?) } else { None },
        })
    }
}
