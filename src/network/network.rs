use rand::Rng;

use crate::error::Result;
use crate::layers::Mode;
use crate::math::matrix::Matrix;
use crate::network::backward::{compute_gradients, Gradients};
use crate::network::config::{Architecture, NetworkConfig};
use crate::network::forward::{forward, predict, ForwardCache};
use crate::network::params::Params;
use crate::optim::sgd::Sgd;
use crate::regularization::penalty::Regularization;

/// A parameter set paired with the architecture it runs under.
///
/// The network holds no per-step state: forward caches are returned to the
/// caller and handed back to `compute_gradients` explicitly.
#[derive(Debug, Clone)]
pub struct Network {
    pub params: Params,
    config: NetworkConfig,
    arch: Architecture,
}

impl Network {
    pub fn new(params: Params, config: NetworkConfig) -> Result<Network> {
        params.validate()?;
        let arch = config.build()?;
        Ok(Network { params, config, arch })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn architecture(&self) -> &Architecture {
        &self.arch
    }

    /// Forward pass; the returned cache is valid for exactly one backward call
    /// made before the parameters change.
    pub fn forward<R: Rng + ?Sized>(&self, x: &Matrix, mode: Mode, rng: &mut R) -> Result<(Matrix, ForwardCache)> {
        forward(x, &self.params, &self.arch, mode, rng)
    }

    /// Inference-mode predictions, no cache retained.
    pub fn predict(&self, x: &Matrix) -> Result<Matrix> {
        predict(x, &self.params, &self.arch)
    }

    pub fn compute_gradients(
        &self,
        x: &Matrix,
        y: &Matrix,
        cache: &ForwardCache,
        reg: &Regularization,
    ) -> Result<Gradients> {
        compute_gradients(x, y, &self.params, &self.arch, cache, reg)
    }

    pub fn update_parameters(&mut self, grads: &Gradients, optimizer: &Sgd) -> Result<()> {
        optimizer.step(&mut self.params, grads)
    }
}
