use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::error::{NetError, Result};
use crate::layers::Mode;
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;
use crate::network::network::Network;
use crate::network::params::Params;
use crate::optim::sgd::Sgd;
use crate::regularization::penalty::Regularization;
use crate::train::step_stats::StepStats;
use crate::train::train_config::TrainConfig;

/// Owns everything one training worker mutates: the parameters, the
/// optimizer settings and the dropout RNG stream.
///
/// Independent workers each build their own `Trainer`; nothing is shared.
pub struct Trainer {
    network: Network,
    optimizer: Sgd,
    regularization: Regularization,
    rng: StdRng,
    steps: u64,
}

impl Trainer {
    pub fn new(params: Params, config: &TrainConfig) -> Result<Trainer> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Trainer {
            network: Network::new(params, config.network.clone())?,
            optimizer: Sgd::new(config.learning_rate).with_norm_lr_scale(config.norm_lr_scale),
            regularization: config.regularization,
            rng,
            steps: 0,
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn params(&self) -> &Params {
        &self.network.params
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// One forward → loss → backward → update sequence over a mini-batch.
    ///
    /// The reported loss is measured before the update. Any error aborts the
    /// step before the parameters are touched.
    pub fn train_step(&mut self, x: &Matrix, y: &Matrix) -> Result<StepStats> {
        let (predictions, cache) = self.network.forward(x, Mode::Training, &mut self.rng)?;
        let stats = self.measure(&predictions, y)?;
        if !stats.loss().is_finite() {
            warn!(step = self.steps, loss = stats.loss(), "non-finite training loss");
        }

        let grads = self.network.compute_gradients(x, y, &cache, &self.regularization)?;
        self.network.update_parameters(&grads, &self.optimizer)?;
        self.steps += 1;

        debug!(
            step = self.steps,
            loss = stats.loss(),
            data_loss = stats.data_loss,
            accuracy = stats.accuracy(),
            "train step"
        );
        Ok(stats)
    }

    /// Loss and accuracy under inference mode. Leaves no state behind.
    pub fn evaluate(&self, x: &Matrix, y: &Matrix) -> Result<StepStats> {
        let predictions = self.network.predict(x)?;
        self.measure(&predictions, y)
    }

    fn measure(&self, predictions: &Matrix, y: &Matrix) -> Result<StepStats> {
        if predictions.shape() != y.shape() {
            return Err(NetError::shape("labels", y.shape(), predictions.shape()));
        }
        let data_loss = CrossEntropyLoss::batch_loss(predictions, y)?;
        let regularization_loss = self.regularization.penalty(&self.network.params.weights());
        let correct = predictions.argmax_rows().iter()
            .zip(y.argmax_rows().iter())
            .filter(|(p, t)| p == t)
            .count();
        Ok(StepStats {
            data_loss,
            regularization_loss,
            correct,
            batch_size: predictions.rows,
        })
    }
}
