use serde::{Serialize, Deserialize};

use crate::error::{NetError, Result};
use crate::network::config::NetworkConfig;
use crate::regularization::penalty::Regularization;

/// Configuration for a training run.
///
/// # Fields
/// - `learning_rate`  — gradient-descent step size
/// - `norm_lr_scale`  — multiplier on the step size for batch-norm gamma/beta
/// - `regularization` — L1/L2 strengths on the weight matrices
/// - `seed`           — dropout RNG seed; `None` seeds from OS entropy
/// - `epochs`         — passes over the data, used by the outer loop
/// - `batch_size`     — examples per mini-batch, used by the outer loop
/// - `network`        — activations, dropout rates and batch-norm settings
///
/// Every field has a default, so a JSON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub norm_lr_scale: f64,
    pub regularization: Regularization,
    pub seed: Option<u64>,
    pub epochs: usize,
    pub batch_size: usize,
    pub network: NetworkConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            learning_rate: 0.001,
            norm_lr_scale: 1.0,
            regularization: Regularization { l1_lambda: 0.0, l2_lambda: 0.001 },
            seed: None,
            epochs: 50,
            batch_size: 32,
            network: NetworkConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(NetError::InvalidArgument(format!("{name} must be positive, got {v}")))
            }
        };
        positive("learning_rate", self.learning_rate)?;
        positive("norm_lr_scale", self.norm_lr_scale)?;
        let reg = self.regularization;
        if reg.l1_lambda < 0.0 || reg.l2_lambda < 0.0 {
            return Err(NetError::InvalidArgument(format!("regularization strengths must be non-negative, got {reg:?}")));
        }
        if self.batch_size == 0 {
            return Err(NetError::InvalidArgument("batch_size must be at least 1".into()));
        }
        self.network.build()?;
        Ok(())
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes and validates a `TrainConfig` from a JSON file.
    pub fn load_json(path: &str) -> Result<TrainConfig> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let config: TrainConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
