/// Statistics for one mini-batch, measured on the forward pass that
/// preceded the update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepStats {
    /// Mean cross-entropy over the batch.
    pub data_loss: f64,
    /// L1/L2 penalty of the weight matrices.
    pub regularization_loss: f64,
    /// Examples whose argmax prediction matched the label.
    pub correct: usize,
    pub batch_size: usize,
}

impl StepStats {
    /// `data_loss + regularization_loss`
    pub fn loss(&self) -> f64 {
        self.data_loss + self.regularization_loss
    }

    /// Fraction correct in [0, 1].
    pub fn accuracy(&self) -> f64 {
        if self.batch_size == 0 {
            return 0.0;
        }
        self.correct as f64 / self.batch_size as f64
    }
}
