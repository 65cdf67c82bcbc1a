use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

/// Categorical cross-entropy loss for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f64 = 1e-15;

impl CrossEntropyLoss {
    /// Computes the scalar cross-entropy loss for one example:
    ///   L = -sum(expected[i] * log(predicted[i] + eps))
    ///
    /// `predicted` — softmax probabilities, shape [n_classes]
    /// `expected`  — one-hot (or soft) target distribution, shape [n_classes]
    ///
    /// Fails with `InvalidArgument` when either row is empty or their
    /// lengths differ.
    pub fn loss(predicted: &[f64], expected: &[f64]) -> Result<f64> {
        if predicted.is_empty() || expected.is_empty() {
            return Err(NetError::InvalidArgument("loss rows must not be empty".into()));
        }
        if predicted.len() != expected.len() {
            return Err(NetError::InvalidArgument(format!(
                "prediction has {} classes but label has {}",
                predicted.len(),
                expected.len()
            )));
        }
        Ok(predicted.iter().zip(expected.iter())
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum())
    }

    /// Mean per-row loss over a batch. An empty batch is `InvalidArgument`.
    pub fn batch_loss(predictions: &Matrix, labels: &Matrix) -> Result<f64> {
        if predictions.shape() != labels.shape() {
            return Err(NetError::shape("batch loss", predictions.shape(), labels.shape()));
        }
        check_non_empty(predictions)?;
        let mut total = 0.0;
        for (p, y) in predictions.data.iter().zip(labels.data.iter()) {
            total += Self::loss(p, y)?;
        }
        Ok(total / predictions.rows as f64)
    }

    /// Gradient of the mean batch loss w.r.t. the pre-softmax logits.
    ///
    /// When Softmax and cross-entropy are composed together the gradient
    /// simplifies to:
    ///   ∂L/∂z = (predicted - expected) / batch_size
    ///
    /// This is the initial delta of the backward pass.
    pub fn gradient(predictions: &Matrix, labels: &Matrix) -> Result<Matrix> {
        let diff = predictions.sub(labels)?;
        check_non_empty(predictions)?;
        Ok(diff.scale(1.0 / predictions.rows as f64))
    }
}

fn check_non_empty(predictions: &Matrix) -> Result<()> {
    if predictions.rows == 0 {
        return Err(NetError::InvalidArgument("batch must contain at least one row".into()));
    }
    Ok(())
}
