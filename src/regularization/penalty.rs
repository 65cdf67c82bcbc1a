use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::math::matrix::Matrix;

/// Which norm a regularization penalty is taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    L1,
    L2,
}

/// L1/L2 strengths applied to the weight matrices (never to biases or
/// batch-norm parameters). A strength of 0 disables that term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Regularization {
    pub l1_lambda: f64,
    pub l2_lambda: f64,
}

impl Regularization {
    pub fn is_active(&self) -> bool {
        self.l1_lambda > 0.0 || self.l2_lambda > 0.0
    }

    /// Scalar penalty over `weights`, reported alongside the data loss.
    pub fn penalty(&self, weights: &[&Matrix]) -> f64 {
        let mut total = 0.0;
        if self.l1_lambda > 0.0 {
            total += total_penalty(weights, self.l1_lambda, Penalty::L1);
        }
        if self.l2_lambda > 0.0 {
            total += total_penalty(weights, self.l2_lambda, Penalty::L2);
        }
        total
    }

    /// Adds the gradient of `penalty` w.r.t. `weights` into `grad`.
    pub fn add_gradient(&self, grad: Matrix, weights: &Matrix) -> Result<Matrix> {
        let mut grad = grad;
        if self.l2_lambda > 0.0 {
            grad = grad.add(&weight_decay_gradient(weights, self.l2_lambda))?;
        }
        if self.l1_lambda > 0.0 {
            grad = grad.add(&l1_subgradient(weights, self.l1_lambda))?;
        }
        Ok(grad)
    }
}

/// `lambda · Σ|w|`
pub fn l1_penalty(weights: &Matrix, lambda: f64) -> f64 {
    lambda * weights.data.iter().flat_map(|r| r.iter()).map(|w| w.abs()).sum::<f64>()
}

/// `0.5 · lambda · Σw²`
pub fn l2_penalty(weights: &Matrix, lambda: f64) -> f64 {
    0.5 * lambda * weights.data.iter().flat_map(|r| r.iter()).map(|w| w * w).sum::<f64>()
}

/// Penalty summed over several weight matrices.
pub fn total_penalty(weights: &[&Matrix], lambda: f64, kind: Penalty) -> f64 {
    weights.iter()
        .map(|w| match kind {
            Penalty::L1 => l1_penalty(w, lambda),
            Penalty::L2 => l2_penalty(w, lambda),
        })
        .sum()
}

/// Gradient of `l2_penalty`: `lambda · W`.
pub fn weight_decay_gradient(weights: &Matrix, lambda: f64) -> Matrix {
    weights.scale(lambda)
}

/// Subgradient of `l1_penalty`: `lambda · sign(W)`, taking 0 at 0.
pub fn l1_subgradient(weights: &Matrix, lambda: f64) -> Matrix {
    weights.map(|w| if w > 0.0 { lambda } else if w < 0.0 { -lambda } else { 0.0 })
}
