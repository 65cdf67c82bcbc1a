//! Batch Normalization
//!
//! Normalizes every feature (column) to zero mean and unit variance across
//! the current batch, then applies the learnable affine transform
//! `y = gamma * x_norm + beta`.
//!
//! ## Forward Pass
//!
//! ```text
//! mean_j = sum_i(x_ij) / N
//! var_j  = sum_i((x_ij - mean_j)²) / N
//! x_norm = (x - mean) / √(var + ε)
//! y      = γ * x_norm + β
//! ```
//!
//! ## Backward Pass
//!
//! Every input in a column shifts that column's mean and variance, so the
//! input gradient has two correction terms besides the direct path:
//!
//! ```text
//! grad_γ      = sum_i(grad_y * x_norm)
//! grad_β      = sum_i(grad_y)
//! grad_x_norm = grad_y * γ
//! grad_x      = (N·grad_x_norm - sum(grad_x_norm) - x_norm·sum(grad_x_norm·x_norm)) / (N·√(var + ε))
//! ```

use crate::error::{NetError, Result};
use crate::math::matrix::Matrix;

pub const DEFAULT_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchNorm {
    pub epsilon: f64,
}

/// Statistics from one forward call, consumed by the matching backward call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchNormCache {
    pub input: Matrix,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
    /// Pre-affine normalized values.
    pub normalized: Matrix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchNormGradients {
    pub input: Matrix,
    pub gamma: Matrix,
    pub beta: Matrix,
}

impl Default for BatchNorm {
    fn default() -> Self {
        BatchNorm { epsilon: DEFAULT_EPSILON }
    }
}

impl BatchNorm {
    pub fn new(epsilon: f64) -> Result<Self> {
        if !(epsilon > 0.0 && epsilon.is_finite()) {
            return Err(NetError::InvalidArgument(format!(
                "batch-norm epsilon must be positive, got {epsilon}"
            )));
        }
        Ok(BatchNorm { epsilon })
    }

    /// `gamma` is initialized to 1.0 for every feature.
    pub fn initial_gamma(features: usize) -> Matrix {
        Matrix::filled(1, features, 1.0)
    }

    /// `beta` is initialized to 0.0 for every feature.
    pub fn initial_beta(features: usize) -> Matrix {
        Matrix::zeros(1, features)
    }

    fn check_affine(input: &Matrix, gamma: &Matrix, beta: &Matrix) -> Result<()> {
        let expected = (1, input.cols);
        if gamma.shape() != expected {
            return Err(NetError::shape("batch-norm gamma", gamma.shape(), expected));
        }
        if beta.shape() != expected {
            return Err(NetError::shape("batch-norm beta", beta.shape(), expected));
        }
        Ok(())
    }

    pub fn forward(&self, input: &Matrix, gamma: &Matrix, beta: &Matrix) -> Result<(Matrix, BatchNormCache)> {
        Self::check_affine(input, gamma, beta)?;
        let n = input.rows as f64;

        let mean: Vec<f64> = input.column_sum().data[0].iter().map(|s| s / n).collect();

        let mut variance = vec![0.0; input.cols];
        for row in &input.data {
            for (j, &x) in row.iter().enumerate() {
                let diff = x - mean[j];
                variance[j] += diff * diff;
            }
        }
        for v in variance.iter_mut() {
            *v /= n;
        }

        let inv_std: Vec<f64> = variance.iter().map(|v| 1.0 / (v + self.epsilon).sqrt()).collect();

        let mut normalized = Matrix::zeros(input.rows, input.cols);
        let mut output = Matrix::zeros(input.rows, input.cols);
        for (i, row) in input.data.iter().enumerate() {
            for (j, &x) in row.iter().enumerate() {
                let x_norm = (x - mean[j]) * inv_std[j];
                normalized.data[i][j] = x_norm;
                output.data[i][j] = gamma.data[0][j] * x_norm + beta.data[0][j];
            }
        }

        let cache = BatchNormCache {
            input: input.clone(),
            mean,
            variance,
            normalized,
        };
        Ok((output, cache))
    }

    /// Gradients w.r.t. the input, `gamma` and `beta`.
    ///
    /// Precondition: `cache` comes from the forward call whose output
    /// `d_out` is the gradient of, evaluated with the same `gamma`.
    pub fn backward(&self, d_out: &Matrix, cache: &BatchNormCache, gamma: &Matrix) -> Result<BatchNormGradients> {
        if d_out.shape() != cache.normalized.shape() {
            return Err(NetError::shape("batch-norm backward", d_out.shape(), cache.normalized.shape()));
        }
        if gamma.shape() != (1, d_out.cols) {
            return Err(NetError::shape("batch-norm gamma", gamma.shape(), (1, d_out.cols)));
        }

        let n = d_out.rows as f64;
        let features = d_out.cols;

        let mut grad_gamma = vec![0.0; features];
        let mut grad_beta = vec![0.0; features];
        // Column sums of grad_x_norm and grad_x_norm * x_norm.
        let mut sum_dxn = vec![0.0; features];
        let mut sum_dxn_xn = vec![0.0; features];

        for (g_row, xn_row) in d_out.data.iter().zip(cache.normalized.data.iter()) {
            for j in 0..features {
                let g = g_row[j];
                let xn = xn_row[j];
                let dxn = g * gamma.data[0][j];
                grad_gamma[j] += g * xn;
                grad_beta[j] += g;
                sum_dxn[j] += dxn;
                sum_dxn_xn[j] += dxn * xn;
            }
        }

        let inv_std: Vec<f64> = cache.variance.iter().map(|v| 1.0 / (v + self.epsilon).sqrt()).collect();

        let mut grad_input = Matrix::zeros(d_out.rows, features);
        for (i, (g_row, xn_row)) in d_out.data.iter().zip(cache.normalized.data.iter()).enumerate() {
            for j in 0..features {
                let dxn = g_row[j] * gamma.data[0][j];
                grad_input.data[i][j] =
                    (n * dxn - sum_dxn[j] - xn_row[j] * sum_dxn_xn[j]) * inv_std[j] / n;
            }
        }

        Ok(BatchNormGradients {
            input: grad_input,
            gamma: Matrix::row(grad_gamma),
            beta: Matrix::row(grad_beta),
        })
    }
}
